//! HTTP transport for the answer backend

use super::error::TransportError;
use super::wire::{decode_event, ChatRequest, SseDecoder, SseFrame};
use crate::runtime::{Transport, UpdateSink};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use std::time::Duration;

/// Streams answers from the backend's chat endpoint over server-sent events
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        endpoint: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn stream(&self, request: ChatRequest, sink: UpdateSink) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::http(status.as_u16(), &body));
        }

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::default();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for frame in decoder.push(&chunk) {
                if forward(&frame, &sink).await? {
                    return Ok(());
                }
            }
        }

        if let Some(frame) = decoder.finish() {
            if forward(&frame, &sink).await? {
                return Ok(());
            }
        }

        Err(TransportError::truncated("response ended before the stream-end event"))
    }
}

/// Send the update carried by `frame`. Returns `true` once there is nothing
/// more to read: the stream ended or the session went away.
async fn forward(frame: &SseFrame, sink: &UpdateSink) -> Result<bool, TransportError> {
    let Some(update) = decode_event(&frame.data)? else {
        return Ok(false);
    };
    let terminal = update.is_terminal();
    if !sink.send(update).await {
        tracing::debug!(stream_id = %sink.stream_id(), "Session gone, dropping stream");
        return Ok(true);
    }
    Ok(terminal)
}
