//! ask - interactive client for a search-and-answer backend
//!
//! Reads questions from stdin and prints answers as they stream in.
//! `/related N` asks the Nth suggested follow-up, `/cancel` stops the current
//! answer and `/quit` exits.

use ask_engine::{
    AssistantTurn, HttpTransport, SessionConfig, SessionEvent, SessionHandle, SessionRuntime,
    StreamId, StreamOutcome,
};
use futures::StreamExt;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they don't interleave with answers
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ask_engine=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = SessionConfig::from_env();
    let transport = HttpTransport::new(config.backend_url.clone(), config.connect_timeout)?;
    tracing::info!(
        backend = %transport.endpoint(),
        submit_policy = ?config.submit_policy,
        error_policy = ?config.error_policy,
        "Starting ask"
    );

    let handle = SessionRuntime::spawn(config.controller_context(), transport, config.event_buffer);

    let mut repl = Repl::new(handle, std::io::stdout());
    repl.run().await?;
    Ok(())
}

/// Terminal front end for one session
struct Repl<W> {
    handle: SessionHandle,
    out: W,
    /// Stream whose text is being printed
    current: Option<StreamId>,
    /// Bytes of the current answer already printed
    printed: usize,
}

impl<W: Write> Repl<W> {
    fn new(handle: SessionHandle, out: W) -> Self {
        Self {
            handle,
            out,
            current: None,
            printed: 0,
        }
    }

    async fn run(&mut self) -> std::io::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut live = self.handle.watch_live_turn();
        let mut events = Box::pin(self.handle.events());

        self.prompt()?;
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if !self.handle_line(line.trim()).await? {
                        break;
                    }
                }

                Ok(()) = live.changed() => {
                    let turn = live.borrow_and_update().clone();
                    if let Some(turn) = turn {
                        self.print_live(&turn)?;
                    }
                }

                Some(event) = events.next() => self.handle_event(event)?,
            }
        }

        self.handle.cancel().await.ok();
        Ok(())
    }

    /// Returns `false` when the user asked to quit
    async fn handle_line(&mut self, line: &str) -> std::io::Result<bool> {
        let result = match line {
            "" => return Ok(true),
            "/quit" | "/exit" => return Ok(false),
            "/cancel" => self.handle.cancel().await.map(|()| None),
            _ => match line.strip_prefix("/related") {
                Some(arg) => match arg.trim().parse::<usize>() {
                    Ok(n) if n > 0 => self.handle.select_related_at(n - 1).await.map(Some),
                    _ => {
                        writeln!(self.out, "usage: /related N")?;
                        return Ok(true);
                    }
                },
                None => self.handle.submit(line).await.map(Some),
            },
        };

        match result {
            Ok(Some(stream_id)) => {
                self.current = Some(stream_id);
                self.printed = 0;
            }
            Ok(None) => {}
            Err(e) => writeln!(self.out, "! {e}")?,
        }
        Ok(true)
    }

    /// Print whatever part of `turn` has not been printed yet
    fn print_live(&mut self, turn: &AssistantTurn) -> std::io::Result<()> {
        if let Some(fresh) = turn.content.get(self.printed..) {
            self.out.write_all(fresh.as_bytes())?;
            self.out.flush()?;
            self.printed = turn.content.len();
        }
        Ok(())
    }

    fn handle_event(&mut self, event: SessionEvent) -> std::io::Result<()> {
        let SessionEvent::StreamEnded { stream_id, outcome } = event else {
            return Ok(());
        };
        if self.current != Some(stream_id) {
            return Ok(());
        }

        // The live watch is cleared when the answer commits, so the last
        // deltas may only be visible in the transcript
        let committed = match outcome {
            StreamOutcome::Cancelled => None,
            StreamOutcome::Completed | StreamOutcome::Failed { .. } => {
                self.handle.transcript().latest_answer().cloned()
            }
        };
        if let Some(answer) = &committed {
            self.print_live(answer)?;
        }
        self.current = None;
        self.printed = 0;

        match outcome {
            StreamOutcome::Completed => {
                writeln!(self.out)?;
                if let Some(answer) = &committed {
                    self.print_footer(answer)?;
                }
            }
            StreamOutcome::Failed { reason } => writeln!(self.out, "\n! answer failed: {reason}")?,
            StreamOutcome::Cancelled => writeln!(self.out, "\n! cancelled")?,
        }
        self.prompt()
    }

    fn print_footer(&mut self, answer: &AssistantTurn) -> std::io::Result<()> {
        if !answer.sources.is_empty() {
            writeln!(self.out, "\nSources:")?;
            for (i, source) in answer.sources.iter().enumerate() {
                writeln!(self.out, "  [{}] {} <{}>", i + 1, source.title, source.url)?;
            }
        }
        if !answer.related_questions().is_empty() {
            writeln!(self.out, "\nRelated:")?;
            for (i, question) in answer.related_questions().iter().enumerate() {
                writeln!(self.out, "  {}. {question}", i + 1)?;
            }
        }
        Ok(())
    }

    fn prompt(&mut self) -> std::io::Result<()> {
        self.out.write_all(b"\n> ")?;
        self.out.flush()
    }
}
