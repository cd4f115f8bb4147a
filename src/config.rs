//! Session configuration from the environment

use crate::state_machine::{ControllerContext, ErrorPolicy, SubmitPolicy};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/chat";
const DEFAULT_EVENT_BUFFER: usize = 64;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Settings for one chat session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Chat endpoint of the answer backend
    pub backend_url: String,
    pub submit_policy: SubmitPolicy,
    pub error_policy: ErrorPolicy,
    /// Capacity of the runtime's command channel
    pub event_buffer: usize,
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            submit_policy: SubmitPolicy::default(),
            error_policy: ErrorPolicy::default(),
            event_buffer: DEFAULT_EVENT_BUFFER,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl SessionConfig {
    /// Read `ASK_*` variables. Invalid values are logged and replaced by
    /// their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let backend_url = lookup("ASK_BACKEND_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.backend_url);

        let event_buffer = parse_or("ASK_EVENT_BUFFER", &lookup, defaults.event_buffer);
        let event_buffer = if event_buffer == 0 {
            tracing::warn!(var = "ASK_EVENT_BUFFER", "Buffer must be positive, using default");
            defaults.event_buffer
        } else {
            event_buffer
        };

        Self {
            backend_url,
            submit_policy: parse_or("ASK_SUBMIT_POLICY", &lookup, defaults.submit_policy),
            error_policy: parse_or("ASK_ERROR_POLICY", &lookup, defaults.error_policy),
            event_buffer,
            connect_timeout: Duration::from_secs(parse_or(
                "ASK_CONNECT_TIMEOUT_SECS",
                &lookup,
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
        }
    }

    pub fn controller_context(&self) -> ControllerContext {
        ControllerContext::new(self.submit_policy, self.error_policy)
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(var = key, value = %raw, error = %e, "Invalid setting, using default");
            default
        }
    }
}
