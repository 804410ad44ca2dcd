use std::collections::HashMap;

use crate::diagnostics::DiagnosticsSender;

pub(crate) const DEFAULT_HEADER_LINE_LIMIT: usize = 1000;
pub(crate) const DEFAULT_PORT: u16 = 8888;
pub(crate) const DEFAULT_INACTIVITY_TIMEOUT: f64 = 1.0;
pub(crate) const DEFAULT_REQUEST_TIMEOUT: f64 = 60.0;

/// Server settings: the raw key/value items plus the parsed values the
/// engine consults on the hot path. Unrecognized keys are stored verbatim;
/// recognized keys with unparsable values keep the previous parsed value.
pub(crate) struct ServerConfig {
    items: HashMap<String, String>,
    pub header_line_limit: usize,
    pub port: u16,
    /// Non-empty to require the `Host` header to match.
    pub host: String,
    pub inactivity_timeout: f64,
    pub request_timeout: f64,
    /// Bounds idleness between requests; falls back to `inactivity_timeout`.
    pub idle_timeout: Option<f64>,
}

impl ServerConfig {
    pub fn new() -> Self {
        let mut items = HashMap::new();
        items.insert("HeaderLineLimit".to_string(), DEFAULT_HEADER_LINE_LIMIT.to_string());
        Self {
            items,
            header_line_limit: DEFAULT_HEADER_LINE_LIMIT,
            port: DEFAULT_PORT,
            host: String::new(),
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            idle_timeout: None,
        }
    }

    pub fn get(&self, key: &str) -> String {
        self.items.get(key).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, key: &str, value: &str, diagnostics: &DiagnosticsSender) {
        self.items.insert(key.to_string(), value.to_string());
        match key {
            "HeaderLineLimit" => {
                if let Ok(limit) = value.parse::<usize>() {
                    diagnostics.send(
                        0,
                        &format!(
                            "Header line limit changed from {} to {}",
                            self.header_line_limit, limit
                        ),
                    );
                    self.header_line_limit = limit;
                }
            }
            "Port" => {
                if let Ok(port) = value.parse::<u16>() {
                    diagnostics
                        .send(0, &format!("Port changed from {} to {}", self.port, port));
                    self.port = port;
                }
            }
            "Host" => {
                self.host = value.to_string();
            }
            "InactivityTimeout" => {
                if let Ok(timeout) = value.parse::<f64>() {
                    diagnostics.send(
                        0,
                        &format!(
                            "Inactivity timeout changed from {} to {}",
                            self.inactivity_timeout, timeout
                        ),
                    );
                    self.inactivity_timeout = timeout;
                }
            }
            "RequestTimeout" => {
                if let Ok(timeout) = value.parse::<f64>() {
                    diagnostics.send(
                        0,
                        &format!(
                            "Request timeout changed from {} to {}",
                            self.request_timeout, timeout
                        ),
                    );
                    self.request_timeout = timeout;
                }
            }
            "IdleTimeout" => {
                if let Ok(timeout) = value.parse::<f64>() {
                    diagnostics.send(0, &format!("Idle timeout changed to {timeout}"));
                    self.idle_timeout = Some(timeout);
                }
            }
            _ => {}
        }
    }
}
