//! Simulated user traffic.
//!
//! The `Simulator` plays the part of a user clicking action buttons: each
//! click writes client-side entries to the `LogStore` and runs the matching
//! handler in-process, which writes the server-side records.
use crate::handlers::{Api, HandlerResponse, Handlers, RequestContext};
use crate::logging::LogStore;
use crate::types::metadata;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

/// Every fifth click on a button is flagged as high frequency.
const HIGH_FREQUENCY_EVERY: u64 = 5;
/// Every tenth click on a button raises a simulated error.
const SIMULATED_ERROR_EVERY: u64 = 10;

const USER_AGENT: &str = "log-monitoring-app simulator";
const SCREEN_RESOLUTION: &str = "1920x1080";

/// A clickable action wired to one of the simulated APIs.
#[derive(Debug, Clone, Copy)]
pub struct ActionButton {
    pub name: &'static str,
    /// Label attached to every client entry the click produces.
    pub action: &'static str,
    pub api: Api,
    /// JSON request body.
    pub payload: &'static str,
}

pub static BUTTONS: [ActionButton; 8] = [
    ActionButton {
        name: "User Operation",
        action: "USER_OPERATION",
        api: Api::User,
        payload: r#"{"action":"user_operation"}"#,
    },
    ActionButton {
        name: "Analytics Event",
        action: "ANALYTICS_EVENT",
        api: Api::Analytics,
        payload: r#"{"eventType":"button_click"}"#,
    },
    ActionButton {
        name: "Database Query",
        action: "DB_QUERY",
        api: Api::Database,
        payload: r#"{"operation":"read"}"#,
    },
    ActionButton {
        name: "Search Request",
        action: "SEARCH_REQUEST",
        api: Api::Search,
        payload: r#"{"query":"sample search","page":1,"limit":20}"#,
    },
    ActionButton {
        name: "Auth Request",
        action: "AUTH_REQUEST",
        api: Api::Auth,
        payload: r#"{"action":"login"}"#,
    },
    ActionButton {
        name: "DB Write",
        action: "DB_WRITE",
        api: Api::Database,
        payload: r#"{"operation":"write"}"#,
    },
    ActionButton {
        name: "Track Event",
        action: "TRACK_EVENT",
        api: Api::Analytics,
        payload: r#"{"eventType":"conversion"}"#,
    },
    ActionButton {
        name: "Fetch Data",
        action: "FETCH_DATA",
        api: Api::User,
        payload: r#"{"action":"fetch_profile"}"#,
    },
];

impl ActionButton {
    /// Looks a button up by its display name.
    pub fn find(name: &str) -> Option<&'static ActionButton> {
        BUTTONS.iter().find(|button| button.name == name)
    }

    /// `"Database Query"` becomes `"database-query"`.
    fn element_id(&self) -> String {
        self.name
            .chars()
            .map(|c| if c.is_whitespace() { '-' } else { c })
            .collect::<String>()
            .to_lowercase()
    }

    fn payload_value(&self) -> Value {
        serde_json::from_str(self.payload).unwrap_or(Value::Null)
    }
}

/// Outcome of a batch of simulated clicks.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationSummary {
    pub clicks: u64,
    pub failures: u64,
}

/// Drives the handlers the way the interactive front end would.
pub struct Simulator {
    store: LogStore,
    handlers: Handlers,
    clicks: HashMap<&'static str, u64>,
    started: Instant,
}

impl Simulator {
    pub fn new(store: LogStore, handlers: Handlers) -> Self {
        Self {
            store,
            handlers,
            clicks: HashMap::new(),
            started: Instant::now(),
        }
    }

    /// Number of clicks recorded for `button` so far.
    #[cfg(test)]
    pub fn click_count(&self, button: &ActionButton) -> u64 {
        self.clicks.get(button.name).copied().unwrap_or(0)
    }

    /// Simulates one click on `button` and returns the handler's response.
    pub async fn click(&mut self, button: &'static ActionButton) -> HandlerResponse {
        let count = {
            let count = self.clicks.entry(button.name).or_insert(0);
            *count += 1;
            *count
        };
        let store = &self.store;
        let action = button.action;
        let endpoint = button.api.endpoint();
        let metrics = self.handlers.logger().metrics();

        store.info(
            format!("User clicked {}", button.name),
            action,
            metadata(json!({
                "buttonName": button.name,
                "clickCount": count,
                "timestamp": Utc::now().timestamp_millis(),
                "userAgent": USER_AGENT,
                "screenResolution": SCREEN_RESOLUTION,
            })),
        );

        store.debug(
            "Button interaction initiated",
            action,
            metadata(json!({
                "buttonId": button.element_id(),
                "previousClicks": count - 1,
                "sessionDuration": self.started.elapsed().as_secs_f64() * 1000.0,
            })),
        );

        store.trace(
            "Event propagation details",
            action,
            metadata(json!({
                "eventType": "click",
                "phase": "capture",
                "coordinates": {
                    "x": metrics.fraction() * 100.0,
                    "y": metrics.fraction() * 100.0,
                },
            })),
        );

        store.debug(
            format!("Sending API request to {}", endpoint),
            action,
            metadata(json!({
                "endpoint": endpoint,
                "method": "POST",
                "payload": button.payload_value(),
            })),
        );

        let ctx = RequestContext {
            ip_address: "127.0.0.1".to_string(),
            user_agent: USER_AGENT.to_string(),
        };
        let response = self
            .handlers
            .handle(button.api, button.payload.as_bytes(), &ctx)
            .await;

        store.info(
            format!("API response received from {}", endpoint),
            action,
            metadata(json!({
                "status": response.status.as_u16(),
                "success": response.body.get("success").cloned().unwrap_or(Value::Null),
                "responseTime": response.body.get("responseTime").cloned().unwrap_or(Value::Null),
            })),
        );

        if response.is_success() {
            store.info(
                format!("{} action completed successfully", button.name),
                action,
                metadata(json!({
                    "success": true,
                    "result": response.body,
                })),
            );
        } else {
            let message = response
                .body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("API request failed");
            store.error(
                format!("API request failed for {}", button.name),
                action,
                metadata(json!({
                    "errorMessage": message,
                    "endpoint": endpoint,
                })),
            );
        }

        if count % HIGH_FREQUENCY_EVERY == 0 {
            store.warn(
                format!("High click frequency detected on {}", button.name),
                action,
                metadata(json!({
                    "clickCount": count,
                    "threshold": HIGH_FREQUENCY_EVERY,
                    "recommendation": "Consider rate limiting",
                })),
            );
        }

        if count % SIMULATED_ERROR_EVERY == 0 {
            store.error(
                format!("Simulated error on {}", button.name),
                action,
                metadata(json!({
                    "errorCode": "SIM_ERROR_001",
                    "message": "This is a simulated error for testing",
                    "recoverable": true,
                })),
            );
        }

        debug!(
            "Simulated click {} on '{}' answered {}",
            count, button.name, response.status
        );
        response
    }

    /// Clicks every button `rounds` times, in table order.
    pub async fn run(&mut self, rounds: u64) -> SimulationSummary {
        let buttons: Vec<&'static ActionButton> = BUTTONS.iter().collect();
        self.run_buttons(&buttons, rounds).await
    }

    /// Clicks each of `buttons` once per round, `rounds` times.
    pub async fn run_buttons(
        &mut self,
        buttons: &[&'static ActionButton],
        rounds: u64,
    ) -> SimulationSummary {
        let mut summary = SimulationSummary::default();

        for round in 1..=rounds {
            for button in buttons {
                let response = self.click(*button).await;
                summary.clicks += 1;
                if !response.is_success() {
                    summary.failures += 1;
                }
            }
            debug!("Simulation round {}/{} finished", round, rounds);
        }

        info!(
            "Simulation finished: {} clicks, {} failed requests",
            summary.clicks, summary.failures
        );
        summary
    }
}

/// Comma-separated button names, for error messages.
pub fn button_names() -> String {
    BUTTONS
        .iter()
        .map(|button| button.name)
        .collect::<Vec<_>>()
        .join(", ")
}
