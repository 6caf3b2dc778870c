#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arems_kernel_contracts::Rating;
use chrono::NaiveDate;
use serde_json::{json, Value};
use thiserror::Error;

pub const DEFAULT_RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
pub const DEFAULT_FROM_ADDRESS: &str = "AREMS Notifications <noreply@arems.net>";
pub const DEFAULT_TIMEOUT_MS: u32 = 10_000;

pub const ENV_API_KEY: &str = "AREMS_RESEND_API_KEY";
pub const ENV_ENDPOINT: &str = "AREMS_RESEND_ENDPOINT";
pub const ENV_FROM_ADDRESS: &str = "AREMS_NOTIFY_FROM";
pub const ENV_TIMEOUT_MS: &str = "AREMS_NOTIFY_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("notification config invalid: {0}")]
    Config(&'static str),
    #[error("mail provider answered HTTP {0}")]
    HttpStatus(u16),
    #[error("mail provider unreachable ({kind}): {detail}")]
    Transport { kind: &'static str, detail: String },
    #[error("mail provider response could not be decoded")]
    Decode,
}

/// Tells a lead FTO that one of their orientees was evaluated by someone else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationNotice {
    pub to: String,
    pub to_name: String,
    pub orientee_name: String,
    pub evaluator_name: String,
    pub shift_date: NaiveDate,
    pub rating: Rating,
}

impl EvaluationNotice {
    pub fn subject(&self) -> String {
        format!("New Evaluation for {}", self.orientee_name)
    }

    pub fn stars(&self) -> String {
        let filled = usize::from(self.rating.get());
        let empty = usize::from(Rating::MAX) - filled;
        format!("{}{}", "★".repeat(filled), "☆".repeat(empty))
    }

    pub fn html_body(&self) -> String {
        let mut html = String::with_capacity(2048);
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<style>\n");
        html.push_str(NOTICE_CSS);
        html.push_str("</style>\n</head>\n<body>\n<div class=\"container\">\n");
        html.push_str("<div class=\"header\"><h1>New Evaluation Submitted</h1>");
        html.push_str("<p>Adams Regional EMS Training</p></div>\n<div class=\"content\">\n");
        html.push_str(&format!("<p>Hi {},</p>\n", html_escape(&self.to_name)));
        html.push_str("<p>A new evaluation has been submitted for your orientee:</p>\n");
        push_detail(&mut html, "Orientee", &html_escape(&self.orientee_name), "value");
        push_detail(&mut html, "Evaluated By", &html_escape(&self.evaluator_name), "value");
        push_detail(&mut html, "Shift Date", &format_long_date(self.shift_date), "value");
        push_detail(&mut html, "Overall Rating", &self.stars(), "value rating");
        html.push_str(
            "<p>Log in to the AREMS dashboard to view the full evaluation details.</p>\n",
        );
        html.push_str("</div>\n<div class=\"footer\"><p>Adams Regional EMS - Orientee Tracking System</p></div>\n");
        html.push_str("</div>\n</body>\n</html>\n");
        html
    }
}

const NOTICE_CSS: &str = "body { font-family: -apple-system, Roboto, sans-serif; line-height: 1.6; color: #333; }
.container { max-width: 600px; margin: 0 auto; padding: 20px; }
.header { background: #1e40af; color: white; padding: 30px; border-radius: 12px 12px 0 0; }
.content { background: #f8fafc; padding: 30px; border-radius: 0 0 12px 12px; }
.detail { margin: 10px 0; padding: 12px; background: white; border-radius: 8px; }
.label { font-size: 12px; color: #64748b; text-transform: uppercase; }
.value { font-size: 16px; font-weight: 600; color: #1e293b; }
.rating { font-size: 24px; color: #eab308; }
.footer { text-align: center; margin-top: 20px; color: #94a3b8; font-size: 12px; }
";

fn push_detail(html: &mut String, label: &str, value: &str, class: &str) {
    html.push_str(&format!(
        "<div class=\"detail\"><div class=\"label\">{label}</div><div class=\"{class}\">{value}</div></div>\n"
    ));
}

/// `October 17, 2026`
pub fn format_long_date(d: NaiveDate) -> String {
    d.format("%B %-d, %Y").to_string()
}

pub fn html_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyReceipt {
    pub provider_message_id: Option<String>,
}

/// Delivery seam for evaluation notices. Implementations must not retry internally.
pub trait EvaluationNotifier {
    fn deliver(&self, notice: &EvaluationNotice) -> Result<NotifyReceipt, NotifyError>;
}

impl<T: EvaluationNotifier + ?Sized> EvaluationNotifier for Arc<T> {
    fn deliver(&self, notice: &EvaluationNotice) -> Result<NotifyReceipt, NotifyError> {
        (**self).deliver(notice)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ResendConfig {
    pub endpoint: String,
    pub from_address: String,
    pub api_key: String,
    pub timeout_ms: u32,
}

impl fmt::Debug for ResendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResendConfig")
            .field("endpoint", &self.endpoint)
            .field("from_address", &self.from_address)
            .field("api_key", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl ResendConfig {
    pub fn mvp_v1(api_key: String) -> Self {
        Self {
            endpoint: DEFAULT_RESEND_ENDPOINT.to_string(),
            from_address: DEFAULT_FROM_ADDRESS.to_string(),
            api_key,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Returns `Ok(None)` when no API key is configured; notifications are then off.
    pub fn from_env_var_map<F>(mut env_getter: F) -> Result<Option<Self>, NotifyError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let Some(api_key) = non_blank(env_getter(ENV_API_KEY)) else {
            return Ok(None);
        };
        let mut config = Self::mvp_v1(api_key);
        if let Some(endpoint) = non_blank(env_getter(ENV_ENDPOINT)) {
            if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
                return Err(NotifyError::Config("endpoint must be an http(s) url"));
            }
            config.endpoint = endpoint;
        }
        if let Some(from) = non_blank(env_getter(ENV_FROM_ADDRESS)) {
            config.from_address = from;
        }
        if let Some(raw) = non_blank(env_getter(ENV_TIMEOUT_MS)) {
            let ms: u32 = raw
                .parse()
                .map_err(|_| NotifyError::Config("timeout must be an integer (ms)"))?;
            if !(100..=60_000).contains(&ms) {
                return Err(NotifyError::Config("timeout must be within 100..=60000 ms"));
            }
            config.timeout_ms = ms;
        }
        Ok(Some(config))
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub struct ResendNotifier {
    config: ResendConfig,
    agent: ureq::Agent,
}

impl ResendNotifier {
    pub fn new(config: ResendConfig) -> Result<Self, NotifyError> {
        if config.api_key.trim().is_empty() {
            return Err(NotifyError::Config("api key must not be empty"));
        }
        let timeout = Duration::from_millis(u64::from(config.timeout_ms.max(100)));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .user_agent(concat!("arems/", env!("CARGO_PKG_VERSION")))
            .build();
        Ok(Self { config, agent })
    }

    pub fn config(&self) -> &ResendConfig {
        &self.config
    }

    pub fn payload(&self, notice: &EvaluationNotice) -> Value {
        json!({
            "from": self.config.from_address,
            "to": [notice.to],
            "subject": notice.subject(),
            "html": notice.html_body(),
        })
    }
}

impl EvaluationNotifier for ResendNotifier {
    fn deliver(&self, notice: &EvaluationNotice) -> Result<NotifyReceipt, NotifyError> {
        let response = self
            .agent
            .post(&self.config.endpoint)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {}", self.config.api_key))
            .send_json(self.payload(notice))
            .map_err(notify_error_from_ureq)?;
        let body: Value =
            serde_json::from_reader(response.into_reader()).map_err(|_| NotifyError::Decode)?;
        let receipt = NotifyReceipt {
            provider_message_id: body.get("id").and_then(Value::as_str).map(str::to_string),
        };
        tracing::debug!(
            to = %notice.to,
            provider_message_id = ?receipt.provider_message_id,
            "evaluation notice delivered"
        );
        Ok(receipt)
    }
}

fn notify_error_from_ureq(err: ureq::Error) -> NotifyError {
    match err {
        ureq::Error::Status(status, _) => NotifyError::HttpStatus(status),
        ureq::Error::Transport(transport) => {
            let detail = transport.to_string();
            let combined = format!("{:?} {}", transport.kind(), detail);
            NotifyError::Transport {
                kind: classify_transport_error_kind(&combined),
                detail,
            }
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}
