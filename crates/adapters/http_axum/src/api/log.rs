//! Caller-supplied log lines, written through `tracing`.

use axum::Json;
use axum::http::StatusCode;
use serde::Deserialize;

/// Severity accepted by `POST /api/log`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Deserialize)]
pub struct LogRequest {
    pub message: String,
    #[serde(default)]
    pub level: LogLevel,
}

/// `POST /api/log`
pub async fn write(Json(body): Json<LogRequest>) -> StatusCode {
    let message = body.message.as_str();
    match body.level {
        LogLevel::Debug => tracing::debug!(target: "offpeak", "[offpeak] {message}"),
        LogLevel::Info => tracing::info!(target: "offpeak", "[offpeak] {message}"),
        LogLevel::Warning => tracing::warn!(target: "offpeak", "[offpeak] {message}"),
        LogLevel::Error => tracing::error!(target: "offpeak", "[offpeak] {message}"),
        LogLevel::Critical => {
            tracing::error!(target: "offpeak", critical = true, "[offpeak] {message}");
        }
    }
    StatusCode::NO_CONTENT
}
