use crate::config::ReportSettings;
use crate::domain::ports::ReportSink;
use crate::domain::transaction::Outcome;
use crate::error::{AcceptorError, RejectionKind, Result, SendError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Optional body the remote system returns alongside its status code.
#[derive(Debug, Default, Deserialize)]
struct RemoteReply {
    status: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

impl RemoteReply {
    fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }

    fn kind(&self, status: StatusCode) -> RejectionKind {
        match self.code.as_deref() {
            Some(code) => RejectionKind::from_code(code),
            None => match status {
                StatusCode::CONFLICT => RejectionKind::AlreadySettled,
                StatusCode::UNPROCESSABLE_ENTITY => RejectionKind::AmountMismatch,
                _ => RejectionKind::Other,
            },
        }
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Posts outcomes as JSON to the configured endpoint.
pub struct HttpReportSink {
    endpoint: String,
    client: Client,
}

impl HttpReportSink {
    pub fn new(settings: &ReportSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| AcceptorError::ReporterError(format!("HTTP client: {}", e)))?;
        Ok(Self {
            endpoint: settings.endpoint.clone(),
            client,
        })
    }
}

#[async_trait]
impl ReportSink for HttpReportSink {
    async fn send(&self, outcome: &Outcome) -> std::result::Result<(), SendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(outcome)
            .send()
            .await
            .map_err(|e| SendError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SendError::Transient(format!("status {}, unreadable body: {}", status, e)))?;
        debug!(%status, %body, "Remote replied to status report");

        let reply = serde_json::from_str::<RemoteReply>(&body).ok();

        if status.is_success() {
            return match reply {
                Some(reply) if reply.is_error() => Err(SendError::Rejected {
                    kind: reply.kind(status),
                    message: reply.message.unwrap_or(body),
                }),
                _ => Ok(()),
            };
        }

        if is_transient(status) {
            return Err(SendError::Transient(format!("status {}: {}", status, body)));
        }

        match reply {
            Some(reply) => Err(SendError::Rejected {
                kind: reply.kind(status),
                message: reply.message.unwrap_or(body),
            }),
            // A 4xx nobody can make sense of is as likely a proxy hiccup as a verdict.
            None => Err(SendError::Transient(format!("status {}: {}", status, body))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_transient(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient(StatusCode::REQUEST_TIMEOUT));
        assert!(!is_transient(StatusCode::CONFLICT));
        assert!(!is_transient(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_kind_prefers_body_code() {
        let reply = RemoteReply {
            status: Some("error".to_string()),
            code: Some("amount_mismatch".to_string()),
            message: None,
        };
        assert_eq!(
            reply.kind(StatusCode::CONFLICT),
            RejectionKind::AmountMismatch
        );
        assert_eq!(
            RemoteReply::default().kind(StatusCode::CONFLICT),
            RejectionKind::AlreadySettled
        );
        assert_eq!(
            RemoteReply::default().kind(StatusCode::BAD_REQUEST),
            RejectionKind::Other
        );
    }
}
