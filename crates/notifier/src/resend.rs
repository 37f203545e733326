use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use shared::{domain::NotificationKind, protocol::NotificationReservation};
use tracing::{debug, warn};

use crate::{recipient, render, DispatchError, NotificationDispatcher};

pub const RESEND_API_URL: &str = "https://api.resend.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ResendConfig {
    pub api_key: String,
    pub base_url: String,
    /// Sender line, e.g. `Bokaap Deli <onboarding@resend.dev>`.
    pub from: String,
    pub restaurant_name: String,
    /// Upper bound for one provider call, connect through response body.
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Sends notifications through the Resend HTTP API.
pub struct ResendDispatcher {
    client: Client,
    config: ResendConfig,
}

impl ResendDispatcher {
    pub fn new(config: ResendConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl NotificationDispatcher for ResendDispatcher {
    async fn notify(
        &self,
        kind: NotificationKind,
        reservation: &NotificationReservation,
    ) -> Result<(), DispatchError> {
        let to = recipient(reservation)?;
        let content = render(kind, reservation, &self.config.restaurant_name);

        let response = self
            .client
            .post(format!(
                "{}/emails",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .json(&SendEmailRequest {
                from: &self.config.from,
                to: [to],
                subject: &content.subject,
                html: &content.html,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%kind, status = status.as_u16(), %body, "email provider rejected notification");
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(%kind, %to, "notification email accepted");
        Ok(())
    }
}
