//! Transactional email for reservation lifecycle events.
//!
//! Every caller treats a [`DispatchError`] as non-fatal: the lifecycle
//! transition that triggered a notification has already been stored.

use async_trait::async_trait;
use shared::{domain::NotificationKind, protocol::NotificationReservation};
use thiserror::Error;
use tracing::info;

pub mod email;
mod resend;

pub use email::{render, EmailContent};
pub use resend::{ResendConfig, ResendDispatcher, DEFAULT_REQUEST_TIMEOUT, RESEND_API_URL};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("reservation has no recipient email address")]
    MissingRecipient,
    #[error("email request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("email provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(
        &self,
        kind: NotificationKind,
        reservation: &NotificationReservation,
    ) -> Result<(), DispatchError>;
}

/// Renders the email and writes it to the log instead of sending it. Used when
/// no email provider is configured.
pub struct LogDispatcher {
    restaurant_name: String,
}

impl LogDispatcher {
    pub fn new(restaurant_name: impl Into<String>) -> Self {
        Self {
            restaurant_name: restaurant_name.into(),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn notify(
        &self,
        kind: NotificationKind,
        reservation: &NotificationReservation,
    ) -> Result<(), DispatchError> {
        let recipient = recipient(reservation)?;
        let content = render(kind, reservation, &self.restaurant_name);
        info!(
            %kind,
            to = %recipient,
            subject = %content.subject,
            "email delivery disabled; notification logged only"
        );
        Ok(())
    }
}

pub(crate) fn recipient(reservation: &NotificationReservation) -> Result<&str, DispatchError> {
    let email = reservation.email.trim();
    if email.is_empty() {
        return Err(DispatchError::MissingRecipient);
    }
    Ok(email)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
