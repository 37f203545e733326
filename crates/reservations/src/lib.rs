use std::{sync::Arc, time::Duration};

use notifier::NotificationDispatcher;
use shared::{
    domain::{NotificationKind, Reservation},
    protocol::{NotificationReservation, Warning},
};
use storage::ReservationStore;
use thiserror::Error;
use tracing::warn;

pub mod cart;
pub mod catalog;
pub mod console;
pub mod feed;
pub mod form;
pub mod session;

pub use cart::Cart;
pub use catalog::MenuCatalog;
pub use console::{AdminConsole, ConsoleError, StatusChange};
pub use feed::ChangeFeed;
pub use form::{FormError, ReservationDraft, ReservationForm, Submission, ValidationError};
pub use session::Session;

pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn ReservationStore>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub feed: ChangeFeed,
    /// How long a write waits on its notification before moving on.
    pub notify_timeout: Duration,
}

impl ApiContext {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            store,
            notifier,
            feed: ChangeFeed::default(),
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    pub fn with_notify_timeout(mut self, notify_timeout: Duration) -> Self {
        self.notify_timeout = notify_timeout;
        self
    }
}

#[derive(Debug, Error)]
#[error("reservation store failed: {0:#}")]
pub struct StoreError(pub anyhow::Error);

/// Sends one notification. Failures are logged and handed back as a warning for
/// the caller to surface; they never undo the write that triggered them.
pub(crate) async fn notify_best_effort(
    ctx: &ApiContext,
    kind: NotificationKind,
    reservation: &Reservation,
) -> Option<Warning> {
    let snapshot = NotificationReservation::from(reservation);
    let sent = tokio::time::timeout(ctx.notify_timeout, ctx.notifier.notify(kind, &snapshot));
    match sent.await {
        Ok(Ok(())) => None,
        Ok(Err(error)) => {
            warn!(
                reservation_id = reservation.id.0,
                %kind,
                %error,
                "notification failed"
            );
            Some(Warning::NotificationFailed(format!(
                "{kind} email to {} was not sent: {error}",
                reservation.email
            )))
        }
        Err(_) => {
            warn!(
                reservation_id = reservation.id.0,
                %kind,
                timeout_ms = ctx.notify_timeout.as_millis() as u64,
                "notification timed out"
            );
            Some(Warning::NotificationFailed(format!(
                "{kind} email to {} was not sent: timed out after {:?}",
                reservation.email, ctx.notify_timeout
            )))
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
