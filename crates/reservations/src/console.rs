use shared::{
    domain::{NotificationKind, Reservation, ReservationId, ReservationStatus},
    protocol::{ReservationDetail, ServerEvent, Warning},
};
use storage::StatusWrite;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};

use crate::{catalog::MenuCatalog, notify_best_effort, session::Session, ApiContext, StoreError};

#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The session is missing or expired; the operator has to sign in again.
    #[error("sign-in required")]
    SignInRequired,
    #[error("reservation {0} not found")]
    NotFound(ReservationId),
    #[error("cannot change a {from} reservation to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
    #[error("reservation {id} was changed to {current} by someone else")]
    Conflict {
        id: ReservationId,
        current: ReservationStatus,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct StatusChange {
    pub reservation: Reservation,
    /// False when the reservation already had the requested status.
    pub changed: bool,
    pub warnings: Vec<Warning>,
}

/// The operator's view of all reservations.
///
/// Holds a cached list that is patched with the store's answer after each
/// status write and re-fetched wholesale on change-feed notifications.
pub struct AdminConsole {
    ctx: ApiContext,
    session: Session,
    reservations: Vec<Reservation>,
    changes: Option<broadcast::Receiver<ServerEvent>>,
}

impl AdminConsole {
    pub fn new(ctx: ApiContext, session: Session) -> Self {
        Self {
            ctx,
            session,
            reservations: Vec::new(),
            changes: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Cached list as of the last fetch or patch.
    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    pub fn sign_out(self) {
        info!(username = %self.session.username(), "operator signed out");
    }

    fn authorize(&self) -> Result<(), ConsoleError> {
        if !self.session.is_active() {
            debug!(username = %self.session.username(), "admin session expired");
            return Err(ConsoleError::SignInRequired);
        }
        Ok(())
    }

    pub async fn list_reservations(&mut self) -> Result<&[Reservation], ConsoleError> {
        self.authorize()?;
        self.reservations = self.ctx.store.list().await.map_err(StoreError)?;
        Ok(&self.reservations)
    }

    pub async fn view_details(&self, id: ReservationId) -> Result<ReservationDetail, ConsoleError> {
        self.authorize()?;
        let reservation = self
            .ctx
            .store
            .get(id)
            .await
            .map_err(StoreError)?
            .ok_or(ConsoleError::NotFound(id))?;
        let catalog = MenuCatalog::load(self.ctx.store.as_ref()).await?;
        Ok(catalog.detail(reservation))
    }

    /// Moves a pending reservation to confirmed or cancelled.
    ///
    /// Re-applying the current status succeeds without writing or notifying.
    /// A failed notification is returned as a warning; the write stands.
    pub async fn set_status(
        &mut self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<StatusChange, ConsoleError> {
        self.authorize()?;

        let current = self
            .ctx
            .store
            .get(id)
            .await
            .map_err(StoreError)?
            .ok_or(ConsoleError::NotFound(id))?;

        if current.status == status {
            self.patch(&current);
            return Ok(StatusChange {
                reservation: current,
                changed: false,
                warnings: Vec::new(),
            });
        }
        if current.status.is_terminal() || status == ReservationStatus::Pending {
            return Err(ConsoleError::InvalidTransition {
                from: current.status,
                to: status,
            });
        }

        let reservation = match self
            .ctx
            .store
            .update_status(id, current.status, status)
            .await
            .map_err(StoreError)?
        {
            StatusWrite::Applied(reservation) => reservation,
            StatusWrite::Conflict(now) => {
                self.patch(&now);
                return Err(ConsoleError::Conflict {
                    id,
                    current: now.status,
                });
            }
            StatusWrite::NotFound => return Err(ConsoleError::NotFound(id)),
        };

        info!(
            reservation_id = id.0,
            from = %current.status,
            to = %status,
            operator = %self.session.username(),
            "reservation status changed"
        );

        let mut warnings = Vec::new();
        if let Some(kind) = NotificationKind::for_status(status) {
            warnings.extend(notify_best_effort(&self.ctx, kind, &reservation).await);
        }
        self.ctx.feed.publish(ServerEvent::ReservationStatusChanged {
            reservation_id: id,
            status,
        });
        self.patch(&reservation);

        Ok(StatusChange {
            reservation,
            changed: true,
            warnings,
        })
    }

    fn patch(&mut self, reservation: &Reservation) {
        if let Some(cached) = self
            .reservations
            .iter_mut()
            .find(|cached| cached.id == reservation.id)
        {
            *cached = reservation.clone();
        }
    }

    /// Subscribes to the change feed. Mounting twice keeps the first subscription.
    pub fn mount(&mut self) {
        if self.changes.is_none() {
            self.changes = Some(self.ctx.feed.subscribe());
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.changes.is_some()
    }

    pub fn unmount(&mut self) {
        self.changes = None;
    }

    /// Waits for the next reservation change and re-lists.
    ///
    /// Returns `Ok(None)` when the console is not mounted or the feed has shut
    /// down; the console is unmounted in the latter case.
    pub async fn next_change(&mut self) -> Result<Option<&[Reservation]>, ConsoleError> {
        self.authorize()?;
        let Some(changes) = self.changes.as_mut() else {
            return Ok(None);
        };

        loop {
            match changes.recv().await {
                Ok(ServerEvent::ReservationCreated { .. })
                | Ok(ServerEvent::ReservationStatusChanged { .. }) => break,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "change feed lagged; refreshing");
                    break;
                }
                // Only reachable once every publisher is gone.
                Err(RecvError::Closed) => {
                    self.changes = None;
                    return Ok(None);
                }
            }
        }

        self.list_reservations().await.map(Some)
    }
}
