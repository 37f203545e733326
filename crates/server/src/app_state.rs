use reservations::ApiContext;
use storage::Storage;

use crate::auth::AuthConfig;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) ctx: ApiContext,
    /// Same database as `ctx.store`; used for admin sign-in and health checks.
    pub(crate) storage: Storage,
    pub(crate) auth: AuthConfig,
    pub(crate) require_seating_area: bool,
}
