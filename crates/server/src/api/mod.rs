use std::sync::Arc;

use anyhow::Context;
use axum::{
    async_trait,
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket},
        FromRequestParts, Path, Query, State, WebSocketUpgrade,
    },
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    middleware,
    response::Response,
    routing::{get, patch, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use reservations::{
    AdminConsole, ConsoleError, FormError, MenuCatalog, ReservationForm, Session, StoreError,
};
use serde::Deserialize;
use shared::{
    domain::{MenuItem, Reservation, ReservationId, ReservationStatus},
    error::{ApiError, ErrorCode},
    protocol::{
        CreateReservationRequest, CreateReservationResponse, LoginRequest, MeResponse,
        NotificationRequest, ReservationDetail, ServerEvent, StatusUpdateRequest,
        StatusUpdateResponse, TokenResponse,
    },
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::{debug, error, info, warn};

use crate::{
    app_state::AppState,
    auth::{bearer_token, mint_token, verify_token, AuthError},
};

pub(crate) type ApiFailure = (StatusCode, Json<ApiError>);

const MAX_BODY_BYTES: usize = 64 * 1024;

pub(crate) fn build_router(
    state: Arc<AppState>,
    cors_origin: Option<&str>,
) -> anyhow::Result<Router> {
    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/token", post(issue_token))
        .route("/users/me", get(current_user))
        .route("/menu", get(list_menu))
        .route("/reservations", post(create_reservation).get(list_reservations))
        .route("/reservations/:id", get(reservation_detail))
        .route("/reservations/:id/status", patch(update_status))
        .route("/notifications", post(send_notification))
        .route("/admin/feed", get(admin_feed))
        .layer(middleware::map_response(challenge_unauthorized))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    if let Some(origin) = cors_origin {
        let origin: HeaderValue = origin
            .parse()
            .with_context(|| format!("invalid CORS origin '{origin}'"))?;
        router = router.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::PATCH])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        );
    }

    Ok(router.with_state(state))
}

/// Every 401 tells the client to sign in again with a bearer token.
async fn challenge_unauthorized(mut response: Response) -> Response {
    if response.status() == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}

fn failure(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> ApiFailure {
    (status, Json(ApiError::new(code, message)))
}

/// Bodies that do not decode into the request type are validation errors,
/// except for transport problems such as an oversized body.
fn body_failure(rejection: JsonRejection) -> ApiFailure {
    let status = match &rejection {
        JsonRejection::BytesRejection(_) => rejection.status(),
        _ => StatusCode::BAD_REQUEST,
    };
    let message = rejection.body_text();
    debug!(%status, %message, "rejected request body");
    failure(status, ErrorCode::Validation, message)
}

fn unauthorized(err: AuthError) -> ApiFailure {
    debug!(error = %err, "rejected admin request");
    failure(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, err.to_string())
}

fn store_failure(err: StoreError) -> ApiFailure {
    error!(error = %err, "reservation store failed");
    failure(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::Internal,
        "reservation store is unavailable",
    )
}

fn form_failure(err: FormError) -> ApiFailure {
    match err {
        FormError::Validation(err) => {
            failure(StatusCode::BAD_REQUEST, ErrorCode::Validation, err.to_string())
        }
        FormError::Store(err) => store_failure(err),
    }
}

fn console_failure(err: ConsoleError) -> ApiFailure {
    match err {
        ConsoleError::SignInRequired => {
            failure(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, err.to_string())
        }
        ConsoleError::NotFound(_) => {
            failure(StatusCode::NOT_FOUND, ErrorCode::NotFound, err.to_string())
        }
        ConsoleError::InvalidTransition { .. } | ConsoleError::Conflict { .. } => {
            failure(StatusCode::CONFLICT, ErrorCode::Conflict, err.to_string())
        }
        ConsoleError::Store(err) => store_failure(err),
    }
}

/// A verified bearer token, turned into the operator's session.
pub(crate) struct AdminSession(pub(crate) Session);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminSession {
    type Rejection = ApiFailure;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).map_err(unauthorized)?;
        verify_token(&state.auth, token)
            .map(AdminSession)
            .map_err(unauthorized)
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, ApiFailure> {
    state.storage.health_check().await.map_err(|e| {
        error!(error = %e, "health check failed");
        failure(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal,
            "database unavailable",
        )
    })?;
    Ok("ok")
}

async fn issue_token(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiFailure> {
    let Json(req) = body.map_err(body_failure)?;
    let verified = state
        .storage
        .verify_admin(req.username.trim(), &req.password)
        .await
        .map_err(|e| store_failure(StoreError(e)))?;
    if !verified {
        warn!(username = %req.username, "failed admin sign-in");
        return Err(failure(
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "incorrect username or password",
        ));
    }

    let issued = mint_token(&state.auth, req.username.trim()).map_err(|e| {
        error!(error = %e, "failed to mint token");
        failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Internal,
            "could not issue token",
        )
    })?;
    info!(username = %req.username.trim(), "admin signed in");
    Ok(Json(TokenResponse {
        access_token: issued.token,
        token_type: "bearer".to_string(),
        expires_at: issued.expires_at,
    }))
}

async fn current_user(AdminSession(session): AdminSession) -> Json<MeResponse> {
    Json(MeResponse {
        username: session.username().to_string(),
        expires_at: session.expires_at(),
    })
}

#[derive(Debug, Deserialize)]
struct MenuQuery {
    order: Option<String>,
}

async fn list_menu(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MenuQuery>,
) -> Result<Json<Vec<MenuItem>>, ApiFailure> {
    let catalog = MenuCatalog::load(state.ctx.store.as_ref())
        .await
        .map_err(store_failure)?;
    match q.order.as_deref() {
        None => Ok(Json(catalog.items().to_vec())),
        Some("category") => Ok(Json(catalog.by_category())),
        Some(other) => Err(failure(
            StatusCode::BAD_REQUEST,
            ErrorCode::Validation,
            format!("unknown menu order '{other}'"),
        )),
    }
}

async fn create_reservation(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateReservationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateReservationResponse>), ApiFailure> {
    let Json(req) = body.map_err(body_failure)?;
    let catalog = MenuCatalog::load(state.ctx.store.as_ref())
        .await
        .map_err(store_failure)?;
    let mut form = ReservationForm::from_request(catalog, req)
        .map_err(|e| form_failure(e.into()))?
        .require_seating_area(state.require_seating_area);
    let submission = form.submit(&state.ctx).await.map_err(form_failure)?;
    Ok((
        StatusCode::CREATED,
        Json(CreateReservationResponse {
            reservation: submission.reservation,
            warnings: submission.warnings,
        }),
    ))
}

async fn list_reservations(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
) -> Result<Json<Vec<Reservation>>, ApiFailure> {
    let mut console = AdminConsole::new(state.ctx.clone(), session);
    let reservations = console
        .list_reservations()
        .await
        .map_err(console_failure)?
        .to_vec();
    Ok(Json(reservations))
}

async fn reservation_detail(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
    Path(id): Path<i64>,
) -> Result<Json<ReservationDetail>, ApiFailure> {
    let console = AdminConsole::new(state.ctx.clone(), session);
    let detail = console
        .view_details(ReservationId(id))
        .await
        .map_err(console_failure)?;
    Ok(Json(detail))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
    Path(id): Path<i64>,
    body: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<StatusUpdateResponse>, ApiFailure> {
    let Json(req) = body.map_err(body_failure)?;
    if req.status == ReservationStatus::Pending {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            ErrorCode::Validation,
            "status must be confirmed or cancelled",
        ));
    }
    let mut console = AdminConsole::new(state.ctx.clone(), session);
    let change = console
        .set_status(ReservationId(id), req.status)
        .await
        .map_err(console_failure)?;
    Ok(Json(StatusUpdateResponse {
        reservation: change.reservation,
        changed: change.changed,
        warnings: change.warnings,
    }))
}

async fn send_notification(
    State(state): State<Arc<AppState>>,
    AdminSession(_): AdminSession,
    body: Result<Json<NotificationRequest>, JsonRejection>,
) -> Result<StatusCode, ApiFailure> {
    let Json(req) = body.map_err(body_failure)?;
    state
        .ctx
        .notifier
        .notify(req.kind, &req.reservation)
        .await
        .map_err(|e| {
            warn!(kind = %req.kind, error = %e, "notification request failed");
            failure(StatusCode::BAD_GATEWAY, ErrorCode::Upstream, e.to_string())
        })?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    token: String,
}

async fn admin_feed(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(q): Query<FeedQuery>,
) -> Result<Response, ApiFailure> {
    let session = verify_token(&state.auth, &q.token).map_err(unauthorized)?;
    let console = AdminConsole::new(state.ctx.clone(), session);
    Ok(ws.on_upgrade(move |socket| feed_connection(console, socket)))
}

/// Pushes the full reservation list on connect and after every change until
/// the client goes away or the session runs out.
async fn feed_connection(mut console: AdminConsole, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    console.mount();
    let username = console.session().username().to_string();
    info!(%username, "admin feed connected");

    let send_task = tokio::spawn(async move {
        let mut next = console.list_reservations().await.map(|list| Some(list.to_vec()));
        loop {
            let event = match next {
                Ok(Some(reservations)) => ServerEvent::ReservationsListed { reservations },
                Ok(None) => break,
                Err(err) => {
                    let (_, Json(api_error)) = console_failure(err);
                    send_event(&mut sender, &ServerEvent::Error(api_error)).await;
                    break;
                }
            };
            if !send_event(&mut sender, &event).await {
                break;
            }
            next = console
                .next_change()
                .await
                .map(|list| list.map(<[Reservation]>::to_vec));
        }
        console.sign_out();
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
    info!(%username, "admin feed disconnected");
}

/// False once the client can no longer be written to.
async fn send_event<S>(sender: &mut S, event: &ServerEvent) -> bool
where
    S: futures::Sink<Message> + Unpin,
{
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, "failed to encode feed event");
            return true;
        }
    };
    sender.send(Message::Text(text)).await.is_ok()
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
