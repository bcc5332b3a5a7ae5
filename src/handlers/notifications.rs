use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::middleware::auth::{authenticate, AuthUser};
use crate::models::Notification;
use crate::state::AppState;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

// GET /api/notifications
#[derive(Deserialize)]
pub struct NotificationsQuery {
    pub limit: Option<i64>,
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<NotificationsQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let notifications = {
        let db = state.db()?;
        queries::list_notifications(&db, &user.id, limit)?
    };
    Ok(Json(notifications))
}

// POST /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let updated = {
        let db = state.db()?;
        queries::mark_notification_read(&db, &user.id, id)?
    };

    if !updated {
        return Err(AppError::NotFound("notification".to_string()));
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

// POST /api/notifications/read-all
#[derive(Serialize)]
pub struct ReadAllResponse {
    updated: usize,
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<ReadAllResponse>> {
    let updated = {
        let db = state.db()?;
        queries::mark_all_notifications_read(&db, &user.id)?
    };
    Ok(Json(ReadAllResponse { updated }))
}

// GET /api/notifications/events (SSE)
#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
    pub last_id: Option<i64>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> AppResult<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>> {
    // EventSource can't set headers, so the token rides in the query string.
    let token = query.token.as_deref().ok_or(AppError::Unauthorized)?;
    let user = authenticate(&state, token)?;

    // Subscribe before the catch-up read so nothing falls in between.
    let rx = state.notifications_tx.subscribe();
    let last_id = query.last_id.unwrap_or(0);
    let catchup = {
        let db = state.db()?;
        queries::get_notifications_since(&db, &user.id, last_id)?
    };
    let replayed_up_to = catchup.last().map_or(last_id, |n| n.id);

    tracing::info!(user_id = %user.id, last_id, replayed = catchup.len(), "notification stream opened");

    let catchup_stream =
        tokio_stream::iter(catchup.into_iter().map(|n| Ok::<_, Infallible>(to_event(&n))));

    let user_id = user.id;
    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(n) if n.user_id == user_id && n.id > replayed_up_to => Some(Ok(to_event(&n))),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "notification stream lagged");
            None
        }
    });

    let keepalive_stream = IntervalStream::new(tokio::time::interval(KEEPALIVE_INTERVAL))
        .map(|_| Ok(Event::default().comment("keepalive")));

    let merged = catchup_stream.chain(live_stream).merge(keepalive_stream);
    Ok(Sse::new(merged))
}

fn to_event(notification: &Notification) -> Event {
    let data = serde_json::to_string(notification).unwrap_or_default();
    Event::default()
        .id(notification.id.to_string())
        .event("notification")
        .data(data)
}
