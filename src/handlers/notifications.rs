use super::common::{not_found, success_response};
use crate::{
    auth::{can_approve, CurrentUser, UserProfile},
    errors::ServiceError,
    handlers::AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

/// Which notifications a request looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationScope {
    /// Only notifications addressed to the caller
    #[default]
    Mine,
    /// Everything, broadcasts included. Approvers only.
    All,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default)]
    pub scope: NotificationScope,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    #[serde(default)]
    pub scope: NotificationScope,
}

/// Maps a scope to the user filter the dispatcher understands.
fn resolve_scope(user: &UserProfile, scope: NotificationScope) -> Result<Option<String>, ServiceError> {
    match scope {
        NotificationScope::Mine => Ok(Some(user.id.clone())),
        NotificationScope::All if can_approve(Some(user)) => Ok(None),
        NotificationScope::All => Err(ServiceError::Forbidden(
            "Only approvers can read every notification".to_string(),
        )),
    }
}

pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Response, ServiceError> {
    let user_id = resolve_scope(&user, query.scope)?;
    let notifications = state
        .services
        .notifications
        .list(user_id.as_deref(), query.unread_only)
        .await?;
    Ok(success_response(notifications))
}

pub async fn unread_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ScopeQuery>,
) -> Result<Response, ServiceError> {
    let user_id = resolve_scope(&user, query.scope)?;
    let count = state
        .services
        .notifications
        .unread_count(user_id.as_deref())
        .await?;
    Ok(success_response(json!({ "count": count })))
}

/// Marks one notification as read. Broadcasts and other users' notifications need the approver role.
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    let notifications = &state.services.notifications;
    let notification = notifications
        .get(id)
        .await?
        .ok_or_else(|| not_found("Notification", id))?;

    // Broadcasts share one read flag across all approvers.
    let addressed_elsewhere = notification
        .user_id
        .as_deref()
        .map_or(true, |owner| owner != user.id);
    if addressed_elsewhere && !can_approve(Some(&user)) {
        return Err(ServiceError::Forbidden(
            "Notification belongs to another user".to_string(),
        ));
    }

    if !notifications.mark_read(id).await? {
        return Err(not_found("Notification", id));
    }
    Ok(success_response(json!({ "id": id, "is_read": true })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ScopeQuery>,
) -> Result<Response, ServiceError> {
    let user_id = resolve_scope(&user, query.scope)?;
    let updated = state
        .services
        .notifications
        .mark_all_read(user_id.as_deref())
        .await?;
    Ok(success_response(json!({ "updated": updated })))
}

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/:id/read", post(mark_read))
}
