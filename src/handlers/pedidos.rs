use super::common::{
    created_response, no_content_response, not_found, success_response, validate_input,
};
use crate::{
    auth::CurrentUser,
    entities::ApprovalStatus,
    errors::ServiceError,
    handlers::AppState,
    services::pedidos::{CreatePedidoInput, NewPedidoItem, UpdatePedidoInput},
};
use axum::{
    body::Bytes,
    extract::{Json, Path, Query, State},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreatePedidoRequest {
    #[validate(length(min = 1, max = 2000, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<PedidoItemRequest>,
    #[validate(length(max = 200))]
    pub client_name: Option<String>,
    #[validate(length(max = 1000))]
    pub image_url: Option<String>,
    pub cliente_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PedidoItemRequest {
    pub articulo_id: i32,
    pub cantidad: i32,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePedidoRequest {
    #[validate(length(max = 200))]
    pub client_name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 1000))]
    pub image_url: Option<String>,
    #[validate(length(max = 50))]
    pub status: Option<String>,
    pub cliente_id: Option<String>,
    /// Version the client last read; a stale value is refused with 409.
    pub version: Option<i32>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct ApprovePedidoRequest {
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RejectPedidoRequest {
    #[validate(length(min = 1, max = 500, message = "Rejection reason is required"))]
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 2000, message = "Comment content is required"))]
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListPedidosQuery {
    /// Pendiente, Aprobado, Rechazado, or "all"
    pub approval_status: Option<String>,
}

fn parse_approval_filter(raw: Option<&str>) -> Result<Option<ApprovalStatus>, ServiceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => ApprovalStatus::from_str(s).map(Some).map_err(|_| {
            ServiceError::validation(format!(
                "Unknown approval_status '{}'; expected Pendiente, Aprobado or Rechazado",
                s
            ))
        }),
    }
}

/// List pedidos, newest first
pub async fn list_pedidos(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ListPedidosQuery>,
) -> Result<Response, ServiceError> {
    let filter = parse_approval_filter(query.approval_status.as_deref())?;
    let pedidos = state.services.pedidos.list_pedidos(filter).await?;
    Ok(success_response(pedidos))
}

/// Create a pedido with its items
pub async fn create_pedido(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreatePedidoRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;

    let input = CreatePedidoInput {
        description: payload.description,
        items: payload
            .items
            .into_iter()
            .map(|i| NewPedidoItem {
                articulo_id: i.articulo_id,
                cantidad: i.cantidad,
            })
            .collect(),
        client_name: payload.client_name,
        image_url: payload.image_url,
        cliente_id: payload.cliente_id,
    };

    let detail = state
        .services
        .pedidos
        .create_pedido(input, Some(&user))
        .await?;

    info!(pedido_id = detail.pedido.id, user_id = %user.id, "pedido created via API");
    Ok(created_response(detail))
}

pub async fn get_pedido(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    let detail = state
        .services
        .pedidos
        .get_pedido(id)
        .await?
        .ok_or_else(|| not_found("Pedido", id))?;
    Ok(success_response(detail))
}

pub async fn update_pedido(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdatePedidoRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;

    let changes = UpdatePedidoInput {
        client_name: payload.client_name,
        description: payload.description,
        image_url: payload.image_url,
        status: payload.status,
        cliente_id: payload.cliente_id,
        version: payload.version,
    };
    let updated = state
        .services
        .pedidos
        .update_pedido(id, changes, &user)
        .await?
        .ok_or_else(|| not_found("Pedido", id))?;
    Ok(success_response(updated))
}

pub async fn delete_pedido(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    if state.services.pedidos.delete_pedido(id, &user).await? {
        Ok(no_content_response())
    } else {
        Err(not_found("Pedido", id))
    }
}

pub async fn get_pedido_items(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    let items = state.services.pedidos.get_pedido_items(id).await?;
    Ok(success_response(items))
}

/// An empty body means "no comment". Anything else must be a valid request.
fn parse_approve_body(body: &[u8]) -> Result<ApprovePedidoRequest, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ApprovePedidoRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ServiceError::validation(format!("Invalid approve body: {e}")))
}

/// Approve a pending pedido. The body is optional.
pub async fn approve_pedido(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
    body: Bytes,
) -> Result<Response, ServiceError> {
    let payload = parse_approve_body(&body)?;
    validate_input(&payload)?;

    let pedido = state
        .services
        .pedidos
        .approve_pedido(id, &user, payload.comment)
        .await?
        .ok_or_else(|| not_found("Pedido", id))?;
    Ok(success_response(pedido))
}

pub async fn reject_pedido(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<RejectPedidoRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;

    let pedido = state
        .services
        .pedidos
        .reject_pedido(id, &payload.reason, &user)
        .await?
        .ok_or_else(|| not_found("Pedido", id))?;
    Ok(success_response(pedido))
}

pub async fn list_comments(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    let comments = state.services.pedidos.list_comments(id).await?;
    Ok(success_response(comments))
}

pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<CommentRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;

    let comment = state
        .services
        .pedidos
        .add_comment(id, Some(&user), &payload.content)
        .await?
        .ok_or_else(|| not_found("Pedido", id))?;
    Ok(created_response(comment))
}

pub fn pedido_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_pedidos).post(create_pedido))
        .route(
            "/:id",
            get(get_pedido).put(update_pedido).delete(delete_pedido),
        )
        .route("/:id/items", get(get_pedido_items))
        .route("/:id/approve", post(approve_pedido))
        .route("/:id/reject", post(reject_pedido))
        .route("/:id/comments", get(list_comments).post(add_comment))
}
