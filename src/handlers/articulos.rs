use super::common::{not_found, success_response};
use crate::{auth::CurrentUser, entities::Sector, errors::ServiceError, handlers::AppState};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ArticuloQuery {
    pub sector: Option<Sector>,
    pub search: Option<String>,
}

pub async fn list_articulos(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ArticuloQuery>,
) -> Result<Response, ServiceError> {
    let articulos = state
        .services
        .articulos
        .list(query.sector, query.search.as_deref())
        .await?;
    Ok(success_response(articulos))
}

pub async fn get_articulo(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    let articulo = state
        .services
        .articulos
        .get(id)
        .await?
        .ok_or_else(|| not_found("Articulo", id))?;
    Ok(success_response(articulo))
}

pub async fn low_stock(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Response, ServiceError> {
    let articulos = state.services.articulos.low_stock().await?;
    Ok(success_response(articulos))
}

pub fn articulo_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_articulos))
        .route("/low-stock", get(low_stock))
        .route("/:id", get(get_articulo))
}
