#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use printshop_crm::{
    auth::UserProfile,
    build_router,
    config::AppConfig,
    db,
    entities::{articulo, user_profile, Sector, UserRole},
    services::pedidos::{CreatePedidoInput, NewPedidoItem, PedidoDetail},
    AppState,
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_SECRET: &str =
    "k7Rq2ZpX9vLm4TnB8wYc3HsD6fGj1QaE0uVo5NiK-printshop-crm-integration-signing-key";

/// Article with ten units on hand.
pub const VINILO_ID: i32 = 7;
/// Article at its reorder threshold.
pub const TINTA_ID: i32 = 8;
pub const CHAPA_ID: i32 = 9;

/// Seeded profiles, one per relevant role plus an inactive account.
pub struct Profiles {
    pub compras: UserProfile,
    pub admin: UserProfile,
    pub mostrador: UserProfile,
    pub taller: UserProfile,
    pub inactive: UserProfile,
}

/// Application state over a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub profiles: Profiles,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A second connection would see a different in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let state = AppState::new(db_arc, cfg);

        let profiles = Profiles {
            compras: seed_profile(&state, "u-compras", "Carla Compras", UserRole::Compras, true).await,
            admin: seed_profile(&state, "u-admin", "Ana Admin", UserRole::Administrador, true).await,
            mostrador: seed_profile(&state, "u-mostrador", "Mario Mostrador", UserRole::Mostrador, true).await,
            taller: seed_profile(&state, "u-taller", "Tomas Taller", UserRole::TallerGrafico, true).await,
            inactive: seed_profile(&state, "u-inactive", "Ines Inactiva", UserRole::Compras, false).await,
        };

        seed_articulo(&state, VINILO_ID, "VIN-001", "Vinilo blanco mate", Sector::Imprenta, 10, 2).await;
        seed_articulo(&state, TINTA_ID, "TIN-CY", "Tinta cyan eco-solvente", Sector::Imprenta, 3, 3).await;
        seed_articulo(&state, CHAPA_ID, "CHP-18", "Chapa galvanizada 18", Sector::Taller, 40, 5).await;

        let router = build_router(state.clone());

        Self {
            router,
            state,
            profiles,
        }
    }

    pub fn token_for(&self, profile: &UserProfile) -> String {
        self.state
            .auth
            .issue_token(profile)
            .expect("issue test token")
            .access_token
    }

    /// Creates a pedido for `requester` through the service layer.
    pub async fn create_pedido(
        &self,
        requester: &UserProfile,
        items: &[(i32, i32)],
    ) -> PedidoDetail {
        self.state
            .services
            .pedidos
            .create_pedido(
                CreatePedidoInput {
                    description: "Cartel frente local".to_string(),
                    items: items
                        .iter()
                        .map(|&(articulo_id, cantidad)| NewPedidoItem {
                            articulo_id,
                            cantidad,
                        })
                        .collect(),
                    client_name: Some("Panaderia La Espiga".to_string()),
                    ..Default::default()
                },
                Some(requester),
            )
            .await
            .expect("create pedido")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_as(
        &self,
        profile: &UserProfile,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        let token = self.token_for(profile);
        self.request(method, uri, body, Some(&token)).await
    }

    /// Sends `body` verbatim as `application/json`, for malformed payloads.
    pub async fn request_raw_as(
        &self,
        profile: &UserProfile,
        method: Method,
        uri: &str,
        body: &'static str,
    ) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", self.token_for(profile)))
            .header("content-type", "application/json")
            .body(Body::from(body))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

async fn seed_profile(
    state: &AppState,
    id: &str,
    nombre: &str,
    role: UserRole,
    activo: bool,
) -> UserProfile {
    let now = Utc::now();
    user_profile::ActiveModel {
        id: Set(id.to_string()),
        email: Set(format!("{}@printshop.test", id)),
        nombre: Set(nombre.to_string()),
        role: Set(role),
        activo: Set(activo),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*state.db)
    .await
    .expect("seed user profile")
}

async fn seed_articulo(
    state: &AppState,
    id: i32,
    codigo: &str,
    descripcion: &str,
    sector: Sector,
    stock: i32,
    stock_minimo: i32,
) -> articulo::Model {
    let now = Utc::now();
    articulo::ActiveModel {
        id: Set(id),
        codigo: Set(codigo.to_string()),
        descripcion: Set(descripcion.to_string()),
        sector: Set(sector),
        imagen: Set(None),
        stock: Set(stock),
        stock_minimo: Set(stock_minimo),
        precio: Set(dec!(1250.00)),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*state.db)
    .await
    .expect("seed articulo")
}
