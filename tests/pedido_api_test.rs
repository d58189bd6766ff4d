//! HTTP-level tests: authentication, role checks and status mapping.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp, TINTA_ID, VINILO_ID};
use serde_json::json;

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["checks"]["database"], "healthy");
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/pedidos", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/api/v1/pedidos", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn inactive_profiles_are_rejected() {
    let app = TestApp::new().await;
    let response = app
        .request_as(&app.profiles.inactive, Method::GET, "/api/v1/pedidos", None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_then_approve_over_http() {
    let app = TestApp::new().await;

    let response = app
        .request_as(
            &app.profiles.mostrador,
            Method::POST,
            "/api/v1/pedidos",
            Some(json!({
                "description": "Vinyl stock",
                "items": [{ "articulo_id": VINILO_ID, "cantidad": 3 }]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["approval_status"], "Pendiente");
    assert_eq!(body["data"]["numero"], "PED-00001");
    assert_eq!(body["data"]["items"][0]["stock_disponible"], 10);
    let id = body["data"]["id"].as_i64().expect("pedido id");

    let response = app
        .request_as(
            &app.profiles.compras,
            Method::POST,
            &format!("/api/v1/pedidos/{id}/approve"),
            Some(json!({ "comment": "ok" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["approval_status"], "Aprobado");
    assert_eq!(body["data"]["approved_by"], "u-compras");

    let response = app
        .request_as(
            &app.profiles.compras,
            Method::GET,
            &format!("/api/v1/pedidos/{id}/comments"),
            None,
        )
        .await;
    let body = response_json(response).await;
    let content = body["data"][0]["content"].as_str().unwrap_or_default();
    assert!(content.contains("ok"));
}

#[tokio::test]
async fn approve_without_body_is_accepted() {
    let app = TestApp::new().await;
    let created = app.create_pedido(&app.profiles.mostrador, &[(VINILO_ID, 1)]).await;

    let response = app
        .request_as(
            &app.profiles.admin,
            Method::POST,
            &format!("/api/v1/pedidos/{}/approve", created.pedido.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_approve_body_is_rejected_without_deciding() {
    let app = TestApp::new().await;
    let created = app.create_pedido(&app.profiles.mostrador, &[(VINILO_ID, 1)]).await;
    let uri = format!("/api/v1/pedidos/{}/approve", created.pedido.id);

    let response = app
        .request_raw_as(&app.profiles.compras, Method::POST, &uri, r#"{"comment": "ok""#)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request_as(
            &app.profiles.compras,
            Method::GET,
            &format!("/api/v1/pedidos/{}", created.pedido.id),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["approval_status"], "Pendiente");
    assert_eq!(body["data"]["version"], 1);
}

#[tokio::test]
async fn edit_with_stale_version_is_a_conflict() {
    let app = TestApp::new().await;
    let created = app.create_pedido(&app.profiles.mostrador, &[(VINILO_ID, 1)]).await;
    let uri = format!("/api/v1/pedidos/{}", created.pedido.id);

    let first = app
        .request_as(
            &app.profiles.mostrador,
            Method::PUT,
            &uri,
            Some(json!({ "description": "Lona 2x1", "version": 1 })),
        )
        .await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(response_json(first).await["data"]["version"], 2);

    // Second editor still holds version 1.
    let second = app
        .request_as(
            &app.profiles.taller,
            Method::PUT,
            &uri,
            Some(json!({ "description": "Lona 3x1", "version": 1 })),
        )
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let response = app.request_as(&app.profiles.taller, Method::GET, &uri, None).await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["description"], "Lona 2x1");
    assert_eq!(body["data"]["version"], 2);
}

#[tokio::test]
async fn decision_status_codes() {
    let app = TestApp::new().await;
    let created = app.create_pedido(&app.profiles.mostrador, &[(TINTA_ID, 1)]).await;
    let reject_uri = format!("/api/v1/pedidos/{}/reject", created.pedido.id);

    let forbidden = app
        .request_as(
            &app.profiles.mostrador,
            Method::POST,
            &reject_uri,
            Some(json!({ "reason": "No" })),
        )
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let blank = app
        .request_as(
            &app.profiles.compras,
            Method::POST,
            &reject_uri,
            Some(json!({ "reason": "   " })),
        )
        .await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let rejected = app
        .request_as(
            &app.profiles.compras,
            Method::POST,
            &reject_uri,
            Some(json!({ "reason": "Sin stock" })),
        )
        .await;
    assert_eq!(rejected.status(), StatusCode::OK);
    let body = response_json(rejected).await;
    assert_eq!(body["data"]["rejection_reason"], "Sin stock");

    let again = app
        .request_as(
            &app.profiles.admin,
            Method::POST,
            &format!("/api/v1/pedidos/{}/approve", created.pedido.id),
            None,
        )
        .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let missing = app
        .request_as(
            &app.profiles.admin,
            Method::POST,
            "/api/v1/pedidos/4040/reject",
            Some(json!({ "reason": "No existe" })),
        )
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_items_is_bad_request() {
    let app = TestApp::new().await;
    let response = app
        .request_as(
            &app.profiles.mostrador,
            Method::POST,
            "/api/v1/pedidos",
            Some(json!({ "description": "Nada", "items": [] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let list = app
        .request_as(&app.profiles.mostrador, Method::GET, "/api/v1/pedidos", None)
        .await;
    let body = response_json(list).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn delete_returns_no_content_then_not_found() {
    let app = TestApp::new().await;
    let created = app.create_pedido(&app.profiles.mostrador, &[(VINILO_ID, 1)]).await;
    let uri = format!("/api/v1/pedidos/{}", created.pedido.id);

    let response = app
        .request_as(&app.profiles.admin, Method::DELETE, &uri, None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request_as(&app.profiles.admin, Method::GET, &uri, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let items = app
        .request_as(&app.profiles.admin, Method::GET, &format!("{uri}/items"), None)
        .await;
    assert_eq!(items.status(), StatusCode::OK);
    let body = response_json(items).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn list_rejects_unknown_status_filter() {
    let app = TestApp::new().await;
    app.create_pedido(&app.profiles.mostrador, &[(VINILO_ID, 1)]).await;

    let ok = app
        .request_as(
            &app.profiles.mostrador,
            Method::GET,
            "/api/v1/pedidos?approval_status=pendiente",
            None,
        )
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    let body = response_json(ok).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let bad = app
        .request_as(
            &app.profiles.mostrador,
            Method::GET,
            "/api/v1/pedidos?approval_status=Borrador",
            None,
        )
        .await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn notification_scope_all_needs_an_approver() {
    let app = TestApp::new().await;
    app.create_pedido(&app.profiles.mostrador, &[(VINILO_ID, 1)]).await;

    let mine = app
        .request_as(
            &app.profiles.mostrador,
            Method::GET,
            "/api/v1/notifications/unread-count",
            None,
        )
        .await;
    assert_eq!(mine.status(), StatusCode::OK);
    assert_eq!(response_json(mine).await["data"]["count"], 1);

    let denied = app
        .request_as(
            &app.profiles.mostrador,
            Method::GET,
            "/api/v1/notifications?scope=all",
            None,
        )
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let everything = app
        .request_as(
            &app.profiles.compras,
            Method::GET,
            "/api/v1/notifications?scope=all",
            None,
        )
        .await;
    assert_eq!(everything.status(), StatusCode::OK);
    let body = response_json(everything).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn users_cannot_mark_other_users_notifications() {
    let app = TestApp::new().await;
    app.create_pedido(&app.profiles.mostrador, &[(VINILO_ID, 1)]).await;
    let theirs = app
        .state
        .services
        .notifications
        .list(Some("u-mostrador"), false)
        .await
        .unwrap();
    let uri = format!("/api/v1/notifications/{}/read", theirs[0].id);

    let denied = app
        .request_as(&app.profiles.taller, Method::POST, &uri, None)
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let own = app
        .request_as(&app.profiles.mostrador, Method::POST, &uri, None)
        .await;
    assert_eq!(own.status(), StatusCode::OK);

    let sweep = app
        .request_as(
            &app.profiles.mostrador,
            Method::POST,
            "/api/v1/notifications/read-all",
            None,
        )
        .await;
    assert_eq!(response_json(sweep).await["data"]["updated"], 0);
}

#[tokio::test]
async fn only_approvers_can_mark_broadcasts_read() {
    let app = TestApp::new().await;
    app.create_pedido(&app.profiles.mostrador, &[(VINILO_ID, 1)]).await;
    let broadcast = app
        .state
        .services
        .notifications
        .list(None, false)
        .await
        .unwrap()
        .into_iter()
        .find(|n| n.is_broadcast())
        .expect("approver broadcast");
    let uri = format!("/api/v1/notifications/{}/read", broadcast.id);

    for profile in [&app.profiles.taller, &app.profiles.mostrador] {
        let denied = app.request_as(profile, Method::POST, &uri, None).await;
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    }
    let still_unread = app
        .state
        .services
        .notifications
        .get(broadcast.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!still_unread.is_read);

    let approver = app
        .request_as(&app.profiles.compras, Method::POST, &uri, None)
        .await;
    assert_eq!(approver.status(), StatusCode::OK);
}

#[tokio::test]
async fn articulos_directory_filters() {
    let app = TestApp::new().await;

    let imprenta = app
        .request_as(
            &app.profiles.taller,
            Method::GET,
            "/api/v1/articulos?sector=Imprenta",
            None,
        )
        .await;
    assert_eq!(imprenta.status(), StatusCode::OK);
    assert_eq!(
        response_json(imprenta).await["data"].as_array().map(Vec::len),
        Some(2)
    );

    let search = app
        .request_as(
            &app.profiles.taller,
            Method::GET,
            "/api/v1/articulos?search=vinilo",
            None,
        )
        .await;
    let body = response_json(search).await;
    assert_eq!(body["data"][0]["id"], VINILO_ID);

    let low = app
        .request_as(
            &app.profiles.taller,
            Method::GET,
            "/api/v1/articulos/low-stock",
            None,
        )
        .await;
    let body = response_json(low).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"][0]["id"], TINTA_ID);

    let missing = app
        .request_as(&app.profiles.taller, Method::GET, "/api/v1/articulos/999", None)
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
