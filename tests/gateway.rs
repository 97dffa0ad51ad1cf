use std::time::Duration;

use agrochoco::{error::GatewayError, gateway::Gateway, session::Session};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(server: &MockServer, session: &Session) -> Gateway {
    Gateway::new(&server.uri(), Duration::from_secs(5), session.clone()).unwrap()
}

async fn logged_in() -> Session {
    let session = Session::in_memory();
    session
        .login("tok-123", &json!({"id": 1, "nombre": "Rosa"}))
        .await
        .unwrap();
    session
}

#[tokio::test]
async fn test_bearer_token_attached() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/productos"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = logged_in().await;
    let body = gateway(&mock_server, &session).get("/productos").await.unwrap();
    assert_eq!(body, json!([{"id": 1}]));
}

#[tokio::test]
async fn test_missing_token_is_not_an_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/categorias"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let session = Session::in_memory();
    let body = gateway(&mock_server, &session).get("/categorias").await.unwrap();
    assert_eq!(body, json!([]));
    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_unauthorized_clears_session_and_propagates() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/usuarios"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Token expirado"})),
        )
        .mount(&mock_server)
        .await;

    let session = logged_in().await;
    let err = gateway(&mock_server, &session).get("/usuarios").await.unwrap_err();
    assert_eq!(err.status(), 401);
    assert!(err.is_auth());
    assert_eq!(err.message(), "Token expirado");
    assert_eq!(session.token().await.unwrap(), None);
    assert_eq!(session.user().await.unwrap(), None);
}

#[tokio::test]
async fn test_forbidden_clears_session() {
    let mock_server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/roles/2"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let session = logged_in().await;
    let err = gateway(&mock_server, &session).delete("/roles/2").await.unwrap_err();
    assert_eq!(err.status(), 403);
    assert_eq!(err.message(), "request failed");
    assert!(!session.is_logged_in().await.unwrap());
}

#[tokio::test]
async fn test_server_error_prefers_server_message() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/productos"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({
                    "message": "El precio debe ser positivo",
                    "campo": "precio",
                })),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/categorias"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let session = logged_in().await;
    let gw = gateway(&mock_server, &session);
    let err = gw.post("/productos", &json!({"precio": -1})).await.unwrap_err();
    assert_eq!(
        err,
        GatewayError::Server {
            status: 422,
            message: "El precio debe ser positivo".into(),
            data: Some(json!({"message": "El precio debe ser positivo", "campo": "precio"})),
        }
    );
    let err = gw.post("/categorias", &json!({})).await.unwrap_err();
    assert_eq!(err.status(), 500);
    assert_eq!(err.message(), "request failed");
    assert!(err.data().is_none());
    // only auth failures touch the session
    assert!(session.is_logged_in().await.unwrap());
}

#[tokio::test]
async fn test_not_found() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/productos/99"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let session = Session::in_memory();
    let err = gateway(&mock_server, &session).get("/productos/99").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound { .. }));
    assert_eq!(err.status(), 404);
    assert_eq!(err.message(), "resource does not exist");
}

#[tokio::test]
async fn test_malformed_success_body_is_transport_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/novedades"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&mock_server)
        .await;

    let session = Session::in_memory();
    let err = gateway(&mock_server, &session).get("/novedades").await.unwrap_err();
    assert!(matches!(err, GatewayError::Transport { .. }));
    assert_eq!(err.status(), 0);
}

#[tokio::test]
async fn test_empty_success_body_is_null() {
    let mock_server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/productos/4"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let session = Session::in_memory();
    let body = gateway(&mock_server, &session).delete("/productos/4").await.unwrap();
    assert!(body.is_null());
}

#[tokio::test]
async fn test_connection_failure() {
    let session = Session::in_memory();
    let gw = Gateway::new("http://127.0.0.1:1", Duration::from_secs(2), session).unwrap();
    let err = gw.get("/productos").await.unwrap_err();
    assert_eq!(
        err,
        GatewayError::Transport {
            message: "connection failed".into()
        }
    );
    assert_eq!(err.status(), 0);
}
