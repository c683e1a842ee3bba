//! Integration tests exercising the Axum router end-to-end via
//! `tower::ServiceExt::oneshot`: a request goes in, a real response comes
//! out, with no network socket involved.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use x402x_facilitator::config::FacilitatorConfig;
use x402x_facilitator::{handlers, state};

fn test_config() -> FacilitatorConfig {
    toml::from_str(
        r#"
        [networks."eip155:84532"]
        rpc_urls = ["http://127.0.0.1:9"]
        allowed_routers = ["0x0000000000000000000000000000000000000b"]
        "#,
    )
    .expect("valid test config")
}

async fn app() -> axum::Router {
    let config = test_config();
    let app_state = state::build(&config, CancellationToken::new()).expect("state builds without live RPC");
    handlers::router(std::sync::Arc::new(app_state))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), 1_048_576).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok_without_any_network_configured() {
    let app = app().await;
    let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ready_is_unavailable_with_no_signer_keys_configured() {
    let app = app().await;
    let response = app.oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["checks"]["eip155:84532"]["hasPool"], false);
}

#[tokio::test]
async fn supported_lists_both_versions_for_the_configured_network() {
    let app = app().await;
    let response = app.oneshot(Request::builder().uri("/supported").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let kinds = json["kinds"].as_array().unwrap();
    assert!(kinds.iter().any(|k| k["x402Version"] == 1));
    assert!(kinds.iter().any(|k| k["x402Version"] == 2));
    assert!(kinds.iter().all(|k| k["network"] == "eip155:84532"));
}

fn v1_verify_body(network: &str) -> serde_json::Value {
    serde_json::json!({
        "paymentPayload": {
            "x402Version": 1,
            "scheme": "exact",
            "network": network,
            "payload": {
                "signature": "0xdead",
                "authorization": {
                    "from": "0x000000000000000000000000000000000000aa",
                    "to": "0x000000000000000000000000000000000000bb",
                    "value": "1000000",
                    "validAfter": "0",
                    "validBefore": "9999999999",
                    "nonce": "0x0101010101010101010101010101010101010101010101010101010101010a",
                },
            },
        },
        "paymentRequirements": {
            "scheme": "exact",
            "network": network,
            "asset": "0x000000000000000000000000000000000000cc",
            "maxAmountRequired": "1000000",
            "payTo": "0x000000000000000000000000000000000000bb",
            "maxTimeoutSeconds": 300,
        },
    })
}

#[tokio::test]
async fn verify_rejects_unsupported_network_with_bad_request() {
    let app = app().await;
    let body = v1_verify_body("eip155:999999999");
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/verify")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["isValid"], false);
    assert_eq!(json["invalidReason"], "UnsupportedNetwork");
}

#[tokio::test]
async fn settle_without_signer_accounts_reports_a_failed_response_not_a_panic() {
    let app = app().await;
    let body = v1_verify_body("eip155:84532");
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/settle")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn malformed_json_body_is_rejected_before_reaching_the_handler() {
    let app = app().await;
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/verify")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
