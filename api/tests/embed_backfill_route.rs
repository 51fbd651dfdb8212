//! End-to-end tests for `POST /api/embed-legal`.
//!
//! The store (PostgREST) and the embeddings provider are both `wiremock`
//! servers; call counts are asserted with `.expect(n)` and verified when the
//! servers drop.

use std::{net::TcpListener, sync::Arc, time::Duration};

use api::{
    EMBED_BACKFILL_PATH, REQUEST_ID_HEADER,
    core::app_state::{AppConfig, AppState},
    router,
};
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode},
};
use embedding_service::EmbeddingModelConfig;
use row_store::{StoreConfig, TargetAllowList};
use serde_json::{Value, json};
use tower::ServiceExt; // for `oneshot`
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{any, body_json, method, path, query_param},
};

const GUARD: &str = "guard-token";

struct Harness {
    store: MockServer,
    openai: MockServer,
}

impl Harness {
    async fn start() -> Self {
        Self {
            store: MockServer::start().await,
            openai: MockServer::start().await,
        }
    }

    fn config(&self) -> AppConfig {
        AppConfig {
            guard_token: GUARD.into(),
            store: StoreConfig {
                base_url: self.store.uri(),
                service_key: "service-key".into(),
                timeout_secs: Some(5),
            },
            embedding: EmbeddingModelConfig {
                model: "text-embedding-3-small".into(),
                endpoint: self.openai.uri(),
                api_key: "sk-test".into(),
                dimensions: None,
                timeout_secs: Some(5),
            },
            allowed_targets: TargetAllowList::parse(
                "EMBED_ALLOWED_TARGETS",
                "legal_docs:id:chunk:embedding,faq:faq_id:body:vec",
            )
            .unwrap(),
            max_limit: 2048,
        }
    }

    fn app(&self) -> Router {
        router(Arc::new(AppState::from_config(Ok(self.config()))))
    }

    /// Fails the test if the store or provider sees any request.
    async fn forbid_outbound_calls(&self) {
        for server in [&self.store, &self.openai] {
            Mock::given(any())
                .respond_with(ResponseTemplate::new(500))
                .expect(0)
                .mount(server)
                .await;
        }
    }
}

async fn call(app: Router, token: Option<&str>, body: &str) -> (StatusCode, Value, HeaderMap) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(EMBED_BACKFILL_PATH)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("x-embed-token", token);
    }
    let resp = app
        .oneshot(builder.body(Body::from(body.to_owned())).unwrap())
        .await
        .unwrap();

    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap();
    (status, json, headers)
}

fn rows_response(rows: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(rows)
}

#[tokio::test]
async fn missing_guard_header_is_unauthorized_without_outbound_calls() {
    let h = Harness::start().await;
    h.forbid_outbound_calls().await;

    let (status, body, _) = call(h.app(), None, "{}").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Unauthorized", "code": "UNAUTHORIZED"}));
}

#[tokio::test]
async fn wrong_guard_token_is_unauthorized_without_outbound_calls() {
    let h = Harness::start().await;
    h.forbid_outbound_calls().await;

    for token in ["nope", "", "guard-token ", "GUARD-TOKEN"] {
        let (status, body, _) = call(h.app(), Some(token), "{}").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "token {token:?}");
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn missing_configuration_fails_every_request() {
    let state = AppState::from_config(AppConfig::from_lookup(|name: &str| {
        (name == "OPENAI_API_KEY").then(|| "sk-test".to_string())
    }));
    let app = router(Arc::new(state));

    // Reported before the token is even looked at.
    for token in [None, Some(GUARD)] {
        let (status, body, _) = call(app.clone(), token, "{}").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "CONFIG_MISSING");
        assert_eq!(
            body["error"],
            "missing required environment variables: SUPABASE_URL, SUPABASE_SERVICE_ROLE_KEY, EMBED_ADMIN_TOKEN"
        );
    }
}

#[tokio::test]
async fn empty_body_targets_default_table_and_skips_provider_when_nothing_is_missing() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/legal_docs"))
        .and(query_param("select", "id,chunk"))
        .and(query_param("embedding", "is.null"))
        .and(query_param("limit", "500"))
        .respond_with(rows_response(json!([])))
        .expect(2)
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&h.store)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.openai)
        .await;

    for body in ["{}", ""] {
        let (status, body, _) = call(h.app(), Some(GUARD), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"updated": 0}));
    }
}

#[tokio::test]
async fn rows_are_embedded_in_one_batch_and_upserted_by_position() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/legal_docs"))
        .respond_with(rows_response(json!([
            {"id": 1, "chunk": "a"},
            {"id": 2, "chunk": "b"}
        ])))
        .expect(1)
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_json(json!({
            "model": "text-embedding-3-small",
            "input": ["a", "b"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.1]}, {"embedding": [0.2]}]
        })))
        .expect(1)
        .mount(&h.openai)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/legal_docs"))
        .and(query_param("on_conflict", "id"))
        .and(body_json(json!([
            {"id": 1, "embedding": [0.1]},
            {"id": 2, "embedding": [0.2]}
        ])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&h.store)
        .await;

    let (status, body, _) = call(h.app(), Some(GUARD), "{}").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"updated": 2}));
}

#[tokio::test]
async fn allow_listed_target_and_limit_shape_the_query() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/faq"))
        .and(query_param("select", "faq_id,body"))
        .and(query_param("vec", "is.null"))
        .and(query_param("limit", "3"))
        .respond_with(rows_response(json!([
            {"faq_id": "q-1", "body": "How do I appeal?"}
        ])))
        .expect(1)
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [0.5, 0.25]}]
        })))
        .expect(1)
        .mount(&h.openai)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/faq"))
        .and(query_param("on_conflict", "faq_id"))
        .and(body_json(json!([{"faq_id": "q-1", "vec": [0.5, 0.25]}])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&h.store)
        .await;

    let body = r#"{"table":"faq","id_column":"faq_id","text_column":"body","embed_column":"vec","limit":3}"#;
    let (status, body, _) = call(h.app(), Some(GUARD), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"updated": 1}));
}

#[tokio::test]
async fn provider_failure_returns_its_payload_and_skips_the_write() {
    let h = Harness::start().await;
    let payload = json!({
        "error": {
            "message": "Incorrect API key provided",
            "type": "invalid_request_error",
            "code": "invalid_api_key"
        }
    });
    Mock::given(method("GET"))
        .respond_with(rows_response(json!([{"id": 1, "chunk": "a"}])))
        .expect(1)
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_json(payload.clone()))
        .expect(1)
        .mount(&h.openai)
        .await;

    let (status, body, _) = call(h.app(), Some(GUARD), "{}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": payload, "code": "PROVIDER_FAILED"}));
}

#[tokio::test]
async fn short_provider_batch_is_rejected_before_pairing() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .respond_with(rows_response(json!([
            {"id": 1, "chunk": "a"},
            {"id": 2, "chunk": "b"}
        ])))
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.1]}]
        })))
        .expect(1)
        .mount(&h.openai)
        .await;

    let (status, body, _) = call(h.app(), Some(GUARD), "{}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "PROVIDER_FAILED");
    assert_eq!(
        body["error"],
        "[Embedding Service] provider returned 1 embeddings for 2 inputs"
    );
}

#[tokio::test]
async fn store_read_failure_reports_store_message_and_skips_provider() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "42703",
            "details": null,
            "hint": null,
            "message": "column legal_docs.embedding does not exist"
        })))
        .expect(1)
        .mount(&h.store)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.openai)
        .await;

    let (status, body, _) = call(h.app(), Some(GUARD), "{}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"error": "column legal_docs.embedding does not exist", "code": "STORE_READ_FAILED"})
    );
}

#[tokio::test]
async fn store_write_failure_reports_store_message() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .respond_with(rows_response(json!([{"id": 1, "chunk": "a"}])))
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.1, 0.2, 0.3]}]
        })))
        .expect(1)
        .mount(&h.openai)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/legal_docs"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "22000",
            "message": "expected 1536 dimensions, not 3"
        })))
        .expect(1)
        .mount(&h.store)
        .await;

    let (status, body, _) = call(h.app(), Some(GUARD), "{}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"error": "expected 1536 dimensions, not 3", "code": "STORE_WRITE_FAILED"})
    );
}

#[tokio::test]
async fn second_run_without_reset_updates_nothing() {
    let h = Harness::start().await;
    // First select sees the unembedded rows; afterwards the column is filled.
    Mock::given(method("GET"))
        .respond_with(rows_response(json!([
            {"id": 1, "chunk": "a"},
            {"id": 2, "chunk": "b"}
        ])))
        .up_to_n_times(1)
        .expect(1)
        .mount(&h.store)
        .await;
    Mock::given(method("GET"))
        .respond_with(rows_response(json!([])))
        .expect(1)
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.1]}, {"embedding": [0.2]}]
        })))
        .expect(1)
        .mount(&h.openai)
        .await;

    let app = h.app();
    let (_, first, _) = call(app.clone(), Some(GUARD), "{}").await;
    let (_, second, _) = call(app, Some(GUARD), "{}").await;
    assert_eq!(first, json!({"updated": 2}));
    assert_eq!(second, json!({"updated": 0}));
}

#[tokio::test]
async fn reset_store_gives_the_same_count_on_every_run() {
    let h = Harness::start().await;
    // The select keeps returning the same rows, as if the store were reset.
    Mock::given(method("GET"))
        .respond_with(rows_response(json!([
            {"id": 1, "chunk": "a"},
            {"id": 2, "chunk": "b"}
        ])))
        .expect(2)
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.1]}, {"embedding": [0.2]}]
        })))
        .expect(2)
        .mount(&h.openai)
        .await;

    let app = h.app();
    let (_, first, _) = call(app.clone(), Some(GUARD), "{}").await;
    let (_, second, _) = call(app, Some(GUARD), "{}").await;
    assert_eq!(first, json!({"updated": 2}));
    assert_eq!(second, first);
}

/// Base URL of a local port with nothing listening on it.
fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

#[tokio::test]
async fn unreachable_store_is_a_read_failure() {
    let h = Harness::start().await;
    h.forbid_outbound_calls().await;

    let mut cfg = h.config();
    cfg.store.base_url = closed_port_url();
    let app = router(Arc::new(AppState::from_config(Ok(cfg))));

    let (status, body, _) = call(app, Some(GUARD), "{}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "STORE_READ_FAILED");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unreachable_provider_fails_without_writing() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .respond_with(rows_response(json!([{"id": 1, "chunk": "a"}])))
        .expect(1)
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&h.store)
        .await;

    let mut cfg = h.config();
    cfg.embedding.endpoint = closed_port_url();
    let app = router(Arc::new(AppState::from_config(Ok(cfg))));

    let (status, body, _) = call(app, Some(GUARD), "{}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "PROVIDER_FAILED");
    assert!(
        body["error"]
            .as_str()
            .is_some_and(|m| m.starts_with("[Embedding Service] transport error")),
        "{body}"
    );
}

#[tokio::test]
async fn provider_timeout_fails_without_writing() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .respond_with(rows_response(json!([{"id": 1, "chunk": "a"}])))
        .expect(1)
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&h.store)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"embedding": [0.1]}]}))
                .set_delay(Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&h.openai)
        .await;

    let mut cfg = h.config();
    cfg.embedding.timeout_secs = Some(1);
    let app = router(Arc::new(AppState::from_config(Ok(cfg))));

    let (status, body, _) = call(app, Some(GUARD), "{}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "PROVIDER_FAILED");
}

#[tokio::test]
async fn target_outside_allow_list_is_rejected_without_outbound_calls() {
    let h = Harness::start().await;
    h.forbid_outbound_calls().await;

    let (status, body, _) = call(
        h.app(),
        Some(GUARD),
        r#"{"table":"users","text_column":"password_hash"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({
            "error": "table target users:id:password_hash:embedding is not allowed",
            "code": "TARGET_NOT_ALLOWED"
        })
    );
}

#[tokio::test]
async fn out_of_range_limit_and_bad_shapes_are_rejected() {
    let h = Harness::start().await;
    h.forbid_outbound_calls().await;

    let (status, body, _) = call(h.app(), Some(GUARD), r#"{"limit": 5000}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "LIMIT_OUT_OF_RANGE");

    let (status, body, _) = call(h.app(), Some(GUARD), r#"{"limit": "all"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn malformed_json_body_falls_back_to_defaults() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/legal_docs"))
        .and(query_param("limit", "500"))
        .respond_with(rows_response(json!([])))
        .expect(1)
        .mount(&h.store)
        .await;

    let (status, body, _) = call(h.app(), Some(GUARD), "{not json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"updated": 0}));
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let h = Harness::start().await;
    h.forbid_outbound_calls().await;

    let (_, _, headers) = call(h.app(), None, "{}").await;
    let id = headers.get(REQUEST_ID_HEADER).unwrap().to_str().unwrap();
    assert!(id.starts_with("req-"));

    let resp = h
        .app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(EMBED_BACKFILL_PATH)
                .header(REQUEST_ID_HEADER, "trace-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.headers().get(REQUEST_ID_HEADER).unwrap(), "trace-42");
}
