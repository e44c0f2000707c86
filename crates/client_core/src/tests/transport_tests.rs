use super::*;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone)]
struct ReceivedPart {
    field_name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Clone, Default)]
struct ServerState {
    uploads: Arc<Mutex<Vec<ReceivedPart>>>,
    json_bodies: Arc<Mutex<Vec<Value>>>,
}

async fn handle_root() -> Json<Value> {
    Json(json!({"status": "ok", "message": "RAG system running (certificate mode)"}))
}

async fn handle_upload(State(state): State<ServerState>, mut multipart: Multipart) -> Json<Value> {
    while let Some(field) = multipart.next_field().await.expect("next field") {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.expect("field bytes").to_vec();
        state.uploads.lock().await.push(ReceivedPart {
            field_name,
            file_name,
            content_type,
            bytes,
        });
    }
    Json(json!({"message": "document indexed", "num_chunks": 12}))
}

async fn handle_query(State(state): State<ServerState>, Json(body): Json<Value>) -> Json<Value> {
    state.json_bodies.lock().await.push(body);
    Json(json!({"answer": "Jane Doe", "sources": [{"page": 1, "excerpt": "Name: Jane Doe"}]}))
}

async fn handle_fill_form() -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"detail": "Upload a document first"})),
    )
}

async fn handle_plain_error() -> (StatusCode, &'static str) {
    (StatusCode::BAD_GATEWAY, "upstream unavailable")
}

async fn handle_slow() -> Json<Value> {
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    Json(json!({"answer": "late"}))
}

fn analysis_routes(state: ServerState) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/upload", post(handle_upload))
        .route("/query", post(handle_query))
        .route("/fill-form", post(handle_fill_form))
        .route("/analyze/certificate", post(handle_plain_error))
        .route("/slow", post(handle_slow))
        .with_state(state)
}

async fn serve(app: Router) -> std::io::Result<Url> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(Url::parse(&format!("http://{addr}")).expect("server url"))
}

async fn spawn_analysis_server() -> std::io::Result<(Url, ServerState)> {
    let state = ServerState::default();
    let url = serve(analysis_routes(state.clone())).await?;
    Ok((url, state))
}

#[tokio::test]
async fn upload_sends_single_file_part() {
    let (url, state) = spawn_analysis_server().await.expect("spawn server");
    let transport = HttpTransport::new(url);

    let response = transport
        .post_multipart(
            "/upload",
            FilePart {
                file_name: "certificate.pdf".into(),
                bytes: b"%PDF-1.4 test".to_vec(),
            },
        )
        .await
        .expect("upload");

    assert_eq!(response.status, 200);
    assert_eq!(
        response.payload,
        Payload::Json(json!({"message": "document indexed", "num_chunks": 12}))
    );

    let uploads = state.uploads.lock().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].field_name, "file");
    assert_eq!(uploads[0].file_name.as_deref(), Some("certificate.pdf"));
    assert_eq!(uploads[0].content_type.as_deref(), Some("application/pdf"));
    assert_eq!(uploads[0].bytes, b"%PDF-1.4 test");
}

#[tokio::test]
async fn post_json_sends_body_and_decodes_reply() {
    let (url, state) = spawn_analysis_server().await.expect("spawn server");
    let transport = HttpTransport::new(url);

    let response = transport
        .post_json("/query", json!({"question": "who?", "top_k": 4}))
        .await
        .expect("query");

    assert!(response.is_success());
    assert_eq!(
        state.json_bodies.lock().await.as_slice(),
        &[json!({"question": "who?", "top_k": 4})]
    );
}

#[tokio::test]
async fn error_status_keeps_json_body() {
    let (url, _state) = spawn_analysis_server().await.expect("spawn server");
    let transport = HttpTransport::new(url);

    let response = transport
        .post_json("/fill-form", json!({"fields": ["a"], "top_k": 4}))
        .await
        .expect("fill form");

    assert_eq!(response.status, 400);
    assert_eq!(
        response.payload,
        Payload::Json(json!({"detail": "Upload a document first"}))
    );
}

#[tokio::test]
async fn non_json_body_is_marked_malformed() {
    let (url, _state) = spawn_analysis_server().await.expect("spawn server");
    let transport = HttpTransport::new(url);

    let response = transport
        .post_json("/analyze/certificate", json!({}))
        .await
        .expect("analyze");

    assert_eq!(response.status, 502);
    assert!(matches!(response.payload, Payload::Malformed { .. }));
}

#[tokio::test]
async fn get_json_reads_health() {
    let (url, _state) = spawn_analysis_server().await.expect("spawn server");
    let transport = HttpTransport::new(url);

    let response = transport.get_json("/").await.expect("health");
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn base_url_path_prefix_is_preserved() {
    let state = ServerState::default();
    let root = serve(Router::new().nest("/api", analysis_routes(state.clone())))
        .await
        .expect("spawn server");
    let transport = HttpTransport::new(root.join("api").expect("prefix"));

    assert_eq!(transport.base_url().path(), "/api/");
    let response = transport
        .post_json("/query", json!({"question": "prefixed?", "top_k": 1}))
        .await
        .expect("query");
    assert_eq!(response.status, 200);
    assert_eq!(state.json_bodies.lock().await.len(), 1);
}

#[tokio::test]
async fn slow_server_trips_configured_timeout() {
    let (url, _state) = spawn_analysis_server().await.expect("spawn server");
    let transport =
        HttpTransport::with_timeout(url, Some(Duration::from_millis(100))).expect("transport");

    let err = transport
        .post_json("/slow", json!({}))
        .await
        .expect_err("should time out");
    assert!(matches!(err, TransportError::Timeout));
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let transport = HttpTransport::new(Url::parse(&format!("http://{addr}")).expect("url"));
    let err = transport
        .post_json("/query", json!({"question": "anyone?", "top_k": 1}))
        .await
        .expect_err("nothing listening");
    assert!(matches!(err, TransportError::Network(_)));
}

#[test]
fn mime_type_is_guessed_from_file_name() {
    let part = |name: &str| FilePart {
        file_name: name.into(),
        bytes: Vec::new(),
    };
    assert_eq!(part("scan.pdf").mime_type(), "application/pdf");
    assert_eq!(part("notes.txt").mime_type(), "text/plain");
    assert_eq!(part("blob").mime_type(), "application/octet-stream");
}
