use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::{net::TcpListener, sync::Mutex};

use melo_reader::{
    application::tts::{SpeechRequest, TtsClient, TtsError},
    infra::tts::HttpTtsClient,
};

const WAV_BYTES: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";

#[derive(Clone, Copy)]
enum Mode {
    Audio,
    ServerError,
    Slow,
    Empty,
}

#[derive(Clone)]
struct FakeServer {
    mode: Mode,
    received: Arc<Mutex<Vec<Value>>>,
}

async fn tts_handler(State(server): State<FakeServer>, Json(body): Json<Value>) -> impl IntoResponse {
    server.received.lock().await.push(body);
    match server.mode {
        Mode::Audio => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "audio/wav")],
            WAV_BYTES.to_vec(),
        )
            .into_response(),
        Mode::ServerError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "model not loaded"})),
        )
            .into_response(),
        Mode::Slow => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            (StatusCode::OK, WAV_BYTES.to_vec()).into_response()
        }
        Mode::Empty => (StatusCode::OK, Vec::<u8>::new()).into_response(),
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "available_languages": ["KR", "EN", "ZH"]
    }))
}

async fn speakers_handler(Path(language): Path<String>) -> impl IntoResponse {
    match language.as_str() {
        "EN" => Json(json!({"speakers": {"EN-US": 0, "EN-BR": 1}})).into_response(),
        "KR" => Json(json!({"speakers": {"KR": 0}})).into_response(),
        _ => (StatusCode::NOT_FOUND, "unknown language").into_response(),
    }
}

async fn spawn_server(mode: Mode) -> (SocketAddr, Arc<Mutex<Vec<Value>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = FakeServer {
        mode,
        received: received.clone(),
    };
    let router = Router::new()
        .route("/tts", post(tts_handler))
        .route("/health", get(health_handler))
        .route("/speakers/{language}", get(speakers_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fake server");
    });

    (addr, received)
}

fn client() -> HttpTtsClient {
    HttpTtsClient::new(Duration::from_secs(1), Duration::from_secs(1)).expect("client")
}

fn request() -> SpeechRequest {
    SpeechRequest {
        text: "Hello. World".to_string(),
        language: "KR".to_string(),
        speaker: "KR".to_string(),
    }
}

#[tokio::test]
async fn synthesize_posts_json_and_returns_audio() {
    let (addr, received) = spawn_server(Mode::Audio).await;

    let audio = client()
        .synthesize(&format!("http://{addr}"), &request())
        .await
        .expect("audio");

    assert_eq!(audio.bytes.as_ref(), WAV_BYTES);
    assert_eq!(audio.content_type.as_deref(), Some("audio/wav"));

    let received = received.lock().await;
    assert_eq!(received.len(), 1);
    assert_eq!(
        received[0],
        json!({"text": "Hello. World", "language": "KR", "speaker": "KR"})
    );
}

#[tokio::test]
async fn trailing_slash_endpoint_reaches_the_same_route() {
    let (addr, received) = spawn_server(Mode::Audio).await;

    client()
        .synthesize(&format!("http://{addr}/"), &request())
        .await
        .expect("audio");

    assert_eq!(received.lock().await.len(), 1);
}

#[tokio::test]
async fn error_status_is_reported_with_detail() {
    let (addr, _) = spawn_server(Mode::ServerError).await;

    let err = client()
        .synthesize(&format!("http://{addr}"), &request())
        .await
        .expect_err("server error");

    match err {
        TtsError::Status { status, detail } => {
            assert_eq!(status, 500);
            assert!(detail.contains("model not loaded"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn slow_server_times_out() {
    let (addr, _) = spawn_server(Mode::Slow).await;

    let err = client()
        .synthesize(&format!("http://{addr}"), &request())
        .await
        .expect_err("timeout");

    assert!(matches!(err, TtsError::Timeout { seconds: 1 }));
}

#[tokio::test]
async fn empty_audio_payload_is_an_error() {
    let (addr, _) = spawn_server(Mode::Empty).await;

    let err = client()
        .synthesize(&format!("http://{addr}"), &request())
        .await
        .expect_err("empty payload");

    assert!(matches!(err, TtsError::EmptyPayload));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let err = client()
        .synthesize(&format!("http://{addr}"), &request())
        .await
        .expect_err("connection refused");

    assert!(matches!(err, TtsError::Transport(_)));
}

#[tokio::test]
async fn health_and_speakers_are_decoded() {
    let (addr, _) = spawn_server(Mode::Audio).await;
    let endpoint = format!("http://{addr}");
    let client = client();

    let health = client.health(&endpoint).await.expect("health");
    assert_eq!(health.status, "healthy");
    assert_eq!(health.available_languages, vec!["KR", "EN", "ZH"]);

    let mut speakers = client.speakers(&endpoint, "EN").await.expect("speakers");
    speakers.sort();
    assert_eq!(speakers, vec!["EN-BR", "EN-US"]);

    let err = client
        .speakers(&endpoint, "JP")
        .await
        .expect_err("unknown language");
    assert!(matches!(err, TtsError::Status { status: 404, .. }));
}

#[tokio::test]
async fn invalid_endpoint_fails_before_sending() {
    let err = client()
        .synthesize("not a url", &request())
        .await
        .expect_err("invalid endpoint");

    assert!(matches!(err, TtsError::InvalidEndpoint { .. }));
}
