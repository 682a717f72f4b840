use std::sync::{Arc, Mutex};

use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum_test::TestServer;
use serde_json::json;

use moodflix::{
    api::{create_router, AppState},
    error::{AppError, AppResult},
    models::{Movie, SimilarityResponse},
    services::{Catalog, Embedder},
};

/// Maps a few mood words onto fixed axes so rankings are predictable
#[derive(Default)]
struct KeywordEmbedder {
    seen: Mutex<Vec<String>>,
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.seen.lock().unwrap().push(text.to_string());
        if text.contains("explode") {
            return Err(AppError::Embedding("model crashed".to_string()));
        }
        let vector = if text.contains("funny") {
            vec![1.0, 0.0, 0.0]
        } else if text.contains("scary") {
            vec![0.0, 1.0, 0.0]
        } else {
            vec![0.0, 0.0, 1.0]
        };
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        3
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

fn small_catalog() -> Catalog {
    Catalog::from_rows(
        vec![
            Movie::new("Airplane!", Some(1980), Some(7.7)),
            Movie::new("The Shining", Some(1980), Some(8.4)),
            Movie::new("Hereditary", Some(2018), None),
            Movie::new("Arrival", None, Some(7.9)),
        ],
        vec![
            vec![0.9, 0.1, 0.0],
            vec![0.0, 1.0, 0.1],
            vec![0.1, 0.8, 0.0],
            vec![0.0, 0.2, 1.0],
        ],
    )
    .unwrap()
}

fn large_catalog(size: usize) -> Catalog {
    let movies = (0..size)
        .map(|i| Movie::new(format!("Comedy {}", i), Some(2000), Some(5.0)))
        .collect();
    let rows = (0..size)
        .map(|i| vec![1.0, i as f32 / 10.0, 0.0])
        .collect();
    Catalog::from_rows(movies, rows).unwrap()
}

fn create_test_server_with(catalog: Catalog, embedder: Arc<KeywordEmbedder>) -> TestServer {
    let state = AppState::new(embedder, Arc::new(catalog));
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

fn create_test_server() -> TestServer {
    create_test_server_with(small_catalog(), Arc::new(KeywordEmbedder::default()))
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_find_similarity_ranks_by_cosine() {
    let server = create_test_server();

    let response = server
        .post("/find_similarity/")
        .json(&json!({ "input": "Something SCARY tonight" }))
        .await;

    response.assert_status_ok();
    let body: SimilarityResponse = response.json();

    // Fewer than 30 movies: everything comes back
    assert_eq!(body.results.len(), 4);
    assert_eq!(body.results[0].movie, "The Shining");
    assert_eq!(body.results[1].movie, "Hereditary");
    assert_eq!(body.results[0].year, Some(1980));
    assert_eq!(body.results[0].rating, Some(8.4));
    assert!(body.results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_find_similarity_json_shape() {
    let server = create_test_server();

    let response = server
        .post("/find_similarity/")
        .json(&json!({ "input": "something to think about" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let top = &body["results"][0];
    assert_eq!(top["movie"], "Arrival");
    assert!(top["year"].is_null());
    assert_eq!(top["rating"], 7.9);
    assert!(top["score"].as_f64().unwrap() > 0.9);
}

#[tokio::test]
async fn test_find_similarity_caps_at_thirty() {
    let server = create_test_server_with(large_catalog(45), Arc::new(KeywordEmbedder::default()));

    let response = server
        .post("/find_similarity")
        .json(&json!({ "input": "funny" }))
        .await;

    response.assert_status_ok();
    let body: SimilarityResponse = response.json();
    assert_eq!(body.results.len(), 30);
    // Smallest off-axis component scores highest
    assert_eq!(body.results[0].movie, "Comedy 0");
    assert_eq!(body.results[29].movie, "Comedy 29");
}

#[tokio::test]
async fn test_find_similarity_lowercases_input() {
    let embedder = Arc::new(KeywordEmbedder::default());
    let server = create_test_server_with(small_catalog(), embedder.clone());

    server
        .post("/find_similarity/")
        .json(&json!({ "input": "Make Me LAUGH, Funny!" }))
        .await
        .assert_status_ok();

    let seen = embedder.seen.lock().unwrap();
    assert_eq!(seen.as_slice(), ["make me laugh, funny!"]);
}

#[tokio::test]
async fn test_find_similarity_strips_non_alpha_when_enabled() {
    let embedder = Arc::new(KeywordEmbedder::default());
    let state = AppState::new(embedder.clone(), Arc::new(small_catalog())).with_strip_non_alpha(true);
    let server = TestServer::new(create_router(state)).unwrap();

    server
        .post("/find_similarity/")
        .json(&json!({ "input": "Funny, 90s!" }))
        .await
        .assert_status_ok();

    let seen = embedder.seen.lock().unwrap();
    assert_eq!(seen.as_slice(), ["funny    s "]);
}

#[tokio::test]
async fn test_find_similarity_rejects_blank_input() {
    let server = create_test_server();

    let response = server
        .post("/find_similarity/")
        .json(&json!({ "input": "   " }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_find_similarity_rejects_missing_field() {
    let server = create_test_server();

    let response = server
        .post("/find_similarity/")
        .json(&json!({ "query": "funny" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("input"));
}

#[tokio::test]
async fn test_find_similarity_embedding_failure() {
    let server = create_test_server();

    let response = server
        .post("/find_similarity/")
        .json(&json!({ "input": "explode" }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("model crashed"));
}

#[tokio::test]
async fn test_cors_preflight() {
    let server = create_test_server();

    let response = server
        .method(Method::OPTIONS, "/find_similarity/")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static("http://localhost:3000"),
        )
        .add_header(
            HeaderName::from_static("access-control-request-method"),
            HeaderValue::from_static("POST"),
        )
        .await;

    response.assert_status_ok();
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_request_id_echoed() {
    let server = create_test_server();

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("client-abc-123"),
        )
        .await;

    assert_eq!(response.header("x-request-id"), "client-abc-123");
}

#[tokio::test]
async fn test_catalog_info() {
    let server = create_test_server();

    let response = server.get("/catalog").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["movies"], 4);
    assert_eq!(body["dimension"], 3);
    assert_eq!(body["model"], "keyword-test");
    assert_eq!(body["top_k"], 30);
    assert!(body["loaded_at"].is_string());
}
