//! HTTP API server.
//!
//! Exposes the ingestion and query pipelines: `POST /analyze`,
//! `POST /chat` (streamed newline-delimited frames or a single JSON
//! object), and `GET /models`.

use super::ask::build_pipeline;
use super::models::available_models;
use crate::cli::Output;
use crate::config::Settings;
use crate::error::SkueError;
use crate::orchestrator::{IngestOptions, Orchestrator};
use crate::rag::{DatabaseKind, GenerationParams, QueryPipeline, QueryRequest};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
    pipeline: QueryPipeline,
    http: reqwest::Client,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(settings.clone())?;
    let pipeline = build_pipeline(&orchestrator, &settings);

    let state = Arc::new(AppState {
        orchestrator,
        pipeline,
        http: reqwest::Client::new(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/chat", post(chat))
        .route("/models", get(models))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Skue API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Analyze", "POST /analyze");
    Output::kv("Chat", "POST /chat");
    Output::kv("Models", "GET  /models");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct AnalyzeRequest {
    video_input: String,
    chunk_max_length: Option<usize>,
    chunk_overlap_length: Option<usize>,
    embedding_model: Option<String>,
    seconds_between_frames: Option<u32>,
    max_limit_similarity: Option<f32>,
    #[serde(default)]
    local_model: bool,
    #[serde(default)]
    enabled_detailed_chunking: bool,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    message: String,
    status_code: u16,
}

#[derive(Deserialize)]
struct HistoryTurn {
    role: String,
    content: String,
}

#[derive(Deserialize, Default)]
struct ModelParameters {
    temperature: Option<f32>,
    top_p: Option<f32>,
    top_k: Option<i64>,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct ChatRequest {
    prompt: String,
    model_id: Option<String>,
    #[serde(default)]
    message_history: Vec<HistoryTurn>,
    /// Accepted for interface compatibility; scoping retrieval to a
    /// playlist or single video happens through the knowledge base.
    playlist_id: Option<String>,
    video_id: Option<String>,
    knowledge_base: Option<String>,
    model_parameters: Option<ModelParameters>,
    database: Option<String>,
    #[serde(default)]
    stream: bool,
    #[serde(default)]
    plaintext: bool,
    #[serde(default)]
    use_logical_routing: bool,
    #[serde(default)]
    use_semantic_routing: bool,
}

#[derive(Serialize)]
struct ChatResponse {
    content: String,
}

#[derive(Serialize)]
struct ModelsResponse {
    models: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(e: &SkueError) -> Response {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// Fold role-tagged history into `(user, assistant)` pairs.
fn fold_history(turns: &[HistoryTurn]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut pending_user: Option<String> = None;

    for turn in turns {
        match turn.role.as_str() {
            "user" => pending_user = Some(turn.content.clone()),
            "assistant" => {
                if let Some(user) = pending_user.take() {
                    pairs.push((user, turn.content.clone()));
                }
            }
            _ => {}
        }
    }

    pairs
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Response {
    // oEmbed preflight: unknown videos answer 404 before the pipeline runs.
    let oembed = state
        .http
        .head("https://www.youtube.com/oembed")
        .query(&[("url", req.video_input.as_str()), ("format", "json")])
        .send()
        .await;

    match oembed {
        Ok(response) if !response.status().is_success() => {
            return (
                StatusCode::NOT_FOUND,
                Json(AnalyzeResponse {
                    message: "The YouTube content was not found.".to_string(),
                    status_code: 404,
                }),
            )
                .into_response();
        }
        Ok(_) => {}
        Err(e) => {
            warn!("oEmbed preflight failed, continuing: {}", e);
        }
    }

    let defaults = IngestOptions::default();
    let options = IngestOptions {
        chunk_max_length: req.chunk_max_length.unwrap_or(defaults.chunk_max_length),
        chunk_overlap_length: req
            .chunk_overlap_length
            .unwrap_or(defaults.chunk_overlap_length),
        seconds_between_frames: req
            .seconds_between_frames
            .unwrap_or(defaults.seconds_between_frames),
        max_limit_similarity: req
            .max_limit_similarity
            .unwrap_or(defaults.max_limit_similarity),
        local_model: req.local_model,
        enabled_detailed_chunking: req.enabled_detailed_chunking,
        embedding_model: req.embedding_model,
    };

    let outcome = state.orchestrator.ingest(&req.video_input, options).await;
    let status =
        StatusCode::from_u16(outcome.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (
        status,
        Json(AnalyzeResponse {
            message: outcome.message,
            status_code: outcome.status_code,
        }),
    )
        .into_response()
}

async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    let database = match req.database.as_deref() {
        Some(name) => match DatabaseKind::from_str(name) {
            Ok(kind) => kind,
            Err(e) => return error_response(&SkueError::InvalidInput(e)),
        },
        None => DatabaseKind::Vector,
    };

    let params = req.model_parameters.unwrap_or_default();
    let defaults = GenerationParams::default();

    let mut request = QueryRequest::new(&req.prompt);
    request.model_id = req.model_id.clone();
    request.message_history = fold_history(&req.message_history);
    request.knowledge_base = req.knowledge_base.clone();
    request.database = database;
    request.use_logical_routing = req.use_logical_routing;
    request.use_semantic_routing = req.use_semantic_routing;
    request.params = GenerationParams {
        temperature: params.temperature.unwrap_or(defaults.temperature),
        top_p: params.top_p.unwrap_or(defaults.top_p),
        top_k: params.top_k.unwrap_or(defaults.top_k),
    }
    .sanitized();

    if req.stream {
        match state.pipeline.answer_stream(&request).await {
            Ok((_, stream)) => {
                // Newline-delimited text frames.
                let frames = stream.map(|token| {
                    token.map(|t| Bytes::from(format!("{}\n", t)))
                });

                Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
                    .body(Body::from_stream(frames))
                    .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
            }
            Err(e) => error_response(&e),
        }
    } else {
        match state.pipeline.answer(&request).await {
            Ok((_, content)) => {
                if req.plaintext {
                    content.into_response()
                } else {
                    Json(ChatResponse { content }).into_response()
                }
            }
            Err(e) => error_response(&e),
        }
    }
}

async fn models(State(state): State<Arc<AppState>>) -> Response {
    match available_models(state.orchestrator.settings()).await {
        Ok(models) => Json(ModelsResponse { models }).into_response(),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_history_pairs_turns() {
        let turns = vec![
            HistoryTurn {
                role: "user".to_string(),
                content: "q1".to_string(),
            },
            HistoryTurn {
                role: "assistant".to_string(),
                content: "a1".to_string(),
            },
            HistoryTurn {
                role: "user".to_string(),
                content: "dangling".to_string(),
            },
        ];

        let pairs = fold_history(&turns);
        assert_eq!(pairs, vec![("q1".to_string(), "a1".to_string())]);
    }

    #[test]
    fn test_fold_history_skips_unknown_roles() {
        let turns = vec![HistoryTurn {
            role: "system".to_string(),
            content: "ignored".to_string(),
        }];
        assert!(fold_history(&turns).is_empty());
    }
}
