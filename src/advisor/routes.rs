//! HTTP surface for the advisor widget.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path as UrlPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use super::controller::ChatRequest;
use super::scribe::SessionScribe;
use super::synthesizer::ResponseSynthesizer;
use crate::document::html::render_html;
use crate::extract::{FileExtractor, file_type, safe_stem};
use crate::store::KnowledgeStore;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub synthesizer: Arc<ResponseSynthesizer>,
    pub scribe: Arc<SessionScribe>,
    pub extractor: Arc<dyn FileExtractor>,
    /// `None` when the service runs without a knowledge store.
    pub store: Option<Arc<dyn KnowledgeStore>>,
    pub uploads_dir: PathBuf,
}

/// Build the router with all advisor routes and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/chat/message", post(chat_message))
        .route("/upload", post(upload))
        .route("/documents/{id}", get(get_document))
        .route("/mentors/search", get(search_mentors))
        .route("/generate-pdf", post(generate_pdf))
        .route("/analyze-session", post(analyze_session))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Status ──────────────────────────────────────────────────────────────

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ClarityOS Online",
        "mentors_indexed": state.synthesizer.scorer().catalog().len(),
        "model": state.synthesizer.controller().model_name(),
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let store = match &state.store {
        Some(store) => store.verify_connection().await,
        None => false,
    };
    Json(serde_json::json!({ "status": "ok", "store": store }))
}

// ── Chat ────────────────────────────────────────────────────────────────

async fn chat_message(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    match state.synthesizer.respond(&request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            warn!(error = %e, "Rejected chat request");
            e.into_response()
        }
    }
}

// ── Uploads ─────────────────────────────────────────────────────────────

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut file: Option<(String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let filename = field.file_name().unwrap_or("upload.txt").to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((filename, bytes.to_vec())),
                    Err(e) => return bad_request(format!("Could not read upload: {e}")),
                }
            }
            Ok(None) => break,
            Err(e) => return bad_request(format!("Invalid multipart body: {e}")),
        }
    }

    let Some((filename, bytes)) = file else {
        return bad_request("No file provided".to_string());
    };

    let size = bytes.len();
    let extractor = Arc::clone(&state.extractor);
    let name = filename.clone();
    let content = match tokio::task::spawn_blocking(move || extractor.extract(&bytes, &name)).await
    {
        Ok(content) => content,
        Err(e) => format!("Error reading file: {e}"),
    };
    let kind = file_type(&filename);
    info!(filename = %filename, bytes = size, chars = content.chars().count(), "File uploaded");

    let mut saved_to = serde_json::Map::new();
    match write_snapshot(&state.uploads_dir, &filename, &kind, &content).await {
        Ok(path) => {
            saved_to.insert("json_path".into(), path.display().to_string().into());
        }
        Err(e) => warn!(filename = %filename, error = %e, "Upload snapshot not written"),
    }
    if let Some(store) = &state.store {
        match store.save_file_content(&filename, &content, &kind).await {
            Ok(doc_id) => {
                saved_to.insert("doc_id".into(), doc_id.into());
            }
            Err(e) => warn!(filename = %filename, error = %e, "Upload not stored"),
        }
    }

    Json(serde_json::json!({
        "filename": filename,
        "content": content,
        "status": "success",
        "saved_to": saved_to,
    }))
    .into_response()
}

/// Write `{filename, file_type, content, extracted_at}` to `<dir>/<stem>.json`.
async fn write_snapshot(
    dir: &Path,
    filename: &str,
    kind: &str,
    content: &str,
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.json", safe_stem(filename)));
    let snapshot = serde_json::json!({
        "filename": filename,
        "file_type": kind,
        "content": content,
        "extracted_at": chrono::Utc::now().to_rfc3339(),
    });
    let body = serde_json::to_vec_pretty(&snapshot)?;
    tokio::fs::write(&path, body).await?;
    Ok(path)
}

async fn get_document(State(state): State<AppState>, UrlPath(id): UrlPath<String>) -> Response {
    let Some(store) = &state.store else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "Knowledge store unavailable"})),
        )
            .into_response();
    };

    match store.get_document(&id).await {
        Ok(Some(document)) => Json(document).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Document not found"})),
        )
            .into_response(),
        Err(e) => {
            warn!(doc_id = %id, error = %e, "Document lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

// ── Mentors ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MentorSearchQuery {
    #[serde(default)]
    category: String,
    #[serde(default)]
    keywords: String,
}

async fn search_mentors(
    State(state): State<AppState>,
    Query(query): Query<MentorSearchQuery>,
) -> impl IntoResponse {
    let keywords = split_keywords(&query.keywords);

    if let Some(store) = &state.store {
        match store.mentor_matches(&query.category, &keywords).await {
            Ok(matches) => {
                return Json(serde_json::json!({ "source": "store", "mentors": matches }));
            }
            Err(e) => warn!(error = %e, "Store search failed, using catalog"),
        }
    }

    let mentors = state
        .synthesizer
        .scorer()
        .rank(&keywords.join(" "), &query.category);
    Json(serde_json::json!({ "source": "catalog", "mentors": mentors }))
}

/// Keywords separated by commas or whitespace.
fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Documents ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GeneratePdfRequest {
    #[serde(default)]
    user_summary: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    mentors: Vec<String>,
}

async fn generate_pdf(Json(request): Json<GeneratePdfRequest>) -> impl IntoResponse {
    let html = render_html(
        &request.user_summary,
        &request.category,
        &request.mentors,
        chrono::Utc::now(),
    );
    Json(serde_json::json!({ "html": html, "status": "success" }))
}

#[derive(Debug, Deserialize)]
struct AnalyzeSessionRequest {
    #[serde(default)]
    transcript: String,
}

async fn analyze_session(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeSessionRequest>,
) -> impl IntoResponse {
    Json(state.scribe.analyze(&request.transcript).await)
}

fn bad_request(error: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": error }))).into_response()
}
