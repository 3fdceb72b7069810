//! HTTP endpoint handlers.

use std::io::Write;
use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::config::Settings;
use crate::coordinator::RunError;
use crate::directory::CompanyDirectory;
use crate::document::PdfDocument;
use crate::models::{content_hash, Destination};

use super::AppState;

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Map a coordinator error to a status code and a stable JSON error body.
fn error_response(err: &RunError) -> Response {
    let status = match err {
        RunError::UnknownRun | RunError::NotFound(_) => StatusCode::NOT_FOUND,
        RunError::RunNotAwaitingReview | RunError::ResultsNotReady => StatusCode::CONFLICT,
        RunError::InvalidResponse(_) | RunError::InvalidDocument | RunError::InvalidRoster => {
            StatusCode::BAD_REQUEST
        }
        RunError::NoPreviousQuestion => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(json!({ "error": err.kind(), "detail": err.to_string() })),
    )
        .into_response()
}

fn bad_request(detail: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "bad_request", "detail": detail.into() })),
    )
        .into_response()
}

/// Keep only filesystem-safe characters from a client-supplied filename.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Persist the uploads and build the run inputs. Blocking: runs off the
/// request path.
fn prepare_run(
    settings: &Settings,
    document_name: &str,
    document_bytes: &[u8],
    roster_name: &str,
    roster_bytes: &[u8],
) -> Result<(PdfDocument, CompanyDirectory, String), Response> {
    std::fs::create_dir_all(&settings.upload_dir)
        .map_err(|e| bad_request(format!("cannot store upload: {}", e)))?;

    let upload_id = Uuid::new_v4();
    let document_path = settings
        .upload_dir
        .join(format!("{}-{}", upload_id, sanitize_filename(document_name)));
    let roster_path = settings
        .upload_dir
        .join(format!("{}-{}", upload_id, sanitize_filename(roster_name)));

    std::fs::write(&document_path, document_bytes)
        .map_err(|e| bad_request(format!("cannot store upload: {}", e)))?;
    std::fs::write(&roster_path, roster_bytes)
        .map_err(|e| bad_request(format!("cannot store upload: {}", e)))?;

    let document = PdfDocument::open(&document_path).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_document", "detail": e.to_string() })),
        )
            .into_response()
    })?;

    let directory =
        CompanyDirectory::load(&roster_path, settings.roster_sheet.as_deref()).map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_roster", "detail": e.to_string() })),
            )
                .into_response()
        })?;

    Ok((document, directory, content_hash(document_bytes)))
}

/// Start a run from a multipart upload with `document` and `roster` fields.
pub async fn create_run(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut document: Option<(String, Vec<u8>)> = None;
    let mut roster: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return bad_request(format!("malformed multipart request: {}", e)),
        };
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => return bad_request(format!("failed to read upload: {}", e)),
        };
        match name.as_str() {
            "document" => document = Some((file_name, bytes)),
            "roster" => roster = Some((file_name, bytes)),
            _ => {}
        }
    }

    let Some((document_name, document_bytes)) = document else {
        return bad_request("multipart field 'document' is required");
    };
    let Some((roster_name, roster_bytes)) = roster else {
        return bad_request("multipart field 'roster' is required");
    };

    let settings = state.settings.clone();
    let prepared = tokio::task::spawn_blocking(move || {
        prepare_run(
            &settings,
            &document_name,
            &document_bytes,
            &roster_name,
            &roster_bytes,
        )
    })
    .await;

    let (document, directory, hash) = match prepared {
        Ok(Ok(inputs)) => inputs,
        Ok(Err(response)) => return response,
        Err(e) => return bad_request(format!("upload processing failed: {}", e)),
    };

    match state.coordinator.start_run(
        Box::new(document),
        Arc::new(directory),
        Some(hash.clone()),
    ) {
        Ok(token) => Json(json!({
            "run_token": token,
            "status": "pending",
            "document_sha256": hash,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Current run status.
pub async fn run_status(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Response {
    match state.coordinator.status(&token) {
        Ok(view) => Json(json!({
            "run_token": token,
            "status": view.status,
            "error": view.error,
            "questions_total": view.questions_total,
            "questions_remaining": view.questions_remaining,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// The question under the review cursor.
pub async fn current_question(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Response {
    match state.coordinator.current_question(&token) {
        Ok(Some(question)) => {
            let mut body = serde_json::to_value(&question).unwrap_or_default();
            if let Some(map) = body.as_object_mut() {
                map.insert("complete".to_string(), json!(false));
            }
            Json(body).into_response()
        }
        Ok(None) => Json(json!({ "complete": true })).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub response: String,
}

/// Apply one reviewer response.
pub async fn answer_question(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<AnswerRequest>,
) -> Response {
    match state.coordinator.answer_question(&token, &request.response) {
        Ok(view) => Json(json!({
            "status": view.status,
            "questions_total": view.questions_total,
            "questions_remaining": view.questions_remaining,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Results summary for a completed run.
pub async fn run_results(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Response {
    match state.coordinator.results(&token) {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(&e),
    }
}

/// One bucket's output document as PDF bytes.
pub async fn output_document(
    State(state): State<AppState>,
    Path((token, destination)): Path<(String, String)>,
) -> Response {
    let Some(destination) = Destination::from_str(&destination) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "not_found", "detail": "unknown destination" })),
        )
            .into_response();
    };

    let path = match state.coordinator.output_document(&token, destination) {
        Ok(path) => path,
        Err(e) => return error_response(&e),
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/pdf".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", destination.file_name()),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "read_failed", "detail": e.to_string() })),
        )
            .into_response(),
    }
}

/// All bucket documents for a completed run, bundled into a ZIP.
pub async fn download_archive(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Response {
    let outputs = match state.coordinator.output_documents(&token) {
        Ok(outputs) if outputs.is_empty() => {
            return error_response(&RunError::NotFound("any destination"))
        }
        Ok(outputs) => outputs,
        Err(e) => return error_response(&e),
    };

    let archive = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (destination, file) in &outputs {
            let bytes = std::fs::read(&file.path)?;
            writer.start_file(destination.file_name(), options)?;
            writer.write_all(&bytes)?;
        }
        Ok(writer.finish()?.into_inner())
    })
    .await;

    match archive {
        Ok(Ok(bytes)) => {
            let short_token: String = token.chars().take(8).collect();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/zip".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"mailsort_{}.zip\"", short_token),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "archive_failed", "detail": e.to_string() })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "archive_failed", "detail": e.to_string() })),
        )
            .into_response(),
    }
}
