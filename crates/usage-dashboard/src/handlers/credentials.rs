//! Key management handlers.
//!
//! Endpoints for adding, importing, revealing, annotating, exporting, and
//! deleting stored API keys.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::services::{CredentialService, DeleteReport, ImportResult, NewCredential};
use crate::store::CredentialSummary;

/// Response for listing keys.
#[derive(Debug, Serialize)]
pub struct KeyListResponse {
    pub items: Vec<CredentialSummary>,
    pub total: usize,
}

/// Request to add a single key.
#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Request to import many keys.
///
/// Either `keys` (one key per entry) or `text` (one key per line) may be
/// given; both are accepted together.
#[derive(Debug, Deserialize, Default)]
pub struct ImportRequest {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl ImportRequest {
    fn into_entries(self) -> Vec<String> {
        let mut entries = self.keys;
        if let Some(text) = self.text {
            entries.extend(text.lines().map(str::to_string));
        }
        entries
    }
}

/// Request to delete several keys.
#[derive(Debug, Deserialize)]
pub struct BatchDeleteRequest {
    pub ids: Vec<String>,
}

/// Request to set or clear a note.
#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    #[serde(default)]
    pub note: Option<String>,
}

/// Full key, returned only by the reveal endpoint.
#[derive(Debug, Serialize)]
pub struct RevealResponse {
    pub id: String,
    pub key: String,
}

/// List keys, masked.
///
/// `GET /api/keys`
pub async fn list(State(service): State<CredentialService>) -> AppResult<Json<KeyListResponse>> {
    let items = service.list().await?;
    Ok(Json(KeyListResponse {
        total: items.len(),
        items,
    }))
}

/// Add one key.
///
/// `POST /api/keys`
///
/// ```json
/// { "key": "fk-...", "name": "ci", "note": "rotates monthly" }
/// ```
pub async fn create(
    State(service): State<CredentialService>,
    Json(request): Json<CreateKeyRequest>,
) -> AppResult<(StatusCode, Json<CredentialSummary>)> {
    let summary = service
        .add(NewCredential {
            key: request.key,
            name: request.name,
            note: request.note,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Get one key, masked.
///
/// `GET /api/keys/{id}`
pub async fn get(
    State(service): State<CredentialService>,
    Path(id): Path<String>,
) -> AppResult<Json<CredentialSummary>> {
    Ok(Json(service.get(&id).await?))
}

/// Delete one key.
///
/// `DELETE /api/keys/{id}`
pub async fn delete(
    State(service): State<CredentialService>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    service.delete(&id).await?;
    Ok(Json(serde_json::json!({
        "message": "Key deleted successfully",
        "id": id
    })))
}

/// Reveal the full key.
///
/// `GET /api/keys/{id}/reveal`
pub async fn reveal(
    State(service): State<CredentialService>,
    Path(id): Path<String>,
) -> AppResult<Json<RevealResponse>> {
    let key = service.reveal(&id).await?;
    Ok(Json(RevealResponse { id, key }))
}

/// Set or clear the note of a key.
///
/// `PUT /api/keys/{id}/note`
pub async fn update_note(
    State(service): State<CredentialService>,
    Path(id): Path<String>,
    Json(request): Json<NoteRequest>,
) -> AppResult<Json<CredentialSummary>> {
    Ok(Json(service.set_note(&id, request.note.as_deref()).await?))
}

/// Import keys, skipping blanks and duplicates.
///
/// `POST /api/keys/import`
///
/// ```json
/// { "text": "fk-one\nfk-two\n" }
/// ```
pub async fn import(
    State(service): State<CredentialService>,
    Json(request): Json<ImportRequest>,
) -> AppResult<Json<ImportResult>> {
    let entries = request.into_entries();
    if entries.iter().all(|e| e.trim().is_empty()) {
        return Err(AppError::BadRequest("no keys to import".to_string()));
    }
    Ok(Json(service.batch_import(&entries).await?))
}

/// Delete several keys.
///
/// `POST /api/keys/batch-delete`
pub async fn batch_delete(
    State(service): State<CredentialService>,
    Json(request): Json<BatchDeleteRequest>,
) -> AppResult<Json<DeleteReport>> {
    if request.ids.is_empty() {
        return Err(AppError::BadRequest("no ids given".to_string()));
    }
    Ok(Json(service.batch_delete(&request.ids).await))
}

/// Export every key, one per line.
///
/// `GET /api/keys/export`
pub async fn export(State(service): State<CredentialService>) -> AppResult<impl IntoResponse> {
    let keys = service.export().await?;
    let mut body = keys.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"keys.txt\""),
        ],
        body,
    ))
}
