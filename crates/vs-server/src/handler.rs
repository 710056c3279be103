use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use vs_store::BlobStore;
use vs_types::{AnalysisRecord, ContentHash, Identity, RecordStatus, DEFAULT_CONTENT_TYPE};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

type AppStateRef = State<Arc<AppState>>;

/// A contract analysis together with its signers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractView {
    #[serde(flatten)]
    pub record: AnalysisRecord,
    pub signers: BTreeSet<Identity>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub hash: ContentHash,
}

#[derive(Debug, Deserialize)]
pub struct SignRequest {
    pub signer: String,
}

#[derive(Debug, Serialize)]
pub struct SignResponse {
    pub hash: ContentHash,
    pub signers: BTreeSet<Identity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycRequest {
    #[serde(alias = "address")]
    pub identity: String,
    pub file_hash: String,
    /// Verify again even if a settled record exists.
    #[serde(default)]
    pub reverify: bool,
}

/// 200 for a settled success, 502 when the external call failed.
fn record_status(status: RecordStatus) -> StatusCode {
    match status {
        RecordStatus::Ready => StatusCode::OK,
        RecordStatus::Failed => StatusCode::BAD_GATEWAY,
        RecordStatus::Pending => StatusCode::ACCEPTED,
    }
}

fn parse_hash(raw: &str) -> ServerResult<ContentHash> {
    Ok(raw.parse::<ContentHash>()?)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn multipart_error(e: MultipartError, limit: usize) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge { limit }
    } else {
        ServerError::Validation(e.body_text())
    }
}

/// `POST /files/upload`: store the multipart field `file`.
pub async fn upload_file(
    State(state): AppStateRef,
    mut multipart: Multipart,
) -> ServerResult<(StatusCode, Json<UploadResponse>)> {
    let limit = state.max_upload_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_owned)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned());
        let filename = field.file_name().unwrap_or_default().to_owned();
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;

        if bytes.is_empty() {
            return Err(ServerError::Validation("file is empty".into()));
        }
        if bytes.len() > limit {
            return Err(ServerError::PayloadTooLarge { limit });
        }
        if !state.config().allows_content_type(&content_type) {
            return Err(ServerError::Validation(format!(
                "content type {content_type} is not accepted"
            )));
        }

        let size = bytes.len();
        let hash = state.blobs.put(bytes.to_vec(), &content_type, &filename)?;
        info!(hash = %hash.short_hex(), size, %content_type, "stored upload");
        return Ok((StatusCode::CREATED, Json(UploadResponse { hash })));
    }

    Err(ServerError::Validation("file is required".into()))
}

/// `GET /files/:hash`: raw bytes with the stored content type.
pub async fn get_file(State(state): AppStateRef, Path(hash): Path<String>) -> ServerResult<Response> {
    let hash = parse_hash(&hash)?;
    let blob = state
        .blobs
        .get(&hash)?
        .ok_or_else(|| ServerError::NotFound(format!("file {hash}")))?;
    let content_type = blob.content_type().to_owned();
    Ok(([(header::CONTENT_TYPE, content_type)], blob.bytes).into_response())
}

/// `GET /contracts`: every analysis computed so far, with signers.
pub async fn list_contracts(State(state): AppStateRef) -> ServerResult<Json<Vec<ContractView>>> {
    let records = state.analyses.list()?;
    let mut views = Vec::with_capacity(records.len());
    for record in records {
        let signers = state.signatures.get_signers(&record.hash)?;
        views.push(ContractView { record, signers });
    }
    Ok(Json(views))
}

/// `GET /contracts/:hash`: the analysis of an uploaded contract, computed on
/// first request.
pub async fn get_contract(
    State(state): AppStateRef,
    Path(hash): Path<String>,
) -> ServerResult<(StatusCode, Json<ContractView>)> {
    let hash = parse_hash(&hash)?;
    let record = state.analyses.get_or_compute(&hash).await?;
    let signers = state.signatures.get_signers(&hash)?;
    Ok((record_status(record.status), Json(ContractView { record, signers })))
}

/// `POST /contracts/:hash/sign`
pub async fn sign_contract(
    State(state): AppStateRef,
    Path(hash): Path<String>,
    Json(request): Json<SignRequest>,
) -> ServerResult<Json<SignResponse>> {
    let hash = parse_hash(&hash)?;
    let signer = Identity::parse(&request.signer)?;
    let set = state.signatures.add_signer(&hash, signer)?;
    Ok(Json(SignResponse {
        hash,
        signers: set.signers,
    }))
}

/// `PATCH /users/kyc`: verify an uploaded identity document.
pub async fn submit_kyc(
    State(state): AppStateRef,
    Json(request): Json<KycRequest>,
) -> ServerResult<Response> {
    let identity = Identity::parse(&request.identity)?;
    let evidence = parse_hash(&request.file_hash)?;
    let record = if request.reverify {
        state.identities.reverify(&identity, &evidence).await?
    } else {
        state.identities.get_or_verify(&identity, &evidence).await?
    };
    Ok((record_status(record.status), Json(record)).into_response())
}

/// `GET /users/:identity`: the stored verification, or an unverified stub.
pub async fn get_user(
    State(state): AppStateRef,
    Path(identity): Path<String>,
) -> ServerResult<Response> {
    let identity = Identity::parse(&identity)?;
    Ok(match state.identities.get(&identity)? {
        Some(record) => Json(record).into_response(),
        None => Json(json!({ "identity": identity, "isValid": false })).into_response(),
    })
}
