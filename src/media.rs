//! Multipart form parsing and image upload to Cloudinary.

use std::collections::{BTreeMap, HashMap};

use actix_multipart::Multipart;
use actix_web::web;
use chrono::Utc;
use futures_util::StreamExt;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{config::CloudinaryConfig, error::ApiError};

/// Name of the only file part a form may carry.
pub const IMAGE_FIELD: &str = "image";
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const MAX_FIELD_BYTES: usize = 64 * 1024;
const MAX_TEXT_FIELDS: usize = 32;
const MAX_TEXT_BYTES: usize = 256 * 1024;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("image storage is not configured")]
    Disabled,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: web::Bytes,
}

/// Text fields and files of a `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, UploadedFile>,
}

impl FormData {
    /// Trimmed, non-empty text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name).filter(|file| !file.bytes.is_empty())
    }
}

/// Reads a `multipart/form-data` body.
///
/// At most one file is accepted, under [`IMAGE_FIELD`]. Text parts are capped in
/// count and in total size so a body can hold at most one image plus a small form.
pub async fn read_form(mut multipart: Multipart) -> Result<FormData, ApiError> {
    let mut form = FormData::default();
    let mut text_parts = 0;
    let mut text_bytes = 0;

    while let Some(field) = multipart.next().await {
        let mut field = field.map_err(|err| ApiError::validation(format!("Invalid form data: {err}")))?;

        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let filename = field
            .content_disposition()
            .and_then(|disposition| disposition.get_filename())
            .map(str::to_string);
        let content_type = field
            .content_type()
            .map(|mime| mime.essence_str().to_string());

        let limit = match filename {
            Some(_) if name != IMAGE_FIELD => {
                return Err(ApiError::validation(format!("Unexpected file field '{name}'")));
            }
            Some(_) if form.files.contains_key(IMAGE_FIELD) => {
                return Err(ApiError::validation("Only one image may be uploaded"));
            }
            Some(_) => MAX_IMAGE_BYTES,
            None => {
                text_parts += 1;
                if text_parts > MAX_TEXT_FIELDS {
                    return Err(ApiError::validation("Too many form fields"));
                }
                MAX_FIELD_BYTES.min(MAX_TEXT_BYTES.saturating_sub(text_bytes))
            }
        };
        let mut data = web::BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|err| ApiError::validation(format!("Invalid form data: {err}")))?;
            if data.len() + chunk.len() > limit {
                return Err(if filename.is_none() && limit < MAX_FIELD_BYTES {
                    ApiError::validation("Form data is too large")
                } else {
                    ApiError::validation(format!("Field '{name}' is too large"))
                });
            }
            data.extend_from_slice(&chunk);
        }

        match filename {
            Some(filename) => {
                form.files.insert(
                    name,
                    UploadedFile {
                        filename,
                        content_type: content_type
                            .unwrap_or_else(|| "application/octet-stream".to_string()),
                        bytes: data.freeze(),
                    },
                );
            }
            None => {
                text_bytes += data.len();
                let text = String::from_utf8(data.to_vec())
                    .map_err(|_| ApiError::validation(format!("Field '{name}' is not valid text")))?;
                form.fields.insert(name, text);
            }
        }
    }

    Ok(form)
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct ImageStore {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

impl ImageStore {
    pub fn new(http: reqwest::Client, config: CloudinaryConfig) -> Self {
        Self { http, config }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled()
    }

    /// Uploads an image and returns its public HTTPS URL.
    pub async fn upload(&self, file: &UploadedFile) -> Result<String, MediaError> {
        if !self.enabled() {
            return Err(MediaError::Disabled);
        }

        let timestamp = Utc::now().timestamp().to_string();
        let mut params = BTreeMap::new();
        params.insert("timestamp", timestamp.clone());
        let signature = sign_params(&params, &self.config.api_secret);

        let part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.filename.clone())
            .mime_str(&file.content_type)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let url = format!(
            "{}/v1_1/{}/image/upload",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name
        );
        let response = self.http.post(url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| "unexpected response".to_string());
            return Err(MediaError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<UploadResponse>().await?;
        log::info!("Uploaded image {} to {}", file.filename, body.secure_url);
        Ok(body.secure_url)
    }
}

/// Signature over the sorted upload parameters followed by the API secret.
pub fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let joined = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
