pub mod admin;
pub mod stylist;
pub mod user;

use actix_web::{error::JsonPayloadError, web, HttpResponse};
use serde_json::json;
use validator::ValidateEmail;

use crate::{
    auth::{issue_token, MIN_PASSWORD_LEN},
    config::Config,
    error::ApiError,
    media::UploadedFile,
    models::Address,
};

const JSON_LIMIT: usize = 64 * 1024;

/// JSON extractor settings shared by every route; bad bodies get the usual failure shape.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| {
            let message = match &err {
                JsonPayloadError::ContentType => "Expected a JSON body".to_string(),
                JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                    "Request body is too large".to_string()
                }
                other => format!("Invalid JSON body: {other}"),
            };
            ApiError::validation(message).into()
        })
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

/// Trimmed, non-empty value of an optional request field.
fn required(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Email format and password strength checks shared by user sign-up and stylist creation.
fn check_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if !email.to_string().validate_email() {
        return Err(ApiError::validation("Please enter a valid email"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("Please enter a strong password"));
    }
    Ok(())
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    serde_json::from_str(raw).map_err(|_| ApiError::validation("Invalid address"))
}

fn parse_fees(raw: &str) -> Result<f64, ApiError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ApiError::validation("Please enter a valid fee"))
        .and_then(check_fees)
}

fn check_fees(fees: f64) -> Result<f64, ApiError> {
    if fees.is_finite() && fees >= 0.0 {
        Ok(fees)
    } else {
        Err(ApiError::validation("Please enter a valid fee"))
    }
}

fn check_image(file: &UploadedFile) -> Result<(), ApiError> {
    if file.content_type.starts_with("image/") {
        Ok(())
    } else {
        Err(ApiError::validation("Only image uploads are allowed"))
    }
}

fn hash(password: &str) -> Result<String, ApiError> {
    crate::auth::hash_password(password)
        .map_err(|err| ApiError::Internal(format!("Password hashing failed: {err}")))
}

fn token_response(subject: &str, role: &str, config: &Config) -> Result<HttpResponse, ApiError> {
    let token = issue_token(subject, role, config)
        .map_err(|err| ApiError::Internal(format!("Token signing failed: {err}")))?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "token": token })))
}

fn message(text: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "message": text }))
}

#[cfg(test)]
pub(crate) mod testing {
    use actix_web::{body::MessageBody, dev::ServiceResponse};
    use serde_json::Value;

    /// Parses a JSON response body.
    pub async fn json_body<B: MessageBody>(resp: ServiceResponse<B>) -> Value {
        let body = actix_web::test::read_body(resp).await;
        serde_json::from_slice(&body).expect("json body")
    }

    pub fn multipart(fields: &[(&str, &str)], file: Option<(&str, &str, &str)>) -> (String, Vec<u8>) {
        multipart_with(fields, file.map(|file| (file, b"image-bytes".as_slice())))
    }

    /// Builds a `multipart/form-data` body whose file part carries `contents`.
    pub fn multipart_with(
        fields: &[(&str, &str)],
        file: Option<((&str, &str, &str), &[u8])>,
    ) -> (String, Vec<u8>) {
        let boundary = "sensaloon-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(((name, filename, content_type), contents)) = file {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(contents);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }
}
