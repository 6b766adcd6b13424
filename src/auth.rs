use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web, Error, HttpMessage, ResponseError,
};
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::Config,
    error::ApiError,
    models::{ROLE_ADMIN, ROLE_STYLIST, ROLE_USER},
    state::AppState,
};

pub const USER_TOKEN_HEADER: &str = "token";
pub const STYLIST_TOKEN_HEADER: &str = "stoken";
pub const ADMIN_TOKEN_HEADER: &str = "atoken";

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = PasswordHash::new(password_hash);
    match parsed_hash {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn issue_token(
    subject: &str,
    role: &str,
    config: &Config,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: subject.to_string(),
        role: role.to_string(),
        iat: now,
        exp: now + config.jwt_ttl_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Shared-secret check for the single configured administrator.
pub fn admin_credentials_match(config: &Config, email: &str, password: &str) -> bool {
    !config.admin_password.is_empty()
        && email.trim().eq_ignore_ascii_case(config.admin_email.trim())
        && password == config.admin_password
}

fn authorize(req: &ServiceRequest, header: &str, role: &str) -> Result<AuthUser, ApiError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ApiError::Internal("application state missing".to_string()))?;

    let token = req
        .headers()
        .get(header)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(ApiError::unauthorized)?;

    let claims = verify_token(token, &state.config.jwt_secret).map_err(|err| {
        log::debug!("Rejected {role} token: {err}");
        ApiError::unauthorized()
    })?;

    if claims.role != role {
        return Err(ApiError::unauthorized());
    }
    if role == ROLE_ADMIN && claims.sub != state.config.admin_email {
        return Err(ApiError::unauthorized());
    }

    Ok(AuthUser { id: claims.sub })
}

async fn guard<B>(
    req: ServiceRequest,
    next: Next<B>,
    header: &str,
    role: &str,
) -> Result<ServiceResponse<BoxBody>, Error>
where
    B: MessageBody + 'static,
{
    let user = match authorize(&req, header, role) {
        Ok(user) => user,
        Err(err) => return Ok(req.into_response(err.error_response())),
    };
    req.extensions_mut().insert(user);
    let res = next.call(req).await?;
    Ok(res.map_into_boxed_body())
}

pub async fn user_guard<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<BoxBody>, Error>
where
    B: MessageBody + 'static,
{
    guard(req, next, USER_TOKEN_HEADER, ROLE_USER).await
}

pub async fn stylist_guard<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<BoxBody>, Error>
where
    B: MessageBody + 'static,
{
    guard(req, next, STYLIST_TOKEN_HEADER, ROLE_STYLIST).await
}

pub async fn admin_guard<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<BoxBody>, Error>
where
    B: MessageBody + 'static,
{
    guard(req, next, ADMIN_TOKEN_HEADER, ROLE_ADMIN).await
}
