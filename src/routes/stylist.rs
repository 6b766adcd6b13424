use actix_web::{middleware::from_fn, web, HttpResponse};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json;

use super::{check_fees, message, normalize_email, parse_fees, required, token_response};
use crate::{
    appointments::{self, StylistDashboard},
    auth::{stylist_guard, verify_password, AuthUser},
    db::{
        fetch_appointment, fetch_stylist, fetch_stylist_appointments, fetch_stylist_by_email,
        fetch_stylists, toggle_availability,
    },
    error::ApiError,
    models::{Address, AppointmentRow, StylistProfile, ROLE_STYLIST},
    slots::{available_slots, Slot},
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/stylist")
            .service(web::resource("/login").route(web::post().to(login)))
            .service(web::resource("/list").route(web::get().to(list)))
            .service(
                web::resource("/appointments")
                    .wrap(from_fn(stylist_guard))
                    .route(web::get().to(list_appointments)),
            )
            .service(
                web::resource("/cancel-appointment")
                    .wrap(from_fn(stylist_guard))
                    .route(web::post().to(cancel_appointment)),
            )
            .service(
                web::resource("/complete-appointment")
                    .wrap(from_fn(stylist_guard))
                    .route(web::post().to(complete_appointment)),
            )
            .service(
                web::resource("/change-availability")
                    .wrap(from_fn(stylist_guard))
                    .route(web::post().to(change_availability)),
            )
            .service(
                web::resource("/dashboard")
                    .wrap(from_fn(stylist_guard))
                    .route(web::get().to(dashboard)),
            )
            .service(
                web::resource("/profile")
                    .wrap(from_fn(stylist_guard))
                    .route(web::get().to(profile)),
            )
            .service(
                web::resource("/update-profile")
                    .wrap(from_fn(stylist_guard))
                    .route(web::post().to(update_profile)),
            )
            .service(web::resource("/{id}/slots").route(web::get().to(slots))),
    );
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppointmentRequest {
    appointment_id: Option<String>,
}

/// Fees arrive as a JSON number or, from form-backed clients, a numeric string.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeesInput {
    Number(f64),
    Text(String),
}

impl FeesInput {
    fn value(&self) -> Result<f64, ApiError> {
        match self {
            Self::Number(fees) => check_fees(*fees),
            Self::Text(raw) => parse_fees(raw),
        }
    }
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    fees: Option<FeesInput>,
    address: Option<Address>,
    available: Option<bool>,
}

async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (Some(email), Some(password)) = (required(payload.email), payload.password) else {
        return Err(ApiError::validation("Missing Details"));
    };

    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());
    let stylist = fetch_stylist_by_email(&state.db, &normalize_email(&email))
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&password, &stylist.password_hash) {
        return Err(invalid());
    }

    token_response(&stylist.id, ROLE_STYLIST, &state.config)
}

async fn list(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let stylists = fetch_stylists(&state.db)
        .await?
        .iter()
        .map(|stylist| stylist.public_profile())
        .collect::<Vec<StylistProfile>>();
    Ok(HttpResponse::Ok().json(json!({ "success": true, "stylists": stylists })))
}

async fn list_appointments(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let appointments = fetch_stylist_appointments(&state.db, &auth.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "appointments": appointments })))
}

async fn own_appointment(
    state: &AppState,
    auth: &AuthUser,
    appointment_id: Option<String>,
) -> Result<AppointmentRow, ApiError> {
    let appointment_id =
        required(appointment_id).ok_or_else(|| ApiError::validation("Missing Details"))?;
    let appointment = fetch_appointment(&state.db, &appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;
    if appointment.stylist_id != auth.id {
        return Err(ApiError::Forbidden("Action Failed".to_string()));
    }
    Ok(appointment)
}

async fn cancel_appointment(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<AppointmentRequest>,
) -> Result<HttpResponse, ApiError> {
    let appointment = own_appointment(&state, &auth, payload.into_inner().appointment_id).await?;
    appointments::cancel(&state.db, &appointment).await?;
    Ok(message("Appointment Cancelled"))
}

async fn complete_appointment(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<AppointmentRequest>,
) -> Result<HttpResponse, ApiError> {
    let appointment = own_appointment(&state, &auth, payload.into_inner().appointment_id).await?;
    appointments::complete(&state.db, &appointment).await?;
    Ok(message("Appointment Completed"))
}

async fn change_availability(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    if !toggle_availability(&state.db, &auth.id).await? {
        return Err(ApiError::not_found("Stylist not found"));
    }
    Ok(message("Availability Changed"))
}

async fn dashboard(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let appointments = fetch_stylist_appointments(&state.db, &auth.id).await?;
    let dash_data = StylistDashboard::from_appointments(appointments);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "dashData": dash_data })))
}

async fn profile(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let stylist = fetch_stylist(&state.db, &auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Stylist not found"))?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "profileData": stylist.profile() })))
}

async fn update_profile(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    if payload.fees.is_none() && payload.address.is_none() && payload.available.is_none() {
        return Err(ApiError::validation("Data Missing"));
    }
    let fees = payload.fees.as_ref().map(FeesInput::value).transpose()?;

    let updated = sqlx::query(
        r#"UPDATE stylists
           SET fees = COALESCE(?, fees),
               address = COALESCE(?, address),
               available = COALESCE(?, available)
           WHERE id = ?"#,
    )
    .bind(fees)
    .bind(payload.address.map(Json))
    .bind(payload.available)
    .bind(&auth.id)
    .execute(&state.db)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(ApiError::not_found("Stylist not found"));
    }

    Ok(message("Profile Updated"))
}

/// Free slots for the next seven days, one list per day.
async fn slots(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let stylist = fetch_stylist(&state.db, &path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Stylist not found"))?;

    let days = available_slots(&stylist.slots_booked.0, Local::now().naive_local())
        .collect::<Vec<Vec<Slot>>>();
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "available": stylist.available,
        "slots": days,
    })))
}
