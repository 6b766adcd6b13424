use actix_multipart::Multipart;
use actix_web::{middleware::from_fn, web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json;

use super::{
    check_credentials, check_image, hash, message, normalize_email, parse_address, parse_fees,
    required, token_response,
};
use crate::{
    appointments,
    auth::{admin_credentials_match, admin_guard, new_id},
    db::{count, fetch_appointment, fetch_appointments, fetch_stylist_by_email, fetch_stylists, toggle_availability},
    error::ApiError,
    media::{read_form, IMAGE_FIELD},
    models::{StylistProfile, ROLE_ADMIN},
    slots::BookedSlots,
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/admin")
            .service(web::resource("/login").route(web::post().to(login)))
            .service(
                web::resource("/add-stylist")
                    .wrap(from_fn(admin_guard))
                    .route(web::post().to(add_stylist)),
            )
            .service(
                web::resource("/appointments")
                    .wrap(from_fn(admin_guard))
                    .route(web::get().to(list_appointments)),
            )
            .service(
                web::resource("/cancel-appointment")
                    .wrap(from_fn(admin_guard))
                    .route(web::post().to(cancel_appointment)),
            )
            .service(
                web::resource("/all-stylists")
                    .wrap(from_fn(admin_guard))
                    .route(web::get().to(all_stylists)),
            )
            .service(
                web::resource("/change-availability")
                    .wrap(from_fn(admin_guard))
                    .route(web::post().to(change_availability)),
            )
            .service(
                web::resource("/dashboard")
                    .wrap(from_fn(admin_guard))
                    .route(web::get().to(dashboard)),
            )
            .service(
                web::resource("/delete-stylist")
                    .wrap(from_fn(admin_guard))
                    .route(web::post().to(delete_stylist)),
            ),
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

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StylistRequest {
    #[serde(alias = "stylId")]
    stylist_id: Option<String>,
}

async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (Some(email), Some(password)) = (required(payload.email), payload.password) else {
        return Err(ApiError::validation("Missing Details"));
    };

    if !admin_credentials_match(&state.config, &email, &password) {
        log::warn!("Rejected admin login for {email}");
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    token_response(&state.config.admin_email, ROLE_ADMIN, &state.config)
}

/// Uploads the stylist's image, then stores the stylist. The image is not
/// removed from storage if the insert fails.
async fn add_stylist(
    state: web::Data<AppState>,
    multipart: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = read_form(multipart).await?;
    let (
        Some(name),
        Some(email),
        Some(password),
        Some(service_type),
        Some(qualification),
        Some(experience),
        Some(about),
        Some(fees),
        Some(address),
        Some(image),
    ) = (
        form.text("name"),
        form.text("email"),
        form.text("password"),
        form.text("serviceType"),
        form.text("qualification"),
        form.text("experience"),
        form.text("about"),
        form.text("fees"),
        form.text("address"),
        form.file(IMAGE_FIELD),
    )
    else {
        return Err(ApiError::validation("Missing Details"));
    };

    let email = normalize_email(email);
    check_credentials(&email, password)?;
    let fees = parse_fees(fees)?;
    let address = parse_address(address)?;
    check_image(image)?;

    if fetch_stylist_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::Conflict("Stylist already exists".to_string()));
    }

    let password_hash = hash(password)?;
    let image_url = state.images.upload(image).await?;

    let stylist_id = new_id();
    sqlx::query(
        r#"INSERT INTO stylists
           (id, name, email, password_hash, image, service_type, qualification, experience,
            about, available, fees, address, slots_booked, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?)"#,
    )
    .bind(&stylist_id)
    .bind(name)
    .bind(&email)
    .bind(password_hash)
    .bind(image_url)
    .bind(service_type)
    .bind(qualification)
    .bind(experience)
    .bind(about)
    .bind(fees)
    .bind(Json(address))
    .bind(Json(BookedSlots::default()))
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    log::info!("Added stylist {stylist_id} ({email})");
    Ok(message("Stylist Added"))
}

async fn list_appointments(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let appointments = fetch_appointments(&state.db).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "appointments": appointments })))
}

async fn cancel_appointment(
    state: web::Data<AppState>,
    payload: web::Json<AppointmentRequest>,
) -> Result<HttpResponse, ApiError> {
    let appointment_id = required(payload.into_inner().appointment_id)
        .ok_or_else(|| ApiError::validation("Missing Details"))?;
    let appointment = fetch_appointment(&state.db, &appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    appointments::cancel(&state.db, &appointment).await?;
    Ok(message("Appointment Cancelled"))
}

async fn all_stylists(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let stylists = fetch_stylists(&state.db)
        .await?
        .iter()
        .map(|stylist| stylist.profile())
        .collect::<Vec<StylistProfile>>();
    Ok(HttpResponse::Ok().json(json!({ "success": true, "stylists": stylists })))
}

async fn change_availability(
    state: web::Data<AppState>,
    payload: web::Json<StylistRequest>,
) -> Result<HttpResponse, ApiError> {
    let stylist_id = required(payload.into_inner().stylist_id)
        .ok_or_else(|| ApiError::validation("Missing Details"))?;
    if !toggle_availability(&state.db, &stylist_id).await? {
        return Err(ApiError::not_found("Stylist not found"));
    }
    Ok(message("Availability Changed"))
}

async fn dashboard(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let stylists = count(&state.db, "SELECT COUNT(*) FROM stylists").await?;
    let customers = count(&state.db, "SELECT COUNT(*) FROM users").await?;
    let latest_appointments = fetch_appointments(&state.db).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "dashData": {
            "stylists": stylists,
            "appointments": latest_appointments.len(),
            "customers": customers,
            "latestAppointments": latest_appointments,
        },
    })))
}

async fn delete_stylist(
    state: web::Data<AppState>,
    payload: web::Json<StylistRequest>,
) -> Result<HttpResponse, ApiError> {
    let stylist_id = required(payload.into_inner().stylist_id)
        .ok_or_else(|| ApiError::validation("Stylist ID is required"))?;

    let deleted = sqlx::query("DELETE FROM stylists WHERE id = ?")
        .bind(&stylist_id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Stylist not found"));
    }

    log::info!("Deleted stylist {stylist_id}");
    Ok(message("Stylist deleted successfully"))
}
