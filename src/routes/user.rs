use actix_multipart::Multipart;
use actix_web::{http::header, middleware::from_fn, web, HttpRequest, HttpResponse};
use chrono::{Local, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::types::Json;

use super::{
    check_credentials, check_image, hash, message, normalize_email, parse_address, required,
    token_response,
};
use crate::{
    appointments::{self, NewBooking},
    auth::{new_id, user_guard, verify_password, AuthUser},
    db::{fetch_appointment, fetch_user, fetch_user_appointments, fetch_user_by_email, mark_paid},
    error::ApiError,
    media::{read_form, IMAGE_FIELD},
    models::{AppointmentRow, UserProfile, DEFAULT_PHONE, NOT_SELECTED, ROLE_USER},
    payments::{minor_units, stripe::CheckoutRequest},
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/user")
            .service(web::resource("/register").route(web::post().to(register)))
            .service(web::resource("/login").route(web::post().to(login)))
            .service(
                web::resource("/get-profile")
                    .wrap(from_fn(user_guard))
                    .route(web::get().to(get_profile)),
            )
            .service(
                web::resource("/update-profile")
                    .wrap(from_fn(user_guard))
                    .route(web::post().to(update_profile)),
            )
            .service(
                web::resource("/book-appointment")
                    .wrap(from_fn(user_guard))
                    .route(web::post().to(book_appointment)),
            )
            .service(
                web::resource("/appointments")
                    .wrap(from_fn(user_guard))
                    .route(web::get().to(list_appointments)),
            )
            .service(
                web::resource("/cancel-appointment")
                    .wrap(from_fn(user_guard))
                    .route(web::post().to(cancel_appointment)),
            )
            .service(
                web::resource("/payment-razorpay")
                    .wrap(from_fn(user_guard))
                    .route(web::post().to(payment_razorpay)),
            )
            .service(
                web::resource("/verifyRazorpay")
                    .wrap(from_fn(user_guard))
                    .route(web::post().to(verify_razorpay)),
            )
            .service(
                web::resource("/payment-stripe")
                    .wrap(from_fn(user_guard))
                    .route(web::post().to(payment_stripe)),
            )
            .service(
                web::resource("/verifyStripe")
                    .wrap(from_fn(user_guard))
                    .route(web::post().to(verify_stripe)),
            ),
    );
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookRequest {
    #[serde(alias = "stylistId")]
    styl_id: Option<String>,
    slot_date: Option<String>,
    slot_time: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppointmentRequest {
    appointment_id: Option<String>,
}

#[derive(Deserialize)]
struct RazorpayVerifyRequest {
    razorpay_order_id: Option<String>,
    razorpay_payment_id: Option<String>,
    razorpay_signature: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StripeVerifyRequest {
    appointment_id: Option<String>,
    success: Option<Value>,
    #[serde(rename = "session_id")]
    session_id: Option<String>,
}

async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (Some(name), Some(email), Some(password)) = (
        required(payload.name),
        required(payload.email),
        payload.password.filter(|password| !password.is_empty()),
    ) else {
        return Err(ApiError::validation("Missing Details"));
    };

    let email = normalize_email(&email);
    check_credentials(&email, &password)?;

    if fetch_user_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let user_id = new_id();
    sqlx::query(
        r#"INSERT INTO users (id, name, email, password_hash, phone, gender, dob, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&user_id)
    .bind(&name)
    .bind(&email)
    .bind(hash(&password)?)
    .bind(DEFAULT_PHONE)
    .bind(NOT_SELECTED)
    .bind(NOT_SELECTED)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    log::info!("Registered user {user_id}");
    token_response(&user_id, ROLE_USER, &state.config)
}

async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (Some(email), Some(password)) = (required(payload.email), payload.password) else {
        return Err(ApiError::validation("Missing Details"));
    };

    let user = fetch_user_by_email(&state.db, &normalize_email(&email))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User does not exist".to_string()))?;

    if !verify_password(&password, &user.password_hash) {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    token_response(&user.id, ROLE_USER, &state.config)
}

async fn get_profile(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let user = fetch_user(&state.db, &auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "userData": UserProfile::from(user),
    })))
}

/// Text fields are saved before the optional image is uploaded; a failed
/// upload leaves the text changes in place.
async fn update_profile(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    multipart: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = read_form(multipart).await?;
    let (Some(name), Some(phone), Some(dob), Some(gender)) = (
        form.text("name"),
        form.text("phone"),
        form.text("dob"),
        form.text("gender"),
    ) else {
        return Err(ApiError::validation("Data Missing"));
    };
    let address = form.text("address").map(parse_address).transpose()?;
    let image = form.file(IMAGE_FIELD);
    if let Some(file) = image {
        check_image(file)?;
    }

    let updated = sqlx::query(
        r#"UPDATE users
           SET name = ?, phone = ?, dob = ?, gender = ?, address = COALESCE(?, address)
           WHERE id = ?"#,
    )
    .bind(name)
    .bind(phone)
    .bind(dob)
    .bind(gender)
    .bind(address.map(Json))
    .bind(&auth.id)
    .execute(&state.db)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    if let Some(file) = image {
        let url = state.images.upload(file).await?;
        sqlx::query("UPDATE users SET image = ? WHERE id = ?")
            .bind(url)
            .bind(&auth.id)
            .execute(&state.db)
            .await?;
    }

    Ok(message("Profile Updated"))
}

async fn book_appointment(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<BookRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (Some(stylist_id), Some(slot_date), Some(slot_time)) = (
        required(payload.styl_id),
        required(payload.slot_date),
        required(payload.slot_time),
    ) else {
        return Err(ApiError::validation("Missing Details"));
    };

    let appointment = appointments::book(
        &state.db,
        NewBooking {
            user_id: &auth.id,
            stylist_id: &stylist_id,
            slot_date: &slot_date,
            slot_time: &slot_time,
        },
        Local::now().naive_local(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Appointment Booked",
        "appointment": appointment,
    })))
}

async fn list_appointments(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let appointments = fetch_user_appointments(&state.db, &auth.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "appointments": appointments })))
}

/// Loads an appointment the caller owns.
async fn owned_appointment(
    state: &AppState,
    auth: &AuthUser,
    appointment_id: Option<String>,
) -> Result<AppointmentRow, ApiError> {
    let appointment_id =
        required(appointment_id).ok_or_else(|| ApiError::validation("Missing Details"))?;
    let appointment = fetch_appointment(&state.db, &appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;
    if appointment.user_id != auth.id {
        return Err(ApiError::Forbidden("Unauthorized action".to_string()));
    }
    Ok(appointment)
}

/// An owned appointment that can still be paid for.
async fn payable_appointment(
    state: &AppState,
    auth: &AuthUser,
    appointment_id: Option<String>,
) -> Result<AppointmentRow, ApiError> {
    let appointment = owned_appointment(state, auth, appointment_id).await?;
    if appointment.cancelled {
        return Err(ApiError::validation("Appointment Cancelled or not found"));
    }
    if appointment.payment {
        return Err(ApiError::Conflict("Appointment already paid".to_string()));
    }
    Ok(appointment)
}

async fn cancel_appointment(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<AppointmentRequest>,
) -> Result<HttpResponse, ApiError> {
    let appointment = owned_appointment(&state, &auth, payload.into_inner().appointment_id).await?;
    appointments::cancel(&state.db, &appointment).await?;
    Ok(message("Appointment Cancelled"))
}

async fn payment_razorpay(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<AppointmentRequest>,
) -> Result<HttpResponse, ApiError> {
    let appointment =
        payable_appointment(&state, &auth, payload.into_inner().appointment_id).await?;

    let order = state
        .razorpay
        .create_order(
            minor_units(appointment.amount),
            &state.config.currency,
            &appointment.id,
        )
        .await?;

    log::info!("Created Razorpay order {} for appointment {}", order.id, appointment.id);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "key": state.razorpay.key_id(),
        "order": order,
    })))
}

async fn verify_razorpay(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<RazorpayVerifyRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let order_id =
        required(payload.razorpay_order_id).ok_or_else(|| ApiError::validation("Missing Details"))?;

    if let (Some(payment_id), Some(signature)) = (
        required(payload.razorpay_payment_id),
        required(payload.razorpay_signature),
    ) {
        state
            .razorpay
            .verify_signature(&order_id, &payment_id, &signature)?;
    }

    let order = state.razorpay.fetch_order(&order_id).await?;
    let appointment = owned_appointment(&state, &auth, order.receipt.clone()).await?;

    if !order.is_paid() {
        return Err(ApiError::validation("Payment Failed"));
    }

    mark_paid(&state.db, &appointment.id).await?;
    log::info!("Razorpay order {} paid appointment {}", order.id, appointment.id);
    Ok(message("Payment Successful"))
}

fn frontend_origin(req: &HttpRequest, state: &AppState) -> String {
    req.headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .filter(|origin| origin.starts_with("http://") || origin.starts_with("https://"))
        .unwrap_or(&state.config.frontend_url)
        .trim_end_matches('/')
        .to_string()
}

async fn payment_stripe(
    req: HttpRequest,
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<AppointmentRequest>,
) -> Result<HttpResponse, ApiError> {
    let appointment =
        payable_appointment(&state, &auth, payload.into_inner().appointment_id).await?;
    let origin = frontend_origin(&req, &state);

    let session = state
        .stripe
        .create_checkout_session(&CheckoutRequest {
            amount: minor_units(appointment.amount),
            currency: &state.config.currency,
            product_name: "Appointment Fees",
            reference: &appointment.id,
            success_url: format!(
                "{origin}/verify?success=true&appointmentId={}&session_id={{CHECKOUT_SESSION_ID}}",
                appointment.id
            ),
            cancel_url: format!(
                "{origin}/verify?success=false&appointmentId={}",
                appointment.id
            ),
        })
        .await?;

    log::info!("Created Stripe session {} for appointment {}", session.id, appointment.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "session_url": session.url })))
}

fn is_true(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => text == "true",
        _ => false,
    }
}

async fn verify_stripe(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<StripeVerifyRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let appointment = owned_appointment(&state, &auth, payload.appointment_id).await?;
    if !is_true(payload.success.as_ref()) {
        return Err(ApiError::validation("Payment Failed"));
    }

    let session_id =
        required(payload.session_id).ok_or_else(|| ApiError::validation("Missing Details"))?;
    let session = state.stripe.retrieve_session(&session_id).await?;
    if !session.is_paid() || session.client_reference_id.as_deref() != Some(appointment.id.as_str()) {
        return Err(ApiError::validation("Payment Failed"));
    }

    mark_paid(&state.db, &appointment.id).await?;
    log::info!("Stripe session {} paid appointment {}", session.id, appointment.id);
    Ok(message("Payment Successful"))
}
