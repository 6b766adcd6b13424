use std::{fs, path::Path};

use sqlx::SqlitePool;

use crate::models::{
    AppointmentRow, StylistRow, UserRow, APPOINTMENT_COLUMNS, STYLIST_COLUMNS, USER_COLUMNS,
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn fetch_user(pool: &SqlitePool, user_id: &str) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ? LIMIT 1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = ? LIMIT 1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_stylist(
    pool: &SqlitePool,
    stylist_id: &str,
) -> Result<Option<StylistRow>, sqlx::Error> {
    sqlx::query_as::<_, StylistRow>(&format!(
        "SELECT {STYLIST_COLUMNS} FROM stylists WHERE id = ? LIMIT 1"
    ))
    .bind(stylist_id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_stylist_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<StylistRow>, sqlx::Error> {
    sqlx::query_as::<_, StylistRow>(&format!(
        "SELECT {STYLIST_COLUMNS} FROM stylists WHERE email = ? LIMIT 1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_stylists(pool: &SqlitePool) -> Result<Vec<StylistRow>, sqlx::Error> {
    sqlx::query_as::<_, StylistRow>(&format!(
        "SELECT {STYLIST_COLUMNS} FROM stylists ORDER BY created_at, name"
    ))
    .fetch_all(pool)
    .await
}

pub async fn fetch_appointment(
    pool: &SqlitePool,
    appointment_id: &str,
) -> Result<Option<AppointmentRow>, sqlx::Error> {
    sqlx::query_as::<_, AppointmentRow>(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ? LIMIT 1"
    ))
    .bind(appointment_id)
    .fetch_optional(pool)
    .await
}

/// All appointments, newest booking first.
pub async fn fetch_appointments(pool: &SqlitePool) -> Result<Vec<AppointmentRow>, sqlx::Error> {
    sqlx::query_as::<_, AppointmentRow>(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments ORDER BY booked_at DESC, rowid DESC"
    ))
    .fetch_all(pool)
    .await
}

pub async fn fetch_user_appointments(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<AppointmentRow>, sqlx::Error> {
    sqlx::query_as::<_, AppointmentRow>(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE user_id = ? ORDER BY booked_at DESC, rowid DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_stylist_appointments(
    pool: &SqlitePool,
    stylist_id: &str,
) -> Result<Vec<AppointmentRow>, sqlx::Error> {
    sqlx::query_as::<_, AppointmentRow>(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE stylist_id = ? ORDER BY booked_at DESC, rowid DESC"
    ))
    .bind(stylist_id)
    .fetch_all(pool)
    .await
}

pub async fn mark_paid(pool: &SqlitePool, appointment_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE appointments SET payment = 1 WHERE id = ?")
        .bind(appointment_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Flips the stylist's availability flag. Returns false when no such stylist.
pub async fn toggle_availability(pool: &SqlitePool, stylist_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE stylists SET available = NOT available WHERE id = ?")
        .bind(stylist_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count(pool: &SqlitePool, query: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(query).fetch_one(pool).await
}
