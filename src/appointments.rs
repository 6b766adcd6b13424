//! Booking, cancellation and completion of appointments.
//!
//! Booking and cancellation keep the stylist's `slots_booked` map in step with
//! the appointments table; both run inside a single transaction.

use std::collections::HashSet;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::{types::Json, SqlitePool};

use crate::{
    auth::new_id,
    error::ApiError,
    models::{
        AppointmentRow, StylistRow, UserProfile, UserRow, STYLIST_COLUMNS, USER_COLUMNS,
    },
    slots::{is_slot_boundary, parse_slot, Slot},
};

#[derive(Debug, Clone)]
pub struct NewBooking<'a> {
    pub user_id: &'a str,
    pub stylist_id: &'a str,
    pub slot_date: &'a str,
    pub slot_time: &'a str,
}

/// Books a free slot for the user. `now` is the local wall-clock time.
pub async fn book(
    pool: &SqlitePool,
    booking: NewBooking<'_>,
    now: NaiveDateTime,
) -> Result<AppointmentRow, ApiError> {
    let start = parse_slot(booking.slot_date, booking.slot_time)
        .filter(|start| is_slot_boundary(*start))
        .ok_or_else(|| ApiError::validation("Invalid slot"))?;
    if start <= now {
        return Err(ApiError::validation("Slot is in the past"));
    }
    let slot = Slot::at(start);

    let mut tx = pool.begin().await?;

    let stylist = sqlx::query_as::<_, StylistRow>(&format!(
        "SELECT {STYLIST_COLUMNS} FROM stylists WHERE id = ? LIMIT 1"
    ))
    .bind(booking.stylist_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Stylist not found"))?;

    if !stylist.available {
        return Err(ApiError::Conflict("Stylist Not Available".to_string()));
    }

    let mut slots_booked = stylist.slots_booked.0.clone();
    if !slots_booked.book(&slot.slot_date, &slot.slot_time) {
        return Err(ApiError::Conflict("Slot Not Available".to_string()));
    }

    let user = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ? LIMIT 1"
    ))
    .bind(booking.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    let appointment = AppointmentRow {
        id: new_id(),
        user_id: user.id.clone(),
        stylist_id: stylist.id.clone(),
        slot_date: slot.slot_date,
        slot_time: slot.slot_time,
        user_data: Json(UserProfile::from(user)),
        stylist_data: Json(stylist.profile()),
        amount: stylist.fees,
        booked_at: Utc::now().timestamp_millis(),
        cancelled: false,
        payment: false,
        is_completed: false,
    };

    sqlx::query(
        r#"INSERT INTO appointments
           (id, user_id, stylist_id, slot_date, slot_time, user_data, stylist_data, amount,
            booked_at, cancelled, payment, is_completed)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, 0)"#,
    )
    .bind(&appointment.id)
    .bind(&appointment.user_id)
    .bind(&appointment.stylist_id)
    .bind(&appointment.slot_date)
    .bind(&appointment.slot_time)
    .bind(&appointment.user_data)
    .bind(&appointment.stylist_data)
    .bind(appointment.amount)
    .bind(appointment.booked_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE stylists SET slots_booked = ? WHERE id = ?")
        .bind(Json(&slots_booked))
        .bind(&stylist.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    log::debug!(
        "Stylist {} has {} booked slots",
        appointment.stylist_id,
        slots_booked.len()
    );
    log::info!(
        "Booked {} {} with stylist {} for user {}",
        appointment.slot_date,
        appointment.slot_time,
        appointment.stylist_id,
        appointment.user_id
    );
    Ok(appointment)
}

/// Marks the appointment cancelled and frees its slot.
pub async fn cancel(pool: &SqlitePool, appointment: &AppointmentRow) -> Result<(), ApiError> {
    if appointment.is_completed {
        return Err(ApiError::Conflict(
            "Completed appointments cannot be cancelled".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE appointments SET cancelled = 1 WHERE id = ? AND cancelled = 0 AND is_completed = 0",
    )
    .bind(&appointment.id)
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(ApiError::Conflict("Appointment already cancelled".to_string()));
    }

    let stylist = sqlx::query_as::<_, StylistRow>(&format!(
        "SELECT {STYLIST_COLUMNS} FROM stylists WHERE id = ? LIMIT 1"
    ))
    .bind(&appointment.stylist_id)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(stylist) = stylist {
        let mut slots_booked = stylist.slots_booked.0;
        if slots_booked.release(&appointment.slot_date, &appointment.slot_time) {
            sqlx::query("UPDATE stylists SET slots_booked = ? WHERE id = ?")
                .bind(Json(&slots_booked))
                .bind(&stylist.id)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;
    log::info!("Cancelled appointment {}", appointment.id);
    Ok(())
}

pub async fn complete(pool: &SqlitePool, appointment: &AppointmentRow) -> Result<(), ApiError> {
    let updated =
        sqlx::query("UPDATE appointments SET is_completed = 1 WHERE id = ? AND cancelled = 0")
            .bind(&appointment.id)
            .execute(pool)
            .await?;
    if updated.rows_affected() == 0 {
        return Err(ApiError::Conflict(
            "Cancelled appointments cannot be completed".to_string(),
        ));
    }
    log::info!("Completed appointment {}", appointment.id);
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StylistDashboard {
    pub earnings: f64,
    pub appointments: usize,
    pub customers: usize,
    pub latest_appointments: Vec<AppointmentRow>,
}

impl StylistDashboard {
    /// Expects `appointments` newest first.
    pub fn from_appointments(appointments: Vec<AppointmentRow>) -> Self {
        let earnings = appointments
            .iter()
            .filter(|item| item.is_completed || item.payment)
            .map(|item| item.amount)
            .sum();
        let customers = appointments
            .iter()
            .map(|item| item.user_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        Self {
            earnings,
            appointments: appointments.len(),
            customers,
            latest_appointments: appointments,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Local, NaiveTime};

    use super::*;
    use crate::{
        db::{fetch_appointment, fetch_stylist, testing},
        slots::{slot_date_key, slot_time_label},
    };

    fn tomorrow_at(hour: u32, minute: u32) -> (String, String) {
        let date = Local::now().date_naive() + Duration::days(1);
        let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap();
        (slot_date_key(date), slot_time_label(time))
    }

    fn now() -> NaiveDateTime {
        Local::now().naive_local()
    }

    #[actix_web::test]
    async fn booking_records_slot_and_snapshots() {
        let pool = testing::test_pool().await;
        let user_id = testing::insert_user(&pool, "Ama", "ama@example.com", "password123").await;
        let stylist_id = testing::insert_stylist(&pool, "Nadia", "nadia@example.com", 2500.0).await;
        let (slot_date, slot_time) = tomorrow_at(11, 30);

        let appointment = book(
            &pool,
            NewBooking {
                user_id: &user_id,
                stylist_id: &stylist_id,
                slot_date: &slot_date,
                slot_time: &slot_time,
            },
            now(),
        )
        .await
        .unwrap();

        assert_eq!(appointment.amount, 2500.0);
        assert_eq!(appointment.user_data.0.name, "Ama");
        assert_eq!(appointment.stylist_data.0.name, "Nadia");

        let stylist = fetch_stylist(&pool, &stylist_id).await.unwrap().unwrap();
        assert!(stylist.slots_booked.0.contains(&slot_date, &slot_time));

        let stored = fetch_appointment(&pool, &appointment.id).await.unwrap().unwrap();
        assert_eq!(stored.slot_time, slot_time);
        assert!(!stored.cancelled);
    }

    #[actix_web::test]
    async fn double_booking_is_rejected_and_cancel_frees_slot() {
        let pool = testing::test_pool().await;
        let first = testing::insert_user(&pool, "Ama", "ama@example.com", "password123").await;
        let second = testing::insert_user(&pool, "Kavi", "kavi@example.com", "password123").await;
        let stylist_id = testing::insert_stylist(&pool, "Nadia", "nadia@example.com", 1000.0).await;
        let (slot_date, slot_time) = tomorrow_at(15, 0);

        let appointment = book(
            &pool,
            NewBooking {
                user_id: &first,
                stylist_id: &stylist_id,
                slot_date: &slot_date,
                slot_time: &slot_time,
            },
            now(),
        )
        .await
        .unwrap();

        let clash = book(
            &pool,
            NewBooking {
                user_id: &second,
                stylist_id: &stylist_id,
                slot_date: &slot_date,
                slot_time: &slot_time,
            },
            now(),
        )
        .await;
        assert!(matches!(clash, Err(ApiError::Conflict(message)) if message == "Slot Not Available"));

        cancel(&pool, &appointment).await.unwrap();
        let stylist = fetch_stylist(&pool, &stylist_id).await.unwrap().unwrap();
        assert!(!stylist.slots_booked.0.contains(&slot_date, &slot_time));

        let rebooked = book(
            &pool,
            NewBooking {
                user_id: &second,
                stylist_id: &stylist_id,
                slot_date: &slot_date,
                slot_time: &slot_time,
            },
            now(),
        )
        .await;
        assert!(rebooked.is_ok());

        let again = cancel(&pool, &appointment).await;
        assert!(matches!(again, Err(ApiError::Conflict(_))));
        let stylist = fetch_stylist(&pool, &stylist_id).await.unwrap().unwrap();
        assert!(stylist.slots_booked.0.contains(&slot_date, &slot_time));
    }

    #[actix_web::test]
    async fn rejects_invalid_and_past_slots() {
        let pool = testing::test_pool().await;
        let user_id = testing::insert_user(&pool, "Ama", "ama@example.com", "password123").await;
        let stylist_id = testing::insert_stylist(&pool, "Nadia", "nadia@example.com", 1000.0).await;

        let (slot_date, _) = tomorrow_at(10, 0);
        for slot_time in ["09:30 AM", "09:00 PM", "10:15 AM", "noon"] {
            let result = book(
                &pool,
                NewBooking {
                    user_id: &user_id,
                    stylist_id: &stylist_id,
                    slot_date: &slot_date,
                    slot_time,
                },
                now(),
            )
            .await;
            assert!(matches!(result, Err(ApiError::Validation(_))), "{slot_time}");
        }

        let result = book(
            &pool,
            NewBooking {
                user_id: &user_id,
                stylist_id: &stylist_id,
                slot_date: "1_1_2020",
                slot_time: "10:00 AM",
            },
            now(),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Validation(message)) if message == "Slot is in the past"));
    }

    #[actix_web::test]
    async fn unavailable_or_missing_stylist() {
        let pool = testing::test_pool().await;
        let user_id = testing::insert_user(&pool, "Ama", "ama@example.com", "password123").await;
        let stylist_id = testing::insert_stylist(&pool, "Nadia", "nadia@example.com", 1000.0).await;
        let (slot_date, slot_time) = tomorrow_at(12, 0);

        let missing = book(
            &pool,
            NewBooking {
                user_id: &user_id,
                stylist_id: "missing",
                slot_date: &slot_date,
                slot_time: &slot_time,
            },
            now(),
        )
        .await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));

        sqlx::query("UPDATE stylists SET available = 0 WHERE id = ?")
            .bind(&stylist_id)
            .execute(&pool)
            .await
            .unwrap();
        let unavailable = book(
            &pool,
            NewBooking {
                user_id: &user_id,
                stylist_id: &stylist_id,
                slot_date: &slot_date,
                slot_time: &slot_time,
            },
            now(),
        )
        .await;
        assert!(matches!(unavailable, Err(ApiError::Conflict(message)) if message == "Stylist Not Available"));
    }

    #[actix_web::test]
    async fn cancelled_appointments_cannot_be_completed() {
        let pool = testing::test_pool().await;
        let user_id = testing::insert_user(&pool, "Ama", "ama@example.com", "password123").await;
        let stylist_id = testing::insert_stylist(&pool, "Nadia", "nadia@example.com", 1000.0).await;
        let (slot_date, slot_time) = tomorrow_at(13, 0);

        let appointment = book(
            &pool,
            NewBooking {
                user_id: &user_id,
                stylist_id: &stylist_id,
                slot_date: &slot_date,
                slot_time: &slot_time,
            },
            now(),
        )
        .await
        .unwrap();
        cancel(&pool, &appointment).await.unwrap();

        assert!(matches!(complete(&pool, &appointment).await, Err(ApiError::Conflict(_))));
    }

    fn appointment(user_id: &str, amount: f64, completed: bool, paid: bool) -> AppointmentRow {
        AppointmentRow {
            id: new_id(),
            user_id: user_id.to_string(),
            stylist_id: "s1".to_string(),
            slot_date: "5_3_2026".to_string(),
            slot_time: "10:00 AM".to_string(),
            user_data: Json(UserProfile {
                id: user_id.to_string(),
                name: "Someone".to_string(),
                email: "someone@example.com".to_string(),
                image: String::new(),
                phone: "000000000".to_string(),
                address: Default::default(),
                gender: "Not Selected".to_string(),
                dob: "Not Selected".to_string(),
            }),
            stylist_data: Json(crate::models::StylistProfile {
                id: "s1".to_string(),
                name: "Nadia".to_string(),
                email: None,
                image: String::new(),
                service_type: "Hair Stylist".to_string(),
                qualification: String::new(),
                experience: String::new(),
                about: String::new(),
                available: true,
                fees: amount,
                address: Default::default(),
                slots_booked: Default::default(),
                date: String::new(),
            }),
            amount,
            booked_at: 0,
            cancelled: false,
            payment: paid,
            is_completed: completed,
        }
    }

    #[test]
    fn stylist_dashboard_counts_earnings_and_customers() {
        let dashboard = StylistDashboard::from_appointments(vec![
            appointment("u1", 1000.0, true, false),
            appointment("u1", 500.0, false, true),
            appointment("u2", 700.0, false, false),
        ]);
        assert_eq!(dashboard.earnings, 1500.0);
        assert_eq!(dashboard.appointments, 3);
        assert_eq!(dashboard.customers, 2);
        assert_eq!(dashboard.latest_appointments.len(), 3);
    }
}
