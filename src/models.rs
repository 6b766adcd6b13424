use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use crate::slots::BookedSlots;

pub const ROLE_USER: &str = "user";
pub const ROLE_STYLIST: &str = "stylist";
pub const ROLE_ADMIN: &str = "admin";

pub const DEFAULT_PHONE: &str = "000000000";
pub const NOT_SELECTED: &str = "Not Selected";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: String,
    pub phone: String,
    pub address: Json<Address>,
    pub gender: String,
    pub dob: String,
    pub created_at: String,
}

/// User data as exposed over the API and snapshotted into appointments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: String,
    pub phone: String,
    pub address: Address,
    pub gender: String,
    pub dob: String,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            image: row.image,
            phone: row.phone,
            address: row.address.0,
            gender: row.gender,
            dob: row.dob,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StylistRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: String,
    pub service_type: String,
    pub qualification: String,
    pub experience: String,
    pub about: String,
    pub available: bool,
    pub fees: f64,
    pub address: Json<Address>,
    pub slots_booked: Json<BookedSlots>,
    pub created_at: String,
}

impl StylistRow {
    pub fn profile(&self) -> StylistProfile {
        StylistProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            email: Some(self.email.clone()),
            image: self.image.clone(),
            service_type: self.service_type.clone(),
            qualification: self.qualification.clone(),
            experience: self.experience.clone(),
            about: self.about.clone(),
            available: self.available,
            fees: self.fees,
            address: self.address.0.clone(),
            slots_booked: self.slots_booked.0.clone(),
            date: self.created_at.clone(),
        }
    }

    /// Profile for the public stylist list, without contact email.
    pub fn public_profile(&self) -> StylistProfile {
        StylistProfile {
            email: None,
            ..self.profile()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylistProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub image: String,
    pub service_type: String,
    pub qualification: String,
    pub experience: String,
    pub about: String,
    pub available: bool,
    pub fees: f64,
    pub address: Address,
    #[serde(rename = "slots_booked")]
    pub slots_booked: BookedSlots,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRow {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub stylist_id: String,
    pub slot_date: String,
    pub slot_time: String,
    pub user_data: Json<UserProfile>,
    pub stylist_data: Json<StylistProfile>,
    pub amount: f64,
    #[serde(rename = "date")]
    pub booked_at: i64,
    pub cancelled: bool,
    pub payment: bool,
    pub is_completed: bool,
}

pub const APPOINTMENT_COLUMNS: &str = "id, user_id, stylist_id, slot_date, slot_time, user_data, stylist_data, \
     amount, booked_at, cancelled, payment, is_completed";

pub const STYLIST_COLUMNS: &str = "id, name, email, password_hash, image, service_type, qualification, \
     experience, about, available, fees, address, slots_booked, created_at";

pub const USER_COLUMNS: &str =
    "id, name, email, password_hash, image, phone, address, gender, dob, created_at";
