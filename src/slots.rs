//! Bookable slot computation.
//!
//! Slots are 30-minute intervals between opening (10:00) and closing (21:00).
//! A stylist's booked slots are kept as a map from a `D_M_YYYY` date key to a
//! list of `HH:MM AM` time labels; availability is derived from that map and the
//! current time, never stored.

use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

pub const OPENING_MINUTE: u32 = 10 * 60;
pub const CLOSING_MINUTE: u32 = 21 * 60;
pub const SLOT_MINUTES: u32 = 30;
pub const BOOKING_DAYS: u64 = 7;

const TIME_LABEL_FORMAT: &str = "%I:%M %p";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookedSlots(BTreeMap<String, Vec<String>>);

impl BookedSlots {
    pub fn contains(&self, slot_date: &str, slot_time: &str) -> bool {
        self.0
            .get(slot_date)
            .is_some_and(|times| times.iter().any(|time| time == slot_time))
    }

    /// Returns `false` if the slot was already taken.
    pub fn book(&mut self, slot_date: &str, slot_time: &str) -> bool {
        if self.contains(slot_date, slot_time) {
            return false;
        }
        self.0
            .entry(slot_date.to_string())
            .or_default()
            .push(slot_time.to_string());
        true
    }

    pub fn release(&mut self, slot_date: &str, slot_time: &str) -> bool {
        let Some(times) = self.0.get_mut(slot_date) else {
            return false;
        };
        let before = times.len();
        times.retain(|time| time != slot_time);
        let removed = times.len() != before;
        if times.is_empty() {
            self.0.remove(slot_date);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub datetime: NaiveDateTime,
    #[serde(rename = "slotDate")]
    pub slot_date: String,
    #[serde(rename = "time")]
    pub slot_time: String,
}

impl Slot {
    pub fn at(datetime: NaiveDateTime) -> Self {
        Self {
            datetime,
            slot_date: slot_date_key(datetime.date()),
            slot_time: slot_time_label(datetime.time()),
        }
    }
}

pub fn slot_date_key(date: NaiveDate) -> String {
    format!("{}_{}_{}", date.day(), date.month(), date.year())
}

pub fn slot_time_label(time: NaiveTime) -> String {
    time.format(TIME_LABEL_FORMAT).to_string()
}

/// Parses a `(slotDate, slotTime)` pair back into a local date-time.
pub fn parse_slot(slot_date: &str, slot_time: &str) -> Option<NaiveDateTime> {
    let mut parts = slot_date.trim().split('_');
    let day = parts.next()?.parse::<u32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    let year = parts.next()?.parse::<i32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::parse_from_str(slot_time.trim(), TIME_LABEL_FORMAT).ok()?;
    Some(date.and_time(time))
}

/// True when the date-time falls on a slot boundary inside opening hours.
pub fn is_slot_boundary(datetime: NaiveDateTime) -> bool {
    let minute = datetime.hour() * 60 + datetime.minute();
    datetime.second() == 0
        && minute % SLOT_MINUTES == 0
        && (OPENING_MINUTE..CLOSING_MINUTE).contains(&minute)
}

/// Seven days of free slots, one list per day, starting with `now`'s date.
///
/// Day 0 starts at the next half-hour boundary after `now` (never before
/// opening); later days start at opening. Days are produced on demand.
pub fn available_slots(
    booked: &BookedSlots,
    now: NaiveDateTime,
) -> impl Iterator<Item = Vec<Slot>> + '_ {
    let today = now.date();
    (0..BOOKING_DAYS).map(move |offset| {
        let Some(date) = today.checked_add_days(Days::new(offset)) else {
            return Vec::new();
        };
        let start = if offset == 0 {
            first_minute_after(now)
        } else {
            OPENING_MINUTE
        };
        day_slots(booked, date, start)
    })
}

fn first_minute_after(now: NaiveDateTime) -> u32 {
    let minute_of_day = now.hour() * 60 + now.minute();
    let next_boundary = (minute_of_day / SLOT_MINUTES + 1) * SLOT_MINUTES;
    next_boundary.max(OPENING_MINUTE)
}

fn day_slots(booked: &BookedSlots, date: NaiveDate, start_minute: u32) -> Vec<Slot> {
    (start_minute..CLOSING_MINUTE)
        .step_by(SLOT_MINUTES as usize)
        .filter_map(|minute| NaiveTime::from_hms_opt(minute / 60, minute % 60, 0))
        .map(|time| Slot::at(date.and_time(time)))
        .filter(|slot| !booked.contains(&slot.slot_date, &slot.slot_time))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn formats_slot_keys_without_padding() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!(slot_date_key(date), "5_3_2026");
        assert_eq!(slot_time_label(NaiveTime::from_hms_opt(10, 0, 0).unwrap()), "10:00 AM");
        assert_eq!(slot_time_label(NaiveTime::from_hms_opt(20, 30, 0).unwrap()), "08:30 PM");
    }

    #[test]
    fn parses_slot_pairs() {
        assert_eq!(parse_slot("5_3_2026", "02:30 PM"), Some(at(2026, 3, 5, 14, 30)));
        assert_eq!(parse_slot("31_2_2026", "10:00 AM"), None);
        assert_eq!(parse_slot("5-3-2026", "10:00 AM"), None);
        assert_eq!(parse_slot("5_3_2026", "25:00"), None);
        assert_eq!(parse_slot("5_3_2026_1", "10:00 AM"), None);
    }

    #[test]
    fn slot_boundaries_respect_opening_hours() {
        assert!(is_slot_boundary(at(2026, 3, 5, 10, 0)));
        assert!(is_slot_boundary(at(2026, 3, 5, 20, 30)));
        assert!(!is_slot_boundary(at(2026, 3, 5, 21, 0)));
        assert!(!is_slot_boundary(at(2026, 3, 5, 9, 30)));
        assert!(!is_slot_boundary(at(2026, 3, 5, 11, 15)));
    }

    #[test]
    fn early_morning_starts_at_opening() {
        let days: Vec<_> = available_slots(&BookedSlots::default(), at(2026, 3, 5, 8, 15)).collect();
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].len(), 22);
        assert_eq!(days[0][0].slot_time, "10:00 AM");
        assert_eq!(days[0].last().unwrap().slot_time, "08:30 PM");
        assert_eq!(days[6][0].slot_date, "11_3_2026");
    }

    #[test]
    fn today_starts_at_next_half_hour() {
        let days: Vec<_> = available_slots(&BookedSlots::default(), at(2026, 3, 5, 14, 10)).collect();
        assert_eq!(days[0][0].slot_time, "02:30 PM");

        let days: Vec<_> = available_slots(&BookedSlots::default(), at(2026, 3, 5, 14, 30)).collect();
        assert_eq!(days[0][0].slot_time, "03:00 PM");
        assert_eq!(days[1][0].slot_time, "10:00 AM");
    }

    #[test]
    fn after_closing_today_is_empty_but_week_is_complete() {
        let days: Vec<_> = available_slots(&BookedSlots::default(), at(2026, 3, 5, 20, 45)).collect();
        assert_eq!(days.len(), 7);
        assert!(days[0].is_empty());
        assert_eq!(days[1].len(), 22);
    }

    #[test]
    fn booked_slots_are_excluded() {
        let mut booked = BookedSlots::default();
        assert!(booked.book("6_3_2026", "10:00 AM"));
        assert!(booked.book("6_3_2026", "08:30 PM"));

        let days: Vec<_> = available_slots(&booked, at(2026, 3, 5, 8, 0)).collect();
        assert_eq!(days[1].len(), 20);
        assert!(days[1].iter().all(|slot| slot.slot_time != "10:00 AM"));
        assert_eq!(days[0].len(), 22);
    }

    #[test]
    fn crossing_month_end() {
        let days: Vec<_> = available_slots(&BookedSlots::default(), at(2026, 1, 30, 9, 0)).collect();
        assert_eq!(days[2][0].slot_date, "1_2_2026");
    }

    #[test]
    fn booked_map_book_and_release() {
        let mut booked = BookedSlots::default();
        assert!(booked.book("5_3_2026", "10:00 AM"));
        assert!(!booked.book("5_3_2026", "10:00 AM"));
        assert!(booked.book("5_3_2026", "10:30 AM"));
        assert_eq!(booked.len(), 2);

        assert!(booked.release("5_3_2026", "10:00 AM"));
        assert!(!booked.release("5_3_2026", "10:00 AM"));
        assert!(booked.release("5_3_2026", "10:30 AM"));
        assert!(booked.is_empty());
    }

    #[test]
    fn booked_map_serializes_as_plain_object() {
        let mut booked = BookedSlots::default();
        booked.book("5_3_2026", "10:00 AM");
        let value = serde_json::to_value(&booked).unwrap();
        assert_eq!(value, serde_json::json!({ "5_3_2026": ["10:00 AM"] }));
    }
}
