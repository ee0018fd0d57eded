use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{address::Address, course::Course};

/// Client-local view of a confirmed rental.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookedCourse {
    pub course: Course,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub booked_at: DateTime<Utc>,
    /// Authoritative on-chain expiry as last observed.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl BookedCourse {
    pub fn id(&self) -> Address {
        self.course.id
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub fn active_bookings(booked: &[BookedCourse], now: DateTime<Utc>) -> Vec<BookedCourse> {
    booked
        .iter()
        .filter(|booking| !booking.is_expired(now))
        .cloned()
        .collect()
}

pub fn expired_bookings(booked: &[BookedCourse], now: DateTime<Utc>) -> Vec<BookedCourse> {
    booked
        .iter()
        .filter(|booking| booking.is_expired(now))
        .cloned()
        .collect()
}

/// How the expiry of a new rental is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPolicy {
    /// Fixed window from now.
    Window(Duration),
    /// Course schedule end; falls back to the configured window when the
    /// course is not scheduled.
    ScheduleEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingPhase {
    Idle,
    CheckingAvailability,
    Submitting,
    /// Waiting for the settlement layer. `waited` grows while the
    /// transaction stays pending.
    Confirming { waited: Duration },
    Booked,
    Failed(String),
}

impl BookingPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingPhase::Booked | BookingPhase::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnrentPhase {
    Idle,
    Submitting,
    Confirming { waited: Duration },
    Removed,
    Failed(String),
}

impl UnrentPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnrentPhase::Removed | UnrentPhase::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;
    use crate::{
        amount::Amount,
        course::{SportType, COURSE_TOKEN_ID},
        schedule::Schedule,
    };

    fn booking(expires_at: DateTime<Utc>) -> BookedCourse {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        BookedCourse {
            course: Course {
                id: Address::from_index(0xC0, expires_at.timestamp() as u64),
                token_id: COURSE_TOKEN_ID,
                title: "Yoga".to_owned(),
                description: String::new(),
                image: None,
                price: Amount::zero(),
                location: None,
                schedule: Schedule::not_scheduled(),
                capacity: 1,
                active_renters: 0,
                sport: SportType::Yoga,
                trainer: Address::from_index(0xA0, 1),
                metadata_uri: None,
                created_at: created,
            },
            booked_at: created,
            expires_at,
        }
    }

    #[test]
    fn test_expiry_filter() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let list = vec![
            booking(now - Duration::seconds(1)),
            booking(now),
            booking(now + Duration::seconds(1)),
        ];
        assert_eq!(active_bookings(&list, now).len(), 1);
        assert_eq!(expired_bookings(&list, now).len(), 2);
    }

    #[test]
    fn test_millis_serialization() {
        let expires = Utc.timestamp_millis_opt(1_717_243_200_123).unwrap();
        let json = serde_json::to_value(booking(expires)).unwrap();
        assert_eq!(json["expires_at"], 1_717_243_200_123i64);
    }

    #[test]
    fn test_terminal_phases() {
        assert!(BookingPhase::Booked.is_terminal());
        assert!(BookingPhase::Failed("x".to_owned()).is_terminal());
        assert!(!BookingPhase::Confirming {
            waited: Duration::zero()
        }
        .is_terminal());
        assert!(UnrentPhase::Removed.is_terminal());
        assert!(!UnrentPhase::Submitting.is_terminal());
    }
}
