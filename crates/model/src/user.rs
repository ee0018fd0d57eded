use serde::{Deserialize, Serialize};

use crate::{address::Address, booking::BookedCourse, metadata::ContentAddress};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerProfile {
    pub name: String,
    pub bio: String,
    pub avatar: String,
    /// Content address of the current profile version.
    pub profile_uri: ContentAddress,
    #[serde(default)]
    pub courses: Vec<Address>,
}

/// Per-identity local state. A cache only: it can be rebuilt from the
/// registry, the course contracts and the metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    #[serde(rename = "_id")]
    pub address: Address,
    #[serde(default)]
    pub booked: Vec<BookedCourse>,
    #[serde(default)]
    pub trainer: Option<TrainerProfile>,
}

impl UserState {
    pub fn new(address: Address) -> UserState {
        UserState {
            address,
            booked: Vec::new(),
            trainer: None,
        }
    }

    pub fn is_trainer(&self) -> bool {
        self.trainer.is_some()
    }

    pub fn booking(&self, course: Address) -> Option<&BookedCourse> {
        self.booked.iter().find(|b| b.id() == course)
    }

    /// Inserts or replaces the booking for the same course.
    pub fn upsert_booking(&mut self, booking: BookedCourse) {
        match self.booked.iter_mut().find(|b| b.id() == booking.id()) {
            Some(existing) => *existing = booking,
            None => self.booked.push(booking),
        }
    }

    pub fn remove_booking(&mut self, course: Address) -> Option<BookedCourse> {
        let idx = self.booked.iter().position(|b| b.id() == course)?;
        Some(self.booked.remove(idx))
    }

    pub fn add_trainer_course(&mut self, course: Address) {
        if let Some(trainer) = self.trainer.as_mut() {
            if !trainer.courses.contains(&course) {
                trainer.courses.push(course);
            }
        }
    }

    pub fn remove_trainer_course(&mut self, course: Address) {
        if let Some(trainer) = self.trainer.as_mut() {
            trainer.courses.retain(|c| *c != course);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone as _, Utc};

    use super::*;
    use crate::{
        amount::Amount,
        course::{Course, SportType, COURSE_TOKEN_ID},
        schedule::Schedule,
    };

    fn booking(course: u64, expires_in: i64) -> BookedCourse {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        BookedCourse {
            course: Course {
                id: Address::from_index(0xC0, course),
                token_id: COURSE_TOKEN_ID,
                title: format!("course {}", course),
                description: String::new(),
                image: None,
                price: Amount::zero(),
                location: None,
                schedule: Schedule::not_scheduled(),
                capacity: 1,
                active_renters: 1,
                sport: SportType::Other,
                trainer: Address::from_index(0xA0, 1),
                metadata_uri: None,
                created_at: now,
            },
            booked_at: now,
            expires_at: now + Duration::seconds(expires_in),
        }
    }

    #[test]
    fn test_upsert_replaces_same_course() {
        let mut state = UserState::new(Address::from_index(0xB0, 1));
        state.upsert_booking(booking(1, 60));
        state.upsert_booking(booking(2, 60));
        state.upsert_booking(booking(1, 120));
        assert_eq!(state.booked.len(), 2);
        let updated = state.booking(Address::from_index(0xC0, 1)).unwrap();
        assert_eq!(
            updated.expires_at - updated.booked_at,
            Duration::seconds(120)
        );
    }

    #[test]
    fn test_remove_booking() {
        let mut state = UserState::new(Address::from_index(0xB0, 1));
        state.upsert_booking(booking(1, 60));
        assert!(state.remove_booking(Address::from_index(0xC0, 1)).is_some());
        assert!(state.remove_booking(Address::from_index(0xC0, 1)).is_none());
        assert!(state.booked.is_empty());
    }

    #[test]
    fn test_trainer_courses() {
        let mut state = UserState::new(Address::from_index(0xB0, 1));
        state.add_trainer_course(Address::from_index(0xC0, 1));
        assert!(!state.is_trainer());

        state.trainer = Some(TrainerProfile {
            name: "Anna".to_owned(),
            bio: String::new(),
            avatar: String::new(),
            profile_uri: ContentAddress::ipfs("QmProfile"),
            courses: vec![],
        });
        state.add_trainer_course(Address::from_index(0xC0, 1));
        state.add_trainer_course(Address::from_index(0xC0, 1));
        assert_eq!(state.trainer.as_ref().unwrap().courses.len(), 1);
        state.remove_trainer_course(Address::from_index(0xC0, 1));
        assert!(state.trainer.as_ref().unwrap().courses.is_empty());
    }
}
