use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum::{Display, EnumIter, EnumString};

use crate::{
    address::Address,
    amount::Amount,
    metadata::{ContentAddress, CourseMetadata},
    schedule::Schedule,
};

/// Every course contract carries exactly one token.
pub const COURSE_TOKEN_ID: u64 = 1;
pub const DEFAULT_CAPACITY: u32 = 1;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    SerializeDisplay,
    DeserializeFromStr,
)]
#[strum(ascii_case_insensitive)]
pub enum SportType {
    Yoga,
    Fitness,
    Running,
    Swimming,
    Cycling,
    Basketball,
    Football,
    Tennis,
    Climbing,
    Other,
}

/// Fields read straight from the course contract. Always authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnChainCourse {
    pub id: Address,
    pub token_id: u64,
    pub owner: Address,
    pub title: String,
    pub description: String,
    pub price: Amount,
    pub capacity: u32,
    pub active_renters: u32,
    pub metadata_uri: Option<ContentAddress>,
    pub created_at: DateTime<Utc>,
    pub burned: bool,
}

impl OnChainCourse {
    pub fn is_full(&self) -> bool {
        self.active_renters >= self.capacity
    }
}

/// Catalog entry: on-chain fields merged with the descriptive document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Address,
    pub token_id: u64,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub price: Amount,
    pub location: Option<String>,
    pub schedule: Schedule,
    pub capacity: u32,
    pub active_renters: u32,
    pub sport: SportType,
    pub trainer: Address,
    pub metadata_uri: Option<ContentAddress>,
    pub created_at: DateTime<Utc>,
}

impl Course {
    /// Price, capacity, occupancy and owner come from the chain; the rest from
    /// the document. On-chain title and description win when they are set.
    pub fn merge(chain: OnChainCourse, meta: &CourseMetadata) -> Course {
        let title = if chain.title.is_empty() {
            meta.name.clone()
        } else {
            chain.title
        };
        let description = if chain.description.is_empty() {
            meta.description.clone()
        } else {
            chain.description
        };
        Course {
            id: chain.id,
            token_id: chain.token_id,
            title,
            description,
            image: meta.image.clone(),
            price: chain.price,
            location: meta.location(),
            schedule: meta.schedule(),
            capacity: chain.capacity,
            active_renters: chain.active_renters,
            sport: meta.sport(),
            trainer: chain.owner,
            metadata_uri: chain.metadata_uri,
            created_at: chain.created_at,
        }
    }

    pub fn is_full(&self) -> bool {
        self.active_renters >= self.capacity
    }

    pub fn free_places(&self) -> u32 {
        self.capacity.saturating_sub(self.active_renters)
    }

    pub fn availability(&self, now: DateTime<Utc>) -> Availability {
        if self.schedule.has_ended(now) {
            Availability::Ended
        } else if self.is_full() {
            Availability::Full
        } else {
            Availability::Open
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Open,
    Full,
    Ended,
}

/// Result of resolving a course. `Degraded` carries only what the chain knows
/// because the descriptive document could not be fetched.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedCourse {
    Full(Course),
    Degraded(OnChainCourse),
}

impl ResolvedCourse {
    pub fn id(&self) -> Address {
        match self {
            ResolvedCourse::Full(course) => course.id,
            ResolvedCourse::Degraded(chain) => chain.id,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ResolvedCourse::Degraded(_))
    }

    pub fn course(&self) -> Option<&Course> {
        match self {
            ResolvedCourse::Full(course) => Some(course),
            ResolvedCourse::Degraded(_) => None,
        }
    }

    pub fn into_course(self) -> Option<Course> {
        match self {
            ResolvedCourse::Full(course) => Some(course),
            ResolvedCourse::Degraded(_) => None,
        }
    }
}

/// Input of the course creation flow.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseDraft {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub price: Amount,
    pub location: Option<String>,
    pub schedule: Schedule,
    pub capacity: u32,
    pub sport: SportType,
}

impl CourseDraft {
    pub fn metadata(&self, trainer: Address) -> CourseMetadata {
        CourseMetadata {
            name: self.title.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            time_start: self.schedule.start_at,
            time_end: self.schedule.end_at,
            location: self.location.clone(),
            sport_type: Some(self.sport),
            capacity: Some(self.capacity),
            attributes: Vec::new(),
        }
        .with_attributes(Some(self.price.to_string()), Some(trainer.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use chrono::{Duration, TimeZone as _};

    use super::*;

    fn chain_course() -> OnChainCourse {
        OnChainCourse {
            id: Address::from_index(0xC0, 1),
            token_id: COURSE_TOKEN_ID,
            owner: Address::from_index(0xA0, 1),
            title: String::new(),
            description: "on-chain".to_owned(),
            price: Amount::try_from("0.05").unwrap(),
            capacity: 2,
            active_renters: 1,
            metadata_uri: Some(ContentAddress::ipfs("QmMeta")),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            burned: false,
        }
    }

    #[test]
    fn test_sport_type_parse() {
        assert_eq!(SportType::from_str("Yoga").unwrap(), SportType::Yoga);
        assert_eq!(SportType::from_str("OTHER").unwrap(), SportType::Other);
        assert!(SportType::from_str("Chess").is_err());
        assert_eq!("Basketball", SportType::Basketball.to_string());
    }

    #[test]
    fn test_merge_prefers_chain_fields() {
        let meta = CourseMetadata {
            name: "Doc title".to_owned(),
            description: "doc".to_owned(),
            capacity: Some(10),
            sport_type: Some(SportType::Cycling),
            ..Default::default()
        };
        let course = Course::merge(chain_course(), &meta);
        assert_eq!(course.title, "Doc title");
        assert_eq!(course.description, "on-chain");
        assert_eq!(course.capacity, 2);
        assert_eq!(course.active_renters, 1);
        assert_eq!(course.sport, SportType::Cycling);
        assert_eq!(course.trainer, Address::from_index(0xA0, 1));
        assert_eq!(course.free_places(), 1);
        assert!(!course.schedule.is_scheduled());
    }

    #[test]
    fn test_availability() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut course = Course::merge(chain_course(), &CourseMetadata::default());
        assert_eq!(course.availability(now), Availability::Open);

        course.active_renters = 2;
        assert_eq!(course.availability(now), Availability::Full);

        course.schedule = Schedule::window(now - Duration::hours(2), now - Duration::hours(1));
        assert_eq!(course.availability(now), Availability::Ended);
    }

    #[test]
    fn test_draft_metadata() {
        let draft = CourseDraft {
            title: "Climb".to_owned(),
            description: "Wall".to_owned(),
            image: None,
            price: Amount::whole(1),
            location: Some("Hall".to_owned()),
            schedule: Schedule::not_scheduled(),
            capacity: 3,
            sport: SportType::Climbing,
        };
        let meta = draft.metadata(Address::from_index(0xA0, 9));
        assert_eq!(meta.name, "Climb");
        assert_eq!(meta.capacity(), Some(3));
        assert!(meta.attributes.iter().any(|a| a.trait_type == "Trainer"));
    }
}
