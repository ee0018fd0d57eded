use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

use crate::{course::SportType, schedule::Schedule};

pub const IPFS_SCHEME: &str = "ipfs://";

/// Immutable reference to an off-chain document.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr,
)]
pub enum ContentAddress {
    /// `ipfs://<cid>`
    Ipfs(String),
    /// Plain `http://` or `https://` url.
    Http(String),
}

impl ContentAddress {
    pub fn ipfs(cid: impl Into<String>) -> ContentAddress {
        ContentAddress::Ipfs(cid.into())
    }

    pub fn cid(&self) -> Option<&str> {
        match self {
            ContentAddress::Ipfs(cid) => Some(cid),
            ContentAddress::Http(_) => None,
        }
    }
}

impl Display for ContentAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentAddress::Ipfs(cid) => write!(f, "{}{}", IPFS_SCHEME, cid),
            ContentAddress::Http(url) => write!(f, "{}", url),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseContentAddressError {
    #[error("empty content address")]
    Empty,
    #[error("unsupported content address scheme: {0}")]
    UnsupportedScheme(String),
}

impl FromStr for ContentAddress {
    type Err = ParseContentAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseContentAddressError::Empty);
        }
        if let Some(cid) = s.strip_prefix(IPFS_SCHEME) {
            if cid.is_empty() {
                return Err(ParseContentAddressError::Empty);
            }
            return Ok(ContentAddress::Ipfs(cid.to_owned()));
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            return Ok(ContentAddress::Http(s.to_owned()));
        }
        Err(ParseContentAddressError::UnsupportedScheme(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: Value,
}

impl Attribute {
    pub fn new(trait_type: &str, value: impl Into<Value>) -> Attribute {
        Attribute {
            trait_type: trait_type.to_owned(),
            value: value.into(),
        }
    }
}

pub const ATTR_PRICE: &str = "Price";
pub const ATTR_SPORT: &str = "Sport Type";
pub const ATTR_LOCATION: &str = "Location";
pub const ATTR_TIME_START: &str = "TimeStart";
pub const ATTR_TIME_END: &str = "TimeEnd";
pub const ATTR_TRAINER: &str = "Trainer";
pub const ATTR_CAPACITY: &str = "Capacity";

/// Descriptive course document pinned to content-addressed storage.
///
/// Direct properties win; when one is missing the matching `attributes`
/// entry is consulted. Nothing is defaulted: a missing schedule stays missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_start: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_end: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_sport",
        skip_serializing_if = "Option::is_none"
    )]
    pub sport_type: Option<SportType>,
    #[serde(
        default,
        deserialize_with = "lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
}

impl CourseMetadata {
    /// Rebuilds the `attributes` list from the direct properties.
    pub fn with_attributes(mut self, price: Option<String>, trainer: Option<String>) -> Self {
        let mut attributes = Vec::new();
        if let Some(price) = price {
            attributes.push(Attribute::new(ATTR_PRICE, price));
        }
        if let Some(sport) = self.sport_type {
            attributes.push(Attribute::new(ATTR_SPORT, sport.to_string()));
        }
        if let Some(location) = &self.location {
            attributes.push(Attribute::new(ATTR_LOCATION, location.clone()));
        }
        if let Some(start) = self.time_start {
            attributes.push(Attribute::new(ATTR_TIME_START, start.to_rfc3339()));
        }
        if let Some(end) = self.time_end {
            attributes.push(Attribute::new(ATTR_TIME_END, end.to_rfc3339()));
        }
        if let Some(trainer) = trainer {
            attributes.push(Attribute::new(ATTR_TRAINER, trainer));
        }
        if let Some(capacity) = self.capacity {
            attributes.push(Attribute::new(ATTR_CAPACITY, capacity));
        }
        self.attributes = attributes;
        self
    }

    fn attribute(&self, trait_type: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|attr| attr.trait_type.eq_ignore_ascii_case(trait_type))
            .map(|attr| &attr.value)
    }

    fn attribute_text(&self, trait_type: &str) -> Option<String> {
        match self.attribute(trait_type)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn schedule(&self) -> Schedule {
        let start = self
            .time_start
            .or_else(|| self.attribute_text(ATTR_TIME_START).and_then(|s| parse_time(&s)));
        let end = self
            .time_end
            .or_else(|| self.attribute_text(ATTR_TIME_END).and_then(|s| parse_time(&s)));
        Schedule::new(start, end)
    }

    pub fn location(&self) -> Option<String> {
        self.location
            .clone()
            .or_else(|| self.attribute_text(ATTR_LOCATION))
    }

    pub fn sport(&self) -> SportType {
        self.sport_type
            .or_else(|| {
                self.attribute_text(ATTR_SPORT)
                    .and_then(|s| SportType::from_str(&s).ok())
            })
            .unwrap_or(SportType::Other)
    }

    pub fn capacity(&self) -> Option<u32> {
        self.capacity.or_else(|| {
            self.attribute_text(ATTR_CAPACITY)
                .and_then(|s| s.parse().ok())
        })
    }
}

/// Partial update of a course document. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub schedule: Option<Schedule>,
    pub location: Option<String>,
    pub sport: Option<SportType>,
    pub capacity: Option<u32>,
    pub price: Option<crate::amount::Amount>,
}

impl CourseEdit {
    pub fn is_empty(&self) -> bool {
        *self == CourseEdit::default()
    }

    pub fn apply(&self, current: &CourseMetadata) -> CourseMetadata {
        let schedule = self.schedule.unwrap_or_else(|| current.schedule());
        CourseMetadata {
            name: self.title.clone().unwrap_or_else(|| current.name.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| current.description.clone()),
            image: self.image.clone().or_else(|| current.image.clone()),
            time_start: schedule.start_at,
            time_end: schedule.end_at,
            location: self.location.clone().or_else(|| current.location()),
            sport_type: Some(self.sport.unwrap_or_else(|| current.sport())),
            capacity: self.capacity.or_else(|| current.capacity()),
            attributes: Vec::new(),
        }
    }
}

/// Trainer profile document. Every edit is pinned as a new version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainerMetadata {
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar: String,
    pub address: crate::address::Address,
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn lenient_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => parse_time(&s),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(chrono::DateTime::from_timestamp_millis),
        _ => None,
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty()))
}

fn lenient_sport<'de, D>(deserializer: D) -> Result<Option<SportType>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|s| SportType::from_str(s.trim()).ok()))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_content_address_parse() {
        let ipfs: ContentAddress = "ipfs://QmHash123".parse().unwrap();
        assert_eq!(ipfs, ContentAddress::ipfs("QmHash123"));
        assert_eq!(ipfs.cid(), Some("QmHash123"));
        assert_eq!("ipfs://QmHash123", ipfs.to_string());

        let http: ContentAddress = "https://example.org/meta.json".parse().unwrap();
        assert_eq!(http.cid(), None);

        assert_eq!(
            "ftp://x".parse::<ContentAddress>(),
            Err(ParseContentAddressError::UnsupportedScheme("ftp://x".to_owned()))
        );
        assert_eq!(
            "ipfs://".parse::<ContentAddress>(),
            Err(ParseContentAddressError::Empty)
        );
    }

    #[test]
    fn test_metadata_direct_properties() {
        let meta: CourseMetadata = serde_json::from_value(json!({
            "name": "Morning yoga",
            "description": "Stretch",
            "image": "ipfs://QmImg",
            "timeStart": "2024-10-01T08:00:00Z",
            "timeEnd": "2024-10-01T09:00:00Z",
            "location": "Park",
            "sportType": "Yoga",
            "capacity": 12
        }))
        .unwrap();
        let schedule = meta.schedule();
        assert_eq!(
            schedule.end_at,
            Some(Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap())
        );
        assert_eq!(meta.sport(), SportType::Yoga);
        assert_eq!(meta.capacity(), Some(12));
        assert_eq!(meta.location().as_deref(), Some("Park"));
    }

    #[test]
    fn test_metadata_falls_back_to_attributes() {
        let meta: CourseMetadata = serde_json::from_value(json!({
            "name": "Run club",
            "timeStart": "",
            "timeEnd": "",
            "location": "",
            "sportType": "OTHER",
            "capacity": "",
            "attributes": [
                { "trait_type": "Location", "value": "Stadium" },
                { "trait_type": "TimeEnd", "value": "2024-10-01T09:00" },
                { "trait_type": "Capacity", "value": "5" },
                { "trait_type": "Sport Type", "value": "Running" }
            ]
        }))
        .unwrap();
        assert_eq!(meta.location().as_deref(), Some("Stadium"));
        assert_eq!(meta.capacity(), Some(5));
        assert_eq!(meta.sport(), SportType::Other);
        let schedule = meta.schedule();
        assert_eq!(schedule.start_at, None);
        assert_eq!(
            schedule.end_at,
            Some(Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_missing_schedule_stays_missing() {
        let meta: CourseMetadata = serde_json::from_value(json!({ "name": "Swim" })).unwrap();
        assert!(!meta.schedule().is_scheduled());
        assert_eq!(meta.capacity(), None);
        assert_eq!(meta.sport(), SportType::Other);
    }

    #[test]
    fn test_edit_overlays_current() {
        let current = CourseMetadata {
            name: "Old".to_owned(),
            description: "Desc".to_owned(),
            location: Some("Gym".to_owned()),
            sport_type: Some(SportType::Fitness),
            capacity: Some(3),
            ..Default::default()
        };
        let edit = CourseEdit {
            title: Some("New".to_owned()),
            capacity: Some(4),
            ..Default::default()
        };
        let next = edit.apply(&current);
        assert_eq!(next.name, "New");
        assert_eq!(next.description, "Desc");
        assert_eq!(next.location.as_deref(), Some("Gym"));
        assert_eq!(next.capacity, Some(4));
        assert_eq!(next.sport_type, Some(SportType::Fitness));
        assert!(!edit.is_empty());
        assert!(CourseEdit::default().is_empty());
    }

    #[test]
    fn test_with_attributes() {
        let meta = CourseMetadata {
            name: "Tennis".to_owned(),
            location: Some("Court 1".to_owned()),
            sport_type: Some(SportType::Tennis),
            capacity: Some(2),
            ..Default::default()
        }
        .with_attributes(Some("0.05".to_owned()), None);
        let json = serde_json::to_value(&meta).unwrap();
        let attributes = json["attributes"].as_array().unwrap();
        assert_eq!(attributes.len(), 4);
        assert_eq!(json["sportType"], "Tennis");
        assert_eq!(attributes[0]["trait_type"], "Price");
    }
}
