use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::normalization;

/// A single record in the store.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Record {
    /// The ID assigned by the store.
    id: Uuid,

    /// The validated personal and vehicle fields.
    #[serde(flatten)]
    details: RecordDetails,

    /// The times it was created and updated.
    #[serde(flatten)]
    times: Times,
}

impl Record {
    pub fn new(id: Uuid, details: RecordDetails, times: Times) -> Self {
        Record { id, details, times }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn details(&self) -> &RecordDetails {
        &self.details
    }

    pub fn times(&self) -> &Times {
        &self.times
    }
}

/// The fields of a record that have passed validation.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDetails {
    pub username: String,

    /// Unique across all records.
    pub phone_number: String,

    #[serde(with = "iso_date")]
    pub birth_date: Date,

    pub gender: Gender,

    /// Unique across all records.
    pub car_number: String,

    pub car_type: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = UnknownGender;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(UnknownGender(s.to_owned())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown gender {0:?}")]
pub struct UnknownGender(String);

/// The times a record was created and last modified.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Times {
    #[serde(with = "time::serde::timestamp")]
    pub(crate) created_at: OffsetDateTime,

    #[serde(with = "time::serde::timestamp")]
    pub(crate) updated_at: OffsetDateTime,
}

impl Times {
    pub fn new(created_at: OffsetDateTime, updated_at: OffsetDateTime) -> Self {
        Times {
            created_at,
            updated_at,
        }
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }
}

/// A submitted record as it arrives over the wire, before validation.
/// Absent fields are `None`; a creation needs all of them, an update
/// only the ones it changes.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub car_number: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub car_type: Option<String>,
}

impl RecordPatch {
    /// Returns `base` with every field present in `self` replaced.
    pub fn overlay(self, base: RecordPatch) -> RecordPatch {
        RecordPatch {
            username: self.username.or(base.username),
            phone_number: self.phone_number.or(base.phone_number),
            birth_date: self.birth_date.or(base.birth_date),
            gender: self.gender.or(base.gender),
            car_number: self.car_number.or(base.car_number),
            car_type: self.car_type.or(base.car_type),
        }
    }
}

impl From<&RecordDetails> for RecordPatch {
    fn from(details: &RecordDetails) -> Self {
        RecordPatch {
            username: Some(details.username.clone()),
            phone_number: Some(details.phone_number.clone()),
            birth_date: Some(iso_date::format(details.birth_date)),
            gender: Some(details.gender.as_str().to_owned()),
            car_number: Some(details.car_number.clone()),
            car_type: Some(details.car_type.clone()),
        }
    }
}

/// (De)serializes a [`Date`] as `YYYY-MM-DD`.
pub mod iso_date {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use time::Date;

    const FORMAT: &str = "%Y-%m-%d";

    pub fn format(date: Date) -> String {
        date.format(FORMAT)
    }

    /// Parses exactly `YYYY-MM-DD`, refusing short years and trailing
    /// input.
    pub fn parse(s: &str) -> Option<Date> {
        Date::parse(s, FORMAT).ok().filter(|date| format(*date) == s)
    }

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let s = String::deserialize(deserializer)?;

        parse(&s).ok_or_else(|| de::Error::custom(format_args!("invalid date {:?}", s)))
    }
}
