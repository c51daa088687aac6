//! Field rules for records. The server applies them before every write
//! and the client applies them before every submission, so both sides
//! reject exactly the same input with exactly the same messages.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::record::{iso_date, Gender, RecordDetails, RecordPatch};

lazy_static! {
    static ref EGYPTIAN_PHONE: Regex =
        Regex::new(r"^(?:\+20|0)?1[0125][0-9]{8}$").expect("compile phone number pattern");
    static ref CAR_NUMBER: Regex = Regex::new(r"^[0-9]{1,8}$").expect("compile car number pattern");
    static ref ISO_8601: Regex = Regex::new(
        r"^[0-9]{4}-[0-9]{2}-[0-9]{2}(?:T[0-9]{2}:[0-9]{2}(?::[0-9]{2}(?:\.[0-9]+)?)?(?:Z|[+-][0-9]{2}:?[0-9]{2})?)?$"
    )
    .expect("compile ISO 8601 pattern");
}

const MIN_TEXT_LENGTH: usize = 2;
const MAX_TEXT_LENGTH: usize = 50;
const ISO_DATE_LENGTH: usize = "YYYY-MM-DD".len();

const INVALID_PHONE_NUMBER: &str =
    "Please enter a valid Egyptian phone number (e.g., 01012345678 or +201012345678)";
const INVALID_CAR_NUMBER: &str = "Car number must contain only numbers (1-8 digits)";
const INVALID_BIRTH_DATE: &str = "Please enter a valid birth date";
const FUTURE_BIRTH_DATE: &str = "Birth date must be in the past";
const INVALID_GENDER: &str = "Gender must be either male or female";

/// Whether `s` is an Egyptian mobile number: an optional `+20` or `0`,
/// then `1`, one of `0`, `1`, `2` or `5`, and eight more digits.
///
/// ```
/// use registry::validation::is_egyptian_phone;
/// assert!(is_egyptian_phone("+201012345678"));
/// assert!(!is_egyptian_phone("01312345678"));
/// ```
pub fn is_egyptian_phone(s: &str) -> bool {
    EGYPTIAN_PHONE.is_match(s)
}

/// Whether `s` is a vehicle number: one to eight ASCII digits.
pub fn is_car_number(s: &str) -> bool {
    CAR_NUMBER.is_match(s)
}

/// The fields of a record, named as they are on the wire.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Username,
    PhoneNumber,
    BirthDate,
    Gender,
    CarNumber,
    CarType,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Username,
        Field::PhoneNumber,
        Field::BirthDate,
        Field::Gender,
        Field::CarNumber,
        Field::CarType,
    ];

    /// The wire name.
    pub fn key(self) -> &'static str {
        match self {
            Field::Username => "username",
            Field::PhoneNumber => "phoneNumber",
            Field::BirthDate => "birthDate",
            Field::Gender => "gender",
            Field::CarNumber => "carNumber",
            Field::CarType => "carType",
        }
    }

    /// The name shown to people.
    pub fn label(self) -> &'static str {
        match self {
            Field::Username => "Username",
            Field::PhoneNumber => "Phone number",
            Field::BirthDate => "Birth date",
            Field::Gender => "Gender",
            Field::CarNumber => "Car number",
            Field::CarType => "Car type",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A rule violation on one field.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FieldError {
    pub path: Field,
    pub msg: String,
}

impl FieldError {
    pub fn new(path: Field, msg: impl Into<String>) -> Self {
        FieldError {
            path,
            msg: msg.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.key(), self.msg)
    }
}

/// Validates every field of `patch`, treating absent fields as missing.
/// All failures are returned, in field order.
pub fn validate(patch: &RecordPatch, now: OffsetDateTime) -> Result<RecordDetails, Vec<FieldError>> {
    let username = validate_text(Field::Username, patch.username.as_deref());
    let phone_number = validate_phone_number(patch.phone_number.as_deref());
    let birth_date = validate_birth_date(patch.birth_date.as_deref(), now);
    let gender = validate_gender(patch.gender.as_deref());
    let car_number = validate_car_number(patch.car_number.as_deref());
    let car_type = validate_text(Field::CarType, patch.car_type.as_deref());

    match (username, phone_number, birth_date, gender, car_number, car_type) {
        (Ok(username), Ok(phone_number), Ok(birth_date), Ok(gender), Ok(car_number), Ok(car_type)) => {
            Ok(RecordDetails {
                username,
                phone_number,
                birth_date,
                gender,
                car_number,
                car_type,
            })
        }
        (username, phone_number, birth_date, gender, car_number, car_type) => Err(vec![
            username.err(),
            phone_number.err(),
            birth_date.err(),
            gender.err(),
            car_number.err(),
            car_type.err(),
        ]
        .into_iter()
        .flatten()
        .collect()),
    }
}

/// Validates a single field, for checking form input as it is typed.
pub fn validate_field(field: Field, value: Option<&str>, now: OffsetDateTime) -> Result<(), FieldError> {
    match field {
        Field::Username | Field::CarType => validate_text(field, value).map(drop),
        Field::PhoneNumber => validate_phone_number(value).map(drop),
        Field::BirthDate => validate_birth_date(value, now).map(drop),
        Field::Gender => validate_gender(value).map(drop),
        Field::CarNumber => validate_car_number(value).map(drop),
    }
}

fn required(field: Field, value: Option<&str>) -> Result<&str, FieldError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(FieldError::new(field, format!("{} is required", field.label()))),
    }
}

fn validate_text(field: Field, value: Option<&str>) -> Result<String, FieldError> {
    let value = required(field, value)?;
    let length = value.chars().count();

    if length < MIN_TEXT_LENGTH {
        Err(FieldError::new(
            field,
            format!("{} must be at least {} characters long", field.label(), MIN_TEXT_LENGTH),
        ))
    } else if length > MAX_TEXT_LENGTH {
        Err(FieldError::new(
            field,
            format!("{} cannot exceed {} characters", field.label(), MAX_TEXT_LENGTH),
        ))
    } else {
        Ok(value.to_owned())
    }
}

fn validate_phone_number(value: Option<&str>) -> Result<String, FieldError> {
    let value = required(Field::PhoneNumber, value)?;

    if is_egyptian_phone(value) {
        Ok(value.to_owned())
    } else {
        Err(FieldError::new(Field::PhoneNumber, INVALID_PHONE_NUMBER))
    }
}

fn validate_car_number(value: Option<&str>) -> Result<String, FieldError> {
    let value = required(Field::CarNumber, value)?;

    if is_car_number(value) {
        Ok(value.to_owned())
    } else {
        Err(FieldError::new(Field::CarNumber, INVALID_CAR_NUMBER))
    }
}

fn validate_gender(value: Option<&str>) -> Result<Gender, FieldError> {
    let value = required(Field::Gender, value)?;

    value
        .parse()
        .map_err(|_| FieldError::new(Field::Gender, INVALID_GENDER))
}

fn validate_birth_date(value: Option<&str>, now: OffsetDateTime) -> Result<Date, FieldError> {
    let value = required(Field::BirthDate, value)?;

    if !ISO_8601.is_match(value) {
        return Err(FieldError::new(Field::BirthDate, INVALID_BIRTH_DATE));
    }

    // a full timestamp is accepted, but only its date counts
    let day = &value[..ISO_DATE_LENGTH];

    let date = iso_date::parse(day).ok_or_else(|| FieldError::new(Field::BirthDate, INVALID_BIRTH_DATE))?;

    if date.midnight().assume_utc() < now {
        Ok(date)
    } else {
        Err(FieldError::new(Field::BirthDate, FUTURE_BIRTH_DATE))
    }
}
