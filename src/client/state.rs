use std::collections::BTreeMap;
use std::time::Instant;

use time::OffsetDateTime;
use uuid::Uuid;

use super::toast::{Toast, ToastKind, Toasts};
use super::{ApiClient, ClientError};
use crate::normalization::normalize;
use crate::record::{iso_date, Record, RecordPatch};
use crate::validation::{self, Field, FieldError};

/// The create/edit form: what has been typed, and what is wrong with it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Form {
    values: BTreeMap<Field, String>,
    errors: BTreeMap<Field, String>,
}

impl Form {
    /// A form filled in from an existing record, for editing.
    pub fn from_record(record: &Record) -> Self {
        let details = record.details();
        let mut form = Form::default();

        form.set(Field::Username, details.username.as_str());
        form.set(Field::PhoneNumber, details.phone_number.as_str());
        form.set(Field::BirthDate, iso_date::format(details.birth_date));
        form.set(Field::Gender, details.gender.as_str());
        form.set(Field::CarNumber, details.car_number.as_str());
        form.set(Field::CarType, details.car_type.as_str());

        form
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn value(&self, field: Field) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or("")
    }

    pub fn error(&self, field: Field) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Validates one field as typed, showing or clearing its error.
    pub fn check(&mut self, field: Field, now: OffsetDateTime) -> bool {
        let value = normalize(self.value(field));

        match validation::validate_field(field, Some(&value), now) {
            Ok(()) => {
                self.errors.remove(&field);
                true
            }
            Err(e) => {
                self.errors.insert(field, e.msg);
                false
            }
        }
    }

    /// Shows errors reported for the form, e.g. by the server. Errors
    /// shown before are dropped.
    pub fn show_errors(&mut self, errors: &[FieldError]) {
        self.errors.clear();

        for error in errors {
            self.errors.insert(error.path, error.msg.clone());
        }
    }

    /// The form as a request body. Empty fields are left out.
    pub fn to_patch(&self) -> RecordPatch {
        let get = |field| {
            let value = normalize(self.value(field));

            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        };

        RecordPatch {
            username: get(Field::Username),
            phone_number: get(Field::PhoneNumber),
            birth_date: get(Field::BirthDate),
            gender: get(Field::Gender),
            car_number: get(Field::CarNumber),
            car_type: get(Field::CarType),
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.errors.clear();
    }
}

/// What submitting the form should do.
#[derive(Clone, Debug, PartialEq)]
pub enum Submission {
    Create(RecordPatch),
    Update(Uuid, RecordPatch),
}

/// Whether `record` matches a search. `needle` must already be
/// lowercased and trimmed; the empty needle matches everything.
pub fn matches(record: &Record, needle: &str) -> bool {
    let details = record.details();

    details.username.to_lowercase().contains(needle)
        || details.phone_number.contains(needle)
        || details.car_number.contains(needle)
        || details.car_type.to_lowercase().contains(needle)
        || details.gender.as_str().contains(needle)
}

/// Everything the page shows.
#[derive(Debug, Default)]
pub struct AppState {
    records: Vec<Record>,
    query: String,
    editing: Option<Uuid>,
    pub form: Form,
    toasts: Toasts,
    loading: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record from the last successful load, newest first.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn set_records(&mut self, records: Vec<Record>) {
        self.records = records;
    }

    pub fn find(&self, id: &Uuid) -> Option<&Record> {
        self.records.iter().find(|r| r.id() == id)
    }

    /// The records matching the current search.
    pub fn visible(&self) -> Vec<&Record> {
        let needle = self.query.trim().to_lowercase();

        self.records.iter().filter(|r| matches(r, &needle)).collect()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// The record being edited, if any.
    pub fn editing(&self) -> Option<&Uuid> {
        self.editing.as_ref()
    }

    pub fn start_editing(&mut self, record: &Record) {
        self.form = Form::from_record(record);
        self.editing = Some(*record.id());
    }

    /// Empties the form and leaves edit mode.
    pub fn reset_form(&mut self) {
        self.form.clear();
        self.editing = None;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn toasts(&self) -> &Toasts {
        &self.toasts
    }

    pub fn notify(&mut self, kind: ToastKind, title: &str, message: impl Into<String>) {
        self.toasts.push(Toast::new(kind, title, message, Instant::now()));
    }

    pub fn expire_toasts(&mut self, now: Instant) {
        self.toasts.expire(now);
    }

    /// Validates the whole form. On failure the errors are also shown on
    /// the form.
    pub fn submission(&mut self, now: OffsetDateTime) -> Result<Submission, Vec<FieldError>> {
        let patch = self.form.to_patch();

        if let Err(errors) = validation::validate(&patch, now) {
            self.form.show_errors(&errors);
            return Err(errors);
        }

        self.form.show_errors(&[]);

        Ok(match self.editing {
            Some(id) => Submission::Update(id, patch),
            None => Submission::Create(patch),
        })
    }
}

/// The page's behaviour: each action talks to the server, updates the
/// state and reports its outcome as a toast.
#[derive(Debug)]
pub struct App {
    api: ApiClient,
    state: AppState,
}

impl App {
    pub fn new(api: ApiClient) -> Self {
        App {
            api,
            state: AppState::new(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    /// Loads the records for the first time.
    pub async fn start(&mut self) {
        self.load().await;
        self.state
            .notify(ToastKind::Success, "System", "Application loaded successfully!");
    }

    pub async fn load(&mut self) {
        self.state.set_loading(true);

        match self.api.list().await {
            Ok(records) => {
                let count = records.len();
                self.state.set_records(records);
                self.state
                    .notify(ToastKind::Success, "Success", format!("Loaded {} records", count));
            }
            Err(e) => {
                self.state.set_records(vec![]);
                self.state
                    .notify(ToastKind::Error, "Error", format!("Failed to load records: {}", e));
            }
        }

        self.state.set_loading(false);
    }

    /// Creates or updates a record from the form, depending on whether a
    /// record is being edited.
    pub async fn submit(&mut self) {
        let submission = match self.state.submission(OffsetDateTime::now_utc()) {
            Ok(submission) => submission,
            Err(_) => {
                self.state.notify(
                    ToastKind::Warning,
                    "Validation Error",
                    "Please fix the errors in the form",
                );
                return;
            }
        };

        self.state.set_loading(true);

        let (result, success) = match &submission {
            Submission::Create(patch) => (self.api.create(patch).await, "Record created successfully"),
            Submission::Update(id, patch) => (self.api.update(id, patch).await, "Record updated successfully"),
        };

        match result {
            Ok(_) => {
                self.state.notify(ToastKind::Success, "Success", success);
                self.state.reset_form();
                self.load().await;
            }
            Err(ClientError::Rejected { message, errors, .. }) => {
                self.state.notify(ToastKind::Error, "Error", message);
                self.state.form.show_errors(&errors);
            }
            Err(_) => {
                self.state
                    .notify(ToastKind::Error, "Error", "Failed to save record. Please try again.");
            }
        }

        self.state.set_loading(false);
    }

    /// Fetches a record and puts it in the form for editing.
    pub async fn edit(&mut self, id: &Uuid) {
        match self.api.retrieve(id).await {
            Ok(record) => {
                self.state.start_editing(&record);
                self.state.notify(
                    ToastKind::Info,
                    "Edit Mode",
                    format!("Editing record: {}", record.details().username),
                );
            }
            Err(ClientError::Rejected { message, .. }) => {
                self.state.notify(ToastKind::Error, "Error", message);
            }
            Err(_) => {
                self.state
                    .notify(ToastKind::Error, "Error", "Failed to load record for editing");
            }
        }
    }

    /// Deletes a listed record. The caller is expected to have confirmed
    /// it first; ids that aren't listed are only warned about.
    pub async fn delete(&mut self, id: &Uuid) {
        if self.state.find(id).is_none() {
            self.state.notify(ToastKind::Warning, "Warning", "Record not found");
            return;
        }

        match self.api.delete(id).await {
            Ok(()) => {
                self.state
                    .notify(ToastKind::Success, "Success", "Record deleted successfully");
                self.load().await;
            }
            Err(ClientError::Rejected { message, .. }) => {
                self.state.notify(ToastKind::Error, "Error", message);
            }
            Err(_) => {
                self.state.notify(ToastKind::Error, "Error", "Failed to delete record");
            }
        }
    }

    pub fn search(&mut self, query: &str) {
        self.state.set_query(query);
    }

    pub fn cancel_edit(&mut self) {
        self.state.reset_form();
        self.state.notify(ToastKind::Info, "Info", "Edit cancelled");
    }

    pub fn clear_form(&mut self) {
        self.state.reset_form();
        self.state.notify(ToastKind::Info, "Info", "Form cleared");
    }
}

#[cfg(test)]
mod tests {
    use time::Date;

    use super::*;
    use crate::record::{Gender, RecordDetails, Times};

    fn record(username: &str, phone_number: &str, car_number: &str, car_type: &str, gender: Gender) -> Record {
        let now = OffsetDateTime::now_utc();

        Record::new(
            Uuid::new_v4(),
            RecordDetails {
                username: username.to_owned(),
                phone_number: phone_number.to_owned(),
                birth_date: Date::try_from_ymd(1990, 5, 15).unwrap(),
                gender,
                car_number: car_number.to_owned(),
                car_type: car_type.to_owned(),
            },
            Times::new(now, now),
        )
    }

    fn state() -> AppState {
        let mut state = AppState::new();
        state.set_records(vec![
            record("Ali Hassan", "01012345678", "12345", "Toyota Corolla", Gender::Male),
            record("Sara Nabil", "+201112345678", "777", "Kia Rio", Gender::Female),
        ]);
        state
    }

    fn usernames(state: &AppState) -> Vec<&str> {
        state
            .visible()
            .iter()
            .map(|r| r.details().username.as_str())
            .collect()
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let mut state = state();

        state.set_query("  ALI ");
        assert_eq!(usernames(&state), vec!["Ali Hassan"]);

        state.set_query("kia");
        assert_eq!(usernames(&state), vec!["Sara Nabil"]);

        state.set_query("777");
        assert_eq!(usernames(&state), vec!["Sara Nabil"]);

        state.set_query("+20");
        assert_eq!(usernames(&state), vec!["Sara Nabil"]);

        // "female" contains "male"
        state.set_query("male");
        assert_eq!(usernames(&state).len(), 2);

        state.set_query("");
        assert_eq!(usernames(&state).len(), 2);

        state.set_query("nobody");
        assert!(state.visible().is_empty());
    }

    #[test]
    fn submitting_creates_unless_editing() {
        let now = OffsetDateTime::now_utc();
        let mut state = state();
        let existing = state.records()[0].clone();

        state.form = Form::from_record(&existing);
        state.form.set(Field::CarType, " Toyota Yaris ");
        match state.submission(now).unwrap() {
            Submission::Create(patch) => assert_eq!(patch.car_type.as_deref(), Some("Toyota Yaris")),
            other => panic!("expected a creation, got {:?}", other),
        }

        state.start_editing(&existing);
        match state.submission(now).unwrap() {
            Submission::Update(id, _) => assert_eq!(&id, existing.id()),
            other => panic!("expected an update, got {:?}", other),
        }

        state.reset_form();
        assert!(state.editing().is_none());
        assert_eq!(state.form, Form::default());
    }

    #[test]
    fn invalid_forms_show_every_error() {
        let mut state = AppState::new();
        state.form.set(Field::Username, "A");
        state.form.set(Field::PhoneNumber, "12345");

        let errors = state.submission(OffsetDateTime::now_utc()).unwrap_err();

        assert_eq!(errors.len(), Field::ALL.len());
        assert_eq!(
            state.form.error(Field::Username),
            Some("Username must be at least 2 characters long")
        );
        assert_eq!(state.form.error(Field::Gender), Some("Gender is required"));
    }

    #[test]
    fn fixed_fields_lose_their_errors_on_submit() {
        let now = OffsetDateTime::now_utc();
        let mut state = AppState::new();
        let existing = record("Ali Hassan", "01012345678", "12345", "Toyota Corolla", Gender::Male);
        state.form = Form::from_record(&existing);

        state.form.set(Field::Username, "A");
        assert!(state.submission(now).is_err());
        assert!(state.form.error(Field::Username).is_some());

        state.form.set(Field::Username, "Ali");
        assert!(state.submission(now).is_ok());
        assert_eq!(state.form.error(Field::Username), None);
        assert!(!state.form.has_errors());
    }

    #[test]
    fn server_errors_replace_earlier_ones() {
        let mut form = Form::default();
        form.show_errors(&[FieldError::new(Field::Username, "Username is required")]);

        form.show_errors(&[FieldError::new(Field::PhoneNumber, "Phone number already exists")]);

        assert_eq!(form.error(Field::Username), None);
        assert_eq!(form.error(Field::PhoneNumber), Some("Phone number already exists"));
    }

    #[test]
    fn fields_are_checked_as_typed() {
        let now = OffsetDateTime::now_utc();
        let mut form = Form::default();

        form.set(Field::CarNumber, "12a");
        assert!(!form.check(Field::CarNumber, now));
        assert_eq!(
            form.error(Field::CarNumber),
            Some("Car number must contain only numbers (1-8 digits)")
        );

        form.set(Field::CarNumber, "123");
        assert!(form.check(Field::CarNumber, now));
        assert!(!form.has_errors());
    }

    #[test]
    fn editing_fills_in_the_form() {
        let mut state = state();
        let existing = state.records()[1].clone();

        state.start_editing(&existing);

        assert_eq!(state.editing(), Some(existing.id()));
        assert_eq!(state.form.value(Field::BirthDate), "1990-05-15");
        assert_eq!(state.form.value(Field::Gender), "female");
        assert_eq!(state.form.value(Field::PhoneNumber), "+201112345678");
    }
}
