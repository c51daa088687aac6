//! HTML fragments for the page. Every value that came from a user goes
//! through [`escape_html`].

use std::borrow::Cow;

use time::Date;

use super::state::AppState;
use super::toast::{Toast, ToastKind};
use crate::record::{iso_date, Record};

/// Escapes the characters that are special in HTML text and attributes.
///
/// ```
/// use registry::client::render::escape_html;
/// assert_eq!(escape_html("<b>\"Tom\" & 'Jerry'</b>"), "&lt;b&gt;&quot;Tom&quot; &amp; &#039;Jerry&#039;&lt;/b&gt;");
/// ```
pub fn escape_html(s: &str) -> Cow<str> {
    if !s.contains(|c: char| matches!(c, '&' | '<' | '>' | '"' | '\'')) {
        return Cow::Borrowed(s);
    }

    let mut escaped = String::with_capacity(s.len() + 16);

    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            c => escaped.push(c),
        }
    }

    Cow::Owned(escaped)
}

/// A date the way people write it, e.g. `May 15, 1990`.
pub fn long_date(date: Date) -> String {
    date.format("%B %-d, %Y")
}

/// The list of visible records, or the empty state.
pub fn record_list(state: &AppState) -> String {
    let records = state.visible();

    if records.is_empty() {
        return concat!(
            r#"<div class="empty-state">"#,
            "<h3>No Records Found</h3>",
            "<p>Add your first record to get started</p>",
            "</div>"
        )
        .to_owned();
    }

    records.into_iter().map(record_card).collect()
}

pub fn record_card(record: &Record) -> String {
    let details = record.details();
    let id = record.id();

    format!(
        concat!(
            r#"<div class="record-card" data-id="{id}">"#,
            r#"<div class="record-info">"#,
            "<h3>{username}</h3>",
            r#"<div class="record-details">"#,
            r#"<div class="record-detail phone">{phone_number}</div>"#,
            r#"<div class="record-detail birth-date">{birth_date}</div>"#,
            r#"<div class="record-detail gender">{gender}</div>"#,
            r#"<div class="record-detail car">{car_type} ({car_number})</div>"#,
            r#"<div class="record-detail created">Added: {created}</div>"#,
            "</div></div>",
            r#"<div class="record-actions">"#,
            r#"<button class="edit-btn" data-action="edit" data-id="{id}">Edit</button>"#,
            r#"<button class="delete-btn" data-action="delete" data-id="{id}">Delete</button>"#,
            "</div></div>"
        ),
        id = id,
        username = escape_html(&details.username),
        phone_number = escape_html(&details.phone_number),
        birth_date = long_date(details.birth_date),
        gender = capitalize(details.gender.as_str()),
        car_type = escape_html(&details.car_type),
        car_number = escape_html(&details.car_number),
        created = iso_date::format(record.times().created_at().date()),
    )
}

/// The "showing N of M" counters.
pub fn counts(state: &AppState) -> String {
    format!(
        r#"<span id="shownCount">{}</span> of <span id="totalCount">{}</span>"#,
        state.visible().len(),
        state.records().len()
    )
}

pub fn toast(toast: &Toast) -> String {
    format!(
        r#"<div class="toast {}"><i class="{}"></i><div class="toast-content"><h4>{}</h4><p>{}</p></div></div>"#,
        toast.kind.as_str(),
        toast_icon(toast.kind),
        escape_html(&toast.title),
        escape_html(&toast.message)
    )
}

pub fn toasts(state: &AppState) -> String {
    state.toasts().iter().map(toast).collect()
}

/// The label of the form's submit button.
pub fn submit_label(state: &AppState) -> &'static str {
    if state.editing().is_some() {
        "Update Record"
    } else {
        "Add Record"
    }
}

/// The question to ask before deleting `record`.
pub fn delete_confirmation(record: &Record) -> String {
    let details = record.details();

    format!(
        "Are you sure you want to delete record \"{}\"?\n\nPhone: {}\nCar: {} ({})\n\nThis action cannot be undone!",
        details.username, details.phone_number, details.car_type, details.car_number
    )
}

/// The CSS class of a toast's icon.
pub fn toast_icon(kind: ToastKind) -> &'static str {
    match kind {
        ToastKind::Success => "icon-check",
        ToastKind::Info => "icon-info",
        ToastKind::Warning => "icon-warning",
        ToastKind::Error => "icon-error",
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();

    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
