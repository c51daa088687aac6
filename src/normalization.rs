use serde::{Deserialize, Deserializer};

/// Normalizes a submitted value by stripping surrounding whitespace and
/// composing it into Unicode Normalization Form C, so that lengths are
/// counted the way an operator would count them.
///
/// ```
/// use registry::normalization::normalize;
/// assert_eq!(normalize(" Cafe\u{301} "), "Café");
/// ```
pub fn normalize(value: impl AsRef<str>) -> String {
    use unicode_normalization::UnicodeNormalization;

    value.as_ref().trim().nfc().collect()
}

/// A submitted scalar. Numbers are taken as the digits they were
/// written with, so that `"carNumber": 123` reads like `"123"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Submitted {
    Text(String),
    Number(serde_json::Number),
}

/// Deserializes an optional `String` after running it through `normalize`.
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let o: Option<Submitted> = Deserialize::deserialize(deserializer)?;

    Ok(o.map(|submitted| match submitted {
        Submitted::Text(s) => normalize(s),
        Submitted::Number(n) => n.to_string(),
    }))
}
