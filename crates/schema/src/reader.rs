//! Strict object reader with type coercion.
//!
//! A [`Reader`] wraps one JSON object. Every field read through it is marked
//! as known; [`Reader::finish`] then reports any key that was never read as
//! unrecognized. Coercion failures are collected rather than returned early,
//! so one pass reports every problem with a record.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Time, UtcDateTime};

use crate::field::{FieldErrors, join};

pub(crate) struct Reader<'a> {
    object: &'a Map<String, Value>,
    path: String,
    seen: HashSet<&'static str>,
    errors: FieldErrors,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(value: &'a Value, path: &str) -> Result<Self, FieldErrors> {
        match value {
            Value::Object(object) => Ok(Self {
                object,
                path: path.to_string(),
                seen: HashSet::new(),
                errors: FieldErrors::new(),
            }),
            _ => Err(FieldErrors::single(path, "expected an object")),
        }
    }

    /// Mark `key` as known and return its value. `null` counts as absent.
    fn take(&mut self, key: &'static str) -> Option<&'a Value> {
        self.seen.insert(key);
        self.object.get(key).filter(|v| !v.is_null())
    }

    /// Read a field with a parser that reports its own (already prefixed)
    /// errors. Used for nested objects and lists.
    pub(crate) fn with<T>(
        &mut self,
        key: &'static str,
        required: bool,
        parse: impl FnOnce(&'a Value, &str) -> Result<T, FieldErrors>,
    ) -> Option<T> {
        let path = join(&self.path, key);
        let Some(value) = self.take(key) else {
            if required {
                self.errors.add(path, "required");
            }
            return None;
        };
        match parse(value, &path) {
            Ok(parsed) => Some(parsed),
            Err(errors) => {
                self.errors.extend(errors);
                None
            },
        }
    }

    fn read<T>(&mut self, key: &'static str, required: bool, coerce: impl FnOnce(&Value) -> Result<T, String>) -> Option<T> {
        self.with(key, required, |value, path| coerce(value).map_err(|msg| FieldErrors::single(path, msg)))
    }

    pub(crate) fn required_string(&mut self, key: &'static str) -> Option<String> {
        self.read(key, true, coerce_non_empty_string)
    }

    pub(crate) fn optional_string(&mut self, key: &'static str) -> Option<String> {
        self.read(key, false, coerce_non_empty_string)
    }

    pub(crate) fn optional_number(&mut self, key: &'static str) -> Option<f64> {
        self.read(key, false, coerce_f64)
    }

    pub(crate) fn optional_count(&mut self, key: &'static str) -> Option<u64> {
        self.read(key, false, coerce_u64)
    }

    pub(crate) fn required_positive(&mut self, key: &'static str) -> Option<u32> {
        self.read(key, true, |value| {
            coerce_u64(value)
                .ok()
                .filter(|n| *n > 0)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| "must be a positive integer".to_string())
        })
    }

    pub(crate) fn optional_date(&mut self, key: &'static str) -> Option<UtcDateTime> {
        self.read(key, false, coerce_date)
    }

    pub(crate) fn optional_parse<T: FromStr>(&mut self, key: &'static str) -> Option<T> {
        self.read(key, false, |value| {
            let s = coerce_non_empty_string(value)?;
            s.parse::<T>().map_err(|_| format!("unknown value: {s}"))
        })
    }

    /// Read a list field, parsing each element with `parse`. A missing list is
    /// empty.
    pub(crate) fn list<T>(&mut self, key: &'static str, parse: impl Fn(&'a Value, &str) -> Result<T, FieldErrors>) -> Vec<T> {
        self.with(key, false, |value, path| {
            let Value::Array(items) = value else {
                return Err(FieldErrors::single(path, "expected a list"));
            };
            let mut parsed = Vec::with_capacity(items.len());
            let mut errors = FieldErrors::new();
            for (index, item) in items.iter().enumerate() {
                match parse(item, &join(path, &index.to_string())) {
                    Ok(item) => parsed.push(item),
                    Err(e) => errors.extend(e),
                }
            }
            if errors.is_empty() { Ok(parsed) } else { Err(errors) }
        })
        .unwrap_or_default()
    }

    /// Report unknown keys and produce the final result.
    ///
    /// `record` is only returned if no field reported an error.
    pub(crate) fn finish<T>(mut self, record: Option<T>) -> Result<T, FieldErrors> {
        let mut unknown: Vec<&String> = self.object.keys().filter(|k| !self.seen.contains(k.as_str())).collect();
        unknown.sort();
        for key in unknown {
            self.errors.add(join(&self.path, key), "unrecognized key");
        }
        match record {
            Some(record) if self.errors.is_empty() => Ok(record),
            _ if self.errors.is_empty() => Err(FieldErrors::single(self.path, "invalid record")),
            _ => Err(self.errors),
        }
    }
}

pub(crate) fn coerce_non_empty_string(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) if s.trim().is_empty() => Err("must not be empty".to_string()),
        Value::String(s) => Ok(s.trim().to_string()),
        _ => Err("expected a string".to_string()),
    }
}

pub(crate) fn coerce_f64(value: &Value) -> Result<f64, String> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite()).ok_or_else(|| "expected a number".to_string())
}

pub(crate) fn coerce_u64(value: &Value) -> Result<u64, String> {
    if let Value::Number(n) = value
        && let Some(n) = n.as_u64()
    {
        return Ok(n);
    }
    let n = coerce_f64(value).map_err(|_| "expected an integer".to_string())?;
    if n < 0.0 {
        return Err("must not be negative".to_string());
    }
    if n.fract() != 0.0 || n > u64::MAX as f64 {
        return Err("expected an integer".to_string());
    }
    Ok(n as u64)
}

/// Dates are accepted as RFC 3339 timestamps, `YYYY-MM-DD` dates (midnight
/// UTC), or unix timestamps in seconds.
pub(crate) fn coerce_date(value: &Value) -> Result<UtcDateTime, String> {
    let invalid = || "invalid date".to_string();
    match value {
        Value::Number(n) => n.as_i64().and_then(|ts| UtcDateTime::from_unix_timestamp(ts).ok()).ok_or_else(invalid),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = time::OffsetDateTime::parse(s, &Rfc3339) {
                return Ok(dt.to_utc());
            }
            if let Ok(date) = Date::parse(s, format_description!("[year]-[month]-[day]")) {
                return Ok(UtcDateTime::new(date, Time::MIDNIGHT));
            }
            s.parse::<i64>().ok().and_then(|ts| UtcDateTime::from_unix_timestamp(ts).ok()).ok_or_else(invalid)
        },
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use time::macros::datetime;

    #[rstest]
    #[case(json!(7.5), Ok(7.5))]
    #[case(json!("7.5"), Ok(7.5))]
    #[case(json!(" 8 "), Ok(8.0))]
    #[case(json!("NaN"), Err(()))]
    #[case(json!("eight"), Err(()))]
    #[case(json!(true), Err(()))]
    fn test_coerce_f64(#[case] input: Value, #[case] expected: Result<f64, ()>) {
        assert_eq!(coerce_f64(&input).map_err(|_| ()), expected);
    }

    #[rstest]
    #[case(json!(3), Ok(3))]
    #[case(json!("12"), Ok(12))]
    #[case(json!(4.0), Ok(4))]
    #[case(json!(4.5), Err("expected an integer"))]
    #[case(json!(-1), Err("must not be negative"))]
    #[case(json!("x"), Err("expected an integer"))]
    fn test_coerce_u64(#[case] input: Value, #[case] expected: Result<u64, &str>) {
        assert_eq!(coerce_u64(&input), expected.map_err(str::to_string));
    }

    #[rstest]
    #[case(json!("2024-03-01T12:30:00Z"), datetime!(2024-03-01 12:30:00 UTC).to_utc())]
    #[case(json!("2024-03-01T14:30:00+02:00"), datetime!(2024-03-01 12:30:00 UTC).to_utc())]
    #[case(json!("2024-03-01"), datetime!(2024-03-01 0:00 UTC).to_utc())]
    #[case(json!(1709296200), datetime!(2024-03-01 12:30:00 UTC).to_utc())]
    #[case(json!("1709296200"), datetime!(2024-03-01 12:30:00 UTC).to_utc())]
    fn test_coerce_date(#[case] input: Value, #[case] expected: UtcDateTime) {
        assert_eq!(coerce_date(&input).unwrap(), expected);
    }

    #[test]
    fn test_coerce_date_rejects_garbage() {
        assert!(coerce_date(&json!("yesterday")).is_err());
        assert!(coerce_date(&json!({})).is_err());
    }

    #[test]
    fn test_reader_reports_unknown_and_missing() {
        let value = json!({"title": "A", "extra": 1, "another": 2});
        let mut reader = Reader::new(&value, "").unwrap();
        let title = reader.required_string("title");
        let slug = reader.required_string("slug");
        let errors = reader.finish(title.zip(slug)).unwrap_err();
        assert_eq!(errors.get("slug").unwrap(), ["required"]);
        assert_eq!(errors.get("extra").unwrap(), ["unrecognized key"]);
        assert_eq!(errors.get("another").unwrap(), ["unrecognized key"]);
    }

    #[test]
    fn test_reader_null_is_absent() {
        let value = json!({"description": null});
        let mut reader = Reader::new(&value, "").unwrap();
        let description = reader.optional_string("description");
        assert_eq!(reader.finish(Some(description)).unwrap(), None);
    }

    #[test]
    fn test_reader_list_paths() {
        let value = json!({"genres": ["a", 3, "", "b"]});
        let mut reader = Reader::new(&value, "").unwrap();
        let genres = reader.list("genres", |v, path| coerce_non_empty_string(v).map_err(|m| FieldErrors::single(path, m)));
        assert!(genres.is_empty());
        let errors = reader.finish(Some(genres)).unwrap_err();
        assert_eq!(errors.get("genres.1").unwrap(), ["expected a string"]);
        assert_eq!(errors.get("genres.2").unwrap(), ["must not be empty"]);
    }

    #[test]
    fn test_not_an_object() {
        let errors = Reader::new(&json!([1, 2]), "comic").err().unwrap();
        assert_eq!(errors.get("comic").unwrap(), ["expected an object"]);
    }
}
