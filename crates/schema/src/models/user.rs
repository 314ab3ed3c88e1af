use serde_json::Value;
use time::UtcDateTime;

use super::Role;
use crate::field::FieldErrors;
use crate::reader::{Reader, coerce_non_empty_string};

/// A validated user record. `email` is the natural key and is lower-cased.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "camelCase"))]
pub struct User {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub email_verified: Option<UtcDateTime>,
    pub image: Option<String>,
}

fn coerce_email(value: &Value) -> Result<String, String> {
    let email = coerce_non_empty_string(value)?.to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        },
        None => false,
    };
    if valid { Ok(email) } else { Err("invalid email address".to_string()) }
}

impl TryFrom<&Value> for User {
    type Error = FieldErrors;
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let mut reader = Reader::new(value, "")?;
        let email = reader.with("email", true, |v, path| coerce_email(v).map_err(|m| FieldErrors::single(path, m)));
        let name = reader.required_string("name");
        let role = reader.optional_parse::<Role>("role").unwrap_or_default();
        let email_verified = reader.optional_date("emailVerified");
        let image = reader.optional_string("image");
        let user = email.zip(name).map(|(email, name)| Self {
            email,
            name,
            role,
            email_verified,
            image,
        });
        reader.finish(user)
    }
}
