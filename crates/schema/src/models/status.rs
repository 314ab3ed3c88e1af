use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::sanitize;
use crate::error::{Error, ErrorKind};

/// Publication status of a comic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ComicStatus {
    #[default]
    Ongoing,
    Completed,
    Hiatus,
    Dropped,
    ComingSoon,
}
impl ComicStatus {
    /// The value stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ongoing => "Ongoing",
            Self::Completed => "Completed",
            Self::Hiatus => "Hiatus",
            Self::Dropped => "Dropped",
            Self::ComingSoon => "ComingSoon",
        }
    }
}
impl FromStr for ComicStatus {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match sanitize(s).as_str() {
            "ongoing" | "publishing" | "releasing" | "active" => Self::Ongoing,
            "completed" | "complete" | "finished" | "ended" => Self::Completed,
            "hiatus" | "onhiatus" | "paused" => Self::Hiatus,
            "dropped" | "cancelled" | "canceled" | "discontinued" => Self::Dropped,
            "comingsoon" | "upcoming" | "announced" => Self::ComingSoon,
            _ => exn::bail!(ErrorKind::UnknownValue {
                field: "status",
                value: s.to_string()
            }),
        })
    }
}
impl Display for ComicStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Account role of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Role {
    #[default]
    User,
    Admin,
}
impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}
impl FromStr for Role {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match sanitize(s).as_str() {
            "user" | "member" | "reader" => Self::User,
            "admin" | "administrator" => Self::Admin,
            _ => exn::bail!(ErrorKind::UnknownValue {
                field: "role",
                value: s.to_string()
            }),
        })
    }
}
impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Ongoing", ComicStatus::Ongoing)]
    #[case("ONGOING", ComicStatus::Ongoing)]
    #[case("completed", ComicStatus::Completed)]
    #[case("on-hiatus", ComicStatus::Hiatus)]
    #[case("On Hiatus", ComicStatus::Hiatus)]
    #[case("cancelled", ComicStatus::Dropped)]
    #[case("coming_soon", ComicStatus::ComingSoon)]
    #[case("ComingSoon", ComicStatus::ComingSoon)]
    fn test_parse_status(#[case] input: &str, #[case] expected: ComicStatus) {
        assert_eq!(input.parse::<ComicStatus>().unwrap(), expected);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            ComicStatus::Ongoing,
            ComicStatus::Completed,
            ComicStatus::Hiatus,
            ComicStatus::Dropped,
            ComicStatus::ComingSoon,
        ] {
            assert_eq!(status.as_str().parse::<ComicStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status() {
        let err = "abandoned-ish".parse::<ComicStatus>().unwrap_err();
        assert_eq!(*err, ErrorKind::UnknownValue { field: "status", value: "abandoned-ish".to_string() });
    }

    #[rstest]
    #[case("user", Role::User)]
    #[case("USER", Role::User)]
    #[case("Admin", Role::Admin)]
    #[case("administrator", Role::Admin)]
    fn test_parse_role(#[case] input: &str, #[case] expected: Role) {
        assert_eq!(input.parse::<Role>().unwrap(), expected);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ComicStatus::default(), ComicStatus::Ongoing);
        assert_eq!(Role::default().to_string(), "user");
    }
}
