//! Named string formats for `format` constraints.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub(crate) const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$";

pub(crate) const PHONE_PATTERN: &str = r"^\+?[0-9][0-9 ().-]*[0-9]$";

const PHONE_MIN_DIGITS: usize = 7;
const PHONE_MAX_DIGITS: usize = 15;

/// Formats recognized by `format` constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
    /// `local@domain.tld`.
    Email,
    /// 7 to 15 digits, optional leading `+`, common separators.
    Phone,
    /// Absolute URL with a host.
    Url,
    /// `YYYY-MM-DD`.
    Date,
    /// `HH:MM` or `HH:MM:SS[.fff]`.
    Time,
    /// RFC 3339 timestamp with offset.
    #[serde(rename = "datetime")]
    DateTime,
    /// Hyphenated or simple UUID.
    Uuid,
    /// Dotted-quad IPv4 address.
    Ipv4,
    /// IPv6 address.
    Ipv6,
}

impl FormatType {
    /// All recognized formats.
    pub const ALL: [Self; 9] = [
        Self::Email,
        Self::Phone,
        Self::Url,
        Self::Date,
        Self::Time,
        Self::DateTime,
        Self::Uuid,
        Self::Ipv4,
        Self::Ipv6,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Url => "url",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::Uuid => "uuid",
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
        }
    }

    /// Returns the regular expression backing this format, if it is
    /// regex-based.
    pub(crate) const fn pattern(&self) -> Option<&'static str> {
        match self {
            Self::Email => Some(EMAIL_PATTERN),
            Self::Phone => Some(PHONE_PATTERN),
            _ => None,
        }
    }

    /// Checks the parts of the format that are not expressed by
    /// [`Self::pattern`].
    pub(crate) fn accepts(&self, s: &str) -> bool {
        match self {
            Self::Email => true,
            Self::Phone => {
                let digits = s.chars().filter(char::is_ascii_digit).count();
                (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits)
            }
            Self::Url => url::Url::parse(s).is_ok_and(|u| u.has_host()),
            Self::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
            Self::Time => {
                NaiveTime::parse_from_str(s, "%H:%M:%S%.f").is_ok()
                    || NaiveTime::parse_from_str(s, "%H:%M").is_ok()
            }
            Self::DateTime => DateTime::parse_from_rfc3339(s).is_ok(),
            Self::Uuid => Uuid::parse_str(s).is_ok(),
            Self::Ipv4 => s.parse::<Ipv4Addr>().is_ok(),
            Self::Ipv6 => s.parse::<Ipv6Addr>().is_ok(),
        }
    }
}

impl FromStr for FormatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown format: {s}"))
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
