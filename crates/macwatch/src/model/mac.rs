//! Validated MAC address newtype.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// Six two-hex-digit groups separated by ':' or '-'.
static RE_MAC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[0-9a-f]{2}([:-][0-9a-f]{2}){5}$").unwrap());

/// A MAC address in canonical form: lowercase, colon separated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Parses and normalizes a MAC address.
    ///
    /// Returns `None` unless the input is six colon- or hyphen-separated
    /// groups of two hex digits (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if !RE_MAC.is_match(raw) {
            return None;
        }
        Some(Self(raw.to_ascii_lowercase().replace('-', ":")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for MacAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid MAC address: {}", s))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}
