//! Parser for `show mac address-table` style output.
//!
//! Each data row has the shape `VLAN MAC TYPE INTERFACE...`. Everything
//! else a switch prints around the table (headers, rules, pager prompts,
//! legends) is skipped, as are rows whose VLAN or MAC does not validate.

use chrono::{DateTime, Utc};

use crate::error::ParseError;
use crate::model::{timestamp_now, MacAddress, Observation, VlanId};

const PAGER_PROMPT: &str = "--More--";

/// Parses one host's table output, stamping every observation with the
/// current time.
pub fn parse(raw: &str, host: &str) -> Result<Vec<Observation>, ParseError> {
    parse_at(raw, host, timestamp_now())
}

/// Parses one host's table output; all observations share `observed_at`.
pub fn parse_at(
    raw: &str,
    host: &str,
    observed_at: DateTime<Utc>,
) -> Result<Vec<Observation>, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::EmptyOutput {
            host: host.to_string(),
        });
    }

    let mut observations = Vec::new();
    let mut skipped = 0usize;

    for line in raw.lines() {
        if is_noise(line) {
            continue;
        }
        match parse_row(line) {
            Some((vlan, mac, interface)) => observations.push(Observation {
                mac,
                vlan,
                interface,
                host: host.to_string(),
                observed_at,
            }),
            None => skipped += 1,
        }
    }

    tracing::debug!(
        host,
        accepted = observations.len(),
        skipped,
        "Parsed MAC address table"
    );

    Ok(observations)
}

/// Lines that are never table rows.
fn is_noise(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed.contains(PAGER_PROMPT)
        || trimmed.chars().all(|c| matches!(c, '-' | '=' | '+' | ' '))
        || is_header(trimmed)
        || is_legend(trimmed)
}

fn is_header(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.starts_with("vlan") || lower.contains("mac address table") || lower.contains("mac address ")
}

fn is_legend(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.starts_with("total mac addresses") || lower.starts_with("legend") || line.starts_with('*')
}

fn parse_row(line: &str) -> Option<(VlanId, MacAddress, String)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return None;
    }
    let vlan = tokens[0].parse::<VlanId>().ok()?;
    let mac = MacAddress::parse(tokens[1])?;
    // tokens[2] is the entry type (DYNAMIC, STATIC, ...).
    let interface = tokens[3..].join(" ");
    Some((vlan, mac, interface))
}
