use serde::{Deserialize, Serialize};

use super::error::IncentiveError;

const STREET_SUFFIXES: &[(&str, &str)] = &[
    ("alley", "Aly"),
    ("aly", "Aly"),
    ("avenue", "Ave"),
    ("ave", "Ave"),
    ("av", "Ave"),
    ("boulevard", "Blvd"),
    ("blvd", "Blvd"),
    ("circle", "Cir"),
    ("cir", "Cir"),
    ("court", "Ct"),
    ("ct", "Ct"),
    ("drive", "Dr"),
    ("dr", "Dr"),
    ("expressway", "Expy"),
    ("expy", "Expy"),
    ("highway", "Hwy"),
    ("hwy", "Hwy"),
    ("lane", "Ln"),
    ("ln", "Ln"),
    ("parkway", "Pkwy"),
    ("pkwy", "Pkwy"),
    ("place", "Pl"),
    ("pl", "Pl"),
    ("road", "Rd"),
    ("rd", "Rd"),
    ("square", "Sq"),
    ("sq", "Sq"),
    ("street", "St"),
    ("st", "St"),
    ("terrace", "Ter"),
    ("ter", "Ter"),
    ("way", "Way"),
];

/// Canonical form of a street address: trimmed, single-spaced, suffixes abbreviated.
///
/// `normalize(&normalize(a)) == normalize(a)` for every input.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .map(canonical_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn canonical_token(token: &str) -> String {
    let core = token.trim_end_matches(['.', ',']);
    let trailing = &token[core.len()..];
    // "St." and "St" are the same token; keep commas, drop abbreviation periods
    let trailing = if trailing.contains(',') { "," } else { "" };

    let lowered = core.to_ascii_lowercase();
    match STREET_SUFFIXES
        .iter()
        .find(|(spelling, _)| *spelling == lowered)
    {
        Some((_, abbreviation)) => format!("{abbreviation}{trailing}"),
        None if core.is_empty() => token.to_string(),
        None => format!("{core}{}", &token[core.len()..]),
    }
}

/// Normalize and check that the address has both a number and a street name.
pub fn validate(raw: &str) -> Result<String, IncentiveError> {
    let normalized = normalize(raw);
    if normalized.is_empty() {
        return Err(IncentiveError::validation("address must not be empty"));
    }
    if !normalized.chars().any(|c| c.is_ascii_digit()) {
        return Err(IncentiveError::validation(format!(
            "address '{normalized}' is missing a street number"
        )));
    }
    let has_word = normalized
        .split([' ', ','])
        .any(|token| token.chars().any(char::is_alphabetic));
    if !has_word {
        return Err(IncentiveError::validation(format!(
            "address '{normalized}' is missing a street name"
        )));
    }
    Ok(normalized)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, IncentiveError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(IncentiveError::validation(format!(
                "coordinates ({latitude}, {longitude}) are out of range"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Stable textual key, rounded to roughly ten meters.
    pub fn cache_key(&self) -> String {
        format!("{:.4},{:.4}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CensusTract {
    pub tract_id: String,
    pub county_id: String,
    pub state_id: String,
    /// Eleven-digit state + county + tract identifier.
    pub geoid: String,
}

impl CensusTract {
    pub fn new(state_id: &str, county_id: &str, tract_id: &str) -> Self {
        Self {
            tract_id: tract_id.to_string(),
            county_id: county_id.to_string(),
            state_id: state_id.to_string(),
            geoid: format!("{state_id}{county_id}{tract_id}"),
        }
    }
}
