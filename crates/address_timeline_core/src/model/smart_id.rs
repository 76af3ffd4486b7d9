//! Carrier lookup identifier normalization.
//!
//! # Invariants
//! - Normalized ids are exactly 8 characters from an alphabet without the
//!   confusable letters `I`, `O`, `S`, `Z`.
//! - Normalization is idempotent.

use crate::model::assignment::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;

static SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-]+").expect("valid separator regex"));
static SMART_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-HJ-NP-RT-Y]{8}$").expect("valid smart id regex"));

/// Normalizes a smart id as typed by a carrier or read off a label.
///
/// Strips whitespace and hyphens, upper-cases, and maps `I→1`, `S→5`,
/// `Z→2`, `O→0`.
///
/// # Errors
/// - `ValidationError::InvalidSmartId` when the result is not 8 characters
///   of the smart id alphabet.
pub fn normalize_smart_id(raw: &str) -> Result<String, ValidationError> {
    let compact = SEPARATOR_RE.replace_all(raw, "").to_ascii_uppercase();
    let normalized: String = compact
        .chars()
        .map(|ch| match ch {
            'I' => '1',
            'S' => '5',
            'Z' => '2',
            'O' => '0',
            other => other,
        })
        .collect();

    if SMART_ID_RE.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(ValidationError::InvalidSmartId(raw.trim().to_string()))
    }
}
