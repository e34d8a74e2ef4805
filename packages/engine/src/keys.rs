//! Track and measure key canonicalization.
//!
//! Keys arrive as JSON object keys, JSON numbers or bare tokens in legacy
//! text. Numeric-looking keys are round-tripped through an integer so that
//! `"01"`, `"1"` and `1` all address the same cell.

pub type TrackKey = String;
pub type MeasureKey = String;

/// Canonical text of an integer token of any length: optional sign, ASCII
/// digits, leading zeros dropped. `None` for anything else.
pub fn canonical_int(token: &str) -> Option<String> {
    let token = token.trim();
    let (negative, digits) = match token.as_bytes().first()? {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let digits = digits.trim_start_matches('0');
    Some(match (digits.is_empty(), negative) {
        (true, _) => "0".to_string(),
        (false, true) => format!("-{}", digits),
        (false, false) => digits.to_string(),
    })
}

/// Canonical form of an incoming key.
///
/// Integers are re-stringified; anything else is kept as given (trimmed).
pub fn canonical_key(raw: &str) -> String {
    canonical_int(raw).unwrap_or_else(|| raw.trim().to_string())
}

/// Flash-state key of a cell
pub fn cell_key(track: &str, measure: &str) -> String {
    format!("{}_{}", track, measure)
}

/// Measure key displayed in grid column `column`.
///
/// Rounds half to even, matching how the column grid was laid out by the
/// sender side.
pub fn measure_key_for_column(column: usize, measure_length: f64) -> MeasureKey {
    let start = (column as f64 * measure_length).round_ties_even();
    (start as i64).to_string()
}
