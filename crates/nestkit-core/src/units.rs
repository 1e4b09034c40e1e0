//! Number formatting for machine programs and file names
//!
//! Every coordinate written into a machine program goes through
//! [`format_coord`], so the machine profile's decimal precision is applied in
//! exactly one place.

/// Format a coordinate with a fixed number of decimals.
///
/// Negative zero is normalized so programs never contain `-0.000`.
pub fn format_coord(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value);
    if formatted.starts_with('-') && formatted[1..].chars().all(|c| c == '0' || c == '.') {
        formatted[1..].to_string()
    } else {
        formatted
    }
}

/// Format a feed rate or spindle speed (whole units per minute).
pub fn format_rate(value: f64) -> String {
    format!("{:.0}", value.max(0.0))
}

/// Format a dimension for use in file names and labels, dropping a zero
/// fractional part (`18.0` -> `18`, `15.5` -> `15.5`).
pub fn format_dimension(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        let s = format!("{:.3}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Parse a decimal number that may use a comma as decimal separator.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replace(',', ".").parse::<f64>().ok()
}
