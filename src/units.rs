//! Identifiers and unit conversions.
//!
//! Pure functions shared by the validation gate, the compression planner and
//! the CLI: record id generation, human size strings (`"2MB"`, `"50%"`) and the
//! reverse formatting used in user-facing messages.
//!
//! Byte sizes are 1024-based throughout, matching what upload inputs declare
//! (`max_size = "2MB"` means 2 × 1024 × 1024 bytes).

/// Generate an opaque record identifier (UUID v4).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Parse the leading decimal number of a string, ignoring any suffix.
///
/// `"2.5MB"` → `Some(2.5)`, `"MB"` → `None`.
fn leading_number(s: &str) -> Option<f64> {
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse::<f64>().ok()
}

/// Parse the leading integer of a string (`"12.7px"` → `Some(12)`).
fn leading_integer(s: &str) -> Option<i64> {
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse::<i64>().ok()
}

/// Parse a human file size into bytes.
///
/// Accepts `GB`, `MB` and `KB` suffixes (case-insensitive, 1024-based) or a
/// plain byte count. Unparseable or negative input yields `0`, which callers
/// treat as "unlimited".
///
/// ```
/// # use image_craft::units::parse_size_to_bytes;
/// assert_eq!(parse_size_to_bytes("2MB"), 2 * 1024 * 1024);
/// assert_eq!(parse_size_to_bytes("1.5kb"), 1536);
/// assert_eq!(parse_size_to_bytes("1000"), 1000);
/// assert_eq!(parse_size_to_bytes("lots"), 0);
/// ```
pub fn parse_size_to_bytes(input: &str) -> u64 {
    let upper = input.trim().to_uppercase();
    let Some(value) = leading_number(&upper) else {
        return 0;
    };
    let multiplier = if upper.contains("GB") {
        1024.0 * 1024.0 * 1024.0
    } else if upper.contains("MB") {
        1024.0 * 1024.0
    } else if upper.contains("KB") {
        1024.0
    } else {
        1.0
    };
    let bytes = (value * multiplier).round();
    if bytes.is_finite() && bytes > 0.0 {
        bytes as u64
    } else {
        0
    }
}

/// Parse a CSS-like length into pixels.
///
/// - `"50%"` → half of `reference`, rounded
/// - `"120px"` or `"120"` → `120`
/// - empty or garbage → `0`
pub fn parse_size_to_pixels(input: &str, reference: u32) -> u32 {
    let s = input.trim();
    if s.is_empty() {
        return 0;
    }
    if let Some(pct) = s.strip_suffix('%') {
        return match leading_number(pct.trim()) {
            Some(p) if p > 0.0 => (p / 100.0 * reference as f64).round() as u32,
            _ => 0,
        };
    }
    let digits = s.strip_suffix("px").unwrap_or(s).trim();
    match leading_integer(digits) {
        Some(n) if n > 0 => n.min(u32::MAX as i64) as u32,
        _ => 0,
    }
}

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Format a byte count for display: `"0 Bytes"`, `"1.5 KB"`, `"2 MB"`.
///
/// At most two decimals, trailing zeros dropped.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(SIZE_UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let mut text = format!("{value:.2}");
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    format!("{} {}", text, SIZE_UNITS[exponent])
}

/// Replace every run of non-word characters with `_`.
///
/// Used to derive form field names from group names (`"gallery[]"` → `"gallery_"`).
pub fn sanitize_field_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if c.is_alphanumeric() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}
