//! Display formatting shared by the timer badge and both front-ends.
//!
//! Prices support European-style decimals (swapping `.` and `,`) so the
//! kiosk can be localized from configuration without touching the renderers.

/// Swap `.` and `,` in an already-formatted number.
fn europeanize(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '.' => ',',
            ',' => '.',
            c => c,
        })
        .collect()
}

#[inline]
fn maybe_eu(s: String, european: bool) -> String {
    if european { europeanize(&s) } else { s }
}

/// Format remaining play time as zero-padded `MM:SS`.
///
/// Negative values clamp to `00:00`; minutes are not capped at 99.
///
/// # Examples
/// ```
/// use coinop_types::formatting::format_clock;
/// assert_eq!(format_clock(125), "02:05");
/// assert_eq!(format_clock(9), "00:09");
/// assert_eq!(format_clock(-3), "00:00");
/// ```
pub fn format_clock(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Format a price with two decimals and a leading currency sign.
///
/// # Examples
/// ```
/// use coinop_types::formatting::format_price;
/// assert_eq!(format_price(2.5, false), "$2.50");
/// assert_eq!(format_price(2.5, true), "$2,50");
/// ```
pub fn format_price(amount: f64, european: bool) -> String {
    maybe_eu(format!("${:.2}", amount), european)
}

/// Label shown under the minute picker.
pub fn format_cost_label(amount: f64, european: bool) -> String {
    format!("TOTAL COST: {}", format_price(amount, european))
}

/// Format a minute count for the picker (`1 MINUTE`, `5 MINUTES`).
pub fn format_minutes(minutes: u32) -> String {
    if minutes == 1 {
        "1 MINUTE".to_string()
    } else {
        format!("{} MINUTES", minutes)
    }
}
