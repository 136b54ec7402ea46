//! Display formatting for earnings

/// Earnings rounded to one decimal, with a decimal comma
///
/// Halves round up (26.25 -> "26,3"), whole numbers drop the decimal
/// ("26", not "26,0").
pub fn format_earnings(value: f64) -> String {
    let rounded = (value * 10.0 + 0.5).floor() / 10.0;
    // avoid "-0" for small negative inputs
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    rounded.to_string().replace('.', ",")
}
