//! Avatar color assignment.
//!
//! New accounts get a dark variant of one of a few vivid base colors so that
//! white initials stay readable on top of it.

use rand::seq::SliceRandom;

use crate::error::ColorError;

/// Base palette the avatar colors are derived from.
pub const BASE_COLORS: [&str; 7] = [
    "#FF6347", // tomato red
    "#4682B4", // steel blue
    "#32CD32", // lime green
    "#FFD700", // gold
    "#9932CC", // dark orchid
    "#1E90FF", // dodger blue
    "#FF4500", // orange red
];

/// Halve each RGB component of a `#rrggbb` (or `rrggbb`) color.
pub fn darken(hex: &str) -> Result<String, ColorError> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(ColorError::InvalidHex(hex.to_string()));
    }

    let mut out = String::with_capacity(7);
    out.push('#');
    for i in (0..6).step_by(2) {
        let component = u8::from_str_radix(&digits[i..i + 2], 16)
            .map_err(|_| ColorError::InvalidHex(hex.to_string()))?;
        let halved = (f64::from(component) * 0.5).round() as u8;
        out.push_str(&format!("{halved:02x}"));
    }
    Ok(out)
}

/// Pick a random base color and return its darker variant.
pub fn random_dark_color() -> String {
    let base = BASE_COLORS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(BASE_COLORS[0]);
    // The palette is static and well-formed.
    darken(base).unwrap_or_else(|_| "#000000".to_string())
}
