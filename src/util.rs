use crate::device::Rgb;
use crate::error::RemoteError;
use std::sync::{Mutex, MutexGuard};

/// Locks `mutex`, carrying on with the inner value if a panicking holder
/// poisoned it.
pub(crate) fn lock_or_recover<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::error!("Shared state mutex poisoned!");
            poisoned.into_inner() // Still use the value
        }
    }
}

/// Parses `#RRGGBB` (the `#` is optional, case does not matter).
pub fn parse_hex_color(s: &str) -> Result<Rgb, RemoteError> {
    let trimmed = s.trim();
    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RemoteError::InvalidColor(s.to_string()));
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
    match (channel(0), channel(2), channel(4)) {
        (Ok(r), Ok(g), Ok(b)) => Ok(Rgb::new(r, g, b)),
        _ => Err(RemoteError::InvalidColor(s.to_string())),
    }
}

/// Normalises a colour code to upper-case `RRGGBB` without the `#`, if valid.
/// Surrounding whitespace makes the code invalid.
pub fn normalize_hex(s: &str) -> Option<String> {
    let upper = s.to_ascii_uppercase();
    let hex = upper.strip_prefix('#').unwrap_or(&upper);
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hex.to_string())
    } else {
        None
    }
}

/// Perceived luminance in `0.0..=1.0` (Rec. 601 weights).
pub fn luminance(rgb: Rgb) -> f64 {
    (0.299 * f64::from(rgb.r) + 0.587 * f64::from(rgb.g) + 0.114 * f64::from(rgb.b)) / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff7a00").unwrap(), Rgb::new(255, 122, 0));
        assert_eq!(parse_hex_color("15C2B8").unwrap(), Rgb::new(0x15, 0xC2, 0xB8));
        assert!(parse_hex_color("#fff").is_err());
        assert!(parse_hex_color("#gg0000").is_err());
        assert!(parse_hex_color("#ff00ff00").is_err());
    }

    #[test]
    fn test_normalize_hex() {
        assert_eq!(normalize_hex("#00ff00").as_deref(), Some("00FF00"));
        assert_eq!(normalize_hex("abcdef").as_deref(), Some("ABCDEF"));
        assert_eq!(normalize_hex("#12345"), None);
        assert_eq!(normalize_hex("##123456"), None);
        assert_eq!(normalize_hex(" #123456"), None);
        assert_eq!(normalize_hex("123456\n"), None);
    }

    #[test]
    fn test_luminance_bounds() {
        assert_eq!(luminance(Rgb::new(0, 0, 0)), 0.0);
        assert!((luminance(Rgb::new(255, 255, 255)) - 1.0).abs() < 1e-9);
    }
}
