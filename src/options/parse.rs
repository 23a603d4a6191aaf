//! Option text parsers
//!
//! Every parser returns `None` for text it cannot use; callers decide the
//! fallback and log.

use enumflags2::BitFlags;

use super::{ButtonMap, CalibrationMatrix};
use crate::device::{ClickMethod, ScrollMethod, SendEventsMode};

/// Boolean option text: 1/on/true/yes or 0/off/false/no
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Some(true),
        "0" | "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Floating-point option text
pub fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Unsigned integer option text
pub fn parse_u32(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}

/// Lowercased text without separators, for prefix matching of method names
fn method_text(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Scroll method text. `Some(None)` selects no scrolling.
pub fn parse_scroll_method(text: &str) -> Option<Option<ScrollMethod>> {
    let method = method_text(text);
    if method.starts_with("twofinger") {
        Some(Some(ScrollMethod::TwoFinger))
    } else if method.starts_with("edge") {
        Some(Some(ScrollMethod::Edge))
    } else if method.starts_with("button") {
        Some(Some(ScrollMethod::OnButtonDown))
    } else if method.starts_with("none") {
        Some(None)
    } else {
        None
    }
}

/// Click method text. `Some(None)` selects no click method.
pub fn parse_click_method(text: &str) -> Option<Option<ClickMethod>> {
    let method = method_text(text);
    if method.starts_with("buttonareas") {
        Some(Some(ClickMethod::ButtonAreas))
    } else if method.starts_with("clickfinger") {
        Some(Some(ClickMethod::Clickfinger))
    } else if method.starts_with("none") {
        Some(None)
    } else {
        None
    }
}

/// Send-events mode text: enabled, disabled or disabled-on-external-mouse
pub fn parse_send_events_mode(text: &str) -> Option<BitFlags<SendEventsMode>> {
    match text.trim().to_ascii_lowercase().as_str() {
        "enabled" => Some(BitFlags::empty()),
        "disabled" => Some(SendEventsMode::Disabled.into()),
        "disabled-on-external-mouse" => Some(SendEventsMode::DisabledOnExternalMouse.into()),
        _ => None,
    }
}

/// Calibration text: the first nine whitespace-separated floats
///
/// Parsing stops at the first token that is not a number. Fewer than nine
/// values is a failure. The bottom row is forced to `0 0 1`.
pub fn parse_calibration(text: &str) -> Option<CalibrationMatrix> {
    let values: Vec<f32> = text
        .split_whitespace()
        .map_while(|token| token.parse::<f32>().ok().filter(|v| v.is_finite()))
        .take(9)
        .collect();

    let elements: [f32; 9] = values.try_into().ok()?;
    Some(CalibrationMatrix(elements).normalized())
}

/// Button remap text: integers separated by whitespace and/or commas
///
/// Any non-numeric token, a value above 32, or more than 32 entries rejects
/// the whole table.
pub fn parse_button_map(text: &str) -> Option<ButtonMap> {
    let entries = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| token.parse::<u32>().ok())
        .collect::<Option<Vec<u32>>>()?;

    ButtonMap::from_entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        for text in ["1", "on", "TRUE", " yes "] {
            assert_eq!(parse_bool(text), Some(true), "{text}");
        }
        for text in ["0", "Off", "false", "no"] {
            assert_eq!(parse_bool(text), Some(false), "{text}");
        }
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_parse_scroll_method() {
        assert_eq!(
            parse_scroll_method("twofinger"),
            Some(Some(ScrollMethod::TwoFinger))
        );
        assert_eq!(
            parse_scroll_method("Two-Finger"),
            Some(Some(ScrollMethod::TwoFinger))
        );
        assert_eq!(parse_scroll_method("EDGE"), Some(Some(ScrollMethod::Edge)));
        assert_eq!(
            parse_scroll_method("button"),
            Some(Some(ScrollMethod::OnButtonDown))
        );
        assert_eq!(parse_scroll_method("none"), Some(None));
        assert_eq!(parse_scroll_method("circular"), None);
    }

    #[test]
    fn test_parse_click_method() {
        assert_eq!(
            parse_click_method("buttonareas"),
            Some(Some(ClickMethod::ButtonAreas))
        );
        assert_eq!(
            parse_click_method("ClickFinger"),
            Some(Some(ClickMethod::Clickfinger))
        );
        assert_eq!(parse_click_method("none"), Some(None));
        assert_eq!(parse_click_method("button"), None);
    }

    #[test]
    fn test_parse_send_events_mode() {
        assert_eq!(parse_send_events_mode("enabled"), Some(BitFlags::empty()));
        assert_eq!(
            parse_send_events_mode("Disabled"),
            Some(SendEventsMode::Disabled.into())
        );
        assert_eq!(
            parse_send_events_mode("disabled-on-external-mouse"),
            Some(SendEventsMode::DisabledOnExternalMouse.into())
        );
        assert_eq!(parse_send_events_mode("sometimes"), None);
    }

    #[test]
    fn test_parse_calibration() {
        let matrix = parse_calibration("0.5 0 0 0 1 0 0 0 1").unwrap();
        assert_eq!(matrix.0, [0.5, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

        let matrix = parse_calibration("1 0 10 0 1 20 7 8 9 extra").unwrap();
        assert_eq!(matrix.0, [1.0, 0.0, 10.0, 0.0, 1.0, 20.0, 0.0, 0.0, 1.0]);

        assert_eq!(parse_calibration("1 0 0 0 1 0"), None);
        assert_eq!(parse_calibration("1 0 0 x 1 0 0 0 1"), None);
        assert_eq!(parse_calibration(""), None);
    }

    #[test]
    fn test_parse_button_map() {
        let map = parse_button_map("3 2 1").unwrap();
        assert_eq!(map.entries(), &[3, 2, 1]);

        let map = parse_button_map("1,2, 3 ,9").unwrap();
        assert_eq!(map.entries(), &[1, 2, 3, 9]);

        assert!(parse_button_map("1 two 3").is_none());
        assert!(parse_button_map("1 33").is_none());
        assert!(parse_button_map("-1").is_none());
        assert!(parse_button_map("").unwrap().is_identity());
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_float(" -0.5 "), Some(-0.5));
        assert_eq!(parse_float("NaN"), None);
        assert_eq!(parse_u32("3"), Some(3));
        assert_eq!(parse_u32("-3"), None);
    }
}
