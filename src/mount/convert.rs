//! Lenient number parsing for mount replies.
//!
//! The mount pads values (`+047.9945`, `002.98`) and answers `E` or `e` where a value is
//! unavailable; both parse helpers map anything unusable to `None`.

pub fn value_to_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn value_to_int(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_padded_numbers() {
        assert_eq!(value_to_float("+047.9945"), Some(47.9945));
        assert_eq!(value_to_float(" 002.98 "), Some(2.98));
        assert_eq!(value_to_int("-1"), Some(-1));
    }

    #[test]
    fn rejects_placeholders() {
        assert_eq!(value_to_float("E"), None);
        assert_eq!(value_to_float("nan"), None);
        assert_eq!(value_to_int("e"), None);
        assert_eq!(value_to_int(""), None);
    }
}
