/// Format a floating-point number for display
/// Removes unnecessary decimal places (e.g., 4.0 -> "4")
/// Very small or very large magnitudes switch to scientific notation.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    if value.fract() == 0.0 && value.abs() < 1e12 {
        format!("{}", value as i64)
    } else if value != 0.0 && (value.abs() < 1e-6 || value.abs() >= 1e12) {
        format!("{:.4e}", value)
    } else {
        let formatted = format!("{:.10}", value);
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_whole_numbers() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(-42.0), "-42");
    }

    #[test]
    fn test_format_decimals() {
        assert_eq!(format_number(3.14159), "3.14159");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(1.200), "1.2");
    }

    #[test]
    fn test_format_extremes() {
        assert_eq!(format_number(1.5e-9), "1.5000e-9");
        assert_eq!(format_number(2.5e13), "2.5000e13");
        assert_eq!(format_number(f64::INFINITY), "inf");
    }
}
