//! Integer conversion between radices 2 through 36.

use super::{FormulaError, FormulaResult};

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn check_radix(field: &'static str, radix: u32) -> FormulaResult<u32> {
    if (2..=36).contains(&radix) {
        Ok(radix)
    } else {
        Err(FormulaError::OutOfRange {
            field,
            min: 2.0,
            max: 36.0,
        })
    }
}

/// Parse `input` in `radix`, returning `(negative, magnitude)`.
pub fn parse_in_radix(input: &str, radix: u32) -> FormulaResult<(bool, u128)> {
    let radix = check_radix("from", radix)?;
    let trimmed = input.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    if digits.chars().all(|c| c == '_') {
        return Err(FormulaError::Invalid("no digits to convert".to_string()));
    }

    let mut value: u128 = 0;
    for c in digits.chars().filter(|c| *c != '_') {
        let digit = c.to_digit(radix).ok_or_else(|| {
            FormulaError::Invalid(format!("'{}' is not a base-{} digit", c, radix))
        })?;
        value = value
            .checked_mul(radix as u128)
            .and_then(|v| v.checked_add(digit as u128))
            .ok_or_else(|| FormulaError::Invalid("number is too large".to_string()))?;
    }

    Ok((negative && value != 0, value))
}

/// Render a magnitude in `radix` using lowercase digits.
pub fn format_in_radix(negative: bool, mut value: u128, radix: u32) -> FormulaResult<String> {
    let radix = check_radix("to", radix)? as u128;
    if value == 0 {
        return Ok("0".to_string());
    }

    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % radix) as usize]);
        value /= radix;
    }
    if negative {
        out.push(b'-');
    }
    out.reverse();

    // Only ASCII bytes from DIGITS and '-' were pushed.
    String::from_utf8(out).map_err(|e| FormulaError::Invalid(e.to_string()))
}

pub fn convert_base(input: &str, from: u32, to: u32) -> FormulaResult<String> {
    let (negative, value) = parse_in_radix(input, from)?;
    format_in_radix(negative, value, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_conversions() {
        assert_eq!(convert_base("255", 10, 16).unwrap(), "ff");
        assert_eq!(convert_base("FF", 16, 10).unwrap(), "255");
        assert_eq!(convert_base("1010", 2, 10).unwrap(), "10");
        assert_eq!(convert_base("777", 8, 2).unwrap(), "111111111");
        assert_eq!(convert_base("zz", 36, 10).unwrap(), "1295");
    }

    #[test]
    fn test_sign_and_zero() {
        assert_eq!(convert_base("-42", 10, 16).unwrap(), "-2a");
        assert_eq!(convert_base("-0", 10, 2).unwrap(), "0");
        assert_eq!(convert_base("1_000", 10, 10).unwrap(), "1000");
    }

    #[test]
    fn test_invalid_digits_and_radix() {
        assert!(convert_base("12", 2, 10).is_err());
        assert!(convert_base("", 10, 2).is_err());
        assert!(convert_base("-", 10, 2).is_err());
        assert!(convert_base("10", 1, 10).is_err());
        assert!(convert_base("10", 10, 37).is_err());
    }

    #[test]
    fn test_overflow() {
        let huge = "f".repeat(33);
        assert!(convert_base(&huge, 16, 10).is_err());
        let max = "f".repeat(32);
        assert_eq!(
            convert_base(&max, 16, 10).unwrap(),
            u128::MAX.to_string()
        );
    }

    #[test]
    fn test_separators_alone_are_not_a_number() {
        assert!(convert_base("_", 10, 2).is_err());
        assert!(convert_base("-__", 16, 10).is_err());
        assert_eq!(convert_base("1_000", 10, 16).unwrap(), "3e8");
    }
}
