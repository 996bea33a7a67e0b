//! Unit converter for the converter tools.
//!
//! Every unit carries a factor to its category's base unit (meter, gram,
//! liter, square meter, m/s, second, byte). Temperature is affine and is
//! routed through [`formulas::temperature`](super::formulas::temperature).

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::format::format_number;
use super::formulas::temperature::{self, Scale};
use super::formulas::{finite, FormulaError, FormulaResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitCategory {
    Length,
    Weight,
    Volume,
    Temperature,
    Area,
    Speed,
    Time,
    Data,
}

#[derive(Debug)]
pub struct Unit {
    pub id: &'static str,
    pub symbol: &'static str,
    pub category: UnitCategory,
    /// Multiplier to the category base unit. Unused for temperature.
    factor: f64,
    aliases: &'static [&'static str],
}

const fn unit(
    id: &'static str,
    symbol: &'static str,
    category: UnitCategory,
    factor: f64,
    aliases: &'static [&'static str],
) -> Unit {
    Unit {
        id,
        symbol,
        category,
        factor,
        aliases,
    }
}

use UnitCategory::*;

static UNITS: &[Unit] = &[
    unit("meter", "m", Length, 1.0, &["m", "meters", "metre", "metres"]),
    unit("kilometer", "km", Length, 1000.0, &["km", "kilometers", "kilometre", "kilometres"]),
    unit("centimeter", "cm", Length, 0.01, &["cm", "centimeters", "centimetre"]),
    unit("millimeter", "mm", Length, 0.001, &["mm", "millimeters", "millimetre"]),
    unit("mile", "mi", Length, 1609.344, &["mi", "miles"]),
    unit("yard", "yd", Length, 0.9144, &["yd", "yards"]),
    unit("foot", "ft", Length, 0.3048, &["ft", "feet"]),
    unit("inch", "in", Length, 0.0254, &["in", "inches", "\""]),
    unit("nautical_mile", "nmi", Length, 1852.0, &["nmi", "nautical mile", "nautical miles"]),
    unit("kilogram", "kg", Weight, 1000.0, &["kg", "kilograms", "kilo", "kilos"]),
    unit("gram", "g", Weight, 1.0, &["g", "grams"]),
    unit("milligram", "mg", Weight, 0.001, &["mg", "milligrams"]),
    unit("pound", "lb", Weight, 453.59237, &["lb", "lbs", "pounds"]),
    unit("ounce", "oz", Weight, 28.349523125, &["oz", "ounces"]),
    unit("metric_ton", "t", Weight, 1_000_000.0, &["t", "ton", "tons", "tonne", "tonnes"]),
    unit("stone", "st", Weight, 6350.29318, &["st", "stones"]),
    unit("liter", "L", Volume, 1.0, &["l", "liters", "litre", "litres"]),
    unit("milliliter", "mL", Volume, 0.001, &["ml", "milliliters", "millilitre"]),
    unit("gallon", "gal", Volume, 3.785411784, &["gal", "gallons"]),
    unit("quart", "qt", Volume, 0.946352946, &["qt", "quarts"]),
    unit("pint", "pt", Volume, 0.473176473, &["pt", "pints"]),
    unit("cup", "cup", Volume, 0.2365882365, &["cups"]),
    unit("fluid_ounce", "fl oz", Volume, 0.0295735295625, &["fl oz", "floz", "fluid ounce", "fluid ounces"]),
    unit("tablespoon", "tbsp", Volume, 0.01478676478125, &["tbsp", "tablespoons"]),
    unit("teaspoon", "tsp", Volume, 0.00492892159375, &["tsp", "teaspoons"]),
    unit("celsius", "°C", Temperature, 0.0, &["c", "°c"]),
    unit("fahrenheit", "°F", Temperature, 0.0, &["f", "°f"]),
    unit("kelvin", "K", Temperature, 0.0, &["k"]),
    unit("square_meter", "m²", Area, 1.0, &["sqm", "m2", "m²", "square meter", "square meters"]),
    unit("square_foot", "ft²", Area, 0.09290304, &["sqft", "ft2", "ft²", "square foot", "square feet"]),
    unit("square_kilometer", "km²", Area, 1_000_000.0, &["sqkm", "km2", "km²"]),
    unit("square_mile", "mi²", Area, 2_589_988.110336, &["sqmi", "mi2", "mi²"]),
    unit("acre", "acre", Area, 4046.8564224, &["acres"]),
    unit("hectare", "ha", Area, 10_000.0, &["ha", "hectares"]),
    unit("meters_per_second", "m/s", Speed, 1.0, &["m/s", "mps"]),
    unit("kilometers_per_hour", "km/h", Speed, 1.0 / 3.6, &["km/h", "kph", "kmh"]),
    unit("miles_per_hour", "mph", Speed, 0.44704, &["mph", "mi/h"]),
    unit("knot", "kn", Speed, 1852.0 / 3600.0, &["kn", "knots"]),
    unit("second", "s", Time, 1.0, &["s", "sec", "seconds"]),
    unit("minute", "min", Time, 60.0, &["min", "minutes"]),
    unit("hour", "hr", Time, 3600.0, &["h", "hr", "hours"]),
    unit("day", "day", Time, 86_400.0, &["days"]),
    unit("week", "week", Time, 604_800.0, &["weeks"]),
    unit("month", "month", Time, 2_629_746.0, &["months"]),
    unit("year", "yr", Time, 31_556_952.0, &["yr", "years"]),
    unit("byte", "B", Data, 1.0, &["b", "bytes"]),
    unit("kilobyte", "KB", Data, 1e3, &["kb", "kilobytes"]),
    unit("megabyte", "MB", Data, 1e6, &["mb", "megabytes"]),
    unit("gigabyte", "GB", Data, 1e9, &["gb", "gigabytes"]),
    unit("terabyte", "TB", Data, 1e12, &["tb", "terabytes"]),
    unit("kibibyte", "KiB", Data, 1024.0, &["kib"]),
    unit("mebibyte", "MiB", Data, 1_048_576.0, &["mib"]),
    unit("gibibyte", "GiB", Data, 1_073_741_824.0, &["gib"]),
    unit("tebibyte", "TiB", Data, 1_099_511_627_776.0, &["tib"]),
];

/// Lowercased ids and aliases to their unit.
static LOOKUP: Lazy<HashMap<String, &'static Unit>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for u in UNITS {
        m.insert(u.id.to_string(), u);
        m.insert(u.id.replace('_', " "), u);
        for alias in u.aliases {
            m.insert(alias.to_lowercase(), u);
        }
    }
    m
});

/// Resolve a unit by id, symbol or alias, case-insensitively.
pub fn lookup(name: &str) -> Option<&'static Unit> {
    LOOKUP.get(name.trim().to_lowercase().as_str()).copied()
}

/// All units in a category, in table order.
pub fn units_in(category: UnitCategory) -> Vec<&'static Unit> {
    UNITS.iter().filter(|u| u.category == category).collect()
}

/// A conversion result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub from_value: f64,
    pub from_unit: String,
    pub to_value: f64,
    pub to_unit: String,
    pub category: UnitCategory,
}

impl Conversion {
    /// Format as display string: "10 km = 6.213712 mi"
    pub fn display(&self) -> String {
        format!(
            "{} {} = {} {}",
            format_number(self.from_value),
            self.from_unit,
            format_number(self.to_value),
            self.to_unit
        )
    }

    /// Get just the result value formatted
    pub fn result(&self) -> String {
        format!("{} {}", format_number(self.to_value), self.to_unit)
    }
}

fn scale_of(unit: &Unit) -> Option<Scale> {
    match unit.id {
        "celsius" => Some(Scale::Celsius),
        "fahrenheit" => Some(Scale::Fahrenheit),
        "kelvin" => Some(Scale::Kelvin),
        _ => None,
    }
}

/// Convert `value` between two units of the same category.
pub fn convert(value: f64, from: &str, to: &str) -> FormulaResult<Conversion> {
    let value = finite("value", value)?;
    let from_unit = lookup(from).ok_or_else(|| FormulaError::UnknownUnit(from.to_string()))?;
    let to_unit = lookup(to).ok_or_else(|| FormulaError::UnknownUnit(to.to_string()))?;

    if from_unit.category != to_unit.category {
        return Err(FormulaError::IncompatibleUnits {
            from: from_unit.id.to_string(),
            to: to_unit.id.to_string(),
        });
    }

    let to_value = match (scale_of(from_unit), scale_of(to_unit)) {
        (Some(f), Some(t)) => temperature::convert(value, f, t)?.value,
        _ => {
            // Physical quantities in these categories cannot be negative.
            if value < 0.0 {
                return Err(FormulaError::Negative { field: "value" });
            }
            value * from_unit.factor / to_unit.factor
        }
    };

    Ok(Conversion {
        from_value: value,
        from_unit: from_unit.symbol.to_string(),
        to_value,
        to_unit: to_unit.symbol.to_string(),
        category: from_unit.category,
    })
}

/// Split "10km" or "10 km" into (10.0, "km")
fn parse_value_unit(s: &str) -> Option<(f64, &str)> {
    let s = s.trim();
    let num_end = s
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    let (num, unit) = s.split_at(num_end);
    let unit = unit.trim();
    if unit.is_empty() || !num.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    Some((num.parse().ok()?, unit))
}

/// Parse a free-text query such as `"10km to miles"` or `"32 f in c"`.
pub fn parse_query(query: &str) -> Option<(f64, String, String)> {
    let query = query.trim().to_lowercase();
    let (from_part, to_part) = query
        .split_once(" to ")
        .or_else(|| query.split_once(" in "))?;

    let (value, from_unit) = parse_value_unit(from_part)?;
    let to_unit = to_part.trim();
    if to_unit.is_empty() {
        return None;
    }

    Some((value, from_unit.to_string(), to_unit.to_string()))
}

/// Parse and convert a free-text query, returning `None` for anything that
/// is not a valid conversion.
pub fn convert_query(query: &str) -> Option<Conversion> {
    let (value, from, to) = parse_query(query)?;
    convert(value, &from, &to).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_km_to_miles() {
        let result = convert(10.0, "km", "miles").unwrap();
        assert!((result.to_value - 6.21371).abs() < 0.001);
        assert_eq!(result.to_unit, "mi");
    }

    #[test]
    fn test_temperature_goes_through_formula() {
        let result = convert(212.0, "F", "celsius").unwrap();
        assert!((result.to_value - 100.0).abs() < 1e-9);
        assert_eq!(
            convert(-500.0, "f", "c"),
            Err(FormulaError::BelowAbsoluteZero)
        );
    }

    #[test]
    fn test_data_units() {
        let result = convert(1.0, "GiB", "MiB").unwrap();
        assert_eq!(result.to_value, 1024.0);
    }

    #[test]
    fn test_incompatible_and_unknown() {
        assert!(matches!(
            convert(10.0, "km", "kg"),
            Err(FormulaError::IncompatibleUnits { .. })
        ));
        assert_eq!(
            convert(1.0, "parsec", "m"),
            Err(FormulaError::UnknownUnit("parsec".into()))
        );
        assert!(convert(-1.0, "kg", "lb").is_err());
    }

    #[test]
    fn test_parse_query() {
        assert_eq!(
            parse_query("10km to miles"),
            Some((10.0, "km".to_string(), "miles".to_string()))
        );
        assert_eq!(
            parse_query("3.5 Gallons in liters"),
            Some((3.5, "gallons".to_string(), "liters".to_string()))
        );
        assert_eq!(
            parse_query("-5 c to f"),
            Some((-5.0, "c".to_string(), "f".to_string()))
        );
        assert!(parse_query("km to miles").is_none());
        assert!(parse_query("10 km").is_none());
    }

    #[test]
    fn test_convert_query_display() {
        let conversion = convert_query("1 kg to lb").unwrap();
        assert!(conversion.display().starts_with("1 kg = 2.2046"));
        assert!(convert_query("nonsense").is_none());
    }

    #[test]
    fn test_units_in_category() {
        let temps = units_in(UnitCategory::Temperature);
        assert_eq!(temps.len(), 3);
        assert!(units_in(UnitCategory::Length).iter().any(|u| u.id == "nautical_mile"));
    }

    #[test]
    fn test_every_alias_resolves_to_its_unit() {
        for u in UNITS {
            for alias in u.aliases {
                assert_eq!(lookup(alias).map(|x| x.id), Some(u.id), "alias {}", alias);
            }
        }
    }
}
