//! Temperature scale conversion.

use serde::{Deserialize, Serialize};

use super::{finite, FormulaError, FormulaResult};

const ABSOLUTE_ZERO_C: f64 = -273.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Celsius,
    Fahrenheit,
    Kelvin,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureResult {
    pub value: f64,
    pub scale: Scale,
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

pub fn celsius_to_kelvin(c: f64) -> f64 {
    c - ABSOLUTE_ZERO_C
}

pub fn kelvin_to_celsius(k: f64) -> f64 {
    k + ABSOLUTE_ZERO_C
}

fn to_celsius(value: f64, from: Scale) -> f64 {
    match from {
        Scale::Celsius => value,
        Scale::Fahrenheit => fahrenheit_to_celsius(value),
        Scale::Kelvin => kelvin_to_celsius(value),
    }
}

fn from_celsius(c: f64, to: Scale) -> f64 {
    match to {
        Scale::Celsius => c,
        Scale::Fahrenheit => celsius_to_fahrenheit(c),
        Scale::Kelvin => celsius_to_kelvin(c),
    }
}

/// Convert between scales, rejecting values below absolute zero.
pub fn convert(value: f64, from: Scale, to: Scale) -> FormulaResult<TemperatureResult> {
    let value = finite("value", value)?;
    let celsius = to_celsius(value, from);
    // Allow float noise at the boundary.
    if celsius < ABSOLUTE_ZERO_C - 1e-9 {
        return Err(FormulaError::BelowAbsoluteZero);
    }

    Ok(TemperatureResult {
        value: from_celsius(celsius, to),
        scale: to,
    })
}
