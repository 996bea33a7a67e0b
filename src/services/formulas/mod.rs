//! Closed-form calculators behind the catalog's formula tools.
//!
//! Every engine is a pure function from validated inputs to a result record.
//! Input checks reject non-finite, negative and physically impossible values
//! with a [`FormulaError`] naming the offending field.

pub mod finance;
pub mod health;
pub mod number_base;
pub mod temperature;
pub mod text_case;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::services::{calculator, units};

/// Input validation errors shared by every tool engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("{field} must not be negative")]
    Negative { field: &'static str },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("Temperature is below absolute zero")]
    BelowAbsoluteZero,

    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    #[error("Cannot convert {from} to {to}")]
    IncompatibleUnits { from: String, to: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid input: {0}")]
    Invalid(String),
}

pub type FormulaResult<T> = Result<T, FormulaError>;

pub(crate) fn finite(field: &'static str, value: f64) -> FormulaResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FormulaError::NotFinite { field })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f64) -> FormulaResult<f64> {
    let value = finite(field, value)?;
    if value < 0.0 {
        Err(FormulaError::Negative { field })
    } else {
        Ok(value)
    }
}

pub(crate) fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> FormulaResult<f64> {
    let value = finite(field, value)?;
    if value < min || value > max {
        Err(FormulaError::OutOfRange { field, min, max })
    } else {
        Ok(value)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BmiInput {
    weight_kg: f64,
    height_cm: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoanInput {
    principal: f64,
    annual_rate: f64,
    months: u32,
    #[serde(default)]
    include_schedule: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompoundInput {
    principal: f64,
    annual_rate: f64,
    years: f64,
    #[serde(default = "default_compounds")]
    compounds_per_year: u32,
}

fn default_compounds() -> u32 {
    12
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BodyFatInput {
    sex: health::Sex,
    height_cm: f64,
    waist_cm: f64,
    neck_cm: f64,
    hip_cm: Option<f64>,
}

#[derive(Deserialize)]
struct TemperatureInput {
    value: f64,
    from: temperature::Scale,
    to: temperature::Scale,
}

#[derive(Deserialize)]
struct NumberBaseInput {
    value: String,
    from: u32,
    to: u32,
}

#[derive(Deserialize)]
struct TextCaseInput {
    text: String,
    case: text_case::TextCase,
}

#[derive(Deserialize)]
struct UnitInput {
    value: f64,
    from: String,
    to: String,
}

#[derive(Deserialize)]
struct ExpressionInput {
    expression: String,
}

#[derive(Serialize)]
struct LoanOutput {
    #[serde(flatten)]
    result: finance::LoanResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule: Option<Vec<finance::AmortizationRow>>,
}

#[derive(Serialize)]
struct ValueOutput {
    value: String,
}

#[derive(Serialize)]
struct TextOutput {
    text: String,
}

#[derive(Serialize)]
struct ExpressionOutput {
    expression: String,
    result: f64,
    formatted: String,
}

fn parse<T: DeserializeOwned>(input: Value) -> FormulaResult<T> {
    serde_json::from_value(input).map_err(|e| FormulaError::Invalid(e.to_string()))
}

fn to_json<T: Serialize>(output: T) -> FormulaResult<Value> {
    serde_json::to_value(output).map_err(|e| FormulaError::Invalid(e.to_string()))
}

/// Run the formula tool registered under `tool_id` against a JSON input.
pub fn run(tool_id: &str, input: Value) -> FormulaResult<Value> {
    match tool_id {
        "bmi" => {
            let i: BmiInput = parse(input)?;
            to_json(health::bmi(i.weight_kg, i.height_cm)?)
        }
        "loan-emi" => {
            let i: LoanInput = parse(input)?;
            let result = finance::loan_emi(i.principal, i.annual_rate, i.months)?;
            let schedule = if i.include_schedule {
                Some(finance::amortization_schedule(
                    i.principal,
                    i.annual_rate,
                    i.months,
                )?)
            } else {
                None
            };
            to_json(LoanOutput { result, schedule })
        }
        "compound-interest" => {
            let i: CompoundInput = parse(input)?;
            to_json(finance::compound_interest(
                i.principal,
                i.annual_rate,
                i.years,
                i.compounds_per_year,
            )?)
        }
        "body-fat" => {
            let i: BodyFatInput = parse(input)?;
            to_json(health::body_fat_navy(
                i.sex,
                i.height_cm,
                i.waist_cm,
                i.neck_cm,
                i.hip_cm,
            )?)
        }
        "temperature" => {
            let i: TemperatureInput = parse(input)?;
            to_json(temperature::convert(i.value, i.from, i.to)?)
        }
        "number-base" => {
            let i: NumberBaseInput = parse(input)?;
            to_json(ValueOutput {
                value: number_base::convert_base(&i.value, i.from, i.to)?,
            })
        }
        "text-case" => {
            let i: TextCaseInput = parse(input)?;
            to_json(TextOutput {
                text: text_case::convert_case(&i.text, i.case),
            })
        }
        "unit-converter" => {
            let i: UnitInput = parse(input)?;
            to_json(units::convert(i.value, &i.from, &i.to)?)
        }
        "calculator" => {
            let i: ExpressionInput = parse(input)?;
            let result = calculator::evaluate(&i.expression)?;
            to_json(ExpressionOutput {
                formatted: calculator::format_result(result),
                expression: i.expression,
                result,
            })
        }
        other => Err(FormulaError::UnknownTool(other.to_string())),
    }
}
