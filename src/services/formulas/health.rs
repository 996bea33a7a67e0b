//! BMI and U.S. Navy body-fat estimates.

use serde::{Deserialize, Serialize};

use super::{in_range, FormulaError, FormulaResult};

const CM_PER_INCH: f64 = 2.54;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    fn classify(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 25.0 {
            BmiCategory::Normal
        } else if bmi < 30.0 {
            BmiCategory::Overweight
        } else {
            BmiCategory::Obese
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BmiResult {
    pub bmi: f64,
    pub category: BmiCategory,
}

/// Body mass index: `kg / m²`.
pub fn bmi(weight_kg: f64, height_cm: f64) -> FormulaResult<BmiResult> {
    let weight = in_range("weightKg", weight_kg, 1.0, 500.0)?;
    let height_m = in_range("heightCm", height_cm, 30.0, 300.0)? / 100.0;

    let bmi = weight / (height_m * height_m);
    Ok(BmiResult {
        bmi,
        category: BmiCategory::classify(bmi),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFatCategory {
    Essential,
    Athlete,
    Fitness,
    Average,
    Obese,
}

impl BodyFatCategory {
    fn classify(sex: Sex, percent: f64) -> Self {
        let bounds = match sex {
            Sex::Male => [6.0, 14.0, 18.0, 25.0],
            Sex::Female => [14.0, 21.0, 25.0, 32.0],
        };
        if percent < bounds[0] {
            BodyFatCategory::Essential
        } else if percent < bounds[1] {
            BodyFatCategory::Athlete
        } else if percent < bounds[2] {
            BodyFatCategory::Fitness
        } else if percent < bounds[3] {
            BodyFatCategory::Average
        } else {
            BodyFatCategory::Obese
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BodyFatResult {
    pub percent: f64,
    pub category: BodyFatCategory,
}

/// U.S. Navy circumference method. Measurements are taken in centimetres and
/// evaluated with the inch-based coefficients.
pub fn body_fat_navy(
    sex: Sex,
    height_cm: f64,
    waist_cm: f64,
    neck_cm: f64,
    hip_cm: Option<f64>,
) -> FormulaResult<BodyFatResult> {
    let height = in_range("heightCm", height_cm, 100.0, 250.0)? / CM_PER_INCH;
    let waist = in_range("waistCm", waist_cm, 30.0, 250.0)? / CM_PER_INCH;
    let neck = in_range("neckCm", neck_cm, 20.0, 80.0)? / CM_PER_INCH;

    let percent = match sex {
        Sex::Male => {
            if waist <= neck {
                return Err(FormulaError::Invalid(
                    "waist must be larger than neck".to_string(),
                ));
            }
            86.010 * (waist - neck).log10() - 70.041 * height.log10() + 36.76
        }
        Sex::Female => {
            let hip_cm = hip_cm.ok_or_else(|| {
                FormulaError::Invalid("hipCm is required for female estimates".to_string())
            })?;
            let hip = in_range("hipCm", hip_cm, 40.0, 250.0)? / CM_PER_INCH;
            if waist + hip <= neck {
                return Err(FormulaError::Invalid(
                    "waist plus hip must be larger than neck".to_string(),
                ));
            }
            163.205 * (waist + hip - neck).log10() - 97.684 * height.log10() - 78.387
        }
    };

    if !percent.is_finite() || !(0.0..=75.0).contains(&percent) {
        return Err(FormulaError::Invalid(
            "measurements do not produce a plausible estimate".to_string(),
        ));
    }

    Ok(BodyFatResult {
        percent,
        category: BodyFatCategory::classify(sex, percent),
    })
}
