//! Loan EMI and compound interest.

use serde::Serialize;

use super::{in_range, FormulaError, FormulaResult};

const MAX_PRINCIPAL: f64 = 1e12;
const MAX_MONTHS: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanResult {
    pub emi: f64,
    pub total_payment: f64,
    pub total_interest: f64,
    pub months: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmortizationRow {
    pub month: u32,
    pub payment: f64,
    pub principal: f64,
    pub interest: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundResult {
    pub amount: f64,
    pub interest: f64,
}

fn check_loan(principal: f64, annual_rate: f64, months: u32) -> FormulaResult<(f64, f64)> {
    let principal = in_range("principal", principal, 0.01, MAX_PRINCIPAL)?;
    let rate = in_range("annualRate", annual_rate, 0.0, 100.0)?;
    if months == 0 || months > MAX_MONTHS {
        return Err(FormulaError::OutOfRange {
            field: "months",
            min: 1.0,
            max: MAX_MONTHS as f64,
        });
    }
    Ok((principal, rate / 12.0 / 100.0))
}

fn emi_for(principal: f64, monthly_rate: f64, months: u32) -> f64 {
    if monthly_rate == 0.0 {
        return principal / months as f64;
    }
    let factor = (1.0 + monthly_rate).powi(months as i32);
    principal * monthly_rate * factor / (factor - 1.0)
}

/// Equated monthly instalment: `P·r·(1+r)ⁿ / ((1+r)ⁿ−1)`.
pub fn loan_emi(principal: f64, annual_rate: f64, months: u32) -> FormulaResult<LoanResult> {
    let (principal, monthly_rate) = check_loan(principal, annual_rate, months)?;

    let emi = emi_for(principal, monthly_rate, months);
    let total_payment = emi * months as f64;

    Ok(LoanResult {
        emi,
        total_payment,
        total_interest: total_payment - principal,
        months,
    })
}

/// Month-by-month split of each instalment into principal and interest.
pub fn amortization_schedule(
    principal: f64,
    annual_rate: f64,
    months: u32,
) -> FormulaResult<Vec<AmortizationRow>> {
    let (principal, monthly_rate) = check_loan(principal, annual_rate, months)?;
    let emi = emi_for(principal, monthly_rate, months);

    let mut balance = principal;
    let mut rows = Vec::with_capacity(months as usize);
    for month in 1..=months {
        let interest = balance * monthly_rate;
        let principal_part = emi - interest;
        balance = (balance - principal_part).max(0.0);
        rows.push(AmortizationRow {
            month,
            payment: emi,
            principal: principal_part,
            interest,
            balance,
        });
    }

    Ok(rows)
}

/// `A = P(1 + r/n)^(n·t)`.
pub fn compound_interest(
    principal: f64,
    annual_rate: f64,
    years: f64,
    compounds_per_year: u32,
) -> FormulaResult<CompoundResult> {
    let principal = in_range("principal", principal, 0.0, MAX_PRINCIPAL)?;
    let rate = in_range("annualRate", annual_rate, 0.0, 100.0)? / 100.0;
    let years = in_range("years", years, 0.0, 100.0)?;
    if compounds_per_year == 0 || compounds_per_year > 365 {
        return Err(FormulaError::OutOfRange {
            field: "compoundsPerYear",
            min: 1.0,
            max: 365.0,
        });
    }

    let n = compounds_per_year as f64;
    let amount = principal * (1.0 + rate / n).powf(n * years);

    Ok(CompoundResult {
        amount,
        interest: amount - principal,
    })
}
