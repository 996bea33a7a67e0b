//! Calculator module for evaluating math expressions

use super::formulas::{FormulaError, FormulaResult};

/// Evaluate a math expression.
///
/// Empty input, input without digits, unparsable input and non-finite
/// results are all reported as malformed expressions.
pub fn evaluate(expr: &str) -> FormulaResult<f64> {
    let expr = expr.trim();

    if expr.is_empty() {
        return Err(FormulaError::MalformedExpression(
            "expression is empty".to_string(),
        ));
    }

    // Must contain at least one digit
    if !expr.chars().any(|c| c.is_ascii_digit()) {
        return Err(FormulaError::MalformedExpression(format!(
            "'{}' contains no numbers",
            expr
        )));
    }

    let result = meval::eval_str(expr)
        .map_err(|e| FormulaError::MalformedExpression(e.to_string()))?;

    if result.is_finite() {
        Ok(result)
    } else {
        Err(FormulaError::MalformedExpression(format!(
            "'{}' does not evaluate to a finite number",
            expr
        )))
    }
}

/// Format a result for display
/// Removes unnecessary decimal places (e.g., 4.0 -> "4")
pub fn format_result(value: f64) -> String {
    super::format::format_number(value)
}
