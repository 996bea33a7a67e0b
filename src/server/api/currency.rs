//! Exchange-rate handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::ApiError;
use crate::server::AppState;
use crate::services::currency::{ConversionQuote, CurrencyCode, RatesSnapshot};

/// Rates quoted against `base`.
pub async fn rates(
    State(state): State<Arc<AppState>>,
    Path(base): Path<String>,
) -> Result<Json<RatesSnapshot>, ApiError> {
    let base = CurrencyCode::parse(&base)?;
    Ok(Json(state.currency.get_exchange_rates(&base).await))
}

#[derive(Deserialize)]
pub struct ConvertParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<f64>,
}

pub async fn convert(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConvertParams>,
) -> Result<Json<ConversionQuote>, ApiError> {
    let (Some(from), Some(to)) = (params.from, params.to) else {
        return Err(ApiError::BadRequest("from and to are required".to_string()));
    };
    let from = CurrencyCode::parse(&from)?;
    let to = CurrencyCode::parse(&to)?;
    let amount = params.amount.unwrap_or(1.0);

    Ok(Json(state.currency.convert(amount, &from, &to).await?))
}
