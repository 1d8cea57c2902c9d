//! DCF valuation API routes.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use dcf_engine::{AssumptionComparison, AvailableCompany, CompanyAssumptionsView, ValuationRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use valuation_core::numeric::clean_for_output;
use valuation_core::ValuationError;

use crate::request_id::RequestId;
use crate::{ApiResponse, AppError, AppState};

const DEFAULT_COMPARISON: &str = "AAPL,TSLA,KO";

/// Map engine failures onto HTTP statuses.
fn valuation_err(ticker: &str, e: ValuationError) -> AppError {
    let status = match &e {
        ValuationError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
        ValuationError::InsufficientData(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ValuationError::DataProvider(_) => StatusCode::BAD_GATEWAY,
        ValuationError::Calculation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    AppError::with_status(status, anyhow::anyhow!("{}: {}", ticker, e))
}

#[derive(Debug, Deserialize)]
pub struct DcfQuery {
    #[serde(default = "default_years")]
    pub years: usize,
    #[serde(default = "default_midyear")]
    pub midyear: bool,
    #[serde(default, alias = "terminal_growth_override")]
    pub terminal_growth: Option<f64>,
    #[serde(default)]
    pub wacc_override: Option<f64>,
    #[serde(default)]
    pub debug: bool,
}

fn default_years() -> usize {
    10
}

fn default_midyear() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub tickers: Option<String>,
}

#[derive(Serialize)]
pub struct AvailableTickersResponse {
    pub available_tickers: Vec<String>,
    pub count: usize,
    pub companies: Vec<AvailableCompany>,
}

#[derive(Serialize)]
pub struct CompareResponse {
    pub comparison: BTreeMap<String, AssumptionComparison>,
    pub note: String,
}

pub fn dcf_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dcf/health", get(health))
        .route("/api/dcf/available-tickers", get(available_tickers))
        .route("/api/dcf/compare-assumptions", get(compare_assumptions))
        .route("/api/dcf/company-data/:ticker", get(company_data))
        .route("/api/dcf/:ticker", get(valuate))
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "ok": true }))
}

async fn valuate(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(ticker): Path<String>,
    Query(query): Query<DcfQuery>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let request = ValuationRequest {
        ticker: ticker.clone(),
        years: query.years,
        midyear: query.midyear,
        terminal_growth_override: query.terminal_growth,
        wacc_override: query.wacc_override,
        debug: query.debug,
    };
    tracing::info!(%request_id, ticker = %ticker, years = request.years, "DCF request");

    let report = state
        .engine
        .valuate(&request)
        .await
        .map_err(|e| valuation_err(&ticker, e))?;

    Ok(Json(ApiResponse::success(clean_for_output(&report))))
}

async fn company_data(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<ApiResponse<CompanyAssumptionsView>>, AppError> {
    let view = state
        .engine
        .company_assumptions(&ticker)
        .await
        .map_err(|e| valuation_err(&ticker, e))?;
    Ok(Json(ApiResponse::success(view)))
}

async fn available_tickers(State(state): State<AppState>) -> Json<ApiResponse<AvailableTickersResponse>> {
    let companies = state.engine.available_companies();
    Json(ApiResponse::success(AvailableTickersResponse {
        available_tickers: companies.iter().map(|c| c.ticker.clone()).collect(),
        count: companies.len(),
        companies,
    }))
}

async fn compare_assumptions(
    State(state): State<AppState>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<ApiResponse<CompareResponse>>, AppError> {
    let raw = query.tickers.unwrap_or_else(|| DEFAULT_COMPARISON.to_string());
    let tickers: Vec<String> = raw
        .split(',')
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect();
    if tickers.is_empty() {
        return Err(AppError::bad_request("tickers must name at least one symbol"));
    }

    let comparison = state
        .engine
        .compare_assumptions(&tickers)
        .await
        .map_err(|e| valuation_err(&raw, e))?;

    Ok(Json(ApiResponse::success(CompareResponse {
        comparison,
        note: "Rates are in percent. Each company's assumptions reflect its risk profile and capital structure."
            .to_string(),
    })))
}

#[cfg(test)]
#[path = "dcf_routes_tests.rs"]
mod dcf_routes_tests;
