use axum::{extract::State, routing::get, Router};

use crate::analytics::report::AnalyticsSummary;
use crate::api::response::{self, Reply};
use crate::api::state::AppState;
use crate::error::ApiResult;
use crate::store::Store;

pub async fn summary<S: Store + 'static>(
    State(state): State<AppState<S>>,
) -> ApiResult<Reply<AnalyticsSummary>> {
    let report = state.analytics.run_report().await?;
    let summary = AnalyticsSummary::from_rows(&report.rows)?;
    log::debug!("Summarised {} analytics rows", report.rows.len());
    Ok(response::data(summary))
}

pub fn router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new().route("/", get(summary::<S>))
}
