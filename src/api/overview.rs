use axum::{extract::State, routing::get, Router};
use serde_json::Value;

use crate::api::extract::ValidJson;
use crate::api::response::{self, Reply};
use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::model::{to_document, Document, OverviewEntry, OverviewUpdate, OVERVIEW};
use crate::store::{Filter, Store};

pub async fn list_stats<S: Store + 'static>(
    State(state): State<AppState<S>>,
) -> ApiResult<Reply<Vec<Document>>> {
    let stats = state.store.find(OVERVIEW, &Filter::All).await?;
    Ok(response::list(stats))
}

/// Replaces the whole collection; entries are renumbered from 0 in request order.
pub async fn replace_stats<S: Store + 'static>(
    State(state): State<AppState<S>>,
    ValidJson(body): ValidJson<Value>,
) -> ApiResult<Reply<Vec<Document>>> {
    let invalid = || ApiError::bad_request("Invalid data format");
    let stats = serde_json::from_value::<OverviewUpdate>(body)
        .ok()
        .and_then(|update| update.stats)
        .ok_or_else(invalid)?;

    let entries = stats
        .into_iter()
        .enumerate()
        .map(|(id, stat)| {
            to_document(&OverviewEntry {
                id,
                label: stat.label,
                value: stat.value,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let removed = state.store.delete_many(OVERVIEW, &Filter::All).await?;
    let stored = if entries.is_empty() {
        Vec::new()
    } else {
        state.store.insert_many(OVERVIEW, entries).await?
    };
    log::info!(
        "Replaced {} overview entries with {}",
        removed,
        stored.len()
    );
    Ok(response::with_message(
        "Overview data updated successfully",
        stored,
    ))
}

pub fn router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new().route("/", get(list_stats::<S>).put(replace_stats::<S>))
}
