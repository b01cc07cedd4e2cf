use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assets::{display_amount, AssetInfo};
use crate::db::wager_repo;
use crate::errors::AppError;
use crate::models::{Phase, Wager};
use crate::services::identity::short_address;
use crate::status::derive_phase;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;
/// Rows fetched per scan step when a phase filter is active; the phase is
/// derived per row, so filtering has to happen before the limit is taken.
const SCAN_CHUNK: i64 = 500;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct PartyView {
    pub address: String,
    pub display_name: Option<String>,
}

#[derive(Serialize)]
pub struct AssetView {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
    pub yield_pool: Option<String>,
}

/// Read-model view of a wager: raw base-unit stakes travel as decimal
/// strings alongside their display-scale rendering, and the phase is derived
/// against the request clock rather than stored.
#[derive(Serialize)]
pub struct WagerView {
    pub address: String,
    pub schema_version: String,
    pub description: String,
    pub phase: Phase,
    pub maker: PartyView,
    pub taker: PartyView,
    pub judge: PartyView,
    pub asset: AssetView,
    pub maker_stake: String,
    pub maker_stake_display: String,
    pub taker_stake: String,
    pub taker_stake_display: String,
    pub accept_by: DateTime<Utc>,
    pub outcome_by: DateTime<Utc>,
    pub judge_deadline: Option<DateTime<Utc>>,
    pub winner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub phase: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<WagerView>>>, AppError> {
    let phase_filter = match params.phase.as_deref() {
        Some(raw) => Some(
            Phase::from_query_str(raw)
                .ok_or_else(|| AppError::BadRequest(format!("unknown phase: {raw}")))?,
        ),
        None => None,
    };
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let now = Utc::now();
    let mut views = Vec::new();
    let mut offset = 0;
    'scan: loop {
        let wagers = wager_repo::list_wagers(&state.db, SCAN_CHUNK, offset).await?;
        let exhausted = (wagers.len() as i64) < SCAN_CHUNK;
        offset += wagers.len() as i64;

        for wager in &wagers {
            let phase = derive_phase(wager, now);
            if phase_filter.is_some_and(|f| f != phase) {
                continue;
            }
            // Identity lookups only on the detail endpoint; lists stay one
            // round-trip per chunk regardless of length.
            views.push(build_view(&state, wager, phase, false).await);
            if views.len() as i64 >= limit {
                break 'scan;
            }
        }

        if exhausted {
            break;
        }
    }

    Ok(Json(ApiResponse {
        success: true,
        data: Some(views),
        error: None,
    }))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<WagerView>>, AppError> {
    let wager = wager_repo::get_wager(&state.db, &address)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("wager {}", short_address(&address))))?;

    let phase = derive_phase(&wager, Utc::now());
    let view = build_view(&state, &wager, phase, true).await;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(view),
        error: None,
    }))
}

async fn build_view(state: &AppState, wager: &Wager, phase: Phase, enrich: bool) -> WagerView {
    let asset = state.registry.resolve(&wager.asset);

    WagerView {
        address: wager.address.clone(),
        schema_version: wager
            .version()
            .map(|v| v.to_string())
            .unwrap_or_else(|| wager.schema_version.to_string()),
        description: wager.description.clone(),
        phase,
        maker: party_view(state, &wager.maker, enrich).await,
        taker: party_view(state, &wager.taker, enrich).await,
        judge: party_view(state, &wager.judge, enrich).await,
        maker_stake: wager.maker_stake.clone(),
        maker_stake_display: display_amount(&wager.maker_stake, asset.decimals),
        taker_stake: wager.taker_stake.clone(),
        taker_stake_display: display_amount(&wager.taker_stake, asset.decimals),
        asset: asset_view(asset),
        accept_by: wager.accept_by,
        outcome_by: wager.outcome_by,
        judge_deadline: wager.judge_deadline,
        winner: wager.winner.clone(),
        created_at: wager.created_at,
        accepted_at: wager.accepted_at,
        resolved_at: wager.resolved_at,
        cancelled_at: wager.cancelled_at,
    }
}

async fn party_view(state: &AppState, address: &str, enrich: bool) -> PartyView {
    let display_name = if enrich {
        match &state.identity {
            Some(client) => client.resolve(address).await.map(|i| i.display_name),
            None => None,
        }
    } else {
        None
    };

    PartyView {
        address: address.to_string(),
        display_name,
    }
}

fn asset_view(info: AssetInfo) -> AssetView {
    AssetView {
        address: info.address,
        symbol: info.symbol,
        decimals: info.decimals,
        yield_pool: info.yield_pool,
    }
}
