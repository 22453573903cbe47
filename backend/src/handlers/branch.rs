//! HTTP handlers for branch reference data and on-hand stock

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use shared::{Branch, Product, StockLevel};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::BranchService;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct BranchStockResponse {
    pub branch_id: Uuid,
    pub product: Product,
    #[serde(flatten)]
    pub level: StockLevel,
}

/// List all branches
pub async fn list_branches(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Branch>>> {
    let branches = BranchService::new(state.db).list_branches().await?;
    Ok(Json(branches))
}

/// On-hand stock of one product at a branch
pub async fn get_branch_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((branch_id, product_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<BranchStockResponse>> {
    let branches = BranchService::new(state.db.clone());
    branches.ensure_branches_exist(&[branch_id]).await?;
    let product = branches.get_product(product_id).await?;
    let level = state.stock.on_hand(branch_id, product_id).await?;

    Ok(Json(BranchStockResponse {
        branch_id,
        product,
        level,
    }))
}
