//! Branch and product reference data

use std::collections::HashSet;

use shared::{Branch, Product, TransferError, WeightUnit};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct BranchService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    weight_unit: String,
}

impl BranchService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_branches(&self) -> AppResult<Vec<Branch>> {
        let rows = sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM branches ORDER BY name")
            .fetch_all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| Branch { id, name })
            .collect())
    }

    pub async fn get_product(&self, product_id: Uuid) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, weight_unit FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(TransferError::NotFound {
            entity: "product",
            id: product_id,
        })?;

        Ok(Product {
            id: row.id,
            name: row.name,
            weight_unit: row
                .weight_unit
                .parse::<WeightUnit>()
                .map_err(AppError::Internal)?,
        })
    }

    pub async fn ensure_branches_exist(&self, ids: &[Uuid]) -> AppResult<()> {
        let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM branches WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.db)
            .await?;
        first_missing("branch", ids, &found)
    }

    pub async fn ensure_products_exist(&self, ids: &[Uuid]) -> AppResult<()> {
        let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM products WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.db)
            .await?;
        first_missing("product", ids, &found)
    }
}

fn first_missing(entity: &'static str, wanted: &[Uuid], found: &[Uuid]) -> AppResult<()> {
    let found: HashSet<&Uuid> = found.iter().collect();
    match wanted.iter().find(|id| !found.contains(id)) {
        Some(id) => Err(TransferError::NotFound { entity, id: *id }.into()),
        None => Ok(()),
    }
}
