//! Transfer lifecycle service: create, approve, mark reached, queries

use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::Deserialize;
use shared::{
    format_reference_no, NewTransfer, PaginatedResponse, Pagination, Transfer, TransferAggregate,
    TransferStatus,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::config::SequenceConfig;
use crate::error::{AppError, AppResult};
use crate::services::branch::BranchService;
use crate::services::events::EventSink;
use crate::services::sequence::SequenceAllocator;
use crate::services::transfer_store::{TransferRow, TransferStore, TRANSFER_COLUMNS};

/// Filter for listing transfers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferFilter {
    /// Matches either the sending or the receiving branch
    pub branch_id: Option<Uuid>,
    pub status: Option<TransferStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl TransferFilter {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
        .normalized()
    }
}

/// Transfer service for the request/approval side of the lifecycle
#[derive(Clone)]
pub struct TransferService {
    store: TransferStore,
    sequence: Arc<dyn SequenceAllocator>,
    order_type: String,
}

impl TransferService {
    pub fn new(
        db: PgPool,
        events: Arc<dyn EventSink>,
        sequence: Arc<dyn SequenceAllocator>,
        sequence_config: &SequenceConfig,
    ) -> Self {
        Self {
            store: TransferStore::new(db, events),
            sequence,
            order_type: sequence_config.order_type.clone(),
        }
    }

    /// Create a draft transfer with a freshly allocated reference number
    pub async fn create_transfer(&self, user_id: Uuid, input: NewTransfer) -> AppResult<TransferAggregate> {
        shared::validation::validate_new_transfer(&input)?;

        let branches = BranchService::new(self.store.db().clone());
        branches
            .ensure_branches_exist(&[input.from_branch_id, input.to_branch_id])
            .await?;
        let products: Vec<Uuid> = input.lines.iter().map(|l| l.product_id).collect();
        branches.ensure_products_exist(&products).await?;

        let now = Utc::now();
        let sequence = self.sequence.allocate(&self.order_type, now.year()).await?;
        let reference_no = format_reference_no(self.sequence.prefix(), now.year(), sequence);

        let mut aggregate = TransferAggregate::create(input, reference_no, now)?;
        self.store.insert(&mut aggregate, user_id).await?;

        tracing::info!(
            transfer_id = %aggregate.id(),
            reference_no = %aggregate.transfer.reference_no,
            from_branch_id = %aggregate.transfer.from_branch_id,
            to_branch_id = %aggregate.transfer.to_branch_id,
            lines = aggregate.lines.len(),
            "Transfer created"
        );
        Ok(aggregate)
    }

    /// `draft -> approved`
    pub async fn approve(&self, transfer_id: Uuid) -> AppResult<TransferAggregate> {
        let ((), aggregate) = self
            .store
            .mutate(transfer_id, |agg| agg.approve(Utc::now()))
            .await?;

        tracing::info!(%transfer_id, to_status = %aggregate.status(), "Transfer approved");
        Ok(aggregate)
    }

    /// `in_transit -> delivered_pending_confirm`
    pub async fn mark_reached(&self, transfer_id: Uuid) -> AppResult<TransferAggregate> {
        let ((), aggregate) = self
            .store
            .mutate(transfer_id, |agg| agg.mark_reached(Utc::now()))
            .await?;

        tracing::info!(%transfer_id, to_status = %aggregate.status(), "Transfer reached destination");
        Ok(aggregate)
    }

    /// Transfer with lines, shipments, receipts and discrepancies
    pub async fn get_transfer(&self, transfer_id: Uuid) -> AppResult<TransferAggregate> {
        self.store.get(transfer_id).await
    }

    /// Page of transfers, newest first
    pub async fn list_transfers(&self, filter: TransferFilter) -> AppResult<PaginatedResponse<Transfer>> {
        let pagination = filter.pagination();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transfers WHERE TRUE");
        push_filter(&mut count, &filter);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(self.store.db())
            .await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM transfers WHERE TRUE",
            TRANSFER_COLUMNS
        ));
        push_filter(&mut query, &filter);
        query
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let transfers = query
            .build_query_as::<TransferRow>()
            .fetch_all(self.store.db())
            .await?
            .into_iter()
            .map(Transfer::try_from)
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(PaginatedResponse::new(
            transfers,
            &pagination,
            u64::try_from(total).unwrap_or_default(),
        ))
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &TransferFilter) {
    if let Some(branch_id) = filter.branch_id {
        query
            .push(" AND (from_branch_id = ")
            .push_bind(branch_id)
            .push(" OR to_branch_id = ")
            .push_bind(branch_id)
            .push(")");
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
}
