//! The order lifecycle core: validate, match, mutate state, persist, and
//! emit, all inside one unit of work.
//!
//! Domain rejections and infrastructure errors both roll the unit back; the
//! execution event is published inside the transactional scope so a failed
//! publish aborts the whole submission.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;

use super::errors::TradingError;
use super::events::ExecutionPublisher;
use super::matching::MatchingEngine;
use super::models::{
    AccountSnapshot, ExecutionEvent, ListedInstrumentBook, OrderRecord, OrderRequest, OrderSide,
    OrderStatus, PositionRecord,
};
use super::uow::{TradingUnitOfWork, UnitOfWorkFactory};

/// Tolerance for float cash comparisons.
const CASH_EPSILON: f64 = 1e-9;

pub struct OrderService {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
    matching_engine: MatchingEngine,
    executions: Arc<dyn ExecutionPublisher>,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    pub fn new(
        uow_factory: Arc<dyn UnitOfWorkFactory>,
        matching_engine: MatchingEngine,
        executions: Arc<dyn ExecutionPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            uow_factory,
            matching_engine,
            executions,
            clock,
        }
    }

    /// Submit an order against the given book snapshot. Commits on success,
    /// rolls back on any error; no partial persistence is observable.
    pub async fn submit(
        &self,
        request: &OrderRequest,
        book: &ListedInstrumentBook,
    ) -> Result<OrderRecord, TradingError> {
        let order_id = Uuid::new_v4().simple().to_string();
        let now = self.clock.now();

        info!(
            order_id = %order_id,
            user_id = %request.user_id,
            instrument_id = %request.instrument_id,
            side = request.side.as_str(),
            order_type = request.order_type.as_str(),
            quantity = request.quantity,
            "submitting order"
        );

        let mut uow = self.uow_factory.begin()?;
        let result = self
            .run_submission(uow.as_mut(), request, book, &order_id, now)
            .await;

        match result {
            Ok(record) => {
                uow.commit().await?;
                Ok(record)
            }
            Err(error) => {
                uow.rollback().await?;
                Err(error)
            }
        }
    }

    async fn run_submission(
        &self,
        uow: &mut dyn TradingUnitOfWork,
        request: &OrderRequest,
        book: &ListedInstrumentBook,
        order_id: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<OrderRecord, TradingError> {
        let account = uow
            .get_account(&request.user_id)
            .await?
            .ok_or_else(|| TradingError::Validation("account not found for user".into()))?;

        let existing_position = uow
            .get_position(&request.user_id, &request.instrument_id)
            .await?;

        if request.side == OrderSide::Sell {
            let held = existing_position.as_ref().map_or(0, |p| p.quantity);
            if held < request.quantity {
                return Err(TradingError::InsufficientPosition);
            }
        }

        let (fills, residual) = self.matching_engine.match_order(request, book);
        let filled_quantity: i64 = fills.iter().map(|fill| fill.quantity).sum();
        let total_consideration: f64 = fills
            .iter()
            .map(|fill| fill.price * fill.quantity as f64)
            .sum();

        if request.side == OrderSide::Buy
            && total_consideration > account.cash_balance + CASH_EPSILON
        {
            return Err(TradingError::InsufficientBalance);
        }

        let updated_account =
            apply_cash_mutation(&account, request.side, total_consideration, now);

        if filled_quantity > 0 {
            let updated_position = apply_position_mutation(
                request,
                existing_position.as_ref(),
                filled_quantity,
                total_consideration,
                now,
            )?;
            uow.upsert_position(&updated_position).await?;
        }

        uow.upsert_account(&updated_account).await?;

        let average_price =
            (filled_quantity > 0).then(|| total_consideration / filled_quantity as f64);
        let status = derive_status(filled_quantity, residual);
        let record = OrderRecord {
            order_id: order_id.to_string(),
            user_id: request.user_id.clone(),
            instrument_id: request.instrument_id.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            filled_quantity,
            limit_price: request.limit_price,
            average_price,
            status,
            time_in_force: request.time_in_force.clone(),
            created_at: now,
            updated_at: now,
        };
        uow.upsert_order(&record).await?;

        if filled_quantity > 0 {
            let event = ExecutionEvent {
                execution_id: format!("{order_id}-exec"),
                order_id: order_id.to_string(),
                user_id: request.user_id.clone(),
                instrument_id: request.instrument_id.clone(),
                side: request.side,
                quantity: filled_quantity,
                price: average_price.unwrap_or(0.0),
                timestamp: now,
            };
            self.executions.publish(&event).await?;
            info!(
                order_id = %order_id,
                filled_quantity,
                average_price = average_price.unwrap_or(0.0),
                status = status.as_str(),
                "order filled"
            );
        } else {
            info!(order_id = %order_id, status = status.as_str(), "order accepted with no fills");
        }

        Ok(record)
    }
}

fn apply_cash_mutation(
    account: &AccountSnapshot,
    side: OrderSide,
    total_consideration: f64,
    now: chrono::DateTime<chrono::Utc>,
) -> AccountSnapshot {
    let mut updated = account.clone();
    updated.updated_at = now;
    if total_consideration != 0.0 {
        let delta = match side {
            OrderSide::Buy => -total_consideration,
            OrderSide::Sell => total_consideration,
        };
        updated.cash_balance += delta;
    }
    updated
}

fn apply_position_mutation(
    request: &OrderRequest,
    existing: Option<&PositionRecord>,
    filled_quantity: i64,
    total_consideration: f64,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<PositionRecord, TradingError> {
    let (new_quantity, new_average_price) = match request.side {
        OrderSide::Buy => {
            let prior_quantity = existing.map_or(0, |p| p.quantity);
            let prior_cost = existing.map_or(0.0, |p| p.average_price * p.quantity as f64);
            let new_quantity = prior_quantity + filled_quantity;
            let new_average = (prior_cost + total_consideration) / new_quantity.max(1) as f64;
            (new_quantity, new_average)
        }
        OrderSide::Sell => {
            let existing = existing.ok_or(TradingError::InsufficientPosition)?;
            if filled_quantity > existing.quantity {
                return Err(TradingError::InsufficientPosition);
            }
            // Weighted-average cost is preserved on reduction, including to
            // flat.
            (existing.quantity - filled_quantity, existing.average_price)
        }
    };

    Ok(PositionRecord {
        user_id: request.user_id.clone(),
        instrument_id: request.instrument_id.clone(),
        quantity: new_quantity,
        average_price: new_average_price,
        updated_at: now,
    })
}

fn derive_status(filled_quantity: i64, residual: i64) -> OrderStatus {
    if filled_quantity == 0 {
        OrderStatus::New
    } else if residual == 0 {
        OrderStatus::Filled
    } else {
        OrderStatus::PartiallyFilled
    }
}
