//! Stateless matching against a published book snapshot.
//!
//! No resting book exists here: an incoming order crosses the last snapshot
//! in its stored level order (asks ascending for buys, bids descending for
//! sells), which encodes price priority; equal-priced levels keep the
//! snapshot's original order.

use super::models::{ListedInstrumentBook, OrderRequest, OrderSide, OrderType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub price: f64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchingEngine;

impl MatchingEngine {
    /// Cross the order against the snapshot. Returns the fills in execution
    /// order and the unfilled residual quantity.
    pub fn match_order(
        &self,
        order: &OrderRequest,
        book: &ListedInstrumentBook,
    ) -> (Vec<Fill>, i64) {
        let levels = match order.side {
            OrderSide::Buy => &book.asks,
            OrderSide::Sell => &book.bids,
        };

        let price_accepts = |price: f64| -> bool {
            match order.order_type {
                OrderType::Market => true,
                OrderType::Limit => match (order.side, order.limit_price) {
                    (OrderSide::Buy, Some(limit)) => price <= limit,
                    (OrderSide::Sell, Some(limit)) => price >= limit,
                    (_, None) => false,
                },
            }
        };

        let mut remaining = order.quantity;
        let mut fills = Vec::new();
        for (price, available) in levels {
            if remaining <= 0 {
                break;
            }
            if !price_accepts(*price) {
                continue;
            }
            let fill_quantity = (*available).min(remaining);
            fills.push(Fill {
                price: *price,
                quantity: fill_quantity,
            });
            remaining -= fill_quantity;
        }

        (fills, remaining)
    }
}
