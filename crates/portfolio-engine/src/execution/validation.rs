//! Order Validation

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::TradeProposal;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    EmptySymbol,
    NonPositiveQuantity,
    MissingPrice,
    NonPositivePrice,
    NotTradable,
}

/// Why a single trade failed validation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRejection {
    pub code: RejectionCode,
    pub message: String,
}

impl TradeRejection {
    fn new(code: RejectionCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TradeRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

pub fn validate_trade(
    trade: &TradeProposal,
    universe: Option<&BTreeSet<String>>,
) -> std::result::Result<(), TradeRejection> {
    if trade.symbol.trim().is_empty() {
        return Err(TradeRejection::new(RejectionCode::EmptySymbol, "trade symbol is empty"));
    }

    if trade.quantity <= Decimal::ZERO {
        return Err(TradeRejection::new(
            RejectionCode::NonPositiveQuantity,
            format!("quantity must be positive, got {}", trade.quantity),
        ));
    }

    if trade.order_type.requires_price() {
        match trade.limit_price {
            None => {
                return Err(TradeRejection::new(
                    RejectionCode::MissingPrice,
                    format!("{:?} order for {} needs a price", trade.order_type, trade.symbol),
                ));
            }
            Some(price) if price <= Decimal::ZERO => {
                return Err(TradeRejection::new(
                    RejectionCode::NonPositivePrice,
                    format!("price must be positive, got {price}"),
                ));
            }
            Some(_) => {}
        }
    }

    if let Some(universe) = universe {
        if !universe.contains(&trade.symbol.trim().to_uppercase()) {
            return Err(TradeRejection::new(
                RejectionCode::NotTradable,
                format!("{} is not in the tradable universe", trade.symbol),
            ));
        }
    }

    Ok(())
}
