//! Processor fee breakdown for one order

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::{non_negative, round_money};

/// Where the fee figure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSource {
    /// Read from the successful sale transaction
    Reconciled,
    /// No transaction available; fee assumed zero
    Fallback,
}

/// `gross`, `fee`, `net = gross - fee`, derived once per order
///
/// Fields are private so the invariant cannot be broken after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    gross: Decimal,
    fee: Decimal,
    net: Decimal,
    transaction_id: Option<String>,
    source: FeeSource,
}

impl FeeBreakdown {
    /// Build from a reconciled transaction. Fee is clamped to `[0, gross]`.
    pub fn new(gross: Decimal, fee: Decimal, transaction_id: Option<String>) -> Self {
        let gross = round_money(non_negative(gross));
        let fee = round_money(non_negative(fee)).min(gross);
        Self {
            gross,
            fee,
            net: gross - fee,
            transaction_id,
            source: FeeSource::Reconciled,
        }
    }

    /// Zero-fee estimate from the order total
    pub fn fallback(total_price: Decimal) -> Self {
        Self {
            source: FeeSource::Fallback,
            ..Self::new(total_price, Decimal::ZERO, None)
        }
    }

    pub fn gross(&self) -> Decimal {
        self.gross
    }

    pub fn fee(&self) -> Decimal {
        self.fee
    }

    pub fn net(&self) -> Decimal {
        self.net
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn source(&self) -> FeeSource {
        self.source
    }

    pub fn is_fallback(&self) -> bool {
        self.source == FeeSource::Fallback
    }
}
