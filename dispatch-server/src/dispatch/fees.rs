//! Processor fee reconciliation

use std::sync::Arc;

use shared::money::sum_money;
use shared::{FeeBreakdown, OrderEvent};

use crate::clients::{ClientError, CommercePlatform};

pub struct FeeReconciler {
    commerce: Arc<dyn CommercePlatform>,
}

impl FeeReconciler {
    pub fn new(commerce: Arc<dyn CommercePlatform>) -> Self {
        Self { commerce }
    }

    /// Fee breakdown from the first successful sale transaction
    ///
    /// No such transaction yields the zero-fee fallback.
    pub async fn reconcile(&self, event: &OrderEvent) -> Result<FeeBreakdown, ClientError> {
        let order_id = event.order_id();
        let transactions = self.commerce.order_transactions(order_id).await?;

        let Some(sale) = transactions.iter().find(|tx| tx.is_successful_sale()) else {
            tracing::warn!(
                order_id,
                transactions = transactions.len(),
                "No successful sale transaction, assuming zero fee"
            );
            return Ok(FeeBreakdown::fallback(event.total_price));
        };

        let fee = sum_money(sale.fees.iter().copied());
        Ok(FeeBreakdown::new(sale.amount, fee, Some(sale.id.clone())))
    }

    /// [`reconcile`](Self::reconcile), substituting the fallback when the lookup fails
    ///
    /// The fallback books the whole order total as net revenue; callers can
    /// tell it apart through [`FeeBreakdown::is_fallback`].
    pub async fn reconcile_or_fallback(&self, event: &OrderEvent) -> FeeBreakdown {
        match self.reconcile(event).await {
            Ok(fee) => fee,
            Err(e) => {
                tracing::warn!(
                    order_id = event.order_id(),
                    error = %e,
                    "Fee lookup failed, assuming zero fee"
                );
                FeeBreakdown::fallback(event.total_price)
            }
        }
    }
}
