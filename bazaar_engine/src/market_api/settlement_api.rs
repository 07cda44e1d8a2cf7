use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{Order, OrderStatusType, TransferStatus, VendorTransfer},
    events::{EventProducers, OrderCancelledEvent, OrderCompletedEvent},
    market_api::{dispatch_api::DispatchApi, order_objects::SettlementReport},
    traits::{
        ExpiryResult,
        MarketplaceDatabase,
        MarketplaceError,
        PaymentProcessor,
        PayoutRequest,
        SettlementApplied,
        SettlementOutcome,
        SettlementPolicy,
        TransferResult,
    },
};

/// The payment reconciler.
///
/// Client confirmations and processor webhooks both end up in [`Self::apply_outcome`], which hands the outcome to the
/// ledger in one atomic, idempotent step. Whatever arrives first wins; duplicates and late arrivals change nothing.
///
/// Once a settlement has been committed, vendor payouts are sent, the order is handed to dispatch, and subscribers are
/// notified. None of these follow-up steps can undo the settlement: a failed payout stays in the transfer ledger
/// for an administrator to retry, and an order with no courier waits for re-dispatch.
#[derive(Clone)]
pub struct SettlementApi<B, P> {
    db: B,
    processor: P,
    policy: SettlementPolicy,
    dispatcher: DispatchApi<B>,
    producers: EventProducers,
}

impl<B, P> Debug for SettlementApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B, P> SettlementApi<B, P> {
    pub fn new(
        db: B,
        processor: P,
        policy: SettlementPolicy,
        dispatcher: DispatchApi<B>,
        producers: EventProducers,
    ) -> Self {
        Self { db, processor, policy, dispatcher, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }
}

impl<B, P> SettlementApi<B, P>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    /// Handles a client's claim that it has paid. The claim itself is not trusted: the payment state is fetched from
    /// the processor and that answer is applied.
    pub async fn confirm_payment(&self, reference: &str) -> Result<SettlementReport, MarketplaceError> {
        let outcome = self
            .processor
            .fetch_payment(reference)
            .await
            .map_err(|e| MarketplaceError::ProcessorError(e.to_string()))?;
        info!("💳 Client confirmation for payment {reference}. Processor reports {outcome}");
        self.apply_outcome(reference, outcome, "payment failed").await
    }

    /// Handles a signed notification from the processor. The caller must have verified the signature.
    pub async fn handle_processor_notification(
        &self,
        reference: &str,
        outcome: SettlementOutcome,
    ) -> Result<SettlementReport, MarketplaceError> {
        info!("💳 Processor notification for payment {reference}: {outcome}");
        self.apply_outcome(reference, outcome, "payment failed").await
    }

    /// Applies a payment outcome to the ledger and runs the follow-up steps for whatever changed.
    ///
    /// `cancel_reason` is attached to the cancellation event if the outcome cancels the order.
    pub async fn apply_outcome(
        &self,
        reference: &str,
        outcome: SettlementOutcome,
        cancel_reason: &str,
    ) -> Result<SettlementReport, MarketplaceError> {
        let applied = self.db.apply_settlement(reference, outcome, &self.policy).await?;
        let report = SettlementReport::new(outcome, &applied);
        match applied {
            SettlementApplied::UnknownReference => {
                warn!("💳 No payment record exists for reference {reference}. Outcome {outcome} ignored.");
            },
            SettlementApplied::AlreadyApplied { order, payment } => {
                debug!(
                    "💳 Payment {reference} for order {} is already {}. Nothing to do.",
                    order.order_id, payment.state
                );
            },
            SettlementApplied::StillPending { order } => {
                debug!("💳 Payment {reference} for order {} has not settled yet", order.order_id);
            },
            SettlementApplied::Settled { order, transfers, status_changed } => {
                info!("💳 Payment {reference} settled. Order {} is {}", order.order_id, order.status);
                self.after_settlement(order, transfers, status_changed).await;
            },
            SettlementApplied::Cancelled { order, released_courier } => {
                info!("💳 Payment {reference} did not go through. Order {} cancelled ({cancel_reason})", order.order_id);
                if let Some(courier_id) = released_courier {
                    debug!("💳 Courier #{courier_id} released from order {}", order.order_id);
                }
                self.producers.publish_order_cancelled(OrderCancelledEvent::new(order, cancel_reason)).await;
            },
        }
        Ok(report)
    }

    async fn after_settlement(&self, order: Order, transfers: Vec<VendorTransfer>, status_changed: bool) {
        let transfers = self.pay_out(transfers).await;
        let failed = transfers.iter().filter(|t| t.status == TransferStatus::Failed).count();
        if failed > 0 {
            error!(
                "💳 {failed} of {} vendor payouts for order {} failed. They are held in the transfer ledger for retry.",
                transfers.len(),
                order.order_id
            );
        }
        let ready_to_ship = order.status == OrderStatusType::Completed;
        let order_id = order.order_id.clone();
        if status_changed {
            self.producers.publish_order_completed(OrderCompletedEvent::new(order, transfers)).await;
        }
        if ready_to_ship {
            if let Err(e) = self.dispatcher.dispatch_order(&order_id).await {
                error!("💳 Could not dispatch order {order_id} after settlement: {e}");
            }
        }
    }

    async fn pay_out(&self, transfers: Vec<VendorTransfer>) -> Vec<VendorTransfer> {
        let mut result = Vec::with_capacity(transfers.len());
        for transfer in transfers {
            if transfer.status == TransferStatus::Pending {
                result.push(self.send_transfer(transfer).await);
            } else {
                result.push(transfer);
            }
        }
        result
    }

    async fn send_transfer(&self, transfer: VendorTransfer) -> VendorTransfer {
        match self.try_send_transfer(&transfer).await {
            Ok(updated) => updated,
            Err(e) => {
                error!("💳 Could not record the payout result for transfer #{}: {e}", transfer.id);
                transfer
            },
        }
    }

    async fn try_send_transfer(&self, transfer: &VendorTransfer) -> Result<VendorTransfer, MarketplaceError> {
        let vendor = self.db.fetch_vendor(transfer.vendor_id).await?;
        let destination = match vendor {
            Some(v) if v.can_receive_payouts() => v.payout_account,
            _ => None,
        };
        let result = match destination {
            Some(destination) => {
                let request = PayoutRequest {
                    destination,
                    amount: transfer.amount,
                    currency: transfer.currency.clone(),
                    transfer_group: transfer.payment_reference.clone(),
                    idempotency_key: format!("{}:{}", transfer.payment_reference, transfer.vendor_id),
                };
                match self.processor.create_transfer(request).await {
                    Ok(id) => TransferResult::Sent(id),
                    Err(e) => TransferResult::Failed(e.to_string()),
                }
            },
            None => TransferResult::Failed("Vendor payout account is not connected".to_string()),
        };
        match &result {
            TransferResult::Sent(id) => info!(
                "💳 Paid {} {} to vendor #{} for order {} ({id})",
                transfer.amount, transfer.currency, transfer.vendor_id, transfer.order_id
            ),
            TransferResult::Failed(reason) => warn!(
                "💳 Payout of {} to vendor #{} for order {} failed: {reason}",
                transfer.amount, transfer.vendor_id, transfer.order_id
            ),
        }
        self.db.record_transfer_result(transfer.id, result).await
    }

    /// Sends a failed payout again. Transfers that were already sent are returned unchanged.
    pub async fn retry_transfer(&self, transfer_id: i64) -> Result<VendorTransfer, MarketplaceError> {
        let transfer =
            self.db.fetch_transfer(transfer_id).await?.ok_or(MarketplaceError::TransferNotFound(transfer_id))?;
        if transfer.status == TransferStatus::Sent {
            debug!("💳 Transfer #{transfer_id} was already sent. Retry skipped.");
            return Ok(transfer);
        }
        info!("💳 Retrying payout #{transfer_id} to vendor #{}", transfer.vendor_id);
        self.try_send_transfer(&transfer).await
    }

    pub async fn fetch_failed_transfers(&self) -> Result<Vec<VendorTransfer>, MarketplaceError> {
        self.db.fetch_failed_transfers().await
    }

    /// Asks the processor to cancel the order's payment and returns the resulting state, without touching the ledger.
    ///
    /// If the cancellation is refused (typically because the payment already went through), the processor is asked
    /// for the payment's actual state instead.
    pub async fn release_payment(&self, order: &Order) -> Result<SettlementOutcome, MarketplaceError> {
        let reference = order.payment_reference.as_str();
        match self.processor.cancel_payment(reference).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!("💳 Processor refused to cancel payment {reference}: {e}. Checking its state instead.");
                self.processor.fetch_payment(reference).await.map_err(|e| MarketplaceError::ProcessorError(e.to_string()))
            },
        }
    }

    /// Cancels an unpaid order: the payment is cancelled with the processor first, then the processor's answer is
    /// applied. If the payment turns out to have settled, the order completes instead.
    pub async fn cancel_unpaid_order(&self, order: &Order, reason: &str) -> Result<SettlementReport, MarketplaceError> {
        let outcome = self.release_payment(order).await?;
        if outcome == SettlementOutcome::Pending {
            return Err(MarketplaceError::ProcessorError(format!(
                "Payment {} could not be cancelled and has not settled",
                order.payment_reference
            )));
        }
        self.apply_outcome(&order.payment_reference, outcome, reason).await
    }

    /// Cancels every order older than `max_age` whose payment never arrived, releasing its stock and any courier it was
    /// dispatched to.
    pub async fn expire_stale_orders(&self, max_age: Duration) -> Result<ExpiryResult, MarketplaceError> {
        let cutoff = Utc::now() - max_age;
        let stale = self.db.fetch_stale_unpaid_orders(cutoff).await?;
        let mut result = ExpiryResult::default();
        for order in stale {
            match self.cancel_unpaid_order(&order, "expired").await {
                Ok(SettlementReport { outcome: SettlementOutcome::Failed, applied: true, order: Some(updated) }) => {
                    result.expired.push(updated)
                },
                Ok(SettlementReport { outcome: SettlementOutcome::Settled, applied: true, order: Some(updated) }) => {
                    result.settled.push(updated)
                },
                Ok(_) => result.skipped.push((order, "The order was not changed".to_string())),
                Err(e) => {
                    warn!("🕰️ Could not expire order {}: {e}", order.order_id);
                    result.skipped.push((order, e.to_string()))
                },
            }
        }
        Ok(result)
    }
}
