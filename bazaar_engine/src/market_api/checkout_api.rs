use std::{collections::BTreeMap, fmt::Debug};

use log::*;

use crate::{
    db_types::{NewOrder, OrderId},
    helpers::platform_commission,
    market_api::order_objects::{CheckoutRequest, CheckoutResult},
    traits::{MarketplaceDatabase, MarketplaceError, PaymentProcessor, PaymentRequest, SettlementPolicy},
};

/// Turns a cart into a pending order with reserved stock and an open payment request.
pub struct CheckoutApi<B, P> {
    db: B,
    processor: P,
    policy: SettlementPolicy,
}

impl<B, P> Debug for CheckoutApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi ({} bps)", self.policy.commission_bps)
    }
}

impl<B, P> CheckoutApi<B, P> {
    pub fn new(db: B, processor: P, policy: SettlementPolicy) -> Self {
        Self { db, processor, policy }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, P> CheckoutApi<B, P>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    /// Checks out the owner's cart.
    ///
    /// 1. The cart is priced from a consistent snapshot of the catalog. Stock and vendor payout readiness are checked
    ///    here, before anything is written.
    /// 2. A payment for the total is requested from the processor. If that fails, nothing has been stored.
    /// 3. The order, its payment record and the stock reservation are committed in one transaction. Stock is only
    ///    taken if it is still there at that moment, so two shoppers racing for the last unit cannot both win. If the
    ///    commit fails, the payment request is cancelled again.
    ///
    /// Anonymous (session) owners must supply a delivery record.
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutResult, MarketplaceError> {
        let CheckoutRequest { owner, delivery } = request;
        match &delivery {
            Some(record) => record.validate().map_err(MarketplaceError::ValidationError)?,
            None if owner.is_anonymous() => {
                return Err(MarketplaceError::ValidationError(
                    "A delivery record is required to check out without an account".to_string(),
                ));
            },
            None => {},
        }
        let quote = self.db.quote_cart(&owner).await?;
        let vendors = quote.vendor_ids();
        debug!("🛒 Cart for {owner} priced at {} across {} vendor(s)", quote.total, vendors.len());
        let order_id = OrderId::random();
        let commission = platform_commission(quote.total, self.policy.commission_bps);
        let mut metadata = BTreeMap::new();
        metadata.insert("order_id".to_string(), order_id.to_string());
        metadata.insert("owner_key".to_string(), owner.to_string());
        metadata.insert(
            "vendor_ids".to_string(),
            vendors.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","),
        );
        metadata.insert("commission_bps".to_string(), self.policy.commission_bps.to_string());
        let request = PaymentRequest {
            order_id: order_id.clone(),
            amount: quote.total,
            currency: self.policy.currency.clone(),
            metadata,
        };
        let handle = self.processor.create_payment(request).await.map_err(|e| {
            warn!("🛒 Payment request for {owner} failed. Nothing was reserved. {e}");
            MarketplaceError::ProcessorError(e.to_string())
        })?;
        let new_order = NewOrder {
            order_id: order_id.clone(),
            owner_key: owner.clone(),
            items: quote.items,
            total: quote.total,
            currency: self.policy.currency.clone(),
            delivery,
            payment_reference: handle.reference.clone(),
        };
        let order = match self.db.commit_checkout(new_order).await {
            Ok(order) => order,
            Err(e) => {
                warn!("🛒 Could not commit order {order_id} for {owner}: {e}. Cancelling payment {}", handle.reference);
                if let Err(cancel_err) = self.processor.cancel_payment(&handle.reference).await {
                    error!(
                        "🛒 Payment {} for abandoned order {order_id} could not be cancelled: {cancel_err}. It needs \
                         manual attention.",
                        handle.reference
                    );
                }
                return Err(e);
            },
        };
        info!(
            "🛒 Order {} placed by {owner} for {} {}. Awaiting payment {}",
            order.order_id, order.total, order.currency, order.payment_reference
        );
        Ok(CheckoutResult {
            order_id: order.order_id,
            payment_reference: order.payment_reference,
            client_secret: handle.client_secret,
            total: order.total,
            commission,
            currency: order.currency,
        })
    }
}
