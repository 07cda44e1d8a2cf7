use bazaar_engine::{
    db_types::Order,
    traits::{MarketplaceDatabase, PaymentProcessor},
    SettlementApi,
};
use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;

const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Starts the unpaid order expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every minute, unpaid orders older than `unpaid_expiry` (pending, or assigned before payment) have their payment
/// cancelled with the processor and, once the processor confirms, are cancelled and restocked. Orders whose payment
/// turns out to have settled are completed instead.
pub fn start_expiry_worker<B, P>(api: SettlementApi<B, P>, unpaid_expiry: Duration) -> JoinHandle<()>
where
    B: MarketplaceDatabase + 'static,
    P: PaymentProcessor + 'static,
{
    actix_web::rt::spawn(async move {
        let mut timer = tokio::time::interval(SWEEP_INTERVAL);
        info!("🕰️ Unpaid order expiry worker started. Orders expire after {} minutes", unpaid_expiry.num_minutes());
        loop {
            timer.tick().await;
            debug!("🕰️ Running unpaid order expiry job");
            match api.expire_stale_orders(unpaid_expiry).await {
                Ok(result) if result.total_count() == 0 => trace!("🕰️ No stale orders"),
                Ok(result) => {
                    info!(
                        "🕰️ {} stale orders processed: {} expired, {} settled late, {} skipped",
                        result.total_count(),
                        result.expired.len(),
                        result.settled.len(),
                        result.skipped.len()
                    );
                    debug!("🕰️ Expired orders: {}", order_list(&result.expired));
                    debug!("🕰️ Late settlements: {}", order_list(&result.settled));
                    for (order, reason) in &result.skipped {
                        warn!("🕰️ Order {} could not be expired: {reason}", order.order_id);
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running unpaid order expiry job: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] order_id: {} owner: {}", o.id, o.order_id, o.owner_key))
        .collect::<Vec<String>>()
        .join(", ")
}
