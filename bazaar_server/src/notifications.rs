//! Event hooks wired up by the server.
//!
//! The notification store (emails, push messages, the customer's notification list) lives outside this service. For
//! now these hooks just leave a trail in the logs that a notification relay can follow.
use bazaar_engine::events::{
    CourierAssignedEvent,
    EventHooks,
    OrderCancelledEvent,
    OrderCompletedEvent,
    OrderStatusChangedEvent,
};
use log::*;

pub fn notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_completed(|ev| Box::pin(async move { order_completed(ev) }))
        .on_order_cancelled(|ev| Box::pin(async move { order_cancelled(ev) }))
        .on_status_changed(|ev| Box::pin(async move { status_changed(ev) }))
        .on_courier_assigned(|ev| Box::pin(async move { courier_assigned(ev) }));
    hooks
}

fn order_completed(ev: OrderCompletedEvent) {
    info!(
        "📬️ Notify {}: payment received for order {} ({} {})",
        ev.order.owner_key, ev.order.order_id, ev.order.total, ev.order.currency
    );
    for transfer in &ev.transfers {
        info!(
            "📬️ Notify vendor #{}: {} {} is on its way for order {}",
            transfer.vendor_id, transfer.amount, transfer.currency, transfer.order_id
        );
    }
}

fn order_cancelled(ev: OrderCancelledEvent) {
    info!("📬️ Notify {}: order {} was cancelled ({})", ev.order.owner_key, ev.order.order_id, ev.reason);
}

fn status_changed(ev: OrderStatusChangedEvent) {
    info!(
        "📬️ Notify {}: order {} moved from {} to {}",
        ev.order.owner_key, ev.order.order_id, ev.old_status, ev.order.status
    );
}

fn courier_assigned(ev: CourierAssignedEvent) {
    let eta = ev.order.estimated_delivery_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "unknown".to_string());
    info!("📬️ Notify courier #{}: pick up order {}", ev.courier.id, ev.order.order_id);
    info!("📬️ Notify {}: {} is delivering order {}. ETA {eta}", ev.order.owner_key, ev.courier.name, ev.order.order_id);
}
