pub mod catalog_api;
pub mod checkout_api;
pub mod dispatch_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod order_state;
pub mod settlement_api;
