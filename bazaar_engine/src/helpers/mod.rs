mod dispatch_ranking;
mod splits;

pub use dispatch_ranking::rank_dispatch_candidates;
pub use splits::{order_total, platform_commission, vendor_splits, VendorSplit};
