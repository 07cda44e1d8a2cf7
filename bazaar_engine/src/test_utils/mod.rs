//! Helpers for the engine's own tests and for downstream crates that need a throwaway marketplace.
pub mod fake_processor;
pub mod prepare_env;
pub mod seed;

pub use fake_processor::FakeProcessor;
pub use prepare_env::{prepare_test_env, random_db_path};
pub use seed::TestMarket;
