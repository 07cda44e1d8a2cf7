use crate::{
    db_types::{Courier, CourierAvailability, NewCourier},
    traits::MarketplaceError,
};

#[allow(async_fn_in_trait)]
pub trait CourierManagement {
    async fn create_courier(&self, courier: NewCourier) -> Result<Courier, MarketplaceError>;

    async fn fetch_courier(&self, courier_id: i64) -> Result<Option<Courier>, MarketplaceError>;

    /// Couriers may only toggle between `online` and `offline`. A busy courier is released by the delivery flow,
    /// not by this call.
    async fn set_courier_availability(
        &self,
        courier_id: i64,
        availability: CourierAvailability,
    ) -> Result<Courier, MarketplaceError>;
}
