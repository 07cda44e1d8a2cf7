use bazaar_engine::{
    events::EventProducers,
    order_objects::DispatchPolicy,
    traits::{
        PaymentHandle,
        PaymentProcessor,
        PaymentRequest,
        PayoutRequest,
        ProcessorError,
        SettlementOutcome,
        SettlementPolicy,
    },
    CatalogApi,
    CheckoutApi,
    DispatchApi,
    OrderFlowApi,
    SettlementApi,
    SqliteDatabase,
};
use mockall::mock;

use crate::server::MarketApis;

mock! {
    pub Processor {}
    impl Clone for Processor {
        fn clone(&self) -> Self;
    }
    impl PaymentProcessor for Processor {
        async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentHandle, ProcessorError>;
        async fn fetch_payment(&self, reference: &str) -> Result<SettlementOutcome, ProcessorError>;
        async fn cancel_payment(&self, reference: &str) -> Result<SettlementOutcome, ProcessorError>;
        async fn create_transfer(&self, request: PayoutRequest) -> Result<String, ProcessorError>;
    }
}

/// One mock per API that talks to the processor, so that each test only sets up the calls it expects.
#[derive(Default)]
pub struct ProcessorMocks {
    pub checkout: MockProcessor,
    pub settlement: MockProcessor,
    pub orders: MockProcessor,
}

pub fn mocked_apis(db: SqliteDatabase, mocks: ProcessorMocks) -> MarketApis<SqliteDatabase, MockProcessor> {
    let policy = SettlementPolicy::default();
    let producers = EventProducers::default();
    let dispatch = DispatchApi::new(db.clone(), DispatchPolicy::default(), producers.clone());
    let settlement =
        SettlementApi::new(db.clone(), mocks.settlement, policy.clone(), dispatch.clone(), producers.clone());
    let flow_settlement =
        SettlementApi::new(db.clone(), mocks.orders, policy.clone(), dispatch.clone(), producers.clone());
    MarketApis {
        catalog: CatalogApi::new(db.clone()),
        checkout: CheckoutApi::new(db.clone(), mocks.checkout, policy),
        settlement,
        orders: OrderFlowApi::new(db, flow_settlement, dispatch, producers),
    }
}
