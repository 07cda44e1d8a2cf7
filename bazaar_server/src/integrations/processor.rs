use bazaar_engine::traits::{
    PaymentHandle,
    PaymentProcessor,
    PaymentRequest,
    PayoutRequest,
    ProcessorError,
    SettlementOutcome,
};
use log::*;
use processor_tools::{NewPaymentIntent, NewTransfer, PaymentIntentStatus, ProcessorApi, ProcessorApiError};

/// Connects the settlement engine to the processor's REST API.
#[derive(Clone)]
pub struct ProcessorGateway {
    api: ProcessorApi,
}

impl ProcessorGateway {
    pub fn new(api: ProcessorApi) -> Self {
        Self { api }
    }
}

/// Reduces a processor payment status to the verdict the ledger acts on.
pub fn settlement_outcome(status: PaymentIntentStatus) -> SettlementOutcome {
    match status {
        PaymentIntentStatus::Succeeded => SettlementOutcome::Settled,
        PaymentIntentStatus::Canceled | PaymentIntentStatus::Failed => SettlementOutcome::Failed,
        _ => SettlementOutcome::Pending,
    }
}

fn to_processor_error(e: ProcessorApiError) -> ProcessorError {
    match e {
        ProcessorApiError::QueryError { status, message } if (400..500).contains(&status) => {
            ProcessorError::Rejected(format!("{status}: {message}"))
        },
        e => ProcessorError::Unavailable(e.to_string()),
    }
}

impl PaymentProcessor for ProcessorGateway {
    async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentHandle, ProcessorError> {
        let intent = NewPaymentIntent {
            amount: request.amount,
            currency: request.currency,
            metadata: request.metadata.into_iter().collect(),
        };
        let result = self.api.create_payment_intent(&intent).await.map_err(to_processor_error)?;
        let client_secret = result.client_secret.ok_or_else(|| {
            error!("💳 Payment intent {} for order {} came back without a client secret", result.id, request.order_id);
            ProcessorError::Rejected(format!("Payment intent {} has no client secret", result.id))
        })?;
        Ok(PaymentHandle { reference: result.id, client_secret })
    }

    async fn fetch_payment(&self, reference: &str) -> Result<SettlementOutcome, ProcessorError> {
        let intent = self.api.fetch_payment_intent(reference).await.map_err(to_processor_error)?;
        Ok(settlement_outcome(intent.effective_status()))
    }

    async fn cancel_payment(&self, reference: &str) -> Result<SettlementOutcome, ProcessorError> {
        let intent = self.api.cancel_payment_intent(reference).await.map_err(to_processor_error)?;
        Ok(settlement_outcome(intent.effective_status()))
    }

    async fn create_transfer(&self, request: PayoutRequest) -> Result<String, ProcessorError> {
        let transfer = NewTransfer {
            amount: request.amount,
            currency: request.currency,
            destination: request.destination,
            transfer_group: request.transfer_group,
        };
        let result =
            self.api.create_transfer(&transfer, &request.idempotency_key).await.map_err(to_processor_error)?;
        Ok(result.id)
    }
}
