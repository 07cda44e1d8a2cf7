use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::traits::{
    PaymentHandle,
    PaymentProcessor,
    PaymentRequest,
    PayoutRequest,
    ProcessorError,
    SettlementOutcome,
};

#[derive(Debug, Default)]
struct FakeState {
    payments: HashMap<String, (PaymentRequest, SettlementOutcome)>,
    transfers: HashMap<String, (String, PayoutRequest)>,
    cancel_calls: usize,
    fail_payments: bool,
    fail_transfers: bool,
    counter: u64,
}

/// An in-memory payment processor.
///
/// Payments start out pending. Tests decide their fate with [`FakeProcessor::settle`] and [`FakeProcessor::fail`].
/// Transfers are deduplicated on their idempotency key, as a real processor would.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessor {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut state = self.state.lock().expect("FakeProcessor state lock poisoned");
        f(&mut state)
    }

    /// The processor will refuse to create payments until told otherwise.
    pub fn set_payments_failing(&self, failing: bool) {
        self.with_state(|s| s.fail_payments = failing);
    }

    /// Every payout will be rejected until told otherwise.
    pub fn set_transfers_failing(&self, failing: bool) {
        self.with_state(|s| s.fail_transfers = failing);
    }

    pub fn settle(&self, reference: &str) {
        self.set_outcome(reference, SettlementOutcome::Settled);
    }

    pub fn fail(&self, reference: &str) {
        self.set_outcome(reference, SettlementOutcome::Failed);
    }

    fn set_outcome(&self, reference: &str, outcome: SettlementOutcome) {
        self.with_state(|s| {
            if let Some(p) = s.payments.get_mut(reference) {
                p.1 = outcome;
            }
        });
    }

    pub fn payment_request(&self, reference: &str) -> Option<PaymentRequest> {
        self.with_state(|s| s.payments.get(reference).map(|p| p.0.clone()))
    }

    pub fn payment_count(&self) -> usize {
        self.with_state(|s| s.payments.len())
    }

    pub fn cancel_calls(&self) -> usize {
        self.with_state(|s| s.cancel_calls)
    }

    /// Every distinct payout that was made.
    pub fn transfers(&self) -> Vec<PayoutRequest> {
        self.with_state(|s| {
            let mut result = s.transfers.values().map(|t| t.1.clone()).collect::<Vec<_>>();
            result.sort_by(|a, b| a.idempotency_key.cmp(&b.idempotency_key));
            result
        })
    }
}

impl PaymentProcessor for FakeProcessor {
    async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentHandle, ProcessorError> {
        self.with_state(|s| {
            if s.fail_payments {
                return Err(ProcessorError::Unavailable("fake processor is down".to_string()));
            }
            s.counter += 1;
            let reference = format!("pi_fake_{:04}", s.counter);
            let client_secret = format!("{reference}_secret");
            s.payments.insert(reference.clone(), (request, SettlementOutcome::Pending));
            Ok(PaymentHandle { reference, client_secret })
        })
    }

    async fn fetch_payment(&self, reference: &str) -> Result<SettlementOutcome, ProcessorError> {
        self.with_state(|s| {
            s.payments
                .get(reference)
                .map(|p| p.1)
                .ok_or_else(|| ProcessorError::Rejected(format!("No such payment: {reference}")))
        })
    }

    async fn cancel_payment(&self, reference: &str) -> Result<SettlementOutcome, ProcessorError> {
        self.with_state(|s| {
            s.cancel_calls += 1;
            let payment = s
                .payments
                .get_mut(reference)
                .ok_or_else(|| ProcessorError::Rejected(format!("No such payment: {reference}")))?;
            if payment.1 == SettlementOutcome::Pending {
                payment.1 = SettlementOutcome::Failed;
            }
            Ok(payment.1)
        })
    }

    async fn create_transfer(&self, request: PayoutRequest) -> Result<String, ProcessorError> {
        self.with_state(|s| {
            if s.fail_transfers {
                return Err(ProcessorError::Rejected("payouts are disabled".to_string()));
            }
            if let Some((id, _)) = s.transfers.get(&request.idempotency_key) {
                return Ok(id.clone());
            }
            s.counter += 1;
            let id = format!("tr_fake_{:04}", s.counter);
            s.transfers.insert(request.idempotency_key.clone(), (id.clone(), request));
            Ok(id)
        })
    }
}
