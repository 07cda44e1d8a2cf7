use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::de::DeserializeOwned;

use crate::{
    config::ProcessorConfig,
    data_objects::{NewPaymentIntent, NewTransfer, PaymentIntent, Transfer},
    ProcessorApiError,
};

#[derive(Clone)]
pub struct ProcessorApi {
    config: ProcessorConfig,
    client: Arc<Client>,
}

impl ProcessorApi {
    pub fn new(config: ProcessorConfig) -> Result<Self, ProcessorApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let bearer = format!("Bearer {}", config.api_key.reveal());
        let val = HeaderValue::from_str(bearer.as_str()).map_err(|e| ProcessorApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProcessorApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    /// Sends a form-encoded request to the processor and deserializes the JSON response.
    ///
    /// `idempotency_key`, when given, lets the processor collapse retried requests into a single operation.
    pub async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, ProcessorApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if !form.is_empty() {
            req = req.form(form);
        }
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        let response = req.send().await.map_err(|e| ProcessorApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| ProcessorApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message =
                response.text().await.map_err(|e| ProcessorApiError::RestResponseError(e.to_string()))?;
            Err(ProcessorApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    pub async fn create_payment_intent(&self, intent: &NewPaymentIntent) -> Result<PaymentIntent, ProcessorApiError> {
        debug!("Creating payment intent for {} {}", intent.amount, intent.currency);
        let idempotency_key = intent.metadata.get("order_id").map(|id| format!("create:{id}"));
        let result = self
            .rest_query::<PaymentIntent>(Method::POST, "/payment_intents", &intent.as_form(), idempotency_key.as_deref())
            .await?;
        info!("Created payment intent {} for {} {}", result.id, result.amount, result.currency);
        Ok(result)
    }

    pub async fn fetch_payment_intent(&self, id: &str) -> Result<PaymentIntent, ProcessorApiError> {
        let path = format!("/payment_intents/{id}");
        debug!("Fetching payment intent {id}");
        let result = self.rest_query::<PaymentIntent>(Method::GET, &path, &[], None).await?;
        debug!("Payment intent {id} has status {}", result.status);
        Ok(result)
    }

    pub async fn cancel_payment_intent(&self, id: &str) -> Result<PaymentIntent, ProcessorApiError> {
        let path = format!("/payment_intents/{id}/cancel");
        debug!("Cancelling payment intent {id}");
        let result = self.rest_query::<PaymentIntent>(Method::POST, &path, &[], None).await?;
        info!("Cancelled payment intent {id}. Status is now {}", result.status);
        Ok(result)
    }

    /// Moves funds to a connected account. `idempotency_key` must be stable per (order, vendor) pair so that a
    /// retried payout is never sent twice.
    pub async fn create_transfer(
        &self,
        transfer: &NewTransfer,
        idempotency_key: &str,
    ) -> Result<Transfer, ProcessorApiError> {
        debug!("Transferring {} {} to {}", transfer.amount, transfer.currency, transfer.destination);
        let result = self
            .rest_query::<Transfer>(Method::POST, "/transfers", &transfer.as_form(), Some(idempotency_key))
            .await?;
        info!("Transfer {} of {} sent to {}", result.id, result.amount, result.destination);
        Ok(result)
    }
}
