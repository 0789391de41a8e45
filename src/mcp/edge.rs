//! P2P rules evaluated by hosted edge functions

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::engine::{
    Anomaly, AnomalyInput, BatchInput, MatchInput, MatchOutcome, P2pEngine, PaymentPlan,
};

const MATCH_FUNCTION: &str = "p2p-match-invoice";
const ANOMALY_FUNCTION: &str = "p2p-detect-anomalies";
const BATCH_FUNCTION: &str = "p2p-payment-batch";

/// Engine posting each rule evaluation to `{base_url}/{function}`
#[derive(Debug, Clone)]
pub struct EdgeFunctionEngine {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl EdgeFunctionEngine {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn invoke<I: Serialize + ?Sized, O: DeserializeOwned>(
        &self,
        function: &str,
        input: &I,
    ) -> Result<O> {
        let url = format!("{}/{}", self.base_url, function);
        let mut request = self.client.post(&url).json(input);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("edge function {} unreachable", function))?
            .error_for_status()
            .with_context(|| format!("edge function {} failed", function))?;

        response
            .json::<O>()
            .await
            .with_context(|| format!("edge function {} returned an invalid body", function))
    }
}

#[async_trait]
impl P2pEngine for EdgeFunctionEngine {
    async fn match_invoice(&self, input: &MatchInput) -> Result<MatchOutcome> {
        self.invoke(MATCH_FUNCTION, input).await
    }

    async fn detect_anomalies(&self, input: &AnomalyInput) -> Result<Vec<Anomaly>> {
        self.invoke(ANOMALY_FUNCTION, input).await
    }

    async fn plan_payment_batch(&self, input: &BatchInput) -> Result<PaymentPlan> {
        self.invoke(BATCH_FUNCTION, input).await
    }

    fn name(&self) -> &'static str {
        "edge"
    }
}
