//! Provider backed by an external inference endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::AdvisoryProvider;
use crate::error::PredictError;
use crate::models::{Decision, Prediction, PredictionInput};

// ---

/// Delegates to `POST {base_url}/predict?model={id}`.
///
/// Any non-2xx answer is an error; there is no fallback prediction.
#[derive(Debug, Clone)]
pub struct RemoteModelProvider {
    id: String,
    name: String,
    description: String,
    base_url: String,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

/// Response body; any `modelId` the server sends is ignored.
#[derive(Debug, Deserialize)]
struct RemoteVerdict {
    irrigation: Decision,
    #[serde(default)]
    fertilization: Option<Decision>,
    #[serde(default)]
    energy: Option<Decision>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    rationale: Option<String>,
}

impl RemoteModelProvider {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        base_url: &str,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: None,
            client: reqwest::Client::new(),
        }
    }

    /// The logistic-regression model served by the analyzer backend.
    pub fn logistic_regression(base_url: &str) -> Self {
        Self::new(
            "logreg",
            "Ai Suggestion",
            "Logistic regression model trained with dataset",
            base_url,
        )
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/predict", self.base_url)
    }
}

#[async_trait]
impl AdvisoryProvider for RemoteModelProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn predict(&self, input: &PredictionInput) -> Result<Prediction, PredictError> {
        // ---
        let mut request = self
            .client
            .post(self.endpoint())
            .query(&[("model", self.id.as_str())])
            .json(input);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        debug!(provider = %self.id, ts = input.current.ts, "requesting remote prediction");
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(provider = %self.id, %status, "inference endpoint refused prediction");
            return Err(PredictError::Status {
                provider: self.id.clone(),
                status,
            });
        }

        let verdict: RemoteVerdict = response
            .json()
            .await
            .map_err(|e| PredictError::Decode(e.to_string()))?;

        Ok(Prediction {
            model_id: self.id.clone(),
            irrigation: verdict.irrigation,
            fertilization: verdict.fertilization,
            energy: verdict.energy,
            confidence: verdict.confidence,
            rationale: verdict.rationale,
        })
    }
}
