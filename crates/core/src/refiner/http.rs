//! HTTP refiner.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};

use crate::config::HttpRefinerConfig;

use super::{PlanRequest, Refinement, RefinementError, RefinementRequest, Refiner, ResearchPlan};

/// Refiner backed by an external JSON service.
///
/// `POST {url}/refine` takes a `RefinementRequest` and answers with a
/// `Refinement`; `POST {url}/plan` takes a `PlanRequest` and answers with a
/// `ResearchPlan`.
pub struct HttpRefiner {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpRefiner {
    pub fn new(config: &HttpRefinerConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs as u64);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            timeout,
        }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RefinementError> {
        let mut builder = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                RefinementError::Timeout(self.timeout)
            } else {
                RefinementError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RefinementError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| RefinementError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Refiner for HttpRefiner {
    fn name(&self) -> &str {
        "http"
    }

    async fn refine(&self, request: &RefinementRequest) -> Result<Refinement, RefinementError> {
        let refinement: Refinement = self.post("refine", request).await?;
        Ok(refinement.normalized())
    }

    async fn plan(&self, request: &PlanRequest) -> Result<ResearchPlan, RefinementError> {
        self.post("plan", request).await
    }
}
