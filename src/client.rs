//! HTTP client for the dashboard backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Config;
use crate::error::FetchError;
use crate::rolls::protocol::{RollReport, RollTransitionResponse};
use crate::status::{StatusPayload, StatusResource};

/// Transport seam for the roll workflow, so the controller can be tested
/// against a scripted fake.
#[async_trait]
pub trait RollApi: Send + Sync {
    /// `POST /rolls` with form fields `instrument`, `state`, `confirmed`.
    async fn submit_transition(
        &self,
        instrument: &str,
        state: &str,
        confirmed: bool,
    ) -> Result<RollTransitionResponse, FetchError>;

    /// Full re-fetch of the rolls resource, used after a terminal
    /// transition invalidates every row.
    async fn fetch_rolls(&self) -> Result<RollReport, FetchError>;
}

#[derive(Clone)]
pub struct DashboardClient {
    client: Client,
    base_url: String,
}

impl DashboardClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = self.url(path);
        debug!(%url, "fetching status resource");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Http { status, url, body });
        }

        let body = resp.text().await.map_err(FetchError::from_reqwest)?;
        serde_json::from_str(&body).map_err(|e| FetchError::Parse(format!("{path}: {e}")))
    }

    /// Fetch one status resource as its typed payload.
    pub async fn fetch(&self, resource: StatusResource) -> Result<StatusPayload, FetchError> {
        let path = resource.path();
        let payload = match resource {
            StatusResource::Processes => StatusPayload::Processes(self.get_json(path).await?),
            StatusResource::Reconcile => StatusPayload::Reconcile(self.get_json(path).await?),
            StatusResource::Capital => StatusPayload::Capital(self.get_json(path).await?),
            StatusResource::Rolls => StatusPayload::Rolls(self.get_json(path).await?),
            StatusResource::Costs => StatusPayload::Costs(self.get_json(path).await?),
            StatusResource::Risk => StatusPayload::Risk(self.get_json(path).await?),
            StatusResource::Pandl => StatusPayload::Pandl(self.get_json(path).await?),
            StatusResource::Trades => StatusPayload::Trades(self.get_json(path).await?),
            StatusResource::Liquidity => StatusPayload::Liquidity(self.get_json(path).await?),
            StatusResource::Forex => StatusPayload::Forex(self.get_json(path).await?),
            StatusResource::Strategy => StatusPayload::Strategy(self.get_json(path).await?),
            StatusResource::TrafficLights => {
                StatusPayload::TrafficLights(self.get_json(path).await?)
            }
        };
        Ok(payload)
    }
}

#[async_trait]
impl RollApi for DashboardClient {
    async fn submit_transition(
        &self,
        instrument: &str,
        state: &str,
        confirmed: bool,
    ) -> Result<RollTransitionResponse, FetchError> {
        let url = self.url("/rolls");
        debug!(%instrument, %state, confirmed, "submitting roll transition");

        let form = [
            ("instrument", instrument),
            ("state", state),
            ("confirmed", if confirmed { "true" } else { "false" }),
        ];

        let resp = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = resp.status();
        if status == reqwest::StatusCode::CONFLICT {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Conflict(format!(
                "{instrument} -> {state}: {body}"
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Http { status, url, body });
        }

        let body = resp.text().await.map_err(FetchError::from_reqwest)?;
        let result: RollTransitionResponse = serde_json::from_str(&body)
            .map_err(|e| FetchError::Parse(format!("roll transition: {e}")))?;

        if let RollTransitionResponse::Preview { prices } = &result {
            prices.check_schema()?;
        }
        Ok(result)
    }

    async fn fetch_rolls(&self) -> Result<RollReport, FetchError> {
        self.get_json(StatusResource::Rolls.path()).await
    }
}
