use crate::config::NomisSettings;
use crate::domain::model::LookupResult;
use crate::domain::ports::StatisticsSource;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct ObservationResponse {
    #[serde(default)]
    obs: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    obs_value: Option<ObservationValue>,
}

#[derive(Debug, Deserialize)]
struct ObservationValue {
    value: Option<Value>,
}

/// Looks up one Census statistic per output area from the NOMIS API.
pub struct NomisClient {
    settings: NomisSettings,
    client: Client,
}

impl NomisClient {
    pub fn new(settings: NomisSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("nomis-backfill/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { settings, client })
    }

    fn data_url(&self) -> String {
        format!(
            "{}/dataset/{}.data.json",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.dataset
        )
    }

    async fn fetch(&self, area_code: &str) -> std::result::Result<LookupResult, reqwest::Error> {
        let url = self.data_url();
        tracing::debug!("NOMIS request: {} geography={}", url, area_code);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("geography", area_code),
                ("c2021_tenure_9", self.settings.tenure.as_str()),
                ("measures", self.settings.measure.as_str()),
                ("select", "geography_code,obs_value"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!(
                "NOMIS returned {} for {}, treating as no data",
                response.status(),
                area_code
            );
            return Ok(None);
        }

        let body: ObservationResponse = match response.json().await {
            Ok(body) => body,
            Err(e) if e.is_decode() => {
                tracing::debug!("Unreadable NOMIS response for {}: {}", area_code, e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        Ok(first_value(&body))
    }
}

fn first_value(body: &ObservationResponse) -> LookupResult {
    let value = body.obs.first()?.obs_value.as_ref()?.value.as_ref()?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

#[async_trait]
impl StatisticsSource for NomisClient {
    async fn lookup(&self, area_code: &str) -> LookupResult {
        if area_code.trim().is_empty() {
            return None;
        }

        match self.fetch(area_code).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("NOMIS fetch failed for {}: {}", area_code, e);
                None
            }
        }
    }
}
