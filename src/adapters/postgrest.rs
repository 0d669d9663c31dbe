use crate::config::StoreSettings;
use crate::domain::model::{CandidateRow, RowId};
use crate::domain::ports::RowStore;
use crate::utils::error::{BackfillError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE, RANGE};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Map, Value};

/// Row store backed by a PostgREST endpoint (Supabase `/rest/v1`).
pub struct PostgrestStore {
    settings: StoreSettings,
    client: Client,
}

impl PostgrestStore {
    pub fn new(settings: StoreSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", sensitive_header(settings.api_key.clone())?);
        headers.insert(
            AUTHORIZATION,
            sensitive_header(format!("Bearer {}", settings.api_key))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self { settings, client })
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.table
        )
    }

    async fn count(&self, filter: Option<(&str, &str)>) -> Result<u64> {
        let mut request = self
            .client
            .get(self.table_url())
            .query(&[("select", self.settings.id_column.as_str())])
            .header("Prefer", "count=exact")
            .header(RANGE, "0-0");
        if let Some(filter) = filter {
            request = request.query(&[filter]);
        }

        let response = send_for_read(request, "count rows").await?;
        let header = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| BackfillError::StoreReadError {
                message: "count response carried no Content-Range header".to_string(),
            })?;

        parse_content_range_total(header).ok_or_else(|| BackfillError::StoreReadError {
            message: format!("unrecognised Content-Range header: {}", header),
        })
    }

    fn decode_row(&self, row: &Value) -> Option<CandidateRow> {
        let id = match row.get(&self.settings.id_column)? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let area_code = row
            .get(&self.settings.area_column)
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(CandidateRow {
            id: RowId(id),
            area_code,
            derived_value: None,
        })
    }
}

fn sensitive_header(value: String) -> Result<HeaderValue> {
    let mut header =
        HeaderValue::from_str(&value).map_err(|_| BackfillError::InvalidConfigValueError {
            field: "SUPABASE_KEY".to_string(),
            value: "<redacted>".to_string(),
            reason: "Key contains characters not allowed in an HTTP header".to_string(),
        })?;
    header.set_sensitive(true);
    Ok(header)
}

async fn send_for_read(request: RequestBuilder, action: &str) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| BackfillError::StoreReadError {
            message: format!("{} failed: {}", action, e),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BackfillError::StoreReadError {
            message: format!("{} returned {}: {}", action, status, body),
        });
    }
    Ok(response)
}

/// Total from a PostgREST `Content-Range` header such as `0-0/42` or `*/0`.
fn parse_content_range_total(header: &str) -> Option<u64> {
    let (_, total) = header.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[async_trait]
impl RowStore for PostgrestStore {
    async fn fetch_candidates(&self) -> Result<Vec<CandidateRow>> {
        let select = format!("{},{}", self.settings.id_column, self.settings.area_column);
        let request = self.client.get(self.table_url()).query(&[
            ("select", select.as_str()),
            (self.settings.value_column.as_str(), "is.null"),
            (self.settings.area_column.as_str(), "not.is.null"),
        ]);
        tracing::debug!("Fetching candidates from {}", self.table_url());

        let response = send_for_read(request, "fetch candidates").await?;
        let rows: Vec<Value> =
            response
                .json()
                .await
                .map_err(|e| BackfillError::StoreReadError {
                    message: format!("candidate rows could not be decoded: {}", e),
                })?;

        let candidates: Vec<CandidateRow> = rows
            .iter()
            .filter_map(|row| self.decode_row(row))
            .filter(CandidateRow::is_candidate)
            .collect();

        if candidates.len() != rows.len() {
            tracing::debug!(
                "Dropped {} rows without a usable id or area code",
                rows.len() - candidates.len()
            );
        }
        Ok(candidates)
    }

    async fn apply_value(&self, id: &RowId, value: f64) -> Result<()> {
        let mut body = Map::new();
        body.insert(self.settings.value_column.clone(), Value::from(value));
        let filter = format!("eq.{}", id);
        let write_error = |message: String| BackfillError::StoreWriteError {
            row_id: id.to_string(),
            message,
        };

        let response = self
            .client
            .patch(self.table_url())
            .query(&[
                (self.settings.id_column.as_str(), filter.as_str()),
                ("select", self.settings.id_column.as_str()),
            ])
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .map_err(|e| write_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(write_error(format!("{}: {}", status, text)));
        }

        // A 2xx with no rows means the filter matched nothing (row gone or hidden by RLS).
        let updated: Vec<Value> = response
            .json()
            .await
            .map_err(|e| write_error(format!("update response could not be decoded: {}", e)))?;
        if updated.is_empty() {
            return Err(write_error("no row matched the id".to_string()));
        }
        Ok(())
    }

    async fn count_all(&self) -> Result<u64> {
        self.count(None).await
    }

    async fn count_enriched(&self) -> Result<u64> {
        self.count(Some((self.settings.value_column.as_str(), "not.is.null")))
            .await
    }
}
