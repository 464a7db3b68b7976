//! Google Sheets v4 REST sink.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};
use url::Url;

use jobflow_shared::{JobflowError, ListingRecord, Result, SheetTarget, SinkStatus};

use crate::ListingSink;
use crate::auth::Credentials;
use crate::rows::plan_append;

/// Public Sheets API root.
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Size of a newly created worksheet.
const NEW_SHEET_ROWS: u32 = 2000;
const NEW_SHEET_COLS: u32 = 30;

const USER_AGENT: &str = concat!("jobflow/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

/// Appends listings to a worksheet, creating it on first use.
pub struct SheetsSink {
    client: Client,
    base_url: Url,
}

impl SheetsSink {
    pub fn new() -> Result<Self> {
        Self::with_base_url(SHEETS_API_BASE)
    }

    /// Point the sink at another API root (used by tests).
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| JobflowError::config(format!("invalid sheets URL '{base_url}': {e}")))?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| JobflowError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                JobflowError::config(format!("sheets URL '{}' has no path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Current worksheet values, or `None` when the worksheet does not exist.
    async fn read_values(
        &self,
        token: &str,
        sheet_id: &str,
        range: &str,
    ) -> Result<Option<Vec<Vec<String>>>> {
        let url = self.endpoint(&[sheet_id, "values", range])?;
        let response = send(self.client.get(url).bearer_auth(token), "read values").await?;
        if response.status() == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        let body: ValueRange = checked(response, "read values")
            .await?
            .json()
            .await
            .map_err(|e| JobflowError::Sink(format!("read values: unexpected response: {e}")))?;
        let values = body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        Ok(Some(values))
    }

    async fn add_worksheet(&self, token: &str, sheet_id: &str, worksheet: &str) -> Result<()> {
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": worksheet,
                        "gridProperties": {
                            "rowCount": NEW_SHEET_ROWS,
                            "columnCount": NEW_SHEET_COLS
                        }
                    }
                }
            }]
        });
        self.batch_update(token, sheet_id, &body, "add worksheet").await?;
        info!(worksheet, "created worksheet");
        Ok(())
    }

    async fn append_rows(
        &self,
        token: &str,
        sheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<()> {
        let append = format!("{range}:append");
        let mut url = self.endpoint(&[sheet_id, "values", append.as_str()])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let request = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "values": rows }));
        checked(send(request, "append rows").await?, "append rows").await?;
        Ok(())
    }

    /// Adds a basic filter and freezes the header row.
    async fn format_header(&self, token: &str, sheet_id: &str, worksheet: &str) -> Result<()> {
        let mut url = self.endpoint(&[sheet_id])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties(sheetId,title)");
        let response = send(self.client.get(url).bearer_auth(token), "read metadata").await?;
        let meta: SpreadsheetMeta = checked(response, "read metadata")
            .await?
            .json()
            .await
            .map_err(|e| JobflowError::Sink(format!("read metadata: {e}")))?;
        let grid_id = meta
            .sheets
            .into_iter()
            .map(|s| s.properties)
            .find(|p| p.title == worksheet)
            .map(|p| p.sheet_id)
            .ok_or_else(|| JobflowError::Sink(format!("worksheet '{worksheet}' not found")))?;

        let body = json!({
            "requests": [
                { "setBasicFilter": { "filter": { "range": { "sheetId": grid_id } } } },
                {
                    "updateSheetProperties": {
                        "properties": {
                            "sheetId": grid_id,
                            "gridProperties": { "frozenRowCount": 1 }
                        },
                        "fields": "gridProperties.frozenRowCount"
                    }
                }
            ]
        });
        self.batch_update(token, sheet_id, &body, "format header").await
    }

    async fn batch_update(
        &self,
        token: &str,
        sheet_id: &str,
        body: &Value,
        what: &str,
    ) -> Result<()> {
        let target = format!("{sheet_id}:batchUpdate");
        let url = self.endpoint(&[target.as_str()])?;
        let response = send(self.client.post(url).bearer_auth(token).json(body), what).await?;
        checked(response, what).await?;
        Ok(())
    }
}

#[async_trait]
impl ListingSink for SheetsSink {
    #[instrument(skip_all, fields(worksheet = %target.worksheet, records = records.len()))]
    async fn append(&self, records: &[ListingRecord], target: &SheetTarget) -> Result<SinkStatus> {
        if target.sheet_id.is_empty() {
            debug!("no sheet id configured, skipping");
            return Ok(SinkStatus::Skip);
        }
        if records.is_empty() {
            return Ok(SinkStatus::Skip);
        }
        if !is_file(&target.credentials_path).await {
            warn!(
                path = %target.credentials_path.display(),
                "credentials file missing, skipping sheet"
            );
            return Ok(SinkStatus::Skip);
        }

        let credentials = Credentials::load(&target.credentials_path).await?;
        let token = credentials.access_token(&self.client).await?;
        let range = a1_range(&target.worksheet);

        let values = match self.read_values(&token, &target.sheet_id, &range).await? {
            Some(values) => values,
            None => {
                self.add_worksheet(&token, &target.sheet_id, &target.worksheet)
                    .await?;
                Vec::new()
            }
        };

        let plan = plan_append(&values, records);
        if plan.new_rows == 0 {
            info!("all listings already in sheet");
            return Ok(SinkStatus::NoNew);
        }

        self.append_rows(&token, &target.sheet_id, &range, &plan.rows).await?;
        info!(added = plan.new_rows, "appended listings to sheet");

        if let Err(e) = self
            .format_header(&token, &target.sheet_id, &target.worksheet)
            .await
        {
            debug!(error = %e, "could not apply filter or freeze header");
        }

        Ok(SinkStatus::Added(plan.new_rows))
    }

    fn name(&self) -> &str {
        "sheets"
    }
}

/// A1 range naming a whole worksheet. Titles other than plain words are quoted.
pub fn a1_range(worksheet: &str) -> String {
    let plain = worksheet
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !worksheet.is_empty() && plain {
        worksheet.to_string()
    } else {
        format!("'{}'", worksheet.replace('\'', "''"))
    }
}

fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn send(request: RequestBuilder, what: &str) -> Result<Response> {
    request
        .send()
        .await
        .map_err(|e| JobflowError::Sink(format!("{what}: {e}")))
}

async fn checked(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(JobflowError::Sink(format!("{what}: HTTP {status}: {body}")))
}
