use crate::config::{Config, ServiceAccountKey};
use crate::errors::{AppError, AppResult};
use crate::models::{AdRecord, GroupAssignment, GroupId};
use async_trait::async_trait;
use chrono::NaiveDate;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const TOKEN_LIFETIME_SECS: u64 = 3600;
const TOKEN_REFRESH_MARGIN_SECS: u64 = 60;

/// External spreadsheet collaborator: one read of the full record range, one
/// keyed write of the group column.
#[async_trait]
pub trait SheetsProvider: Send + Sync {
    async fn fetch_records(&self) -> AppResult<Vec<AdRecord>>;
    async fn write_groups(&self, assignments: &[GroupAssignment]) -> AppResult<()>;
}

// ─── Row mapping ────────────────────────────────────────────────────────────

/// Maps raw sheet values (row 1 = headers) to records. Headers may come in
/// any order; unknown headers are ignored; missing trailing cells become
/// empty strings.
///
/// Group cells that are not well-formed `brand|||token|||name` strings are
/// adopted as groups anyway: identical cells map to one synthesized identity
/// (fresh token, name = the whole cell, brand = the row's brand), which gets
/// normalized on the next save.
pub fn records_from_values(values: &[Vec<String>]) -> Vec<AdRecord> {
    let Some((headers, rows)) = values.split_first() else {
        return Vec::new();
    };
    let index: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| (header.trim(), i))
        .collect();
    let cell = |row: &[String], name: &str| -> String {
        index
            .get(name)
            .and_then(|&i| row.get(i))
            .cloned()
            .unwrap_or_default()
    };

    let mut legacy_groups: HashMap<String, GroupId> = HashMap::new();
    rows.iter()
        .map(|row| {
            let brand = cell(row, "brand");
            let group_cell = cell(row, "group");
            let group = resolve_group_cell(&group_cell, &brand, &mut legacy_groups);
            AdRecord {
                library_id: cell(row, "library_id"),
                start_date: normalize_start_date(&cell(row, "start_date")),
                ads_count: cell(row, "ads_count"),
                s3_key: cell(row, "s3_key"),
                ad_link: cell(row, "ad_link"),
                updated_date: cell(row, "updated_date"),
                active_status: parse_active_status(&cell(row, "active_status")),
                brand,
                group,
            }
        })
        .collect()
}

fn resolve_group_cell(
    cell: &str,
    brand: &str,
    legacy: &mut HashMap<String, GroupId>,
) -> Option<GroupId> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    if let Some(group) = GroupId::parse(cell) {
        return Some(group);
    }
    let group = legacy
        .entry(cell.to_string())
        .or_insert_with(|| {
            let brand = if brand.is_empty() { "unknown" } else { brand };
            tracing::warn!(cell, brand, "adopting legacy group cell");
            GroupId::new(brand, cell)
        })
        .clone();
    Some(group)
}

/// Date cells the sheet holds in assorted formats are normalized to
/// `YYYY-MM-DD`; anything unparseable passes through verbatim and is handled
/// by the filter's unparsable-date policy.
fn normalize_start_date(cell: &str) -> String {
    let trimmed = cell.trim();
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    // Timestamp cells like "2025-06-01T09:30:00Z" keep their date part.
    if let Some(prefix) = trimmed.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    cell.to_string()
}

fn parse_active_status(cell: &str) -> bool {
    matches!(cell.trim().to_ascii_lowercase().as_str(), "true" | "1")
}

// ─── Google Sheets client ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct TokenClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ValueUpdate {
    values: Vec<Vec<String>>,
}

pub struct GoogleSheetsClient {
    http: reqwest::Client,
    spreadsheet_id: String,
    sheet_range: String,
    group_range: String,
    library_id_range: String,
    credentials: ServiceAccountKey,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheetsClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            sheet_range: config.sheet_range.clone(),
            group_range: config.group_range.clone(),
            library_id_range: config.library_id_range.clone(),
            credentials: config.credentials.clone(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> AppResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            let margin = Duration::from_secs(TOKEN_REFRESH_MARGIN_SECS);
            if SystemTime::now() + margin < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|error| AppError::Internal(error.to_string()))?
            .as_secs();
        let claims = TokenClaims {
            iss: &self.credentials.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.credentials.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|error| AppError::Config(format!("invalid service-account key: {error}")))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|error| AppError::Internal(format!("jwt encoding failed: {error}")))?;

        let response = self
            .http
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let token: TokenResponse = response.json().await?;

        let lifetime = if token.expires_in > 0 {
            token.expires_in
        } else {
            TOKEN_LIFETIME_SECS
        };
        let entry = CachedToken {
            access_token: token.access_token.clone(),
            expires_at: SystemTime::now() + Duration::from_secs(lifetime),
        };
        *cached = Some(entry);
        Ok(token.access_token)
    }

    async fn get_values(&self, range: &str) -> AppResult<Vec<Vec<String>>> {
        let token = self.access_token().await?;
        let url = format!("{SHEETS_BASE}/{}/values/{range}", self.spreadsheet_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;
        let body: ValueRange = response.json().await?;
        Ok(body.values)
    }

    async fn put_values(&self, range: &str, values: Vec<Vec<String>>) -> AppResult<()> {
        let token = self.access_token().await?;
        let url = format!(
            "{SHEETS_BASE}/{}/values/{range}?valueInputOption=RAW",
            self.spreadsheet_id
        );
        self.http
            .put(&url)
            .bearer_auth(token)
            .json(&ValueUpdate { values })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl SheetsProvider for GoogleSheetsClient {
    async fn fetch_records(&self) -> AppResult<Vec<AdRecord>> {
        let values = self.get_values(&self.sheet_range).await?;
        let records = records_from_values(&values);
        tracing::info!(rows = records.len(), "fetched ad records from sheet");
        Ok(records)
    }

    /// Keyed write: the group column payload is built by looking each sheet
    /// row's library id up in the assignments, so client-side reordering can
    /// never smear groups across rows. Any id the client does not know about
    /// fails the whole write.
    async fn write_groups(&self, assignments: &[GroupAssignment]) -> AppResult<()> {
        let id_rows = self.get_values(&self.library_id_range).await?;
        let sheet_ids: Vec<String> = id_rows
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or_default())
            .collect();

        let column = keyed_group_column(&sheet_ids, assignments)?;
        self.put_values(&self.group_range, column).await?;
        tracing::info!(rows = sheet_ids.len(), "wrote group assignments to sheet");
        Ok(())
    }
}

/// Orders the group cells by the sheet's own library-id column.
pub fn keyed_group_column(
    sheet_ids: &[String],
    assignments: &[GroupAssignment],
) -> AppResult<Vec<Vec<String>>> {
    if sheet_ids.len() != assignments.len() {
        return Err(AppError::Sheets(format!(
            "sheet has {} rows but client holds {} records; refusing to write",
            sheet_ids.len(),
            assignments.len()
        )));
    }
    let by_id: HashMap<&str, &str> = assignments
        .iter()
        .map(|entry| (entry.library_id.as_str(), entry.group.as_str()))
        .collect();
    sheet_ids
        .iter()
        .map(|id| {
            by_id
                .get(id.as_str())
                .map(|group| vec![(*group).to_string()])
                .ok_or_else(|| {
                    AppError::Sheets(format!("sheet row {id} unknown to client; refusing to write"))
                })
        })
        .collect()
}
