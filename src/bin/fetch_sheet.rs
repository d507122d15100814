//! One-shot snapshot of the ad sheet to `sheet-data.json` and
//! `sheet-data.csv`, for offline inspection.

use ad_library_center::config::Config;
use ad_library_center::models::{AdRecord, GroupId};
use ad_library_center::sheets::{GoogleSheetsClient, SheetsProvider};
use anyhow::Context;

const JSON_PATH: &str = "sheet-data.json";
const CSV_PATH: &str = "sheet-data.csv";

fn write_csv(path: &str, records: &[AdRecord]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "brand",
        "library_id",
        "start_date",
        "ads_count",
        "s3_key",
        "ad_link",
        "updated_date",
        "active_status",
        "group",
    ])?;
    for ad in records {
        writer.write_record([
            ad.brand.as_str(),
            ad.library_id.as_str(),
            ad.start_date.as_str(),
            ad.ads_count.as_str(),
            ad.s3_key.as_str(),
            ad.ad_link.as_str(),
            ad.updated_date.as_str(),
            if ad.active_status { "true" } else { "false" },
            &ad.group
                .as_ref()
                .map(GroupId::display_string)
                .unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;
    let client = GoogleSheetsClient::new(&config);
    let records = client
        .fetch_records()
        .await
        .context("fetching sheet data")?;
    if records.is_empty() {
        tracing::warn!("no data found");
        return Ok(());
    }

    std::fs::write(JSON_PATH, serde_json::to_string_pretty(&records)?)
        .with_context(|| format!("writing {JSON_PATH}"))?;
    tracing::info!(path = JSON_PATH, "saved JSON snapshot");

    write_csv(CSV_PATH, &records).with_context(|| format!("writing {CSV_PATH}"))?;
    tracing::info!(path = CSV_PATH, rows = records.len(), "saved CSV snapshot");
    Ok(())
}
