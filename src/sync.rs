use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use course_catalog_sync::helpers::write_data;
use course_catalog_sync::{
    HttpCatalogClient, MappingStore, ObjectKind, SourceSnapshot, SqliteMappingStore, SyncConfig,
    Synchronizer,
};
use secrecy::SecretString;
use url::Url;

pub struct SyncOptions {
    pub source_path: PathBuf,
    pub store_path: PathBuf,
    pub endpoint: Url,
    pub token: SecretString,
    pub site_url: Url,
    pub interval: u32,
    pub grouping_course: Option<i64>,
    pub copyright: String,
    pub source_tag: String,
    pub skip_unchanged: bool,
    pub timeout_secs: u64,
    pub report_path: Option<PathBuf>,
}

pub async fn sync(options: SyncOptions) -> Result<()> {
    // Without a catalog session there is nothing to do; fail before reading events.
    let catalog = HttpCatalogClient::new(
        &options.endpoint,
        options.token,
        Duration::from_secs(options.timeout_secs),
    )
    .context("failed to establish a catalog session")?;

    let snapshot = Arc::new(
        SourceSnapshot::load(&options.source_path)
            .with_context(|| format!("failed to load {}", options.source_path.display()))?,
    );
    let store = SqliteMappingStore::open(&options.store_path)
        .with_context(|| format!("failed to open {}", options.store_path.display()))?;

    let config = SyncConfig {
        interval_minutes: options.interval,
        grouping_course: options.grouping_course,
        copyright: options.copyright,
        source_tag: options.source_tag,
        skip_unchanged: options.skip_unchanged,
        ..SyncConfig::new(options.site_url)
    };

    let synchronizer = Synchronizer::new(
        config,
        snapshot.clone(),
        Arc::new(store),
        Arc::new(catalog),
    );
    let report = synchronizer.run(&*snapshot, Utc::now()).await?;

    let formatted = serde_json::to_string_pretty(&report)?;
    println!("{formatted}");

    if let Some(report_path) = options.report_path {
        write_data(&report_path, formatted)?;
    }

    Ok(())
}

pub fn mappings(store_path: PathBuf, kind: Option<ObjectKind>) -> Result<()> {
    let store = SqliteMappingStore::open(&store_path)
        .with_context(|| format!("failed to open {}", store_path.display()))?;
    let records = store.list(kind)?;

    println!("{}", serde_json::to_string_pretty(&records)?);

    Ok(())
}
