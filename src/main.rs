use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use course_catalog_sync::config::{DEFAULT_COPYRIGHT, DEFAULT_INTERVAL_MINUTES, DEFAULT_SOURCE_TAG};
use course_catalog_sync::ObjectKind;
use secrecy::SecretString;
use url::Url;

mod logging;
mod sync;

use logging::LogFormat;

#[derive(Parser)]
#[clap(version, about = "Pushes learning-system changes to the course catalog")]
struct Synchronizer {
    /// Log filter directive, e.g. `info` or `course_catalog_sync=debug`.
    #[clap(long, global = true, value_parser, env = "SYNC_LOG", default_value = "info")]
    log_level: String,

    #[clap(long, global = true, value_parser, default_value = "text")]
    log_format: LogFormat,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process the change events of one lookback window.
    Sync {
        /// JSON export of the source system.
        #[clap(short, long, value_parser, value_name = "PATH", env = "SOURCE_PATH")]
        source_path: PathBuf,

        /// SQLite file holding the mapping table.
        #[clap(long, value_parser, value_name = "PATH", env = "MAPPING_STORE")]
        store_path: PathBuf,

        #[clap(long, value_parser, env = "CATALOG_ENDPOINT")]
        endpoint: Url,

        #[clap(long, value_parser, env = "CATALOG_TOKEN", hide_env_values = true)]
        token: String,

        /// Root URL of the source learning system.
        #[clap(long, value_parser, env = "SITE_URL")]
        site_url: Url,

        /// Lookback window in minutes.
        #[clap(long, value_parser, env = "SYNC_INTERVAL", default_value_t = DEFAULT_INTERVAL_MINUTES)]
        interval: u32,

        /// Course that always syncs as a grouping.
        #[clap(long, value_parser, env = "SYNC_GROUPING_COURSE")]
        grouping_course: Option<i64>,

        #[clap(long, value_parser, default_value_t = DEFAULT_COPYRIGHT.to_owned())]
        copyright: String,

        #[clap(long, value_parser, default_value_t = DEFAULT_SOURCE_TAG.to_owned())]
        source_tag: String,

        /// Skip remote updates when nothing changed since the last push.
        #[clap(long, action)]
        skip_unchanged: bool,

        /// Per-request timeout of catalog calls, in seconds.
        #[clap(long, value_parser, default_value_t = 30)]
        timeout_secs: u64,

        #[clap(long, env = "SYNC_ENABLED", action = ArgAction::Set, default_value = "true")]
        enabled: bool,

        /// Also write the run report to this file.
        #[clap(long, value_parser, value_name = "PATH")]
        report_path: Option<PathBuf>,
    },
    /// Print the mapping table as JSON.
    Mappings {
        #[clap(long, value_parser, value_name = "PATH", env = "MAPPING_STORE")]
        store_path: PathBuf,

        #[clap(long, value_parser)]
        kind: Option<ObjectKind>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(feature = "env-file")]
    dotenvy::dotenv().ok();

    let synchronizer = Synchronizer::parse();
    logging::init(&synchronizer.log_level, synchronizer.log_format)?;

    match synchronizer.command {
        Command::Sync {
            source_path,
            store_path,
            endpoint,
            token,
            site_url,
            interval,
            grouping_course,
            copyright,
            source_tag,
            skip_unchanged,
            timeout_secs,
            enabled,
            report_path,
        } => {
            if !enabled {
                tracing::info!("synchronization is disabled; nothing to do");
                return Ok(());
            }

            let options = sync::SyncOptions {
                source_path,
                store_path,
                endpoint,
                token: SecretString::new(token),
                site_url,
                interval,
                grouping_course,
                copyright,
                source_tag,
                skip_unchanged,
                timeout_secs,
                report_path,
            };

            sync::sync(options).await
        }
        Command::Mappings { store_path, kind } => sync::mappings(store_path, kind),
    }
}
