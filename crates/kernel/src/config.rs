//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::projection::OptionMatching;
use crate::service::ListingSettings;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Relation graph document (default: ./relations.yml).
    pub relation_graph_path: PathBuf,

    /// Page size used when the request has none (default: 20).
    pub page_size_default: u64,

    /// Largest page size a request may ask for (default: 100).
    pub page_size_max: u64,

    /// How option paths satisfy property paths (default: boundary).
    pub option_matching: OptionMatching,

    /// Per-transaction statement timeout (default: 10s).
    pub statement_timeout: Duration,

    /// Public base URL; pagination links are built against it.
    pub site_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let relation_graph_path = env::var("RELATION_GRAPH_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./relations.yml"));

        let page_size_default: u64 = env::var("PAGE_SIZE_DEFAULT")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .context("PAGE_SIZE_DEFAULT must be a valid u64")?;

        let page_size_max: u64 = env::var("PAGE_SIZE_MAX")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .context("PAGE_SIZE_MAX must be a valid u64")?;

        if page_size_default == 0 || page_size_default > page_size_max {
            anyhow::bail!(
                "PAGE_SIZE_DEFAULT must be in 1..={page_size_max}, got {page_size_default}"
            );
        }

        let option_matching = env::var("OPTION_MATCHING")
            .unwrap_or_else(|_| "boundary".to_string())
            .parse::<OptionMatching>()
            .map_err(anyhow::Error::msg)
            .context("OPTION_MATCHING must be 'boundary' or 'prefix'")?;

        let statement_timeout_secs: u64 = env::var("STATEMENT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("STATEMENT_TIMEOUT_SECS must be a valid u64")?;

        let site_url = env::var("SITE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&site_url).context("SITE_URL must be an absolute URL")?;

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            relation_graph_path,
            page_size_default,
            page_size_max,
            option_matching,
            statement_timeout: Duration::from_secs(statement_timeout_secs),
            site_url,
        })
    }

    /// Listing limits and policies handed to the service.
    pub fn listing_settings(&self) -> ListingSettings {
        ListingSettings {
            default_page_size: self.page_size_default,
            max_page_size: self.page_size_max,
            option_matching: self.option_matching,
            site_url: self.site_url.clone(),
        }
    }
}
