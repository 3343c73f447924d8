//! Environment configuration

use crate::catalog::CatalogConfig;
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BASE_URL: &str = "http://localhost:1337";
const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub catalog: CatalogConfig,
    /// Unset means sessions live in memory only
    pub session_db_path: Option<PathBuf>,
    pub session_ttl: Duration,
    /// Shared secret expected in `X-Dispatcher-Token`
    pub dispatcher_token: Option<String>,
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = var("STRAPI_URL_BASE").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut catalog = CatalogConfig::new(base_url);
        if let Some(products_url) = var("STRAPI_URL") {
            apply_products_url(&mut catalog, &products_url);
        }
        catalog.read_token = var("STRAPI_TOKEN");
        catalog.write_token = var("STRAPI_TOKEN_WRITE");
        catalog.page_size = parse_or("STRAPI_PAGE_SIZE", var("STRAPI_PAGE_SIZE"), DEFAULT_PAGE_SIZE)
            .clamp(1, 100);

        Self {
            port: parse_or("PORT", var("PORT"), DEFAULT_PORT),
            catalog,
            session_db_path: var("SESSION_DB_PATH").map(PathBuf::from),
            session_ttl: Duration::from_secs(
                parse_or("SESSION_TTL_SECS", var("SESSION_TTL_SECS"), DEFAULT_SESSION_TTL_SECS)
                    .max(1),
            ),
            dispatcher_token: var("BOT_TOKEN"),
        }
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Invalid number, using default");
            default
        }),
    }
}

/// Split a listing URL into endpoint and extra query parameters. Paging
/// parameters are dropped: the client sets them per request.
fn apply_products_url(catalog: &mut CatalogConfig, raw: &str) {
    match Url::parse(raw) {
        Ok(url) => {
            let params: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| !k.starts_with("pagination"))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            let mut endpoint = url;
            endpoint.set_query(None);
            endpoint.set_fragment(None);
            catalog.products_url = endpoint.to_string();
            if !params.is_empty() {
                catalog.products_params = params;
            }
        }
        Err(e) => {
            tracing::warn!(url = raw, error = %e, "Invalid STRAPI_URL, using default products endpoint");
        }
    }
}
