//! Strapi REST implementation of the catalog client

use super::{
    CatalogClient, CatalogError, CatalogErrorKind, ClientRecord, ProductDetail, ProductId,
    ProductPage, ProductSummary, RemoteCart, RemoteCartItem,
};
use crate::cart::CartLine;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};

const CART_POPULATE: (&str, &str) = ("populate[items][populate][product]", "true");

/// Largest number of carts fetched when looking up a user's carts
const CART_LOOKUP_LIMIT: &str = "100";

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    ///
    /// A server-provided hint wins over the computed backoff but is capped.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.max_delay);
        }
        let shift = attempt.saturating_sub(1).min(16);
        let base = self.base_delay.saturating_mul(1u32 << shift).min(self.max_delay);
        let half_ms = u64::try_from(base.as_millis() / 2).unwrap_or(0);
        let jitter = rand::thread_rng().gen_range(0..=half_ms);
        base + Duration::from_millis(jitter)
    }
}

/// Connection settings for the Strapi catalog
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
    /// Listing endpoint; may differ from `{base_url}/api/products`
    pub products_url: String,
    /// Extra query parameters sent with every listing request
    pub products_params: Vec<(String, String)>,
    pub read_token: Option<String>,
    pub write_token: Option<String>,
    pub page_size: u32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl CatalogConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            products_url: format!("{base_url}/api/products"),
            products_params: vec![("populate".to_string(), "*".to_string())],
            base_url,
            read_token: None,
            write_token: None,
            page_size: 10,
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Read,
    Write,
}

/// Whether a failed request may be sent again
#[derive(Debug, Clone, Copy)]
enum Replay {
    /// Repeating has the same effect as sending once
    Idempotent,
    /// Repeating may create a second record
    Create,
}

impl Replay {
    fn allows(self, err: &CatalogError) -> bool {
        match self {
            Replay::Idempotent => err.is_retryable(),
            Replay::Create => err.kind.is_safe_to_resend(),
        }
    }
}

/// Catalog client speaking the Strapi REST dialect
pub struct StrapiCatalog {
    client: Client,
    config: CatalogConfig,
}

impl StrapiCatalog {
    pub fn new(config: CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CatalogError::network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Attach the credential for the access level. Writes never fall back to
    /// the read credential and reads never carry the write credential.
    fn authorize(&self, request: RequestBuilder, access: Access) -> Result<RequestBuilder, CatalogError> {
        match access {
            Access::Read => Ok(match &self.config.read_token {
                Some(token) => request.bearer_auth(token),
                None => request,
            }),
            Access::Write => self
                .config
                .write_token
                .as_ref()
                .map(|token| request.bearer_auth(token))
                .ok_or_else(|| CatalogError::auth("Write credential is not configured")),
        }
    }

    async fn send<F>(
        &self,
        op: &'static str,
        access: Access,
        replay: Replay,
        build: F,
    ) -> Result<Response, CatalogError>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 1;
        loop {
            let request = self.authorize(build(&self.client), access)?;
            let start = Instant::now();
            let outcome = match request.send().await {
                Ok(resp) if resp.status().is_success() => Ok(resp),
                Ok(resp) => Err(rejection(resp).await),
                Err(e) => Err(CatalogError::from_reqwest(&e)),
            };
            let duration_ms = start.elapsed().as_millis();

            match outcome {
                Ok(resp) => {
                    tracing::debug!(
                        op,
                        attempt,
                        duration_ms = %duration_ms,
                        status = %resp.status(),
                        "Catalog request completed"
                    );
                    return Ok(resp);
                }
                Err(err) if attempt < self.config.retry.max_attempts && replay.allows(&err) => {
                    let delay = self.config.retry.delay_for(attempt, err.retry_after);
                    tracing::warn!(
                        op,
                        attempt,
                        error = %err,
                        delay_ms = %delay.as_millis(),
                        "Catalog request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.kind != CatalogErrorKind::NotFound {
                        tracing::error!(
                            op,
                            attempt,
                            duration_ms = %duration_ms,
                            error = %err,
                            retryable = err.is_retryable(),
                            "Catalog request failed"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }

    fn detail(&self, product: WireProduct) -> ProductDetail {
        let summary = product_summary(&product);
        let image_url = product
            .picture
            .and_then(WirePicture::first_url)
            .map(|url| {
                if url.starts_with('/') {
                    self.url(&url)
                } else {
                    url
                }
            });
        ProductDetail {
            summary,
            description: product.description.filter(|d| !d.trim().is_empty()),
            image_url,
        }
    }

    async fn find_client(&self, user_id: &str) -> Result<Option<WireClient>, CatalogError> {
        let url = self.url("/api/clients");
        let resp = self
            .send("find_client", Access::Read, Replay::Idempotent, |c| {
                c.get(&url).query(&[("filters[telegram_id][$eq]", user_id)])
            })
            .await?;
        let envelope: Envelope<Vec<WireClient>> = decode(resp).await?;
        Ok(envelope.data.into_iter().next())
    }
}

#[async_trait]
impl CatalogClient for StrapiCatalog {
    async fn list_products(&self, page: u32) -> Result<ProductPage, CatalogError> {
        let page = page.max(1);
        let mut query = self.config.products_params.clone();
        query.push(("pagination[page]".to_string(), page.to_string()));
        query.push((
            "pagination[pageSize]".to_string(),
            self.config.page_size.to_string(),
        ));
        let url = self.config.products_url.clone();

        let resp = self
            .send("list_products", Access::Read, Replay::Idempotent, |c| {
                c.get(&url).query(&query)
            })
            .await?;
        let envelope: Envelope<Vec<WireProduct>> = decode(resp).await?;

        let page_count = envelope
            .meta
            .and_then(|m| m.pagination)
            .map_or(page, |p| p.page_count.max(1));
        Ok(ProductPage {
            products: envelope.data.iter().map(product_summary).collect(),
            page,
            page_count,
        })
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductDetail>, CatalogError> {
        let url = self.url("/api/products");
        let id_param = id.to_string();
        let result = self
            .send("get_product", Access::Read, Replay::Idempotent, |c| {
                c.get(&url)
                    .query(&[("filters[id][$eq]", id_param.as_str()), ("populate", "*")])
            })
            .await;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) if e.kind == CatalogErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let envelope: Envelope<Vec<WireProduct>> = decode(resp).await?;
        Ok(envelope
            .data
            .into_iter()
            .find(|p| p.id == id)
            .map(|p| self.detail(p)))
    }

    async fn create_cart(&self, user_id: &str) -> Result<RemoteCart, CatalogError> {
        let url = self.url("/api/carts");
        let body = json!({ "data": { "telegram_id": user_id, "items": [] } });
        let resp = self
            .send("create_cart", Access::Write, Replay::Create, |c| {
                c.post(&url).query(&[CART_POPULATE]).json(&body)
            })
            .await?;
        let envelope: Envelope<WireCart> = decode(resp).await?;
        tracing::info!(user_id, cart_id = envelope.data.id, "Created remote cart");
        Ok(remote_cart(envelope.data, user_id))
    }

    async fn find_carts_by_user(&self, user_id: &str) -> Result<Vec<RemoteCart>, CatalogError> {
        let url = self.url("/api/carts");
        let resp = self
            .send("find_carts", Access::Read, Replay::Idempotent, |c| {
                c.get(&url).query(&[
                    ("filters[telegram_id][$eq]", user_id),
                    CART_POPULATE,
                    ("sort", "createdAt:asc"),
                    ("pagination[pageSize]", CART_LOOKUP_LIMIT),
                ])
            })
            .await?;
        let envelope: Envelope<Vec<WireCart>> = decode(resp).await?;
        Ok(envelope
            .data
            .into_iter()
            .map(|cart| remote_cart(cart, user_id))
            .collect())
    }

    async fn update_cart(
        &self,
        cart_key: &str,
        lines: &[CartLine],
    ) -> Result<RemoteCart, CatalogError> {
        let url = self.url(&format!("/api/carts/{cart_key}"));
        let items: Vec<_> = lines
            .iter()
            .map(|line| json!({ "product": line.product_id, "quantity": line.quantity }))
            .collect();
        let body = json!({ "data": { "items": items } });
        let resp = self
            .send("update_cart", Access::Write, Replay::Idempotent, |c| {
                c.put(&url).query(&[CART_POPULATE]).json(&body)
            })
            .await?;
        let envelope: Envelope<WireCart> = decode(resp).await?;
        let owner = envelope.data.telegram_id.clone().unwrap_or_default();
        Ok(remote_cart(envelope.data, &owner))
    }

    async fn upsert_client(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<ClientRecord, CatalogError> {
        let resp = match self.find_client(user_id).await? {
            None => {
                let url = self.url("/api/clients");
                let body = json!({ "data": { "telegram_id": user_id, "email": email } });
                self.send("create_client", Access::Write, Replay::Create, |c| {
                    c.post(&url).json(&body)
                })
                .await?
            }
            Some(existing) => {
                let key = existing
                    .document_id
                    .unwrap_or_else(|| existing.id.to_string());
                let url = self.url(&format!("/api/clients/{key}"));
                let body = json!({ "data": { "email": email } });
                self.send("update_client", Access::Write, Replay::Idempotent, |c| {
                    c.put(&url).json(&body)
                })
                .await?
            }
        };
        let envelope: Envelope<WireClient> = decode(resp).await?;
        let client = envelope.data;
        Ok(ClientRecord {
            id: client.id,
            telegram_id: client.telegram_id.unwrap_or_else(|| user_id.to_string()),
            email: client.email.unwrap_or_else(|| email.to_string()),
        })
    }
}

async fn rejection(resp: Response) -> CatalogError {
    let status = resp.status();
    let retry_after = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = resp.text().await.unwrap_or_default();
    let err = CatalogError::from_status(status, &body);
    match retry_after {
        Some(delay) => err.with_retry_after(delay),
        None => err,
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, CatalogError> {
    resp.json::<T>()
        .await
        .map_err(|e| CatalogError::decode(format!("Unexpected response shape: {e}")))
}

fn product_summary(product: &WireProduct) -> ProductSummary {
    ProductSummary {
        id: product.id,
        document_id: product.document_id.clone(),
        title: product
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Product #{}", product.id)),
        price: product.price,
    }
}

fn remote_cart(wire: WireCart, user_id: &str) -> RemoteCart {
    let items = wire
        .items
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| {
            let quantity = item.quantity.map_or(1, quantity_from_wire);
            match item.product? {
                WireProductRef::Populated(product) => Some(RemoteCartItem {
                    product_id: product.id,
                    product: Some(product_summary(&product)),
                    quantity,
                }),
                WireProductRef::Id(product_id) => Some(RemoteCartItem {
                    product_id,
                    product: None,
                    quantity,
                }),
            }
        })
        .collect();

    RemoteCart {
        id: wire.id,
        document_id: wire.document_id,
        telegram_id: wire.telegram_id.unwrap_or_else(|| user_id.to_string()),
        items,
        created_at: wire.created_at,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantity_from_wire(quantity: f64) -> u32 {
    if quantity.is_finite() && quantity > 0.0 {
        quantity.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    page_count: u32,
}

#[derive(Debug, Deserialize)]
struct WireProduct {
    id: i64,
    #[serde(rename = "documentId")]
    document_id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    price: Option<f64>,
    picture: Option<WirePicture>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePicture {
    Many(Vec<WireMedia>),
    One(WireMedia),
}

impl WirePicture {
    fn first_url(self) -> Option<String> {
        match self {
            WirePicture::Many(media) => media.into_iter().find_map(|m| m.url),
            WirePicture::One(media) => media.url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMedia {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireProductRef {
    Populated(WireProduct),
    Id(i64),
}

#[derive(Debug, Deserialize)]
struct WireCartItem {
    product: Option<WireProductRef>,
    quantity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireCart {
    id: i64,
    #[serde(rename = "documentId")]
    document_id: Option<String>,
    telegram_id: Option<String>,
    items: Option<Vec<WireCartItem>>,
    #[serde(rename = "createdAt")]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WireClient {
    id: i64,
    #[serde(rename = "documentId")]
    document_id: Option<String>,
    telegram_id: Option<String>,
    email: Option<String>,
}
