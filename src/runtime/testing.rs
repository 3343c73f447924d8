//! Mock implementations for testing
//!
//! An in-memory catalog with the same observable behavior as the remote
//! API, plus call counting, latency and failure injection.

use crate::cart::CartLine;
use crate::catalog::{
    CatalogClient, CatalogError, ClientRecord, ProductDetail, ProductId, ProductPage,
    ProductSummary, RemoteCart, RemoteCartItem,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

const PAGE_SIZE: usize = 10;

/// Catalog operations, for counting calls and injecting failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    ListProducts,
    GetProduct,
    CreateCart,
    FindCarts,
    UpdateCart,
    UpsertClient,
}

#[derive(Default)]
struct MockState {
    carts: Vec<RemoteCart>,
    clients: Vec<ClientRecord>,
    next_id: i64,
    /// Seconds since the mock epoch, advanced on every record creation
    clock: i64,
    calls: HashMap<MockOp, usize>,
    /// Scripted outcomes per op; `None` lets the call through
    failures: HashMap<MockOp, VecDeque<Option<CatalogError>>>,
    race_next_create: bool,
}

impl MockState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        Utc.timestamp_opt(1_700_000_000 + self.clock, 0)
            .single()
            .unwrap_or_default()
    }
}

/// In-memory stand-in for the remote catalog
pub struct MockCatalog {
    products: Vec<ProductDetail>,
    delay: Duration,
    state: Mutex<MockState>,
}

impl MockCatalog {
    /// Catalog with products `1..=count`, titled "Product {id}"
    pub fn with_products(count: i64) -> Self {
        let products = (1..=count)
            .map(|id| ProductDetail {
                summary: ProductSummary {
                    id,
                    document_id: Some(format!("prod-{id}")),
                    title: format!("Product {id}"),
                    price: Some(10.0 * id as f64),
                },
                description: Some(format!("Description of product {id}")),
                image_url: Some(format!("http://cms.test/uploads/{id}.png")),
            })
            .collect();
        Self {
            products,
            delay: Duration::ZERO,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Add latency to every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make the next call of `op` fail with `error`
    pub fn fail_next(&self, op: MockOp, error: CatalogError) {
        self.fail_after(op, 0, error);
    }

    /// Let `successes` calls of `op` through, then fail the one after
    pub fn fail_after(&self, op: MockOp, successes: usize, error: CatalogError) {
        let mut state = self.state.lock().unwrap();
        let script = state.failures.entry(op).or_default();
        script.extend(std::iter::repeat_with(|| None).take(successes));
        script.push_back(Some(error));
    }

    /// Make the next `create_cart` lose a race: another cart for the same
    /// user is created just before it
    pub fn race_next_create(&self) {
        self.state.lock().unwrap().race_next_create = true;
    }

    /// Insert a cart directly, bypassing call counting
    pub fn seed_cart(&self, user_id: &str, lines: Vec<CartLine>) -> i64 {
        let mut state = self.state.lock().unwrap();
        let cart = self.new_cart(&mut state, user_id);
        let id = cart.id;
        state.carts.push(RemoteCart {
            items: self.items(&lines),
            ..cart
        });
        id
    }

    /// Every cart of the user, in creation order
    pub fn carts_for(&self, user_id: &str) -> Vec<RemoteCart> {
        self.state
            .lock()
            .unwrap()
            .carts
            .iter()
            .filter(|c| c.telegram_id == user_id)
            .cloned()
            .collect()
    }

    pub fn cart(&self, id: i64) -> Option<RemoteCart> {
        self.state
            .lock()
            .unwrap()
            .carts
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub fn client(&self, user_id: &str) -> Option<ClientRecord> {
        self.state
            .lock()
            .unwrap()
            .clients
            .iter()
            .find(|c| c.telegram_id == user_id)
            .cloned()
    }

    pub fn count_calls(&self, op: MockOp) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    /// Record the call, wait out the latency and fire any queued failure
    async fn enter(&self, op: MockOp) -> Result<(), CatalogError> {
        *self.state.lock().unwrap().calls.entry(op).or_default() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failure = self
            .state
            .lock()
            .unwrap()
            .failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
            .flatten();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn new_cart(&self, state: &mut MockState, user_id: &str) -> RemoteCart {
        let id = state.next_id();
        RemoteCart {
            id,
            document_id: Some(format!("cart-{id}")),
            telegram_id: user_id.to_string(),
            items: Vec::new(),
            created_at: Some(state.tick()),
        }
    }

    fn items(&self, lines: &[CartLine]) -> Vec<RemoteCartItem> {
        lines
            .iter()
            .filter(|l| l.quantity > 0)
            .map(|l| RemoteCartItem {
                product_id: l.product_id,
                product: self.summary(l.product_id),
                quantity: l.quantity,
            })
            .collect()
    }

    fn summary(&self, id: ProductId) -> Option<ProductSummary> {
        self.products
            .iter()
            .find(|p| p.summary.id == id)
            .map(|p| p.summary.clone())
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn list_products(&self, page: u32) -> Result<ProductPage, CatalogError> {
        self.enter(MockOp::ListProducts).await?;
        let page = page.max(1);
        let page_count = self.products.len().div_ceil(PAGE_SIZE).max(1);
        let products = self
            .products
            .iter()
            .skip((page as usize - 1) * PAGE_SIZE)
            .take(PAGE_SIZE)
            .map(|p| p.summary.clone())
            .collect();
        Ok(ProductPage {
            products,
            page,
            page_count: u32::try_from(page_count).unwrap_or(u32::MAX),
        })
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductDetail>, CatalogError> {
        self.enter(MockOp::GetProduct).await?;
        Ok(self.products.iter().find(|p| p.summary.id == id).cloned())
    }

    async fn create_cart(&self, user_id: &str) -> Result<RemoteCart, CatalogError> {
        self.enter(MockOp::CreateCart).await?;
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.race_next_create) {
            let rival = self.new_cart(&mut state, user_id);
            state.carts.push(rival);
        }
        let cart = self.new_cart(&mut state, user_id);
        state.carts.push(cart.clone());
        Ok(cart)
    }

    async fn find_carts_by_user(&self, user_id: &str) -> Result<Vec<RemoteCart>, CatalogError> {
        self.enter(MockOp::FindCarts).await?;
        let mut carts = self.carts_for(user_id);
        carts.sort_by_key(|c| c.created_at);
        Ok(carts)
    }

    async fn update_cart(
        &self,
        cart_key: &str,
        lines: &[CartLine],
    ) -> Result<RemoteCart, CatalogError> {
        self.enter(MockOp::UpdateCart).await?;
        let items = self.items(lines);
        let mut state = self.state.lock().unwrap();
        let cart = state
            .carts
            .iter_mut()
            .find(|c| c.key() == cart_key)
            .ok_or_else(|| CatalogError::not_found(format!("cart {cart_key}")))?;
        cart.items = items;
        Ok(cart.clone())
    }

    async fn upsert_client(&self, user_id: &str, email: &str) -> Result<ClientRecord, CatalogError> {
        self.enter(MockOp::UpsertClient).await?;
        let mut state = self.state.lock().unwrap();
        if let Some(client) = state.clients.iter_mut().find(|c| c.telegram_id == user_id) {
            client.email = email.to_string();
            return Ok(client.clone());
        }
        let client = ClientRecord {
            id: state.next_id(),
            telegram_id: user_id.to_string(),
            email: email.to_string(),
        };
        state.clients.push(client.clone());
        Ok(client)
    }
}
