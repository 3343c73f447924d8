//! Cart reconciliation against the remote catalog
//!
//! Holds no state of its own beyond per-user locks: every call reads the
//! remote cart, applies the intent and writes the result back, returning
//! the contents the remote side confirmed.

use super::{apply_mutation, fold_lines, CartMutation, CartSnapshot};
use crate::catalog::{canonical_cart, CatalogClient, CatalogError, ProductId, RemoteCart};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Turns cart intents into remote calls, one user at a time
pub struct CartReconciler<C: CatalogClient> {
    catalog: C,
    locks: UserLocks,
}

impl<C: CatalogClient> CartReconciler<C> {
    pub fn new(catalog: C) -> Self {
        Self {
            catalog,
            locks: UserLocks::default(),
        }
    }

    /// Current remote contents for the user, empty if no cart exists
    pub async fn load(&self, user_id: &str) -> Result<CartSnapshot, CatalogError> {
        let _guard = self.locks.acquire(user_id).await;
        Ok(self
            .catalog
            .get_cart_by_user(user_id)
            .await?
            .map(|cart| CartSnapshot::from_remote(&cart))
            .unwrap_or_default())
    }

    pub async fn add(
        &self,
        user_id: &str,
        product_id: ProductId,
        delta: u32,
    ) -> Result<CartSnapshot, CatalogError> {
        self.apply(user_id, CartMutation::Add { product_id, delta })
            .await
    }

    pub async fn remove(
        &self,
        user_id: &str,
        product_id: ProductId,
    ) -> Result<CartSnapshot, CatalogError> {
        self.apply(user_id, CartMutation::Remove { product_id }).await
    }

    /// Apply one mutation. Errors are returned as-is; a failed write is never
    /// repeated here.
    pub async fn apply(
        &self,
        user_id: &str,
        mutation: CartMutation,
    ) -> Result<CartSnapshot, CatalogError> {
        let _guard = self.locks.acquire(user_id).await;

        let cart = match mutation {
            CartMutation::Add { .. } => self.ensure_cart(user_id).await?,
            CartMutation::Remove { product_id } => {
                let carts = self.catalog.find_carts_by_user(user_id).await?;
                match self.settle(user_id, carts).await? {
                    None => return Ok(CartSnapshot::default()),
                    Some(cart) if !cart.lines().iter().any(|l| l.product_id == product_id) => {
                        tracing::debug!(user_id, product_id, "Line already absent, nothing to remove");
                        return Ok(CartSnapshot::from_remote(&cart));
                    }
                    Some(cart) => cart,
                }
            }
        };

        let lines = apply_mutation(&cart.lines(), mutation);
        let updated = self.catalog.update_cart(&cart.key(), &lines).await?;
        tracing::info!(
            user_id,
            cart_id = updated.id,
            lines = updated.items.len(),
            ?mutation,
            "Cart updated"
        );
        Ok(CartSnapshot::from_remote(&updated))
    }

    /// The user's single open cart, created if missing
    async fn ensure_cart(&self, user_id: &str) -> Result<RemoteCart, CatalogError> {
        let carts = self.catalog.find_carts_by_user(user_id).await?;
        if let Some(cart) = self.settle(user_id, carts).await? {
            return Ok(cart);
        }

        let created = self.catalog.create_cart(user_id).await?;

        // Re-query: a create from another process may have landed as well
        let carts = self.catalog.find_carts_by_user(user_id).await?;
        Ok(self.settle(user_id, carts).await?.unwrap_or(created))
    }

    /// Reduce the user's carts to the canonical one. Lines held by later
    /// duplicates are folded into it and the duplicates are emptied.
    ///
    /// The fold keeps the larger quantity per product, so a settle that
    /// failed before every duplicate was emptied can run again without
    /// counting any line twice.
    async fn settle(
        &self,
        user_id: &str,
        carts: Vec<RemoteCart>,
    ) -> Result<Option<RemoteCart>, CatalogError> {
        let Some(canonical) = canonical_cart(carts.clone()) else {
            return Ok(None);
        };
        let (emptied, duplicates): (Vec<RemoteCart>, Vec<RemoteCart>) = carts
            .into_iter()
            .filter(|c| c.id != canonical.id)
            .partition(|c| c.lines().is_empty());
        if !emptied.is_empty() {
            tracing::debug!(
                user_id,
                canonical_id = canonical.id,
                emptied = emptied.len(),
                "Skipping emptied duplicate carts"
            );
        }
        if duplicates.is_empty() {
            return Ok(Some(canonical));
        }

        tracing::warn!(
            user_id,
            canonical_id = canonical.id,
            duplicates = duplicates.len(),
            "Found duplicate remote carts, folding into the earliest"
        );

        let mut lines = canonical.lines();
        for duplicate in &duplicates {
            fold_lines(&mut lines, &duplicate.lines());
        }
        let merged = if lines == canonical.lines() {
            canonical
        } else {
            self.catalog.update_cart(&canonical.key(), &lines).await?
        };

        for duplicate in &duplicates {
            self.catalog.update_cart(&duplicate.key(), &[]).await?;
        }
        Ok(Some(merged))
    }
}

/// Async mutex per user id; entries are dropped once nobody holds or waits
#[derive(Default)]
struct UserLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    async fn acquire(&self, user_id: &str) -> UserGuard<'_> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(user_id.to_string()).or_default())
        };
        let guard = lock.lock_owned().await;
        UserGuard {
            locks: self,
            user_id: user_id.to_string(),
            guard: Some(guard),
        }
    }
}

struct UserGuard<'a> {
    locks: &'a UserLocks,
    user_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserGuard<'_> {
    fn drop(&mut self) {
        // Release first so the map holds the only remaining reference
        drop(self.guard.take());
        let mut map = self.locks.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map
            .get(&self.user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.user_id);
        }
    }
}
