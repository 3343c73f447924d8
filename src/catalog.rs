//! Remote catalog access
//!
//! Typed access to the products, carts and clients held by the remote
//! catalog service, which is the system of record for all of them.

mod error;
mod strapi;
mod types;

pub use error::{CatalogError, CatalogErrorKind};
pub use strapi::{CatalogConfig, StrapiCatalog};
pub use types::*;

use crate::cart::CartLine;
use async_trait::async_trait;
use std::sync::Arc;

/// Client for the remote catalog/order service
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch one page (1-based) of the product listing
    async fn list_products(&self, page: u32) -> Result<ProductPage, CatalogError>;

    /// Fetch a product card, `None` if the product does not exist
    async fn get_product(&self, id: ProductId) -> Result<Option<ProductDetail>, CatalogError>;

    /// Create an empty cart for the user
    async fn create_cart(&self, user_id: &str) -> Result<RemoteCart, CatalogError>;

    /// All carts recorded for the user, oldest first
    async fn find_carts_by_user(&self, user_id: &str) -> Result<Vec<RemoteCart>, CatalogError>;

    /// The user's canonical cart, if one exists
    async fn get_cart_by_user(&self, user_id: &str) -> Result<Option<RemoteCart>, CatalogError> {
        Ok(canonical_cart(self.find_carts_by_user(user_id).await?))
    }

    /// Replace the cart's items, returning the stored record
    async fn update_cart(
        &self,
        cart_key: &str,
        lines: &[CartLine],
    ) -> Result<RemoteCart, CatalogError>;

    /// Create or overwrite the user's contact record
    async fn upsert_client(&self, user_id: &str, email: &str)
        -> Result<ClientRecord, CatalogError>;
}

#[async_trait]
impl<T: CatalogClient + ?Sized> CatalogClient for Arc<T> {
    async fn list_products(&self, page: u32) -> Result<ProductPage, CatalogError> {
        (**self).list_products(page).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductDetail>, CatalogError> {
        (**self).get_product(id).await
    }

    async fn create_cart(&self, user_id: &str) -> Result<RemoteCart, CatalogError> {
        (**self).create_cart(user_id).await
    }

    async fn find_carts_by_user(&self, user_id: &str) -> Result<Vec<RemoteCart>, CatalogError> {
        (**self).find_carts_by_user(user_id).await
    }

    async fn get_cart_by_user(&self, user_id: &str) -> Result<Option<RemoteCart>, CatalogError> {
        (**self).get_cart_by_user(user_id).await
    }

    async fn update_cart(
        &self,
        cart_key: &str,
        lines: &[CartLine],
    ) -> Result<RemoteCart, CatalogError> {
        (**self).update_cart(cart_key, lines).await
    }

    async fn upsert_client(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<ClientRecord, CatalogError> {
        (**self).upsert_client(user_id, email).await
    }
}
