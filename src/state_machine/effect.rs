//! Effects produced by state transitions

use crate::cart::CartMutation;
use crate::catalog::ProductId;
use crate::render::Reply;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fetch a listing page; yields `CatalogLoaded` or `RemoteFailed`
    FetchCatalog { page: u32 },

    /// Fetch a product card; yields `ProductLoaded` or `RemoteFailed`
    FetchProduct { product_id: ProductId },

    /// Read the remote cart; yields `CartLoaded` or `RemoteFailed`
    LoadCart,

    /// Apply a cart mutation through the reconciler; yields `CartSynced` or `RemoteFailed`
    MutateCart { mutation: CartMutation },

    /// Upsert the client contact record; yields `ClientSaved` or `RemoteFailed`
    SaveClient { email: String },

    /// Persist the new session
    PersistSession,

    /// Send a message back to the user
    Reply(Reply),
}

