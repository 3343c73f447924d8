//! Session state types

use crate::cart::CartLine;
use crate::catalog::ProductId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Dialogue State
// ============================================================================

/// Where the user is in the dialogue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShopState {
    /// No dialogue yet, or the previous one expired
    #[default]
    Idle,

    /// Product listing shown
    Menu,

    /// A single product card shown (`context.selected_product` is set)
    ProductDetail,

    /// Cart contents shown
    CartView,

    /// Checkout started, waiting for the user's email
    AwaitingEmail,
}

impl ShopState {
    pub fn as_str(self) -> &'static str {
        match self {
            ShopState::Idle => "idle",
            ShopState::Menu => "menu",
            ShopState::ProductDetail => "product_detail",
            ShopState::CartView => "cart_view",
            ShopState::AwaitingEmail => "awaiting_email",
        }
    }
}

impl fmt::Display for ShopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Session
// ============================================================================

/// Transient per-dialogue fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Product whose card is on screen
    #[serde(default)]
    pub selected_product: Option<ProductId>,
    /// Email submitted at checkout, while it is being saved
    #[serde(default)]
    pub pending_email: Option<String>,
    /// Last listing page shown (1-based)
    #[serde(default = "first_page")]
    pub menu_page: u32,
}

fn first_page() -> u32 {
    1
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            selected_product: None,
            pending_email: None,
            menu_page: first_page(),
        }
    }
}

/// Everything the engine remembers about one user between actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub state: ShopState,
    #[serde(default)]
    pub context: SessionContext,
    /// Last cart contents confirmed by the remote catalog
    #[serde(default)]
    pub cart: Vec<CartLine>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session for a user seen for the first time (or after expiry)
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: ShopState::Idle,
            context: SessionContext::default(),
            cart: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_state(mut self, state: ShopState) -> Self {
        self.state = state;
        self
    }

    /// Same dialogue position: state, context and cart agree
    #[cfg(test)]
    pub fn same_dialogue(&self, other: &Session) -> bool {
        self.state == other.state && self.context == other.context && self.cart == other.cart
    }
}
