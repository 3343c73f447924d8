//! Events that drive the session state machine

use crate::cart::CartSnapshot;
use crate::catalog::{CatalogError, ProductDetail, ProductId, ProductPage};
use serde::Deserialize;
use thiserror::Error;

/// A normalized user intent delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Show the listing; `page` defaults to the first page
    Start { page: Option<u32> },
    SelectProduct { product_id: ProductId },
    Back,
    AddToCart,
    ViewCart,
    RemoveLine { product_id: ProductId },
    Checkout,
    Text { text: String },
    Cancel,
}

/// Optional payload accompanying an action kind
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionPayload {
    pub product_id: Option<ProductId>,
    pub page: Option<u32>,
    pub text: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionParseError {
    #[error("Unknown action kind: {0}")]
    UnknownKind(String),
    #[error("Action `{kind}` requires `{field}` in the payload")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("Malformed callback data: {0}")]
    BadCallback(String),
}

impl Action {
    /// Build an action from its kind name and payload
    pub fn from_kind(kind: &str, payload: ActionPayload) -> Result<Self, ActionParseError> {
        let action = match kind {
            "start" => Action::Start { page: payload.page },
            "select_product" => Action::SelectProduct {
                product_id: payload.product_id.ok_or(ActionParseError::MissingField {
                    kind: "select_product",
                    field: "product_id",
                })?,
            },
            "back" => Action::Back,
            "add_to_cart" => Action::AddToCart,
            "view_cart" => Action::ViewCart,
            "remove_line" => Action::RemoveLine {
                product_id: payload.product_id.ok_or(ActionParseError::MissingField {
                    kind: "remove_line",
                    field: "product_id",
                })?,
            },
            "checkout" => Action::Checkout,
            "text" => Action::Text {
                text: payload.text.ok_or(ActionParseError::MissingField {
                    kind: "text",
                    field: "text",
                })?,
            },
            "cancel" => Action::Cancel,
            other => return Err(ActionParseError::UnknownKind(other.to_string())),
        };
        Ok(action)
    }

    /// Parse the id carried by a rendered choice button
    pub fn from_callback(data: &str) -> Result<Self, ActionParseError> {
        let bad = || ActionParseError::BadCallback(data.to_string());
        let (name, arg) = match data.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (data, None),
        };
        let action = match (name, arg) {
            ("start", None) => Action::Start { page: None },
            ("start", Some(page)) => Action::Start {
                page: Some(page.parse().map_err(|_| bad())?),
            },
            ("product", Some(id)) => Action::SelectProduct {
                product_id: id.parse().map_err(|_| bad())?,
            },
            ("back", None) => Action::Back,
            ("addcart", None) => Action::AddToCart,
            ("mycart", None) => Action::ViewCart,
            ("cart_remove", Some(id)) => Action::RemoveLine {
                product_id: id.parse().map_err(|_| bad())?,
            },
            ("checkout", None) => Action::Checkout,
            ("cancel", None) => Action::Cancel,
            _ => return Err(bad()),
        };
        Ok(action)
    }

    /// Id to put on a choice button that triggers this action
    pub fn callback_id(&self) -> String {
        match self {
            Action::Start { page: None } => "start".to_string(),
            Action::Start { page: Some(page) } => format!("start:{page}"),
            Action::SelectProduct { product_id } => format!("product:{product_id}"),
            Action::Back => "back".to_string(),
            Action::AddToCart => "addcart".to_string(),
            Action::ViewCart => "mycart".to_string(),
            Action::RemoveLine { product_id } => format!("cart_remove:{product_id}"),
            Action::Checkout => "checkout".to_string(),
            Action::Text { .. } => String::new(),
            Action::Cancel => "cancel".to_string(),
        }
    }

    /// Kind name, as used on the wire and in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Start { .. } => "start",
            Action::SelectProduct { .. } => "select_product",
            Action::Back => "back",
            Action::AddToCart => "add_to_cart",
            Action::ViewCart => "view_cart",
            Action::RemoveLine { .. } => "remove_line",
            Action::Checkout => "checkout",
            Action::Text { .. } => "text",
            Action::Cancel => "cancel",
        }
    }
}

/// Remote operation whose outcome is being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    ListProducts,
    GetProduct,
    LoadCart,
    MutateCart,
    SaveClient,
}

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// Inbound user action
    Action(Action),

    // Outcomes of effects executed by the runtime
    CatalogLoaded {
        page: ProductPage,
    },
    ProductLoaded {
        product: ProductDetail,
    },
    /// A cart mutation was confirmed by the remote side
    CartSynced {
        snapshot: CartSnapshot,
    },
    CartLoaded {
        snapshot: CartSnapshot,
    },
    ClientSaved {
        email: String,
    },
    RemoteFailed {
        op: RemoteOp,
        error: CatalogError,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Action(action) => action.kind(),
            Event::CatalogLoaded { .. } => "catalog_loaded",
            Event::ProductLoaded { .. } => "product_loaded",
            Event::CartSynced { .. } => "cart_synced",
            Event::CartLoaded { .. } => "cart_loaded",
            Event::ClientSaved { .. } => "client_saved",
            Event::RemoteFailed { .. } => "remote_failed",
        }
    }
}
