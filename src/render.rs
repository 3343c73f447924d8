//! Outbound reply rendering
//!
//! Replies are transport-neutral: text, rows of choices whose ids parse back
//! into actions, and an optional image reference.

use crate::cart::CartSnapshot;
use crate::catalog::{CatalogError, CatalogErrorKind, ProductDetail, ProductId, ProductPage};
use crate::state_machine::Action;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Products per row in the listing keyboard
const MENU_ROW_WIDTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub id: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, action: &Action) -> Self {
        Self {
            label: label.into(),
            id: action.callback_id(),
        }
    }
}

/// A message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Vec<Choice>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
            image: None,
        }
    }

    pub fn with_row(mut self, row: Vec<Choice>) -> Self {
        if !row.is_empty() {
            self.choices.push(row);
        }
        self
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }
}

fn menu_button() -> Choice {
    Choice::new("Menu", &Action::Start { page: None })
}

fn cart_button() -> Choice {
    Choice::new("My cart", &Action::ViewCart)
}

pub fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) => format!("{p:.2}"),
        None => "n/a".to_string(),
    }
}

/// Product listing with paging and a cart shortcut
pub fn menu(page: &ProductPage) -> Reply {
    let text = if page.products.is_empty() {
        "No products available yet.".to_string()
    } else if page.page_count > 1 {
        format!("Choose a product (page {} of {}):", page.page, page.page_count)
    } else {
        "Choose a product:".to_string()
    };

    let mut reply = Reply::text(text);
    for chunk in page.products.chunks(MENU_ROW_WIDTH) {
        reply = reply.with_row(
            chunk
                .iter()
                .map(|p| Choice::new(p.title.clone(), &Action::SelectProduct { product_id: p.id }))
                .collect(),
        );
    }

    let mut paging = Vec::new();
    if page.has_prev() {
        paging.push(Choice::new(
            "« Prev",
            &Action::Start {
                page: Some(page.page - 1),
            },
        ));
    }
    if page.has_next() {
        paging.push(Choice::new(
            "Next »",
            &Action::Start {
                page: Some(page.page + 1),
            },
        ));
    }
    reply.with_row(paging).with_row(vec![cart_button()])
}

pub fn product_card(product: &ProductDetail) -> Reply {
    let summary = &product.summary;
    let mut text = format!("{}\nPrice: {}", summary.title, format_price(summary.price));
    if let Some(description) = product.description.as_deref().filter(|d| !d.trim().is_empty()) {
        let _ = write!(text, "\n\n{}", description.trim());
    }
    Reply::text(text)
        .with_image(product.image_url.clone())
        .with_row(vec![
            Choice::new("Add to cart", &Action::AddToCart),
            cart_button(),
        ])
        .with_row(vec![Choice::new("« Back", &Action::Back)])
}

pub fn added_to_cart(snapshot: &CartSnapshot, product_id: ProductId) -> Reply {
    let title = product_title(snapshot, product_id);
    Reply::text(format!(
        "Added {title} to your cart (quantity: {}).",
        snapshot.quantity_of(product_id)
    ))
    .with_row(vec![
        Choice::new("Add one more", &Action::AddToCart),
        cart_button(),
    ])
    .with_row(vec![Choice::new("« Back", &Action::Back)])
}

/// Cart listing. `stale` marks a local snapshot shown because the remote
/// cart could not be loaded.
pub fn cart(snapshot: &CartSnapshot, stale: bool) -> Reply {
    let mut text = String::new();
    if stale {
        text.push_str("Could not refresh your cart; showing the last known contents.\n\n");
    }

    if snapshot.is_empty() {
        text.push_str("Your cart is empty.");
        return Reply::text(text).with_row(vec![menu_button()]);
    }

    text.push_str("Your cart:");
    let mut total = Some(0.0);
    let mut reply_rows = Vec::new();
    for line in &snapshot.lines {
        let price = snapshot.product(line.product_id).and_then(|p| p.price);
        let _ = write!(
            text,
            "\n{} x {} ({})",
            product_title(snapshot, line.product_id),
            line.quantity,
            format_price(price)
        );
        total = match (total, price) {
            (Some(t), Some(p)) => Some(t + p * f64::from(line.quantity)),
            _ => None,
        };
        reply_rows.push(vec![Choice::new(
            format!("Remove {}", product_title(snapshot, line.product_id)),
            &Action::RemoveLine {
                product_id: line.product_id,
            },
        )]);
    }
    if let Some(total) = total {
        let _ = write!(text, "\nTotal: {total:.2}");
    }

    let mut reply = Reply::text(text);
    for row in reply_rows {
        reply = reply.with_row(row);
    }
    reply.with_row(vec![Choice::new("Checkout", &Action::Checkout), menu_button()])
}

fn product_title(snapshot: &CartSnapshot, product_id: ProductId) -> String {
    snapshot
        .product(product_id)
        .map(|p| p.title.clone())
        .unwrap_or_else(|| format!("Product #{product_id}"))
}

pub fn email_prompt() -> Reply {
    Reply::text("Please send your email address to place the order.")
        .with_row(vec![Choice::new("Cancel", &Action::Cancel)])
}

pub fn invalid_email() -> Reply {
    Reply::text("That does not look like an email address. Please try again.")
        .with_row(vec![Choice::new("Cancel", &Action::Cancel)])
}

pub fn checkout_complete(email: &str) -> Reply {
    Reply::text(format!(
        "Thank you! We will contact you at {email} to confirm the order."
    ))
    .with_row(vec![menu_button()])
}

pub fn cancelled() -> Reply {
    Reply::text("Cancelled.").with_row(vec![menu_button(), cart_button()])
}

pub fn empty_cart_checkout() -> Reply {
    Reply::text("Your cart is empty.").with_row(vec![menu_button()])
}

pub fn unsupported() -> Reply {
    Reply::text("This action is not available now.").with_row(vec![menu_button()])
}

pub fn fetch_failed(error: &CatalogError) -> Reply {
    let text = if error.kind == CatalogErrorKind::NotFound {
        "This product is no longer available."
    } else {
        "The store is not responding right now. Please try again."
    };
    Reply::text(text).with_row(vec![menu_button()])
}

pub fn cart_write_failed() -> Reply {
    Reply::text("Your cart could not be updated; the change did not take effect. Please try again.")
        .with_row(vec![cart_button(), menu_button()])
}

pub fn save_failed() -> Reply {
    Reply::text("Could not save your email. Please send it again.")
        .with_row(vec![Choice::new("Cancel", &Action::Cancel)])
}

pub fn internal_error() -> Reply {
    Reply::text("Something went wrong. Please try again.").with_row(vec![menu_button()])
}
