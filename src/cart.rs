//! Cart lines and reconciliation against the remote cart
//!
//! The session keeps a snapshot of the cart; the remote catalog owns the
//! real record. All writes go through [`CartReconciler`], and the snapshot
//! is only ever replaced with contents the remote side has confirmed.

mod reconciler;

pub use reconciler::CartReconciler;

use crate::catalog::{ProductId, ProductSummary, RemoteCart};
use serde::{Deserialize, Serialize};

/// One product in the cart. A stored line always has `quantity > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A local intent to change the cart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartMutation {
    Add { product_id: ProductId, delta: u32 },
    Remove { product_id: ProductId },
}

/// Cart contents confirmed by the remote side, plus whatever product data
/// came back with them for display
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    pub products: Vec<ProductSummary>,
}

impl CartSnapshot {
    pub fn from_remote(cart: &RemoteCart) -> Self {
        Self {
            lines: cart.lines(),
            products: cart
                .items
                .iter()
                .filter_map(|item| item.product.clone())
                .collect(),
        }
    }

    /// Snapshot built from bare lines, without display data
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        Self {
            lines,
            products: Vec::new(),
        }
    }

    pub fn product(&self, id: ProductId) -> Option<&ProductSummary> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn quantity_of(&self, id: ProductId) -> u32 {
        quantity_of(&self.lines, id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub fn quantity_of(lines: &[CartLine], id: ProductId) -> u32 {
    lines
        .iter()
        .filter(|l| l.product_id == id)
        .map(|l| l.quantity)
        .sum()
}

/// Apply a mutation to a list of lines.
///
/// Adding an existing product increments its line; removing drops it.
/// Order of the remaining lines is preserved and no zero line is produced.
pub fn apply_mutation(lines: &[CartLine], mutation: CartMutation) -> Vec<CartLine> {
    let mut next = normalize(lines);
    match mutation {
        CartMutation::Add { product_id, delta } => {
            if delta == 0 {
                return next;
            }
            match next.iter_mut().find(|l| l.product_id == product_id) {
                Some(line) => line.quantity = line.quantity.saturating_add(delta),
                None => next.push(CartLine::new(product_id, delta)),
            }
        }
        CartMutation::Remove { product_id } => next.retain(|l| l.product_id != product_id),
    }
    next
}

/// Fold `other` into `lines`, keeping the larger quantity of shared
/// products. Folding the same lines again changes nothing.
pub fn fold_lines(lines: &mut Vec<CartLine>, other: &[CartLine]) {
    *lines = normalize(lines);
    for line in normalize(other) {
        match lines.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.max(line.quantity),
            None => lines.push(line),
        }
    }
}

/// Collapse repeated products into one line each and drop zero quantities
fn normalize(lines: &[CartLine]) -> Vec<CartLine> {
    let mut out: Vec<CartLine> = Vec::with_capacity(lines.len());
    for line in lines.iter().filter(|l| l.quantity > 0) {
        match out.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => out.push(*line),
        }
    }
    out
}
