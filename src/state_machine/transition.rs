//! Pure state transition function
//!
//! Given a session and an event, computes the next session and the effects
//! the runtime must execute. Remote calls are never made here: the runtime
//! executes the remote effect and feeds the outcome back in as an event, so
//! the same inputs always produce the same outputs.

use super::{Action, Effect, Event, RemoteOp, Session, SessionContext, ShopState};
use crate::cart::{CartMutation, CartSnapshot};
use crate::render;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub session: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Action `{action}` is not available in state {state}")]
    Unsupported {
        state: ShopState,
        action: &'static str,
    },
    #[error("Not a valid email address")]
    InvalidEmail,
}

/// Pure transition function
pub fn transition(session: &Session, event: Event) -> Result<TransitionResult, TransitionError> {
    match event {
        Event::Action(action) => on_action(session, action),
        outcome => Ok(on_outcome(session, outcome)),
    }
}

fn on_action(session: &Session, action: Action) -> Result<TransitionResult, TransitionError> {
    let unchanged = || TransitionResult::new(session.clone());

    match (session.state, action) {
        // ============================================================
        // Accepted in every state
        // ============================================================
        (_, Action::Start { page }) => Ok(unchanged().with_effect(Effect::FetchCatalog {
            page: page.unwrap_or(1).max(1),
        })),

        (_, Action::ViewCart) => Ok(unchanged().with_effect(Effect::LoadCart)),

        (_, Action::Cancel) => {
            let mut next = session.clone();
            next.state = ShopState::Menu;
            next.context = SessionContext::default();
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::Reply(render::cancelled())))
        }

        // ============================================================
        // Browsing
        // ============================================================
        (ShopState::Menu, Action::SelectProduct { product_id }) => {
            Ok(unchanged().with_effect(Effect::FetchProduct { product_id }))
        }

        (ShopState::ProductDetail, Action::Back) => {
            let mut next = session.clone();
            next.state = ShopState::Menu;
            next.context.selected_product = None;
            let page = next.context.menu_page;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::FetchCatalog { page }))
        }

        // ============================================================
        // Cart
        // ============================================================
        (ShopState::ProductDetail, Action::AddToCart) => match session.context.selected_product {
            Some(product_id) => Ok(unchanged().with_effect(Effect::MutateCart {
                mutation: CartMutation::Add {
                    product_id,
                    delta: 1,
                },
            })),
            None => Err(unsupported(session, "add_to_cart")),
        },

        (ShopState::CartView, Action::RemoveLine { product_id }) => {
            Ok(unchanged().with_effect(Effect::MutateCart {
                mutation: CartMutation::Remove { product_id },
            }))
        }

        // ============================================================
        // Checkout
        // ============================================================
        (ShopState::CartView, Action::Checkout) => {
            if session.cart.is_empty() {
                return Ok(unchanged().with_effect(Effect::Reply(render::empty_cart_checkout())));
            }
            let mut next = session.clone();
            next.state = ShopState::AwaitingEmail;
            next.context.selected_product = None;
            next.context.pending_email = None;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::Reply(render::email_prompt())))
        }

        (ShopState::AwaitingEmail, Action::Text { text }) => {
            let email = text.trim();
            if !is_valid_email(email) {
                return Err(TransitionError::InvalidEmail);
            }
            let mut next = session.clone();
            next.context.pending_email = Some(email.to_string());
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::SaveClient {
                    email: email.to_string(),
                }))
        }

        (_, action) => Err(unsupported(session, action.kind())),
    }
}

fn on_outcome(session: &Session, event: Event) -> TransitionResult {
    let mut next = session.clone();

    match event {
        Event::CatalogLoaded { page } => {
            next.state = ShopState::Menu;
            next.context = SessionContext {
                menu_page: page.page.max(1),
                ..SessionContext::default()
            };
            TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::Reply(render::menu(&page)))
        }

        Event::ProductLoaded { product } => {
            next.state = ShopState::ProductDetail;
            next.context.selected_product = Some(product.summary.id);
            next.context.pending_email = None;
            TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::Reply(render::product_card(&product)))
        }

        Event::CartSynced { snapshot } => {
            next.cart = snapshot.lines.clone();
            let reply = match (next.state, next.context.selected_product) {
                (ShopState::ProductDetail, Some(product_id)) => {
                    render::added_to_cart(&snapshot, product_id)
                }
                _ => render::cart(&snapshot, false),
            };
            TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::Reply(reply))
        }

        Event::CartLoaded { snapshot } => {
            next.state = ShopState::CartView;
            next.cart = snapshot.lines.clone();
            next.context.selected_product = None;
            next.context.pending_email = None;
            TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::Reply(render::cart(&snapshot, false)))
        }

        Event::ClientSaved { email } => {
            next.state = ShopState::Menu;
            next.context.pending_email = None;
            next.context.selected_product = None;
            TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::Reply(render::checkout_complete(&email)))
        }

        Event::RemoteFailed { op, error } => match op {
            RemoteOp::ListProducts | RemoteOp::GetProduct => {
                TransitionResult::new(next).with_effect(Effect::Reply(render::fetch_failed(&error)))
            }
            RemoteOp::LoadCart => {
                next.state = ShopState::CartView;
                next.context.selected_product = None;
                next.context.pending_email = None;
                let snapshot = CartSnapshot::from_lines(next.cart.clone());
                TransitionResult::new(next)
                    .with_effect(Effect::PersistSession)
                    .with_effect(Effect::Reply(render::cart(&snapshot, true)))
            }
            RemoteOp::MutateCart => {
                TransitionResult::new(next).with_effect(Effect::Reply(render::cart_write_failed()))
            }
            RemoteOp::SaveClient => {
                next.context.pending_email = None;
                TransitionResult::new(next)
                    .with_effect(Effect::PersistSession)
                    .with_effect(Effect::Reply(render::save_failed()))
            }
        },

        // Routed to on_action by `transition`
        Event::Action(_) => TransitionResult::new(next),
    }
}

fn unsupported(session: &Session, action: &'static str) -> TransitionError {
    TransitionError::Unsupported {
        state: session.state,
        action,
    }
}

/// One `@`, a non-empty local part and a non-empty domain, no whitespace.
/// Callers trim the input first.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}
