//! Property-based tests for the state machine
//!
//! Remote effects are resolved by a small deterministic in-memory world so
//! whole action sequences can be driven through `transition`.

use super::*;
use crate::cart::{apply_mutation, CartLine, CartSnapshot};
use crate::catalog::{CatalogError, ProductDetail, ProductPage, ProductSummary};
use proptest::prelude::*;

const KNOWN_PRODUCTS: i64 = 5;

// ============================================================================
// Test Helpers
// ============================================================================

/// Stand-in for the remote catalog, resolving effects into outcome events
#[derive(Debug, Clone, Default)]
struct World {
    cart: Vec<CartLine>,
    client_email: Option<String>,
}

impl World {
    fn resolve(&mut self, effect: &Effect) -> Option<Event> {
        let event = match effect {
            Effect::FetchCatalog { page } => Event::CatalogLoaded {
                page: ProductPage {
                    products: (1..=KNOWN_PRODUCTS)
                        .map(|id| ProductSummary::new(id, format!("Product {id}"), Some(1.0)))
                        .collect(),
                    page: *page,
                    page_count: 1,
                },
            },
            Effect::FetchProduct { product_id } if (1..=KNOWN_PRODUCTS).contains(product_id) => {
                Event::ProductLoaded {
                    product: ProductDetail {
                        summary: ProductSummary::new(*product_id, "Product", Some(1.0)),
                        description: None,
                        image_url: None,
                    },
                }
            }
            Effect::FetchProduct { .. } => Event::RemoteFailed {
                op: RemoteOp::GetProduct,
                error: CatalogError::not_found("no such product"),
            },
            Effect::LoadCart => Event::CartLoaded {
                snapshot: CartSnapshot::from_lines(self.cart.clone()),
            },
            Effect::MutateCart { mutation } => {
                self.cart = apply_mutation(&self.cart, *mutation);
                Event::CartSynced {
                    snapshot: CartSnapshot::from_lines(self.cart.clone()),
                }
            }
            Effect::SaveClient { email } => {
                self.client_email = Some(email.clone());
                Event::ClientSaved {
                    email: email.clone(),
                }
            }
            Effect::PersistSession | Effect::Reply(_) => return None,
        };
        Some(event)
    }
}

/// Process one action to completion, the way the runtime does
fn drive(session: &Session, action: Action, world: &mut World) -> Session {
    let mut current = session.clone();
    let mut queue = vec![Event::Action(action)];
    while let Some(event) = queue.pop() {
        match transition(&current, event) {
            Ok(result) => {
                current = result.session;
                for effect in &result.effects {
                    if let Some(outcome) = world.resolve(effect) {
                        queue.push(outcome);
                    }
                }
            }
            Err(_) => { /* rejected actions leave the session alone */ }
        }
    }
    current
}

fn drive_all(actions: &[Action], world: &mut World) -> Session {
    actions
        .iter()
        .fold(Session::new("42"), |session, action| {
            drive(&session, action.clone(), world)
        })
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_state() -> impl Strategy<Value = ShopState> {
    prop_oneof![
        Just(ShopState::Idle),
        Just(ShopState::Menu),
        Just(ShopState::ProductDetail),
        Just(ShopState::CartView),
        Just(ShopState::AwaitingEmail),
    ]
}

fn arb_lines() -> impl Strategy<Value = Vec<CartLine>> {
    proptest::collection::vec((1..=KNOWN_PRODUCTS, 1u32..4), 0..4).prop_map(|pairs| {
        pairs
            .into_iter()
            .fold(Vec::new(), |lines, (product_id, delta)| {
                apply_mutation(
                    &lines,
                    crate::cart::CartMutation::Add { product_id, delta },
                )
            })
    })
}

fn arb_session() -> impl Strategy<Value = Session> {
    (
        arb_state(),
        proptest::option::of(1..=KNOWN_PRODUCTS),
        1u32..4,
        arb_lines(),
    )
        .prop_map(|(state, selected, menu_page, cart)| {
            let mut session = Session::new("42").with_state(state);
            session.context.selected_product = selected;
            session.context.menu_page = menu_page;
            session.cart = cart;
            session
        })
}

fn arb_email_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}@[a-z]{1,8}\\.[a-z]{2,3}",
        " [a-z]{1,8}@[a-z]{1,8} ",
        "[a-z@ ]{0,12}",
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        proptest::option::of(1u32..4).prop_map(|page| Action::Start { page }),
        (1..=KNOWN_PRODUCTS + 1).prop_map(|product_id| Action::SelectProduct { product_id }),
        Just(Action::Back),
        Just(Action::AddToCart),
        Just(Action::ViewCart),
        (1..=KNOWN_PRODUCTS).prop_map(|product_id| Action::RemoveLine { product_id }),
        Just(Action::Checkout),
        arb_email_text().prop_map(|text| Action::Text { text }),
        Just(Action::Cancel),
    ]
}

fn arb_outcome() -> impl Strategy<Value = Event> {
    prop_oneof![
        (1u32..4).prop_map(|page| Event::CatalogLoaded {
            page: ProductPage {
                products: vec![],
                page,
                page_count: 3,
            }
        }),
        (1..=KNOWN_PRODUCTS).prop_map(|id| Event::ProductLoaded {
            product: ProductDetail {
                summary: ProductSummary::new(id, "Product", None),
                description: None,
                image_url: None,
            }
        }),
        arb_lines().prop_map(|lines| Event::CartSynced {
            snapshot: CartSnapshot::from_lines(lines)
        }),
        arb_lines().prop_map(|lines| Event::CartLoaded {
            snapshot: CartSnapshot::from_lines(lines)
        }),
        Just(Event::ClientSaved {
            email: "user@example.com".to_string()
        }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![arb_action().prop_map(Event::Action), arb_outcome()]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Same inputs, same outputs
    #[test]
    fn prop_transition_is_deterministic(session in arb_session(), event in arb_event()) {
        let first = transition(&session, event.clone());
        let second = transition(&session, event);
        match (first, second) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.session, b.session);
                prop_assert_eq!(a.effects, b.effects);
            }
            (Err(a), Err(b)) => prop_assert_eq!(a, b),
            (a, b) => prop_assert!(false, "diverged: {:?} vs {:?}", a, b),
        }
    }

    // A state change is always persisted
    #[test]
    fn prop_state_changes_persist(session in arb_session(), event in arb_event()) {
        if let Ok(result) = transition(&session, event) {
            if !result.session.same_dialogue(&session) {
                prop_assert!(
                    result.effects.contains(&Effect::PersistSession),
                    "changed session without persisting: {:?}",
                    result.effects
                );
            }
        }
    }

    // Rejected actions have no effect at all
    #[test]
    fn prop_rejection_never_changes_session(session in arb_session(), action in arb_action()) {
        let mut world = World { cart: session.cart.clone(), client_email: None };
        if transition(&session, Event::Action(action.clone())).is_err() {
            prop_assert_eq!(drive(&session, action, &mut world), session);
        }
    }

    #[test]
    fn prop_cancel_always_reaches_menu(session in arb_session()) {
        let result = transition(&session, Event::Action(Action::Cancel));
        prop_assert!(result.is_ok());
        let result = result.unwrap();
        prop_assert_eq!(result.session.state, ShopState::Menu);
        prop_assert_eq!(result.session.context, SessionContext::default());
        prop_assert_eq!(result.session.cart, session.cart);
    }

    #[test]
    fn prop_start_only_fetches(session in arb_session(), page in proptest::option::of(0u32..10)) {
        let result = transition(&session, Event::Action(Action::Start { page })).unwrap();
        prop_assert_eq!(&result.session, &session);
        prop_assert_eq!(
            result.effects,
            vec![Effect::FetchCatalog { page: page.unwrap_or(1).max(1) }]
        );
    }

    // A failed fetch never advances the dialogue
    #[test]
    fn prop_fetch_failure_leaves_session(session in arb_session(), list in any::<bool>()) {
        let op = if list { RemoteOp::ListProducts } else { RemoteOp::GetProduct };
        let result = transition(
            &session,
            Event::RemoteFailed { op, error: CatalogError::timeout("timed out") },
        )
        .unwrap();
        prop_assert_eq!(result.session, session);
        prop_assert!(!result.effects.contains(&Effect::PersistSession));
    }

    // The cart snapshot is whatever the remote side confirmed
    #[test]
    fn prop_cart_synced_overwrites_snapshot(session in arb_session(), lines in arb_lines()) {
        let result = transition(
            &session,
            Event::CartSynced { snapshot: CartSnapshot::from_lines(lines.clone()) },
        )
        .unwrap();
        prop_assert_eq!(result.session.cart, lines);
        prop_assert_eq!(result.session.state, session.state);
    }

    #[test]
    fn prop_email_acceptance_matches_validator(text in arb_email_text()) {
        let session = Session::new("42").with_state(ShopState::AwaitingEmail);
        let result = transition(&session, Event::Action(Action::Text { text: text.clone() }));
        prop_assert_eq!(result.is_ok(), is_valid_email(text.trim()));
    }

    // Replaying an action lands on the same dialogue position as delivering
    // it once. Adds are the exception for the cart: each delivery increments.
    #[test]
    fn prop_duplicate_delivery_is_safe(
        prefix in proptest::collection::vec(arb_action(), 0..8),
        action in arb_action(),
    ) {
        let mut once_world = World::default();
        let base = drive_all(&prefix, &mut once_world);
        let mut twice_world = once_world.clone();

        let once = drive(&base, action.clone(), &mut once_world);
        let first = drive(&base, action.clone(), &mut twice_world);
        let twice = drive(&first, action.clone(), &mut twice_world);

        prop_assert_eq!(once.state, twice.state);
        prop_assert_eq!(&once.context, &twice.context);
        if action != Action::AddToCart {
            prop_assert_eq!(&once.cart, &twice.cart);
            prop_assert_eq!(&once_world.cart, &twice_world.cart);
            prop_assert_eq!(&once_world.client_email, &twice_world.client_email);
        }
    }

    // Two adds of the same product give one line with quantity 2
    #[test]
    fn prop_double_add_increments_one_line(product_id in 1..=KNOWN_PRODUCTS) {
        let mut world = World::default();
        let session = drive_all(
            &[
                Action::Start { page: None },
                Action::SelectProduct { product_id },
                Action::AddToCart,
                Action::AddToCart,
            ],
            &mut world,
        );
        prop_assert_eq!(session.state, ShopState::ProductDetail);
        prop_assert_eq!(session.cart, vec![CartLine::new(product_id, 2)]);
        prop_assert_eq!(world.cart, vec![CartLine::new(product_id, 2)]);
    }
}
