//! Session runtime executor
//!
//! Runs one action for one user to completion: load the session, drive the
//! pure transition function, execute the effects it asks for and feed remote
//! outcomes back in as events.

use crate::cart::{CartMutation, CartReconciler};
use crate::catalog::{CatalogClient, CatalogError};
use crate::render::{self, Reply};
use crate::session::SessionStore;
use crate::state_machine::{transition, Action, Effect, Event, RemoteOp, Session, TransitionError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Executes actions against a session store and a remote catalog.
///
/// Holds no per-user state: callers serialize actions of one user.
pub struct SessionRuntime<S, C>
where
    S: SessionStore,
    C: CatalogClient + Clone,
{
    store: S,
    catalog: C,
    reconciler: Arc<CartReconciler<C>>,
    ttl: Duration,
}

impl<S, C> SessionRuntime<S, C>
where
    S: SessionStore,
    C: CatalogClient + Clone,
{
    pub fn new(store: S, catalog: C, ttl: Duration) -> Self {
        let reconciler = Arc::new(CartReconciler::new(catalog.clone()));
        Self {
            store,
            catalog,
            reconciler,
            ttl,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process one inbound action, returning the replies for the user.
    /// Never fails: every error becomes a reply.
    pub async fn handle(&self, user_id: &str, action: Action) -> Vec<Reply> {
        let span = tracing::info_span!("action", user_id, action = action.kind());
        self.process(user_id, action).instrument(span).await
    }

    async fn process(&self, user_id: &str, action: Action) -> Vec<Reply> {
        let mut session = match self.store.get(user_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::debug!("Starting fresh session");
                Session::new(user_id)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load session");
                return vec![render::internal_error()];
            }
        };

        let mut replies = Vec::new();
        let mut persisted = false;

        // Process events in a loop to handle chained effects
        let mut events_to_process = vec![Event::Action(action)];

        while let Some(event) = events_to_process.pop() {
            let event_name = event.name();
            let result = match transition(&session, event) {
                Ok(result) => result,
                Err(e) => {
                    tracing::info!(state = %session.state, event = event_name, reason = %e, "Transition rejected");
                    replies.push(rejection_reply(&e));
                    continue;
                }
            };

            if result.session.state != session.state {
                tracing::info!(
                    from = %session.state,
                    to = %result.session.state,
                    event = event_name,
                    "State transition"
                );
            }
            session = result.session;

            for effect in result.effects {
                match effect {
                    Effect::PersistSession => {
                        session.updated_at = Utc::now();
                        persisted |= self.persist(&session).await;
                    }
                    Effect::Reply(reply) => replies.push(reply),
                    remote => {
                        if let Some(outcome) = self.execute_remote(user_id, remote).await {
                            events_to_process.push(outcome);
                        }
                    }
                }
            }
        }

        // Every processed action refreshes the idle expiry
        if !persisted {
            session.updated_at = Utc::now();
            self.persist(&session).await;
        }

        replies
    }

    async fn persist(&self, session: &Session) -> bool {
        match self.store.put(&session.user_id, session, self.ttl).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, state = %session.state, "Failed to persist session");
                false
            }
        }
    }

    /// Execute a remote effect, producing the outcome event
    async fn execute_remote(&self, user_id: &str, effect: Effect) -> Option<Event> {
        let started = std::time::Instant::now();
        let (op, outcome) = match effect {
            Effect::FetchCatalog { page } => (
                RemoteOp::ListProducts,
                self.catalog
                    .list_products(page)
                    .await
                    .map(|page| Event::CatalogLoaded { page }),
            ),
            Effect::FetchProduct { product_id } => (
                RemoteOp::GetProduct,
                self.catalog
                    .get_product(product_id)
                    .await
                    .and_then(|found| {
                        found
                            .map(|product| Event::ProductLoaded { product })
                            .ok_or_else(|| {
                                CatalogError::not_found(format!("Product {product_id} not found"))
                            })
                    }),
            ),
            Effect::LoadCart => (
                RemoteOp::LoadCart,
                self.reconciler
                    .load(user_id)
                    .await
                    .map(|snapshot| Event::CartLoaded { snapshot }),
            ),
            Effect::MutateCart { mutation } => {
                let synced = match mutation {
                    CartMutation::Add { product_id, delta } => {
                        self.reconciler.add(user_id, product_id, delta).await
                    }
                    CartMutation::Remove { product_id } => {
                        self.reconciler.remove(user_id, product_id).await
                    }
                };
                (
                    RemoteOp::MutateCart,
                    synced.map(|snapshot| Event::CartSynced { snapshot }),
                )
            }
            Effect::SaveClient { email } => (
                RemoteOp::SaveClient,
                self.catalog
                    .upsert_client(user_id, &email)
                    .await
                    .map(|client| Event::ClientSaved {
                        email: client.email,
                    }),
            ),
            Effect::PersistSession | Effect::Reply(_) => return None,
        };

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Some(match outcome {
            Ok(event) => {
                tracing::debug!(?op, duration_ms, "Remote effect completed");
                event
            }
            Err(error) => {
                tracing::warn!(?op, duration_ms, kind = ?error.kind, error = %error, "Remote effect failed");
                Event::RemoteFailed { op, error }
            }
        })
    }
}

fn rejection_reply(error: &TransitionError) -> Reply {
    match error {
        TransitionError::Unsupported { .. } => render::unsupported(),
        TransitionError::InvalidEmail => render::invalid_email(),
    }
}
