//! Runtime for executing shopping sessions
//!
//! Each active user gets an actor: a task draining an mpsc queue, so the
//! actions of one user run strictly in arrival order while different users
//! proceed concurrently. Actors exit after the idle timeout and are
//! respawned on the next action.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;

use crate::catalog::{CatalogClient, StrapiCatalog};
use crate::render::Reply;
use crate::session::SessionStore;
use crate::state_machine::Action;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

/// Type alias for the production manager with concrete implementations
pub type ProductionManager = SessionManager<Arc<dyn SessionStore>, Arc<StrapiCatalog>>;

/// Queued actions per user before senders wait
const QUEUE_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Session worker for user {0} stopped before replying")]
    WorkerGone(String),
}

/// Entry point for inbound actions
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, user_id: &str, action: Action) -> Result<Vec<Reply>, DispatchError>;
}

struct Request {
    action: Action,
    reply_tx: oneshot::Sender<Vec<Reply>>,
}

/// Handle to a user's actor
struct SessionHandle {
    tx: mpsc::Sender<Request>,
    task: JoinHandle<()>,
}

/// Manager for all per-user session actors
pub struct SessionManager<S, C>
where
    S: SessionStore + 'static,
    C: CatalogClient + Clone + 'static,
{
    runtime: Arc<SessionRuntime<S, C>>,
    actors: RwLock<HashMap<String, SessionHandle>>,
    idle_timeout: Duration,
}

impl<S, C> SessionManager<S, C>
where
    S: SessionStore + 'static,
    C: CatalogClient + Clone + 'static,
{
    pub fn new(runtime: SessionRuntime<S, C>, idle_timeout: Duration) -> Self {
        Self {
            runtime: Arc::new(runtime),
            actors: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Sender for the user's actor, spawning one if none is accepting
    async fn get_or_create(&self, user_id: &str) -> mpsc::Sender<Request> {
        // Check if already running
        {
            let actors = self.actors.read().await;
            if let Some(handle) = actors.get(user_id).filter(|h| !h.tx.is_closed()) {
                return handle.tx.clone();
            }
        }

        let mut actors = self.actors.write().await;
        if let Some(handle) = actors.get(user_id).filter(|h| !h.tx.is_closed()) {
            return handle.tx.clone();
        }

        // The replacement waits for its predecessor to drain, keeping order
        let previous = actors.remove(user_id).map(|h| h.task);
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let task = tokio::spawn(run_actor(
            user_id.to_string(),
            Arc::clone(&self.runtime),
            rx,
            previous,
            self.idle_timeout,
        ));
        tracing::debug!(user_id, "Spawned session actor");
        actors.insert(
            user_id.to_string(),
            SessionHandle {
                tx: tx.clone(),
                task,
            },
        );
        tx
    }

    /// Drop finished actors and expired sessions
    pub async fn sweep(&self) {
        let reaped = {
            let mut actors = self.actors.write().await;
            let before = actors.len();
            actors.retain(|_, h| !(h.tx.is_closed() && h.task.is_finished()));
            before - actors.len()
        };
        match self.runtime.store().purge_expired().await {
            Ok(purged) if purged > 0 || reaped > 0 => {
                let active = self.active_users().await;
                tracing::info!(purged, reaped, active, "Swept idle sessions");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to purge expired sessions"),
        }
    }

    /// Number of live actors
    pub async fn active_users(&self) -> usize {
        self.actors
            .read()
            .await
            .values()
            .filter(|h| !h.tx.is_closed())
            .count()
    }
}

#[async_trait]
impl<S, C> Dispatcher for SessionManager<S, C>
where
    S: SessionStore + 'static,
    C: CatalogClient + Clone + 'static,
{
    async fn dispatch(&self, user_id: &str, action: Action) -> Result<Vec<Reply>, DispatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let mut request = Request { action, reply_tx };

        // An actor can close between lookup and send; retry once on a fresh one
        for _ in 0..2 {
            let tx = self.get_or_create(user_id).await;
            match tx.send(request).await {
                Ok(()) => {
                    return reply_rx
                        .await
                        .map_err(|_| DispatchError::WorkerGone(user_id.to_string()));
                }
                Err(mpsc::error::SendError(returned)) => request = returned,
            }
        }
        Err(DispatchError::WorkerGone(user_id.to_string()))
    }
}

async fn run_actor<S, C>(
    user_id: String,
    runtime: Arc<SessionRuntime<S, C>>,
    mut rx: mpsc::Receiver<Request>,
    previous: Option<JoinHandle<()>>,
    idle_timeout: Duration,
) where
    S: SessionStore + 'static,
    C: CatalogClient + Clone + 'static,
{
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    loop {
        match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(request)) => serve(&runtime, &user_id, request).await,
            Ok(None) => break,
            Err(_) => {
                // Idle: refuse new work, finish what was already queued
                rx.close();
                while let Some(request) = rx.recv().await {
                    serve(&runtime, &user_id, request).await;
                }
                break;
            }
        }
    }

    tracing::debug!(user_id, "Session actor stopped");
}

async fn serve<S, C>(runtime: &SessionRuntime<S, C>, user_id: &str, request: Request)
where
    S: SessionStore,
    C: CatalogClient + Clone,
{
    let replies = runtime.handle(user_id, request.action).await;
    if request.reply_tx.send(replies).is_err() {
        tracing::debug!(user_id, "Caller went away before the reply");
    }
}
