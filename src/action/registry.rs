//! Action registry with a load-invoke-unload lifecycle.

use crate::action::handler::{Action, ActionContext, ActionError};
use crate::envelope::{ActionResponse, Params};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// State of an action in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Registered but not loaded.
    Unloaded,
    /// `on_load` in progress.
    Loading,
    /// Loaded and ready to handle requests.
    Ready,
    /// `on_unload` in progress.
    Unloading,
}

struct ActionEntry {
    action: Arc<RwLock<Box<dyn Action>>>,
    state: ActionState,
    context: ActionContext,
    active_invocations: Arc<AtomicUsize>,
}

fn not_found(name: &str) -> ActionError {
    ActionError::not_found(format!("Action '{}' not found", name))
}

/// Registry of hosted actions.
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, ActionEntry>>,
    global_env: HashMap<String, String>,
}

impl ActionRegistry {
    /// Create a new registry.
    pub fn new() -> Self {
        Self::with_env(HashMap::new())
    }

    /// Create a registry whose actions all see the given environment.
    pub fn with_env(env: HashMap<String, String>) -> Self {
        Self {
            actions: RwLock::new(HashMap::new()),
            global_env: env,
        }
    }

    /// Register a new action.
    pub async fn register(
        &self,
        name: impl Into<String>,
        action: Box<dyn Action>,
    ) -> Result<(), ActionError> {
        let name = name.into();
        let mut actions = self.actions.write().await;

        if actions.contains_key(&name) {
            return Err(ActionError::new(format!(
                "Action '{}' is already registered",
                name
            )));
        }

        let mut context = ActionContext::new(&name, "");
        context.env.extend(self.global_env.clone());

        actions.insert(
            name.clone(),
            ActionEntry {
                action: Arc::new(RwLock::new(action)),
                state: ActionState::Unloaded,
                context,
                active_invocations: Arc::new(AtomicUsize::new(0)),
            },
        );
        info!("Registered action: {}", name);
        Ok(())
    }

    /// Load an action.
    ///
    /// Concurrent callers queue on the action's write lock; whoever gets it
    /// first runs `on_load`, the rest find the action `Ready` and return.
    pub async fn load(&self, name: &str) -> Result<(), ActionError> {
        let action = {
            let actions = self.actions.read().await;
            let entry = actions.get(name).ok_or_else(|| not_found(name))?;
            if entry.state == ActionState::Ready {
                return Ok(());
            }
            entry.action.clone()
        };

        let mut action = action.write().await;

        let context = {
            let mut actions = self.actions.write().await;
            let entry = actions.get_mut(name).ok_or_else(|| not_found(name))?;
            if entry.state == ActionState::Ready {
                debug!("Action '{}' was loaded by a concurrent caller", name);
                return Ok(());
            }
            entry.state = ActionState::Loading;
            entry.context.clone()
        };

        let result = action.on_load(&context).await;

        let mut actions = self.actions.write().await;
        if let Some(entry) = actions.get_mut(name) {
            entry.state = if result.is_ok() {
                ActionState::Ready
            } else {
                ActionState::Unloaded
            };
        }

        match result {
            Ok(()) => {
                info!("Loaded action: {}", name);
                Ok(())
            }
            Err(e) => {
                error!("Failed to load action '{}': {}", name, e);
                Err(e)
            }
        }
    }

    /// Unload an action.
    pub async fn unload(&self, name: &str) -> Result<(), ActionError> {
        let mut actions = self.actions.write().await;

        let entry = actions.get_mut(name).ok_or_else(|| not_found(name))?;

        if entry.state == ActionState::Unloaded {
            debug!("Action '{}' is already unloaded", name);
            return Ok(());
        }

        let active = entry.active_invocations.load(Ordering::SeqCst);
        if active > 0 {
            warn!(
                "Action '{}' has {} active invocations, waiting...",
                name, active
            );
        }

        entry.state = ActionState::Unloading;
        let action = entry.action.clone();
        let context = entry.context.clone();
        drop(actions);

        // Waits for in-flight invocations, which hold the read lock.
        if let Err(e) = action.write().await.on_unload(&context).await {
            error!("Error during unload of action '{}': {}", name, e);
        }

        let mut actions = self.actions.write().await;
        if let Some(entry) = actions.get_mut(name) {
            entry.state = ActionState::Unloaded;
        }

        info!("Unloaded action: {}", name);
        Ok(())
    }

    /// Invoke an action, loading it first if needed.
    pub async fn execute(
        &self,
        name: &str,
        params: Params,
        request_id: &str,
    ) -> Result<ActionResponse, ActionError> {
        self.load(name).await?;

        let (action, context, active) = {
            let actions = self.actions.read().await;
            let entry = actions.get(name).ok_or_else(|| not_found(name))?;

            let mut ctx = entry.context.clone();
            ctx.request_id = request_id.to_string();

            (entry.action.clone(), ctx, entry.active_invocations.clone())
        };

        active.fetch_add(1, Ordering::SeqCst);
        let response = action.read().await.invoke(params, &context).await;
        active.fetch_sub(1, Ordering::SeqCst);

        Ok(response)
    }

    /// Get the state of an action.
    pub async fn get_state(&self, name: &str) -> Option<ActionState> {
        let actions = self.actions.read().await;
        actions.get(name).map(|e| e.state)
    }

    /// Number of invocations currently running for an action.
    pub async fn active_invocations(&self, name: &str) -> Option<usize> {
        let actions = self.actions.read().await;
        actions
            .get(name)
            .map(|e| e.active_invocations.load(Ordering::SeqCst))
    }

    /// List all registered actions, sorted by name.
    pub async fn list(&self) -> Vec<(String, ActionState)> {
        let actions = self.actions.read().await;
        let mut listed: Vec<_> = actions
            .iter()
            .map(|(name, entry)| (name.clone(), entry.state))
            .collect();
        listed.sort_by(|a, b| a.0.cmp(&b.0));
        listed
    }

    /// Remove an action, unloading it first.
    pub async fn remove(&self, name: &str) -> Result<(), ActionError> {
        if self.get_state(name).await == Some(ActionState::Ready) {
            self.unload(name).await?;
        }

        let mut actions = self.actions.write().await;
        actions.remove(name).ok_or_else(|| not_found(name))?;

        info!("Removed action: {}", name);
        Ok(())
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
