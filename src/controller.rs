use crate::config::StoreConfig;
use crate::device_types::DeviceDescriptor;
use crate::ports;
use crate::registry::{DeviceRegistry, RegistryError};

use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub enum SubscribeError {
    PermissionDenied,
}

impl std::fmt::Display for SubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscribeError::PermissionDenied => f.write_str("notification permission denied"),
        }
    }
}

struct PendingRegistration {
    user_id: String,
    token: String,
}

enum IdentityOutcome {
    Register(PendingRegistration),
    UnexpectedSignOut,
    Ignored,
}

/// Latest known identity/token pair while subscribed. Every transition is a
/// pure method so the reconciliation logic is testable without signals or a
/// store; callers act on the returned registration request.
#[derive(Debug, Default)]
pub struct SubscriptionState {
    subscribed: bool,
    current_user: Option<String>,
    current_token: Option<String>,
}

impl SubscriptionState {
    fn begin(&mut self, identity: Option<String>) {
        self.subscribed = true;
        self.current_user = identity;
    }

    fn clear(&mut self) {
        self.subscribed = false;
        self.current_user = None;
        self.current_token = None;
    }

    /// Initial token snapshot after subscribing.
    fn token_fetched(&mut self, token: String) -> Option<PendingRegistration> {
        if !self.subscribed {
            return None;
        }
        self.current_token = Some(token.clone());
        self.current_user
            .as_ref()
            .map(|user_id| PendingRegistration {
                user_id: user_id.clone(),
                token,
            })
    }

    /// Token rotation delivery. The cached token is updated even without a
    /// cached identity, so a later identity-appearing event registers the
    /// freshest token.
    fn token_refreshed(&mut self, token: String) -> Option<PendingRegistration> {
        if !self.subscribed {
            return None;
        }
        let changed = self.current_token.as_deref() != Some(token.as_str());
        let pending = match &self.current_user {
            Some(user_id) if changed => Some(PendingRegistration {
                user_id: user_id.clone(),
                token: token.clone(),
            }),
            _ => None,
        };
        self.current_token = Some(token);
        pending
    }

    fn identity_changed(&mut self, identity: Option<String>) -> IdentityOutcome {
        if !self.subscribed {
            return IdentityOutcome::Ignored;
        }
        match (identity, &self.current_user) {
            (Some(user_id), None) => {
                self.current_user = Some(user_id.clone());
                match &self.current_token {
                    Some(token) => IdentityOutcome::Register(PendingRegistration {
                        user_id,
                        token: token.clone(),
                    }),
                    None => IdentityOutcome::Ignored,
                }
            }
            (None, Some(_)) => {
                self.current_user = None;
                IdentityOutcome::UnexpectedSignOut
            }
            _ => IdentityOutcome::Ignored,
        }
    }

    /// Takes the user id for an explicit sign-out. The identity is cleared
    /// unconditionally; a delete is only ordered when both identity and
    /// token were cached. The token survives for the next sign-in.
    fn take_sign_out(&mut self) -> Option<String> {
        let user_id = match (&self.current_user, &self.current_token) {
            (Some(user_id), Some(_)) => Some(user_id.clone()),
            _ => None,
        };
        self.current_user = None;
        user_id
    }
}

struct Shared<S, M>
where
    S: ports::DocumentStore,
    M: ports::DeviceMetadata,
{
    registry: DeviceRegistry<S>,
    metadata: M,
    state: Mutex<SubscriptionState>,
}

impl<S, M> Shared<S, M>
where
    S: ports::DocumentStore,
    M: ports::DeviceMetadata,
{
    async fn register(&self, pending: PendingRegistration) {
        let descriptor = DeviceDescriptor::capture(&self.metadata);
        if let Err(err) = self
            .registry
            .upsert(&pending.user_id, descriptor, &pending.token)
            .await
        {
            eprintln!("device sync error: {} (user {})", err, pending.user_id);
        }
    }
}

/// Single authority over "is registration active" and the latest
/// identity/token pair. Signal deliveries mutate the state under one lock in
/// arrival order; the registry mutations they order run as spawned tasks,
/// with write-write races left to the store's transactional retry.
pub struct SubscriptionController<S, A, P, H, M>
where
    S: ports::DocumentStore,
    A: ports::AuthSignal,
    P: ports::PushTokenSignal,
    H: ports::PermissionHost,
    M: ports::DeviceMetadata,
{
    auth: A,
    tokens: P,
    permissions: H,
    shared: Arc<Shared<S, M>>,
    auth_subscription: Option<A::Handle>,
    token_subscription: Option<P::Handle>,
}

impl<S, A, P, H, M> SubscriptionController<S, A, P, H, M>
where
    S: ports::DocumentStore,
    A: ports::AuthSignal,
    P: ports::PushTokenSignal,
    H: ports::PermissionHost,
    M: ports::DeviceMetadata,
{
    pub fn new(store: S, auth: A, tokens: P, permissions: H, metadata: M, config: StoreConfig) -> Self {
        Self {
            auth,
            tokens,
            permissions,
            shared: Arc::new(Shared {
                registry: DeviceRegistry::new(store, &config),
                metadata,
                state: Mutex::new(SubscriptionState::default()),
            }),
            auth_subscription: None,
            token_subscription: None,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.shared
            .state
            .lock()
            .expect("subscription state lock")
            .subscribed
    }

    pub async fn subscribe(&mut self) -> Result<(), SubscribeError> {
        // Prevent duplicate subscriptions
        if self.is_subscribed() {
            return Ok(());
        }

        if !self.permissions.request_notification_permission().await {
            return Err(SubscribeError::PermissionDenied);
        }

        {
            let mut state = self.shared.state.lock().expect("subscription state lock");
            state.begin(self.auth.current_identity());
        }

        // Initial token snapshot; its arrival may complete the first
        // registration if an identity is already cached.
        let shared = Arc::clone(&self.shared);
        let tokens = self.tokens.clone();
        tokio::spawn(async move {
            match tokens.current_token().await {
                Ok(token) => {
                    let pending = {
                        let mut state = shared.state.lock().expect("subscription state lock");
                        state.token_fetched(token)
                    };
                    if let Some(pending) = pending {
                        shared.register(pending).await;
                    }
                }
                Err(err) => {
                    eprintln!("device sync warning: push token fetch failed ({err})");
                }
            }
        });

        let runtime = tokio::runtime::Handle::current();

        let shared = Arc::clone(&self.shared);
        let handle = runtime.clone();
        self.auth_subscription = Some(self.auth.on_identity_changed(Box::new(move |identity| {
            let outcome = {
                let mut state = shared.state.lock().expect("subscription state lock");
                state.identity_changed(identity)
            };
            match outcome {
                IdentityOutcome::Register(pending) => {
                    let shared = Arc::clone(&shared);
                    handle.spawn(async move {
                        shared.register(pending).await;
                    });
                }
                IdentityOutcome::UnexpectedSignOut => {
                    eprintln!(
                        "device sync warning: identity lost without sign_out; device entry left in place"
                    );
                }
                IdentityOutcome::Ignored => {}
            }
        })));

        let shared = Arc::clone(&self.shared);
        self.token_subscription = Some(self.tokens.on_token_refresh(Box::new(move |token| {
            let pending = {
                let mut state = shared.state.lock().expect("subscription state lock");
                state.token_refreshed(token)
            };
            if let Some(pending) = pending {
                let shared = Arc::clone(&shared);
                runtime.spawn(async move {
                    shared.register(pending).await;
                });
            }
        })));

        Ok(())
    }

    /// Removes this device's entry for the signed-out user. Callers must
    /// invoke this before discarding the identity; the identity listener
    /// never deletes on its own.
    pub async fn sign_out(&mut self) -> Result<(), RegistryError> {
        let user_id = {
            let mut state = self.shared.state.lock().expect("subscription state lock");
            state.take_sign_out()
        };
        match user_id {
            Some(user_id) => {
                let device_id = self.shared.metadata.device_id();
                self.shared.registry.delete(&user_id, &device_id).await
            }
            None => Ok(()),
        }
    }

    /// Stops both listeners and clears the cached state synchronously.
    /// Registry mutations already in flight complete in the background.
    pub fn unsubscribe(&mut self) {
        self.auth_subscription = None;
        self.token_subscription = None;
        self.shared
            .state
            .lock()
            .expect("subscription state lock")
            .clear();
    }
}
