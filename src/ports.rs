use serde_json::Value;

/// Pure snapshot transform applied inside a store transaction. Returning
/// `None` skips the write. The store may replay the transform on conflict.
pub type TransactionFn<'a> = &'a (dyn Fn(Option<Value>) -> Option<Value> + Send + Sync);

pub type IdentityCallback = Box<dyn Fn(Option<String>) + Send + Sync + 'static>;

pub type TokenCallback = Box<dyn Fn(String) + Send + Sync + 'static>;

pub trait DocumentStore: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type GetFut<'a>: Future<Output = Result<Option<Value>, Self::Error>> + Send + 'a
    where
        Self: 'a;
    type TransactionFut<'a>: Future<Output = Result<(), Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn get<'a>(&'a self, collection: &'a str, id: &'a str) -> Self::GetFut<'a>;

    fn run_transaction<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        apply: TransactionFn<'a>,
    ) -> Self::TransactionFut<'a>;
}

pub trait AuthSignal: Clone + Send + Sync + 'static {
    /// Dropping the handle removes the listener.
    type Handle: Send + 'static;

    fn current_identity(&self) -> Option<String>;
    fn on_identity_changed(&self, callback: IdentityCallback) -> Self::Handle;
}

pub trait PushTokenSignal: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    /// Dropping the handle removes the listener.
    type Handle: Send + 'static;
    type TokenFut<'a>: Future<Output = Result<String, Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn current_token<'a>(&'a self) -> Self::TokenFut<'a>;
    fn on_token_refresh(&self, callback: TokenCallback) -> Self::Handle;
}

pub trait PermissionHost: Clone + Send + Sync + 'static {
    type RequestFut<'a>: Future<Output = bool> + Send + 'a
    where
        Self: 'a;

    fn request_notification_permission<'a>(&'a self) -> Self::RequestFut<'a>;
}

pub trait DeviceMetadata: Clone + Send + Sync + 'static {
    fn device_id(&self) -> String;
    fn device_name(&self) -> String;
    fn os_string(&self) -> String;
    fn device_kind(&self) -> String;
}
