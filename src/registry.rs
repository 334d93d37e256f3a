use crate::config::StoreConfig;
use crate::device_types::{DeviceDescriptor, DeviceRegistration, UserDevicesDocument};
use crate::ports;

use serde_json::Value;

#[derive(Debug)]
pub enum RegistryError {
    Transaction(String),
    Read(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Transaction(message) => {
                write!(f, "device transaction failed: {message}")
            }
            RegistryError::Read(message) => write!(f, "device read failed: {message}"),
        }
    }
}

/// Atomic upsert/delete of one device entry inside one user's document. All
/// mutations run as single read-modify-write transactions; concurrent
/// writers for the same user are serialized by the store's conflict retry.
#[derive(Debug, Clone)]
pub struct DeviceRegistry<S> {
    store: S,
    collection: String,
}

impl<S> DeviceRegistry<S>
where
    S: ports::DocumentStore,
{
    pub fn new(store: S, config: &StoreConfig) -> Self {
        Self {
            store,
            collection: config.collection_path.clone(),
        }
    }

    pub async fn upsert(
        &self,
        user_id: &str,
        descriptor: DeviceDescriptor,
        token: &str,
    ) -> Result<(), RegistryError> {
        let registration = DeviceRegistration::new(descriptor, token);
        let apply =
            move |snapshot: Option<Value>| Some(apply_upsert(snapshot, user_id, &registration));
        self.store
            .run_transaction(&self.collection, user_id, &apply)
            .await
            .map_err(|err| RegistryError::Transaction(err.to_string()))
    }

    pub async fn delete(&self, user_id: &str, device_id: &str) -> Result<(), RegistryError> {
        let apply = move |snapshot: Option<Value>| apply_delete(snapshot, user_id, device_id);
        self.store
            .run_transaction(&self.collection, user_id, &apply)
            .await
            .map_err(|err| RegistryError::Transaction(err.to_string()))
    }

    /// Current registrations for a user; what a notification sender reads.
    pub async fn devices(&self, user_id: &str) -> Result<Vec<DeviceRegistration>, RegistryError> {
        let snapshot = self
            .store
            .get(&self.collection, user_id)
            .await
            .map_err(|err| RegistryError::Read(err.to_string()))?;
        Ok(match snapshot {
            Some(value) => UserDevicesDocument::from_snapshot(user_id, value).devices,
            None => Vec::new(),
        })
    }
}

fn apply_upsert(snapshot: Option<Value>, user_id: &str, registration: &DeviceRegistration) -> Value {
    let mut document = match snapshot {
        Some(value) => UserDevicesDocument::from_snapshot(user_id, value),
        None => UserDevicesDocument::new(user_id),
    };
    document.upsert_device(registration.clone());
    document.into_value()
}

fn apply_delete(snapshot: Option<Value>, user_id: &str, device_id: &str) -> Option<Value> {
    let value = snapshot?;
    let mut document = UserDevicesDocument::from_snapshot(user_id, value);
    if !document.remove_device(device_id) {
        return None;
    }
    Some(document.into_value())
}
