use crate::ports;

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const MAX_TRANSACTION_ATTEMPTS: usize = 32;

#[derive(Debug)]
pub enum MemoryStoreError {
    Contention,
}

impl std::fmt::Display for MemoryStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryStoreError::Contention => f.write_str("transaction retries exhausted"),
        }
    }
}

#[derive(Debug, Clone)]
struct VersionedDocument {
    version: u64,
    value: Value,
}

/// In-process document store with optimistic transactions: snapshot read,
/// transform applied outside the lock, compare-and-swap commit, bounded
/// internal retries on conflict.
#[derive(Clone, Default)]
pub struct MemoryStore {
    documents: Arc<Mutex<HashMap<(String, String), VersionedDocument>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        let documents = self.documents.lock().expect("memory store lock");
        documents
            .get(&(collection.to_string(), id.to_string()))
            .map(|document| document.value.clone())
    }

    fn transact(
        &self,
        collection: &str,
        id: &str,
        apply: ports::TransactionFn<'_>,
    ) -> Result<(), MemoryStoreError> {
        let key = (collection.to_string(), id.to_string());
        for _ in 0..MAX_TRANSACTION_ATTEMPTS {
            let snapshot = {
                let documents = self.documents.lock().expect("memory store lock");
                documents
                    .get(&key)
                    .map(|document| (document.version, document.value.clone()))
            };

            let updated = match apply(snapshot.as_ref().map(|(_, value)| value.clone())) {
                Some(updated) => updated,
                None => return Ok(()),
            };

            let mut documents = self.documents.lock().expect("memory store lock");
            match &snapshot {
                Some((version, _)) => {
                    if let Some(document) = documents.get_mut(&key) {
                        if document.version == *version {
                            document.version += 1;
                            document.value = updated;
                            return Ok(());
                        }
                    }
                }
                None => {
                    if !documents.contains_key(&key) {
                        documents.insert(
                            key.clone(),
                            VersionedDocument {
                                version: 0,
                                value: updated,
                            },
                        );
                        return Ok(());
                    }
                }
            }
            // A concurrent writer committed between read and commit; re-read
            // the post-conflict state and replay the transform.
        }
        Err(MemoryStoreError::Contention)
    }
}

impl ports::DocumentStore for MemoryStore {
    type Error = MemoryStoreError;
    type GetFut<'a>
        = std::future::Ready<Result<Option<Value>, Self::Error>>
    where
        Self: 'a;
    type TransactionFut<'a>
        = std::future::Ready<Result<(), Self::Error>>
    where
        Self: 'a;

    fn get<'a>(&'a self, collection: &'a str, id: &'a str) -> Self::GetFut<'a> {
        std::future::ready(Ok(self.document(collection, id)))
    }

    fn run_transaction<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        apply: ports::TransactionFn<'a>,
    ) -> Self::TransactionFut<'a> {
        std::future::ready(self.transact(collection, id, apply))
    }
}

/// Device facts supplied by the embedder at startup.
#[derive(Debug, Clone)]
pub struct StaticMetadata {
    pub id: String,
    pub name: String,
    pub os: String,
    pub kind: String,
}

impl ports::DeviceMetadata for StaticMetadata {
    fn device_id(&self) -> String {
        self.id.clone()
    }

    fn device_name(&self) -> String {
        self.name.clone()
    }

    fn os_string(&self) -> String {
        self.os.clone()
    }

    fn device_kind(&self) -> String {
        self.kind.clone()
    }
}
