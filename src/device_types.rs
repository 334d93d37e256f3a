use crate::ports;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Facts about the local device, captured fresh from the platform for each
/// registration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub device_id: String,
    pub name: String,
    pub os: String,
    pub kind: String,
}

impl DeviceDescriptor {
    pub fn capture<M: ports::DeviceMetadata>(metadata: &M) -> Self {
        Self {
            device_id: metadata.device_id(),
            name: metadata.device_name(),
            os: metadata.os_string(),
            kind: metadata.device_kind(),
        }
    }
}

// Wire field names are a fixed contract with existing stored documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegistration {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "fcmToken")]
    pub fcm_token: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub os: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl DeviceRegistration {
    pub fn new(descriptor: DeviceDescriptor, token: &str) -> Self {
        Self {
            device_id: descriptor.device_id,
            fcm_token: token.to_string(),
            name: descriptor.name,
            os: descriptor.os,
            kind: descriptor.kind,
        }
    }
}

/// Per-user persisted aggregate. Top-level fields written by other
/// collaborators are carried through `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDevicesDocument {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub devices: Vec<DeviceRegistration>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl UserDevicesDocument {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            devices: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Decodes a stored document, pinning `userId` to the document key. A
    /// document this crate cannot read is rebuilt around the expected user,
    /// keeping whatever foreign top-level fields survive.
    pub fn from_snapshot(user_id: &str, snapshot: Value) -> Self {
        match serde_json::from_value::<UserDevicesDocument>(snapshot.clone()) {
            Ok(mut document) => {
                document.user_id = user_id.to_string();
                document
            }
            Err(err) => {
                eprintln!("device registry warning: malformed document for user '{user_id}', rebuilding ({err})");
                let mut document = UserDevicesDocument::new(user_id);
                if let Value::Object(fields) = snapshot {
                    document.extra = fields
                        .into_iter()
                        .filter(|(name, _)| name != "userId" && name != "devices")
                        .collect();
                }
                document
            }
        }
    }

    pub fn into_value(self) -> Value {
        serde_json::to_value(self).expect("serialize user devices document")
    }

    /// Replace-if-present / append-if-absent, keyed by `deviceId`. An
    /// existing entry keeps its stored fields; only the token changes.
    pub fn upsert_device(&mut self, registration: DeviceRegistration) {
        match self
            .devices
            .iter_mut()
            .find(|device| device.device_id == registration.device_id)
        {
            Some(existing) => existing.fcm_token = registration.fcm_token,
            None => self.devices.push(registration),
        }
    }

    /// Returns whether an entry was removed, so callers can skip the write
    /// entirely when nothing matched.
    pub fn remove_device(&mut self, device_id: &str) -> bool {
        let before = self.devices.len();
        self.devices.retain(|device| device.device_id != device_id);
        self.devices.len() != before
    }
}
