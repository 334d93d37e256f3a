#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub collection_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collection_path: "user-devices".to_string(),
        }
    }
}
