use serde::{Deserialize, Serialize};

/// Where the file-backed flow context keeps its JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "d_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: d_store_path(),
        }
    }
}

fn d_store_path() -> String {
    ".gardena/flow-context.json".into()
}
