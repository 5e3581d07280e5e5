use serde::{Deserialize, Serialize};

/// Run wide knobs of the synchronization tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Check before every transfer that each buffer lives on the device the protocol expects.
    #[serde(default)]
    pub debug_checks: bool,
}
