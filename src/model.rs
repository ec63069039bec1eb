//! Permission definitions

use serde::{Deserialize, Serialize};

use crate::flag::{Flag, StrictFlag};

/// A named permission registered under a strict key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDef {
    pub key: StrictFlag,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl PermissionDef {
    pub fn new(key: StrictFlag, name: impl Into<String>, description: impl Into<String>) -> Self {
        PermissionDef { key, name: name.into(), description: description.into() }
    }

    /// The key as a required flag
    pub fn flag(&self) -> Flag {
        self.key.to_flag()
    }
}
