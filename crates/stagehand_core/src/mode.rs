//! Scene load mode

use serde::{Deserialize, Serialize};

/// How a loaded scene relates to the scenes already loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSceneMode {
    /// Replace every loaded scene
    #[default]
    Single,
    /// Load alongside the existing scenes
    Additive,
}

impl std::fmt::Display for LoadSceneMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Additive => write!(f, "additive"),
        }
    }
}
