use serde::{Deserialize, Serialize};

/// Application-level role, derived from the backend user and the admin allow-list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Viewer,
}
