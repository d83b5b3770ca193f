//! Role-based route authorization

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::storage::RoleId;

/// Answers whether a role may call a route.
///
/// `path` is the route template (e.g. `/admins/{admin_id}`), not the
/// concrete request path.
#[async_trait]
pub trait RoleChecker: Send + Sync {
    async fn check(&self, role_id: RoleId, method: &str, path: &str) -> bool;
}

/// One permitted (method, route template) pair; method `*` matches any
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct RoutePermission {
    pub method: String,
    pub path: String,
}

impl RoutePermission {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
        }
    }

    fn allows(&self, method: &str, path: &str) -> bool {
        (self.method == "*" || self.method.eq_ignore_ascii_case(method)) && self.path == path
    }
}

/// Errors loading a role matrix
#[derive(Debug, thiserror::Error)]
pub enum RoleMatrixError {
    #[error("Failed to read role matrix: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid role matrix: {0}")]
    Parse(#[from] serde_json::Error),
}

/// In-memory role/route permission matrix
pub struct RoleMatrix {
    grants: Arc<RwLock<HashMap<RoleId, HashSet<RoutePermission>>>>,
}

impl RoleMatrix {
    pub fn new() -> Self {
        Self {
            grants: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Parse `{"<role id>": [{"method": "GET", "path": "/admins"}]}`
    pub fn from_json(json: &str) -> Result<Self, RoleMatrixError> {
        let raw: HashMap<RoleId, Vec<RoutePermission>> = serde_json::from_str(json)?;
        let matrix = Self::new();
        for (role_id, permissions) in raw {
            for p in permissions {
                matrix.grant(role_id, RoutePermission::new(p.method, p.path));
            }
        }
        Ok(matrix)
    }

    pub fn from_file(path: &Path) -> Result<Self, RoleMatrixError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn grant(&self, role_id: RoleId, permission: RoutePermission) {
        self.grants.write().entry(role_id).or_default().insert(permission);
    }

    pub fn role_count(&self) -> usize {
        self.grants.read().len()
    }

    pub fn allows(&self, role_id: RoleId, method: &str, path: &str) -> bool {
        self.grants
            .read()
            .get(&role_id)
            .is_some_and(|set| set.iter().any(|p| p.allows(method, path)))
    }
}

impl Default for RoleMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RoleMatrix {
    fn clone(&self) -> Self {
        Self {
            grants: Arc::clone(&self.grants),
        }
    }
}

#[async_trait]
impl RoleChecker for RoleMatrix {
    async fn check(&self, role_id: RoleId, method: &str, path: &str) -> bool {
        self.allows(role_id, method, path)
    }
}
