//! Per-resource filter configuration, loaded from a JSON file.
//!
//! ```json
//! {
//!   "Cluster": { "table": "clusters", "disallowed_fields": ["owner_token"] },
//!   "NodePool": { "disallowed_fields": [] }
//! }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sql_compiler::SqlCompiler;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse config {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Filter settings for one resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Backing table; the lower-cased resource kind when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Columns that must not be reachable from filters or order-by.
    #[serde(default)]
    pub disallowed_fields: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Resource kind to its settings
    #[serde(flatten)]
    pub resources: HashMap<String, ResourceConfig>,
}

impl FilterConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_ref.to_path_buf()));
        }

        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            origin: path_ref.display().to_string(),
            source,
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            origin: "<string>".to_string(),
            source,
        })
    }

    pub fn resource(&self, kind: &str) -> Option<&ResourceConfig> {
        self.resources.get(kind)
    }

    /// Table for a resource kind, falling back to the lower-cased kind
    pub fn table_name(&self, kind: &str) -> String {
        self.resources
            .get(kind)
            .and_then(|resource| resource.table.clone())
            .unwrap_or_else(|| kind.to_lowercase())
    }

    /// Compiler for a resource kind. Unknown kinds get no disallowed fields.
    pub fn compiler_for(&self, kind: &str) -> SqlCompiler {
        let compiler = SqlCompiler::new(self.table_name(kind));
        match self.resources.get(kind) {
            Some(resource) => {
                compiler.with_disallowed_fields(resource.disallowed_fields.iter().cloned())
            }
            None => compiler,
        }
    }
}
