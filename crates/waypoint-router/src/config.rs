//! Route declaration files.
//!
//! Routes can be declared in JSON instead of code:
//!
//! ```json
//! {
//!   "strategy": "sequential",
//!   "routes": [
//!     { "method": "GET", "pattern": "/home/{uid:\\d+}", "handler": "app/controllers/Home@show" },
//!     { "method": ["PUT", "PATCH"], "pattern": "/home/{uid}", "handler": "app/controllers/Home@update" }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RouterError};
use crate::table::Methods;

/// How the dispatcher looks up routes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// Try each route's own pattern in registration order.
    #[default]
    Sequential,
    /// Match one combined alternation per method and pick the route from the
    /// alternative that matched.
    Combined,
}

/// Method field of a declaration: one name or a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodSpec {
    /// A single method name.
    One(String),
    /// Several method names.
    Many(Vec<String>),
}

/// A single declared route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecl {
    /// Method or methods the route answers.
    pub method: MethodSpec,
    /// Path template.
    pub pattern: String,
    /// `module@action` reference.
    pub handler: String,
}

impl RouteDecl {
    /// Parses the declared methods.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownMethod`] for an unsupported name.
    pub fn methods(&self) -> Result<Methods> {
        match &self.method {
            MethodSpec::One(name) => name.parse(),
            MethodSpec::Many(names) => Methods::parse(names),
        }
    }
}

/// Contents of a route declaration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutesConfig {
    /// Lookup strategy.
    #[serde(default)]
    pub strategy: MatchStrategy,
    /// Declared routes, in priority order.
    #[serde(default)]
    pub routes: Vec<RouteDecl>,
}

impl RoutesConfig {
    /// Parses a declaration document.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Config`] if the document is not valid.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a declaration file.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Config`] if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| RouterError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&content)
    }
}
