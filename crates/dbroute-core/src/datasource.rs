//! Connection descriptors for physical databases

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where and how to connect to one physical database.
///
/// Building an actual connection pool from a descriptor is left to the host
/// application.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    /// Connection URL
    pub url: String,

    /// Login user
    pub username: String,

    /// Login password (never printed by `Debug`)
    #[serde(default)]
    pub password: String,
}

impl DataSourceDescriptor {
    pub fn new(url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for DataSourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceDescriptor")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
