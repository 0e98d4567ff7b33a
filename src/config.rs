use crate::filtering::QueryProfile;
use serde::Deserialize;

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Deployment settings shared by every registered resource.
///
/// ```rust,ignore
/// let config = RestConfig::from_json(r#"{"profile": "bracket", "log_skip_paths": ["/health"]}"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    /// Query-string convention for list endpoints.
    pub profile: QueryProfile,
    /// Rows per statement for bulk inserts.
    pub batch_size: usize,
    /// Request paths the access log stays quiet about.
    pub log_skip_paths: Vec<String>,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            profile: QueryProfile::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            log_skip_paths: Vec::new(),
        }
    }
}

impl RestConfig {
    /// # Errors
    /// Returns the deserialization error for malformed or mistyped JSON.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    #[must_use]
    pub fn with_profile(mut self, profile: QueryProfile) -> Self {
        self.profile = profile;
        self
    }
}
