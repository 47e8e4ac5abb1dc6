use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A remote site profiles are replicated to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSite {
    pub id: String,
    /// Base URL of the site's web interface, ending with `/`
    pub multisite_url: String,
    pub secret: String,
    /// Skip certificate verification
    #[serde(default)]
    pub insecure: bool,
    /// Sites known to be down are not contacted
    #[serde(default)]
    pub dead: bool,
}

/// The profile of one user as stored on the central site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub profile: Value,
}
