use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::site::{RemoteSite, UserProfile};

const AUTOMATION_PAGE: &str = "automation.py";

/// Delivers a profile to one site
#[async_trait]
pub trait ProfilePusher: Send + Sync {
    async fn push(&self, site: &RemoteSite, profile: &UserProfile) -> Result<()>;
}

/// Posts profiles to the `push-profile` automation command of remote sites
#[derive(Debug, Clone)]
pub struct HttpProfilePusher {
    client: Client,
    insecure_client: Client,
}

impl HttpProfilePusher {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            insecure_client: Client::builder()
                .timeout(timeout)
                .danger_accept_invalid_certs(true)
                .build()?,
        })
    }

    fn automation_url(site: &RemoteSite) -> Result<Url> {
        let invalid = |reason: String| SyncError::InvalidUrl {
            url: site.multisite_url.clone(),
            reason,
        };
        let base = Url::parse(&site.multisite_url).map_err(|e| invalid(e.to_string()))?;
        let mut url = base
            .join(AUTOMATION_PAGE)
            .map_err(|e| invalid(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("command", "push-profile")
            .append_pair("secret", &site.secret)
            .append_pair("siteid", &site.id);
        Ok(url)
    }
}

/// The remote site answers `True` (or JSON `true`) on success and error
/// text otherwise.
fn check_response(body: &str) -> Result<()> {
    match body.trim() {
        "" => Err(SyncError::EmptyResponse),
        "True" | "true" => Ok(()),
        other => Err(SyncError::InvalidResponse(other.to_string())),
    }
}

#[async_trait]
impl ProfilePusher for HttpProfilePusher {
    async fn push(&self, site: &RemoteSite, profile: &UserProfile) -> Result<()> {
        let url = Self::automation_url(site)?;
        let client = if site.insecure {
            &self.insecure_client
        } else {
            &self.client
        };
        debug!("Pushing profile of {} to site {}", profile.user_id, site.id);

        let body = client
            .post(url)
            .form(&[
                ("user_id", profile.user_id.clone()),
                ("profile", serde_json::to_string(&profile.profile)?),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        check_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_automation_url() {
        let site = RemoteSite {
            id: "remote1".to_string(),
            multisite_url: "https://remote1.example.com/remote1/check_mk/".to_string(),
            secret: "s3cr3t".to_string(),
            insecure: false,
            dead: false,
        };
        let url = HttpProfilePusher::automation_url(&site).unwrap();
        assert_eq!(
            url.as_str(),
            "https://remote1.example.com/remote1/check_mk/automation.py?command=push-profile&secret=s3cr3t&siteid=remote1"
        );
    }

    #[test]
    fn test_check_response() {
        assert!(check_response("True\n").is_ok());
        assert!(check_response("true").is_ok());
        assert!(matches!(check_response("  "), Err(SyncError::EmptyResponse)));
        assert!(matches!(
            check_response("Site ID mismatch"),
            Err(SyncError::InvalidResponse(_))
        ));
    }
}
