//! Authenticated HTTP session against the Proxmox VE REST API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};
use crate::tree::ApiSource;

/// Entries per request for paginated elements (task lists and task logs)
pub const PAGE_SIZE: usize = 5000;

const ACCEPTED_TYPES: &str =
    "application/json, application/x-javascript, text/javascript, text/x-javascript, text/x-json";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: Option<T>,
    errors: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Ticket {
    ticket: String,
    #[serde(rename = "CSRFPreventionToken")]
    csrf_prevention_token: String,
}

pub struct ProxmoxVeSession {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl ProxmoxVeSession {
    /// Authenticate at `base_url` (e.g. `https://pve01:8006/`) and keep the
    /// ticket for all further requests
    pub async fn connect(
        base_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
        verify_ssl: bool,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AgentError::CannotRecover(format!("Invalid URL {:?}: {}", base_url, e)))?;
        let ticket_url = base_url
            .join("api2/json/access/ticket")
            .map_err(|e| AgentError::CannotRecover(e.to_string()))?;

        info!("Establish connection to Proxmox VE host {:?}", base_url.host_str());
        let login_client = Self::client_builder(timeout, verify_ssl).build()?;
        let response = login_client
            .post(ticket_url.clone())
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| connect_error(&base_url, timeout, e))?;

        let ticket = response
            .json::<ApiResponse<Ticket>>()
            .await
            .ok()
            .and_then(|body| body.data)
            .ok_or_else(|| {
                AgentError::CannotRecover(format!(
                    "Couldn't authenticate {:?} @ {:?}",
                    username,
                    ticket_url.as_str()
                ))
            })?;
        debug!("Authenticated as {:?}", username);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPTED_TYPES));
        headers.insert(COOKIE, header_value(&format!("PVEAuthCookie={}", ticket.ticket))?);
        headers.insert(
            "csrfpreventiontoken",
            header_value(&ticket.csrf_prevention_token)?,
        );

        let client = Self::client_builder(timeout, verify_ssl)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    fn client_builder(timeout: Duration, verify_ssl: bool) -> reqwest::ClientBuilder {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(!verify_ssl)
    }

    async fn get_page(&self, path: &str, query: &[(&str, usize)]) -> Result<Value> {
        let url = self
            .base_url
            .join(&format!("api2/json/{}", path))
            .map_err(|e| AgentError::CannotRecover(format!("Invalid API path {:?}: {}", path, e)))?;

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.request_error(path, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("GET {} returned {}", path, status);
            return Ok(Value::Array(Vec::new()));
        }

        let body: ApiResponse<Value> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.request_error(path, e)
            } else {
                AgentError::CannotRecover(format!("Couldn't parse API element {} ({})", path, e))
            }
        })?;
        if let Some(errors) = body.errors {
            return Err(AgentError::CannotRecover(format!(
                "Could not fetch {:?} ({})",
                path, errors
            )));
        }
        Ok(body.data.unwrap_or(Value::Null))
    }

    fn request_error(&self, path: &str, e: reqwest::Error) -> AgentError {
        if e.is_connect() {
            connect_error(&self.base_url, self.timeout, e)
        } else if e.is_timeout() {
            AgentError::CannotRecover(format!(
                "Read timeout after {}s when trying to GET {}",
                self.timeout.as_secs(),
                path
            ))
        } else {
            AgentError::CannotRecover(format!("Could not GET element {} ({})", path, e))
        }
    }
}

fn is_paginated(path: &str) -> bool {
    path.ends_with("/log") || path.ends_with("/tasks")
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AgentError::CannotRecover(format!("Invalid authentication ticket: {}", e)))
}

fn connect_error(base_url: &Url, timeout: Duration, e: reqwest::Error) -> AgentError {
    let host = base_url.host_str().unwrap_or_default();
    let port = base_url.port_or_known_default().unwrap_or_default();
    if e.is_timeout() {
        AgentError::CannotRecover(format!(
            "Timeout after {}s when trying to connect to {}:{}",
            timeout.as_secs(),
            host,
            port
        ))
    } else {
        AgentError::CannotRecover(format!("Could not connect to {}:{} ({})", host, port, e))
    }
}

#[async_trait]
impl ApiSource for ProxmoxVeSession {
    async fn get_api_element(&self, path: &str) -> Result<Value> {
        if !is_paginated(path) {
            return self.get_page(path, &[]).await;
        }

        let mut entries: Vec<Value> = Vec::new();
        loop {
            let page = self
                .get_page(path, &[("start", entries.len()), ("limit", PAGE_SIZE)])
                .await?;
            let Value::Array(items) = page else {
                return Err(AgentError::unexpected_shape(path, "expected a list of entries"));
            };
            let count = items.len();
            entries.extend(items);
            if count < PAGE_SIZE {
                break;
            }
        }
        debug!("Fetched {} entries from {}", entries.len(), path);
        Ok(Value::Array(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_paginated() {
        assert!(is_paginated("nodes/pve1/tasks"));
        assert!(is_paginated("nodes/pve1/tasks/UPID:pve1:0001/log"));
        assert!(!is_paginated("cluster/resources"));
        assert!(!is_paginated("nodes/pve1/tasks/UPID:pve1:0001/status"));
    }
}
