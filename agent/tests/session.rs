use std::time::Duration;

use agent_proxmox_ve::session::PAGE_SIZE;
use agent_proxmox_ve::{AgentError, ApiSource, ProxmoxVeSession};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_ticket(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api2/json/access/ticket"))
        .and(body_string_contains("username=monitoring%40pve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "ticket": "PVE:monitoring@pve:TICKET",
                "CSRFPreventionToken": "TOKEN",
                "username": "monitoring@pve"
            }
        })))
        .mount(server)
        .await;
}

async fn connect(server: &MockServer) -> Result<ProxmoxVeSession, AgentError> {
    ProxmoxVeSession::connect(
        &format!("{}/", server.uri()),
        "monitoring@pve",
        "secret",
        Duration::from_secs(5),
        true,
    )
    .await
}

#[tokio::test]
async fn test_ticket_is_sent_with_requests() {
    let server = MockServer::start().await;
    mount_ticket(&server).await;
    Mock::given(method("GET"))
        .and(path("/api2/json/version"))
        .and(header("cookie", "PVEAuthCookie=PVE:monitoring@pve:TICKET"))
        .and(header("csrfpreventiontoken", "TOKEN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"release": "8.1", "version": "8.1.4"}
        })))
        .mount(&server)
        .await;

    let session = connect(&server).await.unwrap();
    let version = session.get_api_element("version").await.unwrap();
    assert_eq!(version["release"], "8.1");
}

#[tokio::test]
async fn test_failed_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api2/json/access/ticket"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"data": null})))
        .mount(&server)
        .await;

    let err = connect(&server).await.err().unwrap();
    assert!(matches!(err, AgentError::CannotRecover(_)));
    assert!(err
        .to_string()
        .starts_with("Couldn't authenticate \"monitoring@pve\" @ "));
}

#[tokio::test]
async fn test_api_errors_cannot_be_recovered() {
    let server = MockServer::start().await;
    mount_ticket(&server).await;
    Mock::given(method("GET"))
        .and(path("/api2/json/cluster/resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": {"type": "value 'foo' does not have a value in the enumeration"}
        })))
        .mount(&server)
        .await;

    let session = connect(&server).await.unwrap();
    let err = session.get_api_element("cluster/resources").await.unwrap_err();
    assert!(err.to_string().starts_with("Could not fetch \"cluster/resources\""));
}

#[tokio::test]
async fn test_http_error_yields_empty_list() {
    let server = MockServer::start().await;
    mount_ticket(&server).await;
    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/subscription"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let session = connect(&server).await.unwrap();
    let value = session.get_api_element("nodes/pve1/subscription").await.unwrap();
    assert_eq!(value, json!([]));
}

#[tokio::test]
async fn test_undecodable_body() {
    let server = MockServer::start().await;
    mount_ticket(&server).await;
    Mock::given(method("GET"))
        .and(path("/api2/json/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .mount(&server)
        .await;

    let session = connect(&server).await.unwrap();
    let err = session.get_api_element("nodes").await.unwrap_err();
    assert!(err.to_string().starts_with("Couldn't parse API element nodes"));
}

#[tokio::test]
async fn test_task_logs_are_paginated() {
    let server = MockServer::start().await;
    mount_ticket(&server).await;

    let log_path = "/api2/json/nodes/pve1/tasks/UPID:pve1:00001234:vzdump::root@pam:/log";
    let first_page: Vec<Value> = (1..=PAGE_SIZE)
        .map(|n| json!({"n": n, "t": format!("line {}", n)}))
        .collect();
    Mock::given(method("GET"))
        .and(path(log_path))
        .and(query_param("start", "0"))
        .and(query_param("limit", PAGE_SIZE.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": first_page})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(log_path))
        .and(query_param("start", PAGE_SIZE.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"n": PAGE_SIZE + 1, "t": "TASK OK"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = connect(&server).await.unwrap();
    let log = session
        .get_api_element("nodes/pve1/tasks/UPID:pve1:00001234:vzdump::root@pam:/log")
        .await
        .unwrap();
    let entries = log.as_array().unwrap();
    assert_eq!(entries.len(), PAGE_SIZE + 1);
    assert_eq!(entries[PAGE_SIZE]["t"], "TASK OK");
}
