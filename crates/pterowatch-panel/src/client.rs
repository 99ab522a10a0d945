//! Pterodactyl client API adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use pterowatch_core::Endpoint;
use pterowatch_health::{DiscoveredServer, RecoveryActuator, ServerDiscovery, StatusProbe};
use pterowatch_state::ProbeOutcome;

use crate::error::{PanelError, PanelResult};
use crate::types::*;

/// Upper bound on pages fetched during discovery.
const MAX_PAGES: u32 = 100;

#[derive(Clone)]
pub struct PanelClient {
    http: Client,
    base_url: String,
    token: String,
}

impl PanelClient {
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> PanelResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("pterowatch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| PanelError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/api/client{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
    }

    async fn send(&self, builder: RequestBuilder) -> PanelResult<Response> {
        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(PanelError::Status {
            status: status.as_u16(),
            body: truncate(&body, 200),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PanelResult<T> {
        let resp = self.send(self.request(Method::GET, path)).await?;
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| PanelError::Decode(e.to_string()))
    }

    /// The container state reported by the panel (`running`, `offline`, …).
    pub async fn server_state(&self, id: &str) -> PanelResult<String> {
        let resources: ResourcesResponse = self
            .get_json(&format!("/servers/{id}/resources"))
            .await?;
        Ok(resources.attributes.current_state)
    }

    /// Send a power signal. Success means the panel accepted it.
    pub async fn send_power(&self, id: &str, signal: PowerSignal) -> PanelResult<()> {
        let builder = self
            .request(Method::POST, &format!("/servers/{id}/power"))
            .header(CONTENT_TYPE, "application/json")
            .json(&PowerRequest { signal });
        self.send(builder).await?;
        debug!(server_id = %id, ?signal, "power signal accepted");
        Ok(())
    }

    /// Every server visible to the token, with its default allocation.
    pub async fn list_servers(&self) -> PanelResult<Vec<DiscoveredServer>> {
        let mut servers = Vec::new();
        let mut page = 1;

        loop {
            let list: ServerList = self.get_json(&format!("?page={page}")).await?;

            for item in list.data.into_iter().filter(|item| item.object == "server") {
                let attrs: ServerAttributes = serde_json::from_value(item.attributes)
                    .map_err(|e| PanelError::Decode(e.to_string()))?;
                let endpoint = match attrs.default_allocation() {
                    Some(alloc) => Endpoint::new(alloc.ip.clone(), alloc.port),
                    None => {
                        warn!(server_id = %attrs.identifier, "server has no default allocation");
                        Endpoint::default()
                    }
                };
                debug!(server_id = %attrs.identifier, %endpoint, "server listed");
                servers.push(DiscoveredServer {
                    id: attrs.identifier,
                    endpoint,
                });
            }

            let more = list
                .meta
                .and_then(|meta| meta.pagination)
                .is_some_and(|p| p.current_page < p.total_pages);
            if !more || page >= MAX_PAGES {
                break;
            }
            page += 1;
        }

        Ok(servers)
    }
}

#[async_trait]
impl StatusProbe for PanelClient {
    async fn probe(&self, id: &str) -> ProbeOutcome {
        match self.server_state(id).await {
            Ok(state) if state == "running" => ProbeOutcome::Running,
            Ok(state) => {
                debug!(server_id = %id, %state, "container not running");
                ProbeOutcome::NotRunning
            }
            Err(e) => {
                debug!(server_id = %id, error = %e, "status probe failed");
                ProbeOutcome::ProbeError
            }
        }
    }
}

#[async_trait]
impl RecoveryActuator for PanelClient {
    async fn issue_stop(&self, id: &str) -> anyhow::Result<()> {
        Ok(self.send_power(id, PowerSignal::Kill).await?)
    }

    async fn issue_start(&self, id: &str) -> anyhow::Result<()> {
        Ok(self.send_power(id, PowerSignal::Start).await?)
    }
}

#[async_trait]
impl ServerDiscovery for PanelClient {
    async fn discover(&self) -> anyhow::Result<Vec<DiscoveredServer>> {
        Ok(self.list_servers().await?)
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
