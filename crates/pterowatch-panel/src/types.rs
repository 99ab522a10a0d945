//! Wire types for the Pterodactyl client API.
//!
//! Only the fields the watcher reads are modelled; everything else in the
//! panel's responses is ignored.

use serde::{Deserialize, Serialize};

/// `GET /api/client/servers/{id}/resources`
#[derive(Debug, Deserialize)]
pub struct ResourcesResponse {
    pub attributes: ResourceAttributes,
}

#[derive(Debug, Deserialize)]
pub struct ResourceAttributes {
    /// `running`, `starting`, `stopping`, or `offline`.
    pub current_state: String,
}

/// Body of `POST /api/client/servers/{id}/power`.
#[derive(Debug, Serialize)]
pub struct PowerRequest {
    pub signal: PowerSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSignal {
    Start,
    /// Forced stop.
    Kill,
}

/// `GET /api/client`, a paginated list of `server` objects.
#[derive(Debug, Deserialize)]
pub struct ServerList {
    #[serde(default)]
    pub data: Vec<ListItem>,
    pub meta: Option<ListMeta>,
}

/// One item of a list response. `attributes` is decoded only for `server`
/// objects.
#[derive(Debug, Deserialize)]
pub struct ListItem {
    pub object: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct ServerAttributes {
    pub identifier: String,
    #[serde(default)]
    pub relationships: Option<ServerRelationships>,
}

#[derive(Debug, Deserialize)]
pub struct ServerRelationships {
    pub allocations: Option<AllocationList>,
}

#[derive(Debug, Deserialize)]
pub struct AllocationList {
    #[serde(default)]
    pub data: Vec<AllocationItem>,
}

#[derive(Debug, Deserialize)]
pub struct AllocationItem {
    pub object: String,
    pub attributes: AllocationAttributes,
}

#[derive(Debug, Deserialize)]
pub struct AllocationAttributes {
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListMeta {
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
}

impl ServerAttributes {
    /// The server's default allocation, if the panel included allocations.
    pub fn default_allocation(&self) -> Option<&AllocationAttributes> {
        self.relationships
            .as_ref()?
            .allocations
            .as_ref()?
            .data
            .iter()
            .filter(|item| item.object == "allocation")
            .map(|item| &item.attributes)
            .find(|alloc| alloc.is_default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_request_body() {
        let body = serde_json::to_string(&PowerRequest {
            signal: PowerSignal::Kill,
        })
        .unwrap();
        assert_eq!(body, r#"{"signal":"kill"}"#);
    }

    #[test]
    fn default_allocation_is_picked() {
        let attrs: ServerAttributes = serde_json::from_value(serde_json::json!({
            "identifier": "a1b2c3d4",
            "relationships": {
                "allocations": {
                    "object": "list",
                    "data": [
                        { "object": "allocation", "attributes": { "ip": "10.0.0.5", "port": 27016, "is_default": false } },
                        { "object": "allocation", "attributes": { "ip": "10.0.0.5", "port": 27015, "is_default": true } }
                    ]
                }
            }
        }))
        .unwrap();
        let alloc = attrs.default_allocation().unwrap();
        assert_eq!(alloc.port, 27015);
    }

    #[test]
    fn missing_relationships_yield_no_allocation() {
        let attrs: ServerAttributes =
            serde_json::from_value(serde_json::json!({ "identifier": "a1b2c3d4" })).unwrap();
        assert!(attrs.default_allocation().is_none());
    }
}
