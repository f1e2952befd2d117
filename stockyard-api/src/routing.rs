//! Request routing: tenant derivation and endpoint classification.
//!
//! Agent paths are embedded in the URL, so the front door cannot be a
//! static route table. These pure functions derive `(tenant, agent path,
//! endpoint)` from the host and URL path; the single wildcard Axum handler
//! dispatches on the result.

use stockyard_core::{AgentPath, OwnerKey, Tenant, ValidationError};

/// The API operation addressed by a request, after the agent path is
/// stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Subscription upgrade (`.../ws`).
    Ws,
    State,
    Increment,
    Messages,
    PostMessage,
    DeleteSubtree,
    InventoryStock,
    InventoryQuery,
    InventorySync,
    InventoryAlerts,
    AiAnalyze,
    AiForecast,
    AiInsights,
    DebugLocations,
    DebugDb,
}

/// Known endpoint suffixes, longest first so `/messages` wins over
/// `/message` and the two-segment suffixes win over their tails.
const SUFFIXES: &[(&str, Endpoint)] = &[
    ("/inventory/alerts", Endpoint::InventoryAlerts),
    ("/inventory/query", Endpoint::InventoryQuery),
    ("/inventory/stock", Endpoint::InventoryStock),
    ("/inventory/sync", Endpoint::InventorySync),
    ("/debug/locations", Endpoint::DebugLocations),
    ("/delete-subtree", Endpoint::DeleteSubtree),
    ("/ai/analyze", Endpoint::AiAnalyze),
    ("/ai/forecast", Endpoint::AiForecast),
    ("/ai/insights", Endpoint::AiInsights),
    ("/increment", Endpoint::Increment),
    ("/debug/db", Endpoint::DebugDb),
    ("/messages", Endpoint::Messages),
    ("/message", Endpoint::PostMessage),
    ("/state", Endpoint::State),
    ("/ws", Endpoint::Ws),
];

/// First path segments that can never be a tenant name because they belong
/// to endpoint suffixes or reserved surfaces.
const RESERVED_HEADS: &[&str] = &[
    "state",
    "increment",
    "messages",
    "message",
    "delete-subtree",
    "inventory",
    "ai",
    "debug",
    "ws",
    "healthz",
    "tenant",
];

/// The classified target of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTarget {
    pub key: OwnerKey,
    pub endpoint: Endpoint,
}

/// Derive the tenant, in order: deep host label, `/tenant/<id>/` prefix,
/// leading path segment, default.
///
/// Returns the tenant and the URL path with any consumed tenant prefix
/// removed.
pub fn derive_tenant<'a>(host: Option<&str>, path: &'a str) -> (Tenant, &'a str) {
    // Host rule: a third-or-deeper label whose leftmost label is not "www".
    if let Some(host) = host {
        let host = host.split(':').next().unwrap_or(host);
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() >= 3 && !labels[0].is_empty() && labels[0] != "www" {
            return (Tenant::new(labels[0]), path);
        }
    }

    // Explicit `/tenant/<id>/...` prefix.
    if let Some(rest) = path.strip_prefix("/tenant/") {
        if let Some((id, remainder)) = rest.split_once('/') {
            if !id.is_empty() {
                // Keep the leading slash of the remainder.
                let offset = path.len() - remainder.len() - 1;
                return (Tenant::new(id), &path[offset..]);
            }
        } else if !rest.is_empty() {
            return (Tenant::new(rest), "/");
        }
    }

    // Leading path segment, unless it is (part of) an endpoint.
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    if let (Some(first), Some(_)) = (segments.next(), segments.next()) {
        if !RESERVED_HEADS.contains(&first) {
            let offset = 1 + first.len();
            return (Tenant::new(first), &path[offset..]);
        }
    }

    (Tenant::default(), path)
}

/// Classify the URL path into an agent path plus endpoint.
///
/// The longest matching suffix wins; any `/inventory/` or `/ai/` substring
/// splits the path at its first occurrence. Paths with no endpoint return
/// `Ok(None)` (the caller answers 404).
pub fn classify(path: &str) -> Result<Option<RouteTargetParts>, ValidationError> {
    let trimmed = path.trim_end_matches('/');
    let normalized = if trimmed.is_empty() { "/" } else { trimmed };

    // Substring split for the namespaced endpoint families.
    for marker in ["/inventory/", "/ai/", "/debug/"] {
        if let Some(idx) = normalized.find(marker) {
            let (agent_part, endpoint_part) = normalized.split_at(idx);
            for (suffix, endpoint) in SUFFIXES {
                if endpoint_part == *suffix {
                    return Ok(Some(RouteTargetParts {
                        path: AgentPath::parse(agent_part)?,
                        endpoint: *endpoint,
                    }));
                }
            }
            // A namespaced marker with an unknown tail is a miss, not an
            // agent path.
            return Ok(None);
        }
    }

    for (suffix, endpoint) in SUFFIXES {
        if let Some(agent_part) = normalized.strip_suffix(suffix) {
            return Ok(Some(RouteTargetParts {
                path: AgentPath::parse(agent_part)?,
                endpoint: *endpoint,
            }));
        }
    }

    Ok(None)
}

/// An agent path plus endpoint, before the tenant is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTargetParts {
    pub path: AgentPath,
    pub endpoint: Endpoint,
}

/// Full resolution: tenant, agent path, endpoint.
pub fn resolve(host: Option<&str>, url_path: &str) -> Result<Option<RouteTarget>, ValidationError> {
    let (tenant, remainder) = derive_tenant(host, url_path);
    let parts = match classify(remainder)? {
        Some(parts) => parts,
        None => return Ok(None),
    };
    Ok(Some(RouteTarget {
        key: OwnerKey::new(tenant, parts.path),
        endpoint: parts.endpoint,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(host: Option<&str>, path: &str) -> RouteTarget {
        resolve(host, path).unwrap().unwrap()
    }

    #[test]
    fn test_suffix_classification() {
        let t = target(None, "/state");
        assert_eq!(t.endpoint, Endpoint::State);
        assert_eq!(t.key.canonical(), "demo:/");

        let t = target(None, "/org/store/state");
        assert_eq!(t.endpoint, Endpoint::State);
        assert_eq!(t.key.path.canonical(), "/org/store");
    }

    #[test]
    fn test_messages_beats_message() {
        assert_eq!(target(None, "/messages").endpoint, Endpoint::Messages);
        assert_eq!(target(None, "/message").endpoint, Endpoint::PostMessage);
        assert_eq!(target(None, "/a/messages").key.path.canonical(), "/a");
    }

    #[test]
    fn test_inventory_substring_split() {
        let t = target(None, "/org/wh/inventory/stock");
        assert_eq!(t.endpoint, Endpoint::InventoryStock);
        assert_eq!(t.key.path.canonical(), "/org/wh");

        let t = target(None, "/inventory/alerts");
        assert_eq!(t.endpoint, Endpoint::InventoryAlerts);
        assert!(t.key.path.is_root());
    }

    #[test]
    fn test_ws_upgrade_suffix() {
        let t = target(None, "/org/a/ws");
        assert_eq!(t.endpoint, Endpoint::Ws);
        assert_eq!(t.key.path.canonical(), "/org/a");

        let t = target(None, "/ws");
        assert!(t.key.path.is_root());
    }

    #[test]
    fn test_host_tenant_wins() {
        let t = target(Some("acme.fleet.example"), "/state");
        assert_eq!(t.key.tenant.as_str(), "acme");

        // www never names a tenant; two-label hosts never name a tenant.
        assert_eq!(
            target(Some("www.fleet.example"), "/state").key.tenant.as_str(),
            "demo"
        );
        assert_eq!(
            target(Some("localhost:8080"), "/state").key.tenant.as_str(),
            "demo"
        );
    }

    #[test]
    fn test_tenant_path_prefix() {
        let t = target(None, "/tenant/acme/wh/state");
        assert_eq!(t.key.tenant.as_str(), "acme");
        assert_eq!(t.key.path.canonical(), "/wh");
    }

    #[test]
    fn test_leading_segment_tenant() {
        let t = target(None, "/acme/wh/state");
        assert_eq!(t.key.tenant.as_str(), "acme");
        assert_eq!(t.key.path.canonical(), "/wh");

        // A reserved head is never a tenant.
        let t = target(None, "/inventory/stock");
        assert_eq!(t.key.tenant.as_str(), "demo");
    }

    #[test]
    fn test_trailing_slash_routes_to_same_agent() {
        let a = target(None, "/a/b/state");
        let b = target(None, "/a/b/state/");
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_path_is_none() {
        assert!(resolve(None, "/nothing/here").unwrap().is_none());
        assert!(resolve(None, "/").unwrap().is_none());
    }

    #[test]
    fn test_invalid_segment_is_error() {
        assert!(resolve(None, "/bad.seg/state").is_err());
    }

    #[test]
    fn test_percent_encoded_segment_decodes() {
        let t = target(None, "/warehouse%20ny/state");
        assert_eq!(t.key.path.canonical(), "/warehouse ny");
    }
}
