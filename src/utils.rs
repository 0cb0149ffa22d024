use crate::peer::types::ServerConfig;

/// Add the protocol scheme to an ICE server URL when it is missing
pub fn add_ice_url_scheme(config: &ServerConfig) -> String {
    if config.url.starts_with("turn:")
        || config.url.starts_with("turns:")
        || config.url.starts_with("stun:")
        || config.url.starts_with("stuns:")
    {
        config.url.clone()
    } else {
        let scheme = if config.r#type == "turn" {
            "turn:"
        } else {
            "stun:"
        };
        format!("{}{}", scheme, config.url)
    }
}

/// Server type implied by a URL; bare `host:port` counts as STUN.
pub fn ice_server_type(url: &str) -> &'static str {
    if url.starts_with("turn:") || url.starts_with("turns:") {
        "turn"
    } else {
        "stun"
    }
}
