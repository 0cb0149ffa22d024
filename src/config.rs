use crate::logger::LogLevel;
use crate::peer::connection::PeerOptions;
use crate::peer::types::{ExpectedChannelSet, Role, ServerConfig};
use crate::session::SessionOptions;
use crate::signaling::ExchangeFormat;
use crate::utils::ice_server_type;
use clap::Parser;
use std::time::Duration;

/// Public STUN servers used when none are configured
pub const DEFAULT_ICE_SERVERS: [&str; 5] = [
    "stun:stun1.l.google.com:19302",
    "stun:stun.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
    "stun:stun3.l.google.com:19302",
    "stun:stun4.l.google.com:19302",
];

pub const DEFAULT_LABEL: &str = "chat";

/// Serverless WebRTC chat. Run one side with `--create`, the other without,
/// and copy the offer and answer between the two terminals.
#[derive(Parser, Debug, Clone)]
#[command(name = "paste-rtc", version, about)]
pub struct Cli {
    /// Create the offer (initiator). Without it, paste an offer and answer it.
    #[arg(long)]
    pub create: bool,

    /// STUN/TURN server URL; repeat for several. `stun:` is assumed when no
    /// scheme is given.
    #[arg(
        long = "ice-server",
        value_name = "URL",
        env = "PASTE_RTC_ICE_SERVERS",
        value_delimiter = ','
    )]
    pub ice_servers: Vec<String>,

    /// Username for TURN servers
    #[arg(long, env = "PASTE_RTC_ICE_USERNAME", requires = "ice_credential")]
    pub ice_username: Option<String>,

    /// Credential for TURN servers
    #[arg(long, env = "PASTE_RTC_ICE_CREDENTIAL", requires = "ice_username")]
    pub ice_credential: Option<String>,

    /// Gather host candidates only (LAN or same machine)
    #[arg(long, conflicts_with = "ice_servers")]
    pub no_ice_servers: bool,

    /// Label of the chat data channel
    #[arg(long, default_value = DEFAULT_LABEL)]
    pub label: String,

    /// Print the description as base64(gzip(JSON)) instead of plain JSON
    #[arg(long)]
    pub compact: bool,

    /// Seconds to wait for candidate gathering; 0 waits forever
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub gather_timeout: u64,

    /// Log verbosity (RUST_LOG overrides)
    #[arg(long, value_enum, default_value_t = LogLevel::Info, env = "PASTE_RTC_LOG")]
    pub log_level: LogLevel,
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub role: Role,
    pub peer: PeerOptions,
    pub session: SessionOptions,
    pub format: ExchangeFormat,
    pub log_level: LogLevel,
}

impl Cli {
    pub fn into_config(self) -> Config {
        let urls: Vec<String> = if self.no_ice_servers {
            Vec::new()
        } else if self.ice_servers.is_empty() {
            DEFAULT_ICE_SERVERS.iter().map(|s| s.to_string()).collect()
        } else {
            self.ice_servers
        };

        let ice_servers = urls
            .into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .map(|url| {
                let kind = ice_server_type(&url);
                let (username, credential) = if kind == "turn" {
                    (self.ice_username.clone(), self.ice_credential.clone())
                } else {
                    (None, None)
                };
                ServerConfig {
                    r#type: kind.to_string(),
                    url,
                    username,
                    credential,
                }
            })
            .collect();

        Config {
            role: if self.create {
                Role::Initiator
            } else {
                Role::Responder
            },
            peer: PeerOptions {
                ice_servers,
                include_loopback: self.no_ice_servers,
            },
            session: SessionOptions {
                expected: ExpectedChannelSet::single(self.label),
                gather_timeout: (self.gather_timeout > 0)
                    .then(|| Duration::from_secs(self.gather_timeout)),
            },
            format: if self.compact {
                ExchangeFormat::Compact
            } else {
                ExchangeFormat::Json
            },
            log_level: self.log_level,
        }
    }
}
