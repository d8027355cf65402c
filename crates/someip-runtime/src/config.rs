//! Runtime configuration.
//!
//! Both nodes are configured the vsomeip way: `VSOMEIP_CONFIGURATION` points
//! at a JSON file and `VSOMEIP_APPLICATION_NAME` names the application.
//! Missing either variable is fatal at startup. Everything in the file is
//! optional; absent fields fall back to the catalog defaults.
//!
//! ```json
//! {
//!   "unicast": "127.0.0.1",
//!   "client_id": 256,
//!   "service_discovery": { "port": 30490, "peer": "127.0.0.1:30491" },
//!   "services": { "window": 30501, "door": 30502 }
//! }
//! ```

use body_protocol::catalog::ServiceSpec;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

pub const ENV_CONFIGURATION: &str = "VSOMEIP_CONFIGURATION";
pub const ENV_APPLICATION_NAME: &str = "VSOMEIP_APPLICATION_NAME";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("configuration file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    unicast: Option<IpAddr>,
    #[serde(default)]
    client_id: Option<u16>,
    #[serde(default)]
    service_discovery: Option<SdSection>,
    #[serde(default)]
    services: HashMap<String, u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SdSection {
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    peer: Option<SocketAddr>,
}

/// Resolved runtime configuration for one node.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub application_name: String,
    /// Local address all sockets bind to.
    pub unicast: IpAddr,
    /// SD bind port; `None` means the node's role default.
    pub sd_port: Option<u16>,
    /// Where the provider announces offers; clients reply to the offer's
    /// source address instead.
    pub sd_peer: Option<SocketAddr>,
    pub client_id: u16,
    /// Per-service TCP port overrides, keyed by catalog name.
    pub service_ports: HashMap<String, u16>,
}

impl RuntimeConfig {
    /// Load from `VSOMEIP_CONFIGURATION` + `VSOMEIP_APPLICATION_NAME`.
    pub fn from_env() -> Result<RuntimeConfig, ConfigError> {
        let path = std::env::var(ENV_CONFIGURATION)
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingEnv(ENV_CONFIGURATION))?;
        let application_name = std::env::var(ENV_APPLICATION_NAME)
            .map_err(|_| ConfigError::MissingEnv(ENV_APPLICATION_NAME))?;

        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let file: ConfigFile =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })?;

        Ok(RuntimeConfig::resolve(application_name, file))
    }

    /// In-process configuration, used by tests and embedded setups.
    pub fn for_application(application_name: impl Into<String>) -> RuntimeConfig {
        RuntimeConfig::resolve(application_name.into(), ConfigFile::default())
    }

    fn resolve(application_name: String, file: ConfigFile) -> RuntimeConfig {
        let sd = file.service_discovery.unwrap_or_default();
        RuntimeConfig {
            application_name,
            unicast: file.unicast.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            sd_port: sd.port,
            sd_peer: sd.peer,
            client_id: file.client_id.unwrap_or(0x0100),
            service_ports: file.services,
        }
    }

    /// SD bind address with the role's default port filled in.
    pub fn sd_bind_or(&self, default_port: u16) -> SocketAddr {
        SocketAddr::new(self.unicast, self.sd_port.unwrap_or(default_port))
    }

    pub fn sd_peer_or(&self, default: SocketAddr) -> SocketAddr {
        self.sd_peer.unwrap_or(default)
    }

    /// Method port for a service: override, or the catalog default.
    pub fn port_for(&self, spec: &ServiceSpec) -> u16 {
        self.service_ports
            .get(spec.name)
            .copied()
            .unwrap_or(spec.default_port)
    }
}
