//! Configuration for dirnoded (§6 "Configuration").
//!
//! Precedence is CLI > env > config file > built-in default (§9 "Global
//! state"). Every field below is `Option` with no `default_value`, so
//! `clap`'s derive resolves CLI-vs-env on its own (an explicit `--flag`
//! always wins over its `env` counterpart); [`Config::load`] then layers
//! an optional JSON config file under that, and [`Resolved`] supplies the
//! built-in defaults from §6's table.

use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "dirnoded")]
#[command(about = "Agent-record directory node")]
pub struct Config {
    /// Path to a JSON config file, the lowest-precedence layer above
    /// built-in defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// gRPC bind address.
    #[arg(long, env = "DIRNODE_LISTEN_ADDRESS")]
    pub listen_address: Option<SocketAddr>,

    /// Liveness/health bind address.
    #[arg(long, env = "DIRNODE_HEALTH_CHECK_ADDRESS")]
    pub health_check_address: Option<SocketAddr>,

    /// libp2p overlay listen multiaddr.
    #[arg(long, env = "DIRNODE_ROUTING_LISTEN_ADDRESS")]
    pub routing_listen_address: Option<String>,

    /// Comma-separated DHT bootstrap peer multiaddrs.
    #[arg(long, env = "DIRNODE_ROUTING_BOOTSTRAP_PEERS", value_delimiter = ',')]
    pub routing_bootstrap_peers: Option<Vec<String>>,

    /// Path to this node's identity keypair. A fresh keypair is generated
    /// and left unpersisted if omitted.
    #[arg(long, env = "DIRNODE_ROUTING_KEY_PATH")]
    pub routing_key_path: Option<PathBuf>,

    /// Directory for persistent overlay state (DHT records, peerstore,
    /// label index). In-memory only if omitted.
    #[arg(long, env = "DIRNODE_ROUTING_DATASTORE_DIR")]
    pub routing_datastore_dir: Option<PathBuf>,

    /// DHT table refresh interval, seconds. Defaults to provider TTL/2.
    #[arg(long, env = "DIRNODE_ROUTING_REFRESH_INTERVAL_SECS")]
    pub routing_refresh_interval_secs: Option<u64>,

    /// Enable the §4.6 GossipSub announcement channel.
    #[arg(long, env = "DIRNODE_ROUTING_GOSSIPSUB_ENABLED")]
    pub routing_gossipsub_enabled: Option<bool>,

    /// Search index backend. Only `sqlite` is implemented.
    #[arg(long, env = "DIRNODE_DATABASE_DB_TYPE")]
    pub database_db_type: Option<String>,

    /// sqlite database file path. In-memory if omitted.
    #[arg(long, env = "DIRNODE_DATABASE_SQLITE_PATH")]
    pub database_sqlite_path: Option<PathBuf>,

    /// Enable authn (mTLS or JWT bearer) on every RPC.
    #[arg(long, env = "DIRNODE_AUTHN_ENABLED")]
    pub authn_enabled: Option<bool>,

    /// Authn mode when enabled: `mtls` or `jwt`.
    #[arg(long, env = "DIRNODE_AUTHN_MODE")]
    pub authn_mode: Option<String>,

    /// Enable the authz hook (allow-all by default regardless).
    #[arg(long, env = "DIRNODE_AUTHZ_ENABLED")]
    pub authz_enabled: Option<bool>,

    /// Workload-API (SPIFFE) socket path backing mTLS identity.
    #[arg(long, env = "DIRNODE_AUTHZ_SOCKET_PATH")]
    pub authz_socket_path: Option<String>,

    /// HMAC/RSA secret or PEM used to validate JWT bearer tokens, when
    /// `authn_mode = jwt`.
    #[arg(long, env = "DIRNODE_AUTHN_JWT_SECRET")]
    pub authn_jwt_secret: Option<String>,

    /// TLS certificate chain, PEM, required when `authn_mode = mtls`.
    #[arg(long, env = "DIRNODE_TLS_CERT_PATH")]
    pub tls_cert_path: Option<PathBuf>,

    /// TLS private key, PEM, required when `authn_mode = mtls`.
    #[arg(long, env = "DIRNODE_TLS_KEY_PATH")]
    pub tls_key_path: Option<PathBuf>,

    /// CA bundle client certificates are verified against, required when
    /// `authn_mode = mtls`.
    #[arg(long, env = "DIRNODE_TLS_CLIENT_CA_PATH")]
    pub tls_client_ca_path: Option<PathBuf>,

    /// Fulcio endpoint override for OIDC/keyless signing.
    #[arg(long, env = "DIRNODE_SIGN_FULCIO_URL")]
    pub sign_fulcio_url: Option<String>,

    /// Rekor endpoint override for OIDC/keyless signing.
    #[arg(long, env = "DIRNODE_SIGN_REKOR_URL")]
    pub sign_rekor_url: Option<String>,

    /// Timestamp authority endpoint override for OIDC/keyless signing.
    #[arg(long, env = "DIRNODE_SIGN_TSA_URL")]
    pub sign_tsa_url: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Log format: `pretty` or `json`.
    #[arg(long, env = "DIRNODE_LOG_FORMAT")]
    pub log_format: Option<String>,
}

/// The JSON config-file layer; every field optional, same names as
/// [`Config`]'s but without the CLI/env plumbing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
struct FileConfig {
    listen_address: Option<SocketAddr>,
    health_check_address: Option<SocketAddr>,
    routing_listen_address: Option<String>,
    routing_bootstrap_peers: Option<Vec<String>>,
    routing_key_path: Option<PathBuf>,
    routing_datastore_dir: Option<PathBuf>,
    routing_refresh_interval_secs: Option<u64>,
    routing_gossipsub_enabled: Option<bool>,
    database_db_type: Option<String>,
    database_sqlite_path: Option<PathBuf>,
    authn_enabled: Option<bool>,
    authn_mode: Option<String>,
    authz_enabled: Option<bool>,
    authz_socket_path: Option<String>,
    authn_jwt_secret: Option<String>,
    tls_cert_path: Option<PathBuf>,
    tls_key_path: Option<PathBuf>,
    tls_client_ca_path: Option<PathBuf>,
    sign_fulcio_url: Option<String>,
    sign_rekor_url: Option<String>,
    sign_tsa_url: Option<String>,
    log_format: Option<String>,
}

/// Fully resolved configuration: every §6 option with its built-in
/// default applied (lowest-precedence layer).
#[derive(Debug, Clone)]
pub struct Resolved {
    pub listen_address: SocketAddr,
    pub health_check_address: Option<SocketAddr>,
    pub routing_listen_address: String,
    pub routing_bootstrap_peers: Vec<String>,
    pub routing_key_path: Option<PathBuf>,
    pub routing_datastore_dir: Option<PathBuf>,
    pub routing_refresh_interval_secs: Option<u64>,
    pub routing_gossipsub_enabled: bool,
    pub database_db_type: String,
    pub database_sqlite_path: Option<PathBuf>,
    pub authn_enabled: bool,
    pub authn_mode: String,
    pub authz_enabled: bool,
    pub authz_socket_path: Option<String>,
    pub authn_jwt_secret: Option<String>,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
    pub tls_client_ca_path: Option<PathBuf>,
    pub sign_fulcio_url: String,
    pub sign_rekor_url: String,
    pub sign_tsa_url: String,
    pub log_format: String,
}

impl Config {
    /// Layer the config file (if any) under the CLI/env-resolved `Config`,
    /// then apply built-in defaults.
    pub fn load(self) -> anyhow::Result<Resolved> {
        let file = match &self.config {
            Some(path) => {
                let bytes = std::fs::read(path)?;
                serde_json::from_slice(&bytes)?
            }
            None => FileConfig::default(),
        };

        Ok(Resolved {
            listen_address: self
                .listen_address
                .or(file.listen_address)
                .unwrap_or_else(|| "0.0.0.0:8888".parse().unwrap()),
            health_check_address: self.health_check_address.or(file.health_check_address),
            routing_listen_address: self
                .routing_listen_address
                .or(file.routing_listen_address)
                .unwrap_or_else(|| "/ip4/0.0.0.0/tcp/8999".to_string()),
            routing_bootstrap_peers: self
                .routing_bootstrap_peers
                .or(file.routing_bootstrap_peers)
                .unwrap_or_default(),
            routing_key_path: self.routing_key_path.or(file.routing_key_path),
            routing_datastore_dir: self.routing_datastore_dir.or(file.routing_datastore_dir),
            routing_refresh_interval_secs: self
                .routing_refresh_interval_secs
                .or(file.routing_refresh_interval_secs),
            routing_gossipsub_enabled: self
                .routing_gossipsub_enabled
                .or(file.routing_gossipsub_enabled)
                .unwrap_or(true),
            database_db_type: self
                .database_db_type
                .or(file.database_db_type)
                .unwrap_or_else(|| "sqlite".to_string()),
            database_sqlite_path: self.database_sqlite_path.or(file.database_sqlite_path),
            authn_enabled: self.authn_enabled.or(file.authn_enabled).unwrap_or(false),
            authn_mode: self.authn_mode.or(file.authn_mode).unwrap_or_else(|| "jwt".to_string()),
            authz_enabled: self.authz_enabled.or(file.authz_enabled).unwrap_or(false),
            authz_socket_path: self.authz_socket_path.or(file.authz_socket_path),
            authn_jwt_secret: self.authn_jwt_secret.or(file.authn_jwt_secret),
            tls_cert_path: self.tls_cert_path.or(file.tls_cert_path),
            tls_key_path: self.tls_key_path.or(file.tls_key_path),
            tls_client_ca_path: self.tls_client_ca_path.or(file.tls_client_ca_path),
            sign_fulcio_url: self
                .sign_fulcio_url
                .or(file.sign_fulcio_url)
                .unwrap_or_else(|| "https://fulcio.sigstage.dev".to_string()),
            sign_rekor_url: self
                .sign_rekor_url
                .or(file.sign_rekor_url)
                .unwrap_or_else(|| "https://rekor.sigstage.dev".to_string()),
            sign_tsa_url: self
                .sign_tsa_url
                .or(file.sign_tsa_url)
                .unwrap_or_else(|| "https://timestamp.sigstage.dev".to_string()),
            log_format: self.log_format.or(file.log_format).unwrap_or_else(|| "pretty".to_string()),
        })
    }
}

/// `DIRECTORY_CLIENT_*` env vars consumed by a client library (§6
/// "Environment"). Out of scope for this server crate (§1 lists the
/// client library as an external collaborator) but the constants are
/// kept here so the names used across the workspace's docs/tests stay in
/// one place rather than drifting.
pub const ENV_CLIENT_SERVER_ADDRESS: &str = "DIRECTORY_CLIENT_SERVER_ADDRESS";
pub const ENV_CLIENT_AUTH_MODE: &str = "DIRECTORY_CLIENT_AUTH_MODE";
pub const ENV_CLIENT_SPIFFE_SOCKET_PATH: &str = "DIRECTORY_CLIENT_SPIFFE_SOCKET_PATH";
pub const ENV_CLIENT_JWT_AUDIENCE: &str = "DIRECTORY_CLIENT_JWT_AUDIENCE";
