use clap::Parser;
use std::path::PathBuf;

/// Camera/admin WebRTC signaling relay
#[derive(Parser, Clone, Debug)]
#[command(name = "cam-signal", version, about = "Camera/admin WebRTC signaling relay")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// PEM certificate chain (e.g. from mkcert)
    #[arg(long, env = "TLS_CERT", default_value = "certs/cert.pem")]
    pub tls_cert: PathBuf,

    /// PEM private key
    #[arg(long, env = "TLS_KEY", default_value = "certs/key.pem")]
    pub tls_key: PathBuf,

    /// Serve plain HTTP/WS instead of HTTPS/WSS
    #[arg(long, env = "INSECURE")]
    pub insecure: bool,

    /// Static files served at the root, if the directory exists
    #[arg(long, env = "PUBLIC_DIR", default_value = "public")]
    pub public_dir: PathBuf,

    /// Where uploaded recordings are stored
    #[arg(long, env = "RECORDINGS_DIR", default_value = "recordings")]
    pub recordings_dir: PathBuf,

    /// Structured JSON logs instead of pretty output
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse CLI flags, falling back to the environment (`.env` included).
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }
}
