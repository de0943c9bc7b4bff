//! Command line configuration

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::discovery;
use crate::error::AppError;

/// Default listening port
pub const DEFAULT_PORT: u16 = 50000;

/// Default path of the `<host>:<port>` record
pub const DEFAULT_DISCOVERY_FILE: &str = "chatserver.txt";

/// Default remote endpoint used to pick the outbound interface
pub const DEFAULT_PROBE: &str = "8.8.8.8:80";

/// Default pending connection queue length
pub const DEFAULT_BACKLOG: u32 = 10;

/// Broadcast chat server - fans every message out to all connected peers
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to listen on instead of the discovered outbound address
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// File that receives the `<host>:<port>` record
    #[arg(short = 'f', long, default_value = DEFAULT_DISCOVERY_FILE)]
    pub discovery_file: PathBuf,

    /// Remote address used to find the outbound interface (nothing is sent)
    #[arg(long, default_value = DEFAULT_PROBE)]
    pub probe: String,

    /// Pending connection queue length
    #[arg(long, default_value_t = DEFAULT_BACKLOG)]
    pub backlog: u32,
}

impl Config {
    /// Address to bind: `--host` if given, otherwise the discovered one
    pub async fn listen_addr(&self) -> Result<SocketAddr, AppError> {
        let host = match self.host {
            Some(host) => host,
            None => discovery::outbound_ip(&self.probe).await?,
        };
        Ok(SocketAddr::new(host, self.port))
    }
}
