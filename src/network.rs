//! Connectivity pre-check.

use log::debug;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::defaults::{CONNECTIVITY_TARGET, CONNECTIVITY_TIMEOUT};
use crate::error::{Error, Result};

/// Answers whether the remote side of the project is reachable.
pub trait Connectivity {
    fn check(&self) -> Result<()>;
}

/// Opens a TCP connection to `target` within `timeout`.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    pub target: String,
    pub timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            target: CONNECTIVITY_TARGET.to_string(),
            timeout: CONNECTIVITY_TIMEOUT,
        }
    }
}

impl Connectivity for TcpProbe {
    fn check(&self) -> Result<()> {
        check_connectivity(&self.target, self.timeout)
    }
}

/// Succeeds when any address of `target` accepts a connection.
pub fn check_connectivity(target: &str, timeout: Duration) -> Result<()> {
    let fail = |message: String| Error::Network {
        target: target.to_string(),
        message,
    };

    let addrs = target
        .to_socket_addrs()
        .map_err(|e| fail(format!("cannot resolve: {}", e)))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => {
                debug!("(CHECKED) Internet connection is available");
                return Ok(());
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(fail(match last_error {
        Some(e) => e.to_string(),
        None => "no address found".to_string(),
    }))
}
