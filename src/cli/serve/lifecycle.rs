//! Server lifecycle management.

use crate::{actor::Coordinator, log};
use anyhow::Result;
use std::{
    net::{IpAddr, SocketAddr, TcpListener},
    thread::{self, JoinHandle},
    time::Duration,
};
use tiny_http::Server;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Bind an HTTP server to the interface, moving up from `base_port` while
/// ports are taken.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    retry_ports(interface, base_port, |addr| {
        let server = Server::http(addr).map_err(|e| anyhow::anyhow!("{e}"))?;
        let addr = server.server_addr().to_ip().unwrap_or(addr);
        Ok((server, addr))
    })
}

/// Bind a raw TCP listener (WebSocket endpoint) the same way.
pub fn bind_listener(interface: IpAddr, base_port: u16) -> Result<(TcpListener, SocketAddr)> {
    retry_ports(interface, base_port, |addr| {
        let listener = TcpListener::bind(addr)?;
        let addr = listener.local_addr()?;
        Ok((listener, addr))
    })
}

fn retry_ports<T>(
    interface: IpAddr,
    base_port: u16,
    mut bind: impl FnMut(SocketAddr) -> Result<(T, SocketAddr)>,
) -> Result<(T, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match bind(SocketAddr::new(interface, port)) {
            Ok(bound) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok(bound);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Run the actor system on its own thread with its own tokio runtime.
pub fn spawn_actors(coordinator: Coordinator) -> JoinHandle<()> {
    thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                log!("actor"; "failed to create tokio runtime: {}", e);
                return;
            }
        };

        rt.block_on(async {
            if let Err(e) = coordinator.run().await {
                log!("actor"; "error: {}", e);
            }
        });
    })
}

/// Wait for actor system to shutdown gracefully (max 2 seconds).
pub fn wait_for_shutdown(handle: JoinHandle<()>) {
    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_bind_listener_skips_taken_port() {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let (taken, taken_addr) = bind_listener(localhost, 0).unwrap();

        let (_second, addr) = bind_listener(localhost, taken_addr.port()).unwrap();
        assert_ne!(addr.port(), taken_addr.port());
        drop(taken);
    }
}
