// Port-bind retry: the only operation in the service that is retried

use std::io::ErrorKind;
use tokio::net::TcpListener;
use tracing::warn;

/// Bind `host:port`, moving on to the next port each time the address is
/// already in use, for at most `attempts` extra ports. Any other bind error
/// is returned immediately.
pub async fn bind_with_port_fallback(
    host: &str,
    port: u16,
    attempts: u16,
) -> std::io::Result<TcpListener> {
    let mut port = port;
    let mut remaining = attempts;

    loop {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => return Ok(listener),
            Err(error) if error.kind() == ErrorKind::AddrInUse && remaining > 0 && port < u16::MAX => {
                warn!(port, "Port already in use, trying the next one");
                port += 1;
                remaining -= 1;
            }
            Err(error) => return Err(error),
        }
    }
}
