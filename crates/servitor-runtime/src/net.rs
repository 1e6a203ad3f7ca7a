//! Non-blocking TCP connect and URL splitting

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

/// Start a TCP connect without waiting for it to complete.
///
/// The returned socket is non-blocking; it becomes writable once the
/// connection is established.
pub fn connect(host: &str, port: u16) -> io::Result<Socket> {
    let addr: SocketAddr = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address for {}:{}", host, port),
        )
    })?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nonblocking(true)?;
    socket.set_nodelay(true)?;

    match socket.connect(&addr.into()) {
        Ok(()) => {}
        Err(err) if connect_pending(&err) => {}
        Err(err) => return Err(err),
    }
    tracing::debug!(%addr, "connect started");
    Ok(socket)
}

fn connect_pending(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    matches!(
        err.raw_os_error(),
        Some(libc::EINPROGRESS) | Some(libc::EALREADY) | Some(libc::EISCONN)
    )
}

/// Host and port of an `http://host[:port]/path` style URL.
///
/// A missing scheme is tolerated; the port defaults to 80 (443 for `https`).
pub fn host_port(url: &str) -> Option<(String, u16)> {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", url),
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit('@').next().unwrap_or_default();
    if authority.is_empty() {
        return None;
    }

    let default_port = if scheme.eq_ignore_ascii_case("https") {
        443
    } else {
        80
    };

    // [v6]:port
    if let Some(stripped) = authority.strip_prefix('[') {
        let (host, tail) = stripped.split_once(']')?;
        let port = match tail.strip_prefix(':') {
            Some(port) => port.parse().ok()?,
            None => default_port,
        };
        return Some((host.to_string(), port));
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => Some((host.to_string(), port.parse().ok()?)),
        None => Some((authority.to_string(), default_port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_host_port() {
        assert_eq!(
            host_port("http://localhost/"),
            Some(("localhost".to_string(), 80))
        );
        assert_eq!(
            host_port("http://127.0.0.1:8080/index.html"),
            Some(("127.0.0.1".to_string(), 8080))
        );
        assert_eq!(
            host_port("https://example.org"),
            Some(("example.org".to_string(), 443))
        );
        assert_eq!(
            host_port("user@host:81/x"),
            Some(("host".to_string(), 81))
        );
        assert_eq!(host_port("http://[::1]:9000/"), Some(("::1".to_string(), 9000)));
        assert_eq!(host_port("http:///path"), None);
        assert_eq!(host_port("http://host:port/"), None);
    }

    #[test]
    fn test_connect_nonblocking() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let socket = connect("127.0.0.1", port).unwrap();
        let (_accepted, _) = listener.accept().unwrap();
        assert!(socket.nodelay().unwrap());
    }

    #[test]
    fn test_connect_unresolvable() {
        assert!(connect("definitely-not-a-host.invalid", 80).is_err());
    }
}
