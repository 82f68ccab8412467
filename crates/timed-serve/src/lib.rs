//! > An HTTP Static File Server that goes away on its own
//!
//! `timed-serve` serves a directory for as long as requests keep arriving.  Once no new
//! connection shows up within the idle timeout, the server shuts down and releases its socket.
//! It prioritizes small size and compile times over speed, scalability, or security.
//!
//! # Example
//!
//! ```rust,no_run
//! # fn main() -> Result<(), timed_serve::Error> {
//! let mut builder = timed_serve::ServerBuilder::new("public");
//! builder.port(8000).idle_timeout(std::time::Duration::from_secs(60));
//! let server = builder.build()?;
//!
//! println!("See http://{}", server.addr());
//!
//! let shutdown = server.serve();
//! println!("{shutdown}");
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod respond;

use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Listen on all interfaces unless told otherwise
pub const DEFAULT_HOSTNAME: &str = "0.0.0.0";

/// How long the server waits for a new connection before shutting down
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

const RELEASE_TIMEOUT: Duration = Duration::from_secs(2);
const RELEASE_POLL: Duration = Duration::from_millis(1);

/// Custom server settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerBuilder {
    source: std::path::PathBuf,
    hostname: Option<String>,
    port: Option<u16>,
    idle_timeout: Duration,
}

impl ServerBuilder {
    pub fn new(source: impl Into<std::path::PathBuf>) -> Self {
        Self {
            source: source.into(),
            hostname: None,
            port: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Override the hostname
    pub fn hostname(&mut self, hostname: impl Into<String>) -> &mut Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Override the port
    ///
    /// By default, the operating system assigns an ephemeral port.
    pub fn port(&mut self, port: u16) -> &mut Self {
        self.port = Some(port);
        self
    }

    /// Override how long to wait for each new connection
    pub fn idle_timeout(&mut self, idle_timeout: Duration) -> &mut Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Bind the listening socket
    ///
    /// Failing to bind is fatal; the caller decides whether to pick another port.
    pub fn build(&self) -> Result<Server, Error> {
        let hostname = self.hostname.as_deref().unwrap_or(DEFAULT_HOSTNAME);
        let requested = format!("{}:{}", hostname, self.port.unwrap_or(0));
        let server = tiny_http::Server::http(requested.as_str()).map_err(|e| {
            Error::new(ErrorKind::Bind, format!("failed to bind {requested}: {e}"))
        })?;
        let addr = server.server_addr().to_ip().ok_or_else(|| {
            Error::new(
                ErrorKind::Bind,
                format!("{requested} did not resolve to an IP socket"),
            )
        })?;
        log::debug!("Bound {addr} for {}", self.source.display());

        Ok(Server {
            source: self.source.clone(),
            addr,
            idle_timeout: self.idle_timeout,
            server: Arc::new(server),
            interrupted: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// A bound static file server
///
/// Dropping the server (including through [`Server::serve`] returning) closes the socket.
pub struct Server {
    source: std::path::PathBuf,
    addr: std::net::SocketAddr,
    idle_timeout: Duration,
    server: Arc<tiny_http::Server>,
    interrupted: Arc<AtomicBool>,
}

impl Server {
    /// The location being served
    pub fn source(&self) -> &std::path::Path {
        self.source.as_path()
    }

    /// The address the server is bound to
    ///
    /// When no port was requested, this carries the one the operating system assigned.
    pub fn addr(&self) -> std::net::SocketAddr {
        self.addr
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Handle for stopping [`Server::serve`] from another thread, e.g. a Ctrl-C handler
    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            interrupted: Arc::clone(&self.interrupted),
            server: Arc::downgrade(&self.server),
        }
    }

    /// Serve requests, one at a time, until idle or interrupted
    ///
    /// Each wait for a connection restarts the idle timer, so this stops after `idle_timeout`
    /// without activity rather than after a fixed total time.
    ///
    /// The listening socket is closed by the time this returns.
    pub fn serve(self) -> Shutdown {
        let shutdown = loop {
            match self.wait() {
                Event::Request(request) => {
                    if let Err(e) = respond::static_file_handler(self.source(), request) {
                        log::error!("{e}");
                    }
                }
                Event::IdleTimeout => break Shutdown::IdleTimeout,
                Event::Interrupted => break Shutdown::Interrupted,
            }
        };
        log::debug!("Closing {} ({shutdown:?})", self.addr);

        let Self { server, addr, .. } = self;
        drop(server);
        wait_for_release(addr);

        shutdown
    }

    fn wait(&self) -> Event {
        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                return Event::Interrupted;
            }
            match self.server.recv_timeout(self.idle_timeout) {
                Ok(Some(request)) => return Event::Request(request),
                // `unblock` wakes us without a request, same as an elapsed timeout
                Ok(None) if self.interrupted.load(Ordering::SeqCst) => {
                    return Event::Interrupted;
                }
                Ok(None) => return Event::IdleTimeout,
                Err(e) => {
                    log::warn!("Failed to accept connection: {e}");
                }
            }
        }
    }
}

/// Block until the listener on `addr` is closed
///
/// tiny_http closes its listener on the accept thread after the server is dropped, so rebinding
/// is the only way to observe it.
fn wait_for_release(addr: std::net::SocketAddr) {
    let start = Instant::now();
    loop {
        match std::net::TcpListener::bind(addr) {
            Ok(_) => {
                log::trace!("Released {addr} after {:?}", start.elapsed());
                return;
            }
            Err(e) if RELEASE_TIMEOUT <= start.elapsed() => {
                log::warn!("{addr} still held after closing: {e}");
                return;
            }
            Err(_) => std::thread::sleep(RELEASE_POLL),
        }
    }
}

enum Event {
    Request(tiny_http::Request),
    IdleTimeout,
    Interrupted,
}

/// Why [`Server::serve`] stopped
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Shutdown {
    /// No connection arrived within the idle timeout
    IdleTimeout,
    /// [`Interrupter::interrupt`] was called
    Interrupted,
}

impl std::fmt::Display for Shutdown {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdleTimeout => "Timeout reached.".fmt(fmt),
            Self::Interrupted => "Interrupt received.".fmt(fmt),
        }
    }
}

/// Stops a running [`Server`]
///
/// Only weakly tied to the server so a lingering handle never keeps the socket open.
#[derive(Clone, Debug)]
pub struct Interrupter {
    interrupted: Arc<AtomicBool>,
    server: Weak<tiny_http::Server>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        if let Some(server) = self.server.upgrade() {
            server.unblock();
        }
    }
}

/// Serve Error
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    fn new(kind: ErrorKind, message: impl ToString) -> Self {
        Self {
            kind,
            message: message.to_string(),
            source: None,
        }
    }

    fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.message.fmt(fmt)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The listening socket could not be created
    Bind,
    /// A request could not be answered
    Respond,
}
