//! PAC serving: per-connection entry point and a small listener.
//!
//! [`PacServer::send`] is what the proxy calls once it has decided that a
//! client asked for the PAC file. It works out which proxy address that
//! client should be told about, renders the document from the current
//! direct-list snapshot and writes it out in one go.
//!
//! [`PacServer::start`] additionally runs a bare listener that answers
//! `GET /pac` and nothing else, for deployments where the PAC file is
//! served on its own port.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use bypass_core::TopLevelDomainTable;

use crate::config::PacConfig;
use crate::direct_list::DirectListStore;
use crate::error::{PacError, Result};
use crate::pac::PacRenderer;

/// Path browsers are pointed at for the PAC file.
pub const PAC_PATH: &str = "/pac";

/// Upper bound on request head bytes (request line and headers) read
/// before giving up.
const MAX_HEADER_SIZE: usize = 16 * 1024;

/// Time a client gets to send its request head.
const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(10);

const NOT_FOUND_RESPONSE: &str = "HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n";

/// Proxy address advertised in PAC documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacEndpoint {
    /// Explicitly configured address, used verbatim when set.
    addr_in_pac: Option<String>,
    /// Port the proxy listens on.
    listen_port: u16,
}

impl PacEndpoint {
    /// Creates an endpoint that derives the address from each connection.
    pub fn new(listen_port: u16) -> Self {
        Self {
            addr_in_pac: None,
            listen_port,
        }
    }

    /// Sets (or clears) the explicitly configured address.
    pub fn with_addr_in_pac(mut self, addr: Option<String>) -> Self {
        self.addr_in_pac = addr.filter(|a| !a.is_empty());
        self
    }

    pub fn addr_in_pac(&self) -> Option<&str> {
        self.addr_in_pac.as_deref()
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    /// Address to advertise to a client connected on `local_addr`.
    ///
    /// Without an explicit address the client is told to use the local IP
    /// it reached us on, paired with the proxy's listen port. IPv4 clients
    /// of a dual-stack listener get the plain IPv4 address; other IPv6
    /// hosts are bracketed.
    pub fn proxy_addr(&self, local_addr: SocketAddr) -> String {
        match &self.addr_in_pac {
            Some(addr) => addr.clone(),
            None => SocketAddr::new(local_addr.ip().to_canonical(), self.listen_port).to_string(),
        }
    }
}

/// A client connection a PAC document can be written to.
pub trait PacConnection: AsyncWrite + Unpin + Send {
    /// Local address of the connection.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Remote (client) address of the connection.
    fn remote_addr(&self) -> io::Result<SocketAddr>;
}

impl PacConnection for TcpStream {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::local_addr(self)
    }

    fn remote_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }
}

/// Returns true if `request_line` is a `GET` for the PAC path.
///
/// Accepts an optional query string and any `HTTP/x` version.
pub fn is_pac_request(request_line: &str) -> bool {
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if parts.next().is_some() || method != "GET" || !version.starts_with("HTTP/") {
        return false;
    }
    let path = target.split('?').next().unwrap_or(target);
    path == PAC_PATH
}

/// Serves PAC documents built from the live direct list.
#[derive(Debug, Clone)]
pub struct PacServer {
    renderer: PacRenderer,
    store: DirectListStore,
    endpoint: PacEndpoint,
}

impl PacServer {
    /// Creates a server from its parts.
    pub fn new(renderer: PacRenderer, store: DirectListStore, endpoint: PacEndpoint) -> Self {
        Self {
            renderer,
            store,
            endpoint,
        }
    }

    /// Creates a server from configuration.
    ///
    /// Compiles the PAC template; an error here means the subsystem cannot
    /// run at all.
    pub fn from_config(
        config: &PacConfig,
        table: &TopLevelDomainTable,
        store: DirectListStore,
    ) -> Result<Self> {
        config.validate()?;
        let renderer = PacRenderer::new(table, &config.server_name)?;
        Ok(Self::new(renderer, store, config.endpoint()?))
    }

    /// Renders the full response for a client connected on `local_addr`.
    pub fn generate(&self, local_addr: SocketAddr) -> Result<Vec<u8>> {
        self.render_for(&self.endpoint.proxy_addr(local_addr))
    }

    fn render_for(&self, proxy_addr: &str) -> Result<Vec<u8>> {
        let snapshot = self.store.snapshot();
        self.renderer.render(&snapshot, proxy_addr)
    }

    /// Renders a PAC document for `conn` and writes it.
    ///
    /// Nothing is written if the document cannot be produced. Returns the
    /// number of bytes written.
    pub async fn send<C: PacConnection>(&self, conn: &mut C) -> Result<usize> {
        let remote = conn
            .remote_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // The local address is only needed when no address is configured
        let proxy_addr = match self.endpoint.addr_in_pac() {
            Some(addr) => addr.to_string(),
            None => {
                let local_addr = conn.local_addr().map_err(|e| {
                    error!("cli({}) cannot determine local address for PAC: {}", remote, e);
                    PacError::AddressDerivation(format!("local address unavailable: {}", e))
                })?;
                self.endpoint.proxy_addr(local_addr)
            }
        };

        let doc = self.render_for(&proxy_addr).map_err(|e| {
            error!("cli({}) error generating PAC: {}", remote, e);
            e
        })?;

        if let Err(e) = write_all(conn, &doc).await {
            debug!("cli({}) error sending PAC: {}", remote, e);
            return Err(e.into());
        }
        debug!("cli({}) sent PAC ({} bytes)", remote, doc.len());
        Ok(doc.len())
    }

    /// Reads one request from `stream` and answers it.
    ///
    /// `GET /pac` gets the PAC document, anything else a 404. The
    /// connection is closed afterwards either way, and also when the
    /// request head is too large or arrives too slowly.
    pub async fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        let head = tokio::time::timeout(HEADER_READ_TIMEOUT, read_request_line(&mut stream)).await;
        let request_line = match head {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => return Ok(()),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                debug!("Timed out reading request headers");
                return Ok(());
            }
        };

        if is_pac_request(&request_line) {
            self.send(&mut stream).await?;
        } else {
            debug!("Not a PAC request: {:?}", request_line);
            write_all(&mut stream, NOT_FOUND_RESPONSE.as_bytes()).await?;
        }
        Ok(())
    }

    /// Binds `addr` and serves PAC requests in the background.
    pub async fn start(self, addr: SocketAddr) -> Result<PacHandle> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("PAC server listening on {}", local_addr);

        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let handle = tokio::spawn(accept_loop(listener, Arc::new(self), shutdown_rx));

        Ok(PacHandle {
            shutdown_tx,
            addr: local_addr,
            handle,
        })
    }
}

/// Reads the request head and returns its request line.
///
/// At most `MAX_HEADER_SIZE` bytes are read in total. Returns `None` if the
/// client disconnected before finishing the request line or the head does
/// not fit.
async fn read_request_line<R: AsyncRead + Unpin>(stream: &mut R) -> io::Result<Option<String>> {
    let mut reader = BufReader::new(stream.take(MAX_HEADER_SIZE as u64));

    let mut request_line = Vec::new();
    reader.read_until(b'\n', &mut request_line).await?;
    if !request_line.ends_with(b"\n") {
        if reader.get_ref().limit() == 0 {
            warn!("Request line too large, closing connection");
        }
        return Ok(None);
    }

    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).await?;
        if !line.ends_with(b"\n") && reader.get_ref().limit() == 0 {
            warn!("Request headers too large, closing connection");
            return Ok(None);
        }
        if n == 0 || line.iter().all(u8::is_ascii_whitespace) {
            break;
        }
    }

    let request_line = String::from_utf8_lossy(&request_line);
    Ok(Some(request_line.trim_end().to_string()))
}

async fn write_all<W: AsyncWrite + Unpin>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    out.write_all(bytes).await?;
    out.flush().await
}

/// Accepts connections until shutdown, one task per connection.
async fn accept_loop(
    listener: TcpListener,
    server: Arc<PacServer>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!("Accepted connection from {}", addr);
                        let server = Arc::clone(&server);
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream).await {
                                debug!("Connection handler error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Accept error: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("PAC server shutting down");
                return;
            }
        }
    }
}

/// Handle for a running PAC listener.
///
/// Dropping the handle also stops the listener.
pub struct PacHandle {
    shutdown_tx: broadcast::Sender<()>,
    addr: SocketAddr,
    handle: tokio::task::JoinHandle<()>,
}

impl PacHandle {
    /// Returns the address the listener is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signals the listener to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Waits for the listener to finish.
    pub async fn wait(self) {
        let _ = self.handle.await;
    }

    /// Shuts down the listener and waits for it to finish.
    pub async fn stop(self) {
        self.shutdown();
        self.wait().await;
    }
}
