//! HTTP metrics server
//!
//! Minimal HTTP/1.1 server over std sockets. Connections are served one at a
//! time on the calling thread; each `/metrics` request runs one full scrape.
//!
//! ```bash
//! numa-exporter serve --bind 0.0.0.0 --port 9109
//! ```

use crate::api::handlers::{route_request, HttpResponse};
use crate::error::{NumaExporterError, Result};
use crate::reconcile::ResourceReconciler;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Per-connection read/write budget
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves `/metrics` and `/health`
pub struct MetricsServer {
    listener: TcpListener,
    addr: String,
    reconciler: ResourceReconciler,
    shutdown: Arc<AtomicBool>,
}

impl MetricsServer {
    /// Bind the listening socket
    pub fn bind(bind: &str, port: u16, reconciler: ResourceReconciler) -> Result<Self> {
        let addr = format!("{}:{}", bind, port);
        let listener =
            TcpListener::bind(&addr).map_err(|e| NumaExporterError::connection(&addr, e.to_string()))?;

        listener
            .set_nonblocking(true)
            .map_err(|e| NumaExporterError::connection(&addr, e.to_string()))?;

        Ok(Self {
            listener,
            addr,
            reconciler,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| NumaExporterError::connection(&self.addr, e.to_string()))
    }

    /// Get shutdown flag for external control
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run the server (blocking)
    pub fn run(&self) -> Result<()> {
        tracing::info!("Serving metrics on http://{}/metrics", self.addr);

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = self.handle_connection(stream) {
                        tracing::warn!("Connection from {} failed: {}", peer, e);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    tracing::warn!("Accept error: {}", e);
                }
            }
        }

        tracing::info!("Metrics server shutting down");
        Ok(())
    }

    /// Handle a single HTTP connection
    fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let io_err = |e: std::io::Error| NumaExporterError::connection(&peer, e.to_string());

        stream.set_nonblocking(false).map_err(io_err)?;
        stream.set_read_timeout(Some(CONNECTION_TIMEOUT)).map_err(io_err)?;
        stream.set_write_timeout(Some(CONNECTION_TIMEOUT)).map_err(io_err)?;

        let mut reader = BufReader::new(stream.try_clone().map_err(io_err)?);

        let mut request_line = String::new();
        reader.read_line(&mut request_line).map_err(io_err)?;

        // Drain headers; requests carry no body we care about
        loop {
            let mut line = String::new();
            let read = reader.read_line(&mut line).map_err(io_err)?;
            if read == 0 || line.trim().is_empty() {
                break;
            }
        }

        let mut parts = request_line.split_whitespace();
        let response = match (parts.next(), parts.next()) {
            (Some(method), Some(path)) => {
                tracing::debug!("{} {} from {}", method, path, peer);
                route_request(method, path, &self.reconciler)
            }
            _ => HttpResponse {
                status: 400,
                content_type: "text/plain",
                body: "bad request\n".to_string(),
            },
        };

        send_response(&mut stream, &response).map_err(io_err)
    }
}

/// Write an HTTP response and close the exchange
fn send_response(stream: &mut TcpStream, response: &HttpResponse) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: {}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n",
        response.status,
        response.status_text(),
        response.content_type,
        response.body.len(),
    );

    stream.write_all(head.as_bytes())?;
    stream.write_all(response.body.as_bytes())?;
    stream.flush()
}
