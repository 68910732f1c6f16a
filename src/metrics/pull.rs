//! Pull-mode metrics transport
//!
//! A minimal blocking HTTP listener on a background thread serving the text
//! exposition format at /metrics (plus /healthz for liveness probes). The
//! listener is bound at startup so a bad port fails fast; per-connection
//! errors are logged and the accept loop continues.

use super::Metrics;
use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Poll interval for the non-blocking accept loop in milliseconds.
const ACCEPT_POLL_INTERVAL_MS: u64 = 100;

/// Bind the metrics port and spawn the scrape endpoint thread.
pub fn spawn_metrics_server(
    metrics: Arc<Metrics>,
    port: u16,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .with_context(|| format!("Failed to bind metrics port {port}"))?;
    listener
        .set_nonblocking(true)
        .context("Failed to set metrics listener non-blocking")?;

    tracing::info!(port, "Serving Prometheus metrics at /metrics");

    Ok(thread::spawn(move || {
        run_accept_loop(listener, metrics, shutdown_flag);
    }))
}

fn run_accept_loop(listener: TcpListener, metrics: Arc<Metrics>, shutdown_flag: Arc<AtomicBool>) {
    while !shutdown_flag.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, _addr)) => {
                if let Err(e) = handle_connection(stream, &metrics) {
                    tracing::warn!("Metrics connection error: {e}");
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(ACCEPT_POLL_INTERVAL_MS));
            }
            Err(e) => {
                tracing::warn!("Metrics accept error: {e}");
                thread::sleep(Duration::from_millis(ACCEPT_POLL_INTERVAL_MS));
            }
        }
    }
}

fn handle_connection(stream: TcpStream, metrics: &Metrics) -> Result<()> {
    // Accepted sockets can inherit the listener's non-blocking mode on some
    // platforms; this connection is handled synchronously.
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    // Drain headers; scrapers send a plain GET with no body
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("");
    match path {
        "/metrics" => {
            let body = metrics.gather_text()?;
            write_response(
                stream,
                "200 OK",
                "text/plain; version=0.0.4; charset=utf-8",
                &body,
            )
        }
        "/healthz" => write_response(stream, "200 OK", "text/plain", "ok\n"),
        _ => write_response(stream, "404 Not Found", "text/plain", "not found\n"),
    }
}

fn write_response(
    mut stream: TcpStream,
    status: &str,
    content_type: &str,
    body: &str,
) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes())?;
    stream.flush()?;
    Ok(())
}
