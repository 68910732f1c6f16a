//! Push-mode metrics transport
//!
//! A background thread that flushes the full text exposition of the registry
//! to a collector endpoint on a fixed interval (gateway-style replace, so the
//! counter means the same thing as in pull mode). Flush failures are logged
//! and retried on the next tick; they never reach the check loop.

use super::Metrics;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Content type of the Prometheus text exposition format.
const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Spawn the periodic exporter thread. The HTTP client is built up front so
/// a broken TLS/proxy environment fails at startup.
pub fn spawn_push_exporter(
    metrics: Arc<Metrics>,
    collector_url: String,
    flush_interval: Duration,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let client = reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
        .user_agent("rekor-sentinel")
        .build()
        .context("Failed to create metrics push client")?;

    tracing::info!(
        url = %collector_url,
        interval_secs = flush_interval.as_secs(),
        "Pushing Prometheus metrics to collector"
    );

    Ok(thread::spawn(move || {
        run_push_loop(client, metrics, collector_url, flush_interval, shutdown_flag);
    }))
}

fn run_push_loop(
    client: reqwest::blocking::Client,
    metrics: Arc<Metrics>,
    collector_url: String,
    flush_interval: Duration,
    shutdown_flag: Arc<AtomicBool>,
) {
    while !shutdown_flag.load(Ordering::Relaxed) {
        thread::sleep(flush_interval);
        if shutdown_flag.load(Ordering::Relaxed) {
            break;
        }

        if let Err(e) = flush(&client, &metrics, &collector_url) {
            tracing::warn!("Metrics flush failed (will retry next interval): {e}");
        }
    }
}

fn flush(client: &reqwest::blocking::Client, metrics: &Metrics, url: &str) -> Result<()> {
    let body = metrics.gather_text()?;
    let response = client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, TEXT_FORMAT)
        .body(body)
        .send()
        .context("Failed to send metrics to collector")?;

    if !response.status().is_success() {
        anyhow::bail!("Collector returned HTTP {}", response.status().as_u16());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::{CheckResult, Outcome};
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;

    /// Accept one HTTP request, return its body, and respond 200.
    fn accept_one_push(listener: TcpListener) -> thread::JoinHandle<String> {
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut content_length = 0usize;
            let mut line = String::new();
            loop {
                line.clear();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line == "\n" || line.is_empty() {
                    break;
                }
                if let Some(v) = line.to_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
            }

            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();

            let mut stream = stream;
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .unwrap();
            String::from_utf8(body).unwrap()
        })
    }

    #[test]
    fn test_flush_posts_text_exposition() {
        let metrics = Metrics::new().unwrap();
        metrics.record(
            Outcome::Failure,
            &CheckResult {
                exit_code: 1,
                stdout: String::new(),
                stderr: "connection refused".to_string(),
            },
        );

        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = accept_one_push(listener);

        let client = reqwest::blocking::Client::new();
        flush(&client, &metrics, &format!("http://127.0.0.1:{port}/push")).unwrap();

        let body = server.join().unwrap();
        assert!(body.contains("rekor_consistency_check_total"));
        assert!(body.contains("status=\"failure\""));
    }

    #[test]
    fn test_flush_error_on_unreachable_collector() {
        let metrics = Metrics::new().unwrap();
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_millis(200))
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap();

        // Reserved port with nothing listening
        let err = flush(&client, &metrics, "http://127.0.0.1:9/push").unwrap_err();
        assert!(err.to_string().contains("collector"));
    }
}
