//! In-process stand-in for the dashcam's CGI web server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body:   String,
    pub delay:  Duration,
    /// Send only this many body bytes, then hold the connection open.
    pub stall_after: Option<usize>,
    /// Write the body in pieces of this size with a pause after each.
    pub drip: Option<(usize, Duration)>,
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Reply { status: 200, body: body.to_string(), ..Reply::status(200) }
    }

    pub fn status(status: u16) -> Self {
        Reply {
            status,
            body:        String::new(),
            delay:       Duration::ZERO,
            stall_after: None,
            drip:        None,
        }
    }

    pub fn stall_after(mut self, bytes: usize) -> Self {
        self.stall_after = Some(bytes);
        self
    }

    pub fn dripped(mut self, piece: usize, gap: Duration) -> Self {
        self.drip = Some((piece.max(1), gap));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Handler = Arc<dyn Fn(&str) -> Reply + Send + Sync>;

pub struct FakeDevice {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeDevice {
    /// Serve `handler(path_and_query)` for every request until the test ends.
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Handler = Arc::new(handler);

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else { break };
                let handler = Arc::clone(&handler);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match sock.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&buf).to_string();
                    let path = head
                        .lines()
                        .next()
                        .and_then(|l| l.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();
                    log.lock().unwrap().push(path.clone());

                    let reply = handler(&path);
                    if !reply.delay.is_zero() {
                        tokio::time::sleep(reply.delay).await;
                    }
                    let head = format!(
                        "HTTP/1.1 {} X\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        reply.status,
                        reply.body.len(),
                    );
                    if sock.write_all(head.as_bytes()).await.is_err() {
                        return;
                    }
                    let body = reply.body.as_bytes();
                    let sent = reply.stall_after.map_or(body.len(), |n| n.min(body.len()));
                    match reply.drip {
                        Some((piece, gap)) => {
                            for part in body[..sent].chunks(piece) {
                                if sock.write_all(part).await.is_err() {
                                    return;
                                }
                                let _ = sock.flush().await;
                                tokio::time::sleep(gap).await;
                            }
                        }
                        None => {
                            let _ = sock.write_all(&body[..sent]).await;
                        }
                    }
                    if sent < body.len() {
                        let _ = sock.flush().await;
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                    let _ = sock.shutdown().await;
                });
            }
        });

        FakeDevice { addr, requests }
    }

    pub fn ip(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// A local port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
