//! Test utilities & fixtures.
//! A scripted mock mount on a local TCP port.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

type Responder = Arc<dyn Fn(&str) -> Vec<Vec<u8>> + Send + Sync>;

/// Accepts any number of connections; each request is answered by the responder, one
/// write per returned part with a short pause between parts.
pub struct MockMount {
    pub host: String,
    pub port: u16,
    requests: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

#[allow(dead_code)]
impl MockMount {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Vec<Vec<u8>> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder: Responder = Arc::new(responder);

        let log = Arc::clone(&requests);
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let responder = Arc::clone(&responder);
                let log = Arc::clone(&log);
                tokio::spawn(serve(socket, responder, log));
            }
        });

        Self {
            host: "127.0.0.1".to_string(),
            port,
            requests,
            task,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Every non-empty request received so far, in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("lock").clone()
    }
}

impl Drop for MockMount {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut socket: TcpStream, responder: Responder, log: Arc<Mutex<Vec<String>>>) {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match tokio::time::timeout(Duration::from_millis(200), socket.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) => break,
            Ok(Ok(n)) => {
                request.extend_from_slice(&buf[..n]);
                if request.ends_with(b"#") {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    if request.is_empty() {
        return;
    }
    let request = String::from_utf8_lossy(&request).to_string();
    log.lock().expect("lock").push(request.clone());

    for (i, part) in responder(&request).into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        if socket.write_all(&part).await.is_err() {
            return;
        }
    }
    // keep the socket until the client hangs up
    let _ = tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buf)).await;
}

/// Reply parts from string slices
#[allow(dead_code)]
pub fn parts(items: &[&str]) -> Vec<Vec<u8>> {
    items.iter().map(|s| s.as_bytes().to_vec()).collect()
}
