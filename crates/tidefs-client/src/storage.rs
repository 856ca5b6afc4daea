//! Storage node RPC

use crate::rpc::RpcClient;
use async_trait::async_trait;
use bytes::Bytes;
use tidefs_common::{Error, ReplicateRequest, Result};

/// Block operations a storage node serves
///
/// The master only talks to storage nodes through this trait, so tests can
/// put in-memory nodes behind it.
#[async_trait]
pub trait BlockStorage: Send + Sync {
    /// Store `data` as `block_id`, replacing any previous content
    async fn set(&self, block_id: &str, data: Bytes) -> Result<()>;

    /// Content of `block_id`
    async fn get(&self, block_id: &str) -> Result<Bytes>;

    /// Drop `block_id`
    async fn unset(&self, block_id: &str) -> Result<()>;

    /// Push this node's copy of `block_id` to the node at `destination`
    async fn replicate(&self, block_id: &str, destination: &str) -> Result<()>;
}

/// HTTP connection to a storage node
#[derive(Clone, Debug)]
pub struct StorageConn {
    rpc: RpcClient,
}

impl StorageConn {
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(address)?,
        })
    }

    #[must_use]
    pub fn address(&self) -> &str {
        self.rpc.address()
    }

    fn block_not_found(block_id: &str) -> impl FnOnce(u16) -> Option<Error> + '_ {
        move |status| {
            (status == 404).then(|| Error::BlockNotFound {
                block_id: block_id.to_string(),
            })
        }
    }
}

#[async_trait]
impl BlockStorage for StorageConn {
    async fn set(&self, block_id: &str, data: Bytes) -> Result<()> {
        let url = self.rpc.url("/block");
        let response = self
            .rpc
            .send(|http| http.put(&url).query(&[("id", block_id)]).body(data.clone()))
            .await?;
        RpcClient::check(response, |_| None).await?;
        Ok(())
    }

    async fn get(&self, block_id: &str) -> Result<Bytes> {
        let url = self.rpc.url("/block");
        let response = self
            .rpc
            .send(|http| http.get(&url).query(&[("id", block_id)]))
            .await?;
        let response = RpcClient::check(response, Self::block_not_found(block_id)).await?;
        response.bytes().await.map_err(crate::rpc::transport_error)
    }

    async fn unset(&self, block_id: &str) -> Result<()> {
        let url = self.rpc.url("/block");
        let response = self
            .rpc
            .send(|http| http.delete(&url).query(&[("id", block_id)]))
            .await?;
        RpcClient::check(response, Self::block_not_found(block_id)).await?;
        Ok(())
    }

    async fn replicate(&self, block_id: &str, destination: &str) -> Result<()> {
        let url = self.rpc.url("/replicate");
        let request = ReplicateRequest {
            block_id: block_id.to_string(),
            destination: destination.to_string(),
        };
        let response = self.rpc.send(|http| http.post(&url).json(&request)).await?;
        RpcClient::check(response, Self::block_not_found(block_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Consume one request, headers and body
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0_u8; 4096];
        loop {
            let Ok(n) = socket.read(&mut chunk).await else { return };
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    return;
                }
            }
        }
    }

    /// Answer every request with `status_line` and count the requests
    async fn canned_server(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut socket).await;
                let reply = format!(
                    "HTTP/1.1 {status_line}\r\n\
                     content-type: application/json\r\n\
                     content-length: {}\r\n\
                     connection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (address, hits)
    }

    #[tokio::test]
    async fn test_missing_block_is_not_retried() {
        let (address, hits) =
            canned_server("404 Not Found", r#"{"error":"block not found"}"#).await;
        let conn = StorageConn::new(address).unwrap();

        let err = conn.get("f:0").await.unwrap_err();
        assert!(matches!(err, Error::BlockNotFound { ref block_id } if block_id == "f:0"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remote_failure_carries_message() {
        let (address, _) =
            canned_server("502 Bad Gateway", r#"{"error":"destination down"}"#).await;
        let conn = StorageConn::new(address).unwrap();

        let err = conn.replicate("f:0", "127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, Error::Remote(ref msg) if msg == "destination down"));
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        let (address, _) = canned_server("200 OK", "block-bytes").await;
        let conn = StorageConn::new(address).unwrap();

        assert_eq!(conn.get("f:0").await.unwrap(), Bytes::from_static(b"block-bytes"));
        conn.set("f:0", Bytes::from_static(b"x")).await.unwrap();
    }
}
