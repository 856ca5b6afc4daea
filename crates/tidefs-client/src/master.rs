//! Master RPC

use crate::rpc::RpcClient;
use tidefs_common::{BlockAssign, CreateRequest, Error, FileBlocks, Result};

/// HTTP connection to the master
#[derive(Clone, Debug)]
pub struct MasterConn {
    rpc: RpcClient,
}

impl MasterConn {
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(address)?,
        })
    }

    #[must_use]
    pub fn address(&self) -> &str {
        self.rpc.address()
    }

    /// Register a new file and get the replica assignment of its blocks
    pub async fn create(&self, request: &CreateRequest) -> Result<Vec<BlockAssign>> {
        let url = self.rpc.url("/create");
        let response = self.rpc.send(|http| http.post(&url).json(request)).await?;
        let response = RpcClient::check(response, |status| {
            (status == 409).then(|| Error::FileAlreadyExists(request.name.clone()))
        })
        .await?;
        response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// One read replica for each block of `name`
    pub async fn lookup(&self, name: &str) -> Result<FileBlocks> {
        let url = self.rpc.url("/lookup");
        let response = self
            .rpc
            .send(|http| http.get(&url).query(&[("name", name)]))
            .await?;
        let response = RpcClient::check(response, |status| {
            (status == 404).then(|| Error::FileNotFound(name.to_string()))
        })
        .await?;
        response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))
    }
}
