//! Access to a remote order-statistic tree.
//!
//! The harness only ever observes the tree through [`StructureClient`]:
//! per-node attribute reads used to rebuild its shape, and the operations a
//! test script invokes. Two implementations ship here, a JSON-RPC transport
//! for real deployments and an in-process reference tree.

use async_trait::async_trait;
use ostcheck_primitives::case::{Operation, TestCase};
use ostcheck_primitives::handle::{NodeHandle, Side};
use ostcheck_primitives::jsonrpc::RpcError;
use serde_json::Value;
use thiserror::Error as ThisError;

pub mod jsonrpc;
pub mod memory;

pub use jsonrpc::JsonRpcClient;
pub use memory::MemoryStructure;

#[derive(Debug, ThisError)]
#[non_exhaustive]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("malformed `{method}` response: {reason}")]
    Malformed { method: &'static str, reason: String },

    #[error("`{operation}` invoked without its key argument")]
    MissingArgument { operation: Operation },
}

#[async_trait]
pub trait StructureClient: Send + Sync {
    async fn node_side(&self, handle: NodeHandle) -> Result<Side, ClientError>;

    async fn node_dupes(&self, handle: NodeHandle) -> Result<u64, ClientError>;

    /// The parent of `handle`; the real root reports the anchor.
    async fn node_parent(&self, handle: NodeHandle) -> Result<NodeHandle, ClientError>;

    async fn node_height(&self, handle: NodeHandle) -> Result<u64, ClientError>;

    async fn node_count(&self, handle: NodeHandle) -> Result<u64, ClientError>;

    async fn node_left_child(&self, handle: NodeHandle) -> Result<Option<NodeHandle>, ClientError>;

    async fn node_right_child(&self, handle: NodeHandle)
        -> Result<Option<NodeHandle>, ClientError>;

    async fn insert(&self, key: u64) -> Result<(), ClientError>;

    async fn remove(&self, key: u64) -> Result<(), ClientError>;

    async fn rank(&self, key: u64) -> Result<Value, ClientError>;

    async fn percentile(&self, key: u64) -> Result<Value, ClientError>;

    async fn count(&self) -> Result<Value, ClientError>;

    /// Invokes the operation a test case names.
    ///
    /// Mutations produce no value; queries return whatever the structure
    /// answered, in the representation it chose.
    async fn execute(&self, case: &TestCase) -> Result<Option<Value>, ClientError> {
        let operation = case.operation();
        let key = || case.key().ok_or(ClientError::MissingArgument { operation });

        match operation {
            Operation::Insert => self.insert(key()?).await.map(|()| None),
            Operation::Remove => self.remove(key()?).await.map(|()| None),
            Operation::Rank => self.rank(key()?).await.map(Some),
            Operation::Percentile => self.percentile(key()?).await.map(Some),
            Operation::Count => self.count().await.map(Some),
        }
    }
}
