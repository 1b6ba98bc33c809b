use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;

use async_trait::async_trait;
use ostcheck_primitives::handle::{NodeHandle, Side};
use ostcheck_primitives::jsonrpc::{Method, Request, RequestId, Response, ResponseBody};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{ClientError, StructureClient};

/// Talks to a tree service speaking JSON-RPC 2.0 over HTTP.
///
/// Every call is a single request/response round trip; nothing is retried.
#[derive(Debug)]
pub struct JsonRpcClient {
    endpoint: Url,
    client: Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self::with_client(endpoint, Client::new())
    }

    pub fn with_timeout(endpoint: Url, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self::with_client(endpoint, client))
    }

    #[must_use]
    pub const fn with_client(endpoint: Url, client: Client) -> Self {
        Self {
            endpoint,
            client,
            next_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn call(&self, method: Method, params: Vec<u64>) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        debug!(id, method = method.name(), ?params, "Sending request");

        let request = Request::new(Some(RequestId::Number(id)), method, params);

        let response: Response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.id != Some(RequestId::Number(id)) {
            return Err(ClientError::Malformed {
                method: method.name(),
                reason: format!("response id {:?} does not match request id {id}", response.id),
            });
        }

        match response.body {
            ResponseBody::Result(value) => Ok(value),
            ResponseBody::Error(err) => Err(err.into()),
        }
    }

    async fn call_u64(&self, method: Method, handle: NodeHandle) -> Result<u64, ClientError> {
        let value = self.call(method, vec![handle.key()]).await?;

        decode_u64(method, &value)
    }
}

#[async_trait]
impl StructureClient for JsonRpcClient {
    async fn node_side(&self, handle: NodeHandle) -> Result<Side, ClientError> {
        let value = self.call(Method::NodeSide, vec![handle.key()]).await?;

        decode_flag(Method::NodeSide, &value).map(Side::from_flag)
    }

    async fn node_dupes(&self, handle: NodeHandle) -> Result<u64, ClientError> {
        self.call_u64(Method::NodeDupes, handle).await
    }

    async fn node_parent(&self, handle: NodeHandle) -> Result<NodeHandle, ClientError> {
        self.call_u64(Method::NodeParent, handle)
            .await
            .map(NodeHandle::new)
    }

    async fn node_height(&self, handle: NodeHandle) -> Result<u64, ClientError> {
        self.call_u64(Method::NodeHeight, handle).await
    }

    async fn node_count(&self, handle: NodeHandle) -> Result<u64, ClientError> {
        self.call_u64(Method::NodeCount, handle).await
    }

    async fn node_left_child(&self, handle: NodeHandle) -> Result<Option<NodeHandle>, ClientError> {
        self.call_u64(Method::NodeLeftChild, handle)
            .await
            .map(NodeHandle::child)
    }

    async fn node_right_child(
        &self,
        handle: NodeHandle,
    ) -> Result<Option<NodeHandle>, ClientError> {
        self.call_u64(Method::NodeRightChild, handle)
            .await
            .map(NodeHandle::child)
    }

    async fn insert(&self, key: u64) -> Result<(), ClientError> {
        let _ignored = self.call(Method::Insert, vec![key]).await?;

        Ok(())
    }

    async fn remove(&self, key: u64) -> Result<(), ClientError> {
        let _ignored = self.call(Method::Remove, vec![key]).await?;

        Ok(())
    }

    async fn rank(&self, key: u64) -> Result<Value, ClientError> {
        self.call(Method::Rank, vec![key]).await
    }

    async fn percentile(&self, key: u64) -> Result<Value, ClientError> {
        self.call(Method::Percentile, vec![key]).await
    }

    async fn count(&self) -> Result<Value, ClientError> {
        self.call(Method::Count, vec![]).await
    }
}

/// Integers may arrive as JSON numbers or as decimal strings.
fn decode_u64(method: Method, value: &Value) -> Result<u64, ClientError> {
    let decoded = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    decoded.ok_or_else(|| ClientError::Malformed {
        method: method.name(),
        reason: format!("expected an unsigned integer, got {value}"),
    })
}

fn decode_flag(method: Method, value: &Value) -> Result<bool, ClientError> {
    let decoded = match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(s) => match s.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(number) => match number.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        _ => None,
    };

    decoded.ok_or_else(|| ClientError::Malformed {
        method: method.name(),
        reason: format!("expected a boolean, got {value}"),
    })
}

#[cfg(test)]
mod tests {
    use claims::{assert_matches, assert_ok_eq};
    use serde_json::json;

    use super::*;

    #[test]
    fn integers_decode_from_numbers_and_strings() {
        assert_ok_eq!(decode_u64(Method::NodeCount, &json!(4)), 4);
        assert_ok_eq!(decode_u64(Method::NodeCount, &json!("17")), 17);
        assert_matches!(
            decode_u64(Method::NodeCount, &json!(-1)),
            Err(ClientError::Malformed { method: "node_count", .. })
        );
        assert_matches!(
            decode_u64(Method::NodeCount, &json!(null)),
            Err(ClientError::Malformed { .. })
        );
    }

    #[test]
    fn flags_decode_from_booleans_and_strings() {
        assert_ok_eq!(decode_flag(Method::NodeSide, &json!(true)), true);
        assert_ok_eq!(decode_flag(Method::NodeSide, &json!("false")), false);
        assert_ok_eq!(decode_flag(Method::NodeSide, &json!(1)), true);
        assert_matches!(
            decode_flag(Method::NodeSide, &json!("yes")),
            Err(ClientError::Malformed { method: "node_side", .. })
        );
    }

    #[test]
    fn request_ids_increase() {
        let client = JsonRpcClient::new("http://localhost:8080".parse().unwrap());

        assert_eq!(client.next_id.fetch_add(1, Ordering::Relaxed), 1);
        assert_eq!(client.next_id.fetch_add(1, Ordering::Relaxed), 2);
        assert_eq!(client.endpoint().as_str(), "http://localhost:8080/");
    }
}
