use serde::de::Error as SerdeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error as ThisError;

use crate::case::Operation;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum RequestId {
    String(String),
    Number(u64),
    Null,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum Version {
    #[default]
    TwoPointZero,
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match *self {
            Self::TwoPointZero => serializer.serialize_str("2.0"),
        }
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let version_str = String::deserialize(deserializer)?;
        match version_str.as_str() {
            "2.0" => Ok(Self::TwoPointZero),
            _ => Err(SerdeError::custom("Invalid JSON-RPC version")),
        }
    }
}

/// Methods exposed by the remote tree service.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    NodeSide,
    NodeDupes,
    NodeParent,
    NodeHeight,
    NodeCount,
    NodeLeftChild,
    NodeRightChild,
    Insert,
    Remove,
    Rank,
    Percentile,
    Count,
}

impl Method {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NodeSide => "node_side",
            Self::NodeDupes => "node_dupes",
            Self::NodeParent => "node_parent",
            Self::NodeHeight => "node_height",
            Self::NodeCount => "node_count",
            Self::NodeLeftChild => "node_left_child",
            Self::NodeRightChild => "node_right_child",
            Self::Insert => "insert",
            Self::Remove => "remove",
            Self::Rank => "rank",
            Self::Percentile => "percentile",
            Self::Count => "count",
        }
    }
}

impl From<Operation> for Method {
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::Insert => Self::Insert,
            Operation::Remove => Self::Remove,
            Operation::Rank => Self::Rank,
            Operation::Percentile => Self::Percentile,
            Operation::Count => Self::Count,
        }
    }
}

// **************************** request *******************************
#[derive(Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct Request {
    pub jsonrpc: Version,
    pub id: Option<RequestId>,
    pub method: Method,
    pub params: Vec<u64>,
}

impl Request {
    #[must_use]
    pub const fn new(id: Option<RequestId>, method: Method, params: Vec<u64>) -> Self {
        Self {
            jsonrpc: Version::TwoPointZero,
            id,
            method,
            params,
        }
    }
}

// **************************** response *******************************
#[derive(Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct Response {
    pub jsonrpc: Version,
    pub id: Option<RequestId>,
    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseBody {
    Result(Value),
    Error(RpcError),
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, ThisError)]
#[error("rpc error {code}: {message}")]
#[non_exhaustive]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}
