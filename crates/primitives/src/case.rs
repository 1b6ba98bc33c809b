use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Operations a test case may invoke on the remote tree.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Insert,
    Remove,
    Rank,
    Percentile,
    Count,
}

impl Operation {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Remove => "remove",
            Self::Rank => "rank",
            Self::Percentile => "percentile",
            Self::Count => "count",
        }
    }

    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Count => 0,
            Self::Insert | Self::Remove | Self::Rank | Self::Percentile => 1,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ThisError)]
#[non_exhaustive]
pub enum ScriptError {
    #[error("`{operation}` takes {expected} argument(s), got {actual}")]
    Arity {
        operation: Operation,
        expected: usize,
        actual: usize,
    },
}

/// One scripted step: an operation, its arguments and the result it must
/// produce, if any.
///
/// Serializes as the triple `["rank", [5], 0]`; a `null` expectation means
/// the step is only checked structurally.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "CaseRepr", into = "CaseRepr")]
pub struct TestCase {
    operation: Operation,
    arguments: Vec<u64>,
    expected: Option<u64>,
}

#[derive(Deserialize, Serialize)]
struct CaseRepr(Operation, Vec<u64>, Option<u64>);

impl TryFrom<CaseRepr> for TestCase {
    type Error = ScriptError;

    fn try_from(CaseRepr(operation, arguments, expected): CaseRepr) -> Result<Self, Self::Error> {
        Self::new(operation, arguments, expected)
    }
}

impl From<TestCase> for CaseRepr {
    fn from(case: TestCase) -> Self {
        Self(case.operation, case.arguments, case.expected)
    }
}

impl TestCase {
    pub fn new(
        operation: Operation,
        arguments: Vec<u64>,
        expected: Option<u64>,
    ) -> Result<Self, ScriptError> {
        if arguments.len() != operation.arity() {
            return Err(ScriptError::Arity {
                operation,
                expected: operation.arity(),
                actual: arguments.len(),
            });
        }

        Ok(Self {
            operation,
            arguments,
            expected,
        })
    }

    #[must_use]
    pub fn insert(key: u64) -> Self {
        Self::keyed(Operation::Insert, key, None)
    }

    #[must_use]
    pub fn remove(key: u64) -> Self {
        Self::keyed(Operation::Remove, key, None)
    }

    #[must_use]
    pub fn rank(key: u64, expected: Option<u64>) -> Self {
        Self::keyed(Operation::Rank, key, expected)
    }

    #[must_use]
    pub fn percentile(key: u64, expected: Option<u64>) -> Self {
        Self::keyed(Operation::Percentile, key, expected)
    }

    #[must_use]
    pub const fn count(expected: Option<u64>) -> Self {
        Self {
            operation: Operation::Count,
            arguments: Vec::new(),
            expected,
        }
    }

    fn keyed(operation: Operation, key: u64, expected: Option<u64>) -> Self {
        Self {
            operation,
            arguments: vec![key],
            expected,
        }
    }

    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// The key argument of a keyed operation.
    #[must_use]
    pub fn key(&self) -> Option<u64> {
        self.arguments.first().copied()
    }

    #[must_use]
    pub const fn expected(&self) -> Option<u64> {
        self.expected
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.operation)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}
