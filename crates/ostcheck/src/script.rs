//! Loading, storing and the built-in regression script.

use camino::Utf8Path;
use eyre::{Result as EyreResult, WrapErr};
use ostcheck_primitives::case::TestCase;
use tokio::fs::{read, write};

/// The hand-checked regression script.
///
/// Zero is inserted once, so it sits in the anchor's duplicate counter and
/// counts as smaller than every other key.
#[must_use]
pub fn fixed_script() -> Vec<TestCase> {
    vec![
        TestCase::insert(5),
        TestCase::percentile(5, Some(50)),
        TestCase::remove(5),
        TestCase::insert(5),
        TestCase::rank(5, Some(0)),
        TestCase::insert(0),
        TestCase::rank(5, Some(1)),
        TestCase::insert(6),
        TestCase::insert(7),
        TestCase::count(Some(4)),
        TestCase::percentile(6, Some(62)),
        TestCase::insert(5),
        TestCase::percentile(6, Some(70)),
        TestCase::insert(8),
        TestCase::remove(5),
        TestCase::remove(5),
    ]
}

pub async fn load(path: &Utf8Path) -> EyreResult<Vec<TestCase>> {
    let bytes = read(path)
        .await
        .wrap_err_with(|| format!("failed to read script {path}"))?;

    serde_json::from_slice(&bytes).wrap_err_with(|| format!("invalid script {path}"))
}

pub async fn store(path: &Utf8Path, cases: &[TestCase]) -> EyreResult<()> {
    write(path, serde_json::to_vec_pretty(cases)?)
        .await
        .wrap_err_with(|| format!("failed to write script {path}"))
}
