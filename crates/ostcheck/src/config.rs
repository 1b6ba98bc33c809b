use core::num::NonZeroUsize;

use camino::{Utf8Path, Utf8PathBuf};
use eyre::{Result as EyreResult, WrapErr};
use serde::{Deserialize, Serialize};
use tokio::fs::read_to_string;
use url::Url;

use crate::checker::CheckOptions;
use crate::output::OutputFormat;

pub const DEFAULT_DEPTH: NonZeroUsize = NonZeroUsize::MIN.saturating_add(19);

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// JSON-RPC endpoint of the structure under test.
    pub endpoint: Option<Url>,
    /// Per-request timeout for the HTTP client.
    pub timeout_ms: Option<u64>,
    pub generator: GeneratorConfig,
    pub checks: CheckOptions,
    pub output: OutputConfig,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorConfig {
    pub depth: NonZeroUsize,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            seed: None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Where `report.md` and `script.json` are written.
    pub dir: Option<Utf8PathBuf>,
}

impl Config {
    pub async fn load(path: &Utf8Path) -> EyreResult<Self> {
        let content = read_to_string(path)
            .await
            .wrap_err_with(|| format!("failed to read config {path}"))?;

        serde_json::from_str(&content).wrap_err_with(|| format!("invalid config {path}"))
    }
}
