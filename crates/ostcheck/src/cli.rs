use core::time::Duration;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use const_format::concatcp;
use eyre::{OptionExt, Result as EyreResult};
use ostcheck::checker::CheckOptions;
use ostcheck::config::Config;
use ostcheck::driver::{Driver, Mode};
use ostcheck::output::{OutputFormat, OutputWriter};
use ostcheck::report::{RunReport, Verdict};
use ostcheck::script;
use ostcheck_client::{JsonRpcClient, MemoryStructure, StructureClient};
use ostcheck_primitives::case::TestCase;
use tokio::fs::create_dir_all;
use tracing::info;
use url::Url;

mod fixed;
mod generate;
mod generative;

use fixed::FixedCommand;
use generate::GenerateCommand;
use generative::GenerativeCommand;

pub const EXAMPLES: &str = r"
  # Run the regression script against a service
  $ ostcheck --endpoint http://localhost:2528/jsonrpc fixed

  # Run a reproducible random script against the in-process tree
  $ ostcheck --sandbox generative --depth 200 --seed 42

  # Replay a recorded script and keep the report
  $ ostcheck --output-dir reports generative --replay reports/script.json
";

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(after_help = concatcp!(
    "Environment variables:\n",
    "  RUST_LOG             Log filter directives\n",
    "  OSTCHECK_ENDPOINT    JSON-RPC endpoint of the structure under test\n\n",
    "Examples:",
    EXAMPLES
))]
pub struct RootCommand {
    #[command(flatten)]
    pub args: RootArgs,

    #[command(subcommand)]
    pub action: SubCommands,
}

#[derive(Debug, Subcommand)]
pub enum SubCommands {
    Fixed(FixedCommand),
    Generative(GenerativeCommand),
    Generate(GenerateCommand),
}

#[derive(Debug, Parser)]
pub struct RootArgs {
    /// JSON config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// JSON-RPC endpoint of the structure under test
    #[arg(long, value_name = "URL", env = "OSTCHECK_ENDPOINT")]
    pub endpoint: Option<Url>,

    /// Test the in-process reference tree instead of a service
    #[arg(long, conflicts_with = "endpoint")]
    pub sandbox: bool,

    #[arg(long, value_name = "FORMAT", value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Directory to write the run report into
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Also verify parent links, child sides and key order
    #[arg(long)]
    pub check_links: bool,
}

#[derive(Debug)]
pub struct Environment {
    pub output: OutputWriter,
    pub config: Config,
    pub checks: CheckOptions,
    pub output_dir: Option<Utf8PathBuf>,
    endpoint: Option<Url>,
    sandbox: bool,
}

impl Environment {
    /// Connects to the structure under test.
    pub fn client(&self) -> EyreResult<Box<dyn StructureClient>> {
        if self.sandbox {
            info!("Testing the in-process reference tree");
            return Ok(Box::new(MemoryStructure::new()));
        }

        let endpoint = self
            .endpoint
            .clone()
            .ok_or_eyre("No structure selected: pass `--endpoint`, set `endpoint` in the config or use `--sandbox`")?;

        info!(%endpoint, "Testing remote structure");

        let client = match self.config.timeout_ms {
            Some(millis) => JsonRpcClient::with_timeout(endpoint, Duration::from_millis(millis))?,
            None => JsonRpcClient::new(endpoint),
        };

        Ok(Box::new(client))
    }

    /// Drives `cases` against a fresh client and reports the outcome.
    pub async fn execute(&self, cases: &[TestCase], mode: Mode) -> EyreResult<ExitCode> {
        let client = self.client()?;

        let driver = Driver::with_options(&*client, self.output, self.checks);
        let report = driver.run(cases, mode).await?;

        self.finish(&report).await
    }

    async fn finish(&self, report: &RunReport) -> EyreResult<ExitCode> {
        if let Err(err) = report.result() {
            self.output.write_str("Errors occurred during test run:");
            self.output.write_str(&err.to_string());
        }

        if let Some(dir) = &self.output_dir {
            create_dir_all(dir).await?;

            let report_file = report.store_to_file(dir).await?;
            self.output.write_str(&format!("Report file: {report_file}"));

            if report.mode == Mode::Generative {
                let script_file = report.store_script(dir).await?;
                self.output.write_str(&format!("Script file: {script_file}"));
            }
        }

        let verdict = report.verdict();
        self.output.write_str(&format!("Verdict: {verdict:?}"));

        Ok(ExitCode::from(exit_status(verdict)))
    }
}

const fn exit_status(verdict: Verdict) -> u8 {
    match verdict {
        Verdict::Passed => 0,
        Verdict::Failed | Verdict::Leftover => 1,
        Verdict::Corrupt => 2,
    }
}

impl RootCommand {
    pub async fn run(self) -> EyreResult<ExitCode> {
        let config = match &self.args.config {
            Some(path) => Config::load(path).await?,
            None => Config::default(),
        };

        let output = OutputWriter::new(self.args.output_format.unwrap_or(config.output.format));

        let environment = Environment {
            output,
            checks: CheckOptions {
                links: self.args.check_links || config.checks.links,
            },
            output_dir: self.args.output_dir.or_else(|| config.output.dir.clone()),
            endpoint: self.args.endpoint.or_else(|| config.endpoint.clone()),
            sandbox: self.args.sandbox,
            config,
        };

        match self.action {
            SubCommands::Fixed(fixed) => fixed.run(&environment).await,
            SubCommands::Generative(generative) => generative.run(&environment).await,
            SubCommands::Generate(generate) => generate.run(&environment).await,
        }
    }
}

/// Loads a recorded script, or falls back to `default`.
async fn cases_or(
    path: Option<&Utf8PathBuf>,
    default: impl FnOnce() -> Vec<TestCase>,
) -> EyreResult<Vec<TestCase>> {
    match path {
        Some(path) => {
            info!(%path, "Loading script");
            script::load(path).await
        }
        None => Ok(default()),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        RootCommand::command().debug_assert();
    }

    #[test]
    fn sandbox_conflicts_with_endpoint() {
        let parsed = RootCommand::try_parse_from([
            "ostcheck",
            "--sandbox",
            "--endpoint",
            "http://localhost:2528",
            "fixed",
        ]);

        assert!(parsed.is_err(), "only one backend may be selected");
    }

    #[test]
    fn parses_generative_flags() {
        let command = RootCommand::try_parse_from([
            "ostcheck",
            "--sandbox",
            "--check-links",
            "--output-format",
            "markdown",
            "generative",
            "--depth",
            "50",
            "--seed",
            "3",
        ])
        .unwrap();

        assert!(command.args.sandbox);
        assert!(command.args.check_links);
        assert_eq!(command.args.output_format, Some(OutputFormat::Markdown));

        let SubCommands::Generative(generative) = command.action else {
            panic!("expected the generative command");
        };
        assert_eq!(generative.depth.map(|depth| depth.get()), Some(50));
        assert_eq!(generative.seed, Some(3));
    }

    #[test]
    fn maps_verdicts_to_exit_codes() {
        assert_eq!(exit_status(Verdict::Passed), 0);
        assert_eq!(exit_status(Verdict::Failed), 1);
        assert_eq!(exit_status(Verdict::Leftover), 1);
        assert_eq!(exit_status(Verdict::Corrupt), 2);
    }
}
