use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use eyre::Result as EyreResult;
use ostcheck::driver::Mode;
use ostcheck::script::fixed_script;

use super::{cases_or, Environment};

/// Run a script with expected results, the built-in regression table by default
#[derive(Debug, Parser)]
pub struct FixedCommand {
    /// JSON script of `[operation, [arguments], expected]` triples
    #[arg(long, value_name = "PATH")]
    pub script: Option<Utf8PathBuf>,
}

impl FixedCommand {
    pub async fn run(self, environment: &Environment) -> EyreResult<ExitCode> {
        let cases = cases_or(self.script.as_ref(), fixed_script).await?;

        environment.output.write_header("Fixed run", 1);

        environment.execute(&cases, Mode::Fixed).await
    }
}
