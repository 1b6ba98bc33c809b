use core::num::NonZeroUsize;
use std::process::ExitCode;

use clap::Parser;
use eyre::Result as EyreResult;
use ostcheck::generator::CaseGenerator;
use ostcheck::script;
use tokio::fs::create_dir_all;

use super::Environment;

/// Print a random script without running it
#[derive(Debug, Parser)]
pub struct GenerateCommand {
    /// Number of random steps before draining
    #[arg(long, value_name = "N")]
    pub depth: Option<NonZeroUsize>,

    /// Seed for a reproducible script
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

impl GenerateCommand {
    pub async fn run(self, environment: &Environment) -> EyreResult<ExitCode> {
        let generator = environment.config.generator;
        let depth = self.depth.unwrap_or(generator.depth);

        let cases = match self.seed.or(generator.seed) {
            Some(seed) => CaseGenerator::from_seed(seed).generate(depth),
            None => CaseGenerator::from_entropy().generate(depth),
        };

        environment.output.write_json(&cases)?;

        if let Some(dir) = &environment.output_dir {
            create_dir_all(dir).await?;
            script::store(&dir.join("script.json"), &cases).await?;
        }

        Ok(ExitCode::SUCCESS)
    }
}
