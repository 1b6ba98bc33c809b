use core::num::NonZeroUsize;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use eyre::Result as EyreResult;
use ostcheck::driver::Mode;
use ostcheck::generator::CaseGenerator;
use tracing::info;

use super::{cases_or, Environment};

/// Run a random insert/remove script that must leave the tree empty
#[derive(Debug, Parser)]
pub struct GenerativeCommand {
    /// Number of random steps before draining
    #[arg(long, value_name = "N")]
    pub depth: Option<NonZeroUsize>,

    /// Seed for a reproducible script
    #[arg(long, value_name = "SEED", conflicts_with = "replay")]
    pub seed: Option<u64>,

    /// Replay a script recorded by an earlier run
    #[arg(long, value_name = "PATH")]
    pub replay: Option<Utf8PathBuf>,
}

impl GenerativeCommand {
    pub async fn run(self, environment: &Environment) -> EyreResult<ExitCode> {
        let generator = environment.config.generator;
        let depth = self.depth.unwrap_or(generator.depth);
        let seed = self.seed.or(generator.seed);

        let cases = cases_or(self.replay.as_ref(), || {
            info!(depth = depth.get(), ?seed, "Generating script");
            match seed {
                Some(seed) => CaseGenerator::from_seed(seed).generate(depth),
                None => CaseGenerator::from_entropy().generate(depth),
            }
        })
        .await?;

        environment.output.write_header("Generative run", 1);

        environment.execute(&cases, Mode::Generative).await
    }
}
