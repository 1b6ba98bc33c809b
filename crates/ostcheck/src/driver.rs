use eyre::Result as EyreResult;
use ostcheck_client::StructureClient;
use ostcheck_primitives::case::TestCase;
use ostcheck_primitives::handle::NodeHandle;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::checker::{check_with, CheckOptions};
use crate::output::OutputWriter;
use crate::reconstruct::{reconstruct, Reconstruction};
use crate::report::{Corruption, CorruptionReport, RunReport, StepReport, StepStatus};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    /// A hand-written script with expected results.
    Fixed,
    /// A generated script that must leave the tree empty.
    Generative,
}

#[derive(Debug)]
pub struct Driver<'a, C: ?Sized> {
    client: &'a C,
    output: OutputWriter,
    options: CheckOptions,
}

impl<'a, C> Driver<'a, C>
where
    C: StructureClient + ?Sized,
{
    pub const fn new(client: &'a C, output: OutputWriter) -> Self {
        Self::with_options(client, output, CheckOptions { links: false })
    }

    pub const fn with_options(client: &'a C, output: OutputWriter, options: CheckOptions) -> Self {
        Self {
            client,
            output,
            options,
        }
    }

    /// Applies `cases` one at a time, rebuilding and verifying the tree after
    /// every step.
    ///
    /// Expected-value mismatches are recorded and the run continues. A cycle
    /// or broken invariant ends the run after the step that caused it.
    /// Transport failures abort the run with the client's error, as does
    /// failing to write progress output.
    pub async fn run(&self, cases: &[TestCase], mode: Mode) -> EyreResult<RunReport> {
        let mut report = RunReport::new(mode, cases.to_vec());

        if mode == Mode::Generative {
            self.output.write_header("Generated script", 2);
            self.output.write_script(cases)?;
        }

        self.output.write_header("Steps", 2);

        for (index, case) in cases.iter().enumerate() {
            let result = self.client.execute(case).await?;

            let status = match case.expected() {
                None => StepStatus::Unchecked,
                Some(expected) if matches_expected(expected, result.as_ref()) => {
                    StepStatus::Passed
                }
                Some(expected) => {
                    warn!(
                        index,
                        %case,
                        expected,
                        actual = ?result,
                        "Step returned an unexpected value"
                    );
                    StepStatus::Failed
                }
            };

            let Reconstruction { snapshot, cycle } =
                reconstruct(self.client, NodeHandle::ANCHOR).await?;

            let corruption = if cycle {
                Some(Corruption::Cycle)
            } else {
                check_with(snapshot.root(), self.options)
                    .err()
                    .map(|violation| Corruption::Invariant { violation })
            };

            info!(index, %case, ?status, "Step complete");

            let step = StepReport {
                index,
                case: case.clone(),
                result,
                status,
                snapshot,
            };
            self.output.write_step(&step)?;
            report.steps.push(step);

            if let Some(corruption) = corruption {
                error!(index, %case, ?corruption, "Structure corrupted");
                self.output
                    .write_str(&format!("Structure corrupted after step {index}, stopping"));
                report.corruption = Some(CorruptionReport {
                    step: index,
                    corruption,
                });
                return Ok(report);
            }
        }

        if mode == Mode::Generative {
            let last = match report.steps.last() {
                Some(step) => step.snapshot.clone(),
                None => reconstruct(self.client, NodeHandle::ANCHOR).await?.snapshot,
            };

            if !last.holds_nothing() {
                warn!(
                    elements = last.element_count(),
                    "Generated script left elements behind"
                );
                self.output.write_header("Leftover tree", 2);
                self.output.write_json(&last)?;
                report.leftover = Some(last);
            }
        }

        Ok(report)
    }
}

/// Compares a returned value against the expected integer by numeric value.
///
/// Numbers match regardless of their JSON representation (`70` and `70.0`),
/// and strings match when they parse to the same number (`"70"`, `"070"`,
/// `"70.0"`).
#[must_use]
pub fn matches_expected(expected: u64, actual: Option<&Value>) -> bool {
    let Some(actual) = actual else {
        return false;
    };

    if actual.as_u64() == Some(expected) {
        return true;
    }

    let numeric = match actual {
        Value::Number(number) if number.is_u64() => return false,
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let text = text.trim();
            if let Ok(integer) = text.parse::<u64>() {
                return integer == expected;
            }
            text.parse::<f64>().ok()
        }
        _ => None,
    };

    #[expect(
        clippy::cast_precision_loss,
        reason = "integers beyond f64 precision are already compared exactly"
    )]
    let expected = expected as f64;

    numeric.is_some_and(|numeric| (numeric - expected).abs() < f64::EPSILON)
}
