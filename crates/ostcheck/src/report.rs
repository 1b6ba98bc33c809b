use core::fmt::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use eyre::{bail, Result as EyreResult};
use ostcheck_primitives::case::TestCase;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;
use tokio::fs::write;

use crate::checker::Violation;
use crate::driver::Mode;
use crate::snapshot::Snapshot;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    Passed,
    Failed,
    /// The case carried no expected value.
    Unchecked,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Corruption {
    Cycle,
    Invariant { violation: Violation },
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub index: usize,
    pub case: TestCase,
    pub result: Option<Value>,
    pub status: StepStatus,
    pub snapshot: Snapshot,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorruptionReport {
    pub step: usize,
    pub corruption: Corruption,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    Passed,
    Failed,
    Leftover,
    Corrupt,
}

#[derive(Debug, ThisError)]
#[non_exhaustive]
pub enum HarnessError {
    #[error("structure corrupt after step {step}: {corruption}")]
    StructuralCorruption { step: usize, corruption: Corruption },

    #[error("step {step} `{case}` returned {actual}, expected {expected}")]
    AssertionMismatch {
        step: usize,
        case: TestCase,
        expected: u64,
        actual: String,
    },

    #[error("generated script left {remaining} element(s) behind")]
    LeftoverState { remaining: u64 },
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle => f.write_str("cycle in tree"),
            Self::Invariant { violation } => write!(f, "{violation}"),
        }
    }
}

/// Everything one driver run observed.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub mode: Mode,
    /// The script as executed, replayable as-is.
    pub cases: Vec<TestCase>,
    pub steps: Vec<StepReport>,
    pub corruption: Option<CorruptionReport>,
    /// Final tree of a generative run that did not end empty.
    pub leftover: Option<Snapshot>,
}

impl RunReport {
    #[must_use]
    pub const fn new(mode: Mode, cases: Vec<TestCase>) -> Self {
        Self {
            mode,
            cases,
            steps: Vec::new(),
            corruption: None,
            leftover: None,
        }
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::Failed)
    }

    #[must_use]
    pub const fn is_corrupt(&self) -> bool {
        self.corruption.is_some()
    }

    /// Corruption outranks leftover state, which outranks mismatches.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        if self.is_corrupt() {
            Verdict::Corrupt
        } else if self.leftover.is_some() {
            Verdict::Leftover
        } else if self.mismatches().next().is_some() {
            Verdict::Failed
        } else {
            Verdict::Passed
        }
    }

    #[must_use]
    pub fn errors(&self) -> Vec<HarnessError> {
        let mut errors: Vec<HarnessError> = self
            .mismatches()
            .map(|step| HarnessError::AssertionMismatch {
                step: step.index,
                case: step.case.clone(),
                expected: step.case.expected().unwrap_or_default(),
                actual: step
                    .result
                    .as_ref()
                    .map_or_else(|| "nothing".to_owned(), ToString::to_string),
            })
            .collect();

        if let Some(CorruptionReport { step, corruption }) = self.corruption {
            errors.push(HarnessError::StructuralCorruption { step, corruption });
        }

        if let Some(leftover) = &self.leftover {
            errors.push(HarnessError::LeftoverState {
                remaining: leftover.element_count(),
            });
        }

        errors
    }

    pub fn result(&self) -> EyreResult<()> {
        let errors: Vec<String> = self.errors().iter().map(ToString::to_string).collect();

        if errors.is_empty() {
            Ok(())
        } else {
            bail!("Errors occurred during test run: {:?}", errors)
        }
    }

    pub async fn store_to_file(&self, folder: &Utf8Path) -> EyreResult<Utf8PathBuf> {
        let markdown = self.to_markdown()?;
        let report_file = folder.join("report.md");
        write(&report_file, markdown).await?;
        Ok(report_file)
    }

    pub async fn store_script(&self, folder: &Utf8Path) -> EyreResult<Utf8PathBuf> {
        let script_file = folder.join("script.json");
        write(&script_file, serde_json::to_vec_pretty(&self.cases)?).await?;
        Ok(script_file)
    }

    pub fn to_markdown(&self) -> EyreResult<String> {
        let mut markdown = String::new();

        writeln!(&mut markdown, "## Order-statistic tree report")?;
        writeln!(&mut markdown)?;
        writeln!(&mut markdown, "Mode: {:?}", self.mode)?;
        writeln!(&mut markdown)?;
        writeln!(&mut markdown, "Verdict: {:?}", self.verdict())?;
        writeln!(&mut markdown)?;

        writeln!(&mut markdown, "| Step | Call | Result | Status |")?;
        writeln!(&mut markdown, "| :--- | :--- | :---: | :---: |")?;

        for step in &self.steps {
            let result = step
                .result
                .as_ref()
                .map_or_else(String::new, ToString::to_string);
            let status = match step.status {
                StepStatus::Passed => ":white_check_mark:",
                StepStatus::Failed => ":x:",
                StepStatus::Unchecked => ":heavy_minus_sign:",
            };
            writeln!(
                &mut markdown,
                "| {} | `{}` | {result} | {status} |",
                step.index, step.case
            )?;
        }

        // Steps after a fatal one never ran.
        for (index, case) in self.cases.iter().enumerate().skip(self.steps.len()) {
            writeln!(&mut markdown, "| {index} | `{case}` | | :fast_forward: |")?;
        }
        writeln!(&mut markdown)?;

        let errors = self.errors();
        if !errors.is_empty() {
            writeln!(&mut markdown, "### Errors")?;
            writeln!(&mut markdown)?;
            for error in errors {
                writeln!(&mut markdown, "- {error}")?;
            }
            writeln!(&mut markdown)?;
        }

        if let Some(last) = self.steps.last() {
            writeln!(&mut markdown, "### Final tree")?;
            writeln!(&mut markdown)?;
            writeln!(
                &mut markdown,
                "```json\n{}\n```",
                serde_json::to_string_pretty(&last.snapshot)?
            )?;
        }

        Ok(markdown)
    }
}
