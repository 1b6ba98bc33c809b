use clap::ValueEnum;
use eyre::Result as EyreResult;
use ostcheck_primitives::case::TestCase;
use serde::{Deserialize, Serialize};

use crate::report::{StepReport, StepStatus};

/// Diagnostic sink for run progress, printed to stdout.
#[derive(Clone, Copy, Debug)]
pub struct OutputWriter {
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Markdown,
    #[default]
    PlainText,
}

impl OutputWriter {
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn write_str(self, line: &str) {
        match self.format {
            OutputFormat::Markdown => println!("{line}  "),
            OutputFormat::PlainText => println!("{line}"),
        }
    }

    pub fn write_header(self, header: &str, level: usize) {
        match self.format {
            OutputFormat::Markdown => println!("{} {header}\n", "#".repeat(level)),
            OutputFormat::PlainText => {
                let rule = if level <= 1 { "=" } else { "-" };
                println!("{header}\n{}", rule.repeat(header.len()));
            }
        }
    }

    pub fn write_json<T>(self, json: &T) -> EyreResult<()>
    where
        T: ?Sized + Serialize,
    {
        println!("{}", render_json(self.format, json)?);
        Ok(())
    }

    /// The generated script, one call per line, followed by its replayable
    /// JSON form.
    pub fn write_script(self, cases: &[TestCase]) -> EyreResult<()> {
        for (index, case) in cases.iter().enumerate() {
            self.write_str(&format!("{index:>4}  {case}"));
        }
        self.write_json(cases)
    }

    /// One summary line for the step, then the tree it left behind.
    pub fn write_step(self, step: &StepReport) -> EyreResult<()> {
        self.write_str(&step_line(step));
        self.write_json(&step.snapshot)
    }
}

fn render_json<T>(format: OutputFormat, json: &T) -> EyreResult<String>
where
    T: ?Sized + Serialize,
{
    let rendered = match format {
        OutputFormat::Markdown => {
            format!("```json\n{}\n```", serde_json::to_string_pretty(json)?)
        }
        OutputFormat::PlainText => serde_json::to_string(json)?,
    };

    Ok(rendered)
}

fn step_line(step: &StepReport) -> String {
    let result = step
        .result
        .as_ref()
        .map_or_else(String::new, |value| format!(" -> {value}"));

    let status = match (step.status, step.case.expected()) {
        (StepStatus::Passed, _) => "ok".to_owned(),
        (StepStatus::Failed, Some(expected)) => format!("FAILED, expected {expected}"),
        (StepStatus::Failed, None) => "FAILED".to_owned(),
        (StepStatus::Unchecked, _) => "done".to_owned(),
    };

    format!("step {}: {}{result} [{status}]", step.index, step.case)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use claims::{assert_err, assert_ok};
    use serde_json::{json, Value};

    use super::*;
    use crate::snapshot::Snapshot;

    const OUTPUT: OutputWriter = OutputWriter::new(OutputFormat::PlainText);

    fn step(case: TestCase, result: Option<Value>, status: StepStatus) -> StepReport {
        StepReport {
            index: 3,
            case,
            result,
            status,
            snapshot: Snapshot::anchor(0),
        }
    }

    #[test]
    fn summarizes_steps() {
        assert_eq!(
            step_line(&step(TestCase::insert(5), None, StepStatus::Unchecked)),
            "step 3: insert(5) [done]"
        );
        assert_eq!(
            step_line(&step(
                TestCase::percentile(6, Some(62)),
                Some(json!("62")),
                StepStatus::Passed
            )),
            r#"step 3: percentile(6) -> "62" [ok]"#
        );
        assert_eq!(
            step_line(&step(
                TestCase::rank(5, Some(1)),
                Some(json!(0)),
                StepStatus::Failed
            )),
            "step 3: rank(5) -> 0 [FAILED, expected 1]"
        );
    }

    #[test]
    fn renders_json_per_format() {
        assert_eq!(
            render_json(OutputFormat::PlainText, &[1, 2]).unwrap(),
            "[1,2]"
        );
        assert_eq!(
            render_json(OutputFormat::Markdown, &json!({ "dupes": 0 })).unwrap(),
            "```json\n{\n  \"dupes\": 0\n}\n```"
        );
    }

    #[test]
    fn unserializable_values_are_errors() {
        let keyed_by_pair = BTreeMap::from([((1_u8, 2_u8), 3_u8)]);

        assert_err!(render_json(OutputFormat::PlainText, &keyed_by_pair));
        assert_err!(render_json(OutputFormat::Markdown, &keyed_by_pair));
        assert_err!(OUTPUT.write_json(&keyed_by_pair));
        assert_ok!(OUTPUT.write_json(&[TestCase::count(None)]));
    }
}
