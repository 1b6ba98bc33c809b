use async_trait::async_trait;
use claims::{assert_err, assert_matches, assert_none, assert_some};
use ostcheck::checker::{CheckOptions, Violation};
use ostcheck::driver::{Driver, Mode};
use ostcheck::generator::CaseGenerator;
use ostcheck::output::{OutputFormat, OutputWriter};
use ostcheck::reconstruct::reconstruct;
use ostcheck::report::{Corruption, CorruptionReport, StepStatus, Verdict};
use ostcheck::script::fixed_script;
use ostcheck_client::memory::Tamper;
use ostcheck_client::{ClientError, MemoryStructure, StructureClient};
use ostcheck_primitives::case::TestCase;
use ostcheck_primitives::handle::{NodeHandle, Side};
use proptest::prelude::*;
use serde_json::Value;

const OUTPUT: OutputWriter = OutputWriter::new(OutputFormat::PlainText);

async fn populated(keys: &[u64]) -> MemoryStructure {
    let structure = MemoryStructure::new();
    for key in keys {
        structure.insert(*key).await.unwrap();
    }
    structure
}

/// Answers queries with decimal strings instead of numbers.
struct Stringly(MemoryStructure);

#[async_trait]
impl StructureClient for Stringly {
    async fn node_side(&self, handle: NodeHandle) -> Result<Side, ClientError> {
        self.0.node_side(handle).await
    }

    async fn node_dupes(&self, handle: NodeHandle) -> Result<u64, ClientError> {
        self.0.node_dupes(handle).await
    }

    async fn node_parent(&self, handle: NodeHandle) -> Result<NodeHandle, ClientError> {
        self.0.node_parent(handle).await
    }

    async fn node_height(&self, handle: NodeHandle) -> Result<u64, ClientError> {
        self.0.node_height(handle).await
    }

    async fn node_count(&self, handle: NodeHandle) -> Result<u64, ClientError> {
        self.0.node_count(handle).await
    }

    async fn node_left_child(&self, handle: NodeHandle) -> Result<Option<NodeHandle>, ClientError> {
        self.0.node_left_child(handle).await
    }

    async fn node_right_child(
        &self,
        handle: NodeHandle,
    ) -> Result<Option<NodeHandle>, ClientError> {
        self.0.node_right_child(handle).await
    }

    async fn insert(&self, key: u64) -> Result<(), ClientError> {
        self.0.insert(key).await
    }

    async fn remove(&self, key: u64) -> Result<(), ClientError> {
        self.0.remove(key).await
    }

    async fn rank(&self, key: u64) -> Result<Value, ClientError> {
        self.0.rank(key).await.map(|value| value.to_string().into())
    }

    async fn percentile(&self, key: u64) -> Result<Value, ClientError> {
        self.0.percentile(key).await.map(|value| value.to_string().into())
    }

    async fn count(&self) -> Result<Value, ClientError> {
        self.0.count().await.map(|value| value.to_string().into())
    }
}

/// Fails every attribute read, the way a dead endpoint would.
struct Unreachable(MemoryStructure);

impl Unreachable {
    const fn failure() -> ClientError {
        ClientError::Malformed {
            method: "node_side",
            reason: String::new(),
        }
    }
}

#[async_trait]
impl StructureClient for Unreachable {
    async fn node_side(&self, _handle: NodeHandle) -> Result<Side, ClientError> {
        Err(Self::failure())
    }

    async fn node_dupes(&self, handle: NodeHandle) -> Result<u64, ClientError> {
        self.0.node_dupes(handle).await
    }

    async fn node_parent(&self, handle: NodeHandle) -> Result<NodeHandle, ClientError> {
        self.0.node_parent(handle).await
    }

    async fn node_height(&self, handle: NodeHandle) -> Result<u64, ClientError> {
        self.0.node_height(handle).await
    }

    async fn node_count(&self, handle: NodeHandle) -> Result<u64, ClientError> {
        self.0.node_count(handle).await
    }

    async fn node_left_child(&self, handle: NodeHandle) -> Result<Option<NodeHandle>, ClientError> {
        self.0.node_left_child(handle).await
    }

    async fn node_right_child(
        &self,
        handle: NodeHandle,
    ) -> Result<Option<NodeHandle>, ClientError> {
        self.0.node_right_child(handle).await
    }

    async fn insert(&self, key: u64) -> Result<(), ClientError> {
        self.0.insert(key).await
    }

    async fn remove(&self, key: u64) -> Result<(), ClientError> {
        self.0.remove(key).await
    }

    async fn rank(&self, key: u64) -> Result<Value, ClientError> {
        self.0.rank(key).await
    }

    async fn percentile(&self, key: u64) -> Result<Value, ClientError> {
        self.0.percentile(key).await
    }

    async fn count(&self) -> Result<Value, ClientError> {
        self.0.count().await
    }
}

mod fixed_runs {
    use super::*;

    #[tokio::test]
    async fn regression_script_passes() {
        let structure = MemoryStructure::new();
        let script = fixed_script();

        let report = Driver::new(&structure, OUTPUT)
            .run(&script, Mode::Fixed)
            .await
            .unwrap();

        assert_eq!(report.verdict(), Verdict::Passed);
        assert_eq!(report.steps.len(), script.len());
        assert_none!(report.corruption);
        assert_none!(report.leftover.as_ref());
        assert!(report.mismatches().next().is_none(), "{:?}", report.errors());
        // 0 stays in the anchor, 6, 7 and 8 in the tree.
        assert_eq!(structure.len(), 4);
    }

    #[tokio::test]
    async fn regression_script_passes_link_checks() {
        let structure = MemoryStructure::new();

        let report = Driver::with_options(&structure, OUTPUT, CheckOptions { links: true })
            .run(&fixed_script(), Mode::Fixed)
            .await
            .unwrap();

        assert_eq!(report.verdict(), Verdict::Passed);
    }

    #[tokio::test]
    async fn mismatch_is_recorded_and_run_continues() {
        let structure = MemoryStructure::new();
        let script = [
            TestCase::insert(3),
            TestCase::rank(3, Some(5)),
            TestCase::insert(4),
            TestCase::count(Some(2)),
        ];

        let report = Driver::new(&structure, OUTPUT)
            .run(&script, Mode::Fixed)
            .await
            .unwrap();

        let statuses: Vec<_> = report.steps.iter().map(|step| step.status).collect();
        assert_eq!(
            statuses,
            [
                StepStatus::Unchecked,
                StepStatus::Failed,
                StepStatus::Unchecked,
                StepStatus::Passed
            ]
        );
        assert_eq!(report.verdict(), Verdict::Failed);
        assert_err!(report.result());
    }

    #[tokio::test]
    async fn string_answers_match_numeric_expectations() {
        let structure = Stringly(MemoryStructure::new());

        let report = Driver::new(&structure, OUTPUT)
            .run(&fixed_script(), Mode::Fixed)
            .await
            .unwrap();

        assert_eq!(report.verdict(), Verdict::Passed);
        let answer = report.steps[1].result.as_ref().unwrap();
        assert_eq!(answer, &Value::from("50"));
    }

    #[tokio::test]
    async fn removing_absent_keys_is_harmless() {
        let structure = MemoryStructure::new();
        let script = [
            TestCase::remove(7),
            TestCase::insert(7),
            TestCase::remove(7),
            TestCase::remove(7),
            TestCase::count(Some(0)),
        ];

        let report = Driver::new(&structure, OUTPUT)
            .run(&script, Mode::Fixed)
            .await
            .unwrap();

        assert_eq!(report.verdict(), Verdict::Passed);
    }

    #[tokio::test]
    async fn empty_run_leaves_tree_untouched() {
        let structure = populated(&[4, 2, 6, 2, 0]).await;

        let before = reconstruct(&structure, NodeHandle::ANCHOR).await.unwrap();
        let report = Driver::new(&structure, OUTPUT)
            .run(&[], Mode::Fixed)
            .await
            .unwrap();
        let after = reconstruct(&structure, NodeHandle::ANCHOR).await.unwrap();

        assert_eq!(before, after);
        assert!(report.steps.is_empty());
        assert_eq!(report.verdict(), Verdict::Passed);
    }
}

mod corruption {
    use super::*;

    #[tokio::test]
    async fn cycle_stops_the_run() {
        let structure = populated(&[2, 1, 3]).await;
        structure.tamper(NodeHandle::new(1), Tamper::LeftChild(2));

        let script = [TestCase::count(Some(3)), TestCase::insert(9)];
        let report = Driver::new(&structure, OUTPUT)
            .run(&script, Mode::Fixed)
            .await
            .unwrap();

        assert_eq!(report.steps.len(), 1);
        assert_eq!(
            report.corruption,
            Some(CorruptionReport {
                step: 0,
                corruption: Corruption::Cycle
            })
        );
        assert_eq!(report.verdict(), Verdict::Corrupt);
        // The insert after the corrupt step never reached the structure.
        assert_eq!(structure.len(), 3);
    }

    #[tokio::test]
    async fn wrong_count_stops_the_run() {
        let structure = populated(&[2, 1, 3]).await;
        structure.tamper(NodeHandle::new(1), Tamper::Count(5));

        let script = [TestCase::count(Some(3)), TestCase::insert(9)];
        let report = Driver::new(&structure, OUTPUT)
            .run(&script, Mode::Fixed)
            .await
            .unwrap();

        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.steps[0].status, StepStatus::Passed);
        let corruption = assert_some!(report.corruption);
        assert_matches!(
            corruption.corruption,
            Corruption::Invariant {
                violation: Violation::CountMismatch { reported: 5, .. }
            }
        );
    }

    #[tokio::test]
    async fn inflated_dupes_break_the_count() {
        let structure = populated(&[2, 1, 3]).await;
        structure.tamper(NodeHandle::new(1), Tamper::Dupes(2));

        let report = Driver::new(&structure, OUTPUT)
            .run(&[TestCase::count(Some(3))], Mode::Fixed)
            .await
            .unwrap();

        let corruption = assert_some!(report.corruption);
        assert_eq!(
            corruption.corruption,
            Corruption::Invariant {
                violation: Violation::CountMismatch {
                    value: NodeHandle::new(1),
                    reported: 1,
                    computed: 3,
                }
            }
        );
    }

    #[tokio::test]
    async fn wrong_parent_needs_link_checks() {
        let structure = populated(&[2, 1, 3]).await;
        structure.tamper(NodeHandle::new(3), Tamper::Parent(1));
        let script = [TestCase::count(Some(3))];

        let lenient = Driver::new(&structure, OUTPUT)
            .run(&script, Mode::Fixed)
            .await
            .unwrap();
        assert_eq!(lenient.verdict(), Verdict::Passed);

        let strict = Driver::with_options(&structure, OUTPUT, CheckOptions { links: true })
            .run(&script, Mode::Fixed)
            .await
            .unwrap();
        let corruption = assert_some!(strict.corruption);
        assert_eq!(
            corruption.corruption,
            Corruption::Invariant {
                violation: Violation::ParentMismatch {
                    value: NodeHandle::new(3),
                    reported: Some(NodeHandle::new(1)),
                    actual: NodeHandle::new(2),
                }
            }
        );
    }

    #[tokio::test]
    async fn mismatch_on_corrupt_step_is_kept() {
        let structure = populated(&[2, 1, 3]).await;
        structure.tamper(NodeHandle::new(3), Tamper::Height(4));

        let script = [TestCase::count(Some(7))];
        let report = Driver::new(&structure, OUTPUT)
            .run(&script, Mode::Fixed)
            .await
            .unwrap();

        assert_eq!(report.steps[0].status, StepStatus::Failed);
        assert_eq!(report.verdict(), Verdict::Corrupt);
        assert_eq!(report.errors().len(), 2);
    }

    #[tokio::test]
    async fn transport_failure_aborts() {
        let structure = Unreachable(MemoryStructure::new());

        let result = Driver::new(&structure, OUTPUT)
            .run(&[TestCase::insert(1)], Mode::Fixed)
            .await;

        let error = assert_err!(result);
        assert_matches!(
            error.downcast_ref::<ClientError>(),
            Some(ClientError::Malformed {
                method: "node_side",
                ..
            })
        );
    }
}

mod generative_runs {
    use core::num::NonZeroUsize;

    use super::*;

    #[tokio::test]
    async fn leftover_elements_are_reported() {
        let structure = MemoryStructure::new();
        let script = [TestCase::insert(4), TestCase::insert(1), TestCase::remove(1)];

        let report = Driver::new(&structure, OUTPUT)
            .run(&script, Mode::Generative)
            .await
            .unwrap();

        let leftover = assert_some!(report.leftover.as_ref());
        assert_eq!(
            leftover.root().map(|root| root.value),
            Some(NodeHandle::new(4))
        );
        assert_eq!(report.verdict(), Verdict::Leftover);
    }

    #[tokio::test]
    async fn leftover_zero_is_reported() {
        let structure = MemoryStructure::new();

        let report = Driver::new(&structure, OUTPUT)
            .run(&[TestCase::insert(0)], Mode::Generative)
            .await
            .unwrap();

        assert_eq!(report.leftover.map(|leftover| leftover.dupes), Some(1));
    }

    #[tokio::test]
    async fn empty_script_inspects_current_tree() {
        let structure = populated(&[8]).await;

        let report = Driver::new(&structure, OUTPUT)
            .run(&[], Mode::Generative)
            .await
            .unwrap();

        assert_eq!(report.verdict(), Verdict::Leftover);
    }

    #[tokio::test]
    async fn fixed_mode_ignores_leftovers() {
        let structure = MemoryStructure::new();

        let report = Driver::new(&structure, OUTPUT)
            .run(&[TestCase::insert(4)], Mode::Fixed)
            .await
            .unwrap();

        assert_none!(report.leftover.as_ref());
        assert_eq!(report.verdict(), Verdict::Passed);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn generated_scripts_drain_the_tree(seed in any::<u64>(), depth in 1_usize..60) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let structure = MemoryStructure::new();
            let cases = CaseGenerator::from_seed(seed).generate(NonZeroUsize::new(depth).unwrap());

            let report = runtime
                .block_on(Driver::new(&structure, OUTPUT).run(&cases, Mode::Generative))
                .unwrap();

            prop_assert_eq!(report.verdict(), Verdict::Passed);
            prop_assert_eq!(report.steps.len(), cases.len());
            prop_assert!(structure.is_empty());
        }
    }
}
