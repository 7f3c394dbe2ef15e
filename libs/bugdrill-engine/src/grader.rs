/// Grading Orchestrator
///
/// **Responsibility:**
/// Drive one grading request end to end:
/// 1. Baseline: run the submitted code unmodified
/// 2. AllFail: baseline failed → every case fails with the baseline stderr,
///    no further sandbox runs
/// 3. PerCase: harness → gateway → comparator for every case, in order
/// 4. Done: assemble the report
///
/// Only gateway errors on the baseline abort the request. A failing case
/// never stops the loop.

use crate::comparator::{compare_detailed, Comparison};
use crate::gateway::ExecutionGateway;
use crate::harness;
use bugdrill_common::types::{new_execution_id, ReportStatus};
use bugdrill_common::{
    BindingStrategy, EngineError, ExecutionResult, GradeRequest, GradingReport,
    TestCase, TestVerdict,
};
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GradeOptions {
    pub binding: BindingStrategy,
    /// Issue per-case runs concurrently; verdict order is unaffected
    pub parallel_cases: bool,
}

pub async fn grade<G>(
    gateway: &G,
    request: &GradeRequest,
    options: GradeOptions,
) -> Result<GradingReport, EngineError>
where
    G: ExecutionGateway + ?Sized,
{
    let baseline = gateway.execute(&request.baseline()).await?;

    let verdicts = if baseline.succeeded {
        run_cases(gateway, request, options).await
    } else {
        info!(
            test_count = request.test_cases.len(),
            exit_code = baseline.exit_code,
            classification = ?baseline.classification,
            "Baseline run failed; all test cases fail"
        );
        fail_all(&request.test_cases, &baseline.stderr)
    };

    let overall_correct = baseline.succeeded && verdicts.iter().all(|v| v.passed);
    let report = GradingReport {
        execution_id: new_execution_id(),
        status: ReportStatus::Completed,
        overall_correct,
        verdicts,
        total_elapsed_ms: baseline.elapsed_ms,
        stdout: baseline.stdout,
        stderr: baseline.stderr,
    };

    info!(
        execution_id = %report.execution_id,
        is_correct = report.overall_correct,
        passed = report.verdicts.iter().filter(|v| v.passed).count(),
        total = report.verdicts.len(),
        "Grading complete"
    );

    Ok(report)
}

async fn run_cases<G>(gateway: &G, request: &GradeRequest, options: GradeOptions) -> Vec<TestVerdict>
where
    G: ExecutionGateway + ?Sized,
{
    let cases = request
        .test_cases
        .iter()
        .enumerate()
        .map(|(i, case)| grade_case(gateway, request, i + 1, case, options.binding));

    if options.parallel_cases {
        return join_all(cases).await;
    }

    let mut verdicts = Vec::with_capacity(request.test_cases.len());
    for case in cases {
        verdicts.push(case.await);
    }
    verdicts
}

async fn grade_case<G>(
    gateway: &G,
    request: &GradeRequest,
    index: usize,
    case: &TestCase,
    binding: BindingStrategy,
) -> TestVerdict
where
    G: ExecutionGateway + ?Sized,
{
    let harnessed = harness::synthesize(&request.code, &case.inputs, binding);
    let run = request.baseline().with_harness(harnessed.invocation);

    let (actual, passed, elapsed_ms) = match gateway.execute(&run).await {
        Ok(result) => judge(&case.expected, result),
        Err(e) => (format!("internal error: {}", e), false, 0),
    };

    debug!(test_case = index, passed, execution_time_ms = elapsed_ms, "Test case graded");

    TestVerdict {
        index,
        input: Value::Object(case.inputs.clone()),
        expected: case.expected.clone(),
        actual: Value::String(actual),
        passed,
        elapsed_ms,
    }
}

fn judge(expected: &Value, result: ExecutionResult) -> (String, bool, u64) {
    if !result.succeeded {
        return (result.stderr, false, result.elapsed_ms);
    }

    let actual = result.stdout.trim().to_string();
    let comparison = compare_detailed(expected, &actual);
    if comparison == Comparison::Ambiguous {
        debug!("Output is neither an exact match nor structured data");
    }

    (actual, comparison.passed(), result.elapsed_ms)
}

fn fail_all(cases: &[TestCase], baseline_stderr: &str) -> Vec<TestVerdict> {
    cases
        .iter()
        .enumerate()
        .map(|(i, case)| TestVerdict {
            index: i + 1,
            input: Value::Object(case.inputs.clone()),
            expected: case.expected.clone(),
            actual: Value::String(baseline_stderr.to_string()),
            passed: false,
            elapsed_ms: 0,
        })
        .collect()
}
