//! End-to-end checks against a real Docker daemon.
//!
//! Run with `cargo test -p bugdrill-engine -- --ignored --test-threads=1`
//! on a host where the daemon is reachable and `python:3.11-alpine` can be
//! pulled. The cleanup check counts every labelled sandbox container, so
//! these must not run alongside each other.

use bollard::container::ListContainersOptions;
use bollard::Docker;
use bugdrill_common::{Classification, ExecutionRequest, GradeRequest};
use bugdrill_engine::{
    grade, DockerRunner, ExecutionGateway, GatewayPolicy, GradeOptions, LocalGateway,
    SandboxLimits, SandboxRunner, SANDBOX_LABEL,
};
use serde_json::json;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const TWO_SUM: &str = "def twoSum(nums: list[int], target: int) -> list[int]:
    left, right = 0, len(nums) - 1
    while left < right:
        current_sum = nums[left] + nums[right]
        if current_sum == target:
            return [left, right]
        elif current_sum < target:
            left += 1
        else:
            right -= 1
    return [-1, -1]";

fn gateway() -> LocalGateway<DockerRunner> {
    let runner = DockerRunner::connect(SandboxLimits::default()).expect("docker client");
    LocalGateway::new(runner, GatewayPolicy::default())
}

fn two_sum_request(code: &str) -> GradeRequest {
    serde_json::from_value(json!({
        "code": code,
        "language": "python",
        "test_cases": [
            {"input": {"nums": [2, 7, 11, 15], "target": 9}, "expected": [0, 1]}
        ],
        "timeout_sec": 10
    }))
    .unwrap()
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn runs_python_and_captures_streams() {
    let gateway = gateway();
    let request = ExecutionRequest::python("import sys\nprint('out')\nprint('err', file=sys.stderr)");

    let result = gateway.execute(&request).await.unwrap();

    assert!(result.succeeded);
    assert_eq!(result.classification, Classification::Ok);
    assert_eq!(result.stdout, "out\n");
    assert_eq!(result.stderr, "err\n");
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn non_zero_exit_is_a_normal_result() {
    let result = gateway()
        .execute(&ExecutionRequest::python("raise SystemExit(3)"))
        .await
        .unwrap();

    assert!(!result.succeeded);
    assert_eq!(result.exit_code, 3);
    assert_eq!(result.classification, Classification::NonZeroExit);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn sleeping_past_deadline_times_out() {
    let runner = DockerRunner::connect(SandboxLimits::default()).unwrap();
    let started = Instant::now();

    let result = runner
        .run("import time\ntime.sleep(30)", Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(result.classification, Classification::TimedOut);
    assert_eq!(result.exit_code, 124);
    assert!(!result.succeeded);
    assert_eq!(result.stderr, "Execution timeout exceeded");
    assert!(started.elapsed() < Duration::from_secs(15));
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn network_is_unavailable() {
    let source = "import socket\nsocket.create_connection(('1.1.1.1', 53), timeout=2)";
    let result = gateway().execute(&ExecutionRequest::python(source)).await.unwrap();

    assert!(!result.succeeded);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn grades_correct_solution() {
    let report = grade(&gateway(), &two_sum_request(TWO_SUM), GradeOptions::default())
        .await
        .unwrap();

    assert!(report.overall_correct);
    assert_eq!(report.verdicts[0].actual, json!("[0, 1]"));
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn grades_wrong_solution() {
    let code = "def twoSum(nums, target):\n    return [-1, -1]";
    let report = grade(&gateway(), &two_sum_request(code), GradeOptions::default())
        .await
        .unwrap();

    assert!(!report.overall_correct);
    assert_eq!(report.verdicts[0].actual, json!("[-1, -1]"));
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn grades_invalid_source_from_baseline() {
    let report = grade(
        &gateway(),
        &two_sum_request("this is not valid python syntax!!!"),
        GradeOptions::default(),
    )
    .await
    .unwrap();

    assert!(!report.overall_correct);
    assert!(report.stderr.contains("SyntaxError"));
    assert_eq!(report.verdicts[0].actual, json!(report.stderr));
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn large_harness_runs_through_stdin() {
    let nums: Vec<u64> = (0..40_000).collect();
    let request = GradeRequest {
        code: "def twoSum(nums, target):\n    return [len(nums) - 2, len(nums) - 1]".to_string(),
        language: "python".to_string(),
        test_cases: vec![serde_json::from_value(json!({
            "input": {"nums": nums, "target": 79_997},
            "expected": [39_998, 39_999]
        }))
        .unwrap()],
        timeout_seconds: Some(10),
    };

    let report = grade(&gateway(), &request, GradeOptions::default()).await.unwrap();

    assert!(report.overall_correct, "verdict: {:?}", report.verdicts[0].actual);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn abandoned_run_still_removes_its_container() {
    let runner = DockerRunner::connect(SandboxLimits::default()).unwrap();
    // warm the image so the abandoned run gets as far as a live container
    runner.run("pass", Duration::from_secs(10)).await.unwrap();

    let abandoned = tokio::time::timeout(
        Duration::from_secs(2),
        runner.run("while True:\n    pass", Duration::from_secs(4)),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_secs(8)).await;

    let docker = Docker::connect_with_local_defaults().unwrap();
    let filters = HashMap::from([("label".to_string(), vec![SANDBOX_LABEL.to_string()])]);
    let left = docker
        .list_containers(Some(ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        }))
        .await
        .unwrap();

    assert!(left.is_empty(), "leaked containers: {:?}", left);
}
