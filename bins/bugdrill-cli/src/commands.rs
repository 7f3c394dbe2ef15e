// CLI commands for running and grading submissions
use anyhow::{bail, Context, Result};
use bugdrill_common::{
    BindingStrategy, Config, ExecutionRequest, ExecutionResult, GradeRequest, GradingReport,
    Language, TestCase,
};
use bugdrill_engine::{
    grade, synthesize, DockerRunner, ExecutionGateway, GatewayPolicy, GradeOptions, LocalGateway,
    RemoteGateway, SandboxLimits,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Accepted layouts for the `--tests` file
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TestsFile {
    Bare(Vec<TestCase>),
    Wrapped { test_cases: Vec<TestCase> },
}

fn parse_test_cases(content: &str) -> Result<Vec<TestCase>> {
    let parsed: TestsFile =
        serde_json::from_str(content).context("Tests file must be a JSON array of test cases or an object with `test_cases`")?;
    Ok(match parsed {
        TestsFile::Bare(cases) => cases,
        TestsFile::Wrapped { test_cases } => test_cases,
    })
}

fn parse_inputs(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw).context("Failed to parse --input as JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("--input must be a JSON object of named inputs, got {}", other),
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Remote executor when a URL is known, otherwise the local Docker daemon
fn build_gateway(executor_url: Option<&str>) -> Result<Box<dyn ExecutionGateway>> {
    let config = Config::from_env();

    match executor_url.or(config.executor_url.as_deref()) {
        Some(url) => {
            let gateway = RemoteGateway::new(url, Duration::from_secs(config.client_timeout_secs))
                .context("Failed to create executor client")?
                .with_run_budget(Duration::from_secs(config.max_timeout_secs));
            Ok(Box::new(gateway))
        }
        None => {
            let runner = DockerRunner::connect(SandboxLimits::from(&config))
                .context("Failed to connect to Docker")?;
            Ok(Box::new(LocalGateway::new(runner, GatewayPolicy::from(&config))))
        }
    }
}

/// Run a file once and print the raw result
pub async fn run_file(file: &Path, timeout: Option<u64>, executor_url: Option<&str>) -> Result<()> {
    let source = read_source(file)?;
    let gateway = build_gateway(executor_url)?;

    println!("🚀 Running {}...", file.display());
    let request = ExecutionRequest::python(source).with_timeout(timeout);
    let result = gateway.execute(&request).await?;

    print!("{}", format_result(&result));
    Ok(())
}

fn format_result(result: &ExecutionResult) -> String {
    let mut out = String::new();
    let marker = if result.succeeded { "✅" } else { "❌" };
    out.push_str(&format!(
        "{} exit code {} ({:?}) in {}ms\n",
        marker, result.exit_code, result.classification, result.elapsed_ms
    ));
    if !result.stdout.is_empty() {
        out.push_str("\n--- stdout ---\n");
        out.push_str(&result.stdout);
        if !result.stdout.ends_with('\n') {
            out.push('\n');
        }
    }
    if !result.stderr.is_empty() {
        out.push_str("\n--- stderr ---\n");
        out.push_str(&result.stderr);
        if !result.stderr.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// Grade a file against a tests file
pub async fn grade_file(
    file: &Path,
    tests: &Path,
    timeout: Option<u64>,
    binding: BindingStrategy,
    parallel: bool,
    executor_url: Option<&str>,
    json: bool,
) -> Result<()> {
    let code = read_source(file)?;
    let content =
        fs::read_to_string(tests).with_context(|| format!("Failed to read {}", tests.display()))?;
    let test_cases = parse_test_cases(&content)?;

    let gateway = build_gateway(executor_url)?;
    let request = GradeRequest {
        code,
        language: Language::Python.tag().to_string(),
        test_cases,
        timeout_seconds: timeout,
    };
    let options = GradeOptions {
        binding,
        parallel_cases: parallel,
    };

    if !json {
        println!(
            "🧪 Grading {} against {} test case(s)...",
            file.display(),
            request.test_cases.len()
        );
    }

    let report = grade(gateway.as_ref(), &request, options).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        print!("{}", format_report(&report));
    }

    Ok(())
}

fn format_report(report: &GradingReport) -> String {
    let mut out = String::new();

    for verdict in &report.verdicts {
        let marker = if verdict.passed { "✓" } else { "✗" };
        out.push_str(&format!(
            "  {} case {}: expected {} got {} ({}ms)\n",
            marker,
            verdict.index,
            verdict.expected,
            display_actual(&verdict.actual),
            verdict.elapsed_ms
        ));
    }

    let passed = report.verdicts.iter().filter(|v| v.passed).count();
    let summary = if report.overall_correct { "✅ Correct" } else { "❌ Incorrect" };
    out.push_str(&format!(
        "\n{}: {}/{} passed in {}ms ({})\n",
        summary,
        passed,
        report.verdicts.len(),
        report.total_elapsed_ms,
        report.execution_id
    ));

    if !report.stderr.is_empty() {
        out.push_str("\n--- stderr ---\n");
        out.push_str(report.stderr.trim_end());
        out.push('\n');
    }

    out
}

fn display_actual(actual: &Value) -> String {
    match actual {
        Value::String(text) => text.trim_end().to_string(),
        other => other.to_string(),
    }
}

/// Print the harness for one input
pub fn show_harness(file: &Path, input: &str, binding: BindingStrategy) -> Result<()> {
    let source = read_source(file)?;
    let inputs = parse_inputs(input)?;
    let harnessed = synthesize(&source, &inputs, binding);

    match &harnessed.symbol {
        Some(symbol) => println!("# target: {}({})", symbol, harnessed.arguments.join(", ")),
        None => println!("# ⚠️  no function definition found"),
    }
    print!("{}", harnessed.source);
    Ok(())
}

/// Check that a remote executor is up
pub async fn check_health(executor_url: &str) -> Result<()> {
    let gateway = RemoteGateway::new(executor_url, Duration::from_secs(5))
        .context("Failed to create executor client")?;

    println!("🔍 Checking {}...", gateway.base_url());
    gateway
        .health()
        .await
        .with_context(|| format!("Executor at {} is not healthy", gateway.base_url()))?;
    println!("✅ Executor is healthy");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bugdrill_common::{Classification, TestVerdict};
    use bugdrill_common::types::ReportStatus;
    use serde_json::json;

    #[test]
    fn test_parse_bare_test_cases() {
        let cases = parse_test_cases(
            r#"[{"input": {"nums": [2, 7, 11, 15], "target": 9}, "expected": [0, 1]}]"#,
        )
        .unwrap();

        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].inputs["target"], json!(9));
        assert_eq!(cases[0].expected, json!([0, 1]));
    }

    #[test]
    fn test_parse_wrapped_test_cases() {
        let cases = parse_test_cases(
            r#"{"test_cases": [{"input": {"s": "abc"}, "expected": 3}, {"input": {"s": ""}, "expected": 0}]}"#,
        )
        .unwrap();

        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].expected, json!(0));
    }

    #[test]
    fn test_parse_test_cases_rejects_garbage() {
        assert!(parse_test_cases(r#"{"cases": 1}"#).is_err());
        assert!(parse_test_cases("not json").is_err());
    }

    #[test]
    fn test_parse_inputs_requires_object() {
        assert_eq!(parse_inputs(r#"{"k": 2}"#).unwrap()["k"], json!(2));
        assert!(parse_inputs("[1, 2]").is_err());
    }

    #[test]
    fn test_format_result_sections() {
        let result = ExecutionResult::exited("hi".to_string(), String::new(), 0, 12);
        let text = format_result(&result);

        assert!(text.starts_with("✅ exit code 0"));
        assert!(text.contains("--- stdout ---\nhi\n"));
        assert!(!text.contains("stderr"));

        let failed = ExecutionResult::exited(String::new(), "boom\n".to_string(), 1, 3);
        let text = format_result(&failed);
        assert!(text.starts_with("❌"));
        assert!(text.contains(&format!("{:?}", Classification::NonZeroExit)));
        assert!(text.contains("--- stderr ---\nboom\n"));
    }

    #[test]
    fn test_format_report_summary() {
        let report = GradingReport {
            execution_id: "exec_test".to_string(),
            status: ReportStatus::Completed,
            overall_correct: false,
            verdicts: vec![
                TestVerdict {
                    index: 1,
                    input: json!({"nums": [2, 7], "target": 9}),
                    expected: json!([0, 1]),
                    actual: json!("[0, 1]\n"),
                    passed: true,
                    elapsed_ms: 40,
                },
                TestVerdict {
                    index: 2,
                    input: json!({"nums": [1, 2], "target": 9}),
                    expected: json!([-1, -1]),
                    actual: json!("[0, 0]\n"),
                    passed: false,
                    elapsed_ms: 38,
                },
            ],
            total_elapsed_ms: 120,
            stdout: String::new(),
            stderr: String::new(),
        };

        let text = format_report(&report);
        assert!(text.contains("✓ case 1: expected [0,1] got [0, 1] (40ms)"));
        assert!(text.contains("✗ case 2"));
        assert!(text.contains("❌ Incorrect: 1/2 passed in 120ms (exec_test)"));
    }
}
