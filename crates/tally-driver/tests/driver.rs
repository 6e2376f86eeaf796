//! Process driver integration tests against POSIX `sh` targets.

#![cfg(unix)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use rstest::rstest;

use tally_core::CommandScript;
use tally_driver::{DriveRequest, Driver, DriverError, Termination};

fn sh(script: &str, lines: &[&str]) -> DriveRequest {
    DriveRequest::new("sh", CommandScript::new(lines.iter().copied()))
        .args(["-c", script])
        .step_delay(Duration::ZERO)
        .timeout(Duration::from_secs(10))
}

#[tokio::test]
async fn echoes_script_through_cat() {
    let request = DriveRequest::new("cat", CommandScript::new(["hello", "", "world"]))
        .step_delay(Duration::ZERO)
        .timeout(Duration::from_secs(10));

    let outcome = Driver::new().run(&request).await.unwrap();

    assert_eq!(outcome.output, "hello\n\nworld\n");
    assert_eq!(outcome.termination, Termination::Exited { code: Some(0) });
    assert_eq!(outcome.lines_sent, 3);
    assert!(!outcome.truncated);
}

#[tokio::test]
async fn stderr_is_merged_into_output() {
    let request = sh(r#"read a; echo "out:$a"; echo "err:$a" >&2"#, &["x"]);
    let outcome = Driver::new().run(&request).await.unwrap();

    assert!(outcome.output.contains("out:x"), "{}", outcome.output);
    assert!(outcome.output.contains("err:x"), "{}", outcome.output);
    assert!(outcome.termination.is_clean());
}

#[tokio::test]
async fn nonzero_exit_code_is_reported() {
    let outcome = Driver::new().run(&sh("exit 7", &[])).await.unwrap();
    assert_eq!(outcome.termination, Termination::Exited { code: Some(7) });
}

#[tokio::test]
async fn endless_chatty_target_times_out_promptly() {
    let timeout = Duration::from_millis(500);
    let request = sh("while true; do echo tick; done", &["ignored"])
        .timeout(timeout)
        .max_output_bytes(1024);

    let outcome = Driver::new()
        .with_drain_grace(Duration::from_millis(500))
        .run(&request)
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::TimedOut);
    assert!(outcome.elapsed >= timeout);
    assert!(
        outcome.elapsed < timeout + Duration::from_secs(3),
        "took {:?}",
        outcome.elapsed
    );
    assert!(outcome.output.starts_with("tick\n"));
    assert!(outcome.truncated);
    assert_eq!(outcome.output.len(), 1024);
}

/// The target fills its output pipe before reading any input, while the
/// script is itself larger than the input pipe buffer.
#[rstest]
#[case::stdout("head -c 200000 /dev/zero; cat")]
#[case::stderr("head -c 200000 /dev/zero >&2; cat")]
#[tokio::test]
async fn output_flood_before_first_read_does_not_deadlock(#[case] script: &str) {
    let lines: Vec<String> = (0..5000).map(|i| format!("line {i:015}")).collect();
    let request = DriveRequest::new("sh", CommandScript::new(lines.iter().map(String::as_str)))
        .args(["-c", script])
        .step_delay(Duration::ZERO)
        .timeout(Duration::from_secs(20));

    let outcome = Driver::new().run(&request).await.unwrap();

    assert_eq!(outcome.termination, Termination::Exited { code: Some(0) });
    assert_eq!(outcome.lines_sent, 5000);
    assert!(!outcome.truncated);
    let echoed: usize = lines.iter().map(|l| l.len() + 1).sum();
    assert_eq!(outcome.output.len(), 200_000 + echoed);
    assert!(outcome.output.contains("line 000000000004999\n"));
}

#[tokio::test]
async fn startup_delay_counts_against_timeout() {
    let request = DriveRequest::new("cat", CommandScript::new(["late"]))
        .startup_delay(Duration::from_secs(5))
        .timeout(Duration::from_millis(300));

    let outcome = Driver::new().run(&request).await.unwrap();

    assert!(outcome.termination.is_timed_out());
    assert_eq!(outcome.lines_sent, 0);
    assert!(outcome.elapsed < Duration::from_secs(4));
}

#[tokio::test]
async fn closed_input_stops_feeding_without_error() {
    let lines: Vec<String> = (0..50).map(|i| i.to_string()).collect();
    let request = DriveRequest::new("sh", CommandScript::new(lines))
        .args(["-c", "exec 0<&-; echo bye; exit 3"])
        .startup_delay(Duration::from_millis(300))
        .step_delay(Duration::ZERO)
        .timeout(Duration::from_secs(10));

    let outcome = Driver::new().run(&request).await.unwrap();

    assert_eq!(outcome.lines_sent, 0);
    assert_eq!(outcome.termination, Termination::Exited { code: Some(3) });
    assert_eq!(outcome.output, "bye\n");
}

#[tokio::test]
async fn step_delay_paces_lines() {
    let request = DriveRequest::new("cat", CommandScript::new(["a", "b", "c"]))
        .step_delay(Duration::from_millis(100))
        .timeout(Duration::from_secs(10));

    let outcome = Driver::new().run(&request).await.unwrap();

    assert_eq!(outcome.lines_sent, 3);
    assert!(outcome.elapsed >= Duration::from_millis(300));
}

#[tokio::test]
async fn env_and_working_dir_reach_the_child() {
    let dir = tempfile::tempdir().unwrap();
    let request = sh(r#"echo "$TALLY_TEST_VAR"; pwd"#, &[])
        .env("TALLY_TEST_VAR", "from-harness")
        .working_dir(dir.path());

    let outcome = Driver::new().run(&request).await.unwrap();

    let name = dir.path().file_name().unwrap().to_string_lossy().into_owned();
    assert!(outcome.output.contains("from-harness"), "{}", outcome.output);
    assert!(outcome.output.contains(&name), "{}", outcome.output);
}

#[tokio::test]
async fn missing_program_is_a_launch_failure() {
    let request = DriveRequest::new("/nonexistent/tally-target", CommandScript::default());
    let err = Driver::new().run(&request).await.unwrap_err();
    assert!(
        matches!(err, DriverError::Launch { ref program, .. } if program == "/nonexistent/tally-target"),
        "unexpected error: {err}"
    );
}
