//! Runs the `load_compare` binary as a subprocess with a small workload.

#![cfg(not(miri))]
#![allow(missing_docs, reason = "No need for API documentation in test code")]

use std::process::{Command, Output};

use testing::ScratchDir;

fn run_binary(scratch: &ScratchDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_load_compare"))
        .args(["--matrix-size", "8", "--scratch-dir"])
        .arg(scratch.path())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("binary must be runnable")
}

#[test]
fn runs_both_modes_and_reports_speedup() {
    let scratch = ScratchDir::new();

    let output = run_binary(&scratch, &["--repetitions", "3", "--concurrency", "4"]);

    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines = stdout.lines().collect::<Vec<_>>();

    assert_eq!(lines.first(), Some(&"Running single-threaded test..."));
    assert!(lines.contains(&"Running multi-threaded test..."));
    assert!(lines.contains(&"Single-threaded invocations: 12"));
    assert!(lines.contains(&"Multi-threaded invocations: 12"));

    // The comparison closes with a separated speedup line.
    let [.., blank, speedup] = lines.as_slice() else {
        panic!("output too short:\n{stdout}");
    };
    assert_eq!(*blank, "");
    assert!(
        speedup.starts_with("Speedup: ") && (speedup.ends_with('x') || *speedup == "Speedup: n/a"),
        "{speedup}"
    );

    for prefix in [
        "Before Single-threaded Test Memory Usage: Live = ",
        "Single-threaded computation time: ",
        "After Single-threaded Test Memory Usage: Live = ",
        "Before Multi-threaded Test Memory Usage: Live = ",
        "Multi-threaded computation time: ",
        "After Multi-threaded Test Memory Usage: Live = ",
        "Speedup: ",
    ] {
        assert!(
            lines.iter().any(|line| line.starts_with(prefix)),
            "missing line starting with '{prefix}' in:\n{stdout}"
        );
    }

    scratch.assert_empty();
}

#[test]
fn single_mode_has_no_speedup_line() {
    let scratch = ScratchDir::new();

    let output = run_binary(
        &scratch,
        &["--repetitions", "2", "--concurrency", "2", "--mode", "concurrent"],
    );

    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8(output.stdout).unwrap();

    assert!(stdout.starts_with("Running multi-threaded test...\n"));
    assert!(!stdout.contains("single-threaded"));
    assert!(!stdout.contains("Speedup"));
    scratch.assert_empty();
}

#[test]
fn zero_concurrency_completes() {
    let scratch = ScratchDir::new();

    let output = run_binary(&scratch, &["--concurrency", "0"]);

    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Single-threaded invocations: 0"));
    assert!(stdout.contains("Multi-threaded invocations: 0"));
}

#[test]
fn invalid_mode_is_rejected() {
    let scratch = ScratchDir::new();

    let output = run_binary(&scratch, &["--mode", "parallel"]);

    assert!(!output.status.success());
}

#[test]
fn verbose_logs_to_stderr_only() {
    let scratch = ScratchDir::new();

    let output = run_binary(
        &scratch,
        &["--repetitions", "1", "--concurrency", "1", "--verbose"],
    );

    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8(output.stdout).unwrap();
    let stderr = String::from_utf8(output.stderr).unwrap();

    assert!(stderr.contains("sequential mode completed"), "{stderr}");
    assert!(stderr.contains("concurrent mode completed"), "{stderr}");
    assert!(!stdout.contains("mode completed"));
}
