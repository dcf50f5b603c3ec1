//! Black-box runs of the `statecharts` binary through a scratch directory.

use std::fs;
use std::process::Command;

const MOTOR: &str = "\
[*] --> Idle :
Idle --> Starting : setSpeed
Starting --> Spinning : setSpeed
Starting --> Stopping : halt
Spinning --> Stopping : halt
Stopping --> Idle :
";

const PING_PONG: &str = "\
[*] --> A :
A --> B :
B --> A :
";

fn statecharts() -> Command {
    Command::new(env!("CARGO_BIN_EXE_statecharts"))
}

#[test]
fn generates_artifacts_next_to_the_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("motor.puml");
    fs::write(&input, MOTOR).expect("write chart");

    let status = statecharts()
        .arg(&input)
        .arg("hpp")
        .status()
        .expect("binary should run");
    assert!(status.success());
    assert!(dir.path().join("Motor.hpp").exists());
    assert!(dir.path().join("MotorTests.cpp").exists());

    let machine = fs::read_to_string(dir.path().join("Motor.hpp")).unwrap();
    assert!(machine.contains("class Motor"));
    assert!(machine.contains("#pragma once"));
}

#[test]
fn prefix_and_out_dir_are_honored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("motor.puml");
    fs::write(&input, MOTOR).expect("write chart");
    let out = dir.path().join("generated");

    let status = statecharts()
        .arg(&input)
        .arg("cpp")
        .arg("Demo")
        .arg("--out-dir")
        .arg(&out)
        .status()
        .expect("binary should run");
    assert!(status.success());
    assert!(out.join("DemoMotor.cpp").exists());
    assert!(out.join("DemoMotorTests.cpp").exists());
}

#[test]
fn structural_failure_reports_and_emits_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("pingpong.puml");
    fs::write(&input, PING_PONG).expect("write chart");

    let output = statecharts()
        .arg(&input)
        .arg("hpp")
        .output()
        .expect("binary should run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pingpong.puml"));
    assert!(stderr.contains("error: "));
    assert!(stderr.contains("unguarded completion cycle"));
    assert!(!dir.path().join("Pingpong.hpp").exists());
}

#[test]
fn parse_failure_points_at_line_and_column() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("broken.puml");
    fs::write(&input, "A ->> B : go\n").expect("write chart");

    let output = statecharts()
        .arg(&input)
        .arg("hpp")
        .output()
        .expect("binary should run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("broken.puml:1:3: error:"), "stderr: {stderr}");
}

#[test]
fn verify_only_checks_without_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("motor.puml");
    fs::write(&input, MOTOR).expect("write chart");

    let status = statecharts()
        .arg(&input)
        .arg("hpp")
        .arg("--verify-only")
        .status()
        .expect("binary should run");
    assert!(status.success());
    assert!(!dir.path().join("Motor.hpp").exists());
}

#[test]
fn unknown_output_kind_is_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("motor.puml");
    fs::write(&input, MOTOR).expect("write chart");

    let output = statecharts()
        .arg(&input)
        .arg("rust")
        .output()
        .expect("binary should run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown output kind"));
}
