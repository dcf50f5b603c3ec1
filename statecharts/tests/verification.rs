//! Charts the verifier must refuse, and warnings that must not block.

use statecharts::{
    compile, BackendKind, CompileError, EmitOptions, OutputKind, ScenarioConfig, Severity,
};

fn try_compile(source: &str) -> Result<statecharts::CompileOutput, CompileError> {
    let options = EmitOptions {
        backend: BackendKind::Cpp,
        output: OutputKind::Header,
        prefix: None,
        stem: "fixture".to_string(),
    };
    compile(source, &ScenarioConfig::default(), &options)
}

fn structural_errors(err: CompileError) -> Vec<String> {
    match err {
        CompileError::Structure { diagnostics } => diagnostics
            .into_iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| d.message)
            .collect(),
        other => panic!("expected structural failure, got {other:?}"),
    }
}

#[test]
fn completion_ping_pong_is_an_infinite_loop() {
    let err = try_compile(
        "[*] --> A :
A --> B :
B --> A :
",
    )
    .expect_err("unguarded completion cycle must be rejected");
    let errors = structural_errors(err);
    assert!(
        errors
            .iter()
            .any(|m| m.contains("unguarded completion cycle")),
        "unexpected errors: {errors:?}"
    );
}

#[test]
fn ambiguous_unguarded_switch_is_rejected() {
    let err = try_compile(
        "[*] --> A :
A --> B :
A --> C :
B --> Done : finish
C --> Done : finish
",
    )
    .expect_err("two unguarded completions from one state must be rejected");
    let errors = structural_errors(err);
    assert!(errors.iter().any(|m| m.contains("dispatch is ambiguous")));
}

#[test]
fn missing_initial_state_is_rejected() {
    let err = try_compile("A --> B : go\nB --> A : back\n")
        .expect_err("chart without `[*]` must be rejected");
    let errors = structural_errors(err);
    assert!(errors.iter().any(|m| m.contains("missing initial state")));
}

#[test]
fn unreachable_state_is_rejected() {
    let err = try_compile(
        "[*] --> A :
A --> A : tick
Ghost --> A : haunt
",
    )
    .expect_err("unreachable state must be rejected");
    let errors = structural_errors(err);
    assert!(errors.iter().any(|m| m.contains("unreachable state `Ghost`")));
}

#[test]
fn parse_errors_carry_positions_and_abort() {
    let err = try_compile("A ->> B : go\n").expect_err("unknown arrow must be rejected");
    match err {
        CompileError::Parse { errors } => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].pos.line, 1);
            assert!(errors[0].pos.col > 1);
        }
        other => panic!("expected parse failure, got {other:?}"),
    }
}

#[test]
fn warnings_do_not_block_emission() {
    let output = try_compile(
        "[*] --> A :
A --> Parked : park
",
    )
    .expect("a dead-end state is only a warning");
    assert!(
        output
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Warning && d.message.contains("cannot leave")),
    );
    assert_eq!(output.artifacts.len(), 2);
}
