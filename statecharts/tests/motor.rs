//! The motor controller: completion drain after an event sequence.

use statecharts::{
    compile, BackendKind, EmitOptions, OutputKind, ScenarioConfig, ScenarioKind,
};

const MOTOR: &str = "\
[*] --> Idle :
Idle : entry / motorOff()
Spinning : entry / motorOn()
Spinning : exit / rampDown()
Idle --> Starting : setSpeed
Starting --> Spinning : setSpeed
Starting --> Stopping : halt
Spinning --> Stopping : halt
Stopping --> Idle :
";

fn compile_motor() -> statecharts::CompileOutput {
    let options = EmitOptions {
        backend: BackendKind::Cpp,
        output: OutputKind::Header,
        prefix: None,
        stem: "motor".to_string(),
    };
    compile(MOTOR, &ScenarioConfig::default(), &options).expect("motor chart should compile")
}

#[test]
fn halt_sequence_drains_back_to_idle() {
    let output = compile_motor();
    let cycle = output
        .scenarios
        .iter()
        .find(|s| s.kind == ScenarioKind::Cycle && s.steps == ["setSpeed", "halt"])
        .expect("setSpeed/halt cycle");
    let expected: Vec<&str> = cycle
        .expected
        .iter()
        .map(|&id| output.graph.state(id).name.as_str())
        .collect();
    assert_eq!(expected, ["Idle"]);
}

#[test]
fn generated_test_replays_the_halt_sequence() {
    let output = compile_motor();
    let tests = &output.artifacts[1].contents;
    assert!(tests.contains("machine.setSpeed();\n    machine.halt();"));
    assert!(tests.contains("== Motor::State::Idle"));
}

#[test]
fn entry_and_exit_bodies_become_hooks() {
    let output = compile_motor();
    let machine = &output.artifacts[0].contents;
    assert!(machine.contains("virtual void onEnteringIdle()"));
    assert!(machine.contains("motorOff();"));
    assert!(machine.contains("virtual void onEnteringSpinning()"));
    assert!(machine.contains("virtual void onLeavingSpinning()"));
    assert!(machine.contains("rampDown();"));
    // Stopping never declared hooks; its table row is empty.
    assert!(machine.contains("StateHooks{nullptr, nullptr}, // Stopping"));
}
