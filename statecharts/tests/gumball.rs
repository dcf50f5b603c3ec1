//! End-to-end pipeline coverage on the gumball dispenser chart.

use statecharts::{
    analyze, compile, describe, BackendKind, EmitOptions, Fragment, OutputKind, ScenarioConfig,
    ScenarioKind, TransitionKind,
};

const GUMBALL: &str = "\
@startuml
'[brief] Dispenses gumballs until the hopper runs dry.
'[param] unsigned gumballs_
'[cons] gumballs(gumballs_)
'[code] unsigned gumballs;
[*] --> NoQuarter : [ gumballs > 0 ]
[*] --> OutOfGumballs : [ gumballs == 0 ]
NoQuarter --> HasQuarter : insertQuarter
HasQuarter --> GumballSold : turnCrank / --gumballs
GumballSold --> NoQuarter : [ gumballs > 0 ]
GumballSold --> OutOfGumballs : [ gumballs == 0 ]
@enduml
";

fn options(output: OutputKind) -> EmitOptions {
    EmitOptions {
        backend: BackendKind::Cpp,
        output,
        prefix: None,
        stem: "gumball".to_string(),
    }
}

#[test]
fn graph_records_every_declared_transition() {
    let (graph, warnings) = analyze(GUMBALL, "Gumball").expect("gumball chart should verify");
    // The empty hopper is a legitimate dead end; the verifier flags it
    // and moves on.
    assert!(
        warnings
            .iter()
            .any(|w| w.message.contains("OutOfGumballs")),
        "expected the sink warning, got {warnings:?}"
    );

    let transitions = graph.transitions();
    assert_eq!(transitions.len(), 6);

    let sell = transitions
        .iter()
        .find(|t| t.trigger() == "turnCrank")
        .expect("turnCrank transition");
    assert_eq!(graph.state(sell.source).name, "HasQuarter");
    assert_eq!(graph.state(sell.target).name, "GumballSold");
    assert_eq!(sell.kind, TransitionKind::External);
    assert_eq!(sell.guard, Fragment::Empty);
    assert_eq!(sell.action, Fragment::Text("--gumballs".to_string()));

    let refill = transitions
        .iter()
        .find(|t| {
            t.is_completion() && graph.state(t.source).name == "GumballSold"
                && graph.state(t.target).name == "NoQuarter"
        })
        .expect("completion back to NoQuarter");
    assert_eq!(refill.guard, Fragment::Text("gumballs > 0".to_string()));
}

#[test]
fn sell_cycle_compiles_end_to_end() {
    let output = compile(GUMBALL, &ScenarioConfig::default(), &options(OutputKind::Header))
        .expect("gumball chart should compile");

    assert_eq!(output.artifacts.len(), 2);
    assert_eq!(output.artifacts[0].file_name, "Gumball.hpp");
    assert_eq!(output.artifacts[1].file_name, "GumballTests.cpp");

    // Reset settles behind the two guarded initial transitions.
    let reset = &output.scenarios[0];
    assert_eq!(reset.kind, ScenarioKind::Initial);
    let settled: Vec<&str> = reset
        .expected
        .iter()
        .map(|&id| output.graph.state(id).name.as_str())
        .collect();
    assert_eq!(settled, ["NoQuarter", "OutOfGumballs"]);

    // The sell loop: two coins in the machine, one crank, back to NoQuarter.
    let cycle = output
        .scenarios
        .iter()
        .find(|s| s.kind == ScenarioKind::Cycle)
        .expect("sell cycle scenario");
    assert_eq!(cycle.steps, ["insertQuarter", "turnCrank"]);
    let expected: Vec<&str> = cycle
        .expected
        .iter()
        .map(|&id| output.graph.state(id).name.as_str())
        .collect();
    assert_eq!(expected, ["NoQuarter"]);

    // Identifiers survive verbatim into the emitted machine.
    let machine = &output.artifacts[0].contents;
    for name in ["NoQuarter", "HasQuarter", "GumballSold", "OutOfGumballs"] {
        assert!(machine.contains(name), "machine artifact lost `{name}`");
    }
    for event in ["insertQuarter", "turnCrank"] {
        assert!(machine.contains(&format!("void {event}()")));
    }
}

#[test]
fn output_is_byte_identical_across_runs() {
    let first = compile(GUMBALL, &ScenarioConfig::default(), &options(OutputKind::Header)).unwrap();
    let second = compile(GUMBALL, &ScenarioConfig::default(), &options(OutputKind::Header)).unwrap();

    assert_eq!(
        describe(&first.graph, &first.scenarios),
        describe(&second.graph, &second.scenarios)
    );
    for (a, b) in first.artifacts.iter().zip(&second.artifacts) {
        assert_eq!(a.file_name, b.file_name);
        assert_eq!(a.contents, b.contents);
    }
}
