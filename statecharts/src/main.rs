//! Command-line front end of the statecharts compiler.
//!
//! `statecharts <input> <cpp|hpp> [prefix]` reads a statechart source
//! file, runs the pipeline, and writes the machine and test artifacts
//! next to the input (or into `--out-dir`). Diagnostics stream to stderr
//! as `<file>:<line>:<col>: <severity>: <message>`; the exit code is 0
//! only when no error was reported.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use statecharts::{
    analyze, compile, BackendKind, CompileError, Diagnostic, EmitOptions, OutputKind,
    ScenarioConfig,
};

#[derive(Parser)]
#[command(name = "statecharts")]
#[command(about = "Compile a PlantUML-subset statechart into a state machine and test suite", long_about = None)]
#[command(version)]
struct Cli {
    /// Statechart source file
    input: PathBuf,

    /// Output kind: `cpp` (translation unit) or `hpp` (header-only)
    output: String,

    /// Optional name prefix applied to the generated type and file names
    prefix: Option<String>,

    /// Directory for emitted artifacts (defaults to the input's directory)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Parse, build, and verify only; emit nothing
    #[arg(long)]
    verify_only: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let output = match cli.output.as_str() {
        "cpp" => OutputKind::Source,
        "hpp" => OutputKind::Header,
        other => bail!("unknown output kind `{other}` (expected `cpp` or `hpp`)"),
    };

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("cannot read `{}`", cli.input.display()))?;
    let stem = cli
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "machine".to_string());
    let display = cli.input.display().to_string();

    let options = EmitOptions {
        backend: BackendKind::Cpp,
        output,
        prefix: cli.prefix.clone(),
        stem,
    };

    if cli.verify_only {
        return match analyze(&source, &options.type_name()) {
            Ok((_, warnings)) => {
                report(&display, &warnings);
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => {
                report_failure(&display, &err);
                Ok(ExitCode::FAILURE)
            }
        };
    }

    let compiled = match compile(&source, &ScenarioConfig::default(), &options) {
        Ok(compiled) => compiled,
        Err(err) => {
            report_failure(&display, &err);
            return Ok(ExitCode::FAILURE);
        }
    };
    report(&display, &compiled.diagnostics);

    let out_dir = match &cli.out_dir {
        Some(dir) => dir.clone(),
        None => cli
            .input
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("cannot create `{}`", out_dir.display()))?;
    for artifact in &compiled.artifacts {
        let path = out_dir.join(&artifact.file_name);
        fs::write(&path, &artifact.contents)
            .with_context(|| format!("cannot write `{}`", path.display()))?;
        info!(path = %path.display(), "wrote artifact");
    }

    Ok(ExitCode::SUCCESS)
}

/// Stream diagnostics in `<file>:<line>:<col>: <severity>: <message>` form.
fn report(file: &str, diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        match diag.pos {
            Some(pos) => eprintln!("{file}:{pos}: {}: {}", diag.severity, diag.message),
            None => eprintln!("{file}: {}: {}", diag.severity, diag.message),
        }
    }
}

fn report_failure(file: &str, err: &CompileError) {
    report(file, &err.diagnostics());
}
