use anyhow::{bail, Context, Result};
use cascade_codegen::Generator;
use cascade_compiler::{Analyzer, ContextStack};
use cascade_diagnostics::DiagnosticEngine;
use cascade_parser::Parser;
use cascade_runtime::{EngineError, RuleSetEngine};
use clap::{Parser as ClapParser, Subcommand};
use std::path::PathBuf;

#[derive(ClapParser)]
#[command(name = "cascade")]
#[command(version = "0.2.0")]
#[command(about = "Cascade rule-engine compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check an expression-language source file
    Check {
        /// Input .csd file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Run a rule-set document against JSON inputs
    Run {
        /// Rule-set document (JSON)
        #[arg(value_name = "RULESET")]
        ruleset: PathBuf,

        /// JSON file with one input map, or an array of per-tick maps
        #[arg(short, long, value_name = "INPUT")]
        input: Option<PathBuf>,

        /// Number of ticks to run
        #[arg(short, long, default_value = "1")]
        ticks: usize,
    },

    /// Generate a standalone Rust project from a rule-set document
    Gen {
        /// Rule-set document (JSON)
        #[arg(value_name = "RULESET")]
        ruleset: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// Package name for the generated crate
        #[arg(long, default_value = "cascade-ruleset")]
        package: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { input } => check(input),
        Commands::Run {
            ruleset,
            input,
            ticks,
        } => run(ruleset, input, ticks),
        Commands::Gen {
            ruleset,
            output,
            package,
        } => gen(ruleset, output, &package),
    }
}

fn check(input: PathBuf) -> Result<()> {
    let source = std::fs::read_to_string(&input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    let file = input.display().to_string();

    let mut diagnostics = DiagnosticEngine::new();
    run_check(&source, &file, &mut diagnostics);
    if diagnostics.has_errors() {
        diagnostics.print_all(&source);
        diagnostics.print_summary();
        bail!("check failed");
    }
    println!("{}: ok", input.display());
    Ok(())
}

/// Push the source through the pipeline, collecting diagnostics
fn run_check(source: &str, file: &str, diagnostics: &mut DiagnosticEngine) {
    let mut parser = match Parser::new(source) {
        Ok(parser) => parser,
        Err(err) => {
            diagnostics.emit(err.to_diagnostic(file, source));
            return;
        }
    };
    let exprs = match parser.parse_all() {
        Ok(exprs) => exprs,
        Err(err) => {
            diagnostics.emit(err.to_diagnostic(file, source));
            return;
        }
    };
    let mut ctx = ContextStack::new();
    if let Err(err) = Analyzer::new(&mut ctx).add_unnamed_function(exprs) {
        diagnostics.emit(err.to_diagnostic(file, source));
    }
}

fn run(ruleset: PathBuf, input: Option<PathBuf>, ticks: usize) -> Result<()> {
    let source = std::fs::read_to_string(&ruleset)
        .with_context(|| format!("cannot read {}", ruleset.display()))?;
    let mut engine = match RuleSetEngine::build_from_source(&source) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("{}", err.report());
            bail!("run failed");
        }
    };
    if let Err(err) = engine.init() {
        eprintln!("{}", EngineError::Runtime(err).report());
        bail!("run failed");
    }

    let inputs: Vec<serde_json::Map<String, serde_json::Value>> = match input {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            match serde_json::from_str::<serde_json::Value>(&text)? {
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .filter_map(|v| match v {
                        serde_json::Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect(),
                serde_json::Value::Object(map) => vec![map],
                _ => bail!("input file must hold a JSON object or an array of objects"),
            }
        }
        None => Vec::new(),
    };

    for tick in 0..ticks {
        if let Some(map) = inputs.get(tick.min(inputs.len().saturating_sub(1))) {
            engine.set_input(map);
        }
        if let Err(err) = engine.tick() {
            eprintln!("{}", EngineError::Runtime(err).report());
            bail!("run failed");
        }
        println!(
            "tick {tick}: hit {:?} output {}",
            engine.hit_rules(),
            serde_json::Value::Object(engine.output().clone())
        );
    }
    Ok(())
}

fn gen(ruleset: PathBuf, output: PathBuf, package: &str) -> Result<()> {
    let source = std::fs::read_to_string(&ruleset)
        .with_context(|| format!("cannot read {}", ruleset.display()))?;
    let generator = match Generator::build_from_source(&source, package) {
        Ok(generator) => generator,
        Err(err) => {
            eprintln!("{}", err.report());
            bail!("gen failed");
        }
    };
    if let Err(err) = generator.write_to(&output) {
        eprintln!("{}", err.report());
        bail!("gen failed");
    }
    println!("generated project in {}", output.display());
    Ok(())
}
