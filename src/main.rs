use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use cbctt_lns_solver::config;
use cbctt_lns_solver::cp::Stop;
use cbctt_lns_solver::engine::LnsEngine;
use cbctt_lns_solver::instance::Instance;
use cbctt_lns_solver::output::{self, OutputMode};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModelArg {
    Debug,
    Experiments,
}

impl From<ModelArg> for OutputMode {
    fn from(value: ModelArg) -> Self {
        match value {
            ModelArg::Debug => OutputMode::Debug,
            ModelArg::Experiments => OutputMode::Experiments,
        }
    }
}

/// LNS/CP solver for the Curriculum-Based Course Timetabling problem.
#[derive(Parser, Debug)]
struct Cli {
    /// Path to the whitespace `key value` configuration file.
    config: PathBuf,

    /// Verbose per-component report (debug) or a compact one-line summary (experiments).
    #[arg(long = "model", value_enum, default_value_t = ModelArg::Experiments)]
    model: ModelArg,

    /// Also emit a JSON summary object alongside the text solution.
    #[arg(long = "json-summary")]
    json_summary: bool,
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = config::LnsConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    let instance_path = PathBuf::from(&config.instance);
    let instance = Instance::load(&instance_path)
        .with_context(|| format!("loading instance from {}", instance_path.display()))?;
    let instance = Arc::new(instance);

    let outer_stop = Stop::after(Duration::from_millis(
        config.init_deadline_ms.saturating_mul(20).max(30_000),
    ));

    let mut log_lines = Vec::new();
    let engine = LnsEngine::new(Arc::clone(&instance), config.clone());
    let result = engine.run(&outer_stop);
    log_lines.extend(result.log);

    for line in &log_lines {
        eprintln!("{line}");
    }

    match result.best {
        Some(snapshot) => {
            print!(
                "{}",
                output::render_report(&instance, &snapshot, cli.model.into(), cli.json_summary)
            );
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("no solution found within the available budget");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
