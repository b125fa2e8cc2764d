//! persona-sim - Persona-based purchase scenario simulator
//!
//! This is the main entry point for the persona-sim binary. It loads customer
//! personas, presents a scenario (or batch of scenarios) to each of them
//! through an LLM backend or a deterministic mock, and prints the resulting
//! decision records as a table (optionally exporting them as JSON).

mod backend;
mod cli;
mod config;
mod decision;
mod error;
mod logging;
mod persona;
mod sim;
mod version;

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Commands, ConfigSubcommand, PersonasSubcommand};
use crate::config::{ExecutionMode, SimulatorConfig};
use crate::error::{Error, Result};
use crate::persona::PersonaSummary;
use crate::sim::{Scenario, SimulationOrchestrator, SimulationRecord};

/// How many reply characters the result table shows per row
const RESPONSE_PREVIEW_CHARS: usize = 60;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(())
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            handle_config_command(subcommand)
        }
        Commands::Personas { subcommand } => {
            logging::init_simple(if cli.verbose > 0 {
                tracing::Level::DEBUG
            } else {
                tracing::Level::WARN
            })?;
            handle_personas_command(subcommand)
        }
        Commands::Run {
            scenario,
            name,
            batch,
            config,
            personas,
            mock,
            model,
            max_tokens,
            unstructured,
            output,
        } => {
            let mut cfg = SimulatorConfig::load(config.as_deref())?;

            // CLI overrides take precedence over env and file values
            if mock {
                cfg.simulation.mode = ExecutionMode::Mock;
            }
            if let Some(model) = model {
                cfg.simulation.model = model;
            }
            if let Some(max_tokens) = max_tokens {
                cfg.simulation.max_tokens = max_tokens;
            }
            if let Some(personas) = personas {
                cfg.personas.path = Some(personas);
            }
            cfg.validate()?;

            // The guards must be kept alive for the lifetime of the program
            let _log_guards = logging::init_logging(&cfg.logging, cli.verbose, cli.quiet)?;

            let build = version::build_info();
            info!(
                version = %build.full_version(),
                mode = %cfg.simulation.mode,
                model = %cfg.simulation.model,
                "Starting persona-sim"
            );

            let scenarios = resolve_scenarios(scenario, name, batch)?;
            run_simulation(cfg, scenarios, !unstructured, output.map(PathBuf::from))
        }
    }
}

/// Turn CLI input into the scenario list: either a batch file or one inline
/// scenario
fn resolve_scenarios(
    scenario: Option<String>,
    name: Option<String>,
    batch: Option<String>,
) -> Result<Vec<Scenario>> {
    match (scenario, batch) {
        (_, Some(path)) => Scenario::load_batch(Path::new(&path)),
        (Some(text), None) => Ok(vec![match name {
            Some(n) => Scenario::named(n, text),
            None => Scenario::unnamed(text),
        }]),
        (None, None) => Err(Error::scenario_invalid("No scenario input provided")),
    }
}

/// Execute a simulation run and render the record set
fn run_simulation(
    config: SimulatorConfig,
    scenarios: Vec<Scenario>,
    structured: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create runtime: {}", e)))?;

    let records = runtime.block_on(async {
        let mut orchestrator = SimulationOrchestrator::new(config);
        orchestrator.run_batch(&scenarios, structured).await
    })?;

    print_records(&records);

    if let Some(path) = output {
        write_records(&path, &records)?;
        println!("\n{} records written to {}", records.len(), path.display());
    }

    Ok(())
}

/// Write the record set as pretty-printed JSON
fn write_records(path: &Path, records: &[SimulationRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| Error::Internal(format!("Failed to serialize records: {}", e)))?;
    fs::write(path, json).map_err(|e| Error::IoWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Render the record set as an aligned table
fn print_records(records: &[SimulationRecord]) {
    if records.is_empty() {
        println!("No records.");
        return;
    }

    let scenario_w = column_width("SCENARIO", records.iter().map(|r| r.scenario_name.as_str()));
    let persona_w = column_width("PERSONA", records.iter().map(|r| r.persona_name.as_str()));

    println!(
        "{:<scenario_w$}  {:>7}  {:<persona_w$}  {:<8}  RESPONSE",
        "SCENARIO", "CLUSTER", "PERSONA", "DECISION"
    );

    for record in records {
        let decision = record.decision.map(|d| d.as_str()).unwrap_or("-");
        println!(
            "{:<scenario_w$}  {:>7}  {:<persona_w$}  {:<8}  {}",
            record.scenario_name,
            record.cluster_id,
            record.persona_name,
            decision,
            preview(&record.raw_response, RESPONSE_PREVIEW_CHARS)
        );
    }
}

/// Render the persona summary as an aligned table
fn print_summary(summary: &[PersonaSummary]) {
    let persona_w = column_width("PERSONA", summary.iter().map(|s| s.persona_name.as_str()));

    println!(
        "{:>7}  {:<persona_w$}  {:>8}  {:>7}",
        "CLUSTER", "PERSONA", "SIZE", "SHARE"
    );
    for row in summary {
        println!(
            "{:>7}  {:<persona_w$}  {:>8}  {:>7}",
            row.cluster_id, row.persona_name, row.size, row.percentage
        );
    }
}

/// Width of a column: the header or its longest value
fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(|v| v.chars().count())
        .chain([header.len()])
        .max()
        .unwrap_or(header.len())
}

/// Single-line preview of a reply, truncated for table display
fn preview(text: &str, limit: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();

    if flat.chars().count() > limit {
        let truncated: String = flat.chars().take(limit).collect();
        format!("{}...", truncated.trim_end())
    } else {
        flat
    }
}

/// Handle persona subcommands
fn handle_personas_command(subcommand: PersonasSubcommand) -> Result<()> {
    match subcommand {
        PersonasSubcommand::Summary { config, personas } => {
            let cfg = personas_config(config.as_deref(), personas)?;
            let mut orchestrator = SimulationOrchestrator::new(cfg);
            let summary = orchestrator.get_persona_summary()?;
            print_summary(&summary);
            Ok(())
        }
        PersonasSubcommand::Validate { config, personas } => {
            let cfg = personas_config(config.as_deref(), personas)?;
            let mut orchestrator = SimulationOrchestrator::new(cfg);
            let count = orchestrator.load_personas()?.len();
            println!("Persona source OK: {} personas", count);
            Ok(())
        }
    }
}

/// Load configuration for persona subcommands, applying the source override
fn personas_config(config: Option<&str>, personas: Option<String>) -> Result<SimulatorConfig> {
    let mut cfg = SimulatorConfig::load(config)?;
    if let Some(personas) = personas {
        cfg.personas.path = Some(personas);
    }
    Ok(cfg)
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = SimulatorConfig::load(config.as_deref())?;
            let rendered = toml::to_string_pretty(&cfg)?;
            println!("{}", rendered);
            Ok(())
        }
        ConfigSubcommand::Init { path, force } => {
            let target = path
                .map(PathBuf::from)
                .unwrap_or_else(SimulatorConfig::default_path);
            let written = SimulatorConfig::init(&target, force)?;
            println!("Configuration written to {}", written.display());
            Ok(())
        }
        ConfigSubcommand::Validate { config } => {
            let cfg = SimulatorConfig::load(config.as_deref())?;
            cfg.validate()?;
            println!("Configuration OK");
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
