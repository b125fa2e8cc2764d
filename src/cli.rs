//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the persona simulator.

use clap::{ArgGroup, Parser, Subcommand};

/// Persona Sim - Persona-based purchase scenario simulator
///
/// Loads customer personas derived from behavioral clustering, presents a
/// purchase scenario to each of them through an LLM backend (or a
/// deterministic mock), and reduces every reply to a structured decision.
#[derive(Parser, Debug)]
#[command(name = "persona-sim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the simulator
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario (or batch of scenarios) across all personas
    #[command(group(ArgGroup::new("input").required(true).args(["scenario", "batch"])))]
    Run {
        /// Inline scenario text to present to every persona
        #[arg(short, long)]
        scenario: Option<String>,

        /// Name tag for the inline scenario (defaults to "unnamed")
        #[arg(long, requires = "scenario")]
        name: Option<String>,

        /// Batch file: JSON array of {"name", "text"} scenario objects
        #[arg(short, long)]
        batch: Option<String>,

        /// Path to configuration file
        #[arg(short, long, env = "PERSONA_SIM_CONFIG")]
        config: Option<String>,

        /// Persona source file override
        #[arg(short, long)]
        personas: Option<String>,

        /// Use the deterministic mock backend (no API calls)
        #[arg(long)]
        mock: bool,

        /// Model identifier override
        #[arg(long)]
        model: Option<String>,

        /// Maximum output length per backend call
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Skip decision extraction and record raw replies only
        #[arg(long)]
        unstructured: bool,

        /// Write the record set as JSON to this path
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Persona source inspection
    Personas {
        #[command(subcommand)]
        subcommand: PersonasSubcommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Display version and build information
    Version,
}

/// Persona subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PersonasSubcommand {
    /// Print a summary of all loaded personas, sorted by cluster id
    Summary {
        /// Path to configuration file
        #[arg(short, long, env = "PERSONA_SIM_CONFIG")]
        config: Option<String>,

        /// Persona source file override
        #[arg(short, long)]
        personas: Option<String>,
    },

    /// Validate that the persona source parses into the expected structure
    Validate {
        /// Path to configuration file
        #[arg(short, long, env = "PERSONA_SIM_CONFIG")]
        config: Option<String>,

        /// Persona source file override
        #[arg(short, long)]
        personas: Option<String>,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
