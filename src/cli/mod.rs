//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{ReconcileCommand, ValidateCommand};
use std::ffi::OsString;

/// Reconciles declarative PipelineRuns into TaskRuns
#[derive(Debug, Parser, Clone)]
#[command(name = "pipeline-controller")]
#[command(version = "0.1.0")]
#[command(about = "Reconciles declarative PipelineRuns into TaskRuns", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to controller configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Reconcile PipelineRuns from manifests
    Reconcile(ReconcileCommand),

    /// Validate PipelineRuns from manifests without creating anything
    Validate(ValidateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
