//! CLI argument parsing for prism.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Prism: validate and render prompt templates.
///
/// A template library is a YAML or JSON file holding one template, a list of
/// templates, or a mapping with a `prompts` list.
#[derive(Parser, Debug)]
#[command(name = "prism")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Error handler configuration (YAML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check every template in a library for structural problems.
    Validate(ValidateArgs),

    /// Resolve one template and print the payload as JSON.
    Render(RenderArgs),

    /// Resolve every template with no variables and report error health.
    Health(HealthArgs),
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Template library file
    pub library: PathBuf,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Template library file
    pub library: PathBuf,

    /// Id of the template to render
    #[arg(long)]
    pub id: String,

    /// JSON file with the variable set
    #[arg(long)]
    pub vars: Option<PathBuf>,

    /// Extra variable as `path=value`; dotted paths create nested maps
    #[arg(long = "var", value_name = "PATH=VALUE")]
    pub var: Vec<String>,
}

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Template library file
    pub library: PathBuf,
}
