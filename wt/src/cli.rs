//! CLI command definitions and subcommands

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::domain::{ClosurePolicy, ProjectionFilter, Selection};
use crate::service::ProjectionQuery;

/// WbsTemplate - work-breakdown-structure templates
#[derive(Parser)]
#[command(
    name = "wt",
    about = "Validate, project and instantiate WBS templates",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Database path (overrides storage.path from config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check a template definition file for structural errors
    Validate {
        /// YAML or JSON definition
        file: PathBuf,
    },

    /// Store a definition file as a draft
    Import {
        /// YAML or JSON definition
        file: PathBuf,

        /// Tenant owning the template (global when omitted)
        #[arg(short, long)]
        tenant: Option<String>,

        /// Authoring actor
        #[arg(short, long, default_value = "cli")]
        actor: String,
    },

    /// Validate and publish a draft
    Publish {
        code: String,

        #[arg(short, long)]
        version: u32,
    },

    /// Start a new draft version from the latest one
    Revise {
        code: String,

        #[arg(short, long, default_value = "cli")]
        actor: String,
    },

    /// List stored templates
    List,

    /// Show the ordered task list a selection would produce
    Preview {
        code: String,

        /// Template version (latest published when omitted)
        #[arg(short, long)]
        version: Option<u32>,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Print the projection as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create project tasks from a template
    Instantiate {
        code: String,

        #[arg(short, long)]
        version: Option<u32>,

        /// Target project
        #[arg(short, long)]
        project: String,

        /// Project start date (YYYY-MM-DD, today when omitted)
        #[arg(short, long)]
        start: Option<NaiveDate>,

        #[arg(short, long, default_value = "cli")]
        actor: String,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the tasks of a project
    Tasks {
        #[arg(short, long)]
        project: String,
    },

    /// Delete every task created by one instantiation
    Undo {
        batch_id: String,
    },
}

/// Preset or ad-hoc filter plus closure policy
#[derive(Debug, Clone, Default, Args)]
pub struct SelectionArgs {
    /// Preset code
    #[arg(long, conflicts_with_all = ["phase", "discipline", "exclude"])]
    pub preset: Option<String>,

    /// Allowed phase codes
    #[arg(long, value_delimiter = ',')]
    pub phase: Vec<String>,

    /// Allowed discipline codes
    #[arg(long, value_delimiter = ',')]
    pub discipline: Vec<String>,

    /// Excluded task codes
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Closure policy (strict, expand); config default when omitted
    #[arg(long)]
    pub policy: Option<ClosurePolicy>,
}

impl SelectionArgs {
    /// Omitted lists are unrestricted
    pub fn selection(&self) -> Selection {
        debug!(preset = ?self.preset, "SelectionArgs::selection: called");
        if let Some(preset) = &self.preset {
            return Selection::preset(preset.clone());
        }
        let non_empty = |list: &Vec<String>| (!list.is_empty()).then(|| list.clone());
        Selection::Filter(ProjectionFilter {
            phases: non_empty(&self.phase),
            disciplines: non_empty(&self.discipline),
            exclude: non_empty(&self.exclude),
        })
    }

    /// Query against `code`, latest published version when `version` is None
    pub fn query(&self, code: impl Into<String>, version: Option<u32>) -> ProjectionQuery {
        ProjectionQuery::new(code, self.selection())
            .with_version(version)
            .with_policy(self.policy)
    }
}
