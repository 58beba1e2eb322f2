//! wt - WBS template command line
//!
//! Validates definition files, manages the template catalog, previews
//! projections and instantiates templates into projects.

use std::path::Path;

use chrono::NaiveDate;
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use wbstemplate::cli::{Cli, Command};
use wbstemplate::config::Config;
use wbstemplate::{
    ProjectionQuery, SqliteCatalog, SqliteProjectStore, TemplateAuthoring, TemplateCatalog, TemplateDefinition,
    TemplateScope, TemplateService, validate_all,
};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let db = cli.db.clone().unwrap_or_else(|| config.storage.path.clone());
    info!(db = %db.display(), "wt starting");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Validate { file } => cmd_validate(&file),
        Command::Import { file, tenant, actor } => cmd_import(&db, &file, tenant, &actor),
        Command::Publish { code, version } => cmd_publish(&db, &code, version),
        Command::Revise { code, actor } => cmd_revise(&db, &code, &actor),
        Command::List => cmd_list(&db),
        Command::Preview {
            code,
            version,
            selection,
            json,
        } => cmd_preview(&config, &db, &selection.query(code, version), json),
        Command::Instantiate {
            code,
            version,
            project,
            start,
            actor,
            selection,
            json,
        } => cmd_instantiate(&config, &db, &selection.query(code, version), project, start, actor, json),
        Command::Tasks { project } => cmd_tasks(&db, &project),
        Command::Undo { batch_id } => cmd_undo(&db, &batch_id),
    }
}

/// Report every structural issue of a definition file
fn cmd_validate(file: &Path) -> Result<()> {
    debug!(file = %file.display(), "cmd_validate: called");
    let set = TemplateDefinition::load(file)?.into_template_set(TemplateScope::Global, "cli")?;
    let issues = validate_all(&set);

    if issues.is_empty() {
        println!(
            "{} {} v{}: {} tasks, {} dependencies, {} presets",
            "✓".green(),
            set.code.cyan(),
            set.version,
            set.tasks.len(),
            set.dependencies.len(),
            set.presets.len()
        );
        return Ok(());
    }

    for issue in &issues {
        println!("{} {}", "✗".red(), issue);
    }
    eyre::bail!("{} structural issue(s) in {}", issues.len(), file.display())
}

fn cmd_import(db: &Path, file: &Path, tenant: Option<String>, actor: &str) -> Result<()> {
    debug!(file = %file.display(), ?tenant, %actor, "cmd_import: called");
    let scope = tenant.map_or(TemplateScope::Global, TemplateScope::Tenant);
    let set = TemplateDefinition::load(file)?.into_template_set(scope, actor)?;
    let mut catalog = SqliteCatalog::open(db)?;
    let draft = catalog.create_draft(set)?;
    println!(
        "{} Imported {} v{} as draft {}",
        "✓".green(),
        draft.code.cyan(),
        draft.version,
        draft.id.dimmed()
    );
    Ok(())
}

fn cmd_publish(db: &Path, code: &str, version: u32) -> Result<()> {
    debug!(%code, version, "cmd_publish: called");
    let mut catalog = SqliteCatalog::open(db)?;
    let set = catalog.publish(code, version)?;
    println!("{} Published {} v{}", "✓".green(), set.code.cyan(), set.version);
    Ok(())
}

fn cmd_revise(db: &Path, code: &str, actor: &str) -> Result<()> {
    debug!(%code, %actor, "cmd_revise: called");
    let mut catalog = SqliteCatalog::open(db)?;
    let draft = catalog.new_version(code, actor)?;
    println!("{} Created draft {} v{}", "✓".green(), draft.code.cyan(), draft.version);
    Ok(())
}

fn cmd_list(db: &Path) -> Result<()> {
    debug!("cmd_list: called");
    let catalog = SqliteCatalog::open(db)?;
    let sets = catalog.list()?;
    if sets.is_empty() {
        println!("No templates found");
        return Ok(());
    }
    for set in sets {
        let state = if set.is_published() {
            "published".green()
        } else {
            "draft".yellow()
        };
        let scope = set.tenant_id.as_deref().unwrap_or("global");
        println!(
            "{} v{} [{}] {} ({}, {} tasks)",
            set.code.cyan(),
            set.version,
            state,
            set.name,
            scope.dimmed(),
            set.tasks.len()
        );
    }
    Ok(())
}

fn cmd_preview(config: &Config, db: &Path, query: &ProjectionQuery, json: bool) -> Result<()> {
    debug!(?query, json, "cmd_preview: called");
    let service = TemplateService::from_config(SqliteCatalog::open(db)?, config);
    let projection = service.preview_projection(query)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&projection)?);
        return Ok(());
    }

    println!(
        "{} v{} ({}): {} tasks",
        projection.set_code.cyan(),
        projection.version,
        projection.policy,
        projection.len()
    );
    for (i, task) in projection.tasks.iter().enumerate() {
        let added = if projection.added_by_closure.contains(&task.code) {
            " +closure".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "{:>3}. {} {} [{}/{}] {}d{}",
            i + 1,
            task.code.yellow(),
            task.name,
            task.phase_code,
            task.discipline_code,
            task.est_duration_days,
            added
        );
    }
    Ok(())
}

/// Instantiate a published template into a project
fn cmd_instantiate(
    config: &Config,
    db: &Path,
    query: &ProjectionQuery,
    project: String,
    start: Option<NaiveDate>,
    actor: String,
    json: bool,
) -> Result<()> {
    debug!(?query, %project, ?start, %actor, "cmd_instantiate: called");
    let service = TemplateService::from_config(SqliteCatalog::open(db)?, config);
    let mut store = SqliteProjectStore::open(db)?;
    let request = service.request(project, start, actor);
    let summary = service.instantiate(query, &request, &config.role_resolver(), &mut store)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "{} Created {} tasks in project {} ({} to {})",
        "✓".green(),
        summary.task_count,
        summary.project_id.cyan(),
        summary.start_date,
        summary.finish_date
    );
    println!("  Batch: {}", summary.batch_id.yellow());
    if summary.unresolved_assignee_count > 0 {
        println!(
            "  {} {} tasks have no assignee",
            "!".yellow(),
            summary.unresolved_assignee_count
        );
    }
    Ok(())
}

fn cmd_tasks(db: &Path, project: &str) -> Result<()> {
    debug!(%project, "cmd_tasks: called");
    let store = SqliteProjectStore::open(db)?;
    let tasks = store.tasks_for_project(project)?;
    if tasks.is_empty() {
        println!("No tasks found for project {}", project);
        return Ok(());
    }
    for task in tasks {
        println!(
            "{} {} .. {} {} {} {}",
            task.provenance.template_task_code.yellow(),
            task.start_date,
            task.end_date,
            task.name,
            task.assignee.as_deref().unwrap_or("unassigned").dimmed(),
            task.batch_id.dimmed()
        );
    }
    Ok(())
}

fn cmd_undo(db: &Path, batch_id: &str) -> Result<()> {
    debug!(%batch_id, "cmd_undo: called");
    let mut store = SqliteProjectStore::open(db)?;
    let removed = store.delete_batch(batch_id)?;
    println!("{} Removed {} tasks of batch {}", "✓".green(), removed, batch_id);
    Ok(())
}
