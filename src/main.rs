use anyhow::{Context, Result};
use indicatif::ProgressBar;
use mlsetup::cli::commands::{GraphCommand, HistoryCommand, SetupCommand, ValidateCommand};
use mlsetup::cli::output::*;
use mlsetup::cli::{Cli, Command};
use mlsetup::core::project::PROJECT_FILE;
use mlsetup::core::{PipelineDefinition, ProjectConfig, SetupState, SetupStatus};
use mlsetup::persistence::{record_setup, PersistenceBackend, SetupRecord};
use mlsetup::platform::{DryRunPlatform, HttpPlatform, Platform, PlatformClientConfig};
use mlsetup::setup::{resolve_options, SetupEngine, SetupEvent};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Setup(cmd) => setup_project(cmd, cli.verbose).await?,
        Command::Validate(cmd) => validate_project(cmd)?,
        Command::Graph(cmd) => show_graph(cmd)?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

/// Directory of the project file, used when no context is given
fn project_dir(file: &str) -> PathBuf {
    Path::new(file)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(feature = "sqlite")]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(
        mlsetup::persistence::SqliteSetupStore::with_default_path().await?,
    ))
}

#[cfg(not(feature = "sqlite"))]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(mlsetup::persistence::InMemoryPersistence::new()))
}

async fn setup_project(cmd: &SetupCommand, verbose: bool) -> Result<()> {
    let mut config = ProjectConfig::from_file(&cmd.file)
        .with_context(|| format!("Failed to load project file {}", cmd.file))?;
    config.apply_overrides(&cmd.param);

    println!("{} Loaded project: {}", INFO, style(&config.name).bold());
    for (key, value) in &cmd.param {
        println!(
            "{} Parameter override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    let context_dir = cmd
        .context
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| project_dir(&cmd.file));
    if !cmd.no_save && same_file(Path::new(&cmd.file), &context_dir.join(PROJECT_FILE)) {
        anyhow::bail!(
            "{} would be overwritten by the generated descriptor; rename it or use --no-save",
            cmd.file
        );
    }

    let store: Option<Arc<dyn PersistenceBackend>> = if cmd.no_history {
        None
    } else {
        match open_history().await {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("History is unavailable, this run will not be recorded: {:#}", e);
                None
            }
        }
    };

    let mut state = SetupState::new();
    let result = if cmd.dry_run {
        run_setup(DryRunPlatform::new(), &config, &context_dir, cmd, verbose, &mut state).await
    } else {
        let mut platform_config = PlatformClientConfig::from_env();
        if let Some(endpoint) = &cmd.endpoint {
            platform_config = platform_config.with_endpoint(endpoint.clone());
        }
        if let Some(token) = &cmd.token {
            platform_config = platform_config.with_token(token.clone());
        }
        let platform = HttpPlatform::new(platform_config).context("Failed to create platform client")?;
        run_setup(platform, &config, &context_dir, cmd, verbose, &mut state).await
    };

    if let Some(store) = &store {
        if let Some(record) = record_setup(store.as_ref(), &config.name, &state).await {
            println!(
                "\n{} Setup saved to history (ID: {})",
                INFO,
                style(&record.run_id.to_string()[..8]).dim()
            );
        }
    }

    match result {
        Ok(yaml) => {
            println!(
                "\n{} {} set up {}",
                CHECK,
                style(&config.name).bold(),
                style("successfully").green()
            );
            println!("\n{}", yaml);
            Ok(())
        }
        Err(e) => {
            println!("\n{} {} {}", CROSS, style(&config.name).bold(), style("failed").red());
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run_setup<P: Platform>(
    platform: P,
    config: &ProjectConfig,
    context_dir: &Path,
    cmd: &SetupCommand,
    verbose: bool,
    state: &mut SetupState,
) -> Result<String> {
    let mut engine = SetupEngine::new(platform, context_dir).with_descriptor_file(!cmd.no_save);

    let spinner: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));
    let handler_spinner = spinner.clone();
    engine.add_event_handler(move |event| {
        let mut active = match handler_spinner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(bar) = active.take() {
            bar.finish_and_clear();
        }

        println!("{}", format_setup_event(event));
        if let SetupEvent::ImageBuildStarted { image, commands, .. } = event {
            if verbose {
                for command in commands {
                    println!("    {}", style(format_command(command)).dim());
                }
            }
            *active = Some(create_spinner(format!("Waiting for {}", image)));
        }
    });

    println!();
    let project = engine.run(config, state).await?;
    Ok(project.to_yaml()?)
}

fn validate_project(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating project...", INFO);

    let config = match ProjectConfig::from_file(&cmd.file) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    };

    let options = resolve_options(&config.params)?;
    let dir = project_dir(&cmd.file);
    let mut failures = Vec::new();
    let mut pipelines = Vec::new();
    for workflow in &config.workflows {
        let result = PipelineDefinition::from_file(dir.join(&workflow.path)).and_then(|definition| {
            definition.check_functions(|name| config.functions.iter().any(|f| f.name == name))?;
            Ok(definition)
        });
        match result {
            Ok(definition) => pipelines.push(definition),
            Err(e) => failures.push(format!("{} ({}): {}", workflow.name, workflow.path, e)),
        }
    }

    if !failures.is_empty() {
        println!("{} Validation failed:", CROSS);
        for failure in &failures {
            println!("  {}", style(failure).red());
        }
        std::process::exit(1);
    }

    println!("{} Project configuration is valid!", CHECK);
    println!("  Name: {}", style(&config.name).bold());
    println!("  Functions: {}", style(config.functions.len()).cyan());
    println!("  Workflows: {}", style(config.workflows.len()).cyan());
    println!("  Secrets: {}", style(config.secrets.join(", ")).dim());
    println!(
        "  Build image: {} ({})",
        style(options.build_image.value).cyan(),
        style(options.build_image.rule).dim()
    );

    if cmd.json {
        let data = serde_json::json!({
            "project": config,
            "options": options,
            "workflows": pipelines,
        });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

fn show_graph(cmd: &GraphCommand) -> Result<()> {
    let config = ProjectConfig::from_file(&cmd.file)
        .with_context(|| format!("Failed to load project file {}", cmd.file))?;

    let workflow = match &cmd.workflow {
        Some(name) => config
            .workflows
            .iter()
            .find(|w| &w.name == name)
            .with_context(|| format!("Workflow '{}' not found", name))?,
        None => config
            .workflows
            .first()
            .context("Project declares no workflows")?,
    };

    let definition = PipelineDefinition::from_file(project_dir(&cmd.file).join(&workflow.path))
        .with_context(|| format!("Failed to load workflow {}", workflow.path))?;
    let arguments: BTreeMap<_, _> = cmd.arg.iter().cloned().collect();
    let graph = definition.resolve(&arguments)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&graph)?);
    } else {
        println!("{}", format_graph(&graph));
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_history().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_record(run_id).await? {
            Some(record) => print_record_details(&record, cmd.json)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let mut records = match &cmd.project {
        Some(project) => store.list_records(project).await?,
        None => {
            let mut all = Vec::new();
            for project in store.list_projects().await? {
                all.extend(store.list_records(&project).await?);
            }
            all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all
        }
    };
    records.truncate(cmd.limit);

    if records.is_empty() {
        println!("{} No setup runs found", INFO);
        return Ok(());
    }

    if cmd.json {
        let data = serde_json::json!({ "runs": records });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Setup history (showing latest {}):", INFO, cmd.limit);
        for record in &records {
            println!("  {}", format_record(record));
        }
    }

    Ok(())
}

fn print_record_details(record: &SetupRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    println!("{} Setup Details", INFO);
    println!("  ID: {}", style(record.run_id).cyan());
    println!("  Project: {}", style(&record.project_name).bold());
    println!("  Status: {}", format_status(record.status));
    println!("  Started: {}", style(record.started_at.to_rfc3339()).dim());
    if let Some(completed) = record.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(record.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!("  Image built: {}", record.image_built);
    println!("  Functions: {}", record.functions_registered);
    println!("  Workflows: {}", record.workflows_attached);
    if record.status == SetupStatus::Failed {
        if let Some(error) = &record.error {
            println!("  Error: {}", style(error).red());
        }
    }

    Ok(())
}
