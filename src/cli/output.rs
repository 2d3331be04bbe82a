//! CLI output formatting

use crate::{
    core::{pipeline::ResolvedInput, ExecutionGraph, SetupStatus},
    persistence::SetupRecord,
    setup::SetupEvent,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a spinner for a long-running platform call
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a setup status for display
pub fn format_status(status: SetupStatus) -> String {
    match status {
        SetupStatus::Pending => style("PENDING").dim().to_string(),
        SetupStatus::Running => style("RUNNING").yellow().to_string(),
        SetupStatus::Completed => style("COMPLETED").green().to_string(),
        SetupStatus::Failed => style("FAILED").red().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format a setup record for display
pub fn format_record(record: &SetupRecord) -> String {
    let status_icon = match record.status {
        SetupStatus::Completed => CHECK,
        SetupStatus::Failed => CROSS,
        SetupStatus::Running => SPINNER,
        SetupStatus::Pending => INFO,
    };

    format!(
        "{} {} - {} - {} - {} functions, {} workflows{} - {}",
        status_icon,
        style(short_id(&record.run_id)).dim(),
        style(&record.project_name).bold(),
        format_status(record.status),
        record.functions_registered,
        record.workflows_attached,
        if record.image_built { ", image built" } else { "" },
        style(record.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}

/// Format a setup event for display
pub fn format_setup_event(event: &SetupEvent) -> String {
    match event {
        SetupEvent::SetupStarted { run_id, project } => format!(
            "{} Setting up project {} ({})",
            ROCKET,
            style(project).bold(),
            style(short_id(run_id)).dim()
        ),
        SetupEvent::SourceSet { url } => format!("{} Source: {}", INFO, style(url).cyan()),
        SetupEvent::DefaultImageSet { image } => {
            format!("{} Default image: {}", INFO, style(image).cyan())
        }
        SetupEvent::ImageBuildStarted {
            image,
            base_image,
            commands,
        } => format!(
            "{} Building {} from {} ({} commands)",
            SPINNER,
            style(image).cyan(),
            style(base_image).dim(),
            commands.len()
        ),
        SetupEvent::ImageBuilt { image } => format!("{} Image {} ready", CHECK, style(image).green()),
        SetupEvent::SecretsStored { keys } => format!(
            "{} Stored secrets: {}",
            CHECK,
            style(keys.join(", ")).dim()
        ),
        SetupEvent::FunctionRegistered {
            name,
            url,
            with_repo,
            image,
        } => {
            let mut details = vec![url.clone()];
            if *with_repo {
                details.push("with repo".to_string());
            }
            if let Some(image) = image {
                details.push(image.clone());
            }
            format!(
                "{} Function {} ({})",
                CHECK,
                style(name).green(),
                style(details.join(", ")).dim()
            )
        }
        SetupEvent::WorkflowAttached { name, path } => format!(
            "{} Workflow {} ({})",
            CHECK,
            style(name).green(),
            style(path).dim()
        ),
        SetupEvent::ProjectSaved { project, path } => match path {
            Some(path) => format!(
                "{} Project {} saved to {}",
                INFO,
                style(project).bold(),
                style(path.display()).dim()
            ),
            None => format!("{} Project {} stored", INFO, style(project).bold()),
        },
        SetupEvent::SetupFailed { error } => format!("{} {}", CROSS, style(error).red()),
    }
}

/// Format a build command, truncated to the terminal width
pub fn format_command(command: &str) -> String {
    let width = term_size::dimensions_stdout().map(|(w, _)| w).unwrap_or(80);
    let max = width.saturating_sub(6).max(20);
    if command.chars().count() <= max {
        command.to_string()
    } else {
        let truncated: String = command.chars().take(max - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an execution graph for display
pub fn format_graph(graph: &ExecutionGraph) -> String {
    let mut lines = vec![format!(
        "{} {} ({} steps)",
        INFO,
        style(&graph.pipeline).bold(),
        graph.steps.len()
    )];

    for (index, step) in graph.steps.iter().enumerate() {
        let mut line = format!("  {}. {} [{}]", index + 1, style(&step.id).cyan(), step.function);
        if let Some(handler) = &step.handler {
            line.push_str(&format!(" handler={}", handler));
        }
        if !step.depends_on.is_empty() {
            line.push_str(&format!(" after {}", step.depends_on.join(", ")));
        }
        lines.push(line);

        for (name, input) in &step.inputs {
            let value = match input {
                ResolvedInput::Output(r) => format!("<- {}", r.output),
                ResolvedInput::Literal(v) => v.to_string(),
            };
            lines.push(format!("       {} = {}", name, style(value).dim()));
        }
        for output in &step.outputs {
            lines.push(format!("       -> {}", style(output).dim()));
        }
    }

    lines.join("\n")
}

/// Format a duration as `1h 2m 3s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
