//! Application orchestrator.
//! Loads/merges settings, initializes logging, installs the interrupt handler,
//! and dispatches to the classify / undo / gui / rules commands.

use anyhow::{Context, Result, anyhow, bail};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use filesort::cli::{Args, ClassifyArgs, Command, RulesCommand};
use filesort::config::{CONFIG_ENV, LoadResult, load_or_init};
use filesort::mapping::{self, import::import_rules};
use filesort::output as out;
use filesort::{
    Classifier, ClassifyError, Config, EngineOptions, PreparedRun, ProgressEvent, RunControl,
    UndoManager, default_config_path,
};

use crate::logging::init_tracing;

/// Number of plan entries shown by a dry run.
const PREVIEW_LIMIT: usize = 20;

/// Run the CLI application.
pub fn run(args: Args) -> Result<()> {
    // Handle --print-config before logging init
    if args.print_config {
        print_config_location();
        return Ok(());
    }
    let Some(command) = args.command.clone() else {
        bail!("no command given; run `filesort --help` for usage");
    };

    // Settings (may write a template on first use). CLI args override settings values.
    let mut cfg = match load_or_init()? {
        LoadResult::Loaded { config, .. } => config,
        LoadResult::CreatedTemplate(path) => {
            out::print_info(&format!("A template settings file was written to: {}", path.display()));
            out::print_info(&format!("Edit it to change defaults; set {CONFIG_ENV} to use another file."));
            Config::default()
        }
        LoadResult::Defaults => Config::default(),
    };
    args.apply_overrides(&mut cfg);

    let guard = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json).map_err(|e| {
        out::print_error(&format!("Failed to initialize logging: {e}"));
        e
    })?;

    let control = RunControl::new();
    {
        let control = control.clone();
        ctrlc::set_handler(move || {
            out::print_warn("Received interrupt; finishing in-flight moves and stopping...");
            control.cancel();
        })
        .context("failed to install signal handler")?;
    }

    debug!("Starting filesort: {:?}", args);

    let result = match &command {
        Command::Classify(c) => run_classify(&cfg, c, &control),
        Command::Undo { yes } => run_undo(&cfg, *yes, &control),
        Command::Gui => Err(anyhow!(
            "the graphical interface is not part of this build; use `filesort classify` and `filesort undo`"
        )),
        Command::Rules {
            action: RulesCommand::Import { csv, mapping },
        } => run_import(&cfg, csv, mapping.as_deref()),
    };

    if let Err(e) = &result {
        log_failure(e);
    }

    // Ensure logs are flushed before exit
    drop(guard);
    result
}

fn print_config_location() {
    if let Ok(explicit) = std::env::var(CONFIG_ENV) {
        out::print_info(&format!("Using {CONFIG_ENV} (explicit):\n  {explicit}\n"));
        out::print_info(&format!("To override, unset {CONFIG_ENV} or set it to another file."));
        return;
    }
    match default_config_path() {
        Some(p) => {
            out::print_info(&format!("Default filesort settings path:\n  {}\n", p.display()));
            if p.exists() {
                out::print_info("A settings file already exists at that location.");
            } else {
                out::print_info("No settings file exists there yet. Run any command to create a template.");
            }
        }
        None => out::print_error("Could not determine a default settings path."),
    }
}

fn log_failure(e: &anyhow::Error) {
    match e.downcast_ref::<ClassifyError>() {
        Some(ce) => {
            let code = ce.code();
            match ce {
                ClassifyError::Config { path, reason } => {
                    error!(code, kind = "config", path = %path.display(), %reason, "Invalid mapping")
                }
                ClassifyError::NotFound { role, path, reason } => {
                    error!(code, kind = "not_found", role, path = %path.display(), %reason, "Unusable directory")
                }
                ClassifyError::NoLog(path) => {
                    error!(code, kind = "no_log", path = %path.display(), "Nothing to undo")
                }
                ClassifyError::Journal { path, source } => {
                    error!(code, kind = "journal", path = %path.display(), error = %source, "Journal failure")
                }
                ClassifyError::Busy(path) => {
                    error!(code, kind = "busy", path = %path.display(), "Another operation is running")
                }
                ClassifyError::Engine(msg) => error!(code, kind = "engine", %msg, "Engine failure"),
                ClassifyError::Interrupted => error!(code, kind = "interrupted", "Operation interrupted by user"),
            }
        }
        None => error!(error = ?e, "Command failed"),
    }
}

/// Ask for confirmation only when a human can answer.
fn confirmed(question: &str, yes: bool) -> Result<bool> {
    if yes || !out::can_prompt() {
        return Ok(true);
    }
    out::confirm(question).context("read confirmation")
}

fn progress_printer(event: &ProgressEvent) {
    out::print_progress(event.percent, event.processed, event.total, &event.file_name);
}

fn print_plan_overview(run: &PreparedRun) {
    out::print_info(&format!(
        "{} file(s) planned from {} into {} (duplicates: {})",
        run.plan.len(),
        run.source_root.display(),
        run.destination_root.display(),
        run.policy
    ));
    for (category, count) in run.plan.per_category() {
        out::print_user(&format!("  {category:<20} {count}"));
    }
    if !run.plan.skipped().is_empty() {
        out::print_info(&format!("{} file(s) will be left in place", run.plan.skipped().len()));
        for skip in run.plan.skipped().iter().take(PREVIEW_LIMIT) {
            debug!(src = %skip.source.display(), reason = skip.reason, "left in place");
        }
    }
}

fn run_classify(cfg: &Config, args: &ClassifyArgs, control: &RunControl) -> Result<()> {
    let mapping = mapping::load_effective(None, cfg.mapping_file.as_ref())?;
    let classifier = Classifier::new(
        mapping,
        &cfg.journal_file,
        EngineOptions::from_settings(cfg.workers, cfg.queue_capacity),
    );
    let run = if args.dry_run {
        classifier.preview(&args.source(), &args.destination(), cfg.duplicates)?
    } else {
        classifier.prepare(&args.source(), &args.destination(), cfg.duplicates)?
    };
    print_plan_overview(&run);

    if args.dry_run {
        let shown = run.plan.len().min(PREVIEW_LIMIT);
        classifier.report_plan(&run, &|e: &ProgressEvent| {
            if e.processed <= PREVIEW_LIMIT {
                out::print_user(&format!(
                    "  {} -> {}",
                    e.file_name,
                    e.detail.as_deref().unwrap_or_default()
                ));
            }
        });
        if run.plan.len() > shown {
            out::print_user(&format!("  ...and {} more", run.plan.len() - shown));
        }
        out::print_info("Dry run: no files were moved.");
        return Ok(());
    }

    if run.plan.is_empty() {
        out::print_info("Nothing to move.");
        return Ok(());
    }
    if !confirmed(
        &format!("Move {} file(s) into {}?", run.plan.len(), run.destination_root.display()),
        args.yes,
    )? {
        out::print_info("Aborted; no files were moved.");
        return Ok(());
    }

    let summary = classifier.execute(&run, control, &progress_printer)?;
    out::finish_progress();

    out::print_success(&format!(
        "Moved {}, skipped {}, failed {} (of {})",
        summary.moved, summary.skipped, summary.failed, summary.total
    ));
    for failure in &summary.failures {
        out::print_warn(&format!("{}: {}", failure.path.display(), failure.error));
    }
    if summary.unlogged > 0 {
        out::print_warn(&format!(
            "{} moved file(s) could not be recorded and will not be restored by undo",
            summary.unlogged
        ));
    }
    info!(moved = summary.moved, skipped = summary.skipped, failed = summary.failed, "Classification finished");

    if summary.cancelled {
        out::print_warn(&format!(
            "Cancelled: {} file(s) were not processed. `filesort undo` reverts what was moved.",
            summary.not_processed()
        ));
        return Err(ClassifyError::Interrupted.into());
    }
    Ok(())
}

fn run_undo(cfg: &Config, yes: bool, control: &RunControl) -> Result<()> {
    let manager = UndoManager::new(&cfg.journal_file);
    if !manager.has_log() {
        return Err(ClassifyError::NoLog(cfg.journal_file.clone()).into());
    }
    if !confirmed("Undo the last classification?", yes)? {
        out::print_info("Aborted; nothing was restored.");
        return Ok(());
    }

    let report = manager.undo(control, &progress_printer)?;
    out::finish_progress();

    out::print_success(&format!(
        "Restored {} of {} file(s) ({} under a new name), {} failed",
        report.restored, report.total, report.renamed, report.failed
    ));
    for failure in &report.failures {
        out::print_warn(&format!("{}: {}", failure.path.display(), failure.error));
    }
    if report.cancelled {
        out::print_warn("Undo cancelled; run `filesort undo` again to restore the rest.");
        return Err(ClassifyError::Interrupted.into());
    }
    Ok(())
}

fn run_import(cfg: &Config, csv: &Path, explicit: Option<&Path>) -> Result<()> {
    let target: PathBuf = explicit
        .map(Path::to_path_buf)
        .or_else(|| cfg.mapping_file.clone())
        .ok_or_else(|| anyhow!("no mapping file configured; pass --config <MAPPING> or set <mapping_file> in the settings"))?;

    let report = import_rules(&target, csv)?;
    out::print_success(&format!(
        "Imported into {}: {} added, {} updated, {} already present, {} rejected",
        target.display(),
        report.added.len(),
        report.updated.len(),
        report.duplicates.len(),
        report.errors.len()
    ));
    for (ext, old, new) in &report.updated {
        out::print_user(&format!("  {ext}: {old} -> {new}"));
    }
    for (line, reason) in &report.errors {
        out::print_warn(&format!("line {line}: {reason}"));
    }
    Ok(())
}
