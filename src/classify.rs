//! Classifier facade: mapping → scan → plan → execute, plus undo.
//!
//! Callers (the CLI, or any front-end) hold one `Classifier` and drive a run
//! in two steps: `prepare` builds a plan without moving anything, `execute`
//! carries it out. A dry run is `preview` followed by `report_plan`.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{inspect_roots, validate_roots};
use crate::engine::{
    Engine, EngineOptions, ProgressEvent, ProgressSink, ProgressStatus, RunControl, RunSummary, display_name,
    percent,
};
use crate::errors::ClassifyError;
use crate::fs_ops::{Mover, lock_path_for};
use crate::journal::Journal;
use crate::mapping::Mapping;
use crate::planner::{DuplicatePolicy, MovePlan, Planner};
use crate::scanner::scan;
use crate::undo::{UndoManager, UndoReport};

/// Plan plus the roots it was built for.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub policy: DuplicatePolicy,
    pub plan: MovePlan,
}

pub struct Classifier {
    mapping: Mapping,
    journal_path: PathBuf,
    engine: Engine,
}

impl Classifier {
    pub fn new(mapping: Mapping, journal_path: impl Into<PathBuf>, options: EngineOptions) -> Self {
        Self {
            mapping,
            journal_path: journal_path.into(),
            engine: Engine::new(options),
        }
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    /// Validate the roots, scan the source and build a plan. Moves nothing;
    /// the destination root is created when missing.
    pub fn prepare(
        &self,
        source: &Path,
        destination: &Path,
        policy: DuplicatePolicy,
    ) -> Result<PreparedRun, ClassifyError> {
        let (source_root, destination_root) = validate_roots(source, destination)?;
        self.plan_roots(source_root, destination_root, policy)
    }

    /// Same plan as [`Classifier::prepare`] without any filesystem change,
    /// for dry runs. A missing destination stays missing.
    pub fn preview(
        &self,
        source: &Path,
        destination: &Path,
        policy: DuplicatePolicy,
    ) -> Result<PreparedRun, ClassifyError> {
        let (source_root, destination_root) = inspect_roots(source, destination)?;
        self.plan_roots(source_root, destination_root, policy)
    }

    fn plan_roots(
        &self,
        source_root: PathBuf,
        destination_root: PathBuf,
        policy: DuplicatePolicy,
    ) -> Result<PreparedRun, ClassifyError> {
        let mut files = scan(&source_root)?
            .excluding(self.journal_path.clone())
            .excluding(lock_path_for(&self.journal_path));
        if destination_root != source_root && destination_root.starts_with(&source_root) {
            debug!(dest = %destination_root.display(), "destination is inside the source; excluding it from the scan");
            files = files.excluding(destination_root.clone());
        }

        let plan = Planner::new(&self.mapping, &destination_root, policy).plan(files);
        info!(
            source = %source_root.display(),
            destination = %destination_root.display(),
            planned = plan.len(),
            skipped = plan.skipped().len(),
            "Run prepared"
        );
        Ok(PreparedRun {
            source_root,
            destination_root,
            policy,
            plan,
        })
    }

    /// Dry-run reporting: one `queued` event per planned entry.
    pub fn report_plan(&self, run: &PreparedRun, sink: &dyn ProgressSink) {
        let total = run.plan.len();
        for (idx, entry) in run.plan.entries().iter().enumerate() {
            sink.on_progress(&ProgressEvent {
                percent: percent(idx + 1, total),
                file_name: display_name(&entry.source),
                status: ProgressStatus::Queued,
                processed: idx + 1,
                total,
                detail: Some(entry.destination.display().to_string()),
            });
        }
    }

    /// Carry out a prepared plan. An empty plan leaves the previous journal alone.
    pub fn execute(
        &self,
        run: &PreparedRun,
        control: &RunControl,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, ClassifyError> {
        if run.plan.is_empty() {
            info!("Plan is empty; nothing to execute");
            return Ok(RunSummary::default());
        }
        let journal = Journal::begin(&self.journal_path, &run.source_root, &run.destination_root)?;
        let mover = Mover::new(&journal);
        self.engine.execute(&run.plan, &mover, control, sink)
    }

    /// Undo the last real run recorded in the journal.
    pub fn undo(&self, control: &RunControl, sink: &dyn ProgressSink) -> Result<UndoReport, ClassifyError> {
        UndoManager::new(&self.journal_path).undo(control, sink)
    }
}
