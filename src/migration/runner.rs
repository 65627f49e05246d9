use super::plan::MigrationPlan;
use super::stage::MigrationStage;
use crate::core::{DbError, Result, SchemaVersion};
use crate::storage::context::SharedStoreHandle;
use crate::storage::{DocumentKey, SaveMode, StoreContext};
use std::fmt;
use std::sync::Arc;
use tracing::{Level, event, info_span};

/// Progress of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Idle,
    BeforePhaseRunning,
    BeforePhaseComplete,
    AfterPhaseRunning,
    Complete,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::BeforePhaseRunning => "before_phase_running",
            Self::BeforePhaseComplete => "before_phase_complete",
            Self::AfterPhaseRunning => "after_phase_running",
            Self::Complete => "complete",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub from_version: SchemaVersion,
    pub to_version: SchemaVersion,
    pub state: StageState,
    pub retained: usize,
    pub inserted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub stages: Vec<StageReport>,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn migrated_records(&self) -> usize {
        self.stages.iter().map(|stage| stage.inserted).sum()
    }
}

/// Drives the stages of a plan against one store, in order.
///
/// Each stage runs in its own deferred-save context. The before phase's deletes,
/// the after phase's inserts and the new schema tag land in a single engine
/// commit, so a failure or crash between the phases leaves the old records and
/// the old tag untouched and the stage simply runs again on the next open.
pub struct MigrationRunner<'a> {
    shared: &'a SharedStoreHandle,
    plan: &'a MigrationPlan,
}

impl<'a> MigrationRunner<'a> {
    pub(crate) fn new(shared: &'a SharedStoreHandle, plan: &'a MigrationPlan) -> Self {
        Self { shared, plan }
    }

    pub fn run(&self, from_version: SchemaVersion, to_version: SchemaVersion) -> Result<MigrationReport> {
        self.plan.validate()?;
        let chain = self.plan.resolve_chain(from_version, to_version)?;

        let mut report = MigrationReport::default();
        for stage in chain {
            report.stages.push(self.run_stage(&stage)?);
        }
        Ok(report)
    }

    fn run_stage(&self, stage: &Arc<dyn MigrationStage>) -> Result<StageReport> {
        let (from, to) = (stage.from_version(), stage.to_version());
        let span = info_span!("migration_stage", from = %from, to = %to);
        let _entered = span.enter();
        let fail = |err: DbError| match err {
            DbError::Migration { .. } => err,
            other => DbError::migration(from, to, other),
        };

        let mut state = StageState::Idle;
        let mut context =
            StoreContext::new(Arc::clone(self.shared), SaveMode::Deferred).map_err(fail)?;

        state = transition(state, StageState::BeforePhaseRunning);
        let retained = stage.will_migrate(&mut context).map_err(fail)?;
        let retained_count = retained.len();
        let targets: Vec<DocumentKey> = retained
            .documents()
            .iter()
            .map(|doc| DocumentKey {
                collection: doc.collection.clone(),
                schema_version: to,
                uid: doc.uid,
            })
            .collect();
        state = transition(state, StageState::BeforePhaseComplete);

        state = transition(state, StageState::AfterPhaseRunning);
        let inserted = stage.did_migrate(&mut context, retained).map_err(fail)?;
        if inserted != retained_count {
            context.rollback();
            return Err(DbError::migration(
                from,
                to,
                format!(
                    "record count changed: {} retained, {} re-inserted",
                    retained_count, inserted
                ),
            ));
        }

        // Recount what actually landed under the new version.
        let mut landed = 0;
        for key in &targets {
            if context.get_document(key).map_err(fail)?.is_some() {
                landed += 1;
            }
        }
        if landed != retained_count {
            context.rollback();
            return Err(DbError::migration(
                from,
                to,
                format!(
                    "{} of {} retained records found at {} after re-insert",
                    landed, retained_count, to
                ),
            ));
        }

        context.commit(Some(to)).map_err(fail)?;
        state = transition(state, StageState::Complete);
        event!(Level::INFO, records = inserted, "migration stage applied");

        Ok(StageReport {
            from_version: from,
            to_version: to,
            state,
            retained: retained_count,
            inserted,
        })
    }
}

fn transition(from: StageState, to: StageState) -> StageState {
    event!(Level::DEBUG, from = %from, to = %to, "migration stage transition");
    to
}
