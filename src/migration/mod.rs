pub mod plan;
pub mod runner;
pub mod stage;

pub use plan::MigrationPlan;
pub use runner::{MigrationReport, MigrationRunner, StageReport, StageState};
pub use stage::{MigrationStage, ReshapeFn, ReshapeStage, Retainer};
