// Execution pipeline: the executor runs a workflow's actions and owns its
// execution record; the scheduler keeps a cron wheel consistent with the
// store and dispatches executions.

pub mod executor;
pub mod scheduler;

pub use executor::{build_action_client, execute_workflow};
pub use scheduler::{Scheduler, SchedulerError};
