// Domain model shared by the orchestrator's API, storage, and engine layers

pub mod execution;
pub mod validation;
pub mod workflow;

pub use execution::{Execution, ExecutionStatus, LogEntry, LogLevel};
pub use validation::{validate_workflow, ValidationError};
pub use workflow::{ActionDefinition, ActionType, TriggerDefinition, TriggerType, Workflow};
