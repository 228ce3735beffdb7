// Request-boundary validation for workflow definitions
//
// Cron expressions are deliberately not checked here: the scheduler validates
// them at reconcile time and skips workflows whose spec does not parse.

use std::collections::HashSet;

use crate::workflow::{ActionDefinition, ActionType, TriggerDefinition, TriggerType};

pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 100;

/// A workflow definition rejected at the API boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("workflow name must be between {NAME_MIN_LEN} and {NAME_MAX_LEN} characters")]
    NameLength,

    #[error("trigger has an unknown type")]
    UnknownTriggerType,

    #[error("workflow must define at least one action")]
    NoActions,

    #[error("action {index} is missing a name")]
    ActionNameMissing { index: usize },

    #[error("action name '{name}' is used more than once")]
    DuplicateActionName { name: String },

    #[error("action '{name}' has an unknown type")]
    UnknownActionType { name: String },
}

/// Validate the user-supplied parts of a workflow definition
///
/// Returns the first violation; the API maps it to a 400.
pub fn validate_workflow(
    name: &str,
    trigger: &TriggerDefinition,
    actions: &[ActionDefinition],
) -> Result<(), ValidationError> {
    let name_len = name.chars().count();
    if name_len < NAME_MIN_LEN || name_len > NAME_MAX_LEN {
        return Err(ValidationError::NameLength);
    }

    if trigger.trigger_type == TriggerType::Unknown {
        return Err(ValidationError::UnknownTriggerType);
    }

    if actions.is_empty() {
        return Err(ValidationError::NoActions);
    }

    let mut seen = HashSet::new();
    for (index, action) in actions.iter().enumerate() {
        if action.name.trim().is_empty() {
            return Err(ValidationError::ActionNameMissing { index });
        }
        if !seen.insert(action.name.as_str()) {
            return Err(ValidationError::DuplicateActionName {
                name: action.name.clone(),
            });
        }
        if action.action_type == ActionType::Unknown {
            return Err(ValidationError::UnknownActionType {
                name: action.name.clone(),
            });
        }
    }

    Ok(())
}
