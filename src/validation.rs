//! Validation rules for user-supplied names and field values.
//!
//! Every rule returns `Result<(), EngineError>` so callers can `?` them before
//! touching any state.

use crate::error::{EngineError, Result};

pub const MAX_OWNER_NAME_LEN: usize = 30;
pub const MAX_OWNERS_PER_TASK: usize = 5;
pub const MAX_PROJECT_NAME_LEN: usize = 15;
pub const MAX_STATUS_LABEL_LEN: usize = 30;
pub const MAX_STATUS_DESCRIPTION_LEN: usize = 50;
pub const MAX_STATUS_ENTRIES: usize = 15;
pub const MIN_STATUS_ENTRIES: usize = 2;
pub const MAX_LEVEL: u8 = 5;

/// Owner names allow letters, digits, spaces, hyphens, periods and apostrophes.
pub fn validate_owner_name(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::validation("Owner name cannot be empty"));
    }
    if name.chars().count() > MAX_OWNER_NAME_LEN {
        return Err(EngineError::validation(format!(
            "Owner name must be {MAX_OWNER_NAME_LEN} characters or fewer"
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_alphanumeric() || matches!(c, ' ' | '-' | '.' | '\'')))
    {
        return Err(EngineError::validation(format!(
            "Owner name contains invalid character '{bad}'"
        )));
    }
    Ok(())
}

pub fn validate_project_name(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::validation("Project name cannot be empty"));
    }
    if name.chars().count() > MAX_PROJECT_NAME_LEN {
        return Err(EngineError::validation(format!(
            "Project name must be {MAX_PROJECT_NAME_LEN} characters or fewer"
        )));
    }
    Ok(())
}

pub fn validate_status_label(label: &str) -> Result<()> {
    let label = label.trim();
    if label.is_empty() {
        return Err(EngineError::validation("Status label cannot be empty"));
    }
    if label.chars().count() > MAX_STATUS_LABEL_LEN {
        return Err(EngineError::validation(format!(
            "Status label must be {MAX_STATUS_LABEL_LEN} characters or fewer"
        )));
    }
    Ok(())
}

pub fn validate_status_description(description: &str) -> Result<()> {
    if description.trim().chars().count() > MAX_STATUS_DESCRIPTION_LEN {
        return Err(EngineError::validation(format!(
            "Status description must be {MAX_STATUS_DESCRIPTION_LEN} characters or fewer"
        )));
    }
    Ok(())
}

/// Shortcuts are a single ASCII letter or digit.
pub fn validate_shortcut(key: char) -> Result<()> {
    if key.is_ascii_alphanumeric() {
        Ok(())
    } else {
        Err(EngineError::validation(format!("Invalid shortcut key '{key}'")))
    }
}

/// Impact, urgency and effort live on a 0–5 scale.
pub fn validate_level(field: &str, value: u8) -> Result<()> {
    if value > MAX_LEVEL {
        return Err(EngineError::validation(format!(
            "{field} must be between 0 and {MAX_LEVEL}"
        )));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(EngineError::validation("Task title cannot be empty"));
    }
    Ok(())
}

/// Case-insensitive equality used by every uniqueness rule.
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_names() {
        assert!(validate_owner_name("Ana O'Neil-Smith Jr.").is_ok());
        assert!(validate_owner_name("agent 7").is_ok());
        assert!(validate_owner_name("   ").is_err());
        assert!(validate_owner_name("bob@example").is_err());
        assert!(validate_owner_name(&"x".repeat(31)).is_err());
        assert!(validate_owner_name(&"x".repeat(30)).is_ok());
    }

    #[test]
    fn test_project_and_status_lengths() {
        assert!(validate_project_name("Fifteen chars!!").is_ok());
        assert!(validate_project_name("Sixteen chars!!!").is_err());
        assert!(validate_status_label(&"s".repeat(30)).is_ok());
        assert!(validate_status_label(&"s".repeat(31)).is_err());
        assert!(validate_status_description(&"d".repeat(50)).is_ok());
        assert!(validate_status_description(&"d".repeat(51)).is_err());
    }

    #[test]
    fn test_levels_and_names() {
        assert!(validate_level("impact", 5).is_ok());
        assert!(validate_level("impact", 6).is_err());
        assert!(same_name(" Work ", "work"));
        assert!(!same_name("work", "home"));
    }
}
