// Operator-defined custom statuses that can be applied to plots by name.

use std::sync::{PoisonError, RwLock};

use super::error::{DispatchError, DispatchResult, Entity};
use super::model::CustomStatus;

#[derive(Debug, Default)]
pub struct StatusPalette {
    statuses: RwLock<Vec<CustomStatus>>,
}

impl StatusPalette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names are unique, compared case-insensitively.
    pub fn add(&self, name: &str, color: &str) -> DispatchResult<CustomStatus> {
        let status = CustomStatus::new(name, color)?;
        let mut statuses = self.statuses.write().unwrap_or_else(PoisonError::into_inner);
        if statuses
            .iter()
            .any(|s| s.name.eq_ignore_ascii_case(&status.name))
        {
            return Err(DispatchError::conflict(format!(
                "custom status {:?} already exists",
                status.name
            )));
        }
        statuses.push(status.clone());
        Ok(status)
    }

    pub fn find(&self, name: &str) -> DispatchResult<CustomStatus> {
        let name = name.trim();
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| DispatchError::not_found(Entity::CustomStatus, name))
    }

    pub fn list(&self) -> Vec<CustomStatus> {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_find() {
        let palette = StatusPalette::new();
        palette.add("Patrol", "#8B5CF6").unwrap();
        assert_eq!(palette.find("patrol").unwrap().color, "#8B5CF6");
        assert!(matches!(
            palette.find("Repair"),
            Err(DispatchError::NotFound { entity: Entity::CustomStatus, .. })
        ));
    }

    #[test]
    fn test_duplicate_rejected() {
        let palette = StatusPalette::new();
        palette.add("Patrol", "#8B5CF6").unwrap();
        assert!(matches!(
            palette.add("PATROL", "#000000"),
            Err(DispatchError::Conflict { .. })
        ));
        assert_eq!(palette.list().len(), 1);
    }

    #[test]
    fn test_invalid_entries_rejected() {
        let palette = StatusPalette::new();
        assert!(palette.add("", "#000000").is_err());
        assert!(palette.add("Patrol", "#00").is_err());
        assert!(palette.list().is_empty());
    }
}
