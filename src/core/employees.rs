//! Roster of response personnel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use log::info;

use super::error::{DispatchError, DispatchResult, Entity};
use super::model::{Employee, EmployeeId, Rank};

pub struct EmployeeDirectory {
    employees: RwLock<Vec<Employee>>,
    next_id: AtomicU64,
}

impl EmployeeDirectory {
    pub fn new() -> Self {
        Self {
            employees: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Roster preloaded with the default duty crew.
    pub fn with_defaults() -> Self {
        let crew: Vec<Employee> = [
            ("Ivanov I.I.", Rank::Major),
            ("Petrov P.P.", Rank::Captain),
            ("Sidorov S.S.", Rank::Lieutenant),
        ]
        .into_iter()
        .zip(1..)
        .map(|((name, rank), id)| Employee {
            id,
            name: name.to_string(),
            rank,
        })
        .collect();
        let next_id = crew.last().map_or(1, |last| last.id + 1);
        Self {
            employees: RwLock::new(crew),
            next_id: AtomicU64::new(next_id),
        }
    }

    pub fn add(&self, name: &str, rank: Rank) -> DispatchResult<Employee> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DispatchError::invalid("employee name", "must not be empty"));
        }
        let employee = Employee {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: name.to_string(),
            rank,
        };
        self.employees
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(employee.clone());
        info!("Employee {} added: {} ({})", employee.id, employee.name, rank);
        Ok(employee)
    }

    pub fn list(&self) -> Vec<Employee> {
        self.employees
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, id: EmployeeId) -> DispatchResult<Employee> {
        self.employees
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| DispatchError::not_found(Entity::Employee, id))
    }

    pub fn contains(&self, id: EmployeeId) -> bool {
        self.get(id).is_ok()
    }

    /// Removal goes through the dispatcher, which refuses while the
    /// employee still holds call assignments.
    pub(crate) fn remove(&self, id: EmployeeId) -> DispatchResult<Employee> {
        let mut employees = self.employees.write().unwrap_or_else(PoisonError::into_inner);
        let idx = employees
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| DispatchError::not_found(Entity::Employee, id))?;
        let removed = employees.remove(idx);
        info!("Employee {} removed: {}", removed.id, removed.name);
        Ok(removed)
    }
}

impl Default for EmployeeDirectory {
    fn default() -> Self {
        Self::new()
    }
}
