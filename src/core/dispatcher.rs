//! Dispatch calls: creation, assignment and resolution.
//!
//! Calls are kept newest-first. Every check-then-set on a call happens
//! under the call list lock, and plot-level operations (raising an alarm,
//! resolving) take the plot lock before it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use log::info;

use super::clock::Clock;
use super::employees::EmployeeDirectory;
use super::error::{DispatchError, DispatchResult, Entity};
use super::model::{
    AlarmCause, CallFilter, CallId, CallType, EmergencyCall, Employee, EmployeeId, Plot, PlotId,
};
use super::registry::PlotRegistry;

pub struct CallDispatcher {
    registry: Arc<PlotRegistry>,
    roster: Arc<EmployeeDirectory>,
    calls: Mutex<Vec<EmergencyCall>>,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl CallDispatcher {
    pub fn new(
        registry: Arc<PlotRegistry>,
        roster: Arc<EmployeeDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            roster,
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            clock,
        }
    }

    /// Record an unassigned call for an existing plot. Leaves the plot's
    /// status alone; use [`CallDispatcher::trigger`] to raise an alarm.
    pub fn create_call(&self, plot_id: PlotId, call_type: CallType) -> DispatchResult<EmergencyCall> {
        if !self.registry.contains(plot_id) {
            return Err(DispatchError::not_found(Entity::Plot, plot_id));
        }
        Ok(self.record(plot_id, call_type, self.clock.now()))
    }

    /// Put a plot into emergency and open exactly one call for it.
    pub fn trigger(&self, plot_id: PlotId, cause: AlarmCause) -> DispatchResult<(Plot, EmergencyCall)> {
        let (plot, call) = self.registry.trigger_alarm(plot_id, cause, |plot, at| {
            self.record(plot.id, cause.call_type(), at)
        })?;
        info!(
            "Plot {} in emergency ({:?}), call {} opened",
            plot.id, cause, call.id
        );
        Ok((plot, call))
    }

    pub fn assign(&self, call_id: CallId, employee_id: EmployeeId) -> DispatchResult<EmergencyCall> {
        self.set_assignee(call_id, employee_id, false)
    }

    /// Replace whoever is on the call, if anyone.
    pub fn reassign(&self, call_id: CallId, employee_id: EmployeeId) -> DispatchResult<EmergencyCall> {
        self.set_assignee(call_id, employee_id, true)
    }

    fn set_assignee(
        &self,
        call_id: CallId,
        employee_id: EmployeeId,
        replace: bool,
    ) -> DispatchResult<EmergencyCall> {
        let mut calls = self.lock_calls();
        let call = calls
            .iter_mut()
            .find(|c| c.id == call_id)
            .ok_or_else(|| DispatchError::not_found(Entity::Call, call_id))?;
        if !self.roster.contains(employee_id) {
            return Err(DispatchError::not_found(Entity::Employee, employee_id));
        }
        if let Some(current) = call.assigned_employee {
            if !replace {
                return Err(DispatchError::conflict(format!(
                    "call {} is already assigned to employee {}",
                    call_id, current
                )));
            }
        }
        call.assigned_employee = Some(employee_id);
        info!("Call {} assigned to employee {}", call_id, employee_id);
        Ok(call.clone())
    }

    /// Drop every call on the plot, whatever its type or assignment, and
    /// return the plot to armed.
    pub fn resolve_for_plot(&self, plot_id: PlotId) -> DispatchResult<Plot> {
        let (plot, removed) = self.registry.resolve(plot_id, || {
            let mut calls = self.lock_calls();
            let before = calls.len();
            calls.retain(|c| c.plot_id != plot_id);
            before - calls.len()
        })?;
        info!("Plot {} resolved, {} call(s) closed", plot_id, removed);
        Ok(plot)
    }

    /// Arm or disarm a plot. Refused while any call on the plot is still
    /// open, so a plot cannot be re-armed under an unresolved incident.
    pub fn set_armed(&self, plot_id: PlotId, armed: bool) -> DispatchResult<Plot> {
        self.registry.set_armed(plot_id, armed, |_| {
            let calls = self.lock_calls();
            match calls.iter().find(|c| c.plot_id == plot_id) {
                Some(call) => Err(DispatchError::conflict(format!(
                    "plot {} has open call {}; resolve it first",
                    plot_id, call.id
                ))),
                None => Ok(()),
            }
        })
    }

    /// Remove an employee from the roster. Refused while they are on a call.
    pub fn remove_employee(&self, employee_id: EmployeeId) -> DispatchResult<Employee> {
        let calls = self.lock_calls();
        if let Some(call) = calls
            .iter()
            .find(|c| c.assigned_employee == Some(employee_id))
        {
            return Err(DispatchError::conflict(format!(
                "employee {} is assigned to call {}",
                employee_id, call.id
            )));
        }
        self.roster.remove(employee_id)
    }

    pub fn get(&self, call_id: CallId) -> DispatchResult<EmergencyCall> {
        self.lock_calls()
            .iter()
            .find(|c| c.id == call_id)
            .cloned()
            .ok_or_else(|| DispatchError::not_found(Entity::Call, call_id))
    }

    pub fn list(&self, filter: CallFilter) -> Vec<EmergencyCall> {
        self.lock_calls()
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect()
    }

    pub fn list_unassigned(&self) -> Vec<EmergencyCall> {
        self.list(CallFilter::Unassigned)
    }

    pub fn list_assigned(&self) -> Vec<EmergencyCall> {
        self.list(CallFilter::Assigned)
    }

    pub fn calls_for_plot(&self, plot_id: PlotId) -> Vec<EmergencyCall> {
        self.lock_calls()
            .iter()
            .filter(|c| c.plot_id == plot_id)
            .cloned()
            .collect()
    }

    fn record(&self, plot_id: PlotId, call_type: CallType, at: DateTime<Utc>) -> EmergencyCall {
        let call = EmergencyCall {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            plot_id,
            call_type,
            created_at: at,
            assigned_employee: None,
        };
        self.lock_calls().insert(0, call.clone());
        call
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<EmergencyCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SystemClock;
    use crate::core::model::{PlotStatus, Rank};
    use crate::core::registry::PlotRules;

    struct Fixture {
        registry: Arc<PlotRegistry>,
        roster: Arc<EmployeeDirectory>,
        dispatcher: CallDispatcher,
    }

    fn fixture() -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let registry = Arc::new(PlotRegistry::new(PlotRules::default(), clock.clone()));
        let roster = Arc::new(EmployeeDirectory::new());
        let dispatcher = CallDispatcher::new(registry.clone(), roster.clone(), clock);
        Fixture {
            registry,
            roster,
            dispatcher,
        }
    }

    #[test]
    fn test_create_call_unknown_plot() {
        let f = fixture();
        assert!(matches!(
            f.dispatcher.create_call(3, CallType::Alarm),
            Err(DispatchError::NotFound { entity: Entity::Plot, .. })
        ));
    }

    #[test]
    fn test_create_call_leaves_status() {
        let f = fixture();
        let plot = f.registry.create("A", "1").unwrap();
        let call = f.dispatcher.create_call(plot.id, CallType::Alarm).unwrap();
        assert!(!call.is_assigned());
        assert_eq!(f.registry.get(plot.id).unwrap().status, PlotStatus::Inactive);
    }

    #[test]
    fn test_trigger_opens_one_call() {
        let f = fixture();
        let plot = f.registry.create("A", "1").unwrap();
        let (raised, call) = f.dispatcher.trigger(plot.id, AlarmCause::Manual).unwrap();
        assert_eq!(raised.status, PlotStatus::Emergency);
        assert_eq!(call.plot_id, plot.id);
        assert_eq!(call.call_type, CallType::Emergency);
        assert_eq!(f.dispatcher.list_unassigned(), vec![call]);
    }

    #[test]
    fn test_calls_newest_first() {
        let f = fixture();
        let a = f.registry.create("A", "1").unwrap();
        let b = f.registry.create("B", "2").unwrap();
        let (_, first) = f.dispatcher.trigger(a.id, AlarmCause::Manual).unwrap();
        let (_, second) = f.dispatcher.trigger(b.id, AlarmCause::Manual).unwrap();
        let ids: Vec<_> = f.dispatcher.list(CallFilter::All).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn test_assign_checks() {
        let f = fixture();
        let plot = f.registry.create("A", "1").unwrap();
        let (_, call) = f.dispatcher.trigger(plot.id, AlarmCause::Manual).unwrap();
        let e1 = f.roster.add("Ivanov I.I.", Rank::Major).unwrap();
        let e2 = f.roster.add("Petrov P.P.", Rank::Captain).unwrap();

        assert!(matches!(
            f.dispatcher.assign(call.id, 999),
            Err(DispatchError::NotFound { entity: Entity::Employee, .. })
        ));
        assert!(!f.dispatcher.get(call.id).unwrap().is_assigned());
        assert!(matches!(
            f.dispatcher.assign(999, e1.id),
            Err(DispatchError::NotFound { entity: Entity::Call, .. })
        ));

        let assigned = f.dispatcher.assign(call.id, e1.id).unwrap();
        assert_eq!(assigned.assigned_employee, Some(e1.id));
        assert!(matches!(
            f.dispatcher.assign(call.id, e2.id),
            Err(DispatchError::Conflict { .. })
        ));

        let moved = f.dispatcher.reassign(call.id, e2.id).unwrap();
        assert_eq!(moved.assigned_employee, Some(e2.id));
        assert_eq!(f.dispatcher.list_assigned().len(), 1);
        assert!(f.dispatcher.list_unassigned().is_empty());
    }

    #[test]
    fn test_resolve_clears_every_call_for_plot() {
        let f = fixture();
        let plot = f.registry.create("A", "1").unwrap();
        let other = f.registry.create("B", "2").unwrap();
        let e1 = f.roster.add("Ivanov I.I.", Rank::Major).unwrap();

        let (_, c1) = f.dispatcher.trigger(plot.id, AlarmCause::Manual).unwrap();
        f.dispatcher.create_call(plot.id, CallType::Alarm).unwrap();
        f.dispatcher.assign(c1.id, e1.id).unwrap();
        f.dispatcher.trigger(other.id, AlarmCause::Manual).unwrap();

        let resolved = f.dispatcher.resolve_for_plot(plot.id).unwrap();
        assert_eq!(resolved.status, PlotStatus::Active);
        assert_eq!(resolved.history.latest().unwrap().action, "End of alert");
        assert!(f.dispatcher.calls_for_plot(plot.id).is_empty());
        assert_eq!(f.dispatcher.calls_for_plot(other.id).len(), 1);
    }

    #[test]
    fn test_open_calls_block_leaving_emergency() {
        let f = fixture();
        let plot = f.registry.create("A", "1").unwrap();
        f.dispatcher.trigger(plot.id, AlarmCause::Manual).unwrap();

        assert!(matches!(
            f.registry.set_custom_status(plot.id, "Patrol", "#8B5CF6"),
            Err(DispatchError::Conflict { .. })
        ));
        assert!(matches!(
            f.dispatcher.set_armed(plot.id, true),
            Err(DispatchError::Conflict { .. })
        ));
        assert_eq!(f.registry.get(plot.id).unwrap().status, PlotStatus::Emergency);
        assert_eq!(f.dispatcher.calls_for_plot(plot.id).len(), 1);

        f.dispatcher.resolve_for_plot(plot.id).unwrap();
        let disarmed = f.dispatcher.set_armed(plot.id, false).unwrap();
        assert_eq!(disarmed.status, PlotStatus::Inactive);
    }

    #[test]
    fn test_set_armed_refused_with_open_call_outside_emergency() {
        let f = fixture();
        let plot = f.registry.create("A", "1").unwrap();
        f.dispatcher.create_call(plot.id, CallType::Alarm).unwrap();

        assert!(matches!(
            f.dispatcher.set_armed(plot.id, true),
            Err(DispatchError::Conflict { .. })
        ));
        let unchanged = f.registry.get(plot.id).unwrap();
        assert_eq!(unchanged.status, PlotStatus::Inactive);
        assert_eq!(unchanged.history.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_plot() {
        let f = fixture();
        assert!(matches!(
            f.dispatcher.resolve_for_plot(1),
            Err(DispatchError::NotFound { .. })
        ));
    }

    #[test]
    fn test_remove_employee_on_call_refused() {
        let f = fixture();
        let plot = f.registry.create("A", "1").unwrap();
        let e1 = f.roster.add("Ivanov I.I.", Rank::Major).unwrap();
        let (_, call) = f.dispatcher.trigger(plot.id, AlarmCause::Manual).unwrap();
        f.dispatcher.assign(call.id, e1.id).unwrap();

        assert!(matches!(
            f.dispatcher.remove_employee(e1.id),
            Err(DispatchError::Conflict { .. })
        ));
        assert!(f.roster.contains(e1.id));

        f.dispatcher.resolve_for_plot(plot.id).unwrap();
        f.dispatcher.remove_employee(e1.id).unwrap();
        assert!(!f.roster.contains(e1.id));
    }

    #[test]
    fn test_concurrent_assign_only_one_wins() {
        let f = fixture();
        let plot = f.registry.create("A", "1").unwrap();
        let (_, call) = f.dispatcher.trigger(plot.id, AlarmCause::Manual).unwrap();
        let employees: Vec<_> = (0..8)
            .map(|i| f.roster.add(&format!("Crew {i}"), Rank::Private).unwrap())
            .collect();

        let call_id = call.id;
        let dispatcher = Arc::new(f.dispatcher);
        let handles: Vec<_> = employees
            .iter()
            .map(|e| {
                let dispatcher = Arc::clone(&dispatcher);
                let employee_id = e.id;
                std::thread::spawn(move || dispatcher.assign(call_id, employee_id).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
    }
}
