//! Operator-facing entry point.
//!
//! Wires the registry, roster, dispatcher and scheduler together and exposes
//! the operations the presentation layer calls. Every method returns owned
//! snapshots; nothing here hands out access to live state.

use std::sync::Arc;

use super::clock::{Clock, SystemClock};
use super::config::Settings;
use super::dispatcher::CallDispatcher;
use super::employees::EmployeeDirectory;
use super::error::DispatchResult;
use super::history::HistoryEntry;
use super::model::{
    AlarmCause, CallFilter, CallId, CustomStatus, EmergencyCall, Employee, EmployeeId, Plot,
    PlotId, PlotSort, PlotStats, Rank,
};
use super::palette::StatusPalette;
use super::random::{RandomSource, StdRandom};
use super::registry::{PlotRegistry, PlotRules};
use super::scheduler::{AlarmScheduler, SchedulerConfig, SchedulerHandle};

pub struct ControlRoom {
    registry: Arc<PlotRegistry>,
    roster: Arc<EmployeeDirectory>,
    dispatcher: Arc<CallDispatcher>,
    scheduler: Arc<AlarmScheduler>,
    palette: StatusPalette,
}

impl ControlRoom {
    pub fn new(
        settings: &Settings,
        roster: EmployeeDirectory,
        clock: Arc<dyn Clock>,
        random: Box<dyn RandomSource>,
    ) -> Self {
        let registry = Arc::new(PlotRegistry::new(PlotRules::from(settings), clock.clone()));
        let roster = Arc::new(roster);
        let dispatcher = Arc::new(CallDispatcher::new(registry.clone(), roster.clone(), clock));
        let scheduler = Arc::new(AlarmScheduler::new(
            registry.clone(),
            dispatcher.clone(),
            random,
            SchedulerConfig::from(settings),
        ));
        Self {
            registry,
            roster,
            dispatcher,
            scheduler,
            palette: StatusPalette::new(),
        }
    }

    /// Wall clock, OS-seeded randomness and the default duty crew.
    pub fn with_settings(settings: &Settings) -> Self {
        Self::new(
            settings,
            EmployeeDirectory::with_defaults(),
            Arc::new(SystemClock),
            Box::new(StdRandom::new()),
        )
    }

    pub fn registry(&self) -> &PlotRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &AlarmScheduler {
        &self.scheduler
    }

    /// Start the alarm-injection and battery-drift jobs.
    pub fn start_scheduler(&self) -> SchedulerHandle {
        self.scheduler.spawn()
    }

    // Plots

    pub fn list_plots(&self, sort: PlotSort) -> Vec<Plot> {
        self.registry.list(sort)
    }

    pub fn get_plot(&self, id: PlotId) -> DispatchResult<Plot> {
        self.registry.get(id)
    }

    pub fn create_plot(&self, address: &str, phone: &str) -> DispatchResult<Plot> {
        self.registry.create(address, phone)
    }

    pub fn toggle_plot(&self, id: PlotId) -> DispatchResult<Plot> {
        self.registry.toggle(id)
    }

    pub fn set_armed(&self, id: PlotId, armed: bool) -> DispatchResult<Plot> {
        self.dispatcher.set_armed(id, armed)
    }

    pub fn trigger_emergency(&self, id: PlotId) -> DispatchResult<(Plot, EmergencyCall)> {
        self.dispatcher.trigger(id, AlarmCause::Manual)
    }

    pub fn charge_battery(&self, id: PlotId) -> DispatchResult<Plot> {
        self.registry.charge_battery(id)
    }

    pub fn discharge_battery(&self, id: PlotId) -> DispatchResult<Plot> {
        self.registry.discharge_battery(id)
    }

    pub fn set_custom_status(&self, id: PlotId, name: &str, color: &str) -> DispatchResult<Plot> {
        self.registry.set_custom_status(id, name, color)
    }

    pub fn history(&self, id: PlotId, offset: usize, limit: usize) -> DispatchResult<Vec<HistoryEntry>> {
        self.registry.history(id, offset, limit)
    }

    pub fn stats(&self) -> PlotStats {
        self.registry.stats()
    }

    // Bulk operations. Each id is handled on its own; one failure does not
    // stop the rest.

    pub fn select_active(&self) -> Vec<PlotId> {
        self.registry.active_ids()
    }

    pub fn arm_many(&self, ids: &[PlotId]) -> Vec<(PlotId, DispatchResult<Plot>)> {
        ids.iter().map(|&id| (id, self.set_armed(id, true))).collect()
    }

    pub fn disarm_many(&self, ids: &[PlotId]) -> Vec<(PlotId, DispatchResult<Plot>)> {
        ids.iter().map(|&id| (id, self.set_armed(id, false))).collect()
    }

    pub fn trigger_many(
        &self,
        ids: &[PlotId],
    ) -> Vec<(PlotId, DispatchResult<(Plot, EmergencyCall)>)> {
        ids.iter().map(|&id| (id, self.trigger_emergency(id))).collect()
    }

    // Custom status palette

    pub fn add_custom_status(&self, name: &str, color: &str) -> DispatchResult<CustomStatus> {
        self.palette.add(name, color)
    }

    pub fn custom_statuses(&self) -> Vec<CustomStatus> {
        self.palette.list()
    }

    pub fn apply_custom_status(&self, id: PlotId, name: &str) -> DispatchResult<Plot> {
        let status = self.palette.find(name)?;
        self.registry.apply_custom_status(id, status)
    }

    // Roster

    pub fn list_employees(&self) -> Vec<Employee> {
        self.roster.list()
    }

    pub fn add_employee(&self, name: &str, rank: Rank) -> DispatchResult<Employee> {
        self.roster.add(name, rank)
    }

    pub fn remove_employee(&self, id: EmployeeId) -> DispatchResult<Employee> {
        self.dispatcher.remove_employee(id)
    }

    // Calls

    pub fn list_calls(&self, filter: CallFilter) -> Vec<EmergencyCall> {
        self.dispatcher.list(filter)
    }

    pub fn assign_call(&self, call_id: CallId, employee_id: EmployeeId) -> DispatchResult<EmergencyCall> {
        self.dispatcher.assign(call_id, employee_id)
    }

    pub fn reassign_call(&self, call_id: CallId, employee_id: EmployeeId) -> DispatchResult<EmergencyCall> {
        self.dispatcher.reassign(call_id, employee_id)
    }

    pub fn resolve_call(&self, plot_id: PlotId) -> DispatchResult<Plot> {
        self.dispatcher.resolve_for_plot(plot_id)
    }
}
