//! Plot registry.
//!
//! Owns every plot and is the only place plot state changes. Each plot sits
//! behind its own mutex, so mutations on one plot are serialized while
//! different plots proceed in parallel. The map lock is only held long
//! enough to find or insert a plot, never while a plot is being mutated.
//!
//! Lock order across the crate: plot, then call list, then roster.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use log::info;

use super::clock::Clock;
use super::config::Settings;
use super::error::{DispatchError, DispatchResult, Entity};
use super::history::HistoryEntry;
use super::model::{AlarmCause, CustomStatus, Plot, PlotId, PlotSort, PlotStats, PlotStatus};

/// Tunables applied to every plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotRules {
    pub low_battery_threshold: u8,
    pub discharge_step: u8,
    pub history_capacity: usize,
}

impl Default for PlotRules {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for PlotRules {
    fn from(settings: &Settings) -> Self {
        Self {
            low_battery_threshold: settings.low_battery_threshold,
            discharge_step: settings.discharge_step,
            history_capacity: settings.history_capacity,
        }
    }
}

pub struct PlotRegistry {
    plots: RwLock<BTreeMap<PlotId, Arc<Mutex<Plot>>>>,
    rules: PlotRules,
    clock: Arc<dyn Clock>,
}

impl PlotRegistry {
    pub fn new(rules: PlotRules, clock: Arc<dyn Clock>) -> Self {
        Self {
            plots: RwLock::new(BTreeMap::new()),
            rules,
            clock,
        }
    }

    pub fn rules(&self) -> PlotRules {
        self.rules
    }

    /// Register a new disarmed plot with a full battery.
    pub fn create(&self, address: &str, phone: &str) -> DispatchResult<Plot> {
        let address = address.trim();
        if address.is_empty() {
            return Err(DispatchError::invalid("address", "must not be empty"));
        }
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(DispatchError::invalid("phone", "must not be empty"));
        }

        let mut plots = self.plots.write().unwrap_or_else(PoisonError::into_inner);
        let id = plots.keys().next_back().map_or(1, |last| last + 1);
        let plot = Plot::new(
            id,
            address.to_string(),
            phone.to_string(),
            self.rules.history_capacity,
            self.clock.now(),
        );
        plots.insert(id, Arc::new(Mutex::new(plot.clone())));
        info!("Plot {} created at {}", id, plot.address);
        Ok(plot)
    }

    pub fn contains(&self, id: PlotId) -> bool {
        self.plots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.plots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: PlotId) -> DispatchResult<Plot> {
        let entry = self.entry(id)?;
        let plot = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(plot.clone())
    }

    pub fn list(&self, sort: PlotSort) -> Vec<Plot> {
        let mut plots: Vec<Plot> = self
            .entries()
            .iter()
            .map(|entry| entry.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        sort.sort(&mut plots);
        plots
    }

    pub fn ids(&self) -> Vec<PlotId> {
        self.plots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Ids of armed plots, ascending.
    pub fn active_ids(&self) -> Vec<PlotId> {
        self.entries()
            .iter()
            .filter_map(|entry| {
                let plot = entry.lock().unwrap_or_else(PoisonError::into_inner);
                (plot.status == PlotStatus::Active).then_some(plot.id)
            })
            .collect()
    }

    pub fn stats(&self) -> PlotStats {
        let mut stats = PlotStats::default();
        for entry in self.entries() {
            let plot = entry.lock().unwrap_or_else(PoisonError::into_inner);
            stats.count(&plot.status);
        }
        stats
    }

    pub fn history(&self, id: PlotId, offset: usize, limit: usize) -> DispatchResult<Vec<HistoryEntry>> {
        let entry = self.entry(id)?;
        let plot = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(plot.history.page(offset, limit))
    }

    pub fn toggle(&self, id: PlotId) -> DispatchResult<Plot> {
        let plot = self.mutate(id, |plot, at| {
            plot.toggle(at)?;
            Ok(plot.clone())
        })?;
        info!("Plot {} toggled to {}", id, plot.status.label());
        Ok(plot)
    }

    /// Force the plot armed or disarmed. `guard` runs under the plot lock
    /// first and can veto the change.
    pub(crate) fn set_armed(
        &self,
        id: PlotId,
        armed: bool,
        guard: impl FnOnce(&Plot) -> DispatchResult<()>,
    ) -> DispatchResult<Plot> {
        let plot = self.mutate(id, |plot, at| {
            guard(plot)?;
            plot.set_armed(armed, at)?;
            Ok(plot.clone())
        })?;
        info!("Plot {} set to {}", id, plot.status.label());
        Ok(plot)
    }

    /// Put the plot into emergency and run `notify` inside the same
    /// critical section, so the plot and its dispatch call appear together.
    ///
    /// Automatic alarms only fire on plots that are still armed when the
    /// lock is taken; manual ones override any status.
    pub(crate) fn trigger_alarm<T>(
        &self,
        id: PlotId,
        cause: AlarmCause,
        notify: impl FnOnce(&Plot, DateTime<Utc>) -> T,
    ) -> DispatchResult<(Plot, T)> {
        self.mutate(id, |plot, at| {
            if cause == AlarmCause::Auto && plot.status != PlotStatus::Active {
                return Err(DispatchError::conflict(format!(
                    "plot {} is no longer armed",
                    plot.id
                )));
            }
            plot.raise_alarm(cause, at);
            let notified = notify(plot, at);
            Ok((plot.clone(), notified))
        })
    }

    pub fn charge_battery(&self, id: PlotId) -> DispatchResult<Plot> {
        self.mutate(id, |plot, at| {
            plot.charge(at);
            Ok(plot.clone())
        })
    }

    pub fn discharge_battery(&self, id: PlotId) -> DispatchResult<Plot> {
        let step = self.rules.discharge_step;
        self.mutate(id, |plot, at| {
            plot.discharge(step, at);
            Ok(plot.clone())
        })
    }

    /// Scheduler-only battery decrement. Returns the plot and whether it
    /// just entered `LowBattery`.
    pub(crate) fn apply_battery_drift(&self, id: PlotId, delta: u8) -> DispatchResult<(Plot, bool)> {
        let threshold = self.rules.low_battery_threshold;
        self.mutate(id, |plot, at| {
            let went_low = plot.drift(delta, threshold, at);
            Ok((plot.clone(), went_low))
        })
    }

    pub fn set_custom_status(&self, id: PlotId, name: &str, color: &str) -> DispatchResult<Plot> {
        let custom = CustomStatus::new(name, color)?;
        self.apply_custom_status(id, custom)
    }

    pub fn apply_custom_status(&self, id: PlotId, custom: CustomStatus) -> DispatchResult<Plot> {
        let plot = self.mutate(id, |plot, at| {
            plot.set_custom(custom, at)?;
            Ok(plot.clone())
        })?;
        info!(
            "Plot {} status set to {} ({})",
            id,
            plot.status.label(),
            plot.status.color()
        );
        Ok(plot)
    }

    /// End the plot's alert. `clear` runs first, under the plot lock, and
    /// is where the dispatcher drops the plot's calls.
    pub(crate) fn resolve<T>(&self, id: PlotId, clear: impl FnOnce() -> T) -> DispatchResult<(Plot, T)> {
        self.mutate(id, |plot, at| {
            let cleared = clear();
            plot.resolve(at);
            Ok((plot.clone(), cleared))
        })
    }

    /// Run `f` with exclusive access to one plot.
    pub(crate) fn mutate<T>(
        &self,
        id: PlotId,
        f: impl FnOnce(&mut Plot, DateTime<Utc>) -> DispatchResult<T>,
    ) -> DispatchResult<T> {
        let entry = self.entry(id)?;
        let mut plot = entry.lock().unwrap_or_else(PoisonError::into_inner);
        let at = self.clock.now();
        f(&mut plot, at)
    }

    fn entry(&self, id: PlotId) -> DispatchResult<Arc<Mutex<Plot>>> {
        self.plots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| DispatchError::not_found(Entity::Plot, id))
    }

    fn entries(&self) -> Vec<Arc<Mutex<Plot>>> {
        self.plots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
