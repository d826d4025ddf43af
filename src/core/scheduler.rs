//! Alarm scheduler.
//!
//! Two periodic jobs run independently of operator actions:
//!
//! - alarm injection: picks one armed plot at random and raises an alarm
//! - battery drift: drains every plot by a small random amount
//!
//! Each tick is synchronous, so a tick that has started always finishes;
//! shutdown only stops further ticks from being scheduled. Per-tick
//! failures are logged and never end the loop.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::config::Settings;
use super::dispatcher::CallDispatcher;
use super::error::DispatchResult;
use super::model::{AlarmCause, EmergencyCall, Plot};
use super::random::RandomSource;
use super::registry::PlotRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub alarm_interval: Duration,
    pub drift_interval: Duration,
    /// Inclusive upper bound of each plot's per-tick drain.
    pub max_drift: u8,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for SchedulerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            alarm_interval: settings.alarm_interval(),
            drift_interval: settings.drift_interval(),
            max_drift: settings.max_drift,
        }
    }
}

/// Outcome of one battery drift pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriftReport {
    pub plots_drained: usize,
    pub went_low: usize,
    pub failures: usize,
}

pub struct AlarmScheduler {
    registry: Arc<PlotRegistry>,
    dispatcher: Arc<CallDispatcher>,
    random: Mutex<Box<dyn RandomSource>>,
    config: SchedulerConfig,
}

impl AlarmScheduler {
    pub fn new(
        registry: Arc<PlotRegistry>,
        dispatcher: Arc<CallDispatcher>,
        random: Box<dyn RandomSource>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            random: Mutex::new(random),
            config,
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Raise an automatic alarm on one armed plot chosen at random.
    /// `Ok(None)` when nothing is armed.
    pub fn alarm_tick(&self) -> DispatchResult<Option<(Plot, EmergencyCall)>> {
        let active = self.registry.active_ids();
        if active.is_empty() {
            return Ok(None);
        }
        let idx = self.random().pick(active.len());
        let Some(&plot_id) = active.get(idx) else {
            warn!(
                "Random pick {} out of range for {} armed plots; skipping tick",
                idx,
                active.len()
            );
            return Ok(None);
        };
        self.dispatcher.trigger(plot_id, AlarmCause::Auto).map(Some)
    }

    /// Drain every plot by `0..=max_drift`.
    pub fn drift_tick(&self) -> DriftReport {
        let mut report = DriftReport::default();
        for plot_id in self.registry.ids() {
            let delta = self.random().drift(self.config.max_drift);
            match self.registry.apply_battery_drift(plot_id, delta) {
                Ok((plot, went_low)) => {
                    report.plots_drained += 1;
                    if went_low {
                        report.went_low += 1;
                        info!("Plot {} battery low ({}%)", plot.id, plot.battery);
                    }
                }
                Err(e) => {
                    report.failures += 1;
                    warn!("Battery drift failed for plot {}: {}", plot_id, e);
                }
            }
        }
        report
    }

    fn run_alarm_tick(&self) {
        match self.alarm_tick() {
            Ok(Some((plot, call))) => {
                info!("Automatic alarm on plot {} (call {})", plot.id, call.id)
            }
            Ok(None) => debug!("No active plots to alarm"),
            Err(e) => warn!("Alarm tick failed: {}", e),
        }
    }

    fn run_drift_tick(&self) {
        let report = self.drift_tick();
        debug!(
            "Drift tick: {} drained, {} went low, {} failed",
            report.plots_drained, report.went_low, report.failures
        );
    }

    fn random(&self) -> std::sync::MutexGuard<'_, Box<dyn RandomSource>> {
        self.random.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start both jobs on the current tokio runtime. The first tick of
    /// each job fires one full interval after start.
    pub fn spawn(self: &Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let alarm = {
            let scheduler = Arc::clone(self);
            periodic(
                "alarm-injection",
                self.config.alarm_interval,
                shutdown_rx.clone(),
                move || scheduler.run_alarm_tick(),
            )
        };
        let drift = {
            let scheduler = Arc::clone(self);
            periodic(
                "battery-drift",
                self.config.drift_interval,
                shutdown_rx,
                move || scheduler.run_drift_tick(),
            )
        };

        info!(
            "Scheduler started: alarms every {}s, drift every {}s",
            self.config.alarm_interval.as_secs(),
            self.config.drift_interval.as_secs()
        );

        SchedulerHandle {
            shutdown_tx,
            tasks: vec![alarm, drift],
        }
    }
}

fn periodic<F>(
    name: &'static str,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = ticker.tick() => tick(),
            }
        }
        debug!("Scheduler job {} stopped", name);
    })
}

/// Running scheduler jobs. Dropping the handle without calling
/// [`SchedulerHandle::shutdown`] also stops them, at their next wake-up.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop both jobs and wait for them to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Scheduler job ended abnormally: {}", e);
            }
        }
        info!("Scheduler stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }
}
