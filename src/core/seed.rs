// Demo population: numbered plots with random phones, armed state and charge.

use rand::Rng;

use super::error::DispatchResult;
use super::model::{PlotId, PlotStatus};
use super::registry::PlotRegistry;

pub fn seed_plots<R: Rng>(
    registry: &PlotRegistry,
    count: usize,
    rng: &mut R,
) -> DispatchResult<Vec<PlotId>> {
    let mut ids = Vec::with_capacity(count);
    for n in 1..=count {
        let phone = format!("+7{}", rng.random_range(1_000_000_000u64..10_000_000_000));
        let plot = registry.create(&format!("{n} Guard Street"), &phone)?;
        let status = if rng.random_bool(0.5) {
            PlotStatus::Active
        } else {
            PlotStatus::Inactive
        };
        let battery = rng.random_range(0..=100u8);
        registry.mutate(plot.id, |plot, _| {
            plot.status = status;
            plot.battery = battery;
            Ok(())
        })?;
        ids.push(plot.id);
    }
    Ok(ids)
}
