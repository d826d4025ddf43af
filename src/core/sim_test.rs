#[cfg(test)]
mod sim_tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::{Duration, TimeZone, Utc};

    use crate::core::clock::{Clock, ManualClock};
    use crate::core::config::Settings;
    use crate::core::control_room::ControlRoom;
    use crate::core::employees::EmployeeDirectory;
    use crate::core::error::DispatchError;
    use crate::core::model::{CallFilter, CallType, PlotSort, PlotStatus, Rank};
    use crate::core::random::ScriptedRandom;

    fn room_with(random: ScriptedRandom) -> (ControlRoom, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 7, 24, 8, 0, 0).unwrap(),
        ));
        let room = ControlRoom::new(
            &Settings::default(),
            EmployeeDirectory::new(),
            clock.clone(),
            Box::new(random),
        );
        (room, clock)
    }

    #[test]
    fn simulate_emergency_dispatch_and_resolution() {
        let (room, clock) = room_with(ScriptedRandom::new());
        let e1 = room.add_employee("Ivanov I.I.", Rank::Major).unwrap();

        let plot = room.create_plot("A", "1").unwrap();
        assert_eq!(plot.status, PlotStatus::Inactive);
        assert_eq!(plot.battery, 100);

        clock.advance(Duration::minutes(1));
        let (plot, call) = room.trigger_emergency(plot.id).unwrap();
        assert_eq!(plot.status, PlotStatus::Emergency);
        assert_eq!(call.plot_id, plot.id);
        assert_eq!(call.call_type, CallType::Emergency);
        assert_eq!(call.created_at, clock.now());
        assert_eq!(room.list_calls(CallFilter::Unassigned), vec![call.clone()]);

        let assigned = room.assign_call(call.id, e1.id).unwrap();
        assert_eq!(assigned.assigned_employee, Some(e1.id));
        assert!(room.list_calls(CallFilter::Unassigned).is_empty());
        assert_eq!(room.list_calls(CallFilter::Assigned).len(), 1);

        clock.advance(Duration::minutes(14));
        let plot = room.resolve_call(plot.id).unwrap();
        assert_eq!(plot.status, PlotStatus::Active);
        assert!(room.list_calls(CallFilter::All).is_empty());

        let actions: Vec<_> = room
            .history(plot.id, 0, 10)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec!["End of alert", "Emergency call dispatched", "Plot created"]
        );
    }

    #[test]
    fn simulate_resolution_collapses_mixed_incidents() {
        let (room, _) = room_with(ScriptedRandom::new());
        let e1 = room.add_employee("Petrov P.P.", Rank::Captain).unwrap();
        let plot = room.create_plot("A", "1").unwrap();
        room.set_armed(plot.id, true).unwrap();

        // Automatic alarm, then an operator emergency on the same plot.
        let (_, auto_call) = room.scheduler().alarm_tick().unwrap().unwrap();
        let (_, manual_call) = room.trigger_emergency(plot.id).unwrap();
        assert_eq!(auto_call.call_type, CallType::Alarm);
        room.assign_call(manual_call.id, e1.id).unwrap();
        assert_eq!(room.list_calls(CallFilter::All).len(), 2);

        room.resolve_call(plot.id).unwrap();
        assert!(room.list_calls(CallFilter::All).is_empty());
        assert_eq!(room.get_plot(plot.id).unwrap().status, PlotStatus::Active);
    }

    #[test]
    fn simulate_emergency_survives_status_overrides() {
        let (room, _) = room_with(ScriptedRandom::new());
        let plot = room.create_plot("A", "1").unwrap();
        room.add_custom_status("Patrol", "#8B5CF6").unwrap();
        room.trigger_emergency(plot.id).unwrap();

        assert!(matches!(
            room.set_custom_status(plot.id, "X", "#000000"),
            Err(DispatchError::Conflict { .. })
        ));
        assert!(matches!(
            room.apply_custom_status(plot.id, "Patrol"),
            Err(DispatchError::Conflict { .. })
        ));
        assert!(matches!(
            room.set_armed(plot.id, true),
            Err(DispatchError::Conflict { .. })
        ));
        let results = room.disarm_many(&[plot.id]);
        assert!(matches!(results[0].1, Err(DispatchError::Conflict { .. })));

        // Still in emergency with its call, so the scheduler has nothing to pick.
        assert_eq!(room.get_plot(plot.id).unwrap().status, PlotStatus::Emergency);
        assert_eq!(room.list_calls(CallFilter::All).len(), 1);
        assert!(room.scheduler().alarm_tick().unwrap().is_none());

        room.resolve_call(plot.id).unwrap();
        assert_eq!(room.apply_custom_status(plot.id, "Patrol").unwrap().status.label(), "Patrol");
    }

    #[test]
    fn simulate_drift_then_charge() {
        let (room, _) = room_with(ScriptedRandom::new().with_drifts([2, 2]));
        let plot = room.create_plot("A", "1").unwrap();
        room.set_armed(plot.id, true).unwrap();
        room.discharge_battery(plot.id).unwrap();
        room.discharge_battery(plot.id).unwrap();
        assert_eq!(room.get_plot(plot.id).unwrap().status, PlotStatus::Active);

        room.scheduler().drift_tick();
        let drained = room.get_plot(plot.id).unwrap();
        assert_eq!(drained.battery, 0);
        assert_eq!(drained.status, PlotStatus::LowBattery);

        // Low battery blocks toggling until charged.
        assert!(matches!(
            room.toggle_plot(plot.id),
            Err(DispatchError::Conflict { .. })
        ));
        let charged = room.charge_battery(plot.id).unwrap();
        assert_eq!(charged.battery, 100);
        assert_eq!(charged.status, PlotStatus::Active);
        assert_eq!(room.toggle_plot(plot.id).unwrap().status, PlotStatus::Inactive);
    }

    #[test]
    fn simulate_default_listing_order() {
        let (room, _) = room_with(ScriptedRandom::new().with_drifts([0, 0, 0, 0]));
        for i in 1..=4 {
            room.create_plot(&format!("{i} Guard Street"), "+70000000000").unwrap();
        }
        room.set_armed(1, true).unwrap();
        room.set_armed(3, true).unwrap();
        room.set_armed(4, true).unwrap();
        room.trigger_emergency(2).unwrap();
        room.registry()
            .mutate(3, |plot, _| {
                plot.battery = 20;
                Ok(())
            })
            .unwrap();
        room.scheduler().drift_tick();

        let ids: Vec<_> = room
            .list_plots(PlotSort::Priority)
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![2, 3, 1, 4]);
    }

    #[test]
    fn simulate_concurrent_operators_and_scheduler() {
        let (room, _) = room_with(ScriptedRandom::new().with_drifts(std::iter::repeat(1).take(4000)));
        let room = Arc::new(room);
        for i in 0..20 {
            let plot = room.create_plot(&format!("{i} Guard Street"), "+70000000000").unwrap();
            room.set_armed(plot.id, true).unwrap();
        }

        let mut workers = Vec::new();
        {
            let room = Arc::clone(&room);
            workers.push(thread::spawn(move || {
                for _ in 0..100 {
                    room.scheduler().drift_tick();
                    let _ = room.scheduler().alarm_tick();
                }
            }));
        }
        for offset in 0..4u64 {
            let room = Arc::clone(&room);
            workers.push(thread::spawn(move || {
                for round in 0..200u64 {
                    let id = (round + offset) % 20 + 1;
                    match round % 4 {
                        0 => {
                            let _ = room.toggle_plot(id);
                        }
                        1 => {
                            let _ = room.trigger_emergency(id);
                        }
                        2 => {
                            let _ = room.charge_battery(id);
                        }
                        _ => {
                            let _ = room.resolve_call(id);
                        }
                    }
                }
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }

        for plot in room.list_plots(PlotSort::Id) {
            assert!(plot.battery <= 100);
            let open = room
                .list_calls(CallFilter::All)
                .into_iter()
                .filter(|c| c.plot_id == plot.id)
                .count();
            // A plot with open calls is always in emergency.
            if open > 0 {
                assert_eq!(plot.status, PlotStatus::Emergency, "plot {}", plot.id);
            }
        }
    }
}
