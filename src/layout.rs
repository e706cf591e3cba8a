//! Per-mode layout pipeline
//!
//! One call turns a set of records into final positions for one chart mode:
//! lanes (by-city only), nodes, simulation, rounding. Modes never share state,
//! so callers may run them on separate threads.

use std::fmt;

use tracing::{debug, info};

use crate::codec::PositionRecord;
use crate::config::{LayoutConfig, Margin};
use crate::error::{LayoutError, LayoutResult};
use crate::lanes::LaneLayout;
use crate::model::EventRecord;
use crate::nodes::NodeBuilder;
use crate::scale::TimeScale;
use crate::simulation::{RunMode, Simulation, SimulationConfig};

/// Chart mode, one artifact section each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutMode {
    /// Every event on one timeline
    All,
    /// One horizontal lane per city
    ByCity,
}

impl LayoutMode {
    pub const ALL: [LayoutMode; 2] = [LayoutMode::All, LayoutMode::ByCity];

    /// Key of this mode in the artifact
    pub fn key(self) -> &'static str {
        match self {
            LayoutMode::All => "all",
            LayoutMode::ByCity => "byCity",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.key() == key)
    }

    pub fn uses_lanes(self) -> bool {
        matches!(self, LayoutMode::ByCity)
    }

    pub fn margin(self, config: &LayoutConfig) -> Margin {
        match self {
            LayoutMode::All => config.margins.all,
            LayoutMode::ByCity => config.margins.by_city,
        }
    }

    /// Force parameters for this mode with the configured cooling schedule
    pub fn simulation_config(self, config: &LayoutConfig) -> SimulationConfig {
        let base = if self.uses_lanes() {
            SimulationConfig::lanes()
        } else {
            SimulationConfig::free()
        };
        SimulationConfig {
            alpha_min: config.alpha_min,
            alpha_decay: config.effective_alpha_decay(),
            ..base
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Lay out `records` for one mode. Output follows record order.
///
/// `progress` receives `(ticks_done, ticks_planned)` after every tick.
pub fn compute_positions(
    records: &[&EventRecord],
    mode: LayoutMode,
    config: &LayoutConfig,
    run: RunMode,
    progress: impl FnMut(usize, usize),
) -> LayoutResult<Vec<PositionRecord>> {
    config.validate()?;
    let area = config.plot_area(&mode.margin(config));
    let (first_day, last_day) = match (config.year_range.first_day(), config.year_range.last_day()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(LayoutError::InvalidYearRange {
                start: config.year_range.start,
                end: config.year_range.end,
            });
        }
    };
    let time = TimeScale::new(first_day, last_day, area.left, area.right);
    let builder = NodeBuilder::new(time, config.radius, area.band());

    let lanes = if mode.uses_lanes() {
        let lanes = LaneLayout::allocate(
            records.iter().filter_map(|record| record.city.as_deref()),
            area.band(),
        )?;
        lanes.ensure_fits(config.radius.min)?;
        debug!(mode = %mode, lanes = lanes.len(), lane_height = lanes.lane_height(), "Allocated lanes");
        Some(lanes)
    } else {
        None
    };
    let builder = match &lanes {
        Some(lanes) => builder.with_lanes(lanes),
        None => builder,
    };

    let nodes = builder.build(records.iter().copied());
    let mut simulation = Simulation::new(nodes, mode.simulation_config(config))?;
    let ticks = simulation.run_with_progress(run, progress);
    info!(mode = %mode, nodes = simulation.nodes().len(), ticks, "Layout finished");

    Ok(simulation
        .nodes()
        .iter()
        .map(PositionRecord::from_node)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Canvas;
    use crate::model::Band;
    use chrono::NaiveDate;

    fn event(id: u64, date: (i32, u32, u32), city: Option<&str>, participants: Option<f64>) -> EventRecord {
        EventRecord {
            id,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            city: city.map(str::to_string),
            participants_registered: participants,
        }
    }

    fn run(records: &[EventRecord], mode: LayoutMode) -> LayoutResult<Vec<PositionRecord>> {
        let refs: Vec<&EventRecord> = records.iter().collect();
        compute_positions(&refs, mode, &LayoutConfig::default(), RunMode::Precompute, |_, _| {})
    }

    #[test]
    fn mode_keys_round_trip() {
        for mode in LayoutMode::ALL {
            assert_eq!(LayoutMode::from_key(mode.key()), Some(mode));
        }
        assert_eq!(LayoutMode::from_key("city"), None);
        assert_eq!(LayoutMode::ByCity.to_string(), "byCity");
    }

    #[test]
    fn three_events_keep_date_order_inside_viewport() {
        let records = vec![
            event(1, (2012, 1, 1), None, Some(100.0)),
            event(2, (2018, 6, 1), None, Some(100.0)),
            event(3, (2024, 12, 31), None, Some(100.0)),
        ];
        let positions = run(&records, LayoutMode::All).unwrap();

        assert_eq!(positions.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(positions[0].x < positions[1].x && positions[1].x < positions[2].x);
        for p in &positions {
            assert_eq!(p.r, 2.5);
            assert!(p.y - p.r >= 0.0 && p.y + p.r <= 600.0);
            assert!(p.y - p.r >= 50.0 && p.y + p.r <= 560.0);
        }
        assert!((positions[0].x - 20.0).abs() < 1.0);
        assert!((positions[2].x - 1380.0).abs() < 1.0);
    }

    #[test]
    fn by_city_nodes_stay_in_their_lane() {
        let cities = ["Accra", "Berlin", "Lima"];
        let records: Vec<EventRecord> = (0..90)
            .map(|i| {
                event(
                    i,
                    (2016, 1 + (i % 12) as u32, 1 + (i % 28) as u32),
                    Some(cities[(i % 3) as usize]),
                    Some(50.0 + i as f64 * 40.0),
                )
            })
            .collect();
        let positions = run(&records, LayoutMode::ByCity).unwrap();

        let lanes = LaneLayout::allocate(cities, Band::new(50.0, 560.0)).unwrap();
        for (record, position) in records.iter().zip(&positions) {
            let lane = lanes.position(record.city.as_deref().unwrap()).unwrap();
            let band = lanes.get(lane).unwrap().band();
            assert!(
                band.contains_circle(position.y, position.r, 1e-9),
                "event {} at y={} r={} escaped {:?}",
                record.id,
                position.y,
                position.r,
                band
            );
            assert!(position.x >= 120.0 - 20.0);
        }
    }

    #[test]
    fn by_city_without_cities_fails_fast() {
        let records = vec![event(1, (2020, 1, 1), None, None)];
        assert_eq!(run(&records, LayoutMode::ByCity), Err(LayoutError::NoLanes));
        assert_eq!(run(&[], LayoutMode::ByCity), Err(LayoutError::NoLanes));
    }

    #[test]
    fn empty_input_in_free_mode_is_empty() {
        assert_eq!(run(&[], LayoutMode::All), Ok(Vec::new()));
    }

    fn run_with(config: &LayoutConfig, records: &[EventRecord], mode: LayoutMode) -> LayoutResult<Vec<PositionRecord>> {
        let refs: Vec<&EventRecord> = records.iter().collect();
        compute_positions(&refs, mode, config, RunMode::Precompute, |_, _| {})
    }

    fn one_per_city(count: u64, participants: f64) -> Vec<EventRecord> {
        (0..count)
            .map(|i| event(i, (2020, 1, 1), Some(&format!("city-{i:02}")), Some(participants)))
            .collect()
    }

    #[test]
    fn eighteen_cities_fit_the_default_canvas() {
        // 510 / 18 = 28.33px lanes, thinner than a 30px bubble
        let mut records = one_per_city(18, 100.0);
        records.extend((18..36).map(|i| {
            event(i, (2020, 1, 1), Some(&format!("city-{:02}", i - 18)), Some(1e9))
        }));
        let positions = run(&records, LayoutMode::ByCity).unwrap();
        assert_eq!(positions.len(), 36);

        let lanes = LaneLayout::allocate(
            records.iter().filter_map(|r| r.city.as_deref()),
            Band::new(50.0, 560.0),
        )
        .unwrap();
        for (record, position) in records.iter().zip(&positions) {
            let band = lanes
                .get(lanes.position(record.city.as_deref().unwrap()).unwrap())
                .unwrap()
                .band();
            assert!(band.contains_circle(position.y, position.r, 1e-9));
            assert!(position.r >= 2.5 && position.r <= 14.15, "radius {}", position.r);
        }
        assert_eq!(positions[0].r, 2.5);
        assert_eq!(positions[18].r, 14.15);
    }

    #[test]
    fn lanes_thinner_than_smallest_bubble_fail() {
        // 510 / 150 = 3.4px lanes cannot hold r = 2.5
        let records = one_per_city(150, 100.0);
        assert!(matches!(
            run(&records, LayoutMode::ByCity),
            Err(LayoutError::LaneTooThin { diameter, .. }) if diameter == 5.0
        ));
    }

    #[test]
    fn short_canvas_shrinks_bubbles_into_the_viewport() {
        // default margins leave a 10px band on a 100px canvas
        let config = LayoutConfig {
            canvas: Canvas { width: 1400, height: 100 },
            ..LayoutConfig::default()
        };
        let records = vec![event(1, (2018, 1, 1), None, Some(1e9))];
        let positions = run_with(&config, &records, LayoutMode::All).unwrap();
        assert_eq!(positions[0].r, 4.99);
        assert!(Band::new(50.0, 60.0).contains_circle(positions[0].y, positions[0].r, 1e-9));

        let config = LayoutConfig {
            canvas: Canvas { width: 1400, height: 94 },
            ..LayoutConfig::default()
        };
        assert!(matches!(
            run_with(&config, &records, LayoutMode::All),
            Err(LayoutError::InvalidCanvas { .. })
        ));
    }

    #[test]
    fn preview_respects_tick_budget() {
        let records = vec![event(1, (2015, 5, 5), None, None), event(2, (2015, 5, 5), None, None)];
        let refs: Vec<&EventRecord> = records.iter().collect();
        let mut last = (0, 0);
        compute_positions(
            &refs,
            LayoutMode::All,
            &LayoutConfig::default(),
            RunMode::Preview { ticks: 7 },
            |done, total| last = (done, total),
        )
        .unwrap();
        assert_eq!(last, (7, 7));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let records: Vec<EventRecord> = (0..50)
            .map(|i| event(i, (2019, 3, 1 + (i % 5) as u32), Some("Oslo"), Some(i as f64 * 10.0)))
            .collect();
        assert_eq!(run(&records, LayoutMode::All), run(&records, LayoutMode::All));
        assert_eq!(run(&records, LayoutMode::ByCity), run(&records, LayoutMode::ByCity));
    }
}
