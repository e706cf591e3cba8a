//! Builds simulation nodes from event records

use tracing::warn;

use crate::lanes::LaneLayout;
use crate::model::{Band, EventRecord, Node};
use crate::scale::{RadiusScale, TimeScale};

/// Maps records to nodes resting on their targets
#[derive(Debug, Clone)]
pub struct NodeBuilder<'a> {
    time: TimeScale,
    radius: RadiusScale,
    viewport: Band,
    lanes: Option<&'a LaneLayout>,
}

impl<'a> NodeBuilder<'a> {
    /// Builder for free mode: every node targets the viewport center
    pub fn new(time: TimeScale, radius: RadiusScale, viewport: Band) -> Self {
        Self {
            time,
            radius,
            viewport,
            lanes: None,
        }
    }

    /// Switch to lane mode: nodes target the center of their city's lane
    pub fn with_lanes(mut self, lanes: &'a LaneLayout) -> Self {
        self.lanes = Some(lanes);
        self
    }

    /// Create one node per record, in record order
    pub fn build<'r, I>(&self, records: I) -> Vec<Node>
    where
        I: IntoIterator<Item = &'r EventRecord>,
    {
        records
            .into_iter()
            .map(|record| self.build_node(record))
            .collect()
    }

    fn build_node(&self, record: &EventRecord) -> Node {
        let target_x = self.time.apply(record.date);
        let (lane, target_y, band) = self.band_for(record);

        // Bubbles larger than their band shrink to the largest radius that fits
        let radius = self
            .radius
            .radius(record.participants_registered)
            .min(band.fitting_radius());

        let mut node = Node::at_target(record.id, radius, target_x, target_y, band);
        node.lane = lane;
        node
    }

    /// Lane index, target y and band a record is confined to
    fn band_for(&self, record: &EventRecord) -> (Option<usize>, f64, Band) {
        let Some(lanes) = self.lanes else {
            return (None, self.viewport.center(), self.viewport);
        };

        let lane = record
            .city
            .as_deref()
            .and_then(|city| lanes.position(city))
            .and_then(|index| lanes.get(index).map(|lane| (index, lane)));
        match lane {
            Some((index, lane)) => (Some(index), lane.y_center, lane.band()),
            None => {
                warn!(
                    id = record.id,
                    city = record.city.as_deref().unwrap_or("<none>"),
                    "no lane for record, placing it at the viewport center"
                );
                (None, self.viewport.center(), self.viewport)
            }
        }
    }
}
