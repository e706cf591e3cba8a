//! Force-directed layout simulation
//!
//! Runs a deterministic particle simulation over an exclusively owned node
//! buffer. Every tick decays `alpha`, lets four forces add velocity
//! (x attraction, y attraction, collision, charge), damps velocity and
//! integrates positions. After the loop each node is clamped into its band.
//!
//! The number of ticks for a full run is derived from the decay schedule,
//! `ceil(ln(alpha_min) / ln(1 - alpha_decay))`, so identical parameters
//! always produce identical iteration counts and identical output.

mod forces;
mod quadtree;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LayoutError, LayoutResult};
use crate::model::Node;

use forces::{ChargeParams, CollideParams};

/// Configuration for the force simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Pull toward the time-axis target
    pub x_strength: f64,
    /// Pull toward the lane or viewport center
    pub y_strength: f64,
    /// Extra margin added to every radius for collision
    pub collide_padding: f64,
    /// Fraction of an overlap corrected per pass
    pub collide_strength: f64,
    /// Collision passes per tick
    pub collide_iterations: usize,
    /// Per-node charge (negative = repulsion)
    pub charge_strength: f64,
    /// Barnes-Hut opening criterion
    pub charge_theta: f64,
    /// Distances below this are softened
    pub charge_distance_min: f64,
    /// Nodes farther apart than this do not repel
    pub charge_distance_max: f64,
    /// Fraction of velocity removed each tick
    pub velocity_decay: f64,
    /// Alpha at which the simulation counts as cooled
    pub alpha_min: f64,
    /// Per-tick alpha decay rate
    pub alpha_decay: f64,
    /// Value alpha decays toward
    pub alpha_target: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let alpha_min = 0.001;
        Self {
            x_strength: 1.0,
            y_strength: 0.02,
            collide_padding: 0.8,
            collide_strength: 0.9,
            collide_iterations: 3,
            charge_strength: -1.0,
            charge_theta: 0.9,
            charge_distance_min: 1.0,
            charge_distance_max: 50.0,
            velocity_decay: 0.3,
            alpha_min,
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            alpha_target: 0.0,
        }
    }
}

impl SimulationConfig {
    /// Gentle centering that lets bubbles scatter organically
    pub fn free() -> Self {
        Self::default()
    }

    /// Tight packing that keeps bubbles inside thin lanes
    pub fn lanes() -> Self {
        Self {
            y_strength: 0.2,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> LayoutResult<()> {
        let finite = [
            ("x_strength", self.x_strength),
            ("y_strength", self.y_strength),
            ("collide_padding", self.collide_padding),
            ("collide_strength", self.collide_strength),
            ("charge_strength", self.charge_strength),
            ("alpha_target", self.alpha_target),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(LayoutError::InvalidForceConfig(format!(
                "{name} must be finite, got {value}"
            )));
        }
        if !(0.0..=1.0).contains(&self.velocity_decay) {
            return Err(LayoutError::InvalidForceConfig(format!(
                "velocity_decay must be in [0, 1], got {}",
                self.velocity_decay
            )));
        }
        if !(self.alpha_decay > 0.0 && self.alpha_decay < 1.0) {
            return Err(LayoutError::InvalidForceConfig(format!(
                "alpha_decay must be in (0, 1), got {}",
                self.alpha_decay
            )));
        }
        if !(self.alpha_min > 0.0 && self.alpha_min < 1.0) {
            return Err(LayoutError::InvalidForceConfig(format!(
                "alpha_min must be in (0, 1), got {}",
                self.alpha_min
            )));
        }
        if !(self.charge_theta > 0.0 && self.charge_theta.is_finite()) {
            return Err(LayoutError::InvalidForceConfig(format!(
                "charge_theta must be positive, got {}",
                self.charge_theta
            )));
        }
        if !(self.charge_distance_min >= 0.0
            && self.charge_distance_max.is_finite()
            && self.charge_distance_max > self.charge_distance_min)
        {
            return Err(LayoutError::InvalidForceConfig(format!(
                "charge distances must satisfy 0 <= min < max, got {}..{}",
                self.charge_distance_min, self.charge_distance_max
            )));
        }
        Ok(())
    }

    /// Ticks needed for alpha to cool from 1 to `alpha_min`
    pub fn iterations(&self) -> usize {
        iterations_for(self.alpha_min, self.alpha_decay)
    }

    fn collide_params(&self) -> CollideParams {
        CollideParams {
            padding: self.collide_padding,
            strength: self.collide_strength,
            iterations: self.collide_iterations,
        }
    }

    fn charge_params(&self) -> ChargeParams {
        ChargeParams {
            strength: self.charge_strength,
            theta: self.charge_theta,
            distance_min: self.charge_distance_min,
            distance_max: self.charge_distance_max,
        }
    }
}

/// `ceil(ln(alpha_min) / ln(1 - alpha_decay))`
pub fn iterations_for(alpha_min: f64, alpha_decay: f64) -> usize {
    (alpha_min.ln() / (1.0 - alpha_decay).ln()).ceil() as usize
}

/// How long to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Full run with the analytic tick count, for the precomputed artifact
    Precompute,
    /// Fixed small tick budget for interactive use. The budget doubles as the
    /// cancellation point: the run stops after `ticks` no matter the alpha.
    Preview { ticks: usize },
}

/// CPU force simulation over one exclusively owned node buffer
#[derive(Debug, Clone)]
pub struct Simulation {
    nodes: Vec<Node>,
    config: SimulationConfig,
    alpha: f64,
    ticks: usize,
}

impl Simulation {
    /// Take ownership of `nodes`. Fails on invalid parameters or radii.
    pub fn new(nodes: Vec<Node>, config: SimulationConfig) -> LayoutResult<Self> {
        config.validate()?;
        if let Some(node) = nodes
            .iter()
            .find(|n| !(n.radius.is_finite() && n.radius > 0.0))
        {
            return Err(LayoutError::InvalidNodeRadius {
                id: node.id,
                radius: node.radius,
            });
        }
        Ok(Self {
            nodes,
            config,
            alpha: 1.0,
            ticks: 0,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Ticks run so far
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// Whether alpha is still above `alpha_min`
    pub fn is_running(&self) -> bool {
        self.alpha >= self.config.alpha_min
    }

    /// Ticks a run in `mode` will perform. Zero for an empty node set.
    pub fn planned_ticks(&self, mode: RunMode) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        match mode {
            RunMode::Precompute => self.config.iterations(),
            RunMode::Preview { ticks } => ticks,
        }
    }

    /// Advance the simulation by one step
    pub fn tick(&mut self) {
        self.alpha += (self.config.alpha_target - self.alpha) * self.config.alpha_decay;
        let alpha = self.alpha;

        forces::attract_x(&mut self.nodes, self.config.x_strength, alpha);
        forces::attract_y(&mut self.nodes, self.config.y_strength, alpha);
        forces::collide(&mut self.nodes, self.config.collide_params());
        forces::charge(&mut self.nodes, self.config.charge_params(), alpha);

        let keep = 1.0 - self.config.velocity_decay;
        for node in &mut self.nodes {
            node.vx *= keep;
            node.vy *= keep;
            node.x += node.vx;
            node.y += node.vy;
        }
        self.ticks += 1;
    }

    /// Run to completion for `mode`, then clamp into bands
    pub fn run(&mut self, mode: RunMode) -> usize {
        self.run_with_progress(mode, |_, _| {})
    }

    /// Like [`Simulation::run`], calling `progress(done, total)` after each tick
    pub fn run_with_progress(&mut self, mode: RunMode, mut progress: impl FnMut(usize, usize)) -> usize {
        let total = self.planned_ticks(mode);
        for done in 1..=total {
            self.tick();
            progress(done, total);
        }
        self.clamp_to_bands();
        debug!(
            nodes = self.nodes.len(),
            ticks = total,
            alpha = self.alpha,
            cooled = !self.is_running(),
            "simulation finished"
        );
        total
    }

    /// Force every circle fully inside its band
    pub fn clamp_to_bands(&mut self) {
        for node in &mut self.nodes {
            node.y = node.band.clamp_circle(node.y, node.radius);
        }
    }
}
