//! Configuration parsing for the headless streaming demo.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use voxel_stream::{BoundaryRule, MeshMode, StreamConfig, WorldParams};

/// Root configuration: `[world]`, `[stream]` and `[simulation]` tables.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	pub world: WorldSection,
	pub stream: StreamSection,
	pub simulation: SimulationSection,
}

/// Terrain generation parameters.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldSection {
	pub seed: u32,
	pub terrain_height: f64,
	pub terrain_frequency: f64,
	pub cave_frequency: f64,
	pub cave_threshold: f64,
	pub octaves: usize,
	pub flat_world: bool,
}

impl Default for WorldSection {
	fn default() -> Self {
		let params = WorldParams::default();
		Self {
			seed: params.seed,
			terrain_height: params.terrain_height,
			terrain_frequency: params.terrain_frequency,
			cave_frequency: params.cave_frequency,
			cave_threshold: params.cave_threshold,
			octaves: params.octaves,
			flat_world: params.flat_world,
		}
	}
}

impl WorldSection {
	pub fn params(&self) -> WorldParams {
		WorldParams {
			seed: self.seed,
			terrain_height: self.terrain_height,
			terrain_frequency: self.terrain_frequency,
			cave_frequency: self.cave_frequency,
			cave_threshold: self.cave_threshold,
			octaves: self.octaves,
			flat_world: self.flat_world,
		}
	}
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshModeSetting {
	#[default]
	Greedy,
	Naive,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryRuleSetting {
	#[default]
	Solid,
	Empty,
}

/// Streaming parameters, fixed for the run.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamSection {
	pub lod_radius: u32,
	pub max_lod: u32,
	pub voxel_size: f64,
	/// Worker threads; absent means one per hardware thread.
	pub workers: Option<usize>,
	pub mesh_mode: MeshModeSetting,
	pub boundary_rule: BoundaryRuleSetting,
	pub region_capacity: usize,
}

impl Default for StreamSection {
	fn default() -> Self {
		let config = StreamConfig::default();
		Self {
			lod_radius: config.lod_radius,
			max_lod: config.max_lod,
			voxel_size: config.voxel_size,
			workers: config.worker_count,
			mesh_mode: MeshModeSetting::default(),
			boundary_rule: BoundaryRuleSetting::default(),
			region_capacity: config.region_capacity,
		}
	}
}

impl StreamSection {
	pub fn stream_config(&self) -> StreamConfig {
		StreamConfig {
			lod_radius: self.lod_radius,
			max_lod: self.max_lod,
			voxel_size: self.voxel_size,
			worker_count: self.workers,
			mesh_mode: match self.mesh_mode {
				MeshModeSetting::Greedy => MeshMode::Greedy,
				MeshModeSetting::Naive => MeshMode::Naive,
			},
			boundary_rule: match self.boundary_rule {
				BoundaryRuleSetting::Solid => BoundaryRule::Solid,
				BoundaryRuleSetting::Empty => BoundaryRule::Empty,
			},
			region_capacity: self.region_capacity,
		}
	}
}

/// Scripted run: observer flight, box drop, parameter swap.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSection {
	pub ticks: usize,
	/// Seconds per tick.
	pub dt: f64,
	pub observer_height: f64,
	/// Observer speed along +X, world units per second.
	pub observer_speed: f64,
	/// Drop height of the test box above the origin.
	pub box_drop_height: f64,
	/// Tick at which the world is regenerated with `swap_seed`. None: never.
	pub swap_at_tick: Option<usize>,
	pub swap_seed: u32,
	/// Log statistics every this many ticks.
	pub log_every: usize,
}

impl Default for SimulationSection {
	fn default() -> Self {
		Self {
			ticks: 600,
			dt: 1.0 / 60.0,
			observer_height: 64.0,
			observer_speed: 12.0,
			box_drop_height: 80.0,
			swap_at_tick: None,
			swap_seed: 42,
			log_every: 60,
		}
	}
}

impl Config {
	/// Load configuration from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		Self::parse(&content)
	}

	pub fn parse(content: &str) -> Result<Self> {
		let config: Config = toml::from_str(content).context("Failed to parse config TOML")?;

		if !(config.simulation.dt > 0.0 && config.simulation.dt.is_finite()) {
			anyhow::bail!("simulation.dt must be positive, got {}", config.simulation.dt);
		}
		if config.simulation.log_every == 0 {
			anyhow::bail!("simulation.log_every must be at least 1");
		}
		config
			.world
			.params()
			.validate()
			.context("Invalid [world] section")?;
		config
			.stream
			.stream_config()
			.validate()
			.context("Invalid [stream] section")?;

		Ok(config)
	}
}
