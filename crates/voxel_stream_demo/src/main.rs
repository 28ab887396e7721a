//! Headless voxel streaming driver.
//!
//! Flies an observer across the terrain, drops a box at the origin, swaps the
//! world parameters mid-run and logs what the streaming core is doing:
//!
//! - Region counts per LOD, pending jobs and vertex totals every few ticks
//! - where the box comes to rest
//! - a ray cast straight down from the observer, and a voxel deleted there

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use glam::DVec3;
use std::path::PathBuf;
use voxel_stream::{BoxCollider, HeadlessSink, VoxelWorld, WorldStats};

use config::Config;

/// Headless driver for the voxel streaming core.
#[derive(Parser, Debug)]
#[command(name = "voxel_stream_demo")]
#[command(about = "Streams a voxel world around a scripted observer")]
struct Args {
	/// Path to configuration TOML file.
	#[arg(short, long, default_value = "demo.toml")]
	config: PathBuf,

	/// Override `simulation.ticks`.
	#[arg(short, long)]
	ticks: Option<usize>,

	/// More log output (-v debug, -vv trace). RUST_LOG wins when set.
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbose: u8,
}

fn main() -> Result<()> {
	let args = Args::parse();

	let level = match args.verbose {
		0 => "info",
		1 => "debug",
		_ => "trace",
	};
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

	let config = Config::load(&args.config)?;
	let sim = &config.simulation;
	let ticks = args.ticks.unwrap_or(sim.ticks);

	let mut world = VoxelWorld::new(config.stream.stream_config(), config.world.params())
		.context("Failed to create world")?;
	let mut sink = HeadlessSink::default();
	log::info!(
		"world {} streaming for {} ticks with {} workers",
		world.id().raw(),
		ticks,
		world.scheduler().worker_count()
	);

	let drop_point = DVec3::new(0.5, sim.box_drop_height, 0.5);
	let mut collider = BoxCollider::new(drop_point, DVec3::ONE);
	let mut landed = false;

	for tick in 0..ticks {
		let time = tick as f64 * sim.dt;
		let observer = DVec3::new(time * sim.observer_speed, sim.observer_height, 0.0);

		if sim.swap_at_tick == Some(tick) {
			let mut params = world.params().clone();
			params.seed = sim.swap_seed;
			log::info!("tick {}: regenerating with seed {}", tick, params.seed);
			world.set_params(params).context("Failed to swap world parameters")?;
			collider = BoxCollider::new(drop_point, DVec3::ONE);
			landed = false;
		}

		world.tick(observer, &mut sink)?;

		match world.move_box(&mut collider, sim.dt) {
			Ok(_) if collider.is_grounded() && !landed => {
				landed = true;
				log::info!("tick {}: box landed at {:.3}", tick, collider.center);
			}
			Ok(_) => {}
			// Not resolved at full detail yet: the box waits.
			Err(err) => log::trace!("tick {}: box frozen: {}", tick, err),
		}

		if cfg!(debug_assertions) {
			let errors = world.octree().validate();
			if !errors.is_empty() {
				anyhow::bail!("tick {}: octree invariants broken: {:?}", tick, errors);
			}
		}

		if tick % sim.log_every == 0 {
			log_stats(tick, &world.stats(), &sink);
		}
	}

	let observer = DVec3::new(ticks as f64 * sim.dt * sim.observer_speed, sim.observer_height, 0.0);
	let settled = world.run_until_idle(observer, &mut sink, 1024)?;
	log::info!("final state (settled: {})", settled);
	log_stats(ticks, &world.stats(), &sink);

	match world.raycast(observer, DVec3::NEG_Y, 4.0 * sim.observer_height) {
		Some(hit) => {
			log::info!(
				"ray from {:.1} hit {:?} at voxel {} after {:.2}",
				observer,
				hit.material,
				hit.voxel,
				hit.distance
			);
			let center = (hit.voxel.as_dvec3() + DVec3::splat(0.5)) * world.config().voxel_size;
			let removed = world.delete_voxel(center)?;
			world.tick(observer, &mut sink)?;
			log::info!("deleted {:?} voxel {}", removed, hit.voxel);
		}
		None => log::info!("ray from {:.1} hit nothing resolved", observer),
	}

	#[cfg(feature = "metrics")]
	{
		let metrics = world.metrics();
		log::info!(
			"avg tick {:.0}us (peak {}us), volume {:.0}us, mesh {:.0}us, {} uploads",
			metrics.avg_tick_timing_us(),
			metrics.tick_timings.peak().unwrap_or(0),
			metrics.avg_volume_timing_us(),
			metrics.avg_mesh_timing_us(),
			metrics.total_uploads
		);
	}

	Ok(())
}

fn log_stats(tick: usize, stats: &WorldStats, sink: &HeadlessSink) {
	log::info!(
		"tick {}: resident per lod {:?}, {} live, {} pending jobs, {} vertices, {} buffers",
		tick,
		stats.resident_per_lod,
		stats.live_regions,
		stats.pending_jobs,
		stats.vertex_count,
		sink.buffers.len()
	);
	log::debug!(
		"tick {}: {} created, {} freed, {} collapses deferred, {} nodes",
		tick,
		stats.tree.regions_created,
		stats.tree.regions_freed,
		stats.tree.collapses_deferred,
		stats.nodes
	);
}
