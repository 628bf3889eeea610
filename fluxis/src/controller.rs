//! Incremental stepping driven by a per-call time budget.
//!
//! A [`StepController`] owns a field and advances it one generation at a
//! time without ever blocking the caller for longer than it asked for.
//! `begin_step` freezes the cells into a snapshot and queues the field's
//! tiles in Morton order; each `tick` drains tiles from the queue until its
//! microsecond budget runs out; when the queue empties the accumulated
//! destination is validated and swapped in as the next generation.
//!
//! The caller observes an all-or-nothing world: between `begin_step` and the
//! final `tick` the field reads exactly as it did before the step, and the
//! commit lands atomically within one `tick` call. Because every tile reads
//! the immutable snapshot and accumulation commutes, finishing a generation
//! in one blocking call, in hundreds of budgeted ticks, or across a worker
//! pool produces bit-identical cells.

use std::sync::atomic::AtomicI64;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use thiserror::Error;

use voxfield::{Field, FieldError};

use crate::flow;
use crate::tile::{process_tile, Tile, TileGrid};
use crate::trace::{IgnoreTraces, StepTraces};

/// Failures surfaced by [`StepController`] operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StepError {
	#[error(transparent)]
	Field(#[from] FieldError),

	#[error("a generation is already in progress")]
	AlreadyStepping,

	#[error("the field cannot be written while a generation is in progress")]
	BusyStepping,

	#[error("cell ({x}, {y}, {z}) accumulated to {value}, outside the cell range; generation aborted")]
	StabilityViolation { x: i16, y: i16, z: i16, value: i64 },
}

/// Outcome of one `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
	/// The generation committed (or no generation was in progress).
	Done,
	/// The budget ran out with tiles still queued.
	NotDone,
}

impl StepStatus {
	pub fn is_done(self) -> bool {
		self == StepStatus::Done
	}
}

/// State of one in-progress generation. Exists only between `begin_step` and
/// the `tick` that finishes the step.
#[derive(Debug)]
struct ActiveStep {
	/// Immutable copy of the cells as of `begin_step`. Every pair flow reads
	/// from here.
	snapshot: Vec<u32>,
	grid: TileGrid,
	/// Tiles still to process: `queue[cursor..]`.
	queue: Vec<Tile>,
	cursor: usize,
	/// When `begin_step` ran, for whole-generation trace durations.
	started: Instant,
}

/// Owns a field together with the machinery to step it incrementally.
///
/// Several controllers can exist side by side; nothing is shared between
/// them. Destroying a controller mid-step releases the snapshot and
/// destination along with the field.
#[derive(Debug)]
pub struct StepController {
	field: Field,
	/// Signed accumulation buffer, retained across generations to avoid
	/// reallocation and re-primed from the snapshot at every `begin_step`.
	dest: Vec<AtomicI64>,
	active: Option<ActiveStep>,
	/// Worker pool for processing tile batches; `None` means inline
	/// single-threaded processing.
	pool: Option<rayon::ThreadPool>,
	/// Tiles claimed per clock check: 1 inline, the thread count with a pool.
	batch: usize,
}

impl StepController {
	/// Creates an idle controller over a zeroed field.
	///
	/// `threads` is a hint: 0 and 1 both select inline processing, larger
	/// values build a worker pool of that size.
	pub fn new(
		width: i16, height: i16, depth: i16, diffusion_rate: u8, threads: u8,
	) -> Result<StepController, StepError> {
		let field = Field::new(width, height, depth, diffusion_rate)?;

		StepController::from_field(field, threads)
	}

	/// Wraps an existing field in a controller.
	pub fn from_field(field: Field, threads: u8) -> Result<StepController, StepError> {
		let dest = flow::destination_from(field.cells())?;

		let threads = (threads.max(1)) as usize;
		let pool = if threads > 1 {
			let pool = rayon::ThreadPoolBuilder::new()
				.num_threads(threads)
				.build()
				.map_err(|_| FieldError::AllocationFailure)?;

			Some(pool)
		} else {
			None
		};

		Ok(StepController { field, dest, active: None, pool, batch: threads })
	}

	/// Extracts the inner field, dropping any in-progress generation.
	pub fn into_field(self) -> Field {
		self.field
	}

	/// Read access to the owned field. During a step this is the pre-step
	/// state: the cells are only replaced when the generation commits, so
	/// mid-step reads are stable.
	pub fn field(&self) -> &Field {
		&self.field
	}

	/// Reads one cell (0 for out-of-bounds), including mid-step.
	pub fn get(&self, x: i16, y: i16, z: i16) -> u32 {
		self.field.get(x, y, z)
	}

	/// Writes one cell. Rejected with [`StepError::BusyStepping`] while a
	/// generation is in progress: the snapshot is already frozen, so the
	/// write could neither influence the step nor survive its commit.
	pub fn set(&mut self, x: i16, y: i16, z: i16, value: u32) -> Result<(), StepError> {
		if self.is_stepping() {
			return Err(StepError::BusyStepping);
		}

		self.field.set(x, y, z, value);
		Ok(())
	}

	pub fn generation(&self) -> u64 {
		self.field.generation()
	}

	pub fn is_stepping(&self) -> bool {
		self.active.is_some()
	}

	/// Tiles left in the current generation, or 0 when idle.
	pub fn tiles_remaining(&self) -> usize {
		self.active.as_ref().map_or(0, |step| step.queue.len() - step.cursor)
	}

	/// Bulk-writes a region; see [`Field::import_region`]. Rejected while
	/// stepping, like [`StepController::set`].
	pub fn import_region(
		&mut self, buf: &[u32], min: (i16, i16, i16), max: (i16, i16, i16),
	) -> Result<usize, StepError> {
		if self.is_stepping() {
			return Err(StepError::BusyStepping);
		}

		Ok(self.field.import_region(buf, min, max))
	}

	/// Bulk-reads a region; see [`Field::extract_region`]. Allowed mid-step
	/// and reads the stable pre-step state.
	pub fn extract_region(
		&self, buf: &mut [u32], min: (i16, i16, i16), max: (i16, i16, i16),
	) -> usize {
		self.field.extract_region(buf, min, max)
	}

	/// Starts a new generation: snapshots the cells, primes the destination
	/// and queues every tile in Morton order, with a [`StepTraces`]
	/// notification once the queue is built.
	pub fn begin_step_traced(&mut self, traces: &impl StepTraces) -> Result<(), StepError> {
		if self.active.is_some() {
			return Err(StepError::AlreadyStepping);
		}

		let mut snapshot = Vec::new();
		snapshot
			.try_reserve_exact(self.field.cells().len())
			.map_err(|_| FieldError::AllocationFailure)?;
		snapshot.extend_from_slice(self.field.cells());

		flow::reset_destination(&mut self.dest, &snapshot);

		let grid = TileGrid::new(self.field.extents());
		let queue = grid.morton_queue();

		traces.begin_step(self.field.generation() + 1, queue.len());

		self.active = Some(ActiveStep { snapshot, grid, queue, cursor: 0, started: Instant::now() });

		Ok(())
	}

	/// Starts a new generation: snapshots the cells, primes the destination
	/// and queues every tile in Morton order.
	///
	/// Fails with [`StepError::AlreadyStepping`] if a generation is in
	/// progress, and with an allocation failure if the snapshot cannot be
	/// reserved; in both cases the controller and field are unchanged.
	pub fn begin_step(&mut self) -> Result<(), StepError> {
		self.begin_step_traced(&IgnoreTraces)
	}

	/// Processes queued tiles until the budget elapses or the queue drains,
	/// with [`StepTraces`] notifications.
	pub fn tick_traced(
		&mut self, budget_us: u64, traces: &impl StepTraces,
	) -> Result<StepStatus, StepError> {
		let start = Instant::now();
		// a budget too large to represent never expires
		let deadline = start.checked_add(Duration::from_micros(budget_us));

		let extents = self.field.extents();
		let rate = self.field.diffusion_rate();

		let mut processed = 0;

		loop {
			let step = match self.active.as_mut() {
				Some(step) => step,
				None => return Ok(StepStatus::Done),
			};

			let remaining = &step.queue[step.cursor..];
			let batch = &remaining[..self.batch.min(remaining.len())];

			match &self.pool {
				Some(pool) => {
					let snapshot = &step.snapshot;
					let grid = &step.grid;
					let dest = &self.dest;

					pool.install(|| {
						batch.par_iter().for_each(|&tile| {
							process_tile(snapshot, extents, rate, grid, tile, dest)
						})
					});
				}
				None => {
					for &tile in batch {
						process_tile(&step.snapshot, extents, rate, &step.grid, tile, &self.dest);
					}
				}
			}

			processed += batch.len();
			step.cursor += batch.len();

			if step.cursor == step.queue.len() {
				let started = step.started;

				return self.commit_step(traces, started);
			}

			if let Some(deadline) = deadline {
				if Instant::now() >= deadline {
					traces.tick(processed, self.tiles_remaining(), start.elapsed());

					return Ok(StepStatus::NotDone);
				}
			}
		}
	}

	/// Processes queued tiles until the budget elapses or the queue drains.
	///
	/// Whole tiles only: a tile (or, with a worker pool, a batch of tiles)
	/// that starts before the deadline still finishes, so a budget of zero
	/// legally makes forward progress of one tile per call. Returns `Done`
	/// when idle. When the final tile drains the queue, the generation
	/// commits inside the same call: destination validated and swapped in,
	/// generation counter advanced, snapshot released. A stability violation
	/// instead aborts the whole generation, leaving the field at the prior
	/// generation, and surfaces as an error.
	pub fn tick(&mut self, budget_us: u64) -> Result<StepStatus, StepError> {
		self.tick_traced(budget_us, &IgnoreTraces)
	}

	/// Runs a full generation in one call: `begin_step` plus unbudgeted
	/// ticking. Bit-identical to any budgeted tick sequence over the same
	/// field.
	pub fn step_blocking(&mut self) -> Result<(), StepError> {
		self.begin_step()?;

		while !self.tick(u64::MAX)?.is_done() {}

		Ok(())
	}

	fn commit_step(
		&mut self, traces: &impl StepTraces, started: Instant,
	) -> Result<StepStatus, StepError> {
		let extents = self.field.extents();

		// queue drained: snapshot and queue go regardless of the outcome
		self.active = None;

		match flow::commit(&mut self.dest, extents, self.field.cells_mut()) {
			Ok(()) => {
				self.field.advance_generation();
				traces.commit(self.field.generation(), started.elapsed());

				Ok(StepStatus::Done)
			}
			Err(error) => {
				traces.abort(self.field.generation(), started.elapsed());

				Err(error)
			}
		}
	}
}
