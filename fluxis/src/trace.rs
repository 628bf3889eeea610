use std::time::Duration;

/// Observation hooks for incremental stepping.
///
/// The engine never logs on its own; callers that want visibility inject an
/// implementation through [`StepController::begin_step_traced`] and
/// [`StepController::tick_traced`] and receive tile counts and wall-clock
/// durations as the generation advances.
///
/// [`StepController::begin_step_traced`]: crate::controller::StepController::begin_step_traced
/// [`StepController::tick_traced`]: crate::controller::StepController::tick_traced
pub trait StepTraces {
	/// A generation began: the snapshot is frozen and `total_tiles` tiles
	/// are queued. `generation` is the value a successful commit will
	/// produce.
	fn begin_step(&self, generation: u64, total_tiles: usize);

	/// One `tick` returned without finishing the generation; `duration` is
	/// the wall time of that call.
	fn tick(&self, tiles_processed: usize, tiles_remaining: usize, duration: Duration);

	/// The generation committed; `generation` is the new counter value and
	/// `duration` the wall time since `begin_step`.
	fn commit(&self, generation: u64, duration: Duration);

	/// The generation aborted on a stability violation; the field still holds
	/// `generation`. `duration` is the wall time since `begin_step`.
	fn abort(&self, generation: u64, duration: Duration);
}

pub struct PrintTraces;

impl PrintTraces {
	fn us(duration: Duration) -> u64 {
		(duration.as_secs() * 1000000) + ((duration.subsec_nanos() / 1000) as u64)
	}
}

impl StepTraces for PrintTraces {
	fn begin_step(&self, generation: u64, total_tiles: usize) {
		println!("begin: generation {} over {} tiles", generation, total_tiles);
	}

	fn tick(&self, tiles_processed: usize, tiles_remaining: usize, duration: Duration) {
		println!(
			"tick: {} tiles in {}us, {} remaining",
			tiles_processed,
			Self::us(duration),
			tiles_remaining
		);
	}

	fn commit(&self, generation: u64, duration: Duration) {
		println!("commit: generation {} in {}us", generation, Self::us(duration));
	}

	fn abort(&self, generation: u64, duration: Duration) {
		println!("abort: still at generation {} after {}us", generation, Self::us(duration));
	}
}

pub struct IgnoreTraces;

impl StepTraces for IgnoreTraces {
	fn begin_step(&self, _: u64, _: usize) {}
	fn tick(&self, _: usize, _: usize, _: Duration) {}
	fn commit(&self, _: u64, _: Duration) {}
	fn abort(&self, _: u64, _: Duration) {}
}
