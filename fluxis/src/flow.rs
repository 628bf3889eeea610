//! The fused pair-flow kernel: the reference semantics every other stepping
//! path in this crate must reproduce bit for bit.
//!
//! One generation moves quantity between adjacent cells along all three axes.
//! For each adjacent pair, with `a` the lower-index cell:
//!
//!  * gradient `g = a - b`, widened to i64
//!  * flow `f = g / 2^rate`, truncated toward zero, so negative gradients
//!    produce negative flows and `flow(b, a) == -flow(a, b)` exactly
//!  * `dest[a] -= f`, `dest[b] += f`
//!
//! The two applications are equal and opposite, so every pair conserves mass
//! regardless of rounding, and therefore so does the whole sweep. All reads
//! come from one immutable snapshot and all writes accumulate into one signed
//! destination, which makes the accumulation commutative: axis order, tile
//! order and thread interleaving cannot change the result.
//!
//! Truncation is the one rounding rule that survives rotation. A quarter turn
//! reverses the enumeration direction of pairs along one axis, which negates
//! the gradient each pair sees; a shift-based `g >> rate` rounds toward
//! negative infinity and would move one extra quantum whenever a reversed
//! gradient has a nonzero remainder, so rotated fields would diverge from
//! unrotated ones. With truncation the transfer is antisymmetric and the
//! stepper commutes with all 24 cube orientations bit for bit.
//!
//! Pairs that would straddle the field boundary are not enumerated. That is
//! the mirror boundary condition: the ghost neighbor equals the boundary
//! cell, the gradient is zero, and zero flow crosses the edge.
//!
//! There is no clamping anywhere. A cell may be driven negative in the
//! intermediate signed sum only if the configured rate is too aggressive for
//! the input (rates below 3 can drain a cell by more than its value); that
//! state is reported at commit time, never papered over, because a clamp
//! would create mass out of nothing.

use std::ops::Range;
use std::sync::atomic::{AtomicI64, Ordering};

use voxfield::{Axis, Extents, Field};

use crate::controller::StepError;

/// Signed flow from `a` to `b` for one adjacent pair.
///
/// Division truncates toward zero; see the module docs for why that exact
/// rounding rule is load-bearing.
#[inline]
pub fn flow(a: u32, b: u32, rate: u8) -> i64 {
	(a as i64 - b as i64) / (1i64 << rate)
}

/// Sweeps one axis over a box of pair-owning cells.
///
/// The ranges select the *lower* cell of each pair; the partner sits one
/// axis stride above. Callers are responsible for keeping the partner in
/// bounds, i.e. the axis range must stop at `extent - 1` or earlier.
pub(crate) fn sweep_box(
	snapshot: &[u32], extents: Extents, rate: u8, axis: Axis,
	x: Range<i16>, y: Range<i16>, z: Range<i16>, dest: &[AtomicI64],
) {
	if x.is_empty() || y.is_empty() || z.is_empty() {
		return;
	}

	let stride = axis.stride(extents);
	let row_len = (x.end - x.start) as usize;

	for cz in z {
		for cy in y.clone() {
			let row = extents.index_of(x.start, cy, cz);

			for a in row..row + row_len {
				let b = a + stride;
				let f = flow(snapshot[a], snapshot[b], rate);

				dest[a].fetch_add(-f, Ordering::Relaxed);
				dest[b].fetch_add(f, Ordering::Relaxed);
			}
		}
	}
}

/// Lower-cell bounds for a full-field sweep of one axis: every cell owns the
/// pair toward its positive neighbor, except the last layer, whose partner
/// would be out of the field.
fn pair_bounds(extents: Extents, axis: Axis) -> (Range<i16>, Range<i16>, Range<i16>) {
	let x = 0..extents.width();
	let y = 0..extents.height();
	let z = 0..extents.depth();

	match axis {
		Axis::X => (0..extents.width() - 1, y, z),
		Axis::Y => (x, 0..extents.height() - 1, z),
		Axis::Z => (x, y, 0..extents.depth() - 1),
	}
}

/// One fused generation: all three axes, every pair exactly once, reading
/// `snapshot` and accumulating into `dest`.
///
/// `dest` must be initialized to the snapshot values before the call.
pub fn step_fused(snapshot: &[u32], extents: Extents, rate: u8, dest: &[AtomicI64]) {
	for &axis in &Axis::ALL {
		let (x, y, z) = pair_bounds(extents, axis);

		sweep_box(snapshot, extents, rate, axis, x, y, z, dest);
	}
}

/// Allocates a destination buffer primed with the snapshot values.
pub(crate) fn destination_from(snapshot: &[u32]) -> Result<Vec<AtomicI64>, StepError> {
	let mut dest = Vec::new();
	dest.try_reserve_exact(snapshot.len())
		.map_err(|_| StepError::Field(voxfield::FieldError::AllocationFailure))?;
	dest.extend(snapshot.iter().map(|&cell| AtomicI64::new(cell as i64)));

	Ok(dest)
}

/// Re-primes a retained destination buffer with fresh snapshot values.
pub(crate) fn reset_destination(dest: &mut [AtomicI64], snapshot: &[u32]) {
	for (slot, &cell) in dest.iter_mut().zip(snapshot) {
		*slot.get_mut() = cell as i64;
	}
}

/// Converts the accumulated destination back into cells.
///
/// Every signed sum must land in `[0, u32::MAX]`. A sum outside that range
/// means the diffusion rate was too aggressive for the input: committing it
/// would require either wrapping or clamping, and both fabricate mass. The
/// offending cell is reported instead and `cells` is left untouched.
pub(crate) fn commit(
	dest: &mut [AtomicI64], extents: Extents, cells: &mut [u32],
) -> Result<(), StepError> {
	debug_assert_eq!(dest.len(), cells.len());

	for (index, slot) in dest.iter_mut().enumerate() {
		let value = *slot.get_mut();

		if value < 0 || value > u32::MAX as i64 {
			let (x, y, z) = extents.position_of(index);

			return Err(StepError::StabilityViolation { x, y, z, value });
		}
	}

	for (cell, slot) in cells.iter_mut().zip(dest.iter_mut()) {
		*cell = *slot.get_mut() as u32;
	}

	Ok(())
}

/// Steps a field through one blocking fused generation.
///
/// This is the reference path: no tiling, no budget, a single sweep. The
/// incremental controller reproduces its output bit for bit. On a stability
/// violation the field is left exactly as it was, generation included.
pub fn step_field(field: &mut Field) -> Result<(), StepError> {
	let extents = field.extents();
	let rate = field.diffusion_rate();

	let mut dest = destination_from(field.cells())?;

	step_fused(field.cells(), extents, rate, &dest);

	commit(&mut dest, extents, field.cells_mut())?;
	field.advance_generation();

	Ok(())
}
