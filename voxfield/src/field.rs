use crate::position::Extents;
use thiserror::Error;

/// Failures when building or resizing field storage.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
	#[error("field extents must be strictly positive")]
	InvalidExtents,

	#[error("diffusion rate shift must be at most 31")]
	InvalidRate,

	#[error("failed to allocate cell storage")]
	AllocationFailure,
}

/// A dense 3D field of `u32` cells.
///
/// The diffusion rate is a power-of-two shift (rate 3 divides gradients by 8)
/// rather than an arbitrary divisor, keeping the stepping arithmetic
/// integer-only and deterministic. The generation counter starts at zero and
/// is advanced by whichever engine steps the field.
///
/// The sum of all cells, as a 64-bit integer, is the field's total mass.
/// Stepping engines are expected to preserve it exactly; [`Field::total_mass`]
/// exists so that callers and tests can check.
#[derive(Clone, Debug)]
pub struct Field {
	extents: Extents,
	cells: Vec<u32>,
	diffusion_rate: u8,
	generation: u64,
}

impl Field {
	/// Creates a zeroed field.
	///
	/// Cell storage is reserved fallibly, so running out of memory surfaces
	/// as [`FieldError::AllocationFailure`] instead of aborting the process.
	pub fn new(width: i16, height: i16, depth: i16, diffusion_rate: u8) -> Result<Field, FieldError> {
		let extents = Extents::new(width, height, depth).ok_or(FieldError::InvalidExtents)?;

		if diffusion_rate > 31 {
			return Err(FieldError::InvalidRate);
		}

		let count = extents.cell_count();

		let mut cells = Vec::new();
		cells.try_reserve_exact(count).map_err(|_| FieldError::AllocationFailure)?;
		cells.resize(count, 0);

		Ok(Field { extents, cells, diffusion_rate, generation: 0 })
	}

	pub fn extents(&self) -> Extents {
		self.extents
	}

	pub fn diffusion_rate(&self) -> u8 {
		self.diffusion_rate
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Writes one cell.
	/// ### Out of bounds behavior
	/// Out-of-bounds coordinates are silently ignored. Host scripting layers
	/// pass coordinates through unchecked; callers needing strictness check
	/// bounds themselves.
	pub fn set(&mut self, x: i16, y: i16, z: i16, value: u32) {
		if self.extents.contains(x, y, z) {
			let index = self.extents.index_of(x, y, z);
			self.cells[index] = value;
		}
	}

	/// Reads one cell, or 0 for out-of-bounds coordinates.
	pub fn get(&self, x: i16, y: i16, z: i16) -> u32 {
		if self.extents.contains(x, y, z) {
			self.cells[self.extents.index_of(x, y, z)]
		} else {
			0
		}
	}

	/// The 64-bit sum of all cells.
	pub fn total_mass(&self) -> u64 {
		self.cells.iter().map(|&cell| cell as u64).sum()
	}

	pub fn cells(&self) -> &[u32] {
		&self.cells
	}

	/// Mutable cell access for stepping engines. The slice length is fixed,
	/// so the cell count invariant cannot be broken through it.
	pub fn cells_mut(&mut self) -> &mut [u32] {
		&mut self.cells
	}

	/// Marks one completed generation. Called by stepping engines exactly
	/// once per committed step.
	pub fn advance_generation(&mut self) {
		self.generation += 1;
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn new_field_is_zeroed() {
		let field = Field::new(8, 8, 8, 3).unwrap();

		assert_eq!(field.extents().cell_count(), 512);
		assert_eq!(field.generation(), 0);
		assert_eq!(field.diffusion_rate(), 3);
		assert!(field.cells().iter().all(|&cell| cell == 0));
	}

	#[test]
	fn rejects_bad_parameters() {
		assert_eq!(Field::new(0, 8, 8, 3).unwrap_err(), FieldError::InvalidExtents);
		assert_eq!(Field::new(8, -4, 8, 3).unwrap_err(), FieldError::InvalidExtents);
		assert_eq!(Field::new(8, 8, 8, 32).unwrap_err(), FieldError::InvalidRate);

		// 31 is the largest shift that keeps `1 << rate` inside a u32
		assert!(Field::new(8, 8, 8, 31).is_ok());
	}

	#[test]
	fn set_then_get() {
		let mut field = Field::new(8, 8, 8, 3).unwrap();

		field.set(4, 4, 4, 1000);
		assert_eq!(field.get(4, 4, 4), 1000);
		assert_eq!(field.get(0, 0, 0), 0);
	}

	#[test]
	fn out_of_bounds_access_is_permissive() {
		let mut field = Field::new(8, 8, 8, 3).unwrap();

		field.set(-1, 0, 0, 77);
		field.set(8, 0, 0, 77);
		field.set(0, 0, 9001, 77);

		assert_eq!(field.total_mass(), 0);
		assert_eq!(field.get(-1, 0, 0), 0);
		assert_eq!(field.get(8, 0, 0), 0);
	}

	#[test]
	fn total_mass_sums_in_64_bits() {
		let mut field = Field::new(2, 1, 1, 3).unwrap();

		field.set(0, 0, 0, u32::MAX);
		field.set(1, 0, 0, u32::MAX);

		assert_eq!(field.total_mass(), 2 * (u32::MAX as u64));
	}
}
