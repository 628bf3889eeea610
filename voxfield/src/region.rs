use crate::field::Field;

/// Number of cells in a half-open box, or `None` if the box violates the
/// field bounds or is inverted/empty on any axis.
fn checked_box_len(
	field: &Field, min: (i16, i16, i16), max: (i16, i16, i16),
) -> Option<usize> {
	let extents = field.extents();

	if min.0 < 0 || min.1 < 0 || min.2 < 0 {
		return None;
	}

	if max.0 > extents.width() || max.1 > extents.height() || max.2 > extents.depth() {
		return None;
	}

	if min.0 >= max.0 || min.1 >= max.1 || min.2 >= max.2 {
		return None;
	}

	let width = (max.0 - min.0) as usize;
	let height = (max.1 - min.1) as usize;
	let depth = (max.2 - min.2) as usize;

	Some(width * height * depth)
}

impl Field {
	/// Bulk-writes a half-open box of cells from a flat buffer.
	///
	/// The buffer is consumed in z,y,x order (z slowest, x fastest), matching
	/// [`Field::extract_region`].
	///
	/// Returns the number of cells written, or 0 if the box reaches outside
	/// the field, is empty or inverted, or the buffer holds fewer cells than
	/// the box. Bounds violations are rejected whole, never clipped: a
	/// partial import would leave the caller guessing which cells landed.
	pub fn import_region(
		&mut self, buf: &[u32], min: (i16, i16, i16), max: (i16, i16, i16),
	) -> usize {
		let count = match checked_box_len(self, min, max) {
			Some(count) => count,
			None => return 0,
		};

		if buf.len() < count {
			return 0;
		}

		let extents = self.extents();
		let cells = self.cells_mut();
		let mut offset = 0;

		for z in min.2..max.2 {
			for y in min.1..max.1 {
				let row = extents.index_of(min.0, y, z);
				let row_len = (max.0 - min.0) as usize;

				cells[row..row + row_len].copy_from_slice(&buf[offset..offset + row_len]);
				offset += row_len;
			}
		}

		debug_assert_eq!(offset, count);
		count
	}

	/// Bulk-reads a half-open box of cells into a flat buffer.
	///
	/// Layout and bounds behavior mirror [`Field::import_region`]: z,y,x
	/// order, 0 returned for any bounds violation or undersized buffer.
	pub fn extract_region(
		&self, buf: &mut [u32], min: (i16, i16, i16), max: (i16, i16, i16),
	) -> usize {
		let count = match checked_box_len(self, min, max) {
			Some(count) => count,
			None => return 0,
		};

		if buf.len() < count {
			return 0;
		}

		let extents = self.extents();
		let cells = self.cells();
		let mut offset = 0;

		for z in min.2..max.2 {
			for y in min.1..max.1 {
				let row = extents.index_of(min.0, y, z);
				let row_len = (max.0 - min.0) as usize;

				buf[offset..offset + row_len].copy_from_slice(&cells[row..row + row_len]);
				offset += row_len;
			}
		}

		debug_assert_eq!(offset, count);
		count
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn numbered_field() -> Field {
		let mut field = Field::new(8, 8, 8, 3).unwrap();

		for z in 0..8 {
			for y in 0..8 {
				for x in 0..8 {
					field.set(x, y, z, (x + y * 10 + z * 100) as u32);
				}
			}
		}

		field
	}

	#[test]
	fn extract_reads_in_layout_order() {
		let field = numbered_field();
		let mut buf = vec![0u32; 8];

		let written = field.extract_region(&mut buf, (2, 3, 4), (4, 5, 6));

		assert_eq!(written, 8);
		// (2,3,4), (3,3,4), (2,4,4), (3,4,4), then the z=5 layer
		assert_eq!(buf, vec![432, 433, 442, 443, 532, 533, 542, 543]);
	}

	#[test]
	fn import_is_inverse_of_extract() {
		let field = numbered_field();

		let min = (1, 2, 3);
		let max = (7, 6, 5);
		let len = 6 * 4 * 2;

		let mut buf = vec![0u32; len];
		assert_eq!(field.extract_region(&mut buf, min, max), len);

		let mut restored = Field::new(8, 8, 8, 3).unwrap();
		assert_eq!(restored.import_region(&buf, min, max), len);

		for z in min.2..max.2 {
			for y in min.1..max.1 {
				for x in min.0..max.0 {
					assert_eq!(restored.get(x, y, z), field.get(x, y, z));
				}
			}
		}
	}

	#[test]
	fn bounds_violations_move_nothing() {
		let mut field = numbered_field();
		let before = field.cells().to_vec();
		let mut buf = vec![0u32; 4096];

		// reaching outside the field
		assert_eq!(field.extract_region(&mut buf, (-1, 0, 0), (4, 4, 4)), 0);
		assert_eq!(field.extract_region(&mut buf, (0, 0, 0), (9, 4, 4)), 0);
		assert_eq!(field.import_region(&buf, (0, 0, 0), (4, 4, 9)), 0);

		// inverted and empty boxes
		assert_eq!(field.extract_region(&mut buf, (4, 0, 0), (2, 4, 4)), 0);
		assert_eq!(field.import_region(&buf, (3, 3, 3), (3, 4, 4)), 0);

		assert_eq!(field.cells(), &before[..]);
	}

	#[test]
	fn undersized_buffer_is_rejected() {
		let mut field = numbered_field();
		let mut small = vec![0u32; 7];

		assert_eq!(field.extract_region(&mut small, (0, 0, 0), (2, 2, 2)), 0);
		assert_eq!(field.import_region(&small, (0, 0, 0), (2, 2, 2)), 0);
		assert!(small.iter().all(|&cell| cell == 0));
	}

	#[test]
	fn full_field_round_trip() {
		let field = numbered_field();
		let mut buf = vec![0u32; 512];

		assert_eq!(field.extract_region(&mut buf, (0, 0, 0), (8, 8, 8)), 512);
		assert_eq!(&buf[..], field.cells());
	}
}
