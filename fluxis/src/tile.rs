//! Cubic tiles: the atomic work unit of incremental stepping.
//!
//! A field is partitioned into axis-aligned cubes of edge [`TILE_EDGE`],
//! clipped at the field boundary. Each tile enumerates the pairs it owns:
//! every pair strictly inside the tile, plus the pairs straddling its three
//! positive faces into the neighboring tiles. The straddling pairs belong to
//! the lower tile, so every adjacent pair in the field is enumerated exactly
//! once no matter how the tiles are scheduled. That single-enumeration rule
//! is what carries exact conservation from the fused sweep over to the tiled
//! one.
//!
//! Tiles are queued in Morton order. Consecutive tiles then tend to share a
//! spatial neighborhood, so snapshot reads and destination writes land on
//! warm cache lines. The ordering is purely a throughput concern: all reads
//! come from the immutable snapshot and all writes commute.

use std::sync::atomic::AtomicI64;

use voxfield::{Axis, Extents};

use crate::flow::sweep_box;

/// Edge length of a tile, in cells.
pub const TILE_EDGE: i16 = 16;

/// Coordinates of one tile within the tile grid.
///
/// A field axis spans at most 32767 cells, i.e. 2048 tiles, so u16 components
/// hold every reachable tile without truncation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Tile {
	pub tx: u16,
	pub ty: u16,
	pub tz: u16,
}

impl Tile {
	/// Morton (Z-order) key: the three coordinates bit-interleaved, X in the
	/// lowest lane.
	pub fn morton(&self) -> u64 {
		spread(self.tx) | spread(self.ty) << 1 | spread(self.tz) << 2
	}
}

/// Spaces the bits of a 16-bit value three apart.
fn spread(value: u16) -> u64 {
	let mut bits = value as u64;

	bits = (bits | bits << 32) & 0x001F_0000_0000_FFFF;
	bits = (bits | bits << 16) & 0x001F_0000_FF00_00FF;
	bits = (bits | bits << 8) & 0x100F_00F0_0F00_F00F;
	bits = (bits | bits << 4) & 0x10C3_0C30_C30C_30C3;
	bits = (bits | bits << 2) & 0x1249_2492_4924_9249;

	bits
}

/// The tile partition of a field.
#[derive(Copy, Clone, Debug)]
pub struct TileGrid {
	extents: Extents,
	tiles_x: u16,
	tiles_y: u16,
	tiles_z: u16,
}

impl TileGrid {
	pub fn new(extents: Extents) -> TileGrid {
		TileGrid {
			extents,
			tiles_x: tiles_along(extents.width()),
			tiles_y: tiles_along(extents.height()),
			tiles_z: tiles_along(extents.depth()),
		}
	}

	/// Total number of tiles covering the field.
	pub fn total(&self) -> usize {
		(self.tiles_x as usize) * (self.tiles_y as usize) * (self.tiles_z as usize)
	}

	/// Cell bounds of one tile, clipped at the field boundary. Half-open on
	/// every axis.
	pub fn cell_bounds(&self, tile: Tile) -> ((i16, i16), (i16, i16), (i16, i16)) {
		(
			clip(tile.tx, self.extents.width()),
			clip(tile.ty, self.extents.height()),
			clip(tile.tz, self.extents.depth()),
		)
	}

	/// All tiles of the grid, sorted by Morton key.
	pub fn morton_queue(&self) -> Vec<Tile> {
		let mut keyed: Vec<(u64, Tile)> = Vec::with_capacity(self.total());

		for tz in 0..self.tiles_z {
			for ty in 0..self.tiles_y {
				for tx in 0..self.tiles_x {
					let tile = Tile { tx, ty, tz };

					keyed.push((tile.morton(), tile));
				}
			}
		}

		keyed.sort_by_key(|&(key, _)| key);
		keyed.into_iter().map(|(_, tile)| tile).collect()
	}
}

fn tiles_along(extent: i16) -> u16 {
	((extent as usize + TILE_EDGE as usize - 1) / TILE_EDGE as usize) as u16
}

fn clip(tile: u16, extent: i16) -> (i16, i16) {
	let start = tile as i32 * TILE_EDGE as i32;
	let end = (start + TILE_EDGE as i32).min(extent as i32);

	(start as i16, end as i16)
}

/// Processes one tile: computes every pair flow the tile owns from the
/// snapshot and accumulates it into the destination.
///
/// Along each axis the owned pairs are exactly those whose lower cell lies in
/// the tile and whose upper cell lies in the field. Pairs whose upper cell
/// falls in the next tile over are the outgoing-face pairs; pairs whose upper
/// cell would leave the field are not enumerated at all (mirror boundary).
pub fn process_tile(
	snapshot: &[u32], extents: Extents, rate: u8, grid: &TileGrid, tile: Tile,
	dest: &[AtomicI64],
) {
	let ((x0, x1), (y0, y1), (z0, z1)) = grid.cell_bounds(tile);

	let x_cap = x1.min(extents.width() - 1);
	let y_cap = y1.min(extents.height() - 1);
	let z_cap = z1.min(extents.depth() - 1);

	sweep_box(snapshot, extents, rate, Axis::X, x0..x_cap, y0..y1, z0..z1, dest);
	sweep_box(snapshot, extents, rate, Axis::Y, x0..x1, y0..y_cap, z0..z1, dest);
	sweep_box(snapshot, extents, rate, Axis::Z, x0..x1, y0..y1, z0..z_cap, dest);
}

#[cfg(test)]
mod test {
	use super::*;
	use std::collections::HashSet;
	use std::sync::atomic::Ordering;

	fn naive_morton(x: u16, y: u16, z: u16) -> u64 {
		let mut key = 0u64;

		for bit in 0..16 {
			key |= ((x as u64 >> bit) & 1) << (3 * bit);
			key |= ((y as u64 >> bit) & 1) << (3 * bit + 1);
			key |= ((z as u64 >> bit) & 1) << (3 * bit + 2);
		}

		key
	}

	#[test]
	fn morton_matches_naive_interleave() {
		let samples =
			[0u16, 1, 2, 3, 7, 8, 15, 16, 100, 255, 256, 1000, 2047, 4095, u16::MAX];

		for &x in &samples {
			for &y in &samples {
				for &z in &samples {
					assert_eq!(
						Tile { tx: x, ty: y, tz: z }.morton(),
						naive_morton(x, y, z),
						"interleave mismatch at ({}, {}, {})",
						x, y, z
					);
				}
			}
		}
	}

	#[test]
	fn morton_keys_are_unique() {
		let mut seen = HashSet::new();

		for z in 0..8u16 {
			for y in 0..8u16 {
				for x in 0..8u16 {
					assert!(seen.insert(Tile { tx: x, ty: y, tz: z }.morton()));
				}
			}
		}
	}

	#[test]
	fn grid_covers_the_field() {
		let extents = Extents::new(100, 33, 16).unwrap();
		let grid = TileGrid::new(extents);

		assert_eq!(grid.total(), 7 * 3 * 1);

		let queue = grid.morton_queue();
		assert_eq!(queue.len(), grid.total());

		// every cell belongs to exactly one tile
		let mut covered = vec![0u32; extents.cell_count()];

		for &tile in &queue {
			let ((x0, x1), (y0, y1), (z0, z1)) = grid.cell_bounds(tile);

			assert!(x1 - x0 > 0 && x1 - x0 <= TILE_EDGE);

			for z in z0..z1 {
				for y in y0..y1 {
					for x in x0..x1 {
						covered[extents.index_of(x, y, z)] += 1;
					}
				}
			}
		}

		assert!(covered.iter().all(|&count| count == 1));
	}

	#[test]
	fn queue_is_morton_sorted() {
		let grid = TileGrid::new(Extents::new(128, 128, 64).unwrap());
		let queue = grid.morton_queue();

		for window in queue.windows(2) {
			assert!(window[0].morton() < window[1].morton());
		}
	}

	#[test]
	fn every_pair_is_owned_once() {
		// on a field whose every gradient is exactly 2^rate, each enumerated
		// pair moves exactly one unit, so a double-owned or orphaned pair
		// skews some cell's delta against the fused sweep
		let extents = Extents::new(37, 20, 18).unwrap();
		let grid = TileGrid::new(extents);

		let mut snapshot = vec![0u32; extents.cell_count()];
		for z in 0..18 {
			for y in 0..20 {
				for x in 0..37 {
					let height = (x + y + z) as u32;
					snapshot[extents.index_of(x, y, z)] = 1000 - 2 * height;
				}
			}
		}

		let tiled: Vec<AtomicI64> = snapshot.iter().map(|_| AtomicI64::new(0)).collect();
		for &tile in &grid.morton_queue() {
			process_tile(&snapshot, extents, 1, &grid, tile, &tiled);
		}

		let fused: Vec<AtomicI64> = snapshot.iter().map(|_| AtomicI64::new(0)).collect();
		crate::flow::step_fused(&snapshot, extents, 1, &fused);

		for (a, b) in tiled.iter().zip(fused.iter()) {
			assert_eq!(a.load(Ordering::Relaxed), b.load(Ordering::Relaxed));
		}

		// downhill-everywhere gradient: each pair moved one unit, so the
		// high-index corner (the downhill end) nets +3, one per axis
		assert_eq!(tiled[extents.index_of(36, 19, 17)].load(Ordering::Relaxed), 3);
	}

	#[test]
	fn tile_ownership_conserves_at_awkward_extents() {
		// extents deliberately not multiples of the tile edge
		let extents = Extents::new(17, 31, 5).unwrap();
		let grid = TileGrid::new(extents);

		let mut snapshot = vec![0u32; extents.cell_count()];
		let mut state = 9477u64;
		for cell in snapshot.iter_mut() {
			state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
			*cell = (state >> 33) as u32 & 0xFFFF;
		}

		let dest: Vec<AtomicI64> =
			snapshot.iter().map(|&cell| AtomicI64::new(cell as i64)).collect();

		for &tile in &grid.morton_queue() {
			process_tile(&snapshot, extents, 3, &grid, tile, &dest);
		}

		let before: i64 = snapshot.iter().map(|&cell| cell as i64).sum();
		let after: i64 = dest.iter().map(|slot| slot.load(Ordering::Relaxed)).sum();

		assert_eq!(before, after);
	}
}
