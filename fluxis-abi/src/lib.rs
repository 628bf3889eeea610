//! C boundary for host scripting layers (LuaJIT FFI and friends).
//!
//! A controller crosses the boundary as an opaque pointer; every other
//! parameter and return value is a machine integer. Nothing panics across
//! the boundary: failures come back as return codes, out-of-bounds access is
//! a no-op, and null handles are ignored. The host owns the handle lifetime
//! and must call [`destroy_controller`] exactly once per live handle.
//!
//! The engine itself keeps no global state, so a host can drive any number
//! of controllers side by side.

use fluxis::{StepController, StepError, StepStatus};

/// Creates a controller over a zeroed field.
///
/// Returns null if any extent is non-positive, the diffusion rate exceeds
/// 31, or the cell buffers cannot be allocated.
#[no_mangle]
pub extern "C" fn create_controller(
	width: i16, height: i16, depth: i16, diffusion_rate: u8, threads: u8,
) -> *mut StepController {
	match StepController::new(width, height, depth, diffusion_rate, threads) {
		Ok(ctrl) => Box::into_raw(Box::new(ctrl)),
		Err(_) => std::ptr::null_mut(),
	}
}

/// Destroys a controller, releasing the field and any in-progress
/// generation. Safe to call with null (no-op).
#[no_mangle]
pub extern "C" fn destroy_controller(ctrl: *mut StepController) {
	if !ctrl.is_null() {
		unsafe {
			drop(Box::from_raw(ctrl));
		}
	}
}

/// Writes one cell.
///
/// Out-of-bounds coordinates are silently ignored. Writes are dropped while
/// a generation is in progress (the snapshot is already frozen); hosts that
/// care check [`is_stepping`] first.
#[no_mangle]
pub extern "C" fn field_set(ctrl: *mut StepController, x: i16, y: i16, z: i16, value: u32) {
	if ctrl.is_null() {
		return;
	}

	unsafe {
		let _ = (*ctrl).set(x, y, z, value);
	}
}

/// Reads one cell. Returns 0 for out-of-bounds coordinates or a null
/// handle. Mid-step reads see the stable pre-step state.
#[no_mangle]
pub extern "C" fn field_get(ctrl: *const StepController, x: i16, y: i16, z: i16) -> u32 {
	if ctrl.is_null() {
		return 0;
	}

	unsafe { (*ctrl).get(x, y, z) }
}

/// Current generation counter, or 0 for a null handle.
#[no_mangle]
pub extern "C" fn field_get_generation(ctrl: *const StepController) -> u64 {
	if ctrl.is_null() {
		return 0;
	}

	unsafe { (*ctrl).generation() }
}

/// Total mass of the field as a 64-bit sum, for external checksumming.
/// Returns 0 for a null handle.
#[no_mangle]
pub extern "C" fn field_total_mass(ctrl: *const StepController) -> u64 {
	if ctrl.is_null() {
		return 0;
	}

	unsafe { (*ctrl).field().total_mass() }
}

/// Begins a new generation.
///
/// Returns 0 on success, 1 if a generation is already in progress, 2 if the
/// snapshot could not be allocated (the controller stays idle and the field
/// is unchanged), -1 for a null handle.
#[no_mangle]
pub extern "C" fn begin_step(ctrl: *mut StepController) -> i32 {
	if ctrl.is_null() {
		return -1;
	}

	unsafe {
		match (*ctrl).begin_step() {
			Ok(()) => 0,
			Err(StepError::AlreadyStepping) => 1,
			Err(_) => 2,
		}
	}
}

/// Processes tiles for up to `budget_us` microseconds.
///
/// Returns 1 if the generation committed during this call (also when no
/// generation was in progress), 0 if tiles remain, -2 if the generation
/// aborted on a stability violation (the field is unchanged at the prior
/// generation), -1 for a null handle.
#[no_mangle]
pub extern "C" fn tick(ctrl: *mut StepController, budget_us: u64) -> i32 {
	if ctrl.is_null() {
		return -1;
	}

	unsafe {
		match (*ctrl).tick(budget_us) {
			Ok(StepStatus::Done) => 1,
			Ok(StepStatus::NotDone) => 0,
			Err(_) => -2,
		}
	}
}

/// Whether a generation is in progress: 1 yes, 0 no, -1 for a null handle.
#[no_mangle]
pub extern "C" fn is_stepping(ctrl: *const StepController) -> i32 {
	if ctrl.is_null() {
		return -1;
	}

	unsafe {
		if (*ctrl).is_stepping() {
			1
		} else {
			0
		}
	}
}

/// Runs one full generation in a single blocking call.
///
/// Equivalent to [`begin_step`] plus unbudgeted [`tick`]s, and bit-identical
/// to any budgeted sequence. A generation that aborts on a stability
/// violation leaves the field unchanged; hosts detect it by watching
/// [`field_get_generation`].
#[no_mangle]
pub extern "C" fn step_blocking(ctrl: *mut StepController) {
	if ctrl.is_null() {
		return;
	}

	unsafe {
		let _ = (*ctrl).step_blocking();
	}
}

/// Bulk-writes the half-open box `[min, max)` from a flat u32 buffer of
/// `len` cells, laid out x-fastest, z-slowest.
///
/// Returns the number of bytes read from the buffer, or 0 if the box
/// violates the field bounds, the buffer is too small or null, a generation
/// is in progress, or the handle is null.
#[no_mangle]
pub extern "C" fn field_import_region(
	ctrl: *mut StepController, buf: *const u32, len: u64, min_x: i16, min_y: i16,
	min_z: i16, max_x: i16, max_y: i16, max_z: i16,
) -> u64 {
	if ctrl.is_null() || buf.is_null() {
		return 0;
	}

	unsafe {
		let cells = std::slice::from_raw_parts(buf, len as usize);

		match (*ctrl).import_region(cells, (min_x, min_y, min_z), (max_x, max_y, max_z)) {
			Ok(count) => count as u64 * 4,
			Err(_) => 0,
		}
	}
}

/// Bulk-reads the half-open box `[min, max)` into a flat u32 buffer of
/// `len` cells. Allowed mid-step (reads the stable pre-step state).
///
/// Returns the number of bytes written, or 0 on any bounds violation, an
/// undersized or null buffer, or a null handle.
#[no_mangle]
pub extern "C" fn field_extract_region(
	ctrl: *const StepController, buf: *mut u32, len: u64, min_x: i16, min_y: i16,
	min_z: i16, max_x: i16, max_y: i16, max_z: i16,
) -> u64 {
	if ctrl.is_null() || buf.is_null() {
		return 0;
	}

	unsafe {
		let cells = std::slice::from_raw_parts_mut(buf, len as usize);

		(*ctrl).extract_region(cells, (min_x, min_y, min_z), (max_x, max_y, max_z)) as u64 * 4
	}
}
