#![forbid(unsafe_code)]

//! # `voxfield`: dense integer voxel fields
//!
//! Storage primitives for dense simulations over integer grids: weather,
//! thermal diffusion, chemistry. A [`Field`] is a dense 3D array of `u32`
//! cells with signed 16-bit extents, a diffusion-rate shift and a generation
//! counter. Cells are application-defined quantities (centigrams,
//! microkelvin); zero means absence and the full `u32` range is live.
//!
//! The crate deliberately contains no stepping logic. Engines that advance a
//! field live elsewhere and reach the cells through [`Field::cells`] and
//! [`Field::cells_mut`]; everything here is shape, indexing and bulk access.

pub mod field;
pub mod position;

/// Bulk rectangular import/export of cell data.
///
/// Regions are half-open boxes laid out x-fastest, z-slowest, matching the
/// field's own linear layout.
pub mod region;

pub use self::field::{Field, FieldError};
pub use self::position::{Axis, Extents};
