#![forbid(unsafe_code)]

//! # `fluxis`: integer diffusion over voxel fields
//!
//! A conserved quantity spreads between adjacent cells of a
//! [`voxfield::Field`] under a fused, pair-exchange stepping rule. Every
//! flow is applied equally and oppositely to the two cells of a pair, so
//! total mass is preserved exactly, by construction, with no floating point
//! anywhere.
//!
//! Two ways to advance a field:
//!
//!  * [`flow::step_field`] performs one blocking generation with the
//!    reference fused sweep.
//!  * [`StepController`] spreads the same generation across many calls:
//!    `begin_step` freezes a snapshot, `tick(budget_us)` processes
//!    Morton-ordered tiles until the budget runs out, and the final tick
//!    commits atomically. The result is bit-identical to the blocking sweep
//!    whatever the budgets, and whatever the controller's thread count.
//!
//! Hosts that drive stepping from a frame loop call `tick` once per frame
//! with a few thousand microseconds and never miss a frame on large fields.

pub mod controller;
pub mod flow;
pub mod tile;
pub mod trace;

pub use controller::{StepController, StepError, StepStatus};
pub use tile::TILE_EDGE;
pub use trace::{IgnoreTraces, PrintTraces, StepTraces};
