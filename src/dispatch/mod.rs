// src/dispatch/mod.rs

//! Fan-out dispatch: one command, many targets, concurrent execution.
//!
//! - [`controller`] owns the public [`Dispatcher`] and the outcome types.
//! - the private `driver` module takes one unit per target through its
//!   lifecycle.
//! - [`tag`] rewrites drained streams into labelled lines.
//! - [`sink`] serializes concurrent line output through one writer task.

pub mod controller;
pub mod sink;
pub mod tag;

mod driver;

pub use controller::{Dispatcher, TargetOutcome, UnitOutcome};
pub use sink::OutputSink;
pub use tag::{copy_raw, tag_lines};
