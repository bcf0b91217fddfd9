//! A simulation backend for MicroPsi-style cognitive agents.
//!
//! A nodenet is a hierarchically organized graph of typed nodes whose
//! activations spread along weighted, directional links in discrete
//! simulation steps. Each step propagates gate activations into slots,
//! then evaluates node functions class by class (activators, native
//! modules, everything else); cooperation between node functions is
//! mediated by a lock registry with per-step timeouts.
//!
//! # Example
//!
//! ```
//! use nodenet::prelude::*;
//!
//! let mut net = Nodenet::new(None, "demo", "");
//! let a = net.create_node("Pipe", "Root", "A", (100.0, 100.0), None).unwrap();
//! let b = net.create_node("Pipe", "Root", "B", (200.0, 100.0), None).unwrap();
//! net.create_link(&a, "por", &b, "gen", 1.0, 1.0).unwrap();
//!
//! net.set_node_activation(&a, 1.0).unwrap();
//! let report = net.step(None);
//! assert_eq!(report.current_step, 1);
//! ```

pub mod error;
pub mod net;
pub mod prelude;
pub mod runtime;
pub mod uid;
pub mod world;

pub use crate::error::{NetError, NetResult};
pub use crate::net::nodenet::{Nodenet, StepReport, UserPrompt};
