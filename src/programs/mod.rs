//! # Program specifications and the program-file loader.
//!
//! - [`ProcessSpec`] immutable description of one program
//! - [`ProgramSet`] ordered name → spec mapping handed to the core
//! - [`StopSignal`] parsed `stopsignal` field
//! - [`load`] / [`parse`] YAML program files

mod file;
mod set;
mod signal;
mod spec;

pub use file::{load, parse};
pub use set::ProgramSet;
pub use signal::StopSignal;
pub use spec::{ProcessSpec, ProcessSpecBuilder};
pub use spec::{DEFAULT_START_RETRIES, DEFAULT_START_TIME, DEFAULT_STOP_TIME};
