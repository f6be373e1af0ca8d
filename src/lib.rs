//! Driver library for the `lltarget` command.
//!
//! `report` turns registry, data layout and target machine queries into
//! printable reports; `pipeline` compiles IR files with a configured target
//! machine. Both sit on top of the `lltarget-llvm` bindings.

pub mod pipeline;
pub mod report;

pub use pipeline::{DriverError, DriverResult, EmitRequest, LayoutSource};
pub use report::{LayoutReport, MachineReport, TargetSummary};
