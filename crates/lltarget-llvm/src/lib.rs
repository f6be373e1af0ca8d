//! Owning Rust handles over LLVM's target C API.
//!
//! This crate wraps four facets of LLVM:
//!
//! - `data_layout`: parse, print and query target data layouts
//! - `target`: walk the target registry and resolve triples
//! - `target_machine`: configure a target machine and emit code with it
//! - `pass_manager_builder`: populate the standard optimization pipelines
//!
//! Each handle that LLVM allocates on our behalf is released exactly once,
//! when its Rust owner is dropped. Failures reported by LLVM through its
//! status-and-message convention surface as [`TargetError`].

pub mod data_layout;
mod errors;
pub mod ir;
mod message;
pub mod pass_manager;
pub mod pass_manager_builder;
pub mod target;
pub mod target_machine;

pub use data_layout::{DataLayout, Endian};
pub use errors::{TargetError, TargetErrorKind, TargetResult};
pub use ir::{Context, FunctionValue, GlobalValue, MemoryBuffer, Module, Type};
pub use pass_manager::{FunctionPassManager, ModulePassManager};
pub use pass_manager_builder::{PassManagerBuilder, PipelineConfig};
pub use target::{Target, Targets, initialize_all, initialize_native};
pub use target_machine::{
    CodeGenOptLevel, CodeModel, FileType, RelocMode, ResolvedOptions, TargetMachine,
    TargetMachineOptions,
};
