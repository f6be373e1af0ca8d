//! Human- and machine-readable reports built from the LLVM bindings.

use std::fmt;

use lltarget_llvm::{Context, DataLayout, Endian, Target, TargetMachine, Type};
use serde::Serialize;

/// One registry entry.
#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary {
    pub name: String,
    pub description: String,
    pub has_jit: bool,
    pub has_target_machine: bool,
    pub has_asm_backend: bool,
}

impl From<Target> for TargetSummary {
    fn from(target: Target) -> Self {
        TargetSummary {
            name: target.name(),
            description: target.description(),
            has_jit: target.has_jit(),
            has_target_machine: target.has_target_machine(),
            has_asm_backend: target.has_asm_backend(),
        }
    }
}

impl fmt::Display for TargetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |on: bool, label: &'static str| if on { label } else { "-" };
        write!(
            f,
            "{:<14} {:<3} {:<7} {:<3} {}",
            self.name,
            flag(self.has_jit, "jit"),
            flag(self.has_target_machine, "machine"),
            flag(self.has_asm_backend, "asm"),
            self.description
        )
    }
}

/// Every registered target, in registry order.
pub fn list_targets() -> Vec<TargetSummary> {
    lltarget_llvm::initialize_all();
    Target::all().map(TargetSummary::from).collect()
}

/// Sizes and alignments of one type under a data layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeLayout {
    pub name: String,
    pub size_in_bits: u64,
    pub store_size: u64,
    pub abi_size: u64,
    pub abi_alignment: u32,
    pub call_frame_alignment: u32,
    pub preferred_alignment: u32,
}

impl TypeLayout {
    pub fn measure(layout: &DataLayout, name: &str, ty: Type<'_>) -> Self {
        TypeLayout {
            name: name.to_string(),
            size_in_bits: layout.size_in_bits(ty),
            store_size: layout.store_size(ty),
            abi_size: layout.abi_size(ty),
            abi_alignment: layout.abi_alignment(ty),
            call_frame_alignment: layout.call_frame_alignment(ty),
            preferred_alignment: layout.preferred_alignment(ty),
        }
    }
}

/// A data layout summarized over the basic scalar types.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutReport {
    pub layout: String,
    pub byte_order: Endian,
    pub pointer_size: u32,
    pub types: Vec<TypeLayout>,
}

impl LayoutReport {
    pub fn for_layout(layout: &DataLayout) -> Self {
        let context = Context::new();
        let scalars = [
            ("i1", context.bool_type()),
            ("i8", context.i8_type()),
            ("i16", context.i16_type()),
            ("i32", context.i32_type()),
            ("i64", context.i64_type()),
            ("f32", context.f32_type()),
            ("f64", context.f64_type()),
            ("ptr", context.ptr_type(0)),
        ];

        LayoutReport {
            layout: layout.as_string(),
            byte_order: layout.byte_order(),
            pointer_size: layout.pointer_size(),
            types: scalars
                .iter()
                .map(|&(name, ty)| TypeLayout::measure(layout, name, ty))
                .collect(),
        }
    }
}

impl fmt::Display for LayoutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "layout: {}", self.layout)?;
        writeln!(f, "byte order: {}", self.byte_order)?;
        writeln!(f, "pointer size: {}", self.pointer_size)?;
        writeln!(
            f,
            "{:<8}{:>6}{:>7}{:>5}{:>7}{:>7}{:>6}",
            "type", "bits", "store", "abi", "align", "frame", "pref"
        )?;
        for ty in &self.types {
            writeln!(
                f,
                "{:<8}{:>6}{:>7}{:>5}{:>7}{:>7}{:>6}",
                ty.name,
                ty.size_in_bits,
                ty.store_size,
                ty.abi_size,
                ty.abi_alignment,
                ty.call_frame_alignment,
                ty.preferred_alignment
            )?;
        }
        Ok(())
    }
}

/// What a configured target machine reports about itself.
#[derive(Debug, Clone, Serialize)]
pub struct MachineReport {
    pub target: String,
    pub triple: String,
    /// Architecture as understood by `target-lexicon`, when it parses the triple.
    pub architecture: Option<String>,
    pub cpu: String,
    pub features: String,
    pub data_layout: String,
}

impl MachineReport {
    pub fn for_machine(machine: &TargetMachine) -> Self {
        let triple = machine.triple();
        let architecture = triple
            .parse::<target_lexicon::Triple>()
            .ok()
            .map(|parsed| parsed.architecture.to_string());

        MachineReport {
            target: machine.target().name(),
            architecture,
            cpu: machine.cpu(),
            features: machine.features(),
            data_layout: machine.data_layout().as_string(),
            triple,
        }
    }
}

impl fmt::Display for MachineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "target: {}", self.target)?;
        writeln!(f, "triple: {}", self.triple)?;
        if let Some(architecture) = &self.architecture {
            writeln!(f, "architecture: {architecture}")?;
        }
        writeln!(f, "cpu: {}", self.cpu)?;
        writeln!(f, "features: {}", self.features)?;
        writeln!(f, "data layout: {}", self.data_layout)
    }
}
