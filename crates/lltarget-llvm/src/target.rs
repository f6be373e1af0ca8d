//! The target registry.
//!
//! LLVM keeps a static, process-wide list of compiled-in targets. Targets
//! appear in it once they are initialized (see [`initialize_native`] and
//! [`initialize_all`]) and are never removed, so a [`Target`] is a plain
//! copyable reference into that list.

use std::ffi::c_char;
use std::fmt;
use std::ptr;
use std::sync::{Once, OnceLock};

use llvm_sys::target::{
    LLVM_InitializeAllAsmParsers, LLVM_InitializeAllAsmPrinters, LLVM_InitializeAllDisassemblers,
    LLVM_InitializeAllTargetInfos, LLVM_InitializeAllTargetMCs, LLVM_InitializeAllTargets,
    LLVM_InitializeNativeAsmParser, LLVM_InitializeNativeAsmPrinter, LLVM_InitializeNativeTarget,
};
use llvm_sys::target_machine::{
    LLVMGetDefaultTargetTriple, LLVMGetFirstTarget, LLVMGetHostCPUFeatures, LLVMGetHostCPUName,
    LLVMGetNextTarget, LLVMGetTargetDescription, LLVMGetTargetFromName, LLVMGetTargetFromTriple,
    LLVMGetTargetName, LLVMNormalizeTargetTriple, LLVMTargetHasAsmBackend, LLVMTargetHasJIT,
    LLVMTargetHasTargetMachine, LLVMTargetRef,
};
use target_lexicon::{Aarch64Architecture, Architecture, Triple};

use crate::errors::{TargetError, TargetResult};
use crate::message::{borrowed_str, take_message, to_cstring};
use crate::target_machine::{TargetMachine, TargetMachineOptions};

/// Register the host target, its assembly printer and parser.
pub fn initialize_native() -> TargetResult<()> {
    static NATIVE: OnceLock<Result<(), String>> = OnceLock::new();

    NATIVE
        .get_or_init(|| unsafe {
            if LLVM_InitializeNativeTarget() != 0 {
                return Err("no native target is compiled into LLVM".to_string());
            }
            if LLVM_InitializeNativeAsmPrinter() != 0 {
                return Err("the native target has no assembly printer".to_string());
            }
            // Not every target ships an assembly parser; emission does not need one.
            let _ = LLVM_InitializeNativeAsmParser();
            tracing::debug!("initialized native target");
            Ok(())
        })
        .clone()
        .map_err(TargetError::initialization)
}

/// Register every target compiled into LLVM.
pub fn initialize_all() {
    static ALL: Once = Once::new();

    ALL.call_once(|| unsafe {
        LLVM_InitializeAllTargetInfos();
        LLVM_InitializeAllTargets();
        LLVM_InitializeAllTargetMCs();
        LLVM_InitializeAllAsmPrinters();
        LLVM_InitializeAllAsmParsers();
        LLVM_InitializeAllDisassemblers();
        tracing::debug!("initialized all targets");
    });
}

/// The triple LLVM was configured to generate code for by default.
pub fn default_triple() -> String {
    unsafe { take_message(LLVMGetDefaultTargetTriple()) }
}

/// Normalize a triple to LLVM's canonical four-component form.
pub fn normalize_triple(triple: &str) -> TargetResult<String> {
    let triple = to_cstring(triple)?;
    Ok(unsafe { take_message(LLVMNormalizeTargetTriple(triple.as_ptr())) })
}

pub fn host_cpu_name() -> String {
    unsafe { take_message(LLVMGetHostCPUName()) }
}

pub fn host_cpu_features() -> String {
    unsafe { take_message(LLVMGetHostCPUFeatures()) }
}

/// The registry name LLVM uses for the architecture of `triple`, when it is
/// one with a single unambiguous backend.
pub fn expected_target_name(triple: &Triple) -> Option<&'static str> {
    let name = match triple.architecture {
        Architecture::X86_64 => "x86-64",
        Architecture::X86_32(_) => "x86",
        Architecture::Aarch64(Aarch64Architecture::Aarch64) => "aarch64",
        Architecture::Aarch64(Aarch64Architecture::Aarch64be) => "aarch64_be",
        Architecture::Riscv32(_) => "riscv32",
        Architecture::Riscv64(_) => "riscv64",
        Architecture::Wasm32 => "wasm32",
        Architecture::Wasm64 => "wasm64",
        Architecture::Powerpc64 => "ppc64",
        Architecture::Powerpc64le => "ppc64le",
        Architecture::S390x => "systemz",
        Architecture::Sparcv9 => "sparcv9",
        Architecture::Bpfel => "bpfel",
        Architecture::Bpfeb => "bpfeb",
        Architecture::Msp430 => "msp430",
        Architecture::Hexagon => "hexagon",
        Architecture::Nvptx64 => "nvptx64",
        Architecture::AmdGcn => "amdgcn",
        _ => return None,
    };
    Some(name)
}

/// A compiled-in backend from the target registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    raw: LLVMTargetRef,
}

// The registry is populated during initialization and read-only afterwards;
// targets are never freed.
unsafe impl Send for Target {}
unsafe impl Sync for Target {}

impl Target {
    fn from_raw(raw: LLVMTargetRef) -> Option<Self> {
        (!raw.is_null()).then_some(Target { raw })
    }

    pub(crate) fn from_raw_unchecked(raw: LLVMTargetRef) -> Self {
        debug_assert!(!raw.is_null());
        Target { raw }
    }

    pub(crate) fn as_raw(&self) -> LLVMTargetRef {
        self.raw
    }

    /// The first registered target, or `None` if nothing is registered yet.
    pub fn first() -> Option<Self> {
        Target::from_raw(unsafe { LLVMGetFirstTarget() })
    }

    /// The target registered after this one.
    pub fn next(self) -> Option<Self> {
        Target::from_raw(unsafe { LLVMGetNextTarget(self.raw) })
    }

    /// Every registered target, in registration order.
    pub fn all() -> Targets {
        Targets {
            next: Target::first(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = to_cstring(name).ok()?;
        Target::from_raw(unsafe { LLVMGetTargetFromName(name.as_ptr()) })
    }

    /// Resolve the target responsible for `triple`.
    pub fn from_triple(triple: &str) -> TargetResult<Self> {
        let c_triple = to_cstring(triple)?;
        let mut raw: LLVMTargetRef = ptr::null_mut();
        let mut message: *mut c_char = ptr::null_mut();

        let failed = unsafe { LLVMGetTargetFromTriple(c_triple.as_ptr(), &mut raw, &mut message) };
        if failed != 0 {
            let message = unsafe { take_message(message) };
            tracing::debug!(triple, %message, "target lookup failed");
            return Err(TargetError::resolution(message));
        }

        Target::from_raw(raw)
            .ok_or_else(|| TargetError::resolution(format!("no target for triple \"{triple}\"")))
    }

    pub fn from_lexicon_triple(triple: &Triple) -> TargetResult<Self> {
        Target::from_triple(&triple.to_string())
    }

    pub fn name(&self) -> String {
        unsafe { borrowed_str(LLVMGetTargetName(self.raw)) }
    }

    pub fn description(&self) -> String {
        unsafe { borrowed_str(LLVMGetTargetDescription(self.raw)) }
    }

    pub fn has_jit(&self) -> bool {
        unsafe { LLVMTargetHasJIT(self.raw) != 0 }
    }

    pub fn has_target_machine(&self) -> bool {
        unsafe { LLVMTargetHasTargetMachine(self.raw) != 0 }
    }

    pub fn has_asm_backend(&self) -> bool {
        unsafe { LLVMTargetHasAsmBackend(self.raw) != 0 }
    }

    pub fn create_target_machine(
        self,
        triple: &str,
        options: &TargetMachineOptions,
    ) -> TargetResult<TargetMachine> {
        TargetMachine::new(triple, self, options)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Target").field(&self.name()).finish()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Forward-only walk over the registry, started by [`Target::all`].
#[derive(Clone, Debug)]
pub struct Targets {
    next: Option<Target>,
}

impl Iterator for Targets {
    type Item = Target;

    fn next(&mut self) -> Option<Target> {
        let current = self.next?;
        self.next = current.next();
        Some(current)
    }
}

impl std::iter::FusedIterator for Targets {}
