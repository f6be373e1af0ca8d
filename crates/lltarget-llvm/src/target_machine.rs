//! Target machines: a target plus triple, CPU, features and code generation
//! options, able to turn a module into assembly or object code.

use std::ffi::c_char;
use std::fmt;
use std::path::Path;
use std::ptr;

use llvm_sys::prelude::LLVMMemoryBufferRef;
use llvm_sys::target_machine::{
    LLVMAddAnalysisPasses, LLVMCodeGenFileType, LLVMCodeGenOptLevel, LLVMCodeModel,
    LLVMCreateTargetDataLayout, LLVMCreateTargetMachine, LLVMDisposeTargetMachine,
    LLVMGetTargetMachineCPU, LLVMGetTargetMachineFeatureString, LLVMGetTargetMachineTarget,
    LLVMGetTargetMachineTriple, LLVMRelocMode, LLVMSetTargetMachineAsmVerbosity,
    LLVMTargetMachineEmitToFile, LLVMTargetMachineEmitToMemoryBuffer, LLVMTargetMachineRef,
};
use serde::{Deserialize, Serialize};

use crate::data_layout::DataLayout;
use crate::errors::{TargetError, TargetResult};
use crate::ir::{MemoryBuffer, Module};
use crate::message::{path_to_cstring, take_message, to_cstring};
use crate::pass_manager::ModulePassManager;
use crate::target::Target;

/// Kind of file produced by code emission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    #[default]
    Assembly,
    Object,
}

impl FileType {
    fn to_llvm(self) -> LLVMCodeGenFileType {
        match self {
            FileType::Assembly => LLVMCodeGenFileType::LLVMAssemblyFile,
            FileType::Object => LLVMCodeGenFileType::LLVMObjectFile,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodeGenOptLevel {
    None,
    Less,
    #[default]
    Default,
    Aggressive,
}

impl CodeGenOptLevel {
    fn to_llvm(self) -> LLVMCodeGenOptLevel {
        match self {
            CodeGenOptLevel::None => LLVMCodeGenOptLevel::LLVMCodeGenLevelNone,
            CodeGenOptLevel::Less => LLVMCodeGenOptLevel::LLVMCodeGenLevelLess,
            CodeGenOptLevel::Default => LLVMCodeGenOptLevel::LLVMCodeGenLevelDefault,
            CodeGenOptLevel::Aggressive => LLVMCodeGenOptLevel::LLVMCodeGenLevelAggressive,
        }
    }
}

/// Relocation model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelocMode {
    #[default]
    Default,
    Static,
    Pic,
    DynamicNoPic,
    Ropi,
    Rwpi,
    RopiRwpi,
}

impl RelocMode {
    fn to_llvm(self) -> LLVMRelocMode {
        match self {
            RelocMode::Default => LLVMRelocMode::LLVMRelocDefault,
            RelocMode::Static => LLVMRelocMode::LLVMRelocStatic,
            RelocMode::Pic => LLVMRelocMode::LLVMRelocPIC,
            RelocMode::DynamicNoPic => LLVMRelocMode::LLVMRelocDynamicNoPic,
            RelocMode::Ropi => LLVMRelocMode::LLVMRelocROPI,
            RelocMode::Rwpi => LLVMRelocMode::LLVMRelocRWPI,
            RelocMode::RopiRwpi => LLVMRelocMode::LLVMRelocROPI_RWPI,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodeModel {
    #[default]
    Default,
    JitDefault,
    Tiny,
    Small,
    Kernel,
    Medium,
    Large,
}

impl CodeModel {
    fn to_llvm(self) -> LLVMCodeModel {
        match self {
            CodeModel::Default => LLVMCodeModel::LLVMCodeModelDefault,
            CodeModel::JitDefault => LLVMCodeModel::LLVMCodeModelJITDefault,
            CodeModel::Tiny => LLVMCodeModel::LLVMCodeModelTiny,
            CodeModel::Small => LLVMCodeModel::LLVMCodeModelSmall,
            CodeModel::Kernel => LLVMCodeModel::LLVMCodeModelKernel,
            CodeModel::Medium => LLVMCodeModel::LLVMCodeModelMedium,
            CodeModel::Large => LLVMCodeModel::LLVMCodeModelLarge,
        }
    }
}

/// Optional settings for [`TargetMachine::new`]. Absent fields fall back to
/// an empty CPU/feature string and LLVM's default enumerators.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetMachineOptions {
    pub cpu: Option<String>,
    pub features: Option<String>,
    pub opt_level: Option<CodeGenOptLevel>,
    pub reloc_mode: Option<RelocMode>,
    pub code_model: Option<CodeModel>,
}

/// [`TargetMachineOptions`] with every default filled in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOptions<'a> {
    pub cpu: &'a str,
    pub features: &'a str,
    pub opt_level: CodeGenOptLevel,
    pub reloc_mode: RelocMode,
    pub code_model: CodeModel,
}

impl TargetMachineOptions {
    pub fn cpu(mut self, cpu: impl Into<String>) -> Self {
        self.cpu = Some(cpu.into());
        self
    }

    pub fn features(mut self, features: impl Into<String>) -> Self {
        self.features = Some(features.into());
        self
    }

    pub fn opt_level(mut self, level: CodeGenOptLevel) -> Self {
        self.opt_level = Some(level);
        self
    }

    pub fn reloc_mode(mut self, mode: RelocMode) -> Self {
        self.reloc_mode = Some(mode);
        self
    }

    pub fn code_model(mut self, model: CodeModel) -> Self {
        self.code_model = Some(model);
        self
    }

    pub fn resolved(&self) -> ResolvedOptions<'_> {
        ResolvedOptions {
            cpu: self.cpu.as_deref().unwrap_or(""),
            features: self.features.as_deref().unwrap_or(""),
            opt_level: self.opt_level.unwrap_or_default(),
            reloc_mode: self.reloc_mode.unwrap_or_default(),
            code_model: self.code_model.unwrap_or_default(),
        }
    }
}

/// An owned target machine.
pub struct TargetMachine {
    raw: LLVMTargetMachineRef,
}

impl TargetMachine {
    /// Create a target machine for `triple` on `target`.
    ///
    /// The triple is not validated here; resolve it with
    /// [`Target::from_triple`] first.
    pub fn new(
        triple: &str,
        target: Target,
        options: &TargetMachineOptions,
    ) -> TargetResult<Self> {
        let resolved = options.resolved();
        let c_triple = to_cstring(triple)?;
        let cpu = to_cstring(resolved.cpu)?;
        let features = to_cstring(resolved.features)?;

        let raw = unsafe {
            LLVMCreateTargetMachine(
                target.as_raw(),
                c_triple.as_ptr(),
                cpu.as_ptr(),
                features.as_ptr(),
                resolved.opt_level.to_llvm(),
                resolved.reloc_mode.to_llvm(),
                resolved.code_model.to_llvm(),
            )
        };
        if raw.is_null() {
            return Err(TargetError::machine_creation(format!(
                "target {} cannot create a machine for \"{triple}\"",
                target.name()
            )));
        }

        tracing::debug!(
            target = %target,
            triple,
            cpu = resolved.cpu,
            features = resolved.features,
            opt_level = ?resolved.opt_level,
            reloc_mode = ?resolved.reloc_mode,
            code_model = ?resolved.code_model,
            "created target machine"
        );
        Ok(TargetMachine { raw })
    }

    /// A machine for the host: default triple, host CPU and features.
    pub fn host(opt_level: CodeGenOptLevel) -> TargetResult<Self> {
        crate::target::initialize_native()?;
        let triple = crate::target::default_triple();
        let target = Target::from_triple(&triple)?;
        let options = TargetMachineOptions::default()
            .cpu(crate::target::host_cpu_name())
            .features(crate::target::host_cpu_features())
            .opt_level(opt_level);
        TargetMachine::new(&triple, target, &options)
    }

    pub fn target(&self) -> Target {
        let raw = unsafe { LLVMGetTargetMachineTarget(self.raw) };
        Target::from_raw_unchecked(raw)
    }

    pub fn triple(&self) -> String {
        unsafe { take_message(LLVMGetTargetMachineTriple(self.raw)) }
    }

    pub fn cpu(&self) -> String {
        unsafe { take_message(LLVMGetTargetMachineCPU(self.raw)) }
    }

    pub fn features(&self) -> String {
        unsafe { take_message(LLVMGetTargetMachineFeatureString(self.raw)) }
    }

    /// A new data layout describing this machine, owned by the caller.
    pub fn data_layout(&self) -> DataLayout {
        unsafe { DataLayout::from_owned_raw(LLVMCreateTargetDataLayout(self.raw)) }
    }

    pub fn set_verbose_asm(&mut self, verbose: bool) {
        unsafe { LLVMSetTargetMachineAsmVerbosity(self.raw, verbose as i32) }
    }

    /// Add this machine's target-specific analyses to `pass_manager`.
    pub fn add_analysis_passes(&self, pass_manager: &ModulePassManager) {
        unsafe { LLVMAddAnalysisPasses(self.raw, pass_manager.as_raw()) }
    }

    /// Compile `module` and write the result to `path`.
    pub fn emit_to_file(
        &self,
        module: &Module<'_>,
        file_type: FileType,
        path: &Path,
    ) -> TargetResult<()> {
        let c_path = path_to_cstring(path)?;
        let mut message: *mut c_char = ptr::null_mut();

        let failed = unsafe {
            LLVMTargetMachineEmitToFile(
                self.raw,
                module.as_raw(),
                c_path.as_ptr() as *mut c_char,
                file_type.to_llvm(),
                &mut message,
            )
        };
        if failed != 0 {
            let message = unsafe { take_message(message) };
            tracing::debug!(?file_type, path = %path.display(), %message, "emission failed");
            return Err(TargetError::codegen(message));
        }

        tracing::debug!(?file_type, path = %path.display(), "emitted to file");
        Ok(())
    }

    /// Compile `module` into a memory buffer owned by the caller.
    pub fn emit_to_memory_buffer(
        &self,
        module: &Module<'_>,
        file_type: FileType,
    ) -> TargetResult<MemoryBuffer> {
        let mut message: *mut c_char = ptr::null_mut();
        let mut buffer: LLVMMemoryBufferRef = ptr::null_mut();

        let failed = unsafe {
            LLVMTargetMachineEmitToMemoryBuffer(
                self.raw,
                module.as_raw(),
                file_type.to_llvm(),
                &mut message,
                &mut buffer,
            )
        };
        if failed != 0 {
            let message = unsafe { take_message(message) };
            tracing::debug!(?file_type, %message, "emission failed");
            return Err(TargetError::codegen(message));
        }

        let buffer = unsafe { MemoryBuffer::from_raw(buffer) };
        tracing::debug!(?file_type, len = buffer.len(), "emitted to memory");
        Ok(buffer)
    }
}

impl Drop for TargetMachine {
    fn drop(&mut self) {
        tracing::trace!("disposing target machine");
        unsafe { LLVMDisposeTargetMachine(self.raw) }
    }
}

impl fmt::Debug for TargetMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetMachine")
            .field("target", &self.target())
            .field("triple", &self.triple())
            .field("cpu", &self.cpu())
            .field("features", &self.features())
            .finish()
    }
}
