//! Legacy pass managers.
//!
//! LLVM uses one handle type for both kinds; here they are separate types so
//! a function pipeline can never be handed to a module-level populate call,
//! and the other way around.

use llvm_sys::core::{
    LLVMCreateFunctionPassManagerForModule, LLVMCreatePassManager, LLVMDisposePassManager,
    LLVMFinalizeFunctionPassManager, LLVMInitializeFunctionPassManager,
    LLVMRunFunctionPassManager, LLVMRunPassManager,
};
use llvm_sys::prelude::LLVMPassManagerRef;

use crate::ir::Module;

/// Runs passes over a whole module.
pub struct ModulePassManager {
    raw: LLVMPassManagerRef,
}

impl ModulePassManager {
    pub fn new() -> Self {
        ModulePassManager {
            raw: unsafe { LLVMCreatePassManager() },
        }
    }

    pub(crate) fn as_raw(&self) -> LLVMPassManagerRef {
        self.raw
    }

    /// Run every scheduled pass. Returns whether the module changed.
    pub fn run(&self, module: &mut Module<'_>) -> bool {
        let changed = unsafe { LLVMRunPassManager(self.raw, module.as_raw()) != 0 };
        tracing::debug!(changed, "ran module passes");
        changed
    }
}

impl Default for ModulePassManager {
    fn default() -> Self {
        ModulePassManager::new()
    }
}

impl Drop for ModulePassManager {
    fn drop(&mut self) {
        unsafe { LLVMDisposePassManager(self.raw) }
    }
}

/// Runs passes over the functions of one module.
pub struct FunctionPassManager<'m, 'ctx> {
    raw: LLVMPassManagerRef,
    module: &'m Module<'ctx>,
}

impl<'m, 'ctx> FunctionPassManager<'m, 'ctx> {
    pub fn for_module(module: &'m Module<'ctx>) -> Self {
        FunctionPassManager {
            raw: unsafe { LLVMCreateFunctionPassManagerForModule(module.as_raw()) },
            module,
        }
    }

    pub(crate) fn as_raw(&self) -> LLVMPassManagerRef {
        self.raw
    }

    /// Run the initializers of every scheduled pass.
    pub fn initialize(&self) -> bool {
        unsafe { LLVMInitializeFunctionPassManager(self.raw) != 0 }
    }

    pub fn finalize(&self) -> bool {
        unsafe { LLVMFinalizeFunctionPassManager(self.raw) != 0 }
    }

    /// Initialize, run over every function with a body, and finalize.
    /// Returns whether any function changed.
    pub fn run_on_all(&self) -> bool {
        let mut changed = self.initialize();
        for function in self.module.functions().filter(|f| !f.is_declaration()) {
            changed |= unsafe { LLVMRunFunctionPassManager(self.raw, function.as_raw()) != 0 };
        }
        changed |= self.finalize();
        tracing::debug!(changed, "ran function passes");
        changed
    }
}

impl Drop for FunctionPassManager<'_, '_> {
    fn drop(&mut self) {
        unsafe { LLVMDisposePassManager(self.raw) }
    }
}
