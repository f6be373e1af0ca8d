//! Staged configuration for LLVM's standard optimization pipelines.
//!
//! A [`PassManagerBuilder`] collects optimization settings and then fills a
//! function-level, module-level or link-time pass manager with the matching
//! pipeline. Levels are passed to LLVM as given.

use llvm_sys::transforms::pass_manager_builder::{
    LLVMPassManagerBuilderCreate, LLVMPassManagerBuilderDispose,
    LLVMPassManagerBuilderPopulateFunctionPassManager,
    LLVMPassManagerBuilderPopulateLTOPassManager,
    LLVMPassManagerBuilderPopulateModulePassManager, LLVMPassManagerBuilderRef,
    LLVMPassManagerBuilderSetDisableUnitAtATime, LLVMPassManagerBuilderSetDisableUnrollLoops,
    LLVMPassManagerBuilderSetOptLevel, LLVMPassManagerBuilderSetSizeLevel,
    LLVMPassManagerBuilderUseInlinerWithThreshold,
};
use serde::{Deserialize, Serialize};

use crate::pass_manager::{FunctionPassManager, ModulePassManager};

/// Every builder setting in one value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub opt_level: u32,
    pub size_level: u32,
    /// `None` leaves the pipeline without an inliner.
    pub inliner_threshold: Option<u32>,
    pub disable_unit_at_a_time: bool,
    pub disable_unroll_loops: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            opt_level: 2,
            size_level: 0,
            inliner_threshold: None,
            disable_unit_at_a_time: false,
            disable_unroll_loops: false,
        }
    }
}

/// An owned pass manager builder.
pub struct PassManagerBuilder {
    raw: LLVMPassManagerBuilderRef,
}

impl PassManagerBuilder {
    pub fn new() -> Self {
        PassManagerBuilder {
            raw: unsafe { LLVMPassManagerBuilderCreate() },
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut builder = PassManagerBuilder::new();
        builder.set_opt_level(config.opt_level);
        builder.set_size_level(config.size_level);
        if let Some(threshold) = config.inliner_threshold {
            builder.use_inliner_with_threshold(threshold);
        }
        builder.set_disable_unit_at_a_time(config.disable_unit_at_a_time);
        builder.set_disable_unroll_loops(config.disable_unroll_loops);
        tracing::debug!(?config, "configured pass manager builder");
        builder
    }

    /// 0 to 3, like `-O0` to `-O3`.
    pub fn set_opt_level(&mut self, level: u32) {
        unsafe { LLVMPassManagerBuilderSetOptLevel(self.raw, level) }
    }

    /// 0 for none, 1 for `-Os`, 2 for `-Oz`.
    pub fn set_size_level(&mut self, level: u32) {
        unsafe { LLVMPassManagerBuilderSetSizeLevel(self.raw, level) }
    }

    /// Schedule the function inliner with the given cost threshold.
    ///
    /// The inliner is handed over to the first populate call that schedules
    /// it; later populates from the same builder run without it.
    pub fn use_inliner_with_threshold(&mut self, threshold: u32) {
        unsafe { LLVMPassManagerBuilderUseInlinerWithThreshold(self.raw, threshold) }
    }

    pub fn set_disable_unit_at_a_time(&mut self, disable: bool) {
        unsafe { LLVMPassManagerBuilderSetDisableUnitAtATime(self.raw, disable as i32) }
    }

    pub fn set_disable_unroll_loops(&mut self, disable: bool) {
        unsafe { LLVMPassManagerBuilderSetDisableUnrollLoops(self.raw, disable as i32) }
    }

    pub fn populate_function_pass_manager(&self, pass_manager: &FunctionPassManager<'_, '_>) {
        unsafe { LLVMPassManagerBuilderPopulateFunctionPassManager(self.raw, pass_manager.as_raw()) }
    }

    /// Fill `pass_manager` with the module-level pipeline.
    ///
    /// A configured inliner moves into `pass_manager`; the builder no
    /// longer holds one afterwards.
    pub fn populate_module_pass_manager(&mut self, pass_manager: &ModulePassManager) {
        unsafe { LLVMPassManagerBuilderPopulateModulePassManager(self.raw, pass_manager.as_raw()) }
    }

    /// Fill `pass_manager` with the link-time optimization pipeline.
    ///
    /// With `run_inliner` set and no inliner configured, LLVM installs its
    /// default inliner on this builder first.
    pub fn populate_lto_pass_manager(
        &mut self,
        pass_manager: &ModulePassManager,
        internalize: bool,
        run_inliner: bool,
    ) {
        unsafe {
            LLVMPassManagerBuilderPopulateLTOPassManager(
                self.raw,
                pass_manager.as_raw(),
                internalize as i32,
                run_inliner as i32,
            )
        }
    }
}

impl Default for PassManagerBuilder {
    fn default() -> Self {
        PassManagerBuilder::new()
    }
}

impl Drop for PassManagerBuilder {
    fn drop(&mut self) {
        unsafe { LLVMPassManagerBuilderDispose(self.raw) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Context, Module};

    const STACK_SLOT_IR: &str = r#"
define i32 @f(i32 %x) {
  %p = alloca i32
  store i32 %x, i32* %p
  %v = load i32, i32* %p
  ret i32 %v
}
"#;

    const SCALE_IR: &str = r#"
define i32 @scale(i32 %x) {
  %r = mul i32 %x, 3
  ret i32 %r
}

define i32 @sum(i32 %a, i32 %b) {
  %p = call i32 @scale(i32 %a)
  %q = call i32 @scale(i32 %b)
  %s = add i32 %p, %q
  ret i32 %s
}
"#;

    #[test]
    fn function_pipeline_promotes_stack_slots() {
        let context = Context::new();
        let module = Module::parse_ir(&context, "slots", STACK_SLOT_IR).unwrap();

        let mut builder = PassManagerBuilder::new();
        builder.set_opt_level(2);
        {
            let fpm = FunctionPassManager::for_module(&module);
            builder.populate_function_pass_manager(&fpm);
            assert!(fpm.run_on_all());
        }
        assert!(!module.print_to_string().contains("alloca"));
    }

    #[test]
    fn opt_level_zero_keeps_stack_slots() {
        let context = Context::new();
        let module = Module::parse_ir(&context, "slots", STACK_SLOT_IR).unwrap();

        let mut builder = PassManagerBuilder::new();
        builder.set_opt_level(0);
        {
            let fpm = FunctionPassManager::for_module(&module);
            builder.populate_function_pass_manager(&fpm);
            fpm.run_on_all();
        }
        assert!(module.print_to_string().contains("alloca"));
    }

    fn run_module_pipeline(config: &PipelineConfig, source: &str) -> String {
        let context = Context::new();
        let mut module = Module::parse_ir(&context, "pipeline", source).unwrap();

        let mut builder = PassManagerBuilder::from_config(config);
        let mpm = ModulePassManager::new();
        builder.populate_module_pass_manager(&mpm);
        mpm.run(&mut module);
        module.print_to_string()
    }

    #[test]
    fn module_pipeline_without_inliner_keeps_calls() {
        let text = run_module_pipeline(&PipelineConfig::default(), SCALE_IR);
        assert_eq!(text.matches("call i32 @scale").count(), 2, "{text}");
    }

    #[test]
    fn inliner_threshold_schedules_the_inliner() {
        let config = PipelineConfig {
            inliner_threshold: Some(225),
            ..PipelineConfig::default()
        };
        let text = run_module_pipeline(&config, SCALE_IR);
        assert!(!text.contains("call i32 @scale"), "call survived:\n{text}");
        // `@scale` is externally visible, so its definition stays.
        assert!(text.contains("define i32 @scale"), "{text}");
    }

    #[test]
    fn inliner_moves_into_first_module_pipeline() {
        let context = Context::new();
        let mut first = Module::parse_ir(&context, "first", SCALE_IR).unwrap();
        let mut second = Module::parse_ir(&context, "second", SCALE_IR).unwrap();

        let mut builder = PassManagerBuilder::from_config(&PipelineConfig {
            inliner_threshold: Some(225),
            ..PipelineConfig::default()
        });
        let first_mpm = ModulePassManager::new();
        builder.populate_module_pass_manager(&first_mpm);
        let second_mpm = ModulePassManager::new();
        builder.populate_module_pass_manager(&second_mpm);

        first_mpm.run(&mut first);
        second_mpm.run(&mut second);
        assert!(!first.print_to_string().contains("call i32 @scale"));
        assert!(second.print_to_string().contains("call i32 @scale"));
    }

    #[test]
    fn inliner_threshold_does_not_touch_opt_level() {
        let mut builder = PassManagerBuilder::new();
        builder.set_opt_level(0);
        builder.use_inliner_with_threshold(225);
        let context = Context::new();
        let mut module = Module::parse_ir(&context, "o0", STACK_SLOT_IR).unwrap();
        {
            let fpm = FunctionPassManager::for_module(&module);
            builder.populate_function_pass_manager(&fpm);
            fpm.run_on_all();
        }
        let mpm = ModulePassManager::new();
        builder.populate_module_pass_manager(&mpm);
        mpm.run(&mut module);
        assert!(module.print_to_string().contains("alloca"));
    }

    fn run_lto_pipeline(run_inliner: bool) -> String {
        let context = Context::new();
        let mut module = Module::parse_ir(&context, "lto", SCALE_IR).unwrap();

        let mut builder = PassManagerBuilder::new();
        builder.set_opt_level(2);
        builder.set_disable_unroll_loops(true);
        let mpm = ModulePassManager::new();
        builder.populate_lto_pass_manager(&mpm, false, run_inliner);
        mpm.run(&mut module);
        module.print_to_string()
    }

    #[test]
    fn lto_pipeline_runs_inliner_on_request() {
        let inlined = run_lto_pipeline(true);
        assert!(!inlined.contains("call i32 @scale"), "{inlined}");

        let kept = run_lto_pipeline(false);
        assert!(kept.contains("call i32 @scale"), "{kept}");
    }

    #[test]
    fn default_config_matches_builder_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.opt_level, 2);
        assert_eq!(config.size_level, 0);
        assert_eq!(config.inliner_threshold, None);
        assert!(!config.disable_unit_at_a_time);
        assert!(!config.disable_unroll_loops);
    }
}
