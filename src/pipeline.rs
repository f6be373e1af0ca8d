//! Driver operations behind the command line.

use std::path::{Path, PathBuf};

use derive_more::{Display, From};
use lltarget_llvm::target::{default_triple, expected_target_name};
use lltarget_llvm::{
    Context, DataLayout, FileType, FunctionPassManager, Module, ModulePassManager,
    PassManagerBuilder, PipelineConfig, Target, TargetError, TargetMachine, TargetMachineOptions,
};

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Display, Debug, From)]
pub enum DriverError {
    #[display("{_0}")]
    Target(TargetError),

    #[display("cannot read {}: {source}", path.display())]
    #[from(ignore)]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[display("cannot encode report: {_0}")]
    Json(serde_json::Error),
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DriverError::Target(e) => Some(e),
            DriverError::Read { source, .. } => Some(source),
            DriverError::Json(e) => Some(e),
        }
    }
}

/// Resolve `triple` (or the default triple) to a registered target.
///
/// Registers every compiled-in target first, so cross triples resolve too.
pub fn resolve_target(triple: Option<&str>) -> DriverResult<(String, Target)> {
    lltarget_llvm::initialize_all();
    let triple = triple.map(str::to_string).unwrap_or_else(default_triple);
    let target = Target::from_triple(&triple)?;

    if let Some(expected) = triple
        .parse::<target_lexicon::Triple>()
        .ok()
        .as_ref()
        .and_then(expected_target_name)
    {
        if target.name() != expected {
            tracing::warn!(%triple, target = %target, expected, "triple resolved to an unexpected backend");
        }
    }

    tracing::debug!(%triple, target = %target, "resolved target");
    Ok((triple, target))
}

pub fn create_machine(
    triple: Option<&str>,
    options: &TargetMachineOptions,
) -> DriverResult<TargetMachine> {
    let (triple, target) = resolve_target(triple)?;
    Ok(TargetMachine::new(&triple, target, options)?)
}

/// Where a data layout comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutSource {
    Spec(String),
    Triple(String),
}

impl LayoutSource {
    /// An explicit layout string wins, then an explicit triple, then the
    /// default triple.
    pub fn from_flags(spec: Option<String>, triple: Option<String>) -> Self {
        match (spec, triple) {
            (Some(spec), _) => LayoutSource::Spec(spec),
            (None, Some(triple)) => LayoutSource::Triple(triple),
            (None, None) => LayoutSource::Triple(default_triple()),
        }
    }
}

pub fn load_layout(source: &LayoutSource) -> DriverResult<DataLayout> {
    match source {
        LayoutSource::Spec(spec) => Ok(DataLayout::parse(spec)?),
        LayoutSource::Triple(triple) => {
            let machine = create_machine(Some(triple), &TargetMachineOptions::default())?;
            Ok(machine.data_layout())
        }
    }
}

/// Everything needed to compile one IR file.
#[derive(Debug, Clone, Default)]
pub struct EmitRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub file_type: FileType,
    pub triple: Option<String>,
    pub machine: TargetMachineOptions,
    pub verbose_asm: bool,
    /// `None` emits the module as parsed.
    pub pipeline: Option<PipelineConfig>,
    pub lto: bool,
    pub internalize: bool,
}

/// Run the function and module pipelines described by `config` over `module`.
/// Returns whether anything changed.
pub fn optimize(
    module: &mut Module<'_>,
    machine: &TargetMachine,
    config: &PipelineConfig,
    lto: bool,
    internalize: bool,
) -> bool {
    let mut builder = PassManagerBuilder::from_config(config);

    let mut changed = {
        let fpm = FunctionPassManager::for_module(module);
        builder.populate_function_pass_manager(&fpm);
        fpm.run_on_all()
    };

    let mpm = ModulePassManager::new();
    machine.add_analysis_passes(&mpm);
    if lto {
        builder.populate_lto_pass_manager(&mpm, internalize, config.inliner_threshold.is_some());
    } else {
        builder.populate_module_pass_manager(&mpm);
    }
    changed |= mpm.run(module);
    changed
}

fn read_source(path: &Path) -> DriverResult<String> {
    std::fs::read_to_string(path).map_err(|source| DriverError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse, optionally optimize, and emit one IR file.
pub fn emit(request: &EmitRequest) -> DriverResult<()> {
    let source = read_source(&request.input)?;
    let mut machine = create_machine(request.triple.as_deref(), &request.machine)?;
    machine.set_verbose_asm(request.verbose_asm);

    let context = Context::new();
    let name = request.input.to_string_lossy();
    let mut module = Module::parse_ir(&context, &name, &source)?;
    module.set_triple(&machine.triple())?;
    module.set_data_layout(&machine.data_layout());

    if let Some(config) = &request.pipeline {
        let changed = optimize(&mut module, &machine, config, request.lto, request.internalize);
        tracing::info!(changed, lto = request.lto, "optimized module");
    }

    machine.emit_to_file(&module, request.file_type, &request.output)?;
    tracing::info!(output = %request.output.display(), file_type = ?request.file_type, "wrote output");
    Ok(())
}
