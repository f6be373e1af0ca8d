//! Command-line interface for lltarget.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use lltarget_llvm::{
    CodeGenOptLevel, CodeModel, FileType, PipelineConfig, RelocMode, TargetMachineOptions,
};

#[derive(Parser)]
#[command(name = "lltarget")]
#[command(about = "Inspect LLVM targets and data layouts, and compile IR", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every target compiled into LLVM
    Targets {
        #[arg(long)]
        json: bool,
    },
    /// Report sizes and alignments under a data layout
    Layout {
        /// Data layout string
        #[arg(long, conflicts_with = "triple")]
        string: Option<String>,
        /// Use the data layout of this triple's default target machine
        /// (defaults to LLVM's default triple when no source is given)
        #[arg(long)]
        triple: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Describe a target machine
    Machine {
        #[command(flatten)]
        machine: MachineArgs,
        #[arg(long)]
        json: bool,
    },
    /// Compile textual IR to assembly or an object file
    Emit {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = FileTypeArg::Obj)]
        filetype: FileTypeArg,
        #[command(flatten)]
        machine: MachineArgs,
        #[arg(long)]
        verbose_asm: bool,
        #[command(flatten)]
        passes: PassArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct MachineArgs {
    /// Target triple (defaults to LLVM's default triple)
    #[arg(long)]
    pub triple: Option<String>,
    #[arg(long)]
    pub cpu: Option<String>,
    /// Feature string such as `+avx2,-sse4.1`
    #[arg(long)]
    pub features: Option<String>,
    #[arg(long, value_enum)]
    pub codegen_opt: Option<OptLevelArg>,
    #[arg(long, value_enum)]
    pub reloc: Option<RelocArg>,
    #[arg(long, value_enum)]
    pub code_model: Option<CodeModelArg>,
}

impl MachineArgs {
    pub fn options(&self) -> TargetMachineOptions {
        TargetMachineOptions {
            cpu: self.cpu.clone(),
            features: self.features.clone(),
            opt_level: self.codegen_opt.map(Into::into),
            reloc_mode: self.reloc.map(Into::into),
            code_model: self.code_model.map(Into::into),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PassArgs {
    /// Run the optimization pipeline at this level (0-3)
    #[arg(short = 'O', value_parser = clap::value_parser!(u32).range(0..=3))]
    pub opt_level: Option<u32>,
    /// Size optimization level (1 = -Os, 2 = -Oz)
    #[arg(short = 's', long, value_parser = clap::value_parser!(u32).range(0..=2))]
    pub size_level: Option<u32>,
    #[arg(long)]
    pub inline_threshold: Option<u32>,
    #[arg(long)]
    pub no_unit_at_a_time: bool,
    #[arg(long)]
    pub no_unroll: bool,
    /// Use the link-time optimization pipeline instead of the module one
    #[arg(long)]
    pub lto: bool,
    #[arg(long, requires = "lto")]
    pub internalize: bool,
}

impl PassArgs {
    /// `None` when no pass flag was given. Any pass flag enables the
    /// pipeline, with unspecified levels taken from [`PipelineConfig::default`].
    pub fn config(&self) -> Option<PipelineConfig> {
        let requested = self.opt_level.is_some()
            || self.size_level.is_some()
            || self.inline_threshold.is_some()
            || self.no_unit_at_a_time
            || self.no_unroll
            || self.lto;
        if !requested {
            return None;
        }
        let defaults = PipelineConfig::default();
        Some(PipelineConfig {
            opt_level: self.opt_level.unwrap_or(defaults.opt_level),
            size_level: self.size_level.unwrap_or(defaults.size_level),
            inliner_threshold: self.inline_threshold,
            disable_unit_at_a_time: self.no_unit_at_a_time,
            disable_unroll_loops: self.no_unroll,
        })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTypeArg {
    Asm,
    Obj,
}

impl From<FileTypeArg> for FileType {
    fn from(arg: FileTypeArg) -> Self {
        match arg {
            FileTypeArg::Asm => FileType::Assembly,
            FileTypeArg::Obj => FileType::Object,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptLevelArg {
    None,
    Less,
    Default,
    Aggressive,
}

impl From<OptLevelArg> for CodeGenOptLevel {
    fn from(arg: OptLevelArg) -> Self {
        match arg {
            OptLevelArg::None => CodeGenOptLevel::None,
            OptLevelArg::Less => CodeGenOptLevel::Less,
            OptLevelArg::Default => CodeGenOptLevel::Default,
            OptLevelArg::Aggressive => CodeGenOptLevel::Aggressive,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocArg {
    Default,
    Static,
    Pic,
    DynamicNoPic,
    Ropi,
    Rwpi,
    RopiRwpi,
}

impl From<RelocArg> for RelocMode {
    fn from(arg: RelocArg) -> Self {
        match arg {
            RelocArg::Default => RelocMode::Default,
            RelocArg::Static => RelocMode::Static,
            RelocArg::Pic => RelocMode::Pic,
            RelocArg::DynamicNoPic => RelocMode::DynamicNoPic,
            RelocArg::Ropi => RelocMode::Ropi,
            RelocArg::Rwpi => RelocMode::Rwpi,
            RelocArg::RopiRwpi => RelocMode::RopiRwpi,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeModelArg {
    Default,
    JitDefault,
    Tiny,
    Small,
    Kernel,
    Medium,
    Large,
}

impl From<CodeModelArg> for CodeModel {
    fn from(arg: CodeModelArg) -> Self {
        match arg {
            CodeModelArg::Default => CodeModel::Default,
            CodeModelArg::JitDefault => CodeModel::JitDefault,
            CodeModelArg::Tiny => CodeModel::Tiny,
            CodeModelArg::Small => CodeModel::Small,
            CodeModelArg::Kernel => CodeModel::Kernel,
            CodeModelArg::Medium => CodeModel::Medium,
            CodeModelArg::Large => CodeModel::Large,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn emit_flags_build_pipeline_and_options() {
        let cli = Cli::try_parse_from([
            "lltarget",
            "emit",
            "in.ll",
            "-o",
            "out.s",
            "--filetype",
            "asm",
            "--cpu",
            "generic",
            "--reloc",
            "pic",
            "--code-model",
            "small",
            "-O",
            "3",
            "--inline-threshold",
            "275",
            "--no-unroll",
        ])
        .unwrap();

        let Command::Emit {
            filetype,
            machine,
            passes,
            ..
        } = cli.command
        else {
            panic!("expected emit");
        };

        assert_eq!(filetype, FileTypeArg::Asm);
        let options = machine.options();
        assert_eq!(options.cpu.as_deref(), Some("generic"));
        assert_eq!(options.reloc_mode, Some(RelocMode::Pic));
        assert_eq!(options.code_model, Some(CodeModel::Small));
        assert_eq!(options.opt_level, None);

        let config = passes.config().unwrap();
        assert_eq!(config.opt_level, 3);
        assert_eq!(config.inliner_threshold, Some(275));
        assert!(config.disable_unroll_loops);
    }

    #[test]
    fn no_pass_flags_means_no_pipeline() {
        let cli = Cli::try_parse_from(["lltarget", "emit", "in.ll", "-o", "out.o"]).unwrap();
        let Command::Emit { passes, .. } = cli.command else {
            panic!("expected emit");
        };
        assert!(passes.config().is_none());
    }

    #[test]
    fn tuning_flags_alone_enable_pipeline() {
        let cli = Cli::try_parse_from([
            "lltarget",
            "emit",
            "in.ll",
            "-o",
            "out.o",
            "--inline-threshold",
            "100",
            "--no-unroll",
        ])
        .unwrap();
        let Command::Emit { passes, .. } = cli.command else {
            panic!("expected emit");
        };

        let config = passes.config().unwrap();
        assert_eq!(config.opt_level, PipelineConfig::default().opt_level);
        assert_eq!(config.inliner_threshold, Some(100));
        assert!(config.disable_unroll_loops);
        assert!(!config.disable_unit_at_a_time);
    }

    #[test]
    fn unit_at_a_time_flag_enables_pipeline() {
        let cli = Cli::try_parse_from([
            "lltarget",
            "emit",
            "in.ll",
            "-o",
            "out.o",
            "--no-unit-at-a-time",
        ])
        .unwrap();
        let Command::Emit { passes, .. } = cli.command else {
            panic!("expected emit");
        };
        assert!(passes.config().unwrap().disable_unit_at_a_time);
    }

    #[test]
    fn layout_sources_are_exclusive() {
        let cli = Cli::try_parse_from(["lltarget", "layout"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Layout {
                string: None,
                triple: None,
                ..
            }
        ));
        assert!(
            Cli::try_parse_from(["lltarget", "layout", "--string", "e", "--triple", "x"]).is_err()
        );
    }
}
