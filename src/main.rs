//! lltarget CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use lltarget::pipeline::{self, DriverResult, EmitRequest, LayoutSource};
use lltarget::report::{self, LayoutReport, MachineReport};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> DriverResult<()> {
    match command {
        Command::Targets { json } => {
            let targets = report::list_targets();
            if json {
                print_json(&targets)?;
            } else {
                for target in &targets {
                    println!("{target}");
                }
            }
        }
        Command::Layout {
            string,
            triple,
            json,
        } => {
            let source = LayoutSource::from_flags(string, triple);
            let layout = pipeline::load_layout(&source)?;
            let report = LayoutReport::for_layout(&layout);
            if json {
                print_json(&report)?;
            } else {
                print!("{report}");
            }
        }
        Command::Machine { machine, json } => {
            let target_machine =
                pipeline::create_machine(machine.triple.as_deref(), &machine.options())?;
            let report = MachineReport::for_machine(&target_machine);
            if json {
                print_json(&report)?;
            } else {
                print!("{report}");
            }
        }
        Command::Emit {
            input,
            output,
            filetype,
            machine,
            verbose_asm,
            passes,
        } => {
            let request = EmitRequest {
                input,
                output,
                file_type: filetype.into(),
                triple: machine.triple.clone(),
                machine: machine.options(),
                verbose_asm,
                pipeline: passes.config(),
                lto: passes.lto,
                internalize: passes.internalize,
            };
            pipeline::emit(&request)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> DriverResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
