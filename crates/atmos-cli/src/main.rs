//! Atmos CLI
//!
//! Parses arguments, applies `--chdir` exactly once, loads the frozen
//! configuration, wires the subsystem graph and runs the requested
//! command. Exit codes: 0 success, 2 validation failure, a spawned tool's
//! own code, 1 for everything else.

mod cli;
mod commands;
mod context;
mod error;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, DescribeCommands, ListCommands, ToolchainCommands, ValidateCommands};
use commands::{component_ops, describe, list, toolchain, validate, workflow};
use context::CommandContext;
use error::Result;

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            std::process::exit(e.exit_code());
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    // --chdir first, before any path or config resolution
    if let Some(dir) = &cli.chdir {
        atmos_config::apply_chdir(dir)?;
    }

    // Completions and version need no configuration
    match &cli.command {
        Commands::Version => {
            println!("atmos {}", env!("CARGO_PKG_VERSION"));
            return Ok(0);
        }
        Commands::Completion { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(*shell, &mut command, "atmos", &mut std::io::stdout());
            return Ok(0);
        }
        _ => {}
    }

    init_tracing(&cli);
    let ctx = CommandContext::build(&cli)?;

    match cli.command {
        Commands::Terraform {
            operation,
            target,
            component,
            stack,
            args,
        } => {
            let (operation, component) = component_ops::resolve_terraform_operation(
                &operation,
                &target,
                component.as_deref(),
            )?;
            component_ops::run(&ctx, "terraform", &operation, component, &stack, &args)
        }
        Commands::Helmfile {
            operation,
            component,
            stack,
            args,
        } => component_ops::run(&ctx, "helmfile", &operation, &component, &stack, &args),
        Commands::Packer {
            operation,
            component,
            stack,
            args,
        } => component_ops::run(&ctx, "packer", &operation, &component, &stack, &args),

        Commands::Describe { what } => {
            let output = match what {
                DescribeCommands::Component {
                    name,
                    stack,
                    format,
                    process_templates,
                    process_yaml_functions,
                } => describe::component(
                    &ctx,
                    &name,
                    &stack,
                    &format,
                    process_templates,
                    process_yaml_functions,
                )?,
                DescribeCommands::Stacks {
                    stack,
                    components,
                    format,
                } => describe::stacks(&ctx, stack.as_deref(), components, &format)?,
                DescribeCommands::Config { format } => describe::config(&ctx, &format)?,
            };
            print!("{output}");
            Ok(0)
        }

        Commands::List { what } => {
            let output = match what {
                ListCommands::Components { stack, selector } => {
                    list::components(&ctx, stack.as_deref(), selector.as_deref())?.join("\n")
                }
                ListCommands::Stacks => list::stacks(&ctx)?.join("\n"),
                ListCommands::Vars { component, stack } => {
                    list::section(&ctx, &component, &stack, list::Section::Vars)?
                }
                ListCommands::Values {
                    component,
                    stack,
                    query,
                } => list::values(&ctx, &component, &stack, query.as_deref())?,
                ListCommands::Settings { component, stack } => {
                    list::section(&ctx, &component, &stack, list::Section::Settings)?
                }
                ListCommands::Metadata { component, stack } => {
                    list::section(&ctx, &component, &stack, list::Section::Metadata)?
                }
            };
            println!("{output}");
            Ok(0)
        }

        Commands::Toolchain { action } => {
            let output = match action {
                ToolchainCommands::Install { tools } => toolchain::install(&ctx, &tools)?,
                ToolchainCommands::List => toolchain::list(&ctx)?,
                ToolchainCommands::Which { name } => toolchain::which(&ctx, &name)?,
                ToolchainCommands::Set { tool } => toolchain::set(&ctx, &tool)?,
                ToolchainCommands::Uninstall { tool } => toolchain::uninstall(&ctx, &tool)?,
            };
            println!("{output}");
            Ok(0)
        }

        Commands::Validate { what } => {
            let output = match what {
                ValidateCommands::Stacks => validate::stacks(&ctx)?,
                ValidateCommands::Component { name, stack } => {
                    validate::component(&ctx, &name, &stack)?
                }
            };
            println!("{output}");
            Ok(0)
        }

        Commands::Workflow { name, file, args } => workflow::run(&ctx, &name, &file, &args),

        Commands::Version | Commands::Completion { .. } => unreachable!("handled above"),
    }
}

fn init_tracing(cli: &Cli) {
    let level = cli.logs_level.as_deref().unwrap_or("info").to_string();
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.clone()))
    };

    if let Some(path) = &cli.logs_file {
        match std::fs::File::create(path) {
            Ok(file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter())
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file))
                    .try_init();
                return;
            }
            Err(e) => eprintln!(
                "{}: cannot open log file {path}: {e}",
                "warning".yellow().bold()
            ),
        }
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
