//! CLI argument parsing using clap derive

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Atmos - Terraform orchestration for hierarchical stack configurations
#[derive(Parser, Debug)]
#[command(name = "atmos")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change to this directory before doing anything else
    #[arg(long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Override base_path from atmos.yaml
    #[arg(long, global = true)]
    pub base_path: Option<String>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true)]
    pub logs_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub logs_file: Option<String>,

    /// Use these config files instead of searching for atmos.yaml
    #[arg(long, global = true)]
    pub config: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a terraform operation against a component
    ///
    /// Examples:
    ///   atmos terraform plan vpc -s plat-ue2-dev
    ///   atmos terraform apply vpc -s plat-ue2-dev -- -auto-approve
    ///   atmos terraform generate varfile vpc -s plat-ue2-dev
    Terraform {
        /// plan | apply | destroy | init | output | validate | workspace | generate
        operation: String,

        /// The component, or varfile|backend when operation is `generate`
        target: String,

        /// The component when operation is `generate`
        component: Option<String>,

        /// Stack to materialize against
        #[arg(short, long)]
        stack: String,

        /// Extra arguments passed to the tool verbatim
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Run a helmfile operation against a component
    Helmfile {
        operation: String,
        component: String,
        #[arg(short, long)]
        stack: String,
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Run a packer operation against a component
    Packer {
        operation: String,
        component: String,
        #[arg(short, long)]
        stack: String,
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Show materialized configuration
    Describe {
        #[command(subcommand)]
        what: DescribeCommands,
    },

    /// List stacks, components and their sections
    List {
        #[command(subcommand)]
        what: ListCommands,
    },

    /// Manage the project toolchain
    Toolchain {
        #[command(subcommand)]
        action: ToolchainCommands,
    },

    /// Run schema and policy validation
    Validate {
        #[command(subcommand)]
        what: ValidateCommands,
    },

    /// Run a named workflow
    Workflow {
        name: String,

        /// Workflow manifest (under workflows.base_path)
        #[arg(short, long)]
        file: String,

        /// Extra arguments exposed to workflow steps
        args: Vec<String>,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completion {
        /// Shell to generate for
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum DescribeCommands {
    /// Materialized configuration of one component
    Component {
        name: String,
        #[arg(short, long)]
        stack: String,
        /// Output format (yaml|json)
        #[arg(long, default_value = "yaml")]
        format: String,
        /// Render templates during materialization
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        process_templates: bool,
        /// Evaluate YAML functions during materialization
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        process_yaml_functions: bool,
    },

    /// Stack identities and their components
    Stacks {
        /// Limit to one stack
        #[arg(long)]
        stack: Option<String>,
        /// Include component listings
        #[arg(long)]
        components: bool,
        #[arg(long, default_value = "yaml")]
        format: String,
    },

    /// The merged process configuration
    Config {
        #[arg(long, default_value = "yaml")]
        format: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ListCommands {
    /// Component names, optionally filtered by stack and selector
    Components {
        #[arg(short, long)]
        stack: Option<String>,
        /// `key=value` / `key!=value` pairs over vars and settings
        #[arg(long)]
        selector: Option<String>,
    },

    /// Stack identities
    Stacks,

    /// A component's vars
    Vars {
        component: String,
        #[arg(short, long)]
        stack: String,
    },

    /// A component's vars, optionally narrowed by a dotted query
    Values {
        component: String,
        #[arg(short, long)]
        stack: String,
        #[arg(long)]
        query: Option<String>,
    },

    /// A component's settings
    Settings {
        component: String,
        #[arg(short, long)]
        stack: String,
    },

    /// A component's metadata
    Metadata {
        component: String,
        #[arg(short, long)]
        stack: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ToolchainCommands {
    /// Install tools (all from .tool-versions when none given)
    Install {
        /// `owner/repo[@version]` specs
        tools: Vec<String>,
    },

    /// List installed tools
    List,

    /// Print the path of an installed tool
    Which { name: String },

    /// Pin and activate a tool version
    Set {
        /// `owner/repo@version`
        tool: String,
    },

    /// Remove an installed tool
    Uninstall {
        /// `owner/repo`
        tool: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ValidateCommands {
    /// Materialize every stack and component, reporting failures
    Stacks,

    /// Run a component's validation policies
    Component {
        name: String,
        #[arg(short, long)]
        stack: String,
    },
}
