//! Command execution context
//!
//! Builds the object graph every command runs against: the frozen
//! configuration, the materializer with its seams wired, the dispatcher,
//! and the toolchain. Constructed once per invocation, after `--chdir`.

use crate::cli::Cli;
use crate::error::Result;
use atmos_config::{AtmosConfig, ConfigLoader, ConfigOverrides};
use atmos_exec::{CancelToken, Dispatcher, StaticRemoteStateReader, TerraformOutputReader};
use atmos_fs::NormalizedPath;
use atmos_stack::{Materializer, StoreRegistry};
use atmos_toolchain::Toolchain;
use std::sync::Arc;

pub struct CommandContext {
    pub config: Arc<AtmosConfig>,
    pub project_root: NormalizedPath,
    pub materializer: Arc<Materializer>,
    pub dispatcher: Arc<Dispatcher>,
    pub toolchain: Toolchain,
    pub cancel: CancelToken,
}

impl CommandContext {
    pub fn build(cli: &Cli) -> Result<Self> {
        let overrides = ConfigOverrides {
            config_files: cli.config.clone(),
            base_path: cli.base_path.clone(),
            logs_level: cli.logs_level.clone(),
            logs_file: cli.logs_file.clone(),
        };
        let config = Arc::new(ConfigLoader::from_cwd(overrides)?.load()?);

        let cwd = std::env::current_dir()?;
        let base = NormalizedPath::new(&config.base_path);
        let project_root = if config.base_path.is_empty() || config.base_path == "." {
            NormalizedPath::new(&cwd)
        } else if base.is_absolute() {
            base
        } else {
            NormalizedPath::new(cwd.join(&config.base_path))
        };

        let cancel = CancelToken::new();
        {
            let cancel = cancel.clone();
            // A second Ctrl-C falls through to the default handler
            let _ = ctrlc::set_handler(move || cancel.cancel());
        }

        let materializer = Materializer::new(config.clone(), project_root.clone());
        let toolchain = Toolchain::new(&config, project_root.clone());
        let dispatcher = Arc::new(
            Dispatcher::new(config.clone(), project_root.clone(), cancel.clone())
                .with_path_prepend(Some(toolchain.path_prepend())),
        );

        materializer.set_output_reader(Arc::new(TerraformOutputReader::new(dispatcher.clone())));
        materializer.set_remote_state_reader(Arc::new(StaticRemoteStateReader));
        materializer.set_store_reader(Arc::new(StoreRegistry::new(
            &config,
            project_root.clone(),
        )));

        Ok(Self {
            config,
            project_root,
            materializer,
            dispatcher,
            toolchain,
            cancel,
        })
    }
}
