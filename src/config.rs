use std::path::PathBuf;

use crate::errors::SettingsError;
use crate::timeline::PipelineType;

pub const STORE_DIR_ENV: &str = "PIPELINE_STORE_DIR";
pub const DEFAULT_STORE_DIR: &str = ".pipeline-store";

/// Settings of the interactive front-end.
///
/// `cli [culture|curing] [--store-dir DIR] [--verbose]`; the store directory
/// falls back to `$PIPELINE_STORE_DIR`, then to `.pipeline-store`.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub pipeline: PipelineType,
    pub store_dir: PathBuf,
    pub verbose: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self::from_args_and_env(&args, std::env::var(STORE_DIR_ENV).ok())
    }

    /// Parse `args` (program name excluded) with `env_store_dir` standing in
    /// for the environment.
    pub fn from_args_and_env(
        args: &[String],
        env_store_dir: Option<String>,
    ) -> Result<Self, SettingsError> {
        let mut pipeline = PipelineType::Culture;
        let mut store_dir = None;
        let mut verbose = false;

        let mut args = args.iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--verbose" | "-v" => verbose = true,
                "--store-dir" => {
                    let dir = args
                        .next()
                        .ok_or_else(|| SettingsError::MissingValue(arg.clone()))?;
                    store_dir = Some(PathBuf::from(dir));
                }
                flag if flag.starts_with('-') => {
                    return Err(SettingsError::UnknownFlag(flag.to_string()));
                }
                name => pipeline = name.parse()?,
            }
        }

        let store_dir = store_dir
            .or_else(|| env_store_dir.filter(|d| !d.is_empty()).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));

        Ok(Settings {
            pipeline,
            store_dir,
            verbose,
        })
    }

    /// Default `env_logger` filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose { "info" } else { "warn" }
    }
}
