use std::{
	env, fs,
	path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

/// Snapshots kept after a cleanup pass.
pub const DEFAULT_RETAIN: usize = 5;

/// Config file picked up from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "shopdb.toml";

pub const ENV_ROOT: &str = "SHOPDB_ROOT";
pub const ENV_DATA_DIR: &str = "SHOPDB_DATA_DIR";
pub const ENV_BACKUP_DIR: &str = "SHOPDB_BACKUP_DIR";
pub const ENV_RETAIN: &str = "SHOPDB_RETAIN";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file {}: {source}", .path.display())]
	Read {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("invalid config file {}: {source}", .path.display())]
	Parse {
		path: PathBuf,
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {value}")]
	InvalidValue { key: String, value: String },

	#[error("retain must be at least 1")]
	ZeroRetain,

	#[error("no data directory could be determined; set SHOPDB_ROOT")]
	NoRoot,
}

/// Where the live collections and the snapshots live.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
	pub data_dir: PathBuf,
	pub backup_dir: PathBuf,
	/// Always at least 1; set through [`StoreConfig::with_retain`].
	retain: usize,
	pub log_dir: Option<PathBuf>,
}

/// On-disk shape of `shopdb.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
	root: Option<PathBuf>,
	data_dir: Option<PathBuf>,
	backup_dir: Option<PathBuf>,
	retain: Option<usize>,
	log_dir: Option<PathBuf>,
}

impl StoreConfig {
	/// `<root>/data` and `<root>/backup`.
	pub fn from_root(root: impl AsRef<Path>) -> Self {
		let root = root.as_ref();
		Self {
			data_dir: root.join("data"),
			backup_dir: root.join("backup"),
			retain: DEFAULT_RETAIN,
			log_dir: None,
		}
	}

	/// Snapshots kept after a cleanup pass.
	pub fn retain(&self) -> usize {
		self.retain
	}

	pub fn with_retain(mut self, retain: usize) -> Result<Self, ConfigError> {
		if retain == 0 {
			return Err(ConfigError::ZeroRetain);
		}
		self.retain = retain;
		Ok(self)
	}

	/// Resolve configuration: explicit root, then environment, then config
	/// file, then the platform data directory.
	pub fn resolve(root: Option<&Path>, config_file: Option<&Path>) -> Result<Self, ConfigError> {
		let file = match config_file {
			Some(path) => load_file(path)?,
			None => {
				let default = Path::new(DEFAULT_CONFIG_FILE);
				if default.is_file() {
					load_file(default)?
				} else {
					FileConfig::default()
				}
			}
		};

		Self::merge(root, &EnvVars::capture(), file)
	}

	fn merge(root: Option<&Path>, env: &EnvVars, file: FileConfig) -> Result<Self, ConfigError> {
		let base_root = match (root, &env.root, &file.root) {
			(Some(r), _, _) => Some(r.to_path_buf()),
			(None, Some(r), _) => Some(r.clone()),
			(None, None, Some(r)) => Some(r.clone()),
			(None, None, None) => dirs::data_local_dir().map(|d| d.join("shopdb")),
		};

		let explicit_root = root.is_some();
		let pick = |env_value: &Option<PathBuf>, file_value: &Option<PathBuf>, leaf: &str| -> Result<PathBuf, ConfigError> {
			if !explicit_root {
				if let Some(v) = env_value.clone().or_else(|| file_value.clone()) {
					return Ok(v);
				}
			}
			base_root.as_ref().map(|r| r.join(leaf)).ok_or(ConfigError::NoRoot)
		};

		let data_dir = pick(&env.data_dir, &file.data_dir, "data")?;
		let backup_dir = pick(&env.backup_dir, &file.backup_dir, "backup")?;

		let retain = match &env.retain {
			Some(raw) => raw.trim().parse::<usize>().map_err(|_| ConfigError::InvalidValue {
				key: ENV_RETAIN.to_string(),
				value: raw.clone(),
			})?,
			None => file.retain.unwrap_or(DEFAULT_RETAIN),
		};

		let config = Self { data_dir, backup_dir, retain: DEFAULT_RETAIN, log_dir: file.log_dir };
		config.with_retain(retain)
	}
}

fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
	let text = fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
	toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

#[derive(Debug, Default)]
struct EnvVars {
	root: Option<PathBuf>,
	data_dir: Option<PathBuf>,
	backup_dir: Option<PathBuf>,
	retain: Option<String>,
}

impl EnvVars {
	fn capture() -> Self {
		let path = |key: &str| env::var_os(key).filter(|v| !v.is_empty()).map(PathBuf::from);
		Self {
			root: path(ENV_ROOT),
			data_dir: path(ENV_DATA_DIR),
			backup_dir: path(ENV_BACKUP_DIR),
			retain: env::var(ENV_RETAIN).ok().filter(|v| !v.is_empty()),
		}
	}
}
