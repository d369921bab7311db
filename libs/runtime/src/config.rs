use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Created under the user's home when `server.home_dir` is left empty.
const HOME_SUBDIR: &str = ".swagin";
/// Environment overrides: `APP__SERVER__PORT=9000` sets `server.port`.
const ENV_PREFIX: &str = "APP__";
const ENV_SPLIT: &str = "__";

/// Typed global sections plus a free-form bag of per-module sections.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>,
    /// Directory whose `<module>.yaml` files are merged into `modules`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules_dir: Option<String>,
    /// e.g. `swagger` for the docs settings of the served application.
    #[serde(default)]
    pub modules: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Base of relative log paths; absolute after loading.
    pub home_dir: String,
    pub host: String,
    pub port: u16,
    /// Per-request timeout in seconds, 0 keeps the library default.
    #[serde(default)]
    pub timeout_sec: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_limit_bytes: Option<usize>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            home_dir: String::new(),
            host: "127.0.0.1".to_owned(),
            port: 8081,
            timeout_sec: 0,
            body_limit_bytes: None,
        }
    }
}

/// Target prefix → log settings; `default` covers every other target.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Section {
    /// trace, debug, info, warn, error or off
    pub console_level: String,
    /// Empty writes no file of its own.
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub file_level: String,
    /// Rotated files older than this are removed when `max_backups` is unset.
    #[serde(default)]
    pub max_age_days: Option<u32>,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

pub fn default_logging_config() -> LoggingConfig {
    HashMap::from([(
        "default".to_owned(),
        Section {
            console_level: "info".to_owned(),
            file: "logs/swagin.log".to_owned(),
            file_level: "debug".to_owned(),
            max_age_days: Some(7),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    )])
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: Some(default_logging_config()),
            modules_dir: None,
            modules: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the YAML file, then `APP__*` variables. The home
    /// directory is resolved and created.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        if !path.is_file() {
            bail!("config file not found: {}", path.display());
        }

        // Without a YAML `logging` section the binary falls back to plain console output.
        let defaults = AppConfig {
            logging: None,
            ..AppConfig::default()
        };
        let mut config: AppConfig = Figment::from(Serialized::defaults(defaults))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_SPLIT))
            .extract()
            .with_context(|| format!("failed to parse yaml config {}", path.display()))?;

        config.finish()?;
        Ok(config)
    }

    /// [`load_layered`](Self::load_layered) when a path is given, the
    /// built-in defaults otherwise.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_layered(path);
        }
        let mut config = Self::default();
        config.finish()?;
        Ok(config)
    }

    fn finish(&mut self) -> Result<()> {
        let home = resolve_home_dir(&self.server.home_dir).context("invalid server.home_dir")?;
        self.server.home_dir = home.to_string_lossy().into_owned();
        if let Some(dir) = self.modules_dir.clone() {
            merge_module_files(&mut self.modules, Path::new(&dir))?;
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("failed to serialize config to YAML")
    }

    /// Deserializes the `module` section, `None` when it is absent.
    pub fn module_config<T: DeserializeOwned>(&self, module: &str) -> Result<Option<T>> {
        let Some(raw) = self.modules.get(module) else {
            return Ok(None);
        };
        serde_json::from_value(raw.clone())
            .map(Some)
            .with_context(|| format!("invalid `{module}` module config"))
    }

    /// `--port` replaces the port; each `-v` raises the default console level.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }
        let level = match args.verbose {
            0 => return,
            1 => "debug",
            _ => "trace",
        };
        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(section) = logging.get_mut("default") {
            section.console_level = level.to_owned();
        }
    }
}

/// The command line options that feed configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub port: Option<u16>,
    pub print_config: bool,
    pub verbose: u8,
}

/// Empty → `<user home>/.swagin`; `~` expands to the user home; relative
/// paths are taken from the working directory. The directory is created.
fn resolve_home_dir(raw: &str) -> Result<PathBuf> {
    let raw = raw.trim();
    let mut dir = if raw.is_empty() {
        user_home()?.join(HOME_SUBDIR)
    } else if let Some(rest) = raw.strip_prefix('~') {
        user_home()?.join(rest.trim_start_matches(['/', '\\']))
    } else {
        PathBuf::from(raw)
    };
    if dir.is_relative() {
        dir = std::env::current_dir()?.join(dir);
    }
    fs::create_dir_all(&dir).with_context(|| format!("cannot create {}", dir.display()))?;
    Ok(dir)
}

fn user_home() -> Result<PathBuf> {
    let var = if cfg!(windows) { "APPDATA" } else { "HOME" };
    match std::env::var_os(var) {
        Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => bail!("${var} is not set"),
    }
}

fn merge_module_files(bag: &mut HashMap<String, serde_json::Value>, dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        let Some(module) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !is_yaml || !path.is_file() {
            continue;
        }
        let section: serde_json::Value = serde_yaml::from_str(&fs::read_to_string(&path)?)
            .with_context(|| format!("failed to parse yaml module file {}", path.display()))?;
        bag.insert(module.to_owned(), section);
    }
    Ok(())
}
