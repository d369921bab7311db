use crate::config::{LoggingConfig, Section};
use std::{
    io::{self, IsTerminal, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    filter::Targets,
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer, Registry,
};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

const DEFAULT_SECTION: &str = "default";

fn parse_level(s: &str) -> LevelFilter {
    match s.to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" | "none" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

/// True when `target` is `prefix` itself or one of its submodules.
fn matches_prefix(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

// -------- rotating files --------

#[derive(Clone)]
struct RotWriter(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl Write for RotWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?
            .flush()
    }
}

/// Writer that drops everything when no file is configured for a target.
struct RoutedWriter(Option<RotWriter>);

impl Write for RoutedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.0 {
            Some(w) => w.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.0 {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

/// Routes records to files by target prefix, falling back to the default file.
#[derive(Default)]
struct FileRouter {
    default: Option<RotWriter>,
    by_prefix: Vec<(String, RotWriter)>,
}

impl FileRouter {
    fn resolve(&self, target: &str) -> Option<RotWriter> {
        self.by_prefix
            .iter()
            .filter(|(prefix, _)| matches_prefix(target, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, w)| w.clone())
            .or_else(|| self.default.clone())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_prefix.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = RoutedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RoutedWriter(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        RoutedWriter(self.resolve(meta.target()))
    }
}

fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn open_rotating(section: &Section, base_dir: &Path) -> io::Result<RotWriter> {
    let path = resolve_log_path(&section.file, base_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let max_bytes = section.max_size_mb.unwrap_or(100) * 1024 * 1024;
    let limit = match section.max_backups {
        Some(files) => FileLimit::MaxFiles(files),
        None => FileLimit::Age(chrono::Duration::days(
            section.max_age_days.unwrap_or(7).into(),
        )),
    };
    let rot = FileRotate::new(
        &path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(usize::try_from(max_bytes).unwrap_or(usize::MAX)),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(RotWriter(Arc::new(Mutex::new(rot))))
}

// -------- filters --------

/// Console and file filters: each section name is a target prefix, the
/// `default` section sets the level of everything else.
fn build_targets(cfg: &LoggingConfig) -> (Targets, Targets) {
    let mut console = Targets::new().with_default(LevelFilter::OFF);
    let mut file = Targets::new().with_default(LevelFilter::OFF);

    for (name, section) in cfg {
        let console_level = parse_level(&section.console_level);
        let file_level = if section.file.trim().is_empty() && name != DEFAULT_SECTION {
            // Records of a section without a file fall back to the default file.
            cfg.get(DEFAULT_SECTION)
                .map_or(LevelFilter::OFF, |d| parse_level(&d.file_level))
        } else {
            parse_level(&section.file_level)
        };

        if name == DEFAULT_SECTION {
            console = console.with_default(console_level);
            file = file.with_default(file_level);
        } else {
            console = console.with_target(name.clone(), console_level);
            file = file.with_target(name.clone(), file_level);
        }
    }
    (console, file)
}

fn build_router(cfg: &LoggingConfig, base_dir: &Path) -> FileRouter {
    let mut router = FileRouter::default();
    for (name, section) in cfg {
        if section.file.trim().is_empty() {
            continue;
        }
        let writer = match open_rotating(section, base_dir) {
            Ok(writer) => writer,
            Err(e) => {
                eprintln!("failed to open log file '{}' for '{name}': {e}", section.file);
                continue;
            }
        };
        if name == DEFAULT_SECTION {
            router.default = Some(writer);
        } else {
            router.by_prefix.push((name.clone(), writer));
        }
    }
    router
}

// -------- public init --------

/// Installs the global subscriber.
///
/// Console output is human readable, ANSI colored when stdout is a terminal.
/// File output is JSON through rotating files resolved against `base_dir`.
/// Both use RFC 3339 UTC timestamps. `log` records are bridged into `tracing`.
/// Calling this twice keeps the first subscriber.
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        let _ = tracing_subscriber::fmt()
            .with_target(true)
            .with_timer(UtcTime::rfc_3339())
            .try_init();
        return;
    }

    let (console_targets, file_targets) = build_targets(cfg);
    let router = build_router(cfg, base_dir);

    let console_layer = fmt::layer()
        .with_ansi(io::stdout().is_terminal())
        .with_target(true)
        .with_level(true)
        .with_timer(UtcTime::rfc_3339())
        .with_filter(console_targets);

    let file_layer = (!router.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(router)
            .with_filter(file_targets)
    });

    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_logging_config;
    use tempfile::tempdir;
    use tracing::Level;

    fn section(console: &str, file: &str, file_level: &str) -> Section {
        Section {
            console_level: console.into(),
            file: file.into(),
            file_level: file_level.into(),
            max_age_days: None,
            max_backups: Some(2),
            max_size_mb: Some(1),
        }
    }

    #[test]
    fn level_parsing() {
        assert_eq!(parse_level("trace"), LevelFilter::TRACE);
        assert_eq!(parse_level("DEBUG"), LevelFilter::DEBUG);
        assert_eq!(parse_level("Warn"), LevelFilter::WARN);
        assert_eq!(parse_level("off"), LevelFilter::OFF);
        assert_eq!(parse_level("none"), LevelFilter::OFF);
        assert_eq!(parse_level("bogus"), LevelFilter::INFO);
    }

    #[test]
    fn prefix_matching_respects_module_boundaries() {
        assert!(matches_prefix("swagin", "swagin"));
        assert!(matches_prefix("swagin::binding", "swagin"));
        assert!(!matches_prefix("swagin_demo", "swagin"));
    }

    #[test]
    fn section_targets_override_the_default() {
        let mut cfg = default_logging_config();
        cfg.insert("swagin".into(), section("debug", "", "trace"));
        let (console, file) = build_targets(&cfg);

        assert!(console.would_enable("swagin::app", &Level::DEBUG));
        assert!(!console.would_enable("tower_http", &Level::DEBUG));
        assert!(console.would_enable("tower_http", &Level::INFO));
        // swagin has no file of its own, so it follows the default file level
        assert!(file.would_enable("swagin::app", &Level::DEBUG));
        assert!(!file.would_enable("swagin::app", &Level::TRACE));
    }

    #[test]
    fn relative_paths_resolve_against_base_dir() {
        let tmp = tempdir().unwrap();
        let resolved = resolve_log_path("logs/test.log", tmp.path());
        assert!(resolved.starts_with(tmp.path()));
        assert!(resolved.ends_with("logs/test.log"));
        let abs = tmp.path().join("abs.log");
        assert_eq!(resolve_log_path(&abs.to_string_lossy(), Path::new("/x")), abs);
    }

    #[test]
    fn router_picks_longest_prefix_then_default() {
        let tmp = tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("info", "logs/all.log", "info"));
        cfg.insert("swagin".into(), section("info", "logs/swagin.log", "debug"));
        cfg.insert(
            "swagin::binding".into(),
            section("info", "logs/binding.log", "debug"),
        );

        let router = build_router(&cfg, tmp.path());
        assert!(tmp.path().join("logs").is_dir());
        assert_eq!(router.by_prefix.len(), 2);

        let pick = |target: &str| {
            let w = router.resolve(target).unwrap();
            router
                .by_prefix
                .iter()
                .find(|(_, candidate)| Arc::ptr_eq(&candidate.0, &w.0))
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| "default".into())
        };
        assert_eq!(pick("swagin::binding::body"), "swagin::binding");
        assert_eq!(pick("swagin::app"), "swagin");
        assert_eq!(pick("hyper"), "default");
    }

    #[test]
    fn writes_through_rotating_file() {
        let tmp = tempdir().unwrap();
        let mut writer = open_rotating(&section("info", "nested/app.log", "info"), tmp.path())
            .unwrap();
        writer.write_all(b"{\"msg\":\"hi\"}\n").unwrap();
        writer.flush().unwrap();
        let written = std::fs::read_to_string(tmp.path().join("nested/app.log")).unwrap();
        assert!(written.contains("hi"));
    }
}
