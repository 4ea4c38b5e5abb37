//! Output location resolution for dumps.
//!
//! An output argument is either a caller-supplied path or a request to
//! generate one. Generated paths live under a per-database backup directory
//! (falling back to the system temp directory) with the default template
//! `@DATABASE_@DATE`. In every case each `@DATABASE` and `@DATE` token is
//! substituted in a single pass; the date is the current UTC time as
//! `YYYYMMDD_HHMMSS`.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::warn;

/// Default sub-path appended to generated backup directories.
pub const DEFAULT_TEMPLATE: &str = "@DATABASE_@DATE";

/// Timestamp format substituted for `@DATE`.
pub const DATE_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Raw output argument of a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputArg {
    /// Build a path under the backup directory
    Generate,
    /// Use this path (template tokens still substituted)
    Path(String),
}

impl OutputArg {
    /// Interprets an optional CLI/config value.
    ///
    /// Unset, empty, and the literal `true` all mean "generate one".
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("" | "true") => Self::Generate,
            Some(path) => Self::Path(path.to_string()),
        }
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Supplies (and creates) the base backup directory for a database.
pub trait BackupDirProvider: Send + Sync {
    /// Returns a ready-to-use directory, or `None` if none can be prepared.
    fn prepare_backup_dir(&self, database: &str) -> Option<PathBuf>;
}

/// Backup directories under a fixed root: `<root>/<database>`.
#[derive(Debug, Clone)]
pub struct RootBackupDir {
    root: Option<PathBuf>,
}

impl RootBackupDir {
    /// Uses `root`, or `$HOME/mydumpctl-backups` when `None`.
    pub const fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn root(&self) -> Option<PathBuf> {
        self.root.clone().or_else(|| {
            std::env::var_os("HOME")
                .filter(|home| !home.is_empty())
                .map(|home| PathBuf::from(home).join("mydumpctl-backups"))
        })
    }
}

impl BackupDirProvider for RootBackupDir {
    fn prepare_backup_dir(&self, database: &str) -> Option<PathBuf> {
        let dir = self.root()?.join(database);
        match std::fs::create_dir_all(&dir) {
            Ok(()) => Some(dir),
            Err(e) => {
                warn!("Cannot create backup directory {}: {}", dir.display(), e);
                None
            }
        }
    }
}

/// Resolves output arguments into concrete paths.
pub struct PathResolver<'a> {
    backup_dirs: &'a dyn BackupDirProvider,
    clock: &'a dyn Clock,
}

impl<'a> PathResolver<'a> {
    /// Creates a resolver over the given collaborators.
    pub fn new(backup_dirs: &'a dyn BackupDirProvider, clock: &'a dyn Clock) -> Self {
        Self { backup_dirs, clock }
    }

    /// Resolves `arg` for `database` into a concrete path string.
    pub fn resolve(&self, arg: &OutputArg, database: &str) -> String {
        let template = match arg {
            OutputArg::Path(path) => path.clone(),
            OutputArg::Generate => {
                let base = self.backup_dirs.prepare_backup_dir(database).unwrap_or_else(|| {
                    let tmp = std::env::temp_dir();
                    warn!("No backup directory available, using {}", tmp.display());
                    tmp
                });
                format!("{}/{DEFAULT_TEMPLATE}", base.display())
            }
        };

        let date = self.clock.now_utc().format(DATE_FORMAT).to_string();
        substitute(&template, database, &date)
    }
}

/// Replaces every `@DATABASE` and `@DATE` token of `template`.
///
/// The template is scanned once, left to right, so substituted values are
/// never rescanned.
fn substitute(template: &str, database: &str, date: &str) -> String {
    const TOKENS: [&str; 2] = ["@DATABASE", "@DATE"];

    let mut resolved = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(index) = rest.find('@') {
        resolved.push_str(&rest[..index]);
        rest = &rest[index..];
        match TOKENS.iter().find(|token| rest.starts_with(**token)) {
            Some(&token) => {
                resolved.push_str(if token == "@DATE" { date } else { database });
                rest = &rest[token.len()..];
            }
            None => {
                resolved.push('@');
                rest = &rest[1..];
            }
        }
    }
    resolved.push_str(rest);
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct NoBackupDir;

    impl BackupDirProvider for NoBackupDir {
        fn prepare_backup_dir(&self, _database: &str) -> Option<PathBuf> {
            None
        }
    }

    fn new_year() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_output_arg_parse() {
        assert_eq!(OutputArg::parse(None), OutputArg::Generate);
        assert_eq!(OutputArg::parse(Some("")), OutputArg::Generate);
        assert_eq!(OutputArg::parse(Some("true")), OutputArg::Generate);
        assert_eq!(
            OutputArg::parse(Some("/backup")),
            OutputArg::Path("/backup".to_string())
        );
    }

    #[test]
    fn test_template_substitution_is_deterministic() {
        let clock = new_year();
        let resolver = PathResolver::new(&NoBackupDir, &clock);
        let path = resolver.resolve(&OutputArg::Path("/backup/@DATABASE_@DATE".into()), "shop");
        assert_eq!(path, "/backup/shop_20240101_000000");
    }

    #[test]
    fn test_every_token_substituted() {
        let clock = new_year();
        let resolver = PathResolver::new(&NoBackupDir, &clock);
        let path = resolver.resolve(
            &OutputArg::Path("/b/@DATABASE/@DATE/@DATABASE/@DATE".into()),
            "shop",
        );
        assert_eq!(path, "/b/shop/20240101_000000/shop/20240101_000000");
    }

    #[test]
    fn test_stray_at_signs_kept() {
        assert_eq!(substitute("/b/@@DATE/a@b@", "shop", "D"), "/b/@D/a@b@");
    }

    #[test]
    fn test_date_before_database() {
        let clock = new_year();
        let resolver = PathResolver::new(&NoBackupDir, &clock);
        let path = resolver.resolve(&OutputArg::Path("/b/@DATE-@DATABASE".into()), "shop");
        assert_eq!(path, "/b/20240101_000000-shop");
    }

    #[test]
    fn test_database_name_containing_token() {
        assert_eq!(substitute("@DATABASE_@DATE", "x@DATE", "D"), "x@DATE_D");
    }

    #[test]
    fn test_plain_path_untouched() {
        let clock = new_year();
        let resolver = PathResolver::new(&NoBackupDir, &clock);
        assert_eq!(
            resolver.resolve(&OutputArg::Path("/backup".into()), "shop"),
            "/backup"
        );
    }

    #[test]
    fn test_generate_falls_back_to_temp_dir() {
        let clock = new_year();
        let resolver = PathResolver::new(&NoBackupDir, &clock);
        let path = resolver.resolve(&OutputArg::Generate, "shop");
        let expected = format!("{}/shop_20240101_000000", std::env::temp_dir().display());
        assert_eq!(path, expected);
    }

    #[test]
    fn test_generate_uses_backup_dir() {
        let root = tempfile::tempdir().unwrap();
        let provider = RootBackupDir::new(Some(root.path().to_path_buf()));
        let clock = new_year();
        let resolver = PathResolver::new(&provider, &clock);

        let path = resolver.resolve(&OutputArg::Generate, "shop");
        let base = root.path().join("shop");
        assert!(base.is_dir());
        assert_eq!(path, format!("{}/shop_20240101_000000", base.display()));
    }
}
