//! Dotenv loading and environment lookups.
//!
//! The process environment is mutated only here, through [`set_env_var`].
//! Callers load the file from `main` before any thread is spawned.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default dotenv file name.
pub const DOTENV_FILENAME: &str = ".env";

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("env file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read env file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse env file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Outcome of a dotenv load. Holds keys and line numbers only, never values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub path: Option<PathBuf>,
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    /// 1-based lines that could not be parsed and were ignored.
    pub invalid_lines: Vec<usize>,
}

impl LoadReport {
    /// Whether an env file was located at all.
    pub fn found(&self) -> bool {
        self.path.is_some()
    }
}

/// Walk from `start` up through its ancestors and return the first regular
/// file called `filename`.
pub fn find_dotenv(start: &Path, filename: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(filename))
        .find(|candidate| candidate.is_file())
}

/// Index of the first line at or after `from` that holds `stmt`.
fn locate_statement(lines: &[&str], from: usize, stmt: &str) -> Option<usize> {
    let first = stmt.lines().next().unwrap_or("").trim();
    lines
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, l)| l.trim() == first)
        .map(|(i, _)| i)
}

#[derive(Debug, Clone)]
pub struct EnvLoader {
    path: Option<PathBuf>,
    filename: String,
    search_from: Option<PathBuf>,
    override_existing: bool,
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvLoader {
    pub fn new() -> Self {
        Self {
            path: None,
            filename: DOTENV_FILENAME.to_string(),
            search_from: None,
            override_existing: false,
        }
    }

    /// Load this exact file. A missing explicit path is an error.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Directory the upward search starts from (default: current dir).
    pub fn search_from(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_from = Some(dir.into());
        self
    }

    pub fn override_existing(mut self, yes: bool) -> Self {
        self.override_existing = yes;
        self
    }

    fn locate(&self) -> Result<Option<PathBuf>, EnvError> {
        if let Some(path) = &self.path {
            if !path.is_file() {
                return Err(EnvError::NotFound { path: path.clone() });
            }
            return Ok(Some(path.clone()));
        }
        let start = match &self.search_from {
            Some(dir) => dir.clone(),
            None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        Ok(find_dotenv(&start, &self.filename))
    }

    pub fn load(&self) -> Result<LoadReport, EnvError> {
        let Some(path) = self.locate()? else {
            tracing::debug!(filename = %self.filename, "no env file found");
            return Ok(LoadReport::default());
        };

        let content = std::fs::read_to_string(&path).map_err(|source| EnvError::Io {
            path: path.clone(),
            source,
        })?;
        let lines: Vec<&str> = content.lines().collect();

        let mut report = LoadReport {
            path: Some(path.clone()),
            ..Default::default()
        };
        // Last occurrence of a key wins; order follows first appearance.
        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut cursor = 0;
        for item in dotenvy::from_read_iter(content.as_bytes()) {
            match item {
                Ok((key, value)) => {
                    if let Some(i) = lines.iter().skip(cursor).position(|l| l.contains(key.as_str())) {
                        cursor += i + 1;
                    }
                    match pairs.iter_mut().find(|(k, _)| *k == key) {
                        Some(slot) => slot.1 = value,
                        None => pairs.push((key, value)),
                    }
                }
                Err(dotenvy::Error::LineParse(stmt, _)) => {
                    let line = locate_statement(&lines, cursor, &stmt).unwrap_or(cursor);
                    cursor = line + 1;
                    tracing::warn!(
                        path = %path.display(),
                        line = line + 1,
                        "could not parse statement; skipping"
                    );
                    report.invalid_lines.push(line + 1);
                }
                Err(source) => return Err(EnvError::Parse { path, source }),
            }
        }

        // Each key is applied once, so the existence check only sees what was
        // in the environment before this file.
        for (key, value) in pairs {
            if !self.override_existing && env::var_os(&key).is_some() {
                report.skipped.push(key);
                continue;
            }
            set_env_var(&key, &value);
            report.applied.push(key);
        }
        Ok(report)
    }
}

static LOADED: OnceLock<LoadReport> = OnceLock::new();

/// Load `.env` (searching upward from the current dir) at most once per
/// process. Failures are not cached, so a later call retries.
pub fn load_dotenv() -> Result<&'static LoadReport, EnvError> {
    load_once(&LOADED, &EnvLoader::new())
}

fn load_once<'a>(
    cell: &'a OnceLock<LoadReport>,
    loader: &EnvLoader,
) -> Result<&'a LoadReport, EnvError> {
    if let Some(report) = cell.get() {
        return Ok(report);
    }
    let report = loader.load()?;
    Ok(cell.get_or_init(|| report))
}

/// Read `primary`, then each alias in order. Empty values count as unset.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    std::iter::once(primary)
        .chain(aliases.iter().copied())
        .filter_map(|k| env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

pub fn env_or(primary: &str, aliases: &[&str], default: impl FnOnce() -> String) -> String {
    env_optional(primary, aliases).unwrap_or_else(default)
}

/// `0/false/no/off` are false, anything else set is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    match env_optional(primary, aliases) {
        Some(v) => !matches!(
            v.to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

#[allow(unsafe_code)]
pub(crate) fn set_env_var(key: &str, value: &str) {
    // SAFETY: outside tests this runs only during startup, before any other
    // thread exists. Every test that reads or writes the environment (this
    // includes `temp_dir()` and `RUST_LOG` lookups) holds `tests::ENV_LOCK`.
    unsafe { env::set_var(key, value) };
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Mutex, MutexGuard};

    pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialises every test that reads or writes the process environment.
    pub(crate) fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[allow(unsafe_code)]
    pub(crate) fn remove_env_var(key: &str) {
        // SAFETY: callers hold `ENV_LOCK`.
        unsafe { env::remove_var(key) };
    }

    /// Fresh directory under the system temp dir. Callers hold `ENV_LOCK`,
    /// since `temp_dir()` reads `TMPDIR`.
    pub(crate) fn temp_root(tag: &str) -> PathBuf {
        let root =
            env::temp_dir().join(format!("dotagent_{}_{}", tag, uuid::Uuid::new_v4()));
        fs::create_dir_all(&root).unwrap();
        root
    }

    fn unique_key(stem: &str) -> String {
        format!(
            "DOTAGENT_TEST_{}_{}",
            stem,
            uuid::Uuid::new_v4().simple().to_string().to_uppercase()
        )
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let _g = lock_env();
        let root = temp_root("missing");
        let report = EnvLoader::new()
            .filename(format!(".env.{}", uuid::Uuid::new_v4()))
            .search_from(&root)
            .load()
            .unwrap();
        assert!(!report.found());
        assert!(report.applied.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_empty_file_is_found() {
        let _g = lock_env();
        let root = temp_root("empty");
        fs::write(root.join(".env"), "# nothing yet\n").unwrap();
        let report = EnvLoader::new().search_from(&root).load().unwrap();
        assert!(report.found());
        assert!(report.applied.is_empty());
    }

    #[test]
    fn test_explicit_missing_path_errors() {
        let _g = lock_env();
        let root = temp_root("explicit");
        let err = EnvLoader::new()
            .path(root.join("nope.env"))
            .load()
            .unwrap_err();
        assert!(matches!(err, EnvError::NotFound { .. }));
    }

    #[test]
    fn test_found_in_parent_dir() {
        let _g = lock_env();
        let root = temp_root("parent");
        let nested = root.join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        let key = unique_key("PARENT");
        fs::write(root.join(".env"), format!("{}=from-parent\n", key)).unwrap();

        assert_eq!(find_dotenv(&nested, ".env"), Some(root.join(".env")));
        let report = EnvLoader::new().search_from(&nested).load().unwrap();
        assert_eq!(report.path.as_deref(), Some(root.join(".env").as_path()));
        assert_eq!(report.applied, vec![key.clone()]);
        assert_eq!(env::var(&key).unwrap(), "from-parent");
        remove_env_var(&key);
    }

    #[test]
    fn test_existing_vars_are_kept_unless_override() {
        let _g = lock_env();
        let root = temp_root("override");
        let key = unique_key("KEEP");
        let file = root.join(".env");
        fs::write(&file, format!("{}=from-file\n", key)).unwrap();
        set_env_var(&key, "exported");

        let report = EnvLoader::new().path(&file).load().unwrap();
        assert_eq!(report.skipped, vec![key.clone()]);
        assert!(report.applied.is_empty());
        assert_eq!(env::var(&key).unwrap(), "exported");

        let report = EnvLoader::new()
            .path(&file)
            .override_existing(true)
            .load()
            .unwrap();
        assert_eq!(report.applied, vec![key.clone()]);
        assert_eq!(env::var(&key).unwrap(), "from-file");
        remove_env_var(&key);
    }

    #[test]
    fn test_duplicate_key_last_value_wins() {
        let _g = lock_env();
        let root = temp_root("dup");
        let key = unique_key("DUP");
        let file = root.join(".env");
        fs::write(&file, format!("{key}=first\n{key}=second\n")).unwrap();

        let report = EnvLoader::new().path(&file).load().unwrap();
        assert_eq!(env::var(&key).unwrap(), "second");
        assert_eq!(report.applied, vec![key.clone()]);
        assert!(report.skipped.is_empty());
        remove_env_var(&key);
    }

    #[test]
    fn test_quotes_comments_and_substitution() {
        let _g = lock_env();
        let root = temp_root("syntax");
        let base = unique_key("BASE");
        let url = unique_key("URL");
        let greet = unique_key("GREET");
        let content = format!(
            "# model endpoint\n{base}=http://localhost:8080\n\n{url}=${{{base}}}/v1\nexport {greet}=\"hello world\"\n"
        );
        let file = root.join(".env");
        fs::write(&file, content).unwrap();

        let report = EnvLoader::new().path(&file).load().unwrap();
        assert_eq!(report.applied.len(), 3);
        assert!(report.invalid_lines.is_empty());
        assert_eq!(env::var(&url).unwrap(), "http://localhost:8080/v1");
        assert_eq!(env::var(&greet).unwrap(), "hello world");
        for k in [base, url, greet] {
            remove_env_var(&k);
        }
    }

    #[test]
    fn test_bad_line_is_skipped_and_rest_applied() {
        let _g = lock_env();
        let root = temp_root("bad");
        let api = unique_key("API_KEY");
        let model = unique_key("MODEL");
        let file = root.join(".env");
        fs::write(
            &file,
            format!("{api}=sk-123\nthis line is a note\n\n{model}=gpt-4o\n"),
        )
        .unwrap();

        let report = EnvLoader::new().path(&file).load().unwrap();
        assert_eq!(report.applied, vec![api.clone(), model.clone()]);
        assert_eq!(report.invalid_lines, vec![2]);
        assert_eq!(env::var(&api).unwrap(), "sk-123");
        assert_eq!(env::var(&model).unwrap(), "gpt-4o");
        remove_env_var(&api);
        remove_env_var(&model);
    }

    #[test]
    fn test_load_once_caches_success_only() {
        let _g = lock_env();
        let root = temp_root("once");
        let key = unique_key("ONCE");
        let file = root.join(".env");
        let cell = OnceLock::new();

        let failing = EnvLoader::new().path(&file);
        assert!(load_once(&cell, &failing).is_err());
        assert!(cell.get().is_none());

        fs::write(&file, format!("{}=first\n", key)).unwrap();
        let loader = EnvLoader::new().path(&file).override_existing(true);
        let report = load_once(&cell, &loader).unwrap().clone();
        assert_eq!(report.applied, vec![key.clone()]);

        fs::write(&file, format!("{}=second\n", key)).unwrap();
        let again = load_once(&cell, &loader).unwrap();
        assert_eq!(*again, report);
        assert_eq!(env::var(&key).unwrap(), "first");
        remove_env_var(&key);
    }

    #[test]
    fn test_env_optional_aliases_and_empty() {
        let _g = lock_env();
        let primary = unique_key("PRIMARY");
        let alias = unique_key("ALIAS");
        assert_eq!(env_optional(&primary, &[&alias]), None);

        set_env_var(&primary, "   ");
        set_env_var(&alias, " value ");
        assert_eq!(env_optional(&primary, &[&alias]).as_deref(), Some("value"));
        assert_eq!(env_or(&primary, &[], || "dflt".into()), "dflt");

        remove_env_var(&primary);
        remove_env_var(&alias);
    }

    #[test]
    fn test_env_bool() {
        let _g = lock_env();
        let key = unique_key("BOOL");
        assert!(env_bool(&key, &[], true));
        for (v, want) in [("0", false), ("off", false), ("No", false), ("1", true), ("yes", true)] {
            set_env_var(&key, v);
            assert_eq!(env_bool(&key, &[], !want), want, "value {v}");
        }
        remove_env_var(&key);
    }
}
