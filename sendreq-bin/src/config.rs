use http::Uri;
use serde::Deserialize;
use std::fs::File;
use std::io::prelude::*;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Contents of an optional TOML config file. Every key may also be given on the command line.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub hosts: Option<String>,
    pub parallel: Option<bool>,
    pub iteration: Option<i64>,
    pub timeout: Option<String>,
    pub concurrency: Option<usize>,
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub hosts: Option<PathBuf>,
    pub parallel: Option<bool>,
    pub iteration: Option<i64>,
    pub timeout: Option<String>,
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iterations {
    Finite(u64),
    Infinite,
}

impl Iterations {
    /// `-1` means run until interrupted, `N >= 0` means exactly N passes.
    pub fn from_count(count: i64) -> Result<Iterations, ConfigError> {
        match count {
            -1 => Ok(Iterations::Infinite),
            n if n >= 0 => Ok(Iterations::Finite(n as u64)),
            n => Err(ConfigError::InvalidIterations(n)),
        }
    }

    /// Remaining passes after one more has completed.
    pub fn after_pass(self) -> Iterations {
        match self {
            Iterations::Finite(n) => Iterations::Finite(n.saturating_sub(1)),
            Iterations::Infinite => Iterations::Infinite,
        }
    }

    pub fn exhausted(self) -> bool {
        self == Iterations::Finite(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Sequential,
    Parallel,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub hosts: Vec<String>,
    pub mode: DispatchMode,
    pub iterations: Iterations,
    /// Zero means no deadline.
    pub timeout: Duration,
    /// `None` leaves parallel passes unbounded.
    pub concurrency: Option<usize>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Endpoint is missing. Please provide it with --endpoint")]
    MissingEndpoint,
    #[error("Invalid endpoint '{0}': {1}")]
    InvalidEndpoint(String, String),
    #[error("Hosts file is missing. Please provide it with --hosts")]
    MissingHosts,
    #[error("Could not read hosts file '{}': {}", .path.display(), .source)]
    UnreadableHosts { path: PathBuf, source: io::Error },
    #[error("Hosts file '{}' contains no hosts", .0.display())]
    EmptyHosts(PathBuf),
    #[error("Invalid timeout '{0}': {1}")]
    InvalidTimeout(String, String),
    #[error("Invalid iteration count {0}: use -1 for infinite or a count >= 0")]
    InvalidIterations(i64),
    #[error("Could not read config file '{}': {}", .path.display(), .source)]
    UnreadableConfig { path: PathBuf, source: io::Error },
    #[error("Malformed config file '{}': {}", .path.display(), .source)]
    MalformedConfig {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl Config {
    /// Load the optional config file and merge the command line over it.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Config, ConfigError> {
        match path {
            None => Config::resolve(FileConfig::default(), Path::new("."), overrides),
            Some(p) => {
                let mut contents = String::new();
                File::open(p)
                    .and_then(|mut f| f.read_to_string(&mut contents))
                    .map_err(|source| ConfigError::UnreadableConfig {
                        path: p.to_path_buf(),
                        source,
                    })?;
                let file: FileConfig =
                    toml::from_str(&contents).map_err(|source| ConfigError::MalformedConfig {
                        path: p.to_path_buf(),
                        source,
                    })?;
                let parent = p.parent().unwrap_or_else(|| Path::new("."));
                Config::resolve(file, parent, overrides)
            }
        }
    }

    /// Validate the merged settings. A relative `hosts` path from the file is taken
    /// relative to `base`.
    pub fn resolve(
        file: FileConfig,
        base: &Path,
        overrides: Overrides,
    ) -> Result<Config, ConfigError> {
        let endpoint = overrides
            .endpoint
            .or(file.endpoint)
            .filter(|e| !e.trim().is_empty())
            .ok_or(ConfigError::MissingEndpoint)?;
        validate_endpoint(&endpoint)?;

        let hosts_path = match overrides.hosts {
            Some(p) => p,
            None => file
                .hosts
                .map(|h| base.join(h))
                .ok_or(ConfigError::MissingHosts)?,
        };
        let hosts = read_hosts(&hosts_path)?;

        let timeout = match overrides.timeout.or(file.timeout) {
            Some(t) => parse_duration(&t).map_err(|e| ConfigError::InvalidTimeout(t, e))?,
            None => Duration::default(),
        };
        let iterations =
            Iterations::from_count(overrides.iteration.or(file.iteration).unwrap_or(-1))?;
        let mode = if overrides.parallel.or(file.parallel).unwrap_or(true) {
            DispatchMode::Parallel
        } else {
            DispatchMode::Sequential
        };
        let concurrency = overrides
            .concurrency
            .or(file.concurrency)
            .filter(|&n| n > 0);

        Ok(Config {
            endpoint,
            hosts,
            mode,
            iterations,
            timeout,
            concurrency,
        })
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let uri = endpoint
        .parse::<Uri>()
        .map_err(|e| ConfigError::InvalidEndpoint(endpoint.into(), e.to_string()))?;
    match (uri.scheme_str(), uri.host()) {
        (Some("http"), Some(_)) | (Some("https"), Some(_)) => Ok(()),
        _ => Err(ConfigError::InvalidEndpoint(
            endpoint.into(),
            "expected an absolute http:// or https:// URL".into(),
        )),
    }
}

/// Read one host per line, trimming whitespace and skipping blank lines.
pub fn read_hosts(path: &Path) -> Result<Vec<String>, ConfigError> {
    let unreadable = |source| ConfigError::UnreadableHosts {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(unreadable)?;
    let mut hosts = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(unreadable)?;
        let host = line.trim();
        if !host.is_empty() {
            hosts.push(host.to_string());
        }
    }
    if hosts.is_empty() {
        return Err(ConfigError::EmptyHosts(path.to_path_buf()));
    }
    Ok(hosts)
}

/// Parse a duration such as `300ms`, `2m30s` or `1h 15m`. A bare `0` means zero.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if value == "0" {
        return Ok(Duration::default());
    }
    humantime::parse_duration(value).map_err(|e| format!("Invalid duration '{}': {}", value, e))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn hosts_file(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("hosts.txt");
        fs::write(&path, contents).unwrap();
        path
    }

    fn overrides(endpoint: &str, hosts: PathBuf) -> Overrides {
        Overrides {
            endpoint: Some(endpoint.into()),
            hosts: Some(hosts),
            ..Overrides::default()
        }
    }

    #[test]
    fn parse_duration_accepts_compound_values() {
        assert_eq!(parse_duration("0"), Ok(Duration::default()));
        assert_eq!(parse_duration("300ms"), Ok(Duration::from_millis(300)));
        assert_eq!(parse_duration("1s 500ms"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("2m30s"), Ok(Duration::from_secs(150)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("250us"), Ok(Duration::from_micros(250)));
        assert_eq!(parse_duration("10ns"), Ok(Duration::from_nanos(10)));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        for bad in &["", "abc", "10", "s", "1.5s", "3parsecs"] {
            assert!(parse_duration(bad).is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn read_hosts_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = hosts_file(&dir, "a.example.com\n\n  b.example.com  \r\n");
        assert_eq!(
            read_hosts(&path).unwrap(),
            vec!["a.example.com".to_string(), "b.example.com".to_string()]
        );
    }

    #[test]
    fn empty_or_missing_hosts_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = hosts_file(&dir, "\n   \n");
        assert!(matches!(read_hosts(&path), Err(ConfigError::EmptyHosts(_))));
        let missing = dir.path().join("nope.txt");
        assert!(matches!(
            read_hosts(&missing),
            Err(ConfigError::UnreadableHosts { .. })
        ));
    }

    #[test]
    fn defaults_apply_when_flags_are_absent() {
        let dir = TempDir::new().unwrap();
        let path = hosts_file(&dir, "a.example.com\n");
        let config = Config::load(None, overrides("http://127.0.0.1:8080/", path)).unwrap();
        assert_eq!(config.mode, DispatchMode::Parallel);
        assert_eq!(config.iterations, Iterations::Infinite);
        assert_eq!(config.timeout, Duration::default());
        assert_eq!(config.concurrency, None);
        assert_eq!(config.hosts, vec!["a.example.com".to_string()]);
    }

    #[test]
    fn missing_endpoint_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = hosts_file(&dir, "a.example.com\n");
        let o = Overrides {
            hosts: Some(path),
            ..Overrides::default()
        };
        assert!(matches!(
            Config::load(None, o),
            Err(ConfigError::MissingEndpoint)
        ));
    }

    #[test]
    fn relative_endpoint_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = hosts_file(&dir, "a.example.com\n");
        assert!(matches!(
            Config::load(None, overrides("/just/a/path", path)),
            Err(ConfigError::InvalidEndpoint(..))
        ));
    }

    #[test]
    fn missing_hosts_is_an_error() {
        let o = Overrides {
            endpoint: Some("http://127.0.0.1/".into()),
            ..Overrides::default()
        };
        assert!(matches!(Config::load(None, o), Err(ConfigError::MissingHosts)));
    }

    #[test]
    fn bad_timeout_and_iterations_are_errors() {
        let dir = TempDir::new().unwrap();
        let path = hosts_file(&dir, "a.example.com\n");
        let mut o = overrides("http://127.0.0.1/", path.clone());
        o.timeout = Some("soon".into());
        assert!(matches!(
            Config::load(None, o),
            Err(ConfigError::InvalidTimeout(..))
        ));
        let mut o = overrides("http://127.0.0.1/", path);
        o.iteration = Some(-2);
        assert!(matches!(
            Config::load(None, o),
            Err(ConfigError::InvalidIterations(-2))
        ));
    }

    #[test]
    fn config_file_is_merged_under_flags() {
        let dir = TempDir::new().unwrap();
        hosts_file(&dir, "a.example.com\nb.example.com\n");
        let config_path = dir.path().join("sendreq.toml");
        fs::write(
            &config_path,
            r#"
endpoint = "http://10.0.0.1/health"
hosts = "hosts.txt"
parallel = false
iteration = 3
timeout = "2s"
concurrency = 8
"#,
        )
        .unwrap();
        let o = Overrides {
            iteration: Some(1),
            ..Overrides::default()
        };
        let config = Config::load(Some(config_path.as_path()), o).unwrap();
        assert_eq!(config.endpoint, "http://10.0.0.1/health");
        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.mode, DispatchMode::Sequential);
        assert_eq!(config.iterations, Iterations::Finite(1));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.concurrency, Some(8));
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("sendreq.toml");
        fs::write(&config_path, "endpont = \"http://x/\"\n").unwrap();
        assert!(matches!(
            Config::load(Some(config_path.as_path()), Overrides::default()),
            Err(ConfigError::MalformedConfig { .. })
        ));
    }

    #[test]
    fn iterations_count_down() {
        assert_eq!(Iterations::from_count(-1).unwrap(), Iterations::Infinite);
        let two = Iterations::from_count(2).unwrap();
        assert!(!two.exhausted());
        assert!(two.after_pass().after_pass().exhausted());
        assert_eq!(Iterations::Infinite.after_pass(), Iterations::Infinite);
    }
}
