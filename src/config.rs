//! Run configuration for skel-queue
//!
//! A run is described by a dotenv-style key/value file. [`RunConfig`] is the
//! parsed, validated form; it is resolved once before task generation and is
//! never mutated afterwards. [`config_template`] documents every key.

use crate::error::{Error, Result};
use crate::store::StoreLocation;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Recognized configuration keys
pub mod keys {
    /// Output location for skeletons (required)
    pub const FILEPATH: &str = "FILEPATH";
    /// Datastack name (required)
    pub const DATASTACK: &str = "DATASTACK";
    /// Remote data service address (required)
    pub const SERVER_ADDRESS: &str = "SERVER_ADDRESS";
    /// Materialization timestamp, POSIX seconds (optional)
    pub const TIMESTAMP: &str = "TIMESTAMP";
    /// Whether to collapse the soma (optional)
    pub const COLLAPSE_SOMA: &str = "COLLAPSE_SOMA";
    /// Input table path (required)
    pub const DATAFRAME: &str = "DATAFRAME";
    /// Root id column name (optional)
    pub const ROOT_ID_COLUMN: &str = "ROOT_ID_COLUMN";
    /// Soma point column name (optional)
    pub const SOMA_POINT_COLUMN: &str = "SOMA_POINT_COLUMN";
    /// Soma radius column name (optional)
    pub const SOMA_RADIUS_COLUMN: &str = "SOMA_RADIUS_COLUMN";
    /// Number of tasks to run at once (optional)
    pub const PARALLEL: &str = "PARALLEL";
    /// Axon split quality threshold (optional)
    pub const SPLIT_THRESHOLD: &str = "SPLIT_THRESHOLD";
}

/// Default root id column
pub const DEFAULT_ROOT_ID_COLUMN: &str = "pt_root_id";
/// Default soma point column
pub const DEFAULT_SOMA_POINT_COLUMN: &str = "pt_position";
/// Default number of concurrent tasks
pub const DEFAULT_PARALLEL: usize = 5;
/// Default axon split quality threshold
pub const DEFAULT_SPLIT_THRESHOLD: f64 = 0.6;
/// Default soma collapse flag
pub const DEFAULT_COLLAPSE_SOMA: bool = true;

/// Retry behavior for artifact store writes
///
/// This never re-runs a task; it only smooths over transient I/O while
/// writing an artifact or an error record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 200ms)
    #[serde(default = "default_initial_delay", with = "duration_millis")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 5 seconds)
    #[serde(default = "default_max_delay", with = "duration_millis")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Immutable configuration for one run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Where artifacts and error records are written
    pub output_location: StoreLocation,

    /// Datastack (source dataset) name
    pub datastack: String,

    /// Remote data service address
    pub server_address: String,

    /// Materialization timestamp to query at (None = service's latest)
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Collapse mesh vertices near the soma into the root (default: true)
    #[serde(default = "default_collapse_soma")]
    pub collapse_soma: bool,

    /// Path to the input table
    pub input_table: PathBuf,

    /// Column holding root ids (default: "pt_root_id")
    #[serde(default = "default_root_id_column")]
    pub root_id_column: String,

    /// Column holding soma points (default: "pt_position")
    #[serde(default = "default_soma_point_column")]
    pub soma_point_column: String,

    /// Column holding per-item soma radii (default: none)
    #[serde(default)]
    pub soma_radius_column: Option<String>,

    /// Maximum number of tasks in flight (default: 5)
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    /// Minimum split quality for an axon split to be kept (default: 0.6)
    #[serde(default = "default_split_threshold")]
    pub split_threshold: f64,

    /// Store write retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

impl RunConfig {
    /// Create a configuration with every optional field at its default
    pub fn new(
        output_location: StoreLocation,
        datastack: impl Into<String>,
        server_address: impl Into<String>,
        input_table: impl Into<PathBuf>,
    ) -> Self {
        Self {
            output_location,
            datastack: datastack.into(),
            server_address: server_address.into(),
            timestamp: None,
            collapse_soma: DEFAULT_COLLAPSE_SOMA,
            input_table: input_table.into(),
            root_id_column: DEFAULT_ROOT_ID_COLUMN.to_string(),
            soma_point_column: DEFAULT_SOMA_POINT_COLUMN.to_string(),
            soma_radius_column: None,
            parallel: DEFAULT_PARALLEL,
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
            retry: RetryConfig::default(),
        }
    }

    /// Load and validate a configuration from a dotenv-style file
    pub fn from_env_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading run configuration");
        let iter = dotenvy::from_path_iter(path).map_err(|e| Error::Config {
            message: format!("cannot read config file {}: {}", path.display(), e),
            key: None,
        })?;

        let mut params = HashMap::new();
        for entry in iter {
            let (key, value) = entry.map_err(|e| Error::Config {
                message: format!("malformed config file {}: {}", path.display(), e),
                key: None,
            })?;
            params.insert(key, value);
        }
        Self::from_params(&params)
    }

    /// Build a configuration from already-parsed key/value pairs
    ///
    /// Optional keys whose value is empty or the literal `None` are treated
    /// as absent.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| param(params, key);
        let required = |key: &str| required_param(params, key);

        let output_location = StoreLocation::parse(&normalize_location(required(keys::FILEPATH)?))
            .map_err(|e| Error::config(keys::FILEPATH, e.to_string()))?;

        let mut config = RunConfig::new(
            output_location,
            required(keys::DATASTACK)?,
            required(keys::SERVER_ADDRESS)?,
            required(keys::DATAFRAME)?,
        );

        if let Some(raw) = get(keys::TIMESTAMP) {
            config.timestamp = Some(parse_timestamp(raw)?);
        }
        if let Some(raw) = get(keys::COLLAPSE_SOMA) {
            config.collapse_soma = parse_bool(keys::COLLAPSE_SOMA, raw)?;
        }
        if let Some(col) = get(keys::ROOT_ID_COLUMN) {
            config.root_id_column = col.to_string();
        }
        if let Some(col) = get(keys::SOMA_POINT_COLUMN) {
            config.soma_point_column = col.to_string();
        }
        config.soma_radius_column = get(keys::SOMA_RADIUS_COLUMN).map(str::to_string);
        if let Some(raw) = get(keys::PARALLEL) {
            config.parallel = raw.parse().map_err(|_| {
                Error::config(
                    keys::PARALLEL,
                    format!("PARALLEL must be a positive integer, got '{raw}'"),
                )
            })?;
        }
        if let Some(raw) = get(keys::SPLIT_THRESHOLD) {
            config.split_threshold = raw.parse().map_err(|_| {
                Error::config(
                    keys::SPLIT_THRESHOLD,
                    format!("SPLIT_THRESHOLD must be a number, got '{raw}'"),
                )
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.datastack.trim().is_empty() {
            return Err(Error::config(keys::DATASTACK, "DATASTACK must not be empty"));
        }
        url::Url::parse(&self.server_address).map_err(|e| {
            Error::config(
                keys::SERVER_ADDRESS,
                format!("SERVER_ADDRESS '{}' is not a valid URL: {e}", self.server_address),
            )
        })?;
        if self.parallel == 0 {
            return Err(Error::config(
                keys::PARALLEL,
                "PARALLEL must be a positive integer, got '0'",
            ));
        }
        if !(0.0..=1.0).contains(&self.split_threshold) {
            return Err(Error::config(
                keys::SPLIT_THRESHOLD,
                format!(
                    "SPLIT_THRESHOLD must be within [0, 1], got {}",
                    self.split_threshold
                ),
            ));
        }
        Ok(())
    }

    /// Render this configuration as an env file that [`RunConfig::from_env_file`] reads back
    pub fn to_env_string(&self) -> String {
        let mut out = String::new();
        let mut line = |key: &str, value: &str| {
            let _ = writeln!(out, "{key}={value}");
        };
        line(keys::FILEPATH, self.output_location.as_str());
        line(keys::DATASTACK, &self.datastack);
        line(keys::SERVER_ADDRESS, &self.server_address);
        match self.timestamp {
            Some(ts) => line(keys::TIMESTAMP, &format_timestamp(ts)),
            None => line(keys::TIMESTAMP, "None"),
        }
        line(keys::COLLAPSE_SOMA, if self.collapse_soma { "True" } else { "False" });
        line(keys::DATAFRAME, &self.input_table.display().to_string());
        line(keys::ROOT_ID_COLUMN, &self.root_id_column);
        line(keys::SOMA_POINT_COLUMN, &self.soma_point_column);
        line(
            keys::SOMA_RADIUS_COLUMN,
            self.soma_radius_column.as_deref().unwrap_or("None"),
        );
        line(keys::PARALLEL, &self.parallel.to_string());
        line(keys::SPLIT_THRESHOLD, &self.split_threshold.to_string());
        out
    }
}

/// Description of every recognized key, printed when no config is given
pub fn config_template() -> &'static str {
    "Env file template:
    FILEPATH=            # Location where skeletons will be saved: a path, file://, gs://, s3:// or az:// (required)
    DATASTACK=           # Datastack name (required)
    SERVER_ADDRESS=      # Remote data service address (required)
    TIMESTAMP=           # POSIX timestamp at which to query, optional (defaults to latest materialization)
    COLLAPSE_SOMA=       # Whether to collapse the soma, optional, defaults to True
    DATAFRAME=           # Path to the input table (JSON records, column JSON or JSON Lines) with root ids and soma points in nm (required)
    ROOT_ID_COLUMN=      # Column name for root ids, optional, defaults to `pt_root_id`
    SOMA_POINT_COLUMN=   # Column name for soma points, optional, defaults to `pt_position`
    SOMA_RADIUS_COLUMN=  # Column name for soma radii, optional, defaults to None
    PARALLEL=            # Number of tasks to run at once, optional, defaults to 5
    SPLIT_THRESHOLD=     # Quality threshold for splitting the axon, optional, defaults to 0.6
"
}

/// Turn a bare filesystem path into a `file://` URI; URIs pass through
pub fn normalize_location(location: &str) -> String {
    if has_scheme(location) {
        return location.to_string();
    }
    let path = Path::new(location);
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match url::Url::from_directory_path(&absolute) {
        Ok(url) => url.to_string(),
        Err(()) => format!("file://{}", absolute.display()),
    }
}

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && *v != "None")
}

fn required_param<'a>(params: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    param(params, key).ok_or_else(|| Error::config(key, format!("{key} is required")))
}

fn has_scheme(location: &str) -> bool {
    match location.split_once("://") {
        Some((scheme, _)) => !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_lowercase()),
        None => false,
    }
}

/// Parse POSIX seconds (possibly fractional) into a UTC timestamp
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let invalid = || {
        Error::config(
            keys::TIMESTAMP,
            format!("TIMESTAMP must be POSIX seconds, got '{raw}'"),
        )
    };
    let secs: f64 = raw.parse().map_err(|_| invalid())?;
    if !secs.is_finite() {
        return Err(invalid());
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(whole as i64, nanos)
        .single()
        .ok_or_else(invalid)
}

/// Format a timestamp as POSIX seconds, the inverse of [`parse_timestamp`]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    let nanos = ts.timestamp_subsec_nanos();
    if nanos == 0 {
        format!("{}.0", ts.timestamp())
    } else {
        let frac = format!("{nanos:09}");
        format!("{}.{}", ts.timestamp(), frac.trim_end_matches('0'))
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(Error::config(
            key,
            format!("{key} must be True or False, got '{raw}'"),
        )),
    }
}

fn default_true() -> bool {
    true
}

fn default_collapse_soma() -> bool {
    DEFAULT_COLLAPSE_SOMA
}

fn default_root_id_column() -> String {
    DEFAULT_ROOT_ID_COLUMN.to_string()
}

fn default_soma_point_column() -> String {
    DEFAULT_SOMA_POINT_COLUMN.to_string()
}

fn default_parallel() -> usize {
    DEFAULT_PARALLEL
}

fn default_split_threshold() -> f64 {
    DEFAULT_SPLIT_THRESHOLD
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(200)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (milliseconds)
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_params() -> HashMap<String, String> {
        [
            (keys::FILEPATH, "file:///data/skels"),
            (keys::DATASTACK, "minnie65_public"),
            (keys::SERVER_ADDRESS, "https://global.daf-apis.com"),
            (keys::DATAFRAME, "/data/cells.json"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn minimal_params_fill_documented_defaults() {
        let config = RunConfig::from_params(&minimal_params()).unwrap();

        assert_eq!(config.root_id_column, "pt_root_id");
        assert_eq!(config.soma_point_column, "pt_position");
        assert_eq!(config.soma_radius_column, None);
        assert_eq!(config.parallel, 5);
        assert_eq!(config.split_threshold, 0.6);
        assert!(config.collapse_soma);
        assert_eq!(config.timestamp, None);
        assert_eq!(config.output_location.as_str(), "file:///data/skels");
    }

    #[test]
    fn missing_required_key_names_it() {
        let mut params = minimal_params();
        params.remove(keys::DATASTACK);

        match RunConfig::from_params(&params) {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("DATASTACK")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn none_literal_means_unset() {
        let mut params = minimal_params();
        params.insert(keys::SOMA_RADIUS_COLUMN.into(), "None".into());
        params.insert(keys::TIMESTAMP.into(), "None".into());

        let config = RunConfig::from_params(&params).unwrap();
        assert_eq!(config.soma_radius_column, None);
        assert_eq!(config.timestamp, None);
    }

    #[test]
    fn non_numeric_parallel_is_configuration_error() {
        let mut params = minimal_params();
        params.insert(keys::PARALLEL.into(), "many".into());

        match RunConfig::from_params(&params) {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("PARALLEL")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_parallel_is_rejected() {
        let mut params = minimal_params();
        params.insert(keys::PARALLEL.into(), "0".into());
        assert!(matches!(
            RunConfig::from_params(&params),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        for raw in ["1.5", "-0.1", "abc"] {
            let mut params = minimal_params();
            params.insert(keys::SPLIT_THRESHOLD.into(), raw.into());
            match RunConfig::from_params(&params) {
                Err(Error::Config { key, .. }) => {
                    assert_eq!(key.as_deref(), Some("SPLIT_THRESHOLD"), "input {raw}")
                }
                other => panic!("expected Config error for {raw}, got {other:?}"),
            }
        }
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let mut params = minimal_params();
        params.insert(keys::TIMESTAMP.into(), "yesterday".into());
        assert!(matches!(
            RunConfig::from_params(&params),
            Err(Error::Config { key: Some(k), .. }) if k == "TIMESTAMP"
        ));
    }

    #[test]
    fn collapse_soma_accepts_python_style_booleans() {
        for (raw, expected) in [("True", true), ("False", false), ("0", false), ("yes", true)] {
            let mut params = minimal_params();
            params.insert(keys::COLLAPSE_SOMA.into(), raw.into());
            let config = RunConfig::from_params(&params).unwrap();
            assert_eq!(config.collapse_soma, expected, "input {raw}");
        }

        let mut params = minimal_params();
        params.insert(keys::COLLAPSE_SOMA.into(), "maybe".into());
        assert!(RunConfig::from_params(&params).is_err());
    }

    #[test]
    fn unsupported_store_scheme_is_configuration_error() {
        let mut params = minimal_params();
        params.insert(keys::FILEPATH.into(), "ftp://host/skels".into());
        assert!(matches!(
            RunConfig::from_params(&params),
            Err(Error::Config { key: Some(k), .. }) if k == "FILEPATH"
        ));
    }

    #[test]
    fn bucket_filepath_is_accepted() {
        let mut params = minimal_params();
        params.insert(keys::FILEPATH.into(), "gs://bucket/skels".into());

        let config = RunConfig::from_params(&params).unwrap();
        assert_eq!(config.output_location.scheme(), "gs");
        assert_eq!(config.output_location.as_str(), "gs://bucket/skels");
    }

    #[test]
    fn timestamp_parses_fractional_seconds() {
        let ts = parse_timestamp("1700000000.5").unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
        assert_eq!(format_timestamp(ts), "1700000000.5");
        assert_eq!(
            format_timestamp(parse_timestamp("1700000000").unwrap()),
            "1700000000.0"
        );
    }

    #[test]
    fn normalize_location_keeps_uris() {
        assert_eq!(normalize_location("gs://bucket/skels"), "gs://bucket/skels");
        assert_eq!(normalize_location("file:///tmp/x"), "file:///tmp/x");
    }

    #[test]
    fn normalize_location_prefixes_bare_paths() {
        assert_eq!(normalize_location("/tmp/skels"), "file:///tmp/skels/");

        let relative = normalize_location("skels");
        assert!(relative.starts_with("file:///"), "got {relative}");
        assert!(relative.ends_with("/skels/"), "got {relative}");
    }

    #[test]
    fn env_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.env");

        let mut config = RunConfig::from_params(&minimal_params()).unwrap();
        config.timestamp = Some(parse_timestamp("1712345678.25").unwrap());
        config.collapse_soma = false;
        config.soma_radius_column = Some("soma_radius".into());
        config.parallel = 12;
        config.split_threshold = 0.75;
        std::fs::write(&path, config.to_env_string()).unwrap();

        let loaded = RunConfig::from_env_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_env_file_is_configuration_error() {
        let result = RunConfig::from_env_file(Path::new("/definitely/not/here.env"));
        assert!(matches!(result, Err(Error::Config { key: None, .. })));
    }

    #[test]
    fn template_mentions_every_key() {
        let template = config_template();
        for key in [
            keys::FILEPATH,
            keys::DATASTACK,
            keys::SERVER_ADDRESS,
            keys::TIMESTAMP,
            keys::COLLAPSE_SOMA,
            keys::DATAFRAME,
            keys::ROOT_ID_COLUMN,
            keys::SOMA_POINT_COLUMN,
            keys::SOMA_RADIUS_COLUMN,
            keys::PARALLEL,
            keys::SPLIT_THRESHOLD,
        ] {
            assert!(template.contains(&format!("{key}=")), "template lacks {key}");
        }
    }

    #[test]
    fn retry_config_defaults_from_empty_json() {
        let retry: RetryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(retry, RetryConfig::default());
        assert_eq!(retry.initial_delay, Duration::from_millis(200));
    }
}
