//! Configuration settings for ParPut
//!
//! Defines all configuration options, CLI arguments, and defaults
//! for the upload operation.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default number of pooled connections
pub const DEFAULT_CONNECTIONS: usize = 4;

/// Default chunk threshold: files at or above this size are split (32 MB)
pub const DEFAULT_CHUNK_THRESHOLD: u64 = 32 * 1024 * 1024;

/// Default copy buffer size (1 MB)
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// ParPut - Parallel uploader for remote object stores
#[derive(Parser, Debug, Clone)]
#[command(name = "parput")]
#[command(author = "ParPut Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Upload files and directory trees over a pool of remote connections")]
#[command(long_about = r#"
ParPut uploads a local file or directory tree into a remote object store,
parallelizing directory traversal and large-file chunked writes across a
fixed pool of pre-established connections.

Examples:
  parput ./data alice@storage.example.com:/vault/data
  parput big.iso alice@storage:/vault/big.iso --connections 8 --parts 8
  parput ./photos alice@storage:/vault/photos --dry-run
"#)]
pub struct CliArgs {
    /// Local source path (file or directory)
    #[arg(value_name = "SOURCE")]
    pub source: Option<String>,

    /// Remote destination (user@host:/path)
    #[arg(value_name = "DESTINATION")]
    pub destination: Option<String>,

    /// Number of pooled remote connections
    #[arg(short = 'C', long, default_value = "4", value_name = "NUM")]
    pub connections: usize,

    /// Number of worker threads (0 = auto-detect)
    #[arg(short = 'w', long, default_value = "0", value_name = "NUM")]
    pub workers: usize,

    /// Number of parts a large file is split into (0 = connection count)
    #[arg(short = 'k', long, default_value = "0", value_name = "NUM")]
    pub parts: usize,

    /// Minimum file size for chunked transfer (e.g. 32M)
    #[arg(long, default_value = "32M", value_name = "SIZE")]
    pub chunk_threshold: String,

    /// Buffer size for copy loops (e.g. 1M, 64K)
    #[arg(short = 'b', long, default_value = "1M", value_name = "SIZE")]
    pub buffer_size: String,

    /// SSH port
    #[arg(short = 'p', long, default_value = "22", value_name = "PORT")]
    pub port: u16,

    /// SSH private key path (falls back to the SSH agent)
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Remote password (prefer the environment variable over the flag)
    #[arg(long, env = "PARPUT_PASSWORD", hide_env_values = true, value_name = "PASS")]
    pub password: Option<String>,

    /// Bound the wait for a free connection, in seconds (default: wait forever)
    #[arg(long, value_name = "SECS")]
    pub acquire_timeout: Option<u64>,

    /// Show progress bars
    #[arg(short = 'P', long)]
    pub progress: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Survey the source and print the plan without transferring
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Runtime configuration derived from CLI args
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Local source path
    pub source: PathBuf,
    /// Remote destination path
    pub destination: PathBuf,
    /// Remote endpoint info
    pub remote: RemoteConfig,
    /// Connection pool size
    pub connections: usize,
    /// Worker thread count
    pub workers: usize,
    /// Parts per large file
    pub parts: usize,
    /// Minimum size for chunked transfer, in bytes
    pub chunk_threshold: u64,
    /// Copy buffer size in bytes
    pub buffer_size: usize,
    /// Bound on the wait for a free connection, in seconds
    pub acquire_timeout_secs: Option<u64>,
    /// Dry run mode
    pub dry_run: bool,
}

/// Remote endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Remote hostname or IP
    pub host: String,
    /// Username
    pub user: String,
    /// Port
    pub port: u16,
    /// SSH key path
    pub key_path: Option<PathBuf>,
    /// Password; never serialized into config dumps
    #[serde(skip)]
    pub password: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            destination: PathBuf::new(),
            remote: RemoteConfig {
                host: String::new(),
                user: String::new(),
                port: 22,
                key_path: None,
                password: None,
            },
            connections: DEFAULT_CONNECTIONS,
            workers: 0, // Auto-detect
            parts: 0,   // Follow connection count
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            buffer_size: DEFAULT_BUFFER_SIZE,
            acquire_timeout_secs: None,
            dry_run: false,
        }
    }
}

impl UploadConfig {
    /// Create config from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self, String> {
        let source = args.source.as_ref().ok_or("Source path required")?;
        let destination = args
            .destination
            .as_ref()
            .ok_or("Destination (user@host:/path) required")?;

        let (user, host, remote_path) = parse_remote_path(destination)
            .ok_or_else(|| format!("Destination must be user@host:/path, got '{destination}'"))?;

        if args.connections == 0 {
            return Err("Connection count must be at least 1".to_string());
        }

        let mut config = Self::default();
        config.source = PathBuf::from(source);
        config.destination = remote_path;
        config.remote = RemoteConfig {
            host,
            user,
            port: args.port,
            key_path: args.key.clone(),
            password: args.password.clone(),
        };
        config.connections = args.connections;
        config.workers = args.workers;
        config.parts = args.parts;
        config.chunk_threshold = parse_size(&args.chunk_threshold)
            .map_err(|e| format!("Invalid chunk threshold: {e}"))?;
        config.buffer_size =
            parse_size(&args.buffer_size).map_err(|e| format!("Invalid buffer size: {e}"))? as usize;
        if config.buffer_size == 0 {
            return Err("Buffer size must be at least 1 byte".to_string());
        }
        config.acquire_timeout_secs = args.acquire_timeout;
        config.dry_run = args.dry_run;

        Ok(config)
    }

    /// Effective worker count, resolving the auto-detect sentinel
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }

    /// Effective part count for large files, defaulting to the pool size
    pub fn effective_parts(&self) -> usize {
        if self.parts == 0 {
            self.connections
        } else {
            self.parts
        }
    }

    /// Bounded acquisition wait, if configured
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_secs.map(Duration::from_secs)
    }
}

/// Parse human-readable size string to bytes
pub fn parse_size(size: &str) -> Result<u64, String> {
    let size = size.trim().to_uppercase();

    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let (num_str, multiplier) = if size.ends_with("TB") || size.ends_with('T') {
        let num = size.trim_end_matches(|c| c == 'T' || c == 'B');
        (num, 1024u64 * 1024 * 1024 * 1024)
    } else if size.ends_with("GB") || size.ends_with('G') {
        let num = size.trim_end_matches(|c| c == 'G' || c == 'B');
        (num, 1024u64 * 1024 * 1024)
    } else if size.ends_with("MB") || size.ends_with('M') {
        let num = size.trim_end_matches(|c| c == 'M' || c == 'B');
        (num, 1024u64 * 1024)
    } else if size.ends_with("KB") || size.ends_with('K') {
        let num = size.trim_end_matches(|c| c == 'K' || c == 'B');
        (num, 1024u64)
    } else if size.ends_with('B') {
        let num = size.trim_end_matches('B');
        (num, 1u64)
    } else {
        // Assume bytes if no suffix
        (size.as_str(), 1u64)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {num_str}"))?;

    Ok((num * multiplier as f64) as u64)
}

/// Parse a remote destination (user@host:/path)
pub fn parse_remote_path(path: &str) -> Option<(String, String, PathBuf)> {
    // Pattern: user@host:/path or user@host:path
    if let Some((user_host, remote_path)) = path.split_once(':') {
        if let Some((user, host)) = user_host.split_once('@') {
            if user.is_empty() || host.is_empty() || remote_path.is_empty() {
                return None;
            }
            return Some((
                user.to_string(),
                host.to_string(),
                PathBuf::from(remote_path),
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("1M").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("1.5G").unwrap(), (1.5 * 1024.0 * 1024.0 * 1024.0) as u64);
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
    }

    #[test]
    fn test_parse_remote_path() {
        let (user, host, path) = parse_remote_path("alice@storage:/vault/data").unwrap();
        assert_eq!(user, "alice");
        assert_eq!(host, "storage");
        assert_eq!(path, PathBuf::from("/vault/data"));

        assert!(parse_remote_path("/plain/local/path").is_none());
        assert!(parse_remote_path("host:/no-user").is_none());
        assert!(parse_remote_path("alice@storage:").is_none());
    }

    #[test]
    fn test_from_cli_defaults() {
        let args = CliArgs::parse_from([
            "parput",
            "./data",
            "alice@storage:/vault/data",
        ]);
        let config = UploadConfig::from_cli(&args).unwrap();

        assert_eq!(config.connections, DEFAULT_CONNECTIONS);
        assert_eq!(config.effective_parts(), DEFAULT_CONNECTIONS);
        assert_eq!(config.chunk_threshold, DEFAULT_CHUNK_THRESHOLD);
        assert_eq!(config.remote.user, "alice");
        assert_eq!(config.remote.port, 22);
        assert!(config.effective_workers() >= 1);
    }

    #[test]
    fn test_from_cli_rejects_local_destination() {
        let args = CliArgs::parse_from(["parput", "./data", "/local/dest"]);
        assert!(UploadConfig::from_cli(&args).is_err());
    }

    #[test]
    fn test_from_cli_rejects_zero_connections() {
        let args = CliArgs::parse_from([
            "parput",
            "./data",
            "alice@storage:/vault",
            "--connections",
            "0",
        ]);
        assert!(UploadConfig::from_cli(&args).is_err());
    }
}
