use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use std::path::PathBuf;
use terrastream_tonic_core::terrastream::{BOUNDARY_PAGE_THRESHOLD, DEFAULT_POINTS_PER_CHUNK};

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:50077";
pub const DEFAULT_NUM_WORKERS: usize = 10;
pub const DEFAULT_QUEUE_DEPTH: usize = 64;
pub const DEFAULT_MAX_POINTS: usize = 10_000_000;
pub const DEFAULT_CHUNK_PAUSE_MS: u64 = 1;
pub const DEFAULT_LIVE_STREAM_SECS: u64 = 30;
pub const DEFAULT_MAX_POINTS_PER_SECOND: u32 = 1_000;
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 8;
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 500 * 1024 * 1024;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_DATABASE_PATH: &str = "geospatial.db";

/// Runtime configuration for the `terrastream-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults matching the reference
/// deployment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "terrastream-tonic-server",
    version,
    about = "A gRPC service streaming synthetic geospatial points and dataset pages"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from(DEFAULT_SERVER_ADDR))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Number of workers, and so the number of calls served at once.
    ///
    /// Streaming calls hold their worker for their whole duration.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = DEFAULT_NUM_WORKERS)]
    pub num_workers: usize,

    /// Calls allowed to wait for a free worker before new calls are refused
    /// with `UNAVAILABLE`.
    ///
    /// Environment variable: `QUEUE_DEPTH`
    #[arg(long, env = "QUEUE_DEPTH", default_value_t = DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,

    /// Largest `max_points` a single batch request may ask for.
    ///
    /// Environment variable: `MAX_POINTS`
    #[arg(long, env = "MAX_POINTS", default_value_t = DEFAULT_MAX_POINTS)]
    pub max_points: usize,

    /// Points per streamed chunk.
    ///
    /// Environment variable: `POINTS_PER_CHUNK`
    #[arg(long, env = "POINTS_PER_CHUNK", default_value_t = DEFAULT_POINTS_PER_CHUNK)]
    pub points_per_chunk: usize,

    /// Pause between streamed chunks, in milliseconds. Gives the client's
    /// event loop room to process each chunk.
    ///
    /// Environment variable: `CHUNK_PAUSE_MS`
    #[arg(long, env = "CHUNK_PAUSE_MS", default_value_t = DEFAULT_CHUNK_PAUSE_MS)]
    pub chunk_pause_ms: u64,

    /// Wall-clock length of a live `StreamData` call, in seconds.
    ///
    /// Environment variable: `LIVE_STREAM_SECS`
    #[arg(long, env = "LIVE_STREAM_SECS", default_value_t = DEFAULT_LIVE_STREAM_SECS)]
    pub live_stream_secs: u64,

    /// Highest live emission rate; faster requests are clamped.
    ///
    /// Environment variable: `MAX_POINTS_PER_SECOND`
    #[arg(long, env = "MAX_POINTS_PER_SECOND", default_value_t = DEFAULT_MAX_POINTS_PER_SECOND)]
    pub max_points_per_second: u32,

    /// Capacity of the response buffer between a worker and its gRPC stream.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = DEFAULT_STREAM_BUFFER_SIZE)]
    pub stream_buffer_size: usize,

    /// Maximum encoded or decoded gRPC message size, in bytes.
    ///
    /// Environment variable: `MAX_MESSAGE_BYTES`
    #[arg(long, env = "MAX_MESSAGE_BYTES", default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: usize,

    /// Largest page size that still gets column boundaries attached.
    ///
    /// Environment variable: `BOUNDARY_PAGE_THRESHOLD`
    #[arg(long, env = "BOUNDARY_PAGE_THRESHOLD", default_value_t = BOUNDARY_PAGE_THRESHOLD)]
    pub boundary_page_threshold: usize,

    /// Seconds to wait for in-flight calls to drain on shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    pub shutdown_timeout: u64,

    /// SQLite file holding stored datasets.
    ///
    /// Environment variable: `DATABASE_PATH`
    #[arg(long, env = "DATABASE_PATH", default_value = DEFAULT_DATABASE_PATH)]
    pub database_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub num_workers: usize,
    pub queue_depth: usize,
    pub max_points: usize,
    pub points_per_chunk: usize,
    pub chunk_pause: Duration,
    pub live_stream_duration: Duration,
    pub max_points_per_second: u32,
    pub stream_buffer_size: usize,
    pub max_message_bytes: usize,
    pub boundary_page_threshold: usize,
    pub shutdown_timeout: Duration,
    pub database_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            uds: false,
            num_workers: DEFAULT_NUM_WORKERS,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            max_points: DEFAULT_MAX_POINTS,
            points_per_chunk: DEFAULT_POINTS_PER_CHUNK,
            chunk_pause: Duration::from_millis(DEFAULT_CHUNK_PAUSE_MS),
            live_stream_duration: Duration::from_secs(DEFAULT_LIVE_STREAM_SECS),
            max_points_per_second: DEFAULT_MAX_POINTS_PER_SECOND,
            stream_buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            boundary_page_threshold: BOUNDARY_PAGE_THRESHOLD,
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }
        if args.queue_depth == 0 {
            bail!("QUEUE_DEPTH must be greater than 0");
        }
        if args.max_points == 0 {
            bail!("MAX_POINTS must be greater than 0");
        }
        if args.points_per_chunk == 0 {
            bail!("POINTS_PER_CHUNK must be greater than 0");
        }
        if args.max_points_per_second == 0 {
            bail!("MAX_POINTS_PER_SECOND must be greater than 0");
        }
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }
        if args.max_message_bytes < 1024 {
            bail!(
                "MAX_MESSAGE_BYTES ({}) is too small to carry a single chunk",
                args.max_message_bytes
            );
        }

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            num_workers: args.num_workers,
            queue_depth: args.queue_depth,
            max_points: args.max_points,
            points_per_chunk: args.points_per_chunk,
            chunk_pause: Duration::from_millis(args.chunk_pause_ms),
            live_stream_duration: Duration::from_secs(args.live_stream_secs),
            max_points_per_second: args.max_points_per_second,
            stream_buffer_size: args.stream_buffer_size,
            max_message_bytes: args.max_message_bytes,
            boundary_page_threshold: args.boundary_page_threshold,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            database_path: args.database_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> anyhow::Result<ServerConfig> {
        let argv = std::iter::once("terrastream-tonic-server").chain(extra.iter().copied());
        ServerConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--num-workers",
            "3",
            "--points-per-chunk",
            "500",
            "--chunk-pause-ms",
            "0",
            "--database-path",
            "/tmp/x.db",
        ])
        .unwrap();
        assert_eq!(config.num_workers, 3);
        assert_eq!(config.points_per_chunk, 500);
        assert!(config.chunk_pause.is_zero());
        assert_eq!(config.database_path, PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn rejects_zero_sizes() {
        assert!(parse(&["--num-workers", "0"]).is_err());
        assert!(parse(&["--points-per-chunk", "0"]).is_err());
        assert!(parse(&["--max-points-per-second", "0"]).is_err());
        assert!(parse(&["--max-message-bytes", "10"]).is_err());
    }
}
