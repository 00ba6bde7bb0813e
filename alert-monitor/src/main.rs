use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub mod consumer;
pub mod logging;

use consumer::{AlarmConsumer, UpdateFormatter};
use isapi_stream::{DeviceConfig, Signal, StreamConfig, StreamConnector};
use logging::LoggingMode;

/// ISAPI Alert Monitor
///
/// Connects to the alert stream of a Hikvision camera or NVR and prints
/// availability changes and start/stop triggers as they happen.
#[derive(Parser, Debug)]
#[command(name = "alert-monitor")]
#[command(about = "Monitor the ISAPI alert stream of a camera or NVR")]
#[command(version)]
pub struct Args {
    /// Device host name or IP address
    #[arg(long, default_value = "")]
    pub host: String,

    /// Device port
    #[arg(short, long, default_value = "80")]
    pub port: u16,

    /// Username for basic authentication
    #[arg(short, long, default_value = "admin")]
    pub username: String,

    /// Password for basic authentication
    #[arg(long, default_value = "")]
    pub password: String,

    /// Display name for the device (defaults to the host)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Connect over https
    #[arg(long)]
    pub tls: bool,

    /// Verify the device certificate when using https
    #[arg(long)]
    pub strict_tls: bool,

    /// Seconds to wait before reconnecting after the device ends the stream
    #[arg(long, default_value = "30")]
    pub reconnect_after_end: u64,

    /// Seconds to wait before reconnecting after an error
    #[arg(long, default_value = "60")]
    pub reconnect_after_error: u64,

    /// Seconds without data before the stream is considered dead (0 disables)
    #[arg(long, default_value = "90")]
    pub idle_timeout: u64,

    /// Milliseconds after which an unconfirmed active event is stopped
    #[arg(long, default_value = "2000")]
    pub staleness_ms: u64,

    /// Log every frame and connection detail
    #[arg(long)]
    pub trace: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_colors: bool,

    /// Logging mode (silent, development, debug)
    #[arg(long, default_value = "development")]
    pub log_mode: String,

    /// Print the supported environment variables and exit
    #[arg(long)]
    pub env_help: bool,
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "A device host is required (--host or ISAPI_HOST)"
            ));
        }

        if self.port == 0 {
            return Err(anyhow::anyhow!("Port must not be 0"));
        }

        if self.staleness_ms == 0 {
            return Err(anyhow::anyhow!("Staleness window must be positive"));
        }

        self.log_mode
            .parse::<LoggingMode>()
            .map(|_| ())
            .map_err(anyhow::Error::from)
    }
}

/// Configuration derived from command line arguments and environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub device: DeviceConfig,
    pub stream: StreamConfig,
    pub use_colors: bool,
    pub log_mode: LoggingMode,
    pub env_help: bool,
}

impl TryFrom<Args> for Config {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self> {
        let log_mode = args.log_mode.parse::<LoggingMode>()?;

        let mut device = DeviceConfig::new(args.host, args.username, args.password)
            .with_port(args.port)
            .with_tls(args.tls, args.strict_tls);
        if let Some(name) = args.name {
            device = device.with_name(name);
        }

        let idle_timeout = (args.idle_timeout > 0).then(|| Duration::from_secs(args.idle_timeout));
        let stream = StreamConfig::new()
            .with_reconnect_delays(
                Duration::from_secs(args.reconnect_after_end),
                Duration::from_secs(args.reconnect_after_error),
            )
            .with_idle_timeout(idle_timeout)
            .with_staleness_window(Duration::from_millis(args.staleness_ms))
            .with_trace(args.trace);

        device.validate().context("Invalid device configuration")?;
        stream.validate().context("Invalid stream configuration")?;

        Ok(Self {
            device,
            stream,
            use_colors: !args.no_colors,
            log_mode,
            env_help: args.env_help,
        })
    }
}

impl Config {
    /// Create configuration from command line arguments and environment variables
    pub fn from_env() -> Result<Self> {
        let mut args = Args::parse();

        if args.env_help {
            return Ok(Config {
                device: DeviceConfig::new("", "", ""),
                stream: StreamConfig::default(),
                use_colors: true,
                log_mode: LoggingMode::Silent,
                env_help: true,
            });
        }

        // Override with environment variables if present
        if let Ok(host) = std::env::var("ISAPI_HOST") {
            args.host = host;
        }

        if let Ok(port) = std::env::var("ISAPI_PORT") {
            args.port = port.parse().context("Invalid ISAPI_PORT environment variable")?;
        }

        if let Ok(username) = std::env::var("ISAPI_USER") {
            args.username = username;
        }

        if let Ok(password) = std::env::var("ISAPI_PASSWORD") {
            args.password = password;
        }

        if let Ok(name) = std::env::var("ISAPI_NAME") {
            args.name = Some(name);
        }

        if let Ok(timeout) = std::env::var("ISAPI_IDLE_TIMEOUT") {
            args.idle_timeout = timeout
                .parse()
                .context("Invalid ISAPI_IDLE_TIMEOUT environment variable")?;
        }

        if let Ok(log_mode) = std::env::var("ISAPI_LOG_MODE") {
            args.log_mode = log_mode;
        }

        if std::env::var("ISAPI_TLS").is_ok() {
            args.tls = true;
        }

        if std::env::var("ISAPI_STRICT_TLS").is_ok() {
            args.strict_tls = true;
        }

        if std::env::var("ISAPI_TRACE").is_ok() {
            args.trace = true;
        }

        if std::env::var("ISAPI_NO_COLORS").is_ok() {
            args.no_colors = true;
        }

        args.validate()?;

        Config::try_from(args)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        info!("Configuration:");
        info!("  Device: {}", self.device.name);
        info!("  Endpoint: {}://{}:{}", self.device.scheme(), self.device.host, self.device.port);
        info!("  Username: {}", self.device.username);
        info!("  Reconnect after end: {:?}", self.stream.reconnect_after_end);
        info!("  Reconnect after error: {:?}", self.stream.reconnect_after_error);
        info!("  Idle timeout: {:?}", self.stream.idle_timeout);
        info!("  Staleness window: {:?}", self.stream.staleness_window);
        info!("  Trace: {}", self.stream.trace);
    }
}

/// Print help information about environment variables
fn print_env_help() {
    println!("Environment Variables:");
    println!("  ISAPI_HOST           Device host name or IP address");
    println!("  ISAPI_PORT           Device port (default: 80)");
    println!("  ISAPI_USER           Username (default: admin)");
    println!("  ISAPI_PASSWORD       Password");
    println!("  ISAPI_NAME           Display name for the device");
    println!("  ISAPI_IDLE_TIMEOUT   Seconds without data before reconnecting (default: 90, 0 disables)");
    println!("  ISAPI_LOG_MODE       Logging mode: silent, development, debug (default: development)");
    println!("  ISAPI_LOG_LEVEL      Log filter, takes precedence over RUST_LOG");
    println!("  ISAPI_TLS            Connect over https (set to enable)");
    println!("  ISAPI_STRICT_TLS     Verify the device certificate (set to enable)");
    println!("  ISAPI_TRACE          Log every frame (set to enable)");
    println!("  ISAPI_NO_COLORS      Disable colored output (set to enable)");
    println!();
}

/// Delivers SIGHUP, which restarts the stream without waiting for backoff.
struct RestartSignal {
    #[cfg(unix)]
    inner: tokio::signal::unix::Signal,
}

impl RestartSignal {
    fn new() -> Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let inner = signal(SignalKind::hangup()).context("Failed to listen for SIGHUP")?;
            Ok(Self { inner })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        if self.inner.recv().await.is_some() {
            return;
        }
        std::future::pending::<()>().await
    }
}

enum Action {
    Signal(Option<Signal>),
    Restart,
    Shutdown,
}

/// A running connector plus the consumer of its signals.
struct Monitor {
    config: Config,
    connector: StreamConnector,
    signals: mpsc::Receiver<Signal>,
    consumer: AlarmConsumer,
    formatter: UpdateFormatter,
}

impl Monitor {
    fn start(config: Config) -> Result<Self> {
        let (connector, signals) =
            StreamConnector::with_channel(config.device.clone(), config.stream.clone())
                .context("Failed to start alert stream")?;
        info!("Streaming from {}", connector.endpoint());

        Ok(Self {
            consumer: AlarmConsumer::new(config.device.name.clone()),
            formatter: UpdateFormatter::new(config.use_colors),
            config,
            connector,
            signals,
        })
    }

    /// Replace the running connector with a fresh one.
    async fn restart(&mut self) -> Result<()> {
        info!("Restarting alert stream");
        if let Err(e) = self.connector.shutdown().await {
            warn!("Failed to shut down alert stream: {}", e);
        }

        let (connector, signals) =
            StreamConnector::with_channel(self.config.device.clone(), self.config.stream.clone())
                .context("Failed to restart alert stream")?;
        self.connector = connector;
        self.signals = signals;
        Ok(())
    }

    async fn run(&mut self) -> Result<()> {
        let mut shutdown_signal = Box::pin(tokio::signal::ctrl_c());
        let mut restart_signal = RestartSignal::new()?;

        loop {
            let action = tokio::select! {
                signal = self.signals.recv() => Action::Signal(signal),
                _ = restart_signal.recv() => Action::Restart,
                _ = &mut shutdown_signal => Action::Shutdown,
            };

            match action {
                Action::Signal(Some(signal)) => self.process_signal(signal),
                Action::Signal(None) => {
                    warn!("Signal stream closed");
                    break;
                }
                Action::Restart => self.restart().await?,
                Action::Shutdown => {
                    info!("Received shutdown signal, stopping monitor");
                    break;
                }
            }
        }

        Ok(())
    }

    fn process_signal(&mut self, signal: Signal) {
        if let Some(update) = self.consumer.handle(&signal) {
            println!("{}", self.formatter.format(self.consumer.device(), &update));
        }
    }

    async fn shutdown(mut self) -> Result<()> {
        self.connector
            .shutdown()
            .await
            .context("Failed to shut down alert stream")?;

        println!("\n=== Signal Statistics ===");
        println!("{}", self.consumer.stats().summary());
        println!("Final availability: {}", self.consumer.availability());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from command line and environment
    let config = Config::from_env().context("Failed to parse configuration")?;

    if config.env_help {
        print_env_help();
        return Ok(());
    }

    logging::init_logging(config.log_mode).context("Failed to initialize logging")?;
    config.print_summary();

    let mut monitor = Monitor::start(config)?;
    let result = monitor.run().await;

    if let Err(e) = monitor.shutdown().await {
        error!("{:#}", e);
    }

    if let Err(e) = result {
        error!("Alert monitor failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["alert-monitor"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_args_require_host() {
        assert!(args(&[]).validate().is_err());
        assert!(args(&["--host", "192.168.1.64"]).validate().is_ok());
    }

    #[test]
    fn test_args_reject_bad_log_mode() {
        let args = args(&["--host", "nvr", "--log-mode", "chatty"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_config_from_args() {
        let config = Config::try_from(args(&[
            "--host",
            "192.168.1.64",
            "--port",
            "8443",
            "--tls",
            "--name",
            "Driveway",
            "--idle-timeout",
            "0",
            "--staleness-ms",
            "1500",
        ]))
        .unwrap();

        assert_eq!(config.device.name, "Driveway");
        assert_eq!(config.device.port, 8443);
        assert!(config.device.use_tls);
        assert!(!config.device.strict_tls);
        assert_eq!(config.stream.idle_timeout, None);
        assert_eq!(config.stream.staleness_window, Duration::from_millis(1500));
        assert_eq!(config.stream.reconnect_after_end, Duration::from_secs(30));
        assert_eq!(config.log_mode, LoggingMode::Development);
    }
}
