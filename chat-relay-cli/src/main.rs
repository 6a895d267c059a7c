//! CLI entry point for chat-relay

use anyhow::Result;
use chat_relay_agent::{BatcherConfig, DebounceBatcher, TurnHandler};
use chat_relay_channels::{EventRouter, Transport, TransportPtr, WhatsAppTransport};
use chat_relay_core::bus::EventBus;
use chat_relay_core::config::{Config, ConfigLoader};
use chat_relay_core::logging::init_logging;
use chat_relay_responder::HttpResponder;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Input};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How long shutdown waits for the batcher to flush its last batch
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "chat-relay")]
#[command(about = "Debounced relay between a chat transport and a reply service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize chat-relay configuration
    Onboard {
        /// Write defaults without prompting
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Run the relay gateway
    Gateway,
    /// Show the effective configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    match cli.command {
        Commands::Onboard { yes } => run_onboard(&config_loader, yes)?,
        Commands::Gateway => run_gateway(&config_loader).await?,
        Commands::Status => run_status(&config_loader)?,
    }

    Ok(())
}

/// Write an initial configuration, prompting unless `assume_defaults`
fn run_onboard(loader: &ConfigLoader, assume_defaults: bool) -> Result<()> {
    println!("{}", style("Welcome to chat-relay!").bold().cyan());

    let config_path = loader.config_path();
    if config_path.exists() && !assume_defaults {
        let overwrite = Confirm::new()
            .with_prompt("Configuration already exists. Overwrite?")
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Onboard cancelled.");
            return Ok(());
        }
    }

    // The gateway needs a transport, so the bridge is on unless declined.
    let mut config = Config::default();
    config.channels.whatsapp.enabled = true;
    if !assume_defaults {
        config.responder.url = Input::new()
            .with_prompt("Responder URL")
            .default(config.responder.url.clone())
            .interact_text()?;
        config.channels.whatsapp.enabled = Confirm::new()
            .with_prompt("Enable the WhatsApp bridge transport?")
            .default(true)
            .interact()?;
        if config.channels.whatsapp.enabled {
            config.channels.whatsapp.bridge_url = Input::new()
                .with_prompt("WhatsApp bridge URL")
                .default(config.channels.whatsapp.bridge_url.clone())
                .interact_text()?;
        }
    }

    chat_relay_core::config::validate::validate_config(&config)?;
    loader.save(&config)?;

    println!(
        "\n{}",
        style("Configuration saved successfully!").green().bold()
    );
    println!("Config location: {}", config_path.display());
    println!("\nYou can now run:");
    println!("  {} - Start the relay", style("chat-relay gateway").cyan());

    Ok(())
}

/// Fail early when no transport is enabled
fn ensure_transport_enabled(config: &Config, loader: &ConfigLoader) -> Result<()> {
    if !config.channels.whatsapp.enabled {
        anyhow::bail!(
            "No transport enabled; set channels.whatsapp.enabled in {}",
            loader.config_path().display()
        );
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM with the name of the signal received
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|_| "interrupt"),
        _ = terminate.recv() => Ok("terminate"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "interrupt")
}

/// Flush the pending batch while the transport can still deliver it, then stop
///
/// Dropping every intake sender is what makes the batcher flush and exit.
async fn drain_and_stop(
    bus: EventBus,
    router: JoinHandle<()>,
    batcher: JoinHandle<TurnHandler>,
    transport: TransportPtr,
) {
    router.abort();
    let _ = router.await;
    drop(bus);

    match tokio::time::timeout(DRAIN_TIMEOUT, batcher).await {
        Ok(Ok(handler)) => info!(
            "Batcher drained ({} history entries)",
            handler.history().len()
        ),
        Ok(Err(e)) => error!("Batcher task failed: {}", e),
        Err(_) => warn!("Batcher did not drain within {:?}", DRAIN_TIMEOUT),
    }

    if let Err(e) = transport.write().await.stop().await {
        error!("Failed to stop transport: {}", e);
    }
}

/// Run the relay until Ctrl+C or SIGTERM
async fn run_gateway(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;
    let _log_guard = init_logging(&config.logging);
    ensure_transport_enabled(&config, loader)?;

    println!("{}", style("Starting chat-relay gateway...").bold().cyan());
    println!("Responder: {}", config.responder.url);
    println!("Bridge: {}", config.channels.whatsapp.bridge_url);

    let bus = EventBus::with_capacity(config.relay.intake_capacity);
    let intake = bus
        .take_receiver()
        .await
        .ok_or_else(|| anyhow::anyhow!("Intake receiver already taken"))?;

    // Transport events -> router -> intake queue
    let (event_tx, event_rx) = mpsc::channel(config.relay.intake_capacity);
    let mut whatsapp = WhatsAppTransport::new(config.channels.whatsapp.clone());
    whatsapp.set_event_sender(event_tx);
    let transport: TransportPtr = Arc::new(RwLock::new(whatsapp));
    let router_handle = EventRouter::new(bus.clone()).spawn(event_rx);

    let responder = Arc::new(HttpResponder::from_config(&config.responder)?);
    let handler = TurnHandler::from_config(&config, responder, transport.clone());
    let batcher_handle =
        DebounceBatcher::new(BatcherConfig::from(&config.relay), intake, handler).spawn();

    transport.write().await.start().await?;

    println!(
        "\n{}",
        style("Gateway is running. Press Ctrl+C to stop.").green()
    );

    let received = shutdown_signal().await?;
    info!("Received {} signal", received);
    println!("\n{}", style("Shutting down...").yellow());

    drain_and_stop(bus, router_handle, batcher_handle, transport).await;

    println!("{}", style("Gateway stopped.").green());
    Ok(())
}

/// Print the effective configuration
fn run_status(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;

    println!("{}", style("chat-relay Status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    let file_state = if loader.config_path().exists() {
        style("present").green()
    } else {
        style("missing, using defaults").yellow()
    };
    println!(
        "  Config file: {} ({})",
        loader.config_path().display(),
        file_state
    );
    println!();

    println!("{}", style("Relay:").bold());
    println!("  Debounce window: {} ms", config.relay.debounce_ms);
    println!("  Max batch size: {}", config.relay.max_batch_size);
    println!("  Intake capacity: {}", config.relay.intake_capacity);
    println!(
        "  History: {} kept, {} sent per request",
        config.relay.history_capacity, config.relay.history_window
    );
    println!();

    println!("{}", style("Responder:").bold());
    println!("  URL: {}", config.responder.url);
    match config.responder.timeout() {
        Some(timeout) => println!("  Timeout: {:?}", timeout),
        None => println!("  Timeout: {}", style("none").yellow()),
    }
    println!();

    println!("{}", style("Channels:").bold());
    let whatsapp = &config.channels.whatsapp;
    let status = if whatsapp.enabled {
        style("enabled").green()
    } else {
        style("disabled").dim()
    };
    println!("  WhatsApp: {} ({})", status, whatsapp.bridge_url);
    if !whatsapp.allow_from.is_empty() {
        println!("  Allowed senders: {}", whatsapp.allow_from.join(", "));
    }
    println!();

    println!("{}", style("Logging:").bold());
    println!("  {}", serde_json::to_string(&config.logging)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chat_relay_channels::{ChannelError, TransportEvent};
    use chat_relay_core::bus::{InboundEvent, OutboundMessage};
    use chat_relay_responder::{Responder, ResponderRequest, ResponderResponse, ResponderResult};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct EchoResponder;

    #[async_trait]
    impl Responder for EchoResponder {
        async fn respond(&self, request: ResponderRequest) -> ResponderResult<ResponderResponse> {
            Ok(ResponderResponse {
                response: format!("re:{}", request.message),
            })
        }

        fn endpoint(&self) -> String {
            "echo".to_string()
        }
    }

    /// Delivers only between `start` and `stop`, like the bridge transport
    struct GatedTransport {
        running: bool,
        sent: Arc<Mutex<Vec<OutboundMessage>>>,
    }

    #[async_trait]
    impl Transport for GatedTransport {
        fn name(&self) -> &str {
            "gated"
        }

        fn is_running(&self) -> bool {
            self.running
        }

        async fn start(&mut self) -> chat_relay_channels::Result<()> {
            self.running = true;
            Ok(())
        }

        async fn stop(&mut self) -> chat_relay_channels::Result<()> {
            self.running = false;
            Ok(())
        }

        async fn send(&self, message: OutboundMessage) -> chat_relay_channels::Result<()> {
            if !self.running {
                return Err(ChannelError::NotRunning("gated".to_string()));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        fn set_event_sender(&mut self, _tx: mpsc::Sender<TransportEvent>) {}

        fn is_allowed(&self, _sender_id: &str) -> bool {
            true
        }
    }

    #[test]
    fn test_parse_global_config_dir() {
        let cli = Cli::try_parse_from(["chat-relay", "status", "--config-dir", "/tmp/relay"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Status));
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/relay")));
    }

    #[test]
    fn test_parse_onboard_yes() {
        let cli = Cli::try_parse_from(["chat-relay", "onboard", "-y"]).unwrap();
        assert!(matches!(cli.command, Commands::Onboard { yes: true }));
    }

    #[test]
    fn test_onboard_defaults_writes_loadable_config() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(dir.path());

        run_onboard(&loader, true).unwrap();

        let raw = std::fs::read_to_string(loader.config_path()).unwrap();
        let written: Config = serde_json::from_str(&raw).unwrap();
        assert_eq!(written.relay.debounce_ms, 2000);
        assert_eq!(written.relay.max_batch_size, 2);
        assert_eq!(written.responder.url, "http://localhost:5001/chat");
    }

    #[test]
    fn test_onboard_defaults_satisfy_gateway() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(dir.path());

        run_onboard(&loader, true).unwrap();

        let config = loader.load().unwrap();
        assert!(config.channels.whatsapp.enabled);
        assert!(ensure_transport_enabled(&config, &loader).is_ok());
    }

    #[test]
    fn test_disabled_transport_rejected() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(dir.path());
        let config = Config::default();

        let err = ensure_transport_enabled(&config, &loader).unwrap_err();
        assert!(err.to_string().contains("No transport enabled"));
    }

    #[tokio::test]
    async fn test_shutdown_delivers_pending_batch_before_stopping_transport() {
        let bus = EventBus::new();
        let intake = bus.take_receiver().await.unwrap();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport: TransportPtr = Arc::new(RwLock::new(GatedTransport {
            running: false,
            sent: sent.clone(),
        }));
        transport.write().await.start().await.unwrap();

        let (_event_tx, event_rx) = mpsc::channel(8);
        let router = EventRouter::new(bus.clone()).spawn(event_rx);
        let handler = TurnHandler::new(Arc::new(EchoResponder), transport.clone());
        let config = BatcherConfig {
            debounce: Duration::from_secs(60),
            max_batch_size: 2,
        };
        let batcher = DebounceBatcher::new(config, intake, handler).spawn();

        bus.publish(InboundEvent::new("whatsapp", "15550001", "last words"))
            .await
            .unwrap();

        drain_and_stop(bus, router, batcher, transport.clone()).await;

        let sent = sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "15550001");
        assert_eq!(sent[0].content, "re:last words");
        assert!(!transport.read().await.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_triggers_shutdown() {
        use tokio_test::{assert_pending, task};

        let mut wait = task::spawn(shutdown_signal());
        // First poll installs the handlers
        assert_pending!(wait.poll());

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let received = tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, "terminate");
    }
}
