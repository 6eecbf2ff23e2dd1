//! botsrv entry point

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use base64::Engine;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use botsrv::app_state::AppState;
use botsrv::bootstrap::{build_stuckup, http_client, seatalk_client};
use botsrv::config::Settings;
use botsrv::routes::create_routes;
use botsrv::stuckup::alert::SampleAlert;
use botsrv::stuckup::monitor::MonitorConfig;
use botsrv::stuckup::StuckupMonitor;
use common::service_bootstrap::{self, ServiceInfo};
use common::shutdown::wait_for_shutdown;

const DEFAULT_PORT: u16 = 8000;

#[derive(Parser, Debug)]
#[command(author, version, about = "botsrv - SeaTalk bot and stuckup sync service")]
struct Args {
    /// Configuration file (YAML)
    #[arg(short, long, value_name = "FILE", env = "BOTSRV_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the webhook server and the stuckup monitor (default)
    Serve,
    /// Print configuration and monitor preconditions
    Check,
    /// Send a sample dashboard alert through the system-account webhook
    SendDashboardAlert {
        /// Text to send instead of the rendered template
        #[arg(long)]
        text: Option<String>,
        /// PNG to send instead of a live capture
        #[arg(long, value_name = "FILE")]
        image_path: Option<PathBuf>,
        #[arg(long)]
        skip_text: bool,
        #[arg(long)]
        skip_image: bool,
        /// Do not mention everyone
        #[arg(long)]
        no_at_all: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    service_bootstrap::load_development_env();
    let args = Args::parse();

    let settings = Settings::load(args.config.as_deref())?;
    let service_info = ServiceInfo::new(
        "botsrv",
        env!("CARGO_PKG_VERSION"),
        "SeaTalk bot webhook server with stuckup sheet sync",
        DEFAULT_PORT,
    );

    match args.command {
        Some(Commands::Check) => check_config(&settings),
        Some(Commands::SendDashboardAlert {
            text,
            image_path,
            skip_text,
            skip_image,
            no_at_all,
        }) => {
            service_bootstrap::init_logging(&service_info, &settings.log_level, settings.log_json)?;
            let image_base64 = match image_path {
                Some(path) => {
                    let bytes = tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    Some(base64::engine::general_purpose::STANDARD.encode(bytes))
                },
                None => None,
            };
            let sample = SampleAlert {
                text,
                image_base64,
                skip_text,
                skip_image,
                at_all: settings.stuckup_dashboard_alert_at_all && !no_at_all,
            };
            send_dashboard_alert(&settings, sample).await
        },
        Some(Commands::Serve) | None => {
            service_bootstrap::init_logging(&service_info, &settings.log_level, settings.log_json)?;
            service_bootstrap::print_startup_banner(&service_info);
            run_service(settings, &service_info).await
        },
    }
}

async fn run_service(settings: Settings, service_info: &ServiceInfo) -> anyhow::Result<()> {
    let settings = Arc::new(settings);
    let http = http_client()?;

    let monitor = match build_stuckup(&settings, &http) {
        Ok(stuckup) => {
            let monitor = Arc::new(StuckupMonitor::new(
                &stuckup,
                MonitorConfig::from_settings(&settings)?,
            ));
            monitor.start().await;
            Some(monitor)
        },
        Err(e) => {
            warn!("Stuckup subsystem unavailable: {}", e);
            None
        },
    };

    let sender = Arc::new(seatalk_client(&settings, &http));
    let state = Arc::new(AppState::new(settings.clone(), sender, monitor.clone()));
    let app = create_routes(state);

    let port = service_bootstrap::get_service_port(settings.app_port, service_info);
    let addr: SocketAddr = format!("{}:{}", settings.app_host, port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", settings.app_host, port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("API server listening on http://{}", addr);

    let shutdown_token = CancellationToken::new();
    let server_token = shutdown_token.clone();
    let server_handle = tokio::spawn(async move {
        let shutdown = async move { server_token.cancelled().await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("Server error: {}", e);
        }
    });

    let signal = wait_for_shutdown().await;
    info!("Received {}, shutting down", signal);

    shutdown_token.cancel();
    if let Some(monitor) = monitor {
        monitor.stop().await;
    }
    if let Err(e) = server_handle.await {
        error!("Server task failed: {}", e);
    }
    info!("botsrv stopped");
    Ok(())
}

async fn send_dashboard_alert(settings: &Settings, sample: SampleAlert) -> anyhow::Result<()> {
    if !settings.alert_webhook_configured() {
        anyhow::bail!("STUCKUP_DASHBOARD_ALERT_SYSTEM_WEBHOOK_URL is not configured");
    }
    let http = http_client()?;
    let stuckup = build_stuckup(settings, &http)?;
    stuckup.alert.send_sample(sample).await?;
    info!("Sample dashboard alert sent");
    Ok(())
}

fn check_config(settings: &Settings) -> anyhow::Result<()> {
    println!("=== botsrv configuration ===\n");
    for (key, value) in settings.describe() {
        println!("{:<44} {}", key, value);
    }

    println!("\n--- stuckup monitor ---");
    let monitor = MonitorConfig::from_settings(settings)?;
    println!("{:<44} {}", "mode", monitor.mode.as_str());
    println!("{:<44} {}", "reference range", monitor.reference_range);
    match monitor.precondition_failure() {
        None => println!("preconditions: ok"),
        Some(reason) => println!("preconditions: NOT MET ({})", reason),
    }
    Ok(())
}
