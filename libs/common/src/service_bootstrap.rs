//! Service bootstrap helpers
//!
//! Startup banner, logging initialization, `.env` loading and port resolution.

use crate::logging::{self, LogConfig};
use tracing::info;

/// Service metadata for startup
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Service name (e.g. "botsrv")
    pub name: String,
    /// Service version
    pub version: String,
    /// One-line description
    pub description: String,
    /// Default HTTP port
    pub default_port: u16,
}

impl ServiceInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        default_port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            default_port,
        }
    }
}

/// Print the startup banner
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = match service.name.as_str() {
        "botsrv" => {
            r#"
 ██████╗  ██████╗ ████████╗███████╗██████╗ ██╗   ██╗
 ██╔══██╗██╔═══██╗╚══██╔══╝██╔════╝██╔══██╗██║   ██║
 ██████╔╝██║   ██║   ██║   ███████╗██████╔╝██║   ██║
 ██╔══██╗██║   ██║   ██║   ╚════██║██╔══██╗╚██╗ ██╔╝
 ██████╔╝╚██████╔╝   ██║   ███████║██║  ██║ ╚████╔╝
 ╚═════╝  ╚═════╝    ╚═╝   ╚══════╝╚═╝  ╚═╝  ╚═══╝
            "#
        },
        _ => "",
    };

    if !banner.is_empty() {
        info!("{}", banner);
    }
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!(" Default Port: {}", service.default_port);
}

/// Initialize logging for a service
///
/// Files land in `{log_root}/{service}/{service}.log.YYYY-MM-DD`, where the log
/// root comes from `BOTSRV_LOG_DIR` or defaults to `logs`.
pub fn init_logging(service: &ServiceInfo, level: &str, json: bool) -> anyhow::Result<()> {
    logging::init_log_root(None);
    let log_dir = logging::get_log_root().join(&service.name);

    logging::init_with_config(LogConfig {
        service_name: service.name.clone(),
        log_dir,
        default_level: level.to_string(),
        enable_json: json,
        console_only: false,
    })
}

/// Load a `.env` file in debug builds
///
/// Variables already present in the environment are left alone. Release builds
/// expect the environment to be set externally.
pub fn load_development_env() {
    #[cfg(debug_assertions)]
    {
        if let Ok(content) = std::fs::read_to_string(".env") {
            for (key, value) in parse_env_lines(&content) {
                if std::env::var(&key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
    }
}

/// Parse `KEY=VALUE` lines, skipping comments and blanks and stripping matching quotes
pub fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = ['"', '\'']
                .iter()
                .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
                .unwrap_or(value);
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Resolve the listen port
///
/// A port left at its default can still be overridden by `SERVICE_PORT` or
/// `{NAME}_PORT`.
pub fn get_service_port(config_port: u16, service: &ServiceInfo) -> u16 {
    let is_default = config_port == 0 || config_port == service.default_port;

    if is_default {
        let service_var = format!("{}_PORT", service.name.to_uppercase());
        for var in ["SERVICE_PORT", service_var.as_str()] {
            if let Some(p) = std::env::var(var).ok().and_then(|v| v.trim().parse::<u16>().ok()) {
                if p > 0 {
                    return p;
                }
            }
        }
    }

    if config_port > 0 {
        config_port
    } else {
        service.default_port
    }
}
