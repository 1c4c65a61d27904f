use std::sync::Arc;

use clap::Parser;
use email_agent_gateway::{
    config::AppConfig,
    generation::{GenerationBackendConfig, OpenAiClient},
    logging::{init_logging, LoggingConfig},
    server,
};
use tracing::{warn, Level};

#[derive(Debug, Parser)]
#[command(
    name = "email-agent-gateway",
    about = "Streaming writer/editor/translator email pipeline server",
    version
)]
struct CliArgs {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// OpenAI-compatible backend base URL
    #[arg(long, default_value = "https://api.openai.com")]
    backend_url: String,

    /// Backend API key; falls back to OPENAI_API_KEY
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Overall per-run deadline in seconds; 0 disables it
    #[arg(long, default_value_t = 120)]
    request_timeout_secs: u64,

    /// Maximum request body size in bytes
    #[arg(long, default_value_t = 1024 * 1024)]
    max_payload_size: usize,

    /// Allowed CORS origin (repeatable); none allows any origin
    #[arg(long = "cors-allowed-origin")]
    cors_allowed_origins: Vec<String>,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let level = args.log_level.to_uppercase().parse::<Level>().unwrap_or(Level::INFO);
    init_logging(LoggingConfig {
        level,
        json_format: args.log_json,
        colorize: true,
    });
    if args.log_level.to_uppercase().parse::<Level>().is_err() {
        warn!("Invalid log level '{}', defaulting to INFO", args.log_level);
    }

    let config = AppConfig {
        host: args.host,
        port: args.port,
        max_payload_size: args.max_payload_size,
        request_timeout_secs: args.request_timeout_secs,
        cors_allowed_origins: args.cors_allowed_origins,
        backend: GenerationBackendConfig {
            base_url: args.backend_url,
            api_key: args.api_key,
            model: args.model,
        },
    };
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    let client = Arc::new(OpenAiClient::new(config.backend.clone()));
    if let Err(e) = server::startup(config, client).await {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
