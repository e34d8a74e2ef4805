use anyhow::Context;
use clap::Parser;
use livegrid_server::{SchemaKind, ServerConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "livegrid")]
#[command(author, version, about = "Live transcript annotation ingestion server", long_about = None)]
struct Cli {
    /// Config file (default: ./livegrid.config.json if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Document schema fed by the listeners
    #[arg(short, long, value_enum)]
    schema: Option<SchemaKind>,

    /// Address to bind listeners on
    #[arg(long)]
    bind: Option<String>,

    /// UDP ingestion port
    #[arg(long)]
    udp_port: Option<u16>,

    /// Disable UDP ingestion
    #[arg(long, conflicts_with = "udp_port")]
    no_udp: bool,

    /// Newline-delimited TCP ingestion port
    #[arg(long)]
    tcp_port: Option<u16>,

    /// HTTP read API port
    #[arg(long)]
    http_port: Option<u16>,

    /// Status summary interval in milliseconds (0 disables)
    #[arg(long)]
    report_interval_ms: Option<u64>,
}

impl Cli {
    /// Command-line flags win over the config file
    fn apply(self, config: &mut ServerConfig) {
        if let Some(schema) = self.schema {
            config.schema = schema;
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(port) = self.udp_port {
            config.udp_port = Some(port);
        }
        if self.no_udp {
            config.udp_port = None;
        }
        if let Some(port) = self.tcp_port {
            config.tcp_port = Some(port);
        }
        if let Some(port) = self.http_port {
            config.http_port = Some(port);
        }
        if let Some(ms) = self.report_interval_ms {
            config.report_interval_ms = Some(ms);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    cli.apply(&mut config);

    livegrid_server::run(config).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from(["livegrid", "--schema", "events", "--no-udp", "--tcp-port", "7001"]);
        let mut config = ServerConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.schema, SchemaKind::Events);
        assert_eq!(config.udp_port, None);
        assert_eq!(config.tcp_port, Some(7001));
        assert_eq!(config.bind, "0.0.0.0");
    }

    #[test]
    fn test_no_udp_conflicts_with_port() {
        assert!(Cli::try_parse_from(["livegrid", "--no-udp", "--udp-port", "1"]).is_err());
    }
}
