//! Yggdrasil Mixin DNS Responder
//!
//! Answers AAAA queries with Yggdrasil overlay addresses that are computed,
//! not looked up.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     YGG MIXIN DNS                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  UDP Listener (5353)   ←── one task per datagram            │
//! │  Codec                 ←── parse query / pack answer        │
//! │  Query Dispatcher      ←── suffix routing, first AAAA wins  │
//! │  Hostname Resolver     ←── label mixed into base key        │
//! │  Key Resolver          ←── base32 public key in the label   │
//! │  Address Derivation    ←── key → 200::/7 address            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod address;
mod base32;
mod config;
mod crypto;
mod dns;
mod stats;
mod types;

use config::MixinConfig;
use crypto::BaseIdentity;
use dns::resolver::{AnswerProducer, HostnameResolver};
use dns::{DnsServer, QueryDispatcher};
use stats::Stats;

/// Ygg Mixin DNS - synthetic Yggdrasil addresses over DNS
#[derive(Parser, Debug)]
#[command(name = "ygg-mixin-dns")]
#[command(version)]
#[command(about = "Answers AAAA queries with Yggdrasil addresses derived from mixed or supplied keys", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "ygg-mixin-dns.toml")]
    config: PathBuf,

    /// Yggdrasil configuration (HJSON or JSON) to read the private key from
    #[arg(long)]
    useconffile: Option<PathBuf>,

    /// UDP port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    listen: Option<IpAddr>,

    /// Hostname suffix to answer for, must end with a dot, e.g. "-ygg.local."
    #[arg(long = "hostnamesuffix")]
    hostname_suffix: Option<String>,

    /// Key suffix to answer for, must end with a dot, e.g. "-yggk.local."
    #[arg(long = "keysuffix")]
    key_suffix: Option<String>,

    /// Join the mDNS multicast group
    #[arg(long)]
    multicast: bool,

    /// Log destination: "stdout" or a file path
    #[arg(long, default_value = "stdout")]
    logto: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print a configuration with a new private key and exit
    #[arg(long)]
    genconf: bool,

    /// Print the address a hostname label resolves to and exit
    #[arg(long, value_name = "LABEL")]
    address_for: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.genconf {
        let identity = BaseIdentity::generate();
        let config = MixinConfig::default().with_private_key(Some(identity.to_hex()));
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    init_logging(&args.logto, &args.log_level)?;

    info!("🌐 Ygg Mixin DNS v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if args.config.exists() {
        MixinConfig::load(&args.config)?
    } else {
        warn!("Config file {:?} not found, using defaults", args.config);
        MixinConfig::default()
    };

    let useconf_key = args
        .useconffile
        .as_deref()
        .map(config::load_identity_file)
        .transpose()?;

    // Override config with CLI args
    let config = config
        .with_port(args.port)
        .with_listen_address(args.listen)
        .with_hostname_suffix(args.hostname_suffix)
        .with_key_suffix(args.key_suffix)
        .with_multicast(args.multicast)
        .with_private_key(useconf_key);

    config.validate()?;

    let key_hex = config.private_key.as_deref().ok_or_else(|| {
        anyhow::anyhow!(
            "No private key: set private_key in {:?} or pass --useconffile",
            args.config
        )
    })?;
    let identity = Arc::new(BaseIdentity::from_hex(key_hex)?);

    info!("🔑 Base public key: {}", hex::encode(identity.public_key()));
    info!(
        "   Key name: {}{}",
        base32::encode_nopad(&identity.public_key()),
        config.key_suffix
    );

    if let Some(label) = args.address_for {
        let address = HostnameResolver::new(identity).produce(label.as_bytes())?;
        println!("{}{} {}", label, config.hostname_suffix, address);
        return Ok(());
    }

    info!("⚙️  Configuration:");
    info!("   Listen: [{}]:{}", config.listen_address, config.port);
    info!("   Hostname suffix: {}", config.hostname_suffix);
    info!("   Key suffix: {}", config.key_suffix);
    info!("   TTL: {}s", config.ttl);
    info!("   Multicast: {}", config.multicast);

    let stats = Arc::new(Stats::new());
    let dispatcher = Arc::new(QueryDispatcher::from_config(&config, identity));
    let server = DnsServer::bind(&config, dispatcher, stats.clone()).await?;

    let server_handle = tokio::spawn(server.run());
    let status_handle = tokio::spawn(run_status_log(stats.clone(), config.status_interval_secs));

    info!("✅ Responder started");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutdown signal received");
        }
        result = server_handle => {
            error!("DNS responder exited: {:?}", result);
        }
        result = status_handle => {
            error!("Status task exited: {:?}", result);
        }
    }

    info!("📊 Final statistics: {:?}", stats.snapshot());
    info!("👋 Ygg Mixin DNS shutting down");
    Ok(())
}

fn init_logging(logto: &str, level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if logto == "stdout" {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(logto)
            .map_err(|e| anyhow::anyhow!("Failed to open log file {}: {}", logto, e))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    }

    Ok(())
}

/// Periodic status line
async fn run_status_log(stats: Arc<Stats>, interval_secs: u64) -> anyhow::Result<()> {
    if interval_secs == 0 {
        std::future::pending::<()>().await;
    }

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        let s = stats.snapshot();
        info!(
            "📊 Status: {} received, {} answered, {} malformed, {} invalid keys, {} unanswerable, uptime {}s",
            s.received, s.answered, s.malformed, s.invalid_keys, s.unanswerable, s.uptime_secs
        );
    }
}
