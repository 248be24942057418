//! authcache CLI - inspect auth database snapshots offline
//!
//! Loads a snapshot in the update feed's JSON format and runs the same
//! verification and lookup paths a service would.

use anyhow::{bail, Context, Result};
use authcache::{hash_password, Authenticator, Snapshot};
use authcache_core::{init_logging, AuthCacheConfig, LogOutput, LoggingConfig};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "authcache")]
#[command(about = "Verify credentials and look up service accounts in an auth database snapshot")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a user/password pair; leave both empty for anonymous access
    Verify {
        /// Snapshot JSON file
        #[arg(short, long)]
        snapshot: PathBuf,

        #[arg(short, long, default_value = "")]
        user: String,

        #[arg(short, long, default_value = "")]
        password: String,

        /// Permission to evaluate for the verified credential (repeatable)
        #[arg(long = "permission")]
        permissions: Vec<String>,
    },

    /// Look up service credentials for host:port
    ServiceAuth {
        /// Snapshot JSON file
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Target node, e.g. `beta.local:9000` or `[::1]:9000`
        hostport: String,
    },

    /// Print the base64 digest stored for a password
    HashPassword {
        #[arg(long)]
        salt: String,

        password: String,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Write the default configuration to this path
        #[arg(long)]
        init: Option<PathBuf>,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    let logging_config = cli_logging_config(&config, cli.verbose, cli.config.is_some());
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    debug!("Starting authcache CLI v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Verify {
            snapshot,
            user,
            password,
            permissions,
        } => handle_verify(&config, &snapshot, &user, &password, &permissions).await,
        Commands::ServiceAuth { snapshot, hostport } => {
            handle_service_auth(&config, &snapshot, &hostport).await
        }
        Commands::HashPassword { salt, password } => {
            println!("{}", BASE64.encode(hash_password(&password, salt.as_bytes())));
            Ok(())
        }
        Commands::Config {
            show,
            init,
            validate,
        } => handle_config(&config, show, init, validate),
    }
}

/// stdout carries command output, so logs always go to stderr
fn cli_logging_config(
    config: &AuthCacheConfig,
    verbose: bool,
    explicit_config: bool,
) -> LoggingConfig {
    let mut logging_config = config.logging.clone();
    logging_config.output = LogOutput::Stderr;
    if verbose {
        logging_config.level = "debug".to_string();
        logging_config.filter_directives = vec!["authcache=debug".to_string()];
    } else if !explicit_config {
        logging_config.level = "warn".to_string();
        logging_config.filter_directives = vec!["authcache=warn".to_string()];
    }
    logging_config
}

fn load_config(config_path: Option<&Path>) -> Result<AuthCacheConfig> {
    if let Some(path) = config_path {
        return AuthCacheConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path));
    }

    let default_paths = [
        dirs::config_dir().map(|d| d.join("authcache").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".authcache").join("config.toml")),
        Some(PathBuf::from("authcache.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            return AuthCacheConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path));
        }
    }

    Ok(AuthCacheConfig::default())
}

/// Authenticator already holding the snapshot read from `path`
async fn load_authenticator(config: &AuthCacheConfig, path: &Path) -> Result<Authenticator> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read snapshot {:?}", path))?;
    let snapshot = Snapshot::from_json(&bytes)
        .with_context(|| format!("Failed to decode snapshot {:?}", path))?;

    info!(
        users = snapshot.users().count(),
        buckets = snapshot.buckets().count(),
        nodes = snapshot.nodes().len(),
        "Loaded snapshot"
    );

    let authenticator = Authenticator::from_config(config)?;
    authenticator.coordinator().push(snapshot);
    Ok(authenticator)
}

async fn handle_verify(
    config: &AuthCacheConfig,
    snapshot: &Path,
    user: &str,
    password: &str,
    permissions: &[String],
) -> Result<()> {
    let authenticator = load_authenticator(config, snapshot).await?;

    let credential = match authenticator.auth(user, password).await {
        Ok(credential) => credential,
        Err(e) => {
            e.log();
            bail!("Credentials rejected: {}", e);
        }
    };

    let decisions: serde_json::Map<String, serde_json::Value> = permissions
        .iter()
        .map(|permission| {
            (
                permission.clone(),
                serde_json::Value::Bool(credential.is_allowed(permission)),
            )
        })
        .collect();

    let output = serde_json::json!({
        "credential": credential,
        "permissions": decisions,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn handle_service_auth(
    config: &AuthCacheConfig,
    snapshot: &Path,
    hostport: &str,
) -> Result<()> {
    let authenticator = load_authenticator(config, snapshot).await?;
    let credentials = authenticator.service_auth(hostport).await?;
    println!("{}", serde_json::to_string_pretty(&credentials)?);
    Ok(())
}

fn handle_config(
    config: &AuthCacheConfig,
    show: bool,
    init: Option<PathBuf>,
    validate: bool,
) -> Result<()> {
    if let Some(path) = init {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        AuthCacheConfig::default().save_to_file(&path)?;
        println!("Configuration initialized at: {:?}", path);
    }

    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }

    if validate {
        match config.validate() {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => bail!("Configuration validation failed: {}", e),
        }
    }

    Ok(())
}
