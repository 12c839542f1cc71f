//! Headless Sync Client
//!
//! Connects to a sync server, optionally publishes a model config, watches
//! the sync traffic for a while and prints the resulting store as JSON.
//!
//! Usage:
//!   cottfur-client [--server <addr>] [--name <name>] [--species <id>] [options]
//!
//! Examples:
//!   cottfur-client --server 127.0.0.1:25590 --name Rin --species k9 --primary "#224466"
//!   cottfur-client --watch 30

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use cottfur_sync::model::pattern::parse_color;
use cottfur_sync::model::{ModelRegistry, PlayerModelConfig, PlayerModelStore};
use cottfur_sync::net::connection::{ClientConnection, ConnectOptions};

/// CLI arguments
struct Args {
    /// Server address
    server: String,
    /// Display name sent in the hello
    name: String,
    /// Player id (random if not given)
    player_id: Uuid,
    /// Config to publish after connecting
    config: Option<PlayerModelConfig>,
    /// Seconds to watch sync traffic before printing
    watch_secs: u64,
    /// Verbose output
    verbose: bool,
}

fn next_value(args: &[String], i: &mut usize, flag: &str) -> Result<String, String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("Missing value for {}", flag))
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = std::env::args().collect();

    let mut server = "127.0.0.1:25590".to_string();
    let mut name = "headless".to_string();
    let mut player_id = Uuid::new_v4();
    let mut species: Option<String> = None;
    let mut texture: Option<String> = None;
    let mut pattern: Option<String> = None;
    let mut colors: [Option<u32>; 3] = [None; 3];
    let mut watch_secs: u64 = 5;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--server" | "-s" => server = next_value(&args, &mut i, "--server")?,
            "--name" | "-n" => name = next_value(&args, &mut i, "--name")?,
            "--player-id" => {
                let value = next_value(&args, &mut i, "--player-id")?;
                player_id = Uuid::parse_str(&value)
                    .map_err(|_| format!("Invalid player id: {}", value))?;
            }
            "--species" => species = Some(next_value(&args, &mut i, "--species")?),
            "--texture" => texture = Some(next_value(&args, &mut i, "--texture")?),
            "--pattern" => pattern = Some(next_value(&args, &mut i, "--pattern")?),
            "--primary" => colors[0] = Some(parse_color(&next_value(&args, &mut i, "--primary")?)),
            "--secondary" => {
                colors[1] = Some(parse_color(&next_value(&args, &mut i, "--secondary")?))
            }
            "--accent" => colors[2] = Some(parse_color(&next_value(&args, &mut i, "--accent")?)),
            "--watch" | "-w" => {
                let value = next_value(&args, &mut i, "--watch")?;
                watch_secs = value
                    .parse()
                    .map_err(|_| format!("Invalid watch seconds: {}", value))?;
            }
            "--verbose" | "-v" => verbose = true,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg => {
                return Err(format!("Unknown argument: {}", arg));
            }
        }
        i += 1;
    }

    let config = species.map(|species| {
        let defaults = PlayerModelConfig::default();
        let mut config = PlayerModelConfig::new(species).with_colors(
            colors[0].unwrap_or(defaults.primary_color),
            colors[1].unwrap_or(defaults.secondary_color),
            colors[2].unwrap_or(defaults.accent_color),
        );
        if let Some(texture) = texture {
            config = config.with_custom_texture(texture);
        }
        if let Some(pattern) = pattern {
            config = config.with_pattern(pattern);
        }
        config
    });

    Ok(Args {
        server,
        name,
        player_id,
        config,
        watch_secs,
        verbose,
    })
}

fn print_help() {
    println!("cottfur-client - headless model sync client");
    println!();
    println!("Options:");
    println!("  -s, --server <addr>      Server address (default 127.0.0.1:25590)");
    println!("  -n, --name <name>        Display name (default headless)");
    println!("      --player-id <uuid>   Player id (default random)");
    println!("      --species <id>       Publish a config with this species");
    println!("      --primary <color>    Primary color, #RRGGBB");
    println!("      --secondary <color>  Secondary color, #RRGGBB");
    println!("      --accent <color>     Accent color, #RRGGBB");
    println!("      --pattern <id>       Fur pattern id");
    println!("      --texture <id>       Custom texture id");
    println!("  -w, --watch <secs>       Seconds to watch before printing (default 5)");
    println!("  -v, --verbose            Verbose logging");
    println!();
    println!("Known species:");
    for species in ModelRegistry::all_known_species() {
        println!("  {:<12} {}", species.id, species.display_name);
    }
}

#[tokio::main]
async fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set subscriber: {}", e);
    }

    if let Err(e) = run(args).await {
        error!("Client failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let models = Arc::new(PlayerModelStore::new());
    let connection = ClientConnection::connect(
        &args.server,
        ConnectOptions::new(args.player_id, args.name.clone()),
        Arc::clone(&models),
    )
    .await?;

    info!(
        server_name = %connection.server_name(),
        player_id = %args.player_id,
        "Connected"
    );

    if let Some(config) = args.config {
        if !ModelRegistry::is_registered(&config.model_type_id) {
            warn!(species = %config.model_type_id, "Unknown species, others will render the default model");
        }
        let sent = connection.sync().apply_local_config(config)?;
        info!(sent = sent, "Published local model config");
    }

    tokio::time::sleep(Duration::from_secs(args.watch_secs)).await;

    let supported = connection.sync().is_server_supported();
    let snapshot: BTreeMap<String, PlayerModelConfig> = models
        .snapshot()
        .into_iter()
        .map(|(id, config)| (id.hyphenated().to_string(), config))
        .collect();

    connection.close().await?;

    let output = serde_json::json!({
        "server": args.server,
        "player_id": args.player_id,
        "server_supported": supported,
        "models": snapshot,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
