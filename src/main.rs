use std::{env, fs, path::Path};

use dotenv::dotenv;
use mcprobe::{
    ServerKind, ServerStatus,
    config::Config,
    query_server,
    terminal_colors::*,
    tracing::init_tracing,
};
use tracing::info;

const DEFAULT_CONFIG_FILE: &str = "mcprobe.toml";

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    let args = env::args().collect::<Box<[String]>>();
    let Some(host) = args.get(1) else {
        eprintln!("usage: {} <host[:port]> [config file]", args[0]);
        std::process::exit(2);
    };

    // second command line argument is the location of the config file
    let config_file = args
        .get(2)
        .cloned()
        .unwrap_or(DEFAULT_CONFIG_FILE.to_string());
    let config_path = Path::new(&config_file);
    let config: Config = if config_path.exists() {
        toml::from_str(&fs::read_to_string(config_path)?)?
    } else if args.get(2).is_some() {
        eyre::bail!("config file {config_file} doesn't exist");
    } else {
        Config::default()
    };

    init_tracing(&config);
    info!("querying {host}");

    let status = query_server(host, &config.query).await?;
    print_summary(&status);
    println!("{}", serde_json::to_string_pretty(&status)?);

    Ok(())
}

fn print_summary(status: &ServerStatus) {
    let kind_color = match status.kind {
        ServerKind::Java => GREEN,
        ServerKind::Bedrock => BLUE,
        ServerKind::Crossplay => YELLOW,
        ServerKind::Unknown => GRAY,
    };
    let name = status.hostname.as_deref().unwrap_or("");
    eprintln!(
        "{BOLD}{name}{RESET} {GRAY}({}){RESET} is a {kind_color}{:?}{RESET} server running {BOLD}{}{RESET}",
        status.ip, status.kind, status.version
    );
    if let (Some(online), Some(max)) = (status.players.online, status.players.max) {
        eprintln!("{BOLD}{online}{RESET}/{max} players online");
    }
    if let Some(motd) = &status.motd {
        for line in motd.lines() {
            eprintln!("  {GRAY}|{RESET} {line}");
        }
    }
    let latency_color = if status.latency.as_millis() > 200 {
        RED
    } else {
        GREEN
    };
    eprintln!(
        "answered in {latency_color}{}ms{RESET}",
        status.latency.as_millis()
    );
}
