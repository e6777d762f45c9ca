mod console;
mod demo;

use std::env;
use std::path::PathBuf;

use gridseal_config::GridsealConfig;
use gridseal_record::Identity;

/// Account used when none is given on the command line.
pub const DEFAULT_ACCOUNT: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let cmd = &args[1];

    match cmd.as_str() {
        "demo" => {
            let options = match parse_demo_args(&args[2..]) {
                Ok(options) => options,
                Err(e) => {
                    eprintln!("❌ Error: {}", e);
                    std::process::exit(1);
                }
            };
            let config = load_config(options.config_path.as_ref());
            if let Err(e) = demo::run(config, options).await {
                eprintln!("❌ Error running demo: {}", e);
                std::process::exit(1);
            }
        }
        "console" => {
            let config_path = flag_value(&args[2..], "--config").map(PathBuf::from);
            let account = flag_value(&args[2..], "--account")
                .unwrap_or(DEFAULT_ACCOUNT)
                .to_string();
            let config = load_config(config_path.as_ref());
            if let Err(e) = console::run(config, Identity(account)).await {
                eprintln!("❌ Error running console: {}", e);
                std::process::exit(1);
            }
        }
        "config" => match args.get(2).map(|s| s.as_str()) {
            None | Some("--sample") => print!("{}", GridsealConfig::generate_sample()),
            Some("--path") => match GridsealConfig::default_config_path() {
                Some(path) => println!("{}", path.display()),
                None => {
                    eprintln!("❌ Error: Could not determine home directory");
                    std::process::exit(1);
                }
            },
            Some("--effective") => {
                let config = load_config(None);
                match serde_json::to_string_pretty(&config) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("❌ Error rendering config: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            Some(other) => {
                eprintln!("❌ Unknown config option: {}", other);
                std::process::exit(1);
            }
        },
        "help" | "--help" | "-h" => {
            print_usage();
        }
        _ => {
            println!("❌ Unknown command: {}", cmd);
            println!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Gridseal CLI - Confidential Energy Audit Records");
    println!();
    println!("USAGE:");
    println!("  gridseal <command> [args]");
    println!();
    println!("COMMANDS:");
    println!("  demo [options]             Create and reveal one audit on a local devnet");
    println!("  console [options]          Interactive session against a local devnet");
    println!("  config [option]            Print a sample config file");
    println!("                               --effective  loaded config with env overrides");
    println!("                               --path       default config file location");
    println!("  help                       Show this help message");
    println!();
    println!("DEMO OPTIONS:");
    println!("  --name <name>              Facility name (default: Plant A)");
    println!("  --usage <kwh>              Usage amount to encrypt (default: 500)");
    println!("  --score <1-10>             Public efficiency score (default: 7)");
    println!("  --account <address>        Submitting account");
    println!("  --config <path>            Config file to load");
    println!();
    println!("CONSOLE OPTIONS:");
    println!("  --account <address>        Account connected at start");
    println!("  --config <path>            Config file to load");
    println!();
    println!("EXAMPLES:");
    println!("  gridseal demo                                  # Plant A, 500 kWh, score 7");
    println!("  gridseal demo --name Warehouse --usage 1,200 --score 4");
    println!("  gridseal console                               # Start a session");
    println!("  gridseal config --sample > ~/.gridseal/config.toml");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("  GS_CONFIG                  Config file path");
    println!("  GS_CONTRACT_ADDRESS        Audit contract address");
    println!("  GS_BLOCK_TIME_MS           Devnet block time");
    println!("  GS_DEV_MODE                Seed sample audits in the console");
    println!("  RUST_LOG                   Log level (debug/info/warn/error)");
}

fn load_config(path: Option<&PathBuf>) -> GridsealConfig {
    let loaded = match path {
        Some(path) => GridsealConfig::load_from(path),
        None => GridsealConfig::load(),
    };
    loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config: {}, using defaults", e);
        GridsealConfig::default()
    })
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parse_demo_args(args: &[String]) -> anyhow::Result<demo::DemoOptions> {
    let mut options = demo::DemoOptions::default();

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match (args[i].as_str(), value) {
            ("--name", Some(v)) => options.name = v,
            ("--usage", Some(v)) => options.usage = v,
            ("--score", Some(v)) => options.score = v,
            ("--account", Some(v)) => options.account = Identity(v),
            ("--config", Some(v)) => options.config_path = Some(PathBuf::from(v)),
            (flag @ ("--name" | "--usage" | "--score" | "--account" | "--config"), None) => {
                anyhow::bail!("{} needs a value", flag);
            }
            (other, _) => anyhow::bail!("Unknown option: {}", other),
        }
        i += 2;
    }

    Ok(options)
}
