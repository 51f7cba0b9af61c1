//! oneline - chat through the relay from the terminal

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use oneline_gate::client::{chat_request, reply_text};
use oneline_gate::{
    Capabilities, ChatClient, FileStorage, GateError, GateStore, PartialApiConfig, Route,
    DEFAULT_RELAY_URL,
};
use oneline_telemetry::{init_subscriber, TelemetryConfig};

/// Chat with an LLM through the oneline relay
#[derive(Parser, Debug)]
#[command(name = "oneline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Local state file (default: <data dir>/oneline/storage.json)
    #[arg(long, env = "ONELINE_STORAGE")]
    storage: Option<PathBuf>,

    /// Relay endpoint used when no personal endpoint is configured
    #[arg(long, env = "ONELINE_RELAY_URL", default_value = DEFAULT_RELAY_URL)]
    relay_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the effective configuration and gate state
    Status,

    /// Enter the access password
    Unlock {
        password: String,
    },

    /// Forget a previously entered access password
    Lock,

    /// Set a personal endpoint, model or API key (shows the config when no flags are given)
    Config {
        #[arg(long)]
        endpoint: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        api_key: Option<String>,
    },

    /// Send a single message and print the reply
    Chat {
        #[arg(required = true, trailing_var_arg = true)]
        message: Vec<String>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_subscriber(
        &TelemetryConfig::from_env()
            .for_target("oneline_gate")
            .with_level("warn"),
    );

    if let Err(e) = run(cli).await {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let storage = match cli.storage {
        Some(path) => FileStorage::new(path),
        None => FileStorage::open_default().context("cannot locate local storage")?,
    };
    let mut gate = GateStore::open(storage, Capabilities::from_env());

    match cli.command {
        Commands::Status => print_status(&gate, &cli.relay_url),
        Commands::Unlock { password } => {
            if !gate.is_password_protected() {
                println!("{}", "No access password is configured.".dimmed());
            } else if gate.validate(&password) {
                println!("{}", "Unlocked.".green().bold());
            } else {
                anyhow::bail!("incorrect access password");
            }
        }
        Commands::Lock => {
            gate.reset();
            println!("{}", "Locked.".yellow().bold());
        }
        Commands::Config {
            endpoint,
            model,
            api_key,
        } => {
            let changes = PartialApiConfig {
                endpoint,
                model,
                api_key,
            };
            if !changes.is_empty() {
                if !gate.allow_user_config() {
                    anyhow::bail!("this deployment does not allow personal configuration");
                }
                gate.update(changes);
                println!("{}", "Configuration saved.".green().bold());
            }
            print_status(&gate, &cli.relay_url);
        }
        Commands::Chat { message, json } => {
            let client = ChatClient::new(cli.relay_url)?;
            let response = match client.send(&gate, chat_request(&message.join(" "))).await {
                Ok(response) => response,
                Err(GateError::Locked) => {
                    anyhow::bail!("access password required; run `oneline unlock <password>`")
                }
                Err(e) => return Err(e.into()),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                match reply_text(&response) {
                    Some(text) => println!("{}", text),
                    None => println!("{}", serde_json::to_string_pretty(&response)?),
                }
            }
        }
    }

    Ok(())
}

fn print_status(gate: &GateStore<FileStorage>, relay_url: &str) {
    let config = gate.config();
    let yes_no = |b: bool| if b { "yes".green() } else { "no".red() };

    println!("{}", "oneline".cyan().bold());
    println!("  storage:            {}", gate.storage().path().display());
    println!("  endpoint:           {}", or_unset(&config.endpoint));
    println!("  model:              {}", config.model);
    println!("  api key:            {}", mask_key(&config.api_key));
    println!("  personal config:    {}", yes_no(gate.allow_user_config()));
    println!("  configured:         {}", yes_no(gate.is_configured()));
    println!("  password protected: {}", yes_no(gate.is_password_protected()));
    println!("  unlocked:           {}", yes_no(gate.is_password_validated()));

    let route = match ChatClient::new(relay_url) {
        Ok(client) => client.route(gate),
        Err(_) => Route::Relay {
            url: relay_url.to_string(),
        },
    };
    match route {
        Route::Direct { endpoint } => println!("  route:              direct -> {}", endpoint),
        Route::Relay { url } => println!("  route:              relay -> {}", url),
    }
}

fn or_unset(value: &str) -> String {
    if value.is_empty() {
        "(server default)".dimmed().to_string()
    } else {
        value.to_string()
    }
}

fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return "(server default)".dimmed().to_string();
    }
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", chars[..3].iter().collect::<String>(), tail)
}
