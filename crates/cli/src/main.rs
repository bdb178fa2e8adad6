mod repl;

use clap::{Parser, Subcommand};
use lib::chat::{ChatController, ChatError, SubmitOutcome};
use lib::llm::OpenRouterClient;
use lib::session::SessionStore;
use repl::{Command, ThreadRef};

#[derive(Parser)]
#[command(name = "routechat")]
#[command(about = "Routechat CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a starter config file.
    Init {
        /// Config file path (default: ROUTECHAT_CONFIG_PATH or ~/.routechat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// List the models a thread can use.
    Models {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Chat interactively. Threads live until you exit.
    Chat {
        /// Config file path (default: ROUTECHAT_CONFIG_PATH or ~/.routechat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Model for the first thread (API identifier or display name); overrides the configured default.
        #[arg(long, short, value_name = "NAME")]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("routechat {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Models { json }) => {
            if let Err(e) = run_models(json) {
                log::error!("models failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, model }) => {
            if let Err(e) = run_chat(config, model).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    println!(
        "set {} in your environment (or provider.apiKey in {}) before chatting",
        lib::config::ENV_API_KEY,
        path.display()
    );
    Ok(())
}

fn run_models(json: bool) -> anyhow::Result<()> {
    let models = lib::catalog::models();
    if json {
        println!("{}", serde_json::to_string_pretty(models)?);
        return Ok(());
    }
    print_models(None);
    Ok(())
}

fn print_models(current: Option<&lib::catalog::ModelEntry>) {
    for m in lib::catalog::models() {
        let marker = if current == Some(m) { "*" } else { " " };
        println!("{} {:<18} {:<42} {}", marker, m.display_name, m.api_identifier, m.description);
    }
}

fn print_threads(store: &SessionStore) {
    let active = store.active_id();
    for (i, t) in store.list_threads().iter().enumerate() {
        let marker = if t.id == active { "*" } else { " " };
        println!(
            "{} {:>2}. {:<28} {:>3} msgs  {}  {}",
            marker,
            i + 1,
            t.title,
            t.messages.len(),
            t.selected_model.display_name,
            t.created_at.format("%H:%M:%S")
        );
    }
}

fn resolve_thread(store: &SessionStore, r: &ThreadRef) -> Option<String> {
    let listed: Vec<&str> = store.list_threads().iter().map(|t| t.id.as_str()).collect();
    r.resolve(&listed).map(String::from)
}

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    model: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, path) = lib::config::load_config(config_path)?;
    log::debug!("chat: using config {}", path.display());
    let settings = lib::config::resolve_provider(&config);
    if settings.api_key.is_none() {
        log::warn!(
            "no API key configured ({} or provider.apiKey); the service will reject requests",
            lib::config::ENV_API_KEY
        );
    }
    let client = OpenRouterClient::new(settings)?;
    let mut controller =
        ChatController::new(client).with_system_prompt(lib::config::resolve_system_prompt(&config));
    let mut store = SessionStore::with_default_model(lib::config::resolve_default_model(&config));
    if let Some(name) = model {
        let entry = lib::catalog::resolve(&name)
            .ok_or_else(|| anyhow::anyhow!("unknown model: {}", name))?;
        let id = store.active_id().to_string();
        controller.set_model(&mut store, &id, entry.display_name)?;
    }

    println!(
        "Powered by `{}` via OpenRouter. Type /help for commands.",
        store.active().selected_model.api_identifier
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let Some(cmd) = repl::parse_command(input) else {
            println!("thinking…");
            match controller.submit(&mut store, input).await {
                Ok(SubmitOutcome::Replied(reply)) => println!("< {}", reply.trim()),
                Ok(SubmitOutcome::Ignored) => {}
                Err(ChatError::CompletionFailed(e)) => {
                    eprintln!("chat error: {} (your message was kept; send again to retry)", e);
                }
                Err(e) => eprintln!("chat error: {}", e),
            }
            continue;
        };

        match cmd {
            Command::Exit => break,
            Command::Help => println!("{}", repl::HELP),
            Command::New => {
                store.create_thread();
                println!("started a new thread");
            }
            Command::Threads => print_threads(&store),
            Command::Switch(r) => match resolve_thread(&store, &r) {
                Some(id) => {
                    store.set_active(&id)?;
                    let t = store.active();
                    println!("switched to \"{}\" ({} messages)", t.title, t.messages.len());
                }
                None => eprintln!("no such thread; see /threads"),
            },
            Command::Delete(r) => match resolve_thread(&store, &r) {
                Some(id) => {
                    store.delete_thread(&id);
                    println!("deleted; active thread is \"{}\"", store.active().title);
                }
                None => eprintln!("no such thread; see /threads"),
            },
            Command::Model(None) => {
                let m = store.active().selected_model;
                println!("{} ({})", m.display_name, m.api_identifier);
            }
            Command::Model(Some(name)) => {
                let display_name = lib::catalog::resolve(&name)
                    .map(|m| m.display_name)
                    .unwrap_or(name.as_str());
                let id = store.active_id().to_string();
                match controller.set_model(&mut store, &id, display_name) {
                    Ok(()) => println!(
                        "this thread now uses {}",
                        store.active().selected_model.api_identifier
                    ),
                    Err(e) => eprintln!("{}; see /models", e),
                }
            }
            Command::Models => print_models(Some(store.active().selected_model)),
            Command::Unknown(text) => eprintln!("unknown command: {} (try /help)", text),
        }
    }

    Ok(())
}
