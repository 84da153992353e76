//! KeywordBlocker CLI
//!
//! Manage a block list kept in a JSON file and inspect the rules it compiles
//! to, using the same store and compiler as the extension.

mod host;

use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};

use kb_background::{Background, BlockerConfig, ClickInfo, Clock, InstallReason, MenuOutcome, SystemClock};
use kb_compiler::{compile_rules, notice_page_url};
use kb_core::{find_content_match, format_duration, Timestamp};

use host::{JsonFileStorage, NoTabs, RulesFile};

type CliBackground = Background<JsonFileStorage, RulesFile, NoTabs, SystemClock>;

const MINUTE_MS: i64 = 60 * 1000;

#[derive(Parser)]
#[command(name = "kb-cli")]
#[command(about = "KeywordBlocker block list manager and rule compiler")]
struct Cli {
    /// Block list file (JSON object holding the storage key)
    #[arg(short, long, global = true, default_value = "blocked-items.json")]
    store: String,

    /// Installed rule set, rewritten after every change
    #[arg(long, global = true, default_value = "installed-rules.json")]
    rules: String,

    /// Blocker config (JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Override the notice page URL from the config
    #[arg(long, global = true)]
    blocked_page_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the block list
    List,

    /// Add a keyword
    Add {
        keyword: String,

        /// Remove the keyword automatically after this many minutes
        #[arg(short, long)]
        expires_in_minutes: Option<i64>,
    },

    /// Replace the keyword at an index
    Update {
        index: usize,
        keyword: String,

        #[arg(short, long)]
        expires_in_minutes: Option<i64>,
    },

    /// Remove the keyword at an index
    Remove { index: usize },

    /// Drop expired keywords
    Sweep,

    /// Test a URL (and optional title) against the list
    Check {
        url: String,

        #[arg(short, long, default_value = "")]
        title: String,
    },

    /// Write the compiled redirect rules
    Compile {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Block a single page (host and path)
    BlockPage { url: String },

    /// Block an entire domain
    BlockDomain { url: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let config = load_config(cli.config.as_deref(), cli.blocked_page_url)?;
    let (mut bg, swept) = open_background(config, &cli.store, &cli.rules).await?;

    match cli.command {
        Commands::List => cmd_list(&bg),
        Commands::Add {
            keyword,
            expires_in_minutes,
        } => cmd_add(&mut bg, &keyword, expires_in_minutes).await,
        Commands::Update {
            index,
            keyword,
            expires_in_minutes,
        } => cmd_update(&mut bg, index, &keyword, expires_in_minutes).await,
        Commands::Remove { index } => cmd_remove(&mut bg, index).await,
        Commands::Sweep => cmd_sweep(&mut bg, swept).await,
        Commands::Check { url, title } => cmd_check(&bg, &url, &title),
        Commands::Compile { output } => cmd_compile(&bg, output.as_deref()),
        Commands::BlockPage { url } => cmd_block(&mut bg, kb_background::context_menu::BLOCK_SINGLE_PAGE, &url).await,
        Commands::BlockDomain { url } => {
            cmd_block(&mut bg, kb_background::context_menu::BLOCK_ENTIRE_DOMAIN, &url).await
        }
    }
}

fn load_config(path: Option<&str>, blocked_page_url: Option<String>) -> Result<BlockerConfig, String> {
    let mut config = match path {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
            BlockerConfig::from_json(&text).map_err(|e| format!("Invalid config '{}': {}", path, e))?
        }
        None => BlockerConfig::default(),
    };
    if let Some(url) = blocked_page_url {
        config.blocked_page_url = url;
    }
    Ok(config)
}

/// A store file that does not exist yet is treated as a fresh install.
/// Also returns how many expired entries were swept on open.
async fn open_background(
    config: BlockerConfig,
    store: &str,
    rules: &str,
) -> Result<(CliBackground, usize), String> {
    let fresh = !Path::new(store).exists();
    let mut bg = Background::new(
        config,
        JsonFileStorage::new(store),
        RulesFile::new(rules),
        NoTabs,
        SystemClock,
    )
    .map_err(|e| e.to_string())?;

    let swept = if fresh {
        bg.on_installed(InstallReason::Install).await;
        0
    } else {
        bg.on_startup().await
    };
    Ok((bg, swept))
}

fn expiration_from(now: Timestamp, minutes: Option<i64>) -> Option<Timestamp> {
    minutes.map(|m| now.saturating_add(m.saturating_mul(MINUTE_MS)))
}

fn cmd_list(bg: &CliBackground) -> Result<(), String> {
    let entries = bg.store().entries();
    if entries.is_empty() {
        println!("No blocked items.");
        return Ok(());
    }

    let now = bg.clock().now();
    for (index, entry) in entries.iter().enumerate() {
        match entry.expiration {
            Some(expiration) => println!(
                "  [{}] {} (expires in {})",
                index,
                entry.keyword,
                format_duration(now, expiration)
            ),
            None => println!("  [{}] {}", index, entry.keyword),
        }
    }
    println!("{} blocked items", entries.len());
    Ok(())
}

async fn cmd_add(bg: &mut CliBackground, keyword: &str, minutes: Option<i64>) -> Result<(), String> {
    let expiration = expiration_from(bg.clock().now(), minutes);
    bg.add_keyword(keyword, expiration)
        .await
        .map_err(|e| e.user_message())?;
    println!("Added '{}'", keyword.trim());
    Ok(())
}

async fn cmd_update(bg: &mut CliBackground, index: usize, keyword: &str, minutes: Option<i64>) -> Result<(), String> {
    let expiration = expiration_from(bg.clock().now(), minutes);
    bg.update_keyword(index, keyword, expiration)
        .await
        .map_err(|e| e.user_message())?;
    println!("Updated [{}] to '{}'", index, keyword.trim());
    Ok(())
}

async fn cmd_remove(bg: &mut CliBackground, index: usize) -> Result<(), String> {
    let removed = bg
        .store_mut()
        .remove(index)
        .await
        .map_err(|e| e.user_message())?;
    println!("Removed '{}'", removed.keyword);
    Ok(())
}

async fn cmd_sweep(bg: &mut CliBackground, swept_on_open: usize) -> Result<(), String> {
    let removed = swept_on_open + bg.on_timer().await;
    println!("Removed {} expired items, {} remaining", removed, bg.store().len());
    Ok(())
}

fn cmd_check(bg: &CliBackground, url: &str, title: &str) -> Result<(), String> {
    let now = bg.clock().now();
    match find_content_match(url, title, bg.store().entries(), now) {
        Some(entry) => {
            println!("Blocked by '{}'", entry.keyword);
            println!("  Redirect: {}", notice_page_url(&bg.config().blocked_page_url, url));
        }
        None => println!("Allowed"),
    }
    Ok(())
}

fn cmd_compile(bg: &CliBackground, output: Option<&str>) -> Result<(), String> {
    let options = bg.config().compiler_options().map_err(|e| e.to_string())?;
    let compiled = compile_rules(bg.store().entries(), &options);

    let json = serde_json::to_string_pretty(&compiled.rules).map_err(|e| format!("Failed to serialize rules: {}", e))?;
    match output {
        Some(path) => {
            fs::write(path, &json).map_err(|e| format!("Failed to write '{}': {}", path, e))?;
            println!("Compiled {} rules to '{}'", compiled.rules.len(), path);
            if compiled.stats.dropped > 0 {
                println!("  Dropped:  {} (duplicate ids)", compiled.stats.dropped);
            }
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn cmd_block(bg: &mut CliBackground, menu_item_id: &str, url: &str) -> Result<(), String> {
    let info = ClickInfo {
        menu_item_id: menu_item_id.to_string(),
        link_url: Some(url.to_string()),
    };
    match bg.on_context_menu(&info, None).await.map_err(|e| e.user_message())? {
        MenuOutcome::Added(keyword) => println!("Blocked '{}'", keyword),
        MenuOutcome::AlreadyBlocked(keyword) => println!("'{}' is already blocked", keyword),
        MenuOutcome::OpenPopup | MenuOutcome::Ignored => {}
    }
    Ok(())
}
