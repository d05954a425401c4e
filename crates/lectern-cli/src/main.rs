//! Lectern CLI - manual testing harness for the research-assistant services.
//!
//! Drives the core library against the real account and search endpoints:
//! session commands (login, register, logout, status) plus one-shot web,
//! scholar, and scrape queries with results printed to stdout.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lectern_core::api::auth::DEFAULT_AUTH_BASE_URL;
use lectern_core::api::{AuthClient, RegisterOptions};
use lectern_core::config::Config;
use lectern_core::models::Paper;
use lectern_core::search::scholar::DEFAULT_SCHOLAR_BASE_URL;
use lectern_core::search::scrape::{DEFAULT_MAX_CONCURRENCY, DEFAULT_SCRAPE_BASE_URL};
use lectern_core::search::{ScholarClient, WebSearchClient};
use lectern_core::session::{FileStore, SessionManager};
use lectern_core::utils::{format_date, format_optional, truncate};

// ============================================================================
// Constants
// ============================================================================

/// Default number of results for search commands
const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Column width for descriptions and abstracts in result listings
const SNIPPET_WIDTH: usize = 160;

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();
    info!("Lectern CLI starting");

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    match command {
        "login" => cmd_login(args.get(2).cloned()).await,
        "register" => cmd_register().await,
        "send-code" => {
            let email = args
                .get(2)
                .ok_or_else(|| anyhow!("usage: lectern send-code <email>"))?;
            cmd_send_code(email).await
        }
        "logout" => cmd_logout(),
        "status" => cmd_status(),
        "web" => cmd_web(&rest_query(&args)?).await,
        "scholar" => cmd_scholar(&rest_query(&args)?).await,
        "scrape" => cmd_scrape(&args[2..]).await,
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(2);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: lectern <command>");
    eprintln!();
    eprintln!("Session commands:");
    eprintln!("  login [username]       Log in and persist the session");
    eprintln!("  register               Create an account and log in");
    eprintln!("  send-code <email>      Email a verification code");
    eprintln!("  logout                 Clear the persisted session");
    eprintln!("  status                 Show the current session");
    eprintln!();
    eprintln!("Search commands:");
    eprintln!("  web <query>            Web search via the scraping provider");
    eprintln!("  scholar <query>        Academic paper search");
    eprintln!("  scrape <url>...        Fetch one or more pages as markdown");
}

// ============================================================================
// Session commands
// ============================================================================

fn open_session(config: &Config) -> Result<SessionManager> {
    let base_url = resolve(
        config.auth_base_url.clone(),
        "LECTERN_AUTH_URL",
        DEFAULT_AUTH_BASE_URL,
    );
    let client = AuthClient::new(base_url)?;
    let storage = Arc::new(FileStore::open(Config::data_dir()?.join(SESSION_FILE))?);
    Ok(SessionManager::new(storage, client))
}

async fn cmd_login(username: Option<String>) -> Result<()> {
    let mut config = Config::load()?;
    let manager = open_session(&config)?;

    let username = match username.or_else(|| config.last_username.clone()) {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;

    if !manager.login(&username, &password).await {
        return Err(anyhow!("Login failed"));
    }

    config.last_username = Some(username);
    config.save()?;

    println!(
        "Logged in as {} ({} credits)",
        format_optional(&manager.current_user(), "?"),
        manager.user_credits()
    );
    Ok(())
}

async fn cmd_register() -> Result<()> {
    let mut config = Config::load()?;
    let manager = open_session(&config)?;

    let username = prompt("Username: ")?;
    let email = prompt("Email (blank to skip): ")?;
    let email = (!email.is_empty()).then_some(email);

    let verification_code = if email.is_some() {
        let code = prompt("Verification code (blank to skip): ")?;
        (!code.is_empty()).then_some(code)
    } else {
        None
    };

    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;

    let options = RegisterOptions {
        email,
        verification_code,
    };
    if !manager.register(&username, &password, options).await {
        return Err(anyhow!("Registration failed"));
    }

    config.last_username = Some(username);
    config.save()?;

    println!(
        "Registered and logged in as {} ({} credits)",
        format_optional(&manager.current_user(), "?"),
        manager.user_credits()
    );
    Ok(())
}

async fn cmd_send_code(email: &str) -> Result<()> {
    let config = Config::load()?;
    let manager = open_session(&config)?;

    if !manager.send_verification_code(email).await {
        return Err(anyhow!("Failed to send verification code"));
    }
    println!("Verification code sent to {}", email);
    Ok(())
}

fn cmd_logout() -> Result<()> {
    let config = Config::load()?;
    let manager = open_session(&config)?;

    manager.logout();
    println!("Logged out");
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = Config::load()?;
    let manager = open_session(&config)?;

    if manager.check_auth() {
        println!(
            "Logged in as {} ({} credits)",
            format_optional(&manager.current_user(), "?"),
            manager.user_credits()
        );
    } else {
        println!("Not logged in");
    }
    Ok(())
}

// ============================================================================
// Search commands
// ============================================================================

async fn cmd_web(query: &str) -> Result<()> {
    let config = Config::load()?;
    let client = scrape_client(&config)?;

    eprintln!("Searching the web for \"{}\"...", query);
    let hits = client.search(query, DEFAULT_SEARCH_LIMIT).await?;

    if hits.is_empty() {
        println!("No results");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!("{}. {}", i + 1, hit.title);
        println!("   {}", hit.url);
        if !hit.description.is_empty() {
            println!("   {}", truncate(&hit.description, SNIPPET_WIDTH));
        }
    }
    Ok(())
}

async fn cmd_scholar(query: &str) -> Result<()> {
    let config = Config::load()?;
    let base_url = resolve(
        config.scholar_base_url.clone(),
        "LECTERN_SCHOLAR_URL",
        DEFAULT_SCHOLAR_BASE_URL,
    );
    let api_key = std::env::var("LECTERN_SCHOLAR_API_KEY")
        .ok()
        .or_else(|| config.scholar_api_key.clone());
    let client = ScholarClient::new(base_url, api_key)?;

    eprintln!("Searching papers for \"{}\"...", query);
    let papers = client.search(query, DEFAULT_SEARCH_LIMIT).await?;

    if papers.is_empty() {
        println!("No results");
        return Ok(());
    }
    for (i, paper) in papers.iter().enumerate() {
        print_paper(i + 1, paper);
    }
    Ok(())
}

fn print_paper(index: usize, paper: &Paper) {
    match paper.year {
        Some(year) => println!("{}. {} ({})", index, paper.title, year),
        None => println!("{}. {}", index, paper.title),
    }
    if !paper.authors.is_empty() {
        println!("   {}", paper.author_line());
    }
    if let Some(ref date) = paper.publication_date {
        println!("   Published {}", format_date(date));
    }
    if let Some(ref doi) = paper.doi {
        println!("   doi:{}", doi);
    }
    if let Some(ref abstract_text) = paper.abstract_text {
        println!("   {}", truncate(abstract_text, SNIPPET_WIDTH));
    }
}

async fn cmd_scrape(urls: &[String]) -> Result<()> {
    if urls.is_empty() {
        return Err(anyhow!("usage: lectern scrape <url>..."));
    }

    let config = Config::load()?;
    let client = scrape_client(&config)?;

    if let [url] = urls {
        let document = client.scrape(url).await?;
        println!("{}", document.markdown);
        return Ok(());
    }

    eprintln!("Scraping {} pages...", urls.len());
    let documents = client.scrape_many(urls, DEFAULT_MAX_CONCURRENCY).await;
    for document in &documents {
        println!("==== {} ====", document.url);
        println!("{}", document.markdown);
        println!();
    }
    eprintln!("Done: {}/{} pages scraped", documents.len(), urls.len());
    Ok(())
}

fn scrape_client(config: &Config) -> Result<WebSearchClient> {
    let base_url = resolve(
        config.scrape_base_url.clone(),
        "LECTERN_SCRAPE_URL",
        DEFAULT_SCRAPE_BASE_URL,
    );
    let api_key = std::env::var("LECTERN_SCRAPE_API_KEY")
        .ok()
        .or_else(|| config.scrape_api_key.clone())
        .ok_or_else(|| {
            anyhow!("No web search API key. Set LECTERN_SCRAPE_API_KEY or scrape_api_key in the config file.")
        })?;
    Ok(WebSearchClient::new(base_url, api_key)?)
}

// ============================================================================
// Helpers
// ============================================================================

/// Env var wins over the config file; fall back to the built-in default.
fn resolve(configured: Option<String>, env_key: &str, default: &str) -> String {
    std::env::var(env_key)
        .ok()
        .or(configured)
        .unwrap_or_else(|| default.to_string())
}

fn rest_query(args: &[String]) -> Result<String> {
    let query = args[2..].join(" ");
    if query.is_empty() {
        return Err(anyhow!("usage: lectern {} <query>", args[1]));
    }
    Ok(query)
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
