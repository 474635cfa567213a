use anyhow::Context;
use clap::{Parser, Subcommand};
use healing_locator::{
    ChromePage, Config, ElementHandle, HealingLocator, HealingStore, LocatorCandidate, PageTrait,
    SidecarClient, SidecarPage,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "healctl", version, about = "Inspect and exercise self-healing locators")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the healed selector store
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Resolve one logical element on a live page
    Resolve {
        #[arg(long)]
        url: String,
        /// Logical name, e.g. productsPage.products
        #[arg(long)]
        name: String,
        /// Static selector candidates, tried in order
        #[arg(long = "candidate")]
        candidates: Vec<String>,
        /// Drive the HTTP sidecar instead of launching Chrome
        #[arg(long)]
        sidecar: bool,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Print every healed selector
    List,
    /// Forget one healed selector, or all of them
    Clear { name: Option<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env().context("invalid configuration")?;

    match args.command {
        Command::Store { action } => run_store(&config, action).await,
        Command::Resolve {
            url,
            name,
            candidates,
            sidecar,
        } => {
            if sidecar {
                let client = Arc::new(SidecarClient::new(&config.sidecar)?);
                let page = Arc::new(SidecarPage::new(client));
                page.goto(&url).await?;
                run_resolve(page, &config, &name, &candidates).await
            } else {
                let page = Arc::new(ChromePage::launch(&config.browser).await?);
                page.goto(&url).await?;
                run_resolve(page, &config, &name, &candidates).await
            }
        }
    }
}

async fn run_store(config: &Config, action: StoreAction) -> anyhow::Result<()> {
    let store = HealingStore::open(&config.healing.store_path)
        .with_context(|| format!("opening {}", config.healing.store_path.display()))?;

    match action {
        StoreAction::List => {
            let entries = store.entries().await;
            if entries.is_empty() {
                println!("no healed selectors in {}", store.path().display());
            }
            for (name, selector) in entries {
                println!("{name}\t{selector}");
            }
        }
        StoreAction::Clear { name: Some(name) } => {
            if store.remove(&name).await? {
                println!("removed {name}");
            } else {
                println!("{name} not in store");
            }
        }
        StoreAction::Clear { name: None } => {
            store.clear().await?;
            println!("cleared {}", store.path().display());
        }
    }
    Ok(())
}

async fn run_resolve<P: PageTrait>(
    page: Arc<P>,
    config: &Config,
    name: &str,
    candidates: &[String],
) -> anyhow::Result<()> {
    let locator = HealingLocator::from_config(page, config)?;
    let candidates: Vec<LocatorCandidate<P::Handle>> =
        candidates.iter().map(|c| LocatorCandidate::selector(c.as_str())).collect();

    let handle = locator.resolve(name, &candidates).await?;
    let count = handle.count().await?;
    info!(name, selector = handle.selector(), count, "resolved");
    println!("{}\t{}\t{count} match(es)", name, handle.selector());

    for event in locator.trace().events() {
        println!("  {} {:?}: {}", event.timestamp.to_rfc3339(), event.stage, event.detail);
    }
    Ok(())
}
