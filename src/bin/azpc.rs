//! azpc CLI
//!
//! Azure Marketplace offer publishing assistant

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use marketplace_publisher::{
    ConfigLoader, ContextOptions, OfferLoader, OfferType, PublishContext, PublishError,
    SecureTokenManager,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, warn};
use tracing_subscriber::prelude::*;

/// Azure Marketplace offer publishing assistant
#[derive(Parser)]
#[command(name = "azpc")]
#[command(version)]
#[command(about = "Azure Marketplace offer publishing assistant", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Offer name, also its marketplace offer id
    #[arg(long, global = true)]
    name: Option<String>,

    /// Client settings
    #[arg(long, global = true, default_value = "config.yml")]
    config_yml: PathBuf,

    /// Listing config JSON (defaults to json_listing_config from the manifest)
    #[arg(long, global = true)]
    config_json: Option<PathBuf>,

    /// Directory holding the package, logos and listing config
    #[arg(long, global = true)]
    app_path: Option<PathBuf>,

    #[arg(long, global = true, default_value = "manifest.yml")]
    manifest_yml: PathBuf,

    /// Comma-separated addresses notified about certification (vm publish)
    #[arg(long, global = true)]
    notification_emails: Option<String>,

    /// Plan name (defaults to plan_name from the manifest)
    #[arg(long, global = true)]
    plan_name: Option<String>,

    #[command(subcommand)]
    offer: OfferGroup,
}

#[derive(Subcommand)]
enum OfferGroup {
    /// Managed application offers
    Ma {
        #[command(subcommand)]
        command: Commands,
    },
    /// Solution template offers
    St {
        #[command(subcommand)]
        command: Commands,
    },
    /// Container offers
    Co {
        #[command(subcommand)]
        command: Commands,
    },
    /// Virtual machine offers (Cloud Partner Portal)
    Vm {
        #[command(subcommand)]
        command: Commands,
    },
}

impl OfferGroup {
    fn split(self) -> (OfferType, Commands) {
        match self {
            OfferGroup::Ma { command } => (OfferType::ManagedApplication, command),
            OfferGroup::St { command } => (OfferType::SolutionTemplate, command),
            OfferGroup::Co { command } => (OfferType::Container, command),
            OfferGroup::Vm { command } => (OfferType::VirtualMachine, command),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the offer and apply the listing config
    Create {
        /// Update the offer if it already exists
        #[arg(long)]
        update: bool,
    },
    /// Apply the listing config to an existing offer
    Update,
    /// Show the offer
    Show,
    /// List offers of this type
    List,
    /// Delete the offer
    Delete,
    /// Submit the offer for preview
    Publish,
    /// Promote the latest submission to production
    Release,
    /// Status of the latest submission
    Status,
    /// Plan commands
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Create a plan and apply its settings
    Create {
        /// Update the plan if it already exists
        #[arg(long)]
        update: bool,
    },
    /// Apply plan listing, pricing and technical configuration
    Update,
    /// Show the plan
    Show,
    /// List the offer's plans
    List,
    /// Delete the plan
    Delete,
    /// Submit the plan's offer for preview
    Publish,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let env: HashMap<String, String> = std::env::vars().collect();
    let masker = token_masker(&cli.config_yml, &env).await;

    match run(cli, env).await {
        Ok(output) => {
            match serde_json::to_string_pretty(&output) {
                Ok(text) => println!("{}", text),
                Err(_) => println!("{}", output),
            }
            process::exit(0);
        }
        Err(e) => {
            report(&e, &masker);
            process::exit(1);
        }
    }
}

async fn run(cli: Cli, env: HashMap<String, String>) -> Result<Value> {
    let (offer_type, command) = cli.offer.split();

    let context = PublishContext::load(ContextOptions {
        config_yml: cli.config_yml,
        manifest_yml: cli.manifest_yml,
        config_json: cli.config_json,
        app_path: cli.app_path,
        plan_name: cli.plan_name,
        env,
    })
    .await?;

    if let Some(declared) = context.manifest.offer_type.as_deref()
        && declared.parse::<OfferType>().ok() != Some(offer_type)
    {
        warn!(declared, requested = %offer_type, "manifest.yml declares a different offer type");
    }

    let plan_name = context.plan_name(None).map(str::to_string);
    let name = match (&command, cli.name) {
        (Commands::List, name) => name.unwrap_or_default(),
        (_, Some(name)) => name,
        (_, None) => return Err(anyhow!("--name is required")),
    };
    let emails = cli.notification_emails;

    let mut offer = OfferLoader::load(offer_type, &name, context)?;
    debug!(offer_type = offer.offer_type(), name = offer.name(), "dispatching");

    let output = match command {
        Commands::Create { update } => offer.create(update).await?,
        Commands::Update => offer.update().await?,
        Commands::Show => offer.show().await?,
        Commands::List => offer.list().await?,
        Commands::Delete => {
            offer.delete().await?;
            json!({})
        }
        Commands::Publish => offer.publish(emails.as_deref()).await?,
        Commands::Release => offer.release().await?,
        Commands::Status => offer.status().await?,
        Commands::Plan { command } => {
            let require_plan = || {
                plan_name
                    .as_deref()
                    .ok_or_else(|| anyhow!("--plan-name is required (or set plan_name in manifest.yml)"))
            };

            match command {
                PlanCommands::Create { update } => offer.plan_create(require_plan()?, update).await?,
                PlanCommands::Update => offer.plan_update(require_plan()?).await?,
                PlanCommands::Show => offer.plan_show(require_plan()?).await?,
                PlanCommands::List => offer.plan_list().await?,
                PlanCommands::Delete => {
                    offer.plan_delete(require_plan()?).await?;
                    json!({})
                }
                PlanCommands::Publish => {
                    offer
                        .plan_publish(require_plan()?, emails.as_deref())
                        .await?
                }
            }
        }
    };

    Ok(output)
}

/// Tokens to scrub from error output; an unreadable config.yml leaves the env tokens
async fn token_masker(config_yml: &Path, env: &HashMap<String, String>) -> SecureTokenManager {
    let config = ConfigLoader::load_client_config(config_yml, env)
        .await
        .unwrap_or_default();
    SecureTokenManager::new(&config, env)
}

fn report(error: &anyhow::Error, masker: &SecureTokenManager) {
    eprintln!("Error: {}", masker.mask_tokens_in_string(&error.to_string()));

    if let Some(publish_error) = error.downcast_ref::<PublishError>() {
        eprintln!("Code: {}", publish_error.code());

        let actions = publish_error.suggested_actions();
        if !actions.is_empty() {
            eprintln!("\nSuggested actions:");
            for action in actions {
                eprintln!("  - {}", action);
            }
        }
    }
}

fn init_tracing(verbose: u8) {
    // RUST_LOG wins over the verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "marketplace_publisher=warn,azpc=warn",
            1 => "marketplace_publisher=info,azpc=info",
            2 => "marketplace_publisher=debug,azpc=debug",
            _ => "marketplace_publisher=trace,azpc=trace",
        };
        tracing_subscriber::EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact(),
        )
        .init();

    debug!("Tracing initialized with verbosity level: {}", verbose);
}
