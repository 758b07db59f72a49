use clap::{Parser, Subcommand};

use metadw::MetaAdsDW;

#[derive(Parser)]
#[command(name = "metadw", about = "Meta Ads data warehouse server")]
struct Cli {
    /// Database path (default: ~/.metadw/metadw.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
    },
    /// Resync a registered account's ads
    Sync {
        /// Account id (with or without the act_ prefix)
        account_id: String,
    },
    /// Manage registered ad accounts
    Accounts {
        #[command(subcommand)]
        action: AccountsAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show warehouse status
    Status,
}

#[derive(Subcommand)]
enum AccountsAction {
    /// List registered accounts
    List,
    /// Register an account and sync its ads
    Add { account_id: String },
    /// Remove an account registration (cached ads are kept)
    Remove { account_id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => metadw::Database::open_at(path).await?,
        None => metadw::Database::open().await?,
    };
    let dw = MetaAdsDW::with_defaults(db);

    match cli.command {
        Commands::Serve { addr } => {
            metadw::server::serve(dw, &addr).await?;
        }
        Commands::Sync { account_id } => {
            let report = dw.sync_account(&account_id).await?;
            print_sync_report(&report);
        }
        Commands::Accounts { action } => match action {
            AccountsAction::List => {
                let accounts = dw.accounts().await?;
                if accounts.is_empty() {
                    println!("No accounts registered.");
                }
                for account in accounts {
                    println!(
                        "{}  {} ({})  added {}",
                        account.account_id, account.name, account.currency, account.added_at
                    );
                }
            }
            AccountsAction::Add { account_id } => {
                let (account, report) = dw.add_account(&account_id).await?;
                println!("Registered {} ({})", account.id, account.name);
                print_sync_report(&report);
            }
            AccountsAction::Remove { account_id } => {
                if dw.remove_account(&account_id).await? {
                    println!("Removed {account_id} (cached ads kept)");
                } else {
                    println!("No such account: {account_id}");
                }
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Get { key } => match dw.setting(&key).await? {
                Some(value) => println!("{value}"),
                None => println!("(not set)"),
            },
            ConfigAction::Set { key, value } => {
                dw.set_setting(&key, &value).await?;
                println!("Set {key}");
            }
            ConfigAction::List => {
                for (key, value) in dw.list_settings().await? {
                    println!("{key} = {value}");
                }
            }
        },
        Commands::Status => {
            let status = dw.status().await?;
            println!("Warehouse status:");
            println!("  Accounts:  {}", status.accounts);
            println!("  Ads:       {}", status.ads);
            println!("  Analyses:  {}", status.analyses);
            println!("  Reports:   {}", status.reports);
        }
    }

    Ok(())
}

fn print_sync_report(report: &metadw::SyncReport) {
    println!("Sync: {}", report.account_id);
    println!("  Ads synced:    {}", report.ads_synced);
    println!("  With insights: {}", report.ads_with_insights);
}
