use crate::config::Config;
use crate::core::{Base58Addresses, Ledger};
use crate::crypto::hash::Hash256;
use crate::storage::Database;
use crate::wallet::Wallets;
use crate::{LedgerError, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "powledger")]
#[command(about = "Single-node proof-of-work ledger with a UTXO index")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    
    #[arg(long, help = "Data directory")]
    pub data_dir: Option<PathBuf>,
    
    #[arg(long, help = "Enable debug logging")]
    pub debug: bool,
    
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a blockchain and send the genesis reward to ADDRESS
    CreateChain {
        #[arg(long)]
        address: String,
    },
    
    /// Generate a new key pair and save it to the wallet file
    CreateWallet,
    
    /// List all addresses in the wallet file
    ListAddresses,
    
    /// Get the balance of ADDRESS
    Balance {
        #[arg(long)]
        address: String,
    },
    
    /// Send AMOUNT from FROM to TO, mining a new block
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
    },
    
    /// Print all blocks, newest first
    PrintChain {
        #[arg(long, help = "Emit one JSON object per block")]
        json: bool,
    },
    
    /// Rebuild the UTXO index from the chain
    ReindexUtxo,
    
    /// Show a transaction by id
    ShowTx {
        #[arg(long)]
        id: String,
    },
}

pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    
    let _ = if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).try_init()
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init()
    };
    
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.set_data_dir(data_dir);
    }
    
    execute(cli.command, &config)?;
    Ok(())
}

fn open_database(config: &Config) -> Result<Arc<Database>> {
    std::fs::create_dir_all(&config.storage.data_dir)?;
    Ok(Arc::new(Database::new(config.db_path())?))
}

fn execute(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::CreateChain { address } => {
            let db = open_database(config)?;
            let ledger = Ledger::create_chain(db.clone(), config, Base58Addresses, &address)?;
            db.flush()?;
            println!("✅ Blockchain created, genesis {}", ledger.chain().tip());
        }
        
        Commands::CreateWallet => {
            let mut wallets = Wallets::load(&config.wallet.wallet_file)?;
            let address = wallets.create_wallet()?;
            wallets.save()?;
            println!("Your new address: {}", address);
        }
        
        Commands::ListAddresses => {
            let wallets = Wallets::load(&config.wallet.wallet_file)?;
            for address in wallets.addresses() {
                println!("{}", address);
            }
        }
        
        Commands::Balance { address } => {
            let ledger = Ledger::open(open_database(config)?, config, Base58Addresses)?;
            println!("Balance of '{}': {}", address, ledger.get_balance(&address)?);
        }
        
        Commands::Send { from, to, amount } => {
            let db = open_database(config)?;
            let mut ledger = Ledger::open(db.clone(), config, Base58Addresses)?;
            let block = ledger.send(&from, &to, amount)?;
            db.flush()?;
            println!("✅ Success! Block {} at height {}", block.hash, block.header.height);
        }
        
        Commands::PrintChain { json } => {
            let ledger = Ledger::open(open_database(config)?, config, Base58Addresses)?;
            for summary in ledger.print_chain() {
                let summary = summary?;
                if json {
                    println!("{}", serde_json::to_string(&summary)?);
                    continue;
                }
                
                println!("============ Block {} ============", summary.hash);
                println!("Height:     {}", summary.height);
                println!("Prev. hash: {}", summary.previous_hash);
                println!("Timestamp:  {}", format_timestamp(summary.timestamp));
                println!("Nonce:      {}", summary.nonce);
                println!("PoW:        {}", summary.pow_valid);
                for txid in &summary.transaction_ids {
                    println!("  tx {}", txid);
                }
                println!();
            }
        }
        
        Commands::ReindexUtxo => {
            let db = open_database(config)?;
            let ledger = Ledger::open(db.clone(), config, Base58Addresses)?;
            let count = ledger.reindex_utxo()?;
            db.flush()?;
            println!(
                "Done! There are {} transactions in the UTXO set holding {} in total.",
                count,
                ledger.utxo_set().total_value()?
            );
        }
        
        Commands::ShowTx { id } => {
            let txid = Hash256::from_hex(&id)
                .map_err(|e| LedgerError::Transaction(format!("Invalid transaction id {}: {}", id, e)))?;
            let ledger = Ledger::open(open_database(config)?, config, Base58Addresses)?;
            match ledger.find_transaction(&txid)? {
                Some(tx) => println!("{}", serde_json::to_string_pretty(&tx)?),
                None => println!("Transaction {} not found", txid),
            }
        }
    }
    
    Ok(())
}

fn format_timestamp(timestamp: u64) -> String {
    Utc.timestamp_opt(timestamp as i64, 0)
        .single()
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}
