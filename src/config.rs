use crate::mining::ProofOfWork;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub mining: MiningConfig,
    pub consensus: ConsensusConfig,
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Leading zero bits every block hash must have.
    pub target_bits: u32,
    pub max_nonce: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Coinbase reward per block.
    pub subsidy: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub wallet_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_data_dir(default_data_dir())
    }
}

impl Config {
    pub fn with_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        
        Self {
            storage: StorageConfig {
                data_dir: data_dir.clone(),
            },
            mining: MiningConfig {
                target_bits: 16,
                max_nonce: i64::MAX as u64,
            },
            consensus: ConsensusConfig {
                subsidy: 10,
            },
            wallet: WalletConfig {
                wallet_file: data_dir.join("wallet.json"),
            },
        }
    }
    
    /// Moves the data directory and any wallet file kept inside it.
    pub fn set_data_dir<P: AsRef<Path>>(&mut self, data_dir: P) {
        let data_dir = data_dir.as_ref().to_path_buf();
        if let Ok(relative) = self.wallet.wallet_file.strip_prefix(&self.storage.data_dir) {
            self.wallet.wallet_file = data_dir.join(relative);
        }
        self.storage.data_dir = data_dir;
    }
    
    pub fn db_path(&self) -> PathBuf {
        self.storage.data_dir.join("blockchain.db")
    }
    
    pub fn proof_of_work(&self) -> Result<ProofOfWork> {
        ProofOfWork::new(self.mining.target_bits, self.mining.max_nonce)
    }
    
    /// Reads the config file, writing defaults first when it does not exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save(&config_path)?;
            Ok(config)
        }
    }
    
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        
        Ok(())
    }
    
    fn config_path() -> PathBuf {
        default_data_dir().join("config.json")
    }
}

fn default_data_dir() -> PathBuf {
    let home_dir = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home_dir).join(".powledger")
}
