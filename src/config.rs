use log::LevelFilter;
use serde::Deserialize;
use std::{
    env,
    fs::read_to_string,
    net::{IpAddr, Ipv4Addr},
    path::Path,
};

/// The server version extracted from the Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable key to load the config from
const CONFIG_ENV_KEY: &str = "RR_CONFIG_JSON";

pub fn load_config() -> Option<Config> {
    // Attempt to load the config from the env
    if let Ok(env) = env::var(CONFIG_ENV_KEY) {
        let config: Config = match serde_json::from_str(&env) {
            Ok(value) => value,
            Err(err) => {
                eprintln!("Failed to load env config (Using default): {:?}", err);
                return None;
            }
        };
        return Some(config);
    }

    // Attempt to load the config from disk
    let file = Path::new("config.json");
    if !file.exists() {
        return None;
    }

    let data = match read_to_string(file) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Failed to load config file (Using defaults): {:?}", err);
            return None;
        }
    };

    let config: Config = match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Failed to load config file (Using default): {:?}", err);
            return None;
        }
    };

    Some(config)
}

#[derive(Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    /// Public address of this deployment, shown in the startup
    /// connection banner when set
    pub public_address: Option<IpAddr>,
    pub logging: LevelFilter,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub api: ApiConfig,
    pub queue: QueueConfig,
    pub acceptance: AcceptanceConfig,
    pub draft: DraftConfig,
    pub game_monitor: GameMonitorConfig,
    pub link_vote: LinkVoteConfig,
    pub ownership: OwnershipConfig,
    pub rating: RatingConfig,
    pub privileged_voters: Vec<PrivilegedVoter>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8090,
            public_address: None,
            logging: LevelFilter::Info,
            database: Default::default(),
            redis: Default::default(),
            api: Default::default(),
            queue: Default::default(),
            acceptance: Default::default(),
            draft: Default::default(),
            game_monitor: Default::default(),
            link_vote: Default::default(),
            ownership: Default::default(),
            rating: Default::default(),
            privileged_voters: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the sqlite database file used when no url is set
    pub file: String,
    /// Full connection url, set this to point multiple instances
    /// at a shared postgres database
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file: "data/server.db".to_string(),
            url: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Optional bearer token required on the websocket upgrade
    /// request when set
    pub token: Option<String>,
}

#[derive(Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of players required to form a match
    pub match_size: usize,
    /// Largest tolerated difference between the two team averages
    pub max_mmr_delta: u32,
    /// Cost weight per point of team average difference
    pub weight_mmr: f64,
    /// Cost weight per player placed outside both declared lanes
    pub weight_autofill: f64,
    /// Cost weight per player placed outside their primary lane
    pub weight_primary: f64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            match_size: 10,
            max_mmr_delta: 200,
            weight_mmr: 1.0,
            weight_autofill: 100.0,
            weight_primary: 25.0,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct AcceptanceConfig {
    pub timeout_seconds: u64,
}

impl Default for AcceptanceConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    pub action_timeout_seconds: u64,
    pub confirmation_required: bool,
    /// Champion ids considered valid when auto-filling a timed out
    /// pick, lowest unused id is chosen
    pub champion_pool: Vec<u32>,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            action_timeout_seconds: 30,
            confirmation_required: true,
            champion_pool: (1..=170).collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct GameMonitorConfig {
    pub poll_interval_seconds: u64,
    pub inactivity_cancel_seconds: u64,
}

impl Default for GameMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 5,
            inactivity_cancel_seconds: 300,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct LinkVoteConfig {
    pub quorum: u32,
}

impl Default for LinkVoteConfig {
    fn default() -> Self {
        Self { quorum: 6 }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct OwnershipConfig {
    pub heartbeat_seconds: u64,
    pub stale_cutoff_seconds: u64,
}

impl Default for OwnershipConfig {
    fn default() -> Self {
        Self {
            heartbeat_seconds: 10,
            stale_cutoff_seconds: 30,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// LP/MMR gained by each player on the winning team
    pub win_delta: i32,
    /// LP/MMR lost by each player on the losing team
    pub loss_delta: i32,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            win_delta: 18,
            loss_delta: 15,
        }
    }
}

/// Entry in the privileged voter list, votes from this summoner
/// count with the provided weight during link voting
#[derive(Clone, Deserialize)]
pub struct PrivilegedVoter {
    pub summoner_name: String,
    pub weight: u32,
}
