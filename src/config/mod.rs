//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::ai::AiDifficulty;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// `pretty` or `json`
    pub log_format: LogFormat,
    /// Allowed client origins for CORS; `*` allows any
    pub client_origin: String,

    pub game: GameConfig,
    pub queue: QueueConfig,

    /// How long a finished session stays available for rejoin
    pub session_grace: Duration,
}

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Per-session settings
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GameConfig {
    pub width: usize,
    pub height: f32,
    /// Turn ceiling
    pub max_turns: u32,
    /// Advisory turn length reported to clients
    pub turn_duration: Duration,
    /// How long an active session survives with no human connected
    pub idle_timeout: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600.0,
            max_turns: 50,
            turn_duration: Duration::from_secs(45),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

/// Matchmaking queue timing
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueueConfig {
    pub tick: Duration,
    /// Wait before the "no opponent yet" notice
    pub initial_timeout: Duration,
    /// Further wait before falling back to an AI match
    pub extended_timeout: Duration,
    pub ai_difficulty: AiDifficulty,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(1000),
            initial_timeout: Duration::from_secs(30),
            extended_timeout: Duration::from_secs(60),
            ai_difficulty: AiDifficulty::Medium,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            client_origin: "*".to_string(),
            game: GameConfig::default(),
            queue: QueueConfig::default(),
            session_grace: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        };

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("pretty") | Err(_) => LogFormat::Pretty,
            Ok(_) => return Err(ConfigError::Invalid("LOG_FORMAT")),
        };

        let game = GameConfig {
            width: parse_var("PLAYFIELD_WIDTH", 1200)?,
            height: parse_var("PLAYFIELD_HEIGHT", 600.0)?,
            max_turns: parse_var("MAX_TURNS", 50)?,
            turn_duration: Duration::from_secs(parse_var("TURN_DURATION_SECS", 45)?),
            idle_timeout: Duration::from_secs(parse_var("SESSION_IDLE_SECS", 300)?),
        };
        if game.width < 200 || game.height < 100.0 || game.max_turns == 0 {
            return Err(ConfigError::Invalid("PLAYFIELD_WIDTH/PLAYFIELD_HEIGHT/MAX_TURNS"));
        }

        let queue = QueueConfig {
            tick: Duration::from_millis(parse_var("QUEUE_TICK_MS", 1000)?),
            initial_timeout: Duration::from_secs(parse_var("QUEUE_TIMEOUT_INITIAL_SECS", 30)?),
            extended_timeout: Duration::from_secs(parse_var("QUEUE_TIMEOUT_EXTENDED_SECS", 60)?),
            ai_difficulty: parse_var("DEFAULT_AI_DIFFICULTY", AiDifficulty::Medium)?,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            game,
            queue,
            session_grace: Duration::from_secs(parse_var("SESSION_GRACE_SECS", 60)?),
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
