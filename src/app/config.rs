use std::fmt;
use std::str::FromStr;

use crate::audio::REFERENCE_DISTANCE;

/// Main configuration struct for the application
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Display name, used for logging only
    pub username: String,
    /// Listener speed in world units per tick
    pub move_speed: f32,
    /// Simulation tick length in milliseconds
    pub tick_ms: u64,
    /// Attenuation falloff reference for the panner nodes
    pub reference_distance: f32,
    /// Label of the presence side channel
    pub channel_label: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: "User".to_string(),
            move_speed: 0.25,
            tick_ms: 33,
            reference_distance: REFERENCE_DISTANCE,
            channel_label: "data".to_string(),
        }
    }
}

impl Config {
    /// Serializes the configuration to a string
    pub fn to_string(&self) -> String {
        format!(
            "username={}\nmove_speed={}\ntick_ms={}\nreference_distance={}\nchannel_label={}",
            self.username, self.move_speed, self.tick_ms, self.reference_distance, self.channel_label
        )
    }
}

// Custom error for configuration parsing
#[derive(Debug)]
pub struct ConfigParseError {
    message: String,
}

impl fmt::Display for ConfigParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigParseError {}

impl FromStr for Config {
    type Err = ConfigParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut config = Config::default();

        for line in s.lines() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.splitn(2, '=').collect();
            if parts.len() != 2 {
                return Err(ConfigParseError {
                    message: format!("Invalid line format: {}", line),
                });
            }

            let key = parts[0].trim();
            let value = parts[1].trim();

            match key {
                "username" => config.username = value.to_string(),
                "move_speed" => {
                    config.move_speed = value.parse().map_err(|_| ConfigParseError {
                        message: format!("Invalid move_speed: {}", value),
                    })?;
                }
                "tick_ms" => {
                    config.tick_ms = value.parse().map_err(|_| ConfigParseError {
                        message: format!("Invalid tick_ms: {}", value),
                    })?;
                }
                "reference_distance" => {
                    config.reference_distance = value.parse().map_err(|_| ConfigParseError {
                        message: format!("Invalid reference_distance: {}", value),
                    })?;
                }
                "channel_label" => config.channel_label = value.to_string(),
                _ => {
                    return Err(ConfigParseError {
                        message: format!("Unknown configuration key: {}", key),
                    })
                }
            }
        }

        Ok(config)
    }
}
