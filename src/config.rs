//! Configuration from the environment (and an optional `.env` file)

use std::env;
use std::str::FromStr;

use tracing::warn;

use crate::error::{Error, Result};
use crate::task::MINIMAL_STACK_SIZE;
use crate::timer::{TickRate, Ticks, DEFAULT_TICK_RATE_HZ, MAX_TICK_RATE_HZ};

/// Producer send period (ms)
pub const DEFAULT_PERIOD_MS: u64 = 5_000;

pub const ENV_PERIOD_MS: &str = "RELAY_PERIOD_MS";
pub const ENV_TICK_RATE_HZ: &str = "RELAY_TICK_RATE_HZ";
pub const ENV_STACK_SIZE: &str = "RELAY_STACK_SIZE";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn parsed_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "unparseable setting, using default");
            default
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Producer period in milliseconds
    pub period_ms: u64,
    /// Scheduler tick rate
    pub tick_rate_hz: u32,
    /// Stack budget for each task (bytes)
    pub stack_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_PERIOD_MS,
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            stack_size: MINIMAL_STACK_SIZE,
        }
    }
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build config from any key lookup. Missing keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            period_ms: parsed_or(&lookup, ENV_PERIOD_MS, defaults.period_ms),
            tick_rate_hz: parsed_or(&lookup, ENV_TICK_RATE_HZ, defaults.tick_rate_hz),
            stack_size: parsed_or(&lookup, ENV_STACK_SIZE, defaults.stack_size),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > MAX_TICK_RATE_HZ {
            return Err(Error::Config(format!(
                "{ENV_TICK_RATE_HZ} must be in 1..={MAX_TICK_RATE_HZ}, got {}",
                self.tick_rate_hz
            )));
        }
        if self.tick_rate().ms_to_ticks(self.period_ms) == Ticks::ZERO {
            return Err(Error::Config(format!(
                "{ENV_PERIOD_MS} of {} ms is shorter than one tick at {} Hz",
                self.period_ms, self.tick_rate_hz
            )));
        }
        if self.stack_size < MINIMAL_STACK_SIZE {
            return Err(Error::Config(format!(
                "{ENV_STACK_SIZE} must be at least {MINIMAL_STACK_SIZE}, got {}",
                self.stack_size
            )));
        }
        Ok(())
    }

    pub fn tick_rate(&self) -> TickRate {
        TickRate::new(self.tick_rate_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.period_ms, 5_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_PERIOD_MS, "250"),
            (ENV_TICK_RATE_HZ, " 100 "),
            (ENV_STACK_SIZE, "131072"),
        ]));
        assert_eq!(config.period_ms, 250);
        assert_eq!(config.tick_rate().hz(), 100);
        assert_eq!(config.stack_size, 131_072);
    }

    #[test]
    fn test_garbage_falls_back_to_default() {
        let config = Config::from_lookup(lookup(&[(ENV_PERIOD_MS, "soon"), (ENV_TICK_RATE_HZ, "")]));
        assert_eq!(config.period_ms, DEFAULT_PERIOD_MS);
        assert_eq!(config.tick_rate_hz, DEFAULT_TICK_RATE_HZ);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_rate = Config {
            tick_rate_hz: 0,
            ..Config::default()
        };
        assert!(matches!(zero_rate.validate(), Err(Error::Config(_))));

        let small_stack = Config {
            stack_size: 1024,
            ..Config::default()
        };
        assert!(matches!(small_stack.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_sub_tick_period() {
        let zero_period = Config {
            period_ms: 0,
            ..Config::default()
        };
        assert!(matches!(zero_period.validate(), Err(Error::Config(_))));

        // 5 ms truncates to zero ticks at 100 Hz, 10 ms is exactly one
        let short = Config {
            period_ms: 5,
            tick_rate_hz: 100,
            ..Config::default()
        };
        assert!(matches!(short.validate(), Err(Error::Config(_))));
        let one_tick = Config {
            period_ms: 10,
            tick_rate_hz: 100,
            ..Config::default()
        };
        assert!(one_tick.validate().is_ok());
    }
}
