//! The `[core]`/`[rabbitmq]` configuration file and `Bus::from_config`.

use std::path::Path;

use serde::Deserialize;

use crate::bus::Bus;
use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct CoreSection {
	pub mq: String,
	pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RabbitMqSection {
	pub server: String,
	pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub core: CoreSection,
	pub rabbitmq: RabbitMqSection,
}

impl Config {
	pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(contents)?)
	}

	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let contents = std::fs::read_to_string(path)?;
		Self::from_str(&contents)
	}
}

/// Builds a [`Bus`] from a parsed config file the way the original
/// `createConfigurableBus` does: only `mq = "rabbitmq"` is supported, and
/// console-style callers get the `"fw:h"` Framework queue instead of the
/// worker default `"fw:l"`.
pub fn bus_from_config(config: &Config, app_id: &str) -> Result<Bus, ConfigError> {
	if config.core.mq != "rabbitmq" {
		return Err(ConfigError::UnknownMq(config.core.mq.clone()));
	}
	let bus = Bus::connect(&config.rabbitmq.server, config.rabbitmq.port, Some(app_id))?;
	bus.set_fw_queue("fw:h");
	Ok(bus)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn parses_core_and_rabbitmq_sections() {
		let toml = r#"
			[core]
			mq = "rabbitmq"
			timeout = 30

			[rabbitmq]
			server = "broker.example"
			port = 5673
		"#;
		let config = Config::from_str(toml).unwrap();
		assert_eq!(config.core.mq, "rabbitmq");
		assert_eq!(config.core.timeout, Some(30));
		assert_eq!(config.rabbitmq.server, "broker.example");
		assert_eq!(config.rabbitmq.port, Some(5673));
	}

	#[test]
	fn rejects_unknown_mq_implementation() {
		let toml = r#"
			[core]
			mq = "kafka"

			[rabbitmq]
			server = "broker.example"
		"#;
		let config = Config::from_str(toml).unwrap();
		let err = bus_from_config(&config, "svc").unwrap_err();
		assert_eq!(err.to_string(), "Unknown mq implementation: kafka");
	}
}
