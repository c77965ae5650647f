//! TOML configuration loading
//!
//! Every table and key is optional; missing entries keep their defaults.
//!
//! ```toml
//! [screen]
//! width = 240
//! height = 320
//!
//! [pins]
//! cs = 1
//! pen_irq = 2
//!
//! [dispatch]
//! mode = "polling"
//!
//! [profile]
//! x_min = 150
//! x_max = 3900
//! y_min = 150
//! y_max = 3900
//! ```

use super::types::{ConfigError, TouchConfig};

/// Parse and validate a TOML configuration
pub fn parse_config(input: &str) -> Result<TouchConfig, ConfigError> {
    let config: TouchConfig = ::toml::from_str(input).map_err(|_| ConfigError::TomlParse)?;
    config.validate()?;
    Ok(config)
}
