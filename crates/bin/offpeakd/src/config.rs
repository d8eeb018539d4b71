//! Configuration loading: TOML file with environment variable overrides.
//!
//! Reads `offpeak.toml` (or the file named by `OFFPEAK_CONFIG`) from the
//! working directory. Every field has a default so the file is optional.
//! Environment variables take precedence over file values.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use offpeak_app::scheduler::SchedulerSettings;
use offpeak_domain::options::{DEFAULT_DURATION_MINUTES, DEFAULT_READY_SUBSTRING, SchedulerOptions};
use offpeak_domain::schedule::PlanningMode;
use offpeak_domain::window::TimeOfDay;

const DEFAULT_PATH: &str = "offpeak.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
    pub integration: IntegrationConfig,
    pub schedulers: Vec<SchedulerConfig>,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// IANA name of the zone allowed windows and hours are read in.
    pub timezone: String,
    /// Upper bound of every press or power-on call.
    pub actuator_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationKind {
    #[default]
    Virtual,
    HomeAssistant,
}

/// Where entity states come from and where presses go.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    pub kind: IntegrationKind,
    /// Home Assistant base URL.
    pub base_url: Option<String>,
    /// Home Assistant long-lived access token.
    pub token: Option<String>,
    /// How often watched Home Assistant entities are polled.
    pub poll_interval_secs: u64,
}

/// One `[[schedulers]]` entry. Entity ids left out are filled with the
/// virtual integration's names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub name: String,
    pub cheapest_hour_entity: String,
    pub status_entity: String,
    pub start_button_entity: String,
    pub price_entity: Option<String>,
    pub program_select_entity: Option<String>,
    pub door_sensor_entity: Option<String>,
    pub power_switch_entity: Option<String>,
    pub door_open_state: String,
    /// Program name to half-hour units.
    pub program_durations: BTreeMap<String, i64>,
    pub ready_substring: String,
    pub window_start: TimeOfDay,
    pub window_end: TimeOfDay,
    pub planning_mode: PlanningMode,
    pub default_duration_minutes: i64,
}

impl Config {
    /// Load configuration from the config file (if present), then apply
    /// environment-variable overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, or if the
    /// result does not validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("OFFPEAK_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.fill_defaults();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("OFFPEAK_HOST") {
            self.server.host = val;
        }
        if let Some(port) = lookup("OFFPEAK_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = lookup("OFFPEAK_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Some(val) = lookup("OFFPEAK_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = lookup("OFFPEAK_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("OFFPEAK_HA_URL") {
            self.integration.base_url = Some(val);
        }
        if let Some(val) = lookup("OFFPEAK_HA_TOKEN") {
            self.integration.token = Some(val);
        }
    }

    /// With the virtual integration, an empty scheduler list means one
    /// `dishwasher`, and missing entity ids take the virtual names.
    fn fill_defaults(&mut self) {
        if self.integration.kind != IntegrationKind::Virtual {
            return;
        }
        if self.schedulers.is_empty() {
            self.schedulers.push(SchedulerConfig {
                name: "dishwasher".to_string(),
                ..SchedulerConfig::default()
            });
        }
        for scheduler in &mut self.schedulers {
            scheduler.fill_virtual_entities();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        self.timezone()?;
        if self.engine.actuator_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "actuator_timeout_secs must be positive".to_string(),
            ));
        }
        if self.integration.kind == IntegrationKind::HomeAssistant {
            if self.integration.base_url.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::Validation(
                    "integration.base_url is required for homeassistant".to_string(),
                ));
            }
            if self.integration.token.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::Validation(
                    "integration.token is required for homeassistant".to_string(),
                ));
            }
            if self.integration.poll_interval_secs == 0 {
                return Err(ConfigError::Validation(
                    "poll_interval_secs must be positive".to_string(),
                ));
            }
        }
        if self.schedulers.is_empty() {
            return Err(ConfigError::Validation(
                "at least one scheduler is required".to_string(),
            ));
        }
        let mut names = BTreeSet::new();
        for scheduler in &self.schedulers {
            scheduler.validate()?;
            if !names.insert(scheduler.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate scheduler name {:?}",
                    scheduler.name
                )));
            }
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for unknown zone names.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.engine.timezone.parse().map_err(|_| {
            ConfigError::Validation(format!("unknown timezone {:?}", self.engine.timezone))
        })
    }

    #[must_use]
    pub fn actuator_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.actuator_timeout_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.integration.poll_interval_secs)
    }
}

impl SchedulerConfig {
    fn fill_virtual_entities(&mut self) {
        let name = &self.name;
        let fill = |field: &mut String, value: String| {
            if field.trim().is_empty() {
                *field = value;
            }
        };
        fill(&mut self.cheapest_hour_entity, "sensor.cheapest_hour".to_string());
        fill(&mut self.status_entity, format!("sensor.{name}_status"));
        fill(&mut self.start_button_entity, format!("button.{name}_start"));
        self.price_entity
            .get_or_insert_with(|| "sensor.electricity_price".to_string());
        self.program_select_entity
            .get_or_insert_with(|| format!("select.{name}_program"));
        self.door_sensor_entity
            .get_or_insert_with(|| format!("binary_sensor.{name}_door"));
        self.power_switch_entity
            .get_or_insert_with(|| format!("switch.{name}_power"));
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Validation(format!(
                "scheduler {:?}: {reason}",
                self.name
            )))
        };
        if self.name.trim().is_empty() {
            return invalid("name must not be empty");
        }
        for (field, value) in [
            ("cheapest_hour_entity", &self.cheapest_hour_entity),
            ("status_entity", &self.status_entity),
            ("start_button_entity", &self.start_button_entity),
        ] {
            if value.trim().is_empty() {
                return invalid(&format!("{field} must not be empty"));
            }
        }
        if let Err(err) = self.options() {
            return invalid(&err.to_string());
        }
        Ok(())
    }

    /// Engine settings for this scheduler.
    #[must_use]
    pub fn settings(&self, timezone: Tz, actuator_timeout: Duration) -> SchedulerSettings {
        SchedulerSettings {
            price_entity: self.price_entity.clone(),
            program_select_entity: self.program_select_entity.clone(),
            door_sensor_entity: self.door_sensor_entity.clone(),
            power_switch_entity: self.power_switch_entity.clone(),
            door_open_state: self.door_open_state.clone(),
            program_durations: self.program_durations.clone(),
            timezone,
            actuator_timeout,
            ..SchedulerSettings::new(
                self.name.as_str(),
                self.cheapest_hour_entity.as_str(),
                self.status_entity.as_str(),
                self.start_button_entity.as_str(),
            )
        }
    }

    /// Initial user options, before persisted changes are re-applied.
    ///
    /// # Errors
    ///
    /// Returns the validation error of a blank ready substring or a
    /// non-positive duration.
    pub fn options(&self) -> Result<SchedulerOptions, offpeak_domain::error::ValidationError> {
        let ready_substring = self.ready_substring.trim();
        if ready_substring.is_empty() {
            return Err(offpeak_domain::error::ValidationError::EmptyReadySubstring);
        }
        let default_duration_minutes = u32::try_from(self.default_duration_minutes)
            .ok()
            .filter(|minutes| *minutes > 0)
            .ok_or(offpeak_domain::error::ValidationError::NonPositiveDuration)?;
        Ok(SchedulerOptions {
            ready_substring: ready_substring.to_string(),
            window_start: self.window_start,
            window_end: self.window_end,
            planning_mode: self.planning_mode,
            default_duration_minutes,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:offpeak.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "offpeakd=info,offpeak=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            actuator_timeout_secs: 30,
        }
    }
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            kind: IntegrationKind::default(),
            base_url: None,
            token: None,
            poll_interval_secs: 5,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let options = SchedulerOptions::default();
        Self {
            name: String::new(),
            cheapest_hour_entity: String::new(),
            status_entity: String::new(),
            start_button_entity: String::new(),
            price_entity: None,
            program_select_entity: None,
            door_sensor_entity: None,
            power_switch_entity: None,
            door_open_state: offpeak_app::scheduler::DEFAULT_DOOR_OPEN_STATE.to_string(),
            program_durations: BTreeMap::new(),
            ready_substring: DEFAULT_READY_SUBSTRING.to_string(),
            window_start: options.window_start,
            window_end: options.window_end,
            planning_mode: options.planning_mode,
            default_duration_minutes: i64::from(DEFAULT_DURATION_MINUTES),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
