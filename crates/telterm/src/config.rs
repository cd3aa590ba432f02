use std::env;
use std::time::Duration;

use telterm_common::error_codes;
use telterm_common::ErrorCategory;
use telterm_screen::Codepage;
use telterm_screen::DecoderOptions;
use telterm_screen::VirtualTerminal;
use telterm_screen::DEFAULT_SCROLLBACK;
use telterm_screen::MAX_COLS;
use telterm_screen::MAX_ROWS;
use telterm_screen::MIN_COLS;
use telterm_screen::MIN_ROWS;
use telterm_telnet::protocol::DEFAULT_TERMINAL_TYPE;
use telterm_telnet::LinkConfig;
use telterm_telnet::DEFAULT_MAX_ATTEMPTS;
use telterm_telnet::DEFAULT_RETRY_PAUSE;
use thiserror::Error;

const DEFAULT_COLS: u16 = 80;
const DEFAULT_ROWS: u16 = 24;
const DEFAULT_ENCODING: &str = "cp437";
const MAX_SCROLLBACK: usize = 100_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {name}")]
    Invalid { name: &'static str, value: String },
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

impl ConfigError {
    pub fn code(&self) -> i32 {
        error_codes::INVALID_CONFIG
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::InvalidInput
    }

    pub fn suggestion(&self) -> String {
        match self {
            ConfigError::Invalid { name, .. } => {
                format!("Fix or unset {name}. Run 'telterm --help' for accepted values.")
            }
            ConfigError::OutOfRange { name, min, max, .. } => {
                format!("Use a value for {name} between {min} and {max}.")
            }
        }
    }
}

/// Client settings: environment first, then command-line overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub cols: u16,
    pub rows: u16,
    pub encoding: String,
    pub terminal_type: String,
    pub scrollback: usize,
    pub retry_pause: Duration,
    pub max_attempts: u32,
    pub save_restore_cursor: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            encoding: DEFAULT_ENCODING.to_string(),
            terminal_type: DEFAULT_TERMINAL_TYPE.to_string(),
            scrollback: DEFAULT_SCROLLBACK,
            retry_pause: DEFAULT_RETRY_PAUSE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            save_restore_cursor: false,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            cols: parse_var(&lookup, "TELTERM_COLS")?.unwrap_or(defaults.cols),
            rows: parse_var(&lookup, "TELTERM_ROWS")?.unwrap_or(defaults.rows),
            encoding: lookup("TELTERM_ENCODING").unwrap_or(defaults.encoding),
            terminal_type: lookup("TELTERM_TERMINAL_TYPE").unwrap_or(defaults.terminal_type),
            scrollback: parse_var(&lookup, "TELTERM_SCROLLBACK")?.unwrap_or(defaults.scrollback),
            retry_pause: parse_var(&lookup, "TELTERM_RETRY_PAUSE")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_pause),
            max_attempts: parse_var(&lookup, "TELTERM_MAX_ATTEMPTS")?
                .unwrap_or(defaults.max_attempts),
            save_restore_cursor: parse_flag(&lookup, "TELTERM_SAVE_CURSOR")?
                .unwrap_or(defaults.save_restore_cursor),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.cols = cols;
        self.rows = rows;
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_terminal_type(mut self, terminal_type: impl Into<String>) -> Self {
        self.terminal_type = terminal_type.into();
        self
    }

    pub fn with_scrollback(mut self, scrollback: usize) -> Self {
        self.scrollback = scrollback;
        self
    }

    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_save_restore_cursor(mut self, enabled: bool) -> Self {
        self.save_restore_cursor = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("cols", u64::from(self.cols), MIN_COLS, MAX_COLS)?;
        check_range("rows", u64::from(self.rows), MIN_ROWS, MAX_ROWS)?;
        check_range("scrollback", self.scrollback as u64, 0, MAX_SCROLLBACK)?;
        let tt = self.terminal_type.as_str();
        if tt.is_empty() || !tt.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ConfigError::Invalid {
                name: "terminal type",
                value: self.terminal_type.clone(),
            });
        }
        Ok(())
    }

    pub fn codepage(&self) -> Codepage {
        Codepage::from_label(&self.encoding)
    }

    pub fn decoder_options(&self) -> DecoderOptions {
        DecoderOptions {
            save_restore_cursor: self.save_restore_cursor,
        }
    }

    pub fn virtual_terminal(&self) -> VirtualTerminal {
        VirtualTerminal::with_options(
            usize::from(self.cols),
            usize::from(self.rows),
            self.scrollback,
            self.codepage(),
            self.decoder_options(),
        )
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            terminal_type: self.terminal_type.clone(),
            codepage: self.codepage(),
            cols: self.cols,
            rows: self.rows,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<bool>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid { name, value: raw }),
        },
    }
}

fn check_range(name: &'static str, value: u64, min: usize, max: usize) -> Result<(), ConfigError> {
    let (min, max) = (min as u64, max as u64);
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!((config.cols, config.rows), (80, 24));
        assert_eq!(config.encoding, "cp437");
        assert_eq!(config.terminal_type, "ANSI");
        assert_eq!(config.scrollback, 500);
        assert_eq!(config.retry_pause, Duration::from_secs(5));
        assert_eq!(config.max_attempts, 5);
        assert!(!config.save_restore_cursor);
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("TELTERM_COLS", "132"),
            ("TELTERM_ROWS", " 43 "),
            ("TELTERM_ENCODING", "ibm866"),
            ("TELTERM_TERMINAL_TYPE", "VT100"),
            ("TELTERM_SCROLLBACK", "0"),
            ("TELTERM_RETRY_PAUSE", "30"),
            ("TELTERM_MAX_ATTEMPTS", "0"),
            ("TELTERM_SAVE_CURSOR", "yes"),
        ]))
        .unwrap();
        assert_eq!((config.cols, config.rows), (132, 43));
        assert_eq!(config.codepage().name(), "IBM866");
        assert_eq!(config.terminal_type, "VT100");
        assert_eq!(config.scrollback, 0);
        assert_eq!(config.retry_pause, Duration::from_secs(30));
        assert_eq!(config.max_attempts, 0);
        assert!(config.decoder_options().save_restore_cursor);
    }

    #[test]
    fn test_unparseable_value_is_error() {
        let err = ClientConfig::from_lookup(lookup(&[("TELTERM_COLS", "wide")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "TELTERM_COLS",
                value: "wide".into()
            }
        );
        assert!(err.to_string().contains("TELTERM_COLS"));
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
    }

    #[test]
    fn test_out_of_range_size() {
        let err = ClientConfig::from_lookup(lookup(&[("TELTERM_ROWS", "5")])).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "rows", .. }));
        assert!(err.suggestion().contains("between 10 and 200"));
    }

    #[test]
    fn test_invalid_flag() {
        assert!(ClientConfig::from_lookup(lookup(&[("TELTERM_SAVE_CURSOR", "maybe")])).is_err());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ClientConfig::default()
            .with_size(100, 30)
            .with_encoding("latin1")
            .with_terminal_type("XTERM")
            .with_scrollback(2000)
            .with_retry_pause(Duration::from_secs(1))
            .with_max_attempts(9)
            .with_save_restore_cursor(true);
        assert!(config.validate().is_ok());
        assert_eq!((config.cols, config.rows), (100, 30));
        assert_eq!(config.codepage(), Codepage::Latin1);
        assert_eq!(config.link_config().terminal_type, "XTERM");
        assert_eq!(config.max_attempts, 9);
    }

    #[test]
    fn test_terminal_type_must_be_printable() {
        let config = ClientConfig::default().with_terminal_type("AN SI");
        assert!(config.validate().is_err());
        let config = ClientConfig::default().with_terminal_type("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_virtual_terminal_uses_size() {
        let terminal = ClientConfig::default().with_size(100, 30).virtual_terminal();
        assert_eq!(terminal.size(), (100, 30));
    }
}
