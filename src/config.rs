use std::env;
use std::str::FromStr;

pub const DEFAULT_DELIMITER: &str = "|";
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl FromStr for ColorChoice {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            other => Err(format!("unknown color choice '{other}'")),
        }
    }
}

/// Runtime settings, read once from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub delimiter: String,
    pub color: ColorChoice,
    pub log_filter: String,
    /// Settings that were present but unusable; logged once logging is up.
    pub ignored: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            color: ColorChoice::Auto,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            ignored: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(delimiter) = lookup("RPIPE_DELIMITER") {
            if delimiter.is_empty() {
                config.ignored.push("RPIPE_DELIMITER is empty".to_string());
            } else {
                config.delimiter = delimiter;
            }
        }

        if let Some(color) = lookup("RPIPE_COLOR") {
            match color.parse() {
                Ok(choice) => config.color = choice,
                Err(e) => config.ignored.push(format!("RPIPE_COLOR: {e}")),
            }
        }
        if lookup("NO_COLOR").is_some_and(|value| !value.is_empty()) {
            config.color = ColorChoice::Never;
        }

        if let Some(filter) = lookup("RPIPE_LOG") {
            config.log_filter = filter;
        }

        config
    }
}
