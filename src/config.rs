//! Per-command configuration, read once from the environment at startup.
//!
//! Every command gets its own config struct so that a missing variable is
//! reported before any network or file I/O happens. Values are looked up
//! through a closure, which keeps the loaders testable without touching the
//! process environment.

use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::{batch::RowProfile, describe::ParserKind, naming::CollisionMode};

pub const DEFAULT_SHEET_NAME: &str = "scripts";
pub const DEFAULT_OUTPUT_DIR: &str = "voicefiles";
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 200;
pub const DEFAULT_VOICE_LIST_XLSX: &str = "varco_voices_list.xlsx";
pub const DEFAULT_VOICE_LIST_JSON: &str = "varco_voices.json";
pub const DEFAULT_SPEAKER_JSON: &str = "voice_data_full.json";
pub const DEFAULT_SPEAKER_XLSX: &str = "speakers.xlsx";
pub const DEFAULT_PROJECT_COLUMNS: &[&str] = &["speaker_name", "saas_name"];

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    Missing { var: &'static str },
    /// A variable is set but cannot be used.
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing { var } => write!(
                f,
                "{var} is not set. Check that a .env file exists in the working directory and that it defines {var}"
            ),
            ConfigError::Invalid { var, value, reason } => {
                write!(f, "{var}={value:?} is invalid: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Thin wrapper around a variable lookup.
struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var).ok_or(ConfigError::Missing { var })
    }

    fn or(&self, var: &str, default: &str) -> String {
        self.get(var).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, var: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(var) {
            None => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::Invalid {
                    var,
                    reason: e.to_string(),
                    value,
                }),
        }
    }
}

fn process_env(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// Configuration for `list-voices`.
#[derive(Debug, Clone)]
pub struct ListerConfig {
    pub api_key: String,
    pub voice_url: String,
    pub spreadsheet_path: PathBuf,
    pub json_path: PathBuf,
    pub parser: ParserKind,
}

impl ListerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };
        Ok(Self {
            api_key: vars.required("API_KEY")?,
            voice_url: vars.required("VOICE_URL")?,
            spreadsheet_path: vars.or("VOICE_LIST_XLSX", DEFAULT_VOICE_LIST_XLSX).into(),
            json_path: vars.or("VOICE_LIST_JSON", DEFAULT_VOICE_LIST_JSON).into(),
            parser: vars.parsed("DESCRIPTION_PARSER")?.unwrap_or_default(),
        })
    }
}

/// Configuration for `project`. Nothing here is required.
#[derive(Debug, Clone)]
pub struct ProjectorConfig {
    pub input_json: PathBuf,
    pub output_xlsx: PathBuf,
    pub target_columns: Vec<String>,
}

impl ProjectorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };
        let target_columns = match vars.get("PROJECT_COLUMNS") {
            Some(list) => {
                let columns: Vec<String> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(String::from)
                    .collect();
                if columns.is_empty() {
                    return Err(ConfigError::Invalid {
                        var: "PROJECT_COLUMNS",
                        value: list,
                        reason: "no column names given".to_string(),
                    });
                }
                columns
            }
            None => DEFAULT_PROJECT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        };
        Ok(Self {
            input_json: vars.or("SPEAKER_JSON", DEFAULT_SPEAKER_JSON).into(),
            output_xlsx: vars.or("SPEAKER_XLSX", DEFAULT_SPEAKER_XLSX).into(),
            target_columns,
        })
    }
}

/// Configuration for `generate`.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub api_key: String,
    pub gen_url: String,
    pub input_path: PathBuf,
    pub sheet_name: String,
    pub output_dir: PathBuf,
    pub mode: CollisionMode,
    pub request_delay: Duration,
    pub profile: RowProfile,
}

impl BatchConfig {
    /// `mode_override` is the `-m` flag; when absent `MODE` is consulted,
    /// then [`CollisionMode::default`].
    pub fn from_env(mode_override: Option<CollisionMode>) -> Result<Self, ConfigError> {
        Self::from_lookup(process_env, mode_override)
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        mode_override: Option<CollisionMode>,
    ) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };
        let api_key = vars.required("API_KEY")?;
        let gen_url = vars.required("GEN_URL")?;
        let input_path = vars.required("EXCEL_FILE")?.into();

        let mode = match mode_override {
            Some(mode) => mode,
            None => match vars.parsed::<u8>("MODE")? {
                Some(selector) => {
                    CollisionMode::from_selector(selector).ok_or(ConfigError::Invalid {
                        var: "MODE",
                        value: selector.to_string(),
                        reason: "expected 1 (rename) or 2 (skip)".to_string(),
                    })?
                }
                None => CollisionMode::default(),
            },
        };

        let delay_ms = vars
            .parsed("REQUEST_DELAY_MS")?
            .unwrap_or(DEFAULT_REQUEST_DELAY_MS);

        Ok(Self {
            api_key,
            gen_url,
            input_path,
            sheet_name: vars.or("SHEET_NAME", DEFAULT_SHEET_NAME),
            output_dir: vars.or("OUTPUT_DIR", DEFAULT_OUTPUT_DIR).into(),
            mode,
            request_delay: Duration::from_millis(delay_ms),
            profile: vars.parsed("ROW_PROFILE")?.unwrap_or_default(),
        })
    }
}
