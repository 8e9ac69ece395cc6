//! # VARCO TTS batch tools
//! Lists the voices of the VARCO text-to-speech web api and batch-generates
//! speech files from a spreadsheet.
//!
//! The intent of this crate is to take the busywork out of producing voice
//! lines: keep the script in a spreadsheet, run one command, and get a
//! folder of WAV files per voice.
//!
//! - [`lister`] fetches the voice profiles and saves them as `.xlsx` and JSON.
//! - [`projector`] copies selected columns of a speaker JSON file into `.xlsx`.
//! - [`batch`] reads the `scripts` sheet and synthesizes one file per row.
//!
//! All network access goes through [`api::TtsApi`]; [`api::HttpApi`] is the
//! blocking implementation. Configuration comes from the environment (a
//! `.env` file is loaded by the binary) through the structs in [`config`].

pub mod api;
pub mod batch;
pub mod config;
pub mod describe;
pub mod lister;
pub mod naming;
pub mod projector;
pub mod sheet;

pub use api::{ApiError, HttpApi, SynthesisRequest, SynthesisResponse, TtsApi, VoiceRecord};
pub use batch::{BatchSummary, RowProfile, ScriptRow, SheetRow};
pub use config::{BatchConfig, ConfigError, ListerConfig, ProjectorConfig};
pub use describe::{DescriptionParser, ParserKind, VoiceTraits};
pub use naming::{CollisionMode, Resolution};
pub use sheet::{Cell, SheetError, Table};
