//! `generate`: turn the rows of the `scripts` sheet into WAV files, one
//! synthesis request per row.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Instant,
};

use base64::Engine as _;
use color_eyre::eyre::{bail, WrapErr};
use tracing::{debug, error, info, warn};

use crate::{
    api::{Prosody, SynthesisRequest, TtsApi},
    config::BatchConfig,
    naming::{self, Resolution},
    sheet::{self, Cell, Table},
};

pub const MIN_FM_STEPS: f64 = 8.0;
pub const MAX_FM_STEPS: f64 = 20.0;

/// Which columns a row carries and what blank numeric cells default to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowProfile {
    /// speed, pitch, n_fm_steps and seed; steps are clamped to 8..=20.
    #[default]
    Full,
    /// speed and pitch only.
    Prosody,
}

impl RowProfile {
    fn default_speed(self) -> f64 {
        match self {
            RowProfile::Full => 1.3,
            RowProfile::Prosody => 1.0,
        }
    }

    fn default_pitch(self) -> f64 {
        1.0
    }
}

impl FromStr for RowProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(RowProfile::Full),
            "prosody" => Ok(RowProfile::Prosody),
            other => Err(format!(
                "unknown row profile {other:?}, expected full or prosody"
            )),
        }
    }
}

/// A validated row of the scripts sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRow {
    pub filename: String,
    pub text: String,
    pub voice: String,
    pub speed: f64,
    pub pitch: f64,
    pub n_fm_steps: Option<f64>,
    pub seed: Option<f64>,
}

/// Why a row was rejected before any request was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    Blank(&'static str),
    NotANumber { column: &'static str, value: String },
    UnsafeName { column: &'static str, value: String },
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowError::Blank(column) => write!(f, "{column} is empty"),
            RowError::NotANumber { column, value } => {
                write!(f, "{column} is not a number: {value:?}")
            }
            RowError::UnsafeName { column, value } => {
                write!(f, "{column} can't be used as a file name: {value:?}")
            }
        }
    }
}

impl std::error::Error for RowError {}

/// Column positions of the scripts sheet, looked up once per run.
#[derive(Debug, Clone, Copy)]
struct Columns {
    filename: Option<usize>,
    text: Option<usize>,
    voice: Option<usize>,
    speed: Option<usize>,
    pitch: Option<usize>,
    n_fm_steps: Option<usize>,
    seed: Option<usize>,
}

impl Columns {
    fn locate(table: &Table) -> Self {
        Self {
            filename: table.column("filename"),
            text: table.column("text"),
            voice: table.column("voice"),
            speed: table.column("speed"),
            pitch: table.column("pitch"),
            n_fm_steps: table.column("n_fm_steps"),
            seed: table.column("seed"),
        }
    }
}

fn cell(table: &Table, row: usize, column: Option<usize>) -> &Cell {
    const BLANK: &Cell = &Cell::Blank;
    column.map_or(BLANK, |c| table.cell(row, c))
}

fn required_text(cell: &Cell, column: &'static str) -> Result<String, RowError> {
    let value = cell.as_text();
    if value.is_empty() {
        return Err(RowError::Blank(column));
    }
    Ok(value)
}

/// Blank → `default`. Text is parsed; `NaN` and infinities are rejected
/// along with anything else that isn't a finite number.
fn number_or(cell: &Cell, column: &'static str, default: f64) -> Result<f64, RowError> {
    let parsed = match cell {
        Cell::Number(n) => Some(*n),
        c if c.is_blank() => return Ok(default),
        c => c.as_text().parse::<f64>().ok(),
    };
    match parsed {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(RowError::NotANumber {
            column,
            value: cell.as_text(),
        }),
    }
}

fn plain_name(value: String, column: &'static str) -> Result<String, RowError> {
    if naming::is_plain_component(&value) {
        Ok(value)
    } else {
        Err(RowError::UnsafeName { column, value })
    }
}

impl ScriptRow {
    /// Builds a row from raw cells: trims the text fields, fills blank
    /// numerics from `profile`, and clamps `n_fm_steps`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_cells(
        filename: &Cell,
        text: &Cell,
        voice: &Cell,
        speed: &Cell,
        pitch: &Cell,
        n_fm_steps: &Cell,
        seed: &Cell,
        profile: RowProfile,
    ) -> Result<Self, RowError> {
        let filename = required_text(filename, "filename")?;
        let text = required_text(text, "text")?;
        let voice = required_text(voice, "voice")?;

        let speed = number_or(speed, "speed", profile.default_speed())?;
        let pitch = number_or(pitch, "pitch", profile.default_pitch())?;
        let (n_fm_steps, seed) = match profile {
            RowProfile::Full => {
                let steps = number_or(n_fm_steps, "n_fm_steps", MIN_FM_STEPS)?;
                let seed = number_or(seed, "seed", -1.0)?;
                (Some(steps.clamp(MIN_FM_STEPS, MAX_FM_STEPS)), Some(seed))
            }
            RowProfile::Prosody => (None, None),
        };

        Ok(Self {
            filename: plain_name(filename, "filename")?,
            text,
            voice: plain_name(voice, "voice")?,
            speed,
            pitch,
            n_fm_steps,
            seed,
        })
    }

    pub fn request(&self) -> SynthesisRequest {
        SynthesisRequest {
            voice: self.voice.clone(),
            text: self.text.clone(),
            n_fm_steps: self.n_fm_steps,
            seed: self.seed,
            properties: Prosody {
                speed: self.speed,
                pitch: self.pitch,
            },
        }
    }
}

/// A parsed row together with the sheet line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub line: usize,
    pub row: Result<ScriptRow, RowError>,
}

/// Parses every data row of `table`. Entirely blank rows are dropped;
/// rejected rows come back as errors tagged with their sheet line so the
/// caller can point at them.
pub fn parse_rows(table: &Table, profile: RowProfile) -> Vec<SheetRow> {
    let cols = Columns::locate(table);
    (0..table.rows.len())
        .filter(|&i| !table.rows[i].iter().all(Cell::is_blank))
        .map(|i| SheetRow {
            line: table.line_of(i),
            row: ScriptRow::from_cells(
                cell(table, i, cols.filename),
                cell(table, i, cols.text),
                cell(table, i, cols.voice),
                cell(table, i, cols.speed),
                cell(table, i, cols.pitch),
                cell(table, i, cols.n_fm_steps),
                cell(table, i, cols.seed),
                profile,
            ),
        })
        .collect()
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub generated: usize,
    pub skipped_existing: usize,
    pub invalid: usize,
    pub failed: usize,
}

fn ensure_dir(dir: &Path) -> color_eyre::Result<()> {
    if !dir.is_dir() {
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
        info!("created directory {}", dir.display());
    }
    Ok(())
}

/// Sends one request and writes the audio. `Ok(false)` means the server
/// answered 200 but without audio.
fn synthesize_to(api: &impl TtsApi, row: &ScriptRow, path: &Path) -> color_eyre::Result<bool> {
    let response = api.synthesize(&row.request())?;
    let Some(audio) = response.audio else {
        return Ok(false);
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(audio.trim())
        .wrap_err("audio is not valid base64")?;
    sheet::write_atomic(path, &bytes)
        .wrap_err_with(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

/// Processes already-loaded rows. Each row either fails on its own or
/// produces at most one file; nothing here aborts the loop except a failure
/// to create the output directory itself.
pub fn run_rows(
    config: &BatchConfig,
    api: &impl TtsApi,
    rows: Vec<SheetRow>,
) -> color_eyre::Result<BatchSummary> {
    ensure_dir(&config.output_dir)?;

    let mut summary = BatchSummary {
        total: rows.len(),
        ..Default::default()
    };
    info!(
        "mode {} ({}), {} rows to process",
        config.mode.selector(),
        config.mode.describe(),
        summary.total
    );

    for (i, SheetRow { line, row }) in rows.into_iter().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("line {line} skipped: {e}");
                summary.invalid += 1;
                continue;
            }
        };

        let voice_dir: PathBuf = config.output_dir.join(&row.voice);
        if let Err(e) = ensure_dir(&voice_dir) {
            error!("line {line} failed: {e:#}");
            summary.failed += 1;
            continue;
        }

        let filename = naming::ensure_wav_extension(&row.filename);
        let path = match naming::resolve(&voice_dir, &filename, config.mode) {
            Resolution::Skip(existing) => {
                info!("already exists, skipping {}", existing.display());
                summary.skipped_existing += 1;
                continue;
            }
            Resolution::Fresh(path) => path,
            Resolution::Renamed(path) => {
                debug!("{filename} exists, writing {} instead", path.display());
                path
            }
        };

        info!(
            "[{}/{}] generating {} (voice {})",
            i + 1,
            summary.total,
            path.display(),
            row.voice
        );
        let started = Instant::now();
        match synthesize_to(api, &row, &path) {
            Ok(true) => {
                info!("saved {}", path.display());
                summary.generated += 1;
            }
            Ok(false) => {
                warn!("line {line}: response has no audio field");
                summary.failed += 1;
            }
            Err(e) => {
                error!("line {line} failed: {e:#}");
                summary.failed += 1;
            }
        }
        info!("line {line} took {:?}", started.elapsed());

        if !config.request_delay.is_zero() {
            std::thread::sleep(config.request_delay);
        }
    }

    info!(
        "done: {} generated, {} skipped (existing), {} invalid, {} failed",
        summary.generated, summary.skipped_existing, summary.invalid, summary.failed
    );
    Ok(summary)
}

/// Reads the configured sheet and processes every row.
pub fn run(config: &BatchConfig, api: &impl TtsApi) -> color_eyre::Result<BatchSummary> {
    if !config.input_path.exists() {
        bail!("{} does not exist", config.input_path.display());
    }
    let table = sheet::read_table(&config.input_path, &config.sheet_name)
        .wrap_err_with(|| format!("failed to read {}", config.input_path.display()))?;
    run_rows(config, api, parse_rows(&table, config.profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.into())
    }

    fn full_row(filename: Cell, text_: Cell, voice: Cell, speed: Cell) -> Result<ScriptRow, RowError> {
        ScriptRow::from_cells(
            &filename,
            &text_,
            &voice,
            &speed,
            &Cell::Blank,
            &Cell::Blank,
            &Cell::Blank,
            RowProfile::Full,
        )
    }

    #[test]
    fn blanks_take_full_profile_defaults() {
        let row = full_row(text(" line1 "), text("hello"), text("u1"), Cell::Blank).unwrap();
        assert_eq!(row.filename, "line1");
        assert_eq!(row.speed, 1.3);
        assert_eq!(row.pitch, 1.0);
        assert_eq!(row.n_fm_steps, Some(8.0));
        assert_eq!(row.seed, Some(-1.0));
    }

    #[test]
    fn steps_are_clamped() {
        let build = |steps: f64| {
            ScriptRow::from_cells(
                &text("a"),
                &text("b"),
                &text("c"),
                &Cell::Blank,
                &Cell::Blank,
                &Cell::Number(steps),
                &Cell::Blank,
                RowProfile::Full,
            )
            .unwrap()
            .n_fm_steps
        };
        assert_eq!(build(3.0), Some(8.0));
        assert_eq!(build(12.0), Some(12.0));
        assert_eq!(build(50.0), Some(20.0));
    }

    #[test]
    fn prosody_profile_drops_steps_and_seed() {
        let row = ScriptRow::from_cells(
            &text("a"),
            &text("b"),
            &text("c"),
            &Cell::Blank,
            &Cell::Blank,
            &Cell::Number(12.0),
            &Cell::Number(7.0),
            RowProfile::Prosody,
        )
        .unwrap();
        assert_eq!(row.speed, 1.0);
        assert_eq!(row.n_fm_steps, None);
        assert_eq!(row.seed, None);
    }

    #[test]
    fn rejected_rows() {
        assert_eq!(
            full_row(text("  "), text("t"), text("v"), Cell::Blank),
            Err(RowError::Blank("filename"))
        );
        assert_eq!(
            full_row(text("f"), Cell::Blank, text("v"), Cell::Blank),
            Err(RowError::Blank("text"))
        );
        assert_eq!(
            full_row(text("f"), text("t"), text("v"), text("fast")),
            Err(RowError::NotANumber {
                column: "speed",
                value: "fast".into()
            })
        );
        assert!(matches!(
            full_row(text("f"), text("t"), text("../v"), Cell::Blank),
            Err(RowError::UnsafeName { column: "voice", .. })
        ));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        assert_eq!(
            full_row(text("f"), text("t"), text("v"), text("NaN")),
            Err(RowError::NotANumber {
                column: "speed",
                value: "NaN".into()
            })
        );
        assert!(full_row(text("f"), text("t"), text("v"), text("-infinity")).is_err());
        assert!(full_row(text("f"), text("t"), text("v"), Cell::Number(f64::NAN)).is_err());

        let steps = ScriptRow::from_cells(
            &text("f"),
            &text("t"),
            &text("v"),
            &Cell::Blank,
            &Cell::Blank,
            &text("inf"),
            &Cell::Blank,
            RowProfile::Full,
        );
        assert!(matches!(
            steps,
            Err(RowError::NotANumber {
                column: "n_fm_steps",
                ..
            })
        ));
    }

    #[test]
    fn numeric_text_and_numeric_filenames() {
        let row = full_row(Cell::Number(7.0), text("t"), text("v"), text("1.1")).unwrap();
        assert_eq!(row.filename, "7");
        assert_eq!(row.speed, 1.1);
    }

    #[test]
    fn missing_columns_are_blank() {
        let mut table = Table::new(vec!["filename".into(), "text".into(), "voice".into()]);
        table.rows.push(vec![text("f"), text("t"), text("v")]);
        table.rows.push(vec![text("g"), text("t")]);

        let rows = parse_rows(&table, RowProfile::Full);
        assert_eq!(rows[0].row.as_ref().unwrap().speed, 1.3);
        assert_eq!(rows[1].row, Err(RowError::Blank("voice")));
    }

    #[test]
    fn blank_rows_are_dropped_but_lines_stay_true() {
        let mut table = Table::new(vec!["filename".into(), "text".into(), "voice".into()]);
        table.rows.push(vec![text("a"), text("t"), text("v")]);
        table.rows.push(vec![Cell::Blank, text("  ")]);
        table.rows.push(vec![text("c"), Cell::Blank, text("v")]);

        let rows = parse_rows(&table, RowProfile::Full);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].line, 4);
        assert_eq!(rows[1].row, Err(RowError::Blank("text")));
    }

    #[test]
    fn profile_names() {
        assert_eq!("Full".parse::<RowProfile>(), Ok(RowProfile::Full));
        assert_eq!("prosody".parse::<RowProfile>(), Ok(RowProfile::Prosody));
        assert!("other".parse::<RowProfile>().is_err());
    }
}
