//! `list-voices`: fetch the vendor's voice profiles and save them as a
//! spreadsheet and a JSON file.

use std::path::Path;

use color_eyre::eyre::WrapErr;
use tracing::{info, warn};

use crate::{
    api::{TtsApi, VoiceRecord},
    config::ListerConfig,
    describe::{emotion_from_name, DescriptionParser, VoiceTraits},
    sheet::{self, Cell, Table},
};

pub const COLUMNS: [&str; 8] = ["이름", "감정", "성별", "나이", "음역대", "음색", "분위기", "UUID"];

/// One spreadsheet row of the voice list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSummary {
    pub name: String,
    pub emotion: String,
    pub traits: VoiceTraits,
    pub id: String,
}

impl VoiceSummary {
    fn cells(&self) -> Vec<Cell> {
        [
            &self.name,
            &self.emotion,
            &self.traits.gender,
            &self.traits.age,
            &self.traits.range,
            &self.traits.timbre,
            &self.traits.mood,
            &self.id,
        ]
        .into_iter()
        .map(|s| Cell::Text(s.clone()))
        .collect()
    }
}

/// Applies `parse` to every record. Records it rejects are logged with their
/// index and left out.
pub fn summarize(records: &[VoiceRecord], parse: DescriptionParser) -> Vec<VoiceSummary> {
    records
        .iter()
        .enumerate()
        .filter_map(|(i, record)| match parse(&record.description) {
            Some(traits) => Some(VoiceSummary {
                name: record.speaker_name.clone(),
                emotion: emotion_from_name(&record.speaker_name),
                traits,
                id: record.speaker_uuid.clone(),
            }),
            None => {
                warn!(
                    "skipping voice {i} ({}): unusable description {:?}",
                    record.speaker_name, record.description
                );
                None
            }
        })
        .collect()
}

pub fn to_table(summaries: &[VoiceSummary]) -> Table {
    let mut table = Table::new(COLUMNS.iter().map(|c| c.to_string()).collect());
    table.rows = summaries.iter().map(VoiceSummary::cells).collect();
    table
}

/// Pretty JSON with four-space indentation. Non-ASCII text is written as is.
pub fn to_json(records: &[VoiceRecord]) -> color_eyre::Result<Vec<u8>> {
    use serde::Serialize;

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    records.serialize(&mut serializer)?;
    Ok(out)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListSummary {
    pub fetched: usize,
    pub kept: usize,
}

/// Fetches the voice list and writes both output files. Each file is
/// attempted independently; a locked spreadsheet doesn't stop the JSON.
pub fn run(config: &ListerConfig, api: &impl TtsApi) -> color_eyre::Result<ListSummary> {
    info!("requesting voice list");
    let records = api.list_voices().wrap_err("failed to fetch the voice list")?;
    info!("fetched {} voices", records.len());

    let summaries = summarize(&records, config.parser.parser());
    let summary = ListSummary {
        fetched: records.len(),
        kept: summaries.len(),
    };

    let mut first_error = None;

    let sheet_result = if summaries.is_empty() {
        warn!("no voices survived parsing, not writing a spreadsheet");
        discard(&config.spreadsheet_path)
    } else {
        save(&config.spreadsheet_path, || {
            sheet::to_xlsx(&to_table(&summaries)).map_err(Into::into)
        })
    };
    if let Err(e) = sheet_result {
        first_error.get_or_insert(e);
    }

    let json_result = if records.is_empty() {
        warn!("voice list is empty, not writing JSON");
        discard(&config.json_path)
    } else {
        save(&config.json_path, || to_json(&records))
    };
    if let Err(e) = json_result {
        first_error.get_or_insert(e);
    }

    info!(
        "{} of {} voices kept ({} skipped, parser {})",
        summary.kept,
        summary.fetched,
        summary.fetched - summary.kept,
        config.parser.name()
    );

    match first_error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}

fn save(
    path: &Path,
    render: impl FnOnce() -> color_eyre::Result<Vec<u8>>,
) -> color_eyre::Result<()> {
    let bytes = render().wrap_err_with(|| format!("failed to render {}", path.display()))?;
    sheet::write_file(path, &bytes)?;
    info!("saved {}", path.display());
    Ok(())
}

/// Removes an output left over from an earlier run when this run has
/// nothing to put there.
fn discard(path: &Path) -> color_eyre::Result<()> {
    if sheet::remove_stale(path)? {
        info!("removed previous {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::{five_part, gender_keyword};

    fn record(name: &str, uuid: &str, description: &str) -> VoiceRecord {
        VoiceRecord {
            speaker_uuid: uuid.into(),
            speaker_name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    #[test]
    fn joy_scenario() {
        let rows = summarize(
            &[record("A(Joy)", "u1", "F, 20s, Alto, Warm, Playful")],
            five_part,
        );
        let table = to_table(&rows);
        let expected: Vec<Cell> = ["A(Joy)", "Joy", "F", "20s", "Alto", "Warm", "Playful", "u1"]
            .into_iter()
            .map(|s| Cell::Text(s.into()))
            .collect();
        assert_eq!(table.headers, COLUMNS);
        assert_eq!(table.rows, vec![expected]);
    }

    #[test]
    fn malformed_descriptions_are_dropped() {
        let records = [
            record("a", "1", "F, 20s, Alto, Warm"),
            record("b", "2", "M, 30s, Bass, Deep, Calm"),
            record("c", "3", ""),
        ];
        let rows = summarize(&records, five_part);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "2");
    }

    #[test]
    fn keyword_parser_keeps_everything() {
        let records = [record("a", "1", "여성 내레이터"), record("b", "2", "")];
        let rows = summarize(&records, gender_keyword);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].traits.gender, "여성");
        assert_eq!(rows[1].traits.gender, "");
    }

    #[test]
    fn json_keeps_hangul_and_indents_by_four() {
        let out = to_json(&[record("실라린(행복)", "u1", "x")]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("실라린(행복)"));
        assert!(text.contains("\n        \"speaker_uuid\""));
    }
}
