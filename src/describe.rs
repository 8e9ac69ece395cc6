//! Parsers that turn a vendor's free-text voice description into fixed
//! attributes.
//!
//! Descriptions are written by hand on the vendor side and are not
//! consistent, so the heuristic is a plain function pointer picked by name.

use std::str::FromStr;

/// Attributes derived from a description. Fields a parser can't fill are
/// left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceTraits {
    pub gender: String,
    pub age: String,
    pub range: String,
    pub timbre: String,
    pub mood: String,
}

/// A description parser. `None` means the description can't be used and
/// the record should be skipped.
pub type DescriptionParser = fn(&str) -> Option<VoiceTraits>;

/// Named parser selection, as given by `DESCRIPTION_PARSER`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParserKind {
    #[default]
    FivePart,
    GenderKeyword,
}

impl ParserKind {
    pub fn parser(self) -> DescriptionParser {
        match self {
            ParserKind::FivePart => five_part,
            ParserKind::GenderKeyword => gender_keyword,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ParserKind::FivePart => "five-part",
            ParserKind::GenderKeyword => "gender-keyword",
        }
    }
}

impl FromStr for ParserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "five-part" | "five_part" | "split" => Ok(ParserKind::FivePart),
            "gender-keyword" | "gender_keyword" | "keyword" => Ok(ParserKind::GenderKeyword),
            other => Err(format!(
                "unknown description parser {other:?}, expected five-part or gender-keyword"
            )),
        }
    }
}

/// `"F, 20s, Alto, Warm, Playful"` → gender, age, range, timbre, mood.
/// Anything other than exactly five comma-separated parts is rejected.
pub fn five_part(description: &str) -> Option<VoiceTraits> {
    let parts: Vec<&str> = description.split(',').map(str::trim).collect();
    let [gender, age, range, timbre, mood] = parts.as_slice() else {
        return None;
    };
    Some(VoiceTraits {
        gender: gender.to_string(),
        age: age.to_string(),
        range: range.to_string(),
        timbre: timbre.to_string(),
        mood: mood.to_string(),
    })
}

pub const FEMALE: &str = "여성";
pub const MALE: &str = "남성";

// Feminine keywords go first: "female" contains "male", "woman" contains "man".
const GENDER_KEYWORDS: &[(&str, &str)] = &[
    ("여성", FEMALE),
    ("여자", FEMALE),
    ("female", FEMALE),
    ("woman", FEMALE),
    ("남성", MALE),
    ("남자", MALE),
    ("male", MALE),
    ("man", MALE),
];

/// Best-effort search for a gender keyword anywhere in the text. Never
/// rejects a record; the gender is empty when nothing matches.
pub fn gender_keyword(description: &str) -> Option<VoiceTraits> {
    let haystack = description.to_lowercase();
    let gender = GENDER_KEYWORDS
        .iter()
        .find(|(keyword, _)| haystack.contains(keyword))
        .map(|(_, gender)| gender.to_string())
        .unwrap_or_default();
    Some(VoiceTraits {
        gender,
        ..Default::default()
    })
}

/// Emotion from a display name such as `"실라린(행복)"`: the text inside the
/// parentheses, or empty when there are none.
pub fn emotion_from_name(name: &str) -> String {
    match name.split_once('(') {
        Some((_, rest)) => {
            let inner = rest.split('(').next().unwrap_or(rest);
            inner.replace(')', "").trim().to_string()
        }
        None => String::new(),
    }
}
