//! Output file naming and the collision policy.

use std::path::{Component, Path, PathBuf};

/// What to do when the target file of a row already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionMode {
    /// Keep the existing file and write the new one under `stem_k.ext`.
    Rename,
    /// Leave the existing file alone and don't send a request.
    #[default]
    Skip,
}

impl CollisionMode {
    /// Maps the numeric selector used by `MODE` and `-m`: 1 = rename,
    /// 2 = skip.
    pub fn from_selector(selector: u8) -> Option<Self> {
        match selector {
            1 => Some(CollisionMode::Rename),
            2 => Some(CollisionMode::Skip),
            _ => None,
        }
    }

    pub fn selector(self) -> u8 {
        match self {
            CollisionMode::Rename => 1,
            CollisionMode::Skip => 2,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            CollisionMode::Rename => "regenerate everything, numbering duplicates",
            CollisionMode::Skip => "skip files that already exist",
        }
    }
}

/// Outcome of applying the collision policy to one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Target did not exist.
    Fresh(PathBuf),
    /// Target existed, a numbered sibling was chosen instead.
    Renamed(PathBuf),
    /// Target existed and the mode says to leave it.
    Skip(PathBuf),
}

impl Resolution {
    /// Path to write to, `None` when the row is skipped.
    pub fn write_path(&self) -> Option<&Path> {
        match self {
            Resolution::Fresh(p) | Resolution::Renamed(p) => Some(p),
            Resolution::Skip(_) => None,
        }
    }
}

/// Appends `.wav` unless the name already ends with it (any case).
pub fn ensure_wav_extension(filename: &str) -> String {
    if filename.to_ascii_lowercase().ends_with(".wav") {
        filename.to_string()
    } else {
        format!("{filename}.wav")
    }
}

/// True when `name` is a single ordinary path component, so joining it onto
/// a directory can't escape that directory.
pub fn is_plain_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

/// First name among `filename`, `stem_1.ext`, `stem_2.ext`, … that does not
/// exist in `dir`.
pub fn unique_filename(dir: &Path, filename: &str) -> String {
    if !dir.join(filename).exists() {
        return filename.to_string();
    }
    let (stem, ext) = split_extension(filename);
    (1u64..)
        .map(|k| format!("{stem}_{k}{ext}"))
        .find(|candidate| !dir.join(candidate).exists())
        .unwrap_or_else(|| filename.to_string())
}

/// Splits `a.b.wav` into `("a.b", ".wav")`. A leading dot does not start an
/// extension.
fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(0) | None => (filename, ""),
        Some(i) => filename.split_at(i),
    }
}

/// Decides the final path for `filename` inside `dir`.
pub fn resolve(dir: &Path, filename: &str, mode: CollisionMode) -> Resolution {
    let target = dir.join(filename);
    if !target.exists() {
        return Resolution::Fresh(target);
    }
    match mode {
        CollisionMode::Skip => Resolution::Skip(target),
        CollisionMode::Rename => Resolution::Renamed(dir.join(unique_filename(dir, filename))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_extension_appended_once() {
        assert_eq!(ensure_wav_extension("line1"), "line1.wav");
        assert_eq!(ensure_wav_extension("line1.wav"), "line1.wav");
        assert_eq!(ensure_wav_extension("LINE1.WAV"), "LINE1.WAV");
        assert_eq!(ensure_wav_extension("take.mp3"), "take.mp3.wav");
    }

    #[test]
    fn split_keeps_inner_dots_in_stem() {
        assert_eq!(split_extension("a.b.wav"), ("a.b", ".wav"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
    }

    #[test]
    fn plain_components() {
        assert!(is_plain_component("u1"));
        assert!(is_plain_component("데리온(분노)"));
        assert!(!is_plain_component("../up"));
        assert!(!is_plain_component(".."));
        assert!(!is_plain_component("a/b"));
        assert!(!is_plain_component("a\\b"));
        assert!(!is_plain_component(""));
    }

    #[test]
    fn rename_picks_next_free_suffix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.wav"), b"").unwrap();
        std::fs::write(dir.path().join("a_1.wav"), b"").unwrap();

        let resolved = resolve(dir.path(), "a.wav", CollisionMode::Rename);
        assert_eq!(resolved, Resolution::Renamed(dir.path().join("a_2.wav")));
    }

    #[test]
    fn rename_fills_gaps() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.wav"), b"").unwrap();
        std::fs::write(dir.path().join("a_2.wav"), b"").unwrap();

        assert_eq!(unique_filename(dir.path(), "a.wav"), "a_1.wav");
    }

    #[test]
    fn skip_only_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = resolve(dir.path(), "a.wav", CollisionMode::Skip);
        assert_eq!(fresh, Resolution::Fresh(dir.path().join("a.wav")));

        std::fs::write(dir.path().join("a.wav"), b"").unwrap();
        let skipped = resolve(dir.path(), "a.wav", CollisionMode::Skip);
        assert_eq!(skipped.write_path(), None);
    }

    #[test]
    fn selectors_round_trip() {
        for mode in [CollisionMode::Rename, CollisionMode::Skip] {
            assert_eq!(CollisionMode::from_selector(mode.selector()), Some(mode));
        }
        assert_eq!(CollisionMode::from_selector(0), None);
    }
}
