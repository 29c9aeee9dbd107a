use crate::manifest::{ManifestEntry, ManifestWriter};
use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::Path;

/// Converts a legacy pipe-delimited `path|text` training list into a
/// manifest. Lines without both fields are skipped; the entry index keeps
/// counting over skipped lines so ids stay stable across reruns.
pub fn convert_list(input: &Path, output: &Path, language: &str, speaker: &str) -> Result<usize> {
    let content = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let mut writer = ManifestWriter::create(output)?;
    let mut skipped = 0;
    for (idx, line) in content.lines().enumerate() {
        let parts: Vec<&str> = line.trim().split('|').collect();
        if parts.len() < 2 {
            skipped += 1;
            continue;
        }
        writer.write(&ManifestEntry {
            id: format!("{}_{}_{:05}", speaker, language, idx),
            text: parts[1].to_string(),
            audio: parts[0].to_string(),
            speaker: speaker.to_string(),
            language: language.to_string(),
            duration: None,
        })?;
    }

    if skipped > 0 {
        info!("Skipped {} lines without a path|text pair", skipped);
    }
    info!("Wrote {} entries to {}", writer.count(), output.display());
    Ok(writer.count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::read_manifest;

    #[test]
    fn test_convert_basic_list() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("train.txt");
        let output = dir.path().join("train.jsonl");
        fs::write(
            &input,
            "/audio/a.wav|Hello there.\n/audio/b.wav|Another line.\n",
        )?;

        let count = convert_list(&input, &output, "en", "anbi")?;
        assert_eq!(count, 2);

        let entries = read_manifest(&output)?;
        assert_eq!(entries[0].id, "anbi_en_00000");
        assert_eq!(entries[0].audio, "/audio/a.wav");
        assert_eq!(entries[0].text, "Hello there.");
        assert_eq!(entries[1].id, "anbi_en_00001");
        Ok(())
    }

    #[test]
    fn test_convert_skips_short_lines_but_keeps_indices() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("train.txt");
        let output = dir.path().join("train.jsonl");
        fs::write(&input, "/audio/a.wav|First.\nbroken line\n/audio/c.wav|Third.\n")?;

        let count = convert_list(&input, &output, "en", "anbi")?;
        assert_eq!(count, 2);

        let entries = read_manifest(&output)?;
        assert_eq!(entries[0].id, "anbi_en_00000");
        // Index 1 was the skipped line.
        assert_eq!(entries[1].id, "anbi_en_00002");
        Ok(())
    }

    #[test]
    fn test_convert_extra_pipes_keep_second_field() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("train.txt");
        let output = dir.path().join("train.jsonl");
        fs::write(&input, "/audio/a.wav|text with detail|extra\n")?;

        convert_list(&input, &output, "en", "anbi")?;
        let entries = read_manifest(&output)?;
        assert_eq!(entries[0].text, "text with detail");
        Ok(())
    }
}
