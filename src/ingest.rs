use crate::audio::{self, copy_if_changed, discover_audio_files};
use crate::config::IngestConfig;
use crate::manifest::{ManifestEntry, ManifestWriter, PLACEHOLDER_TEXT};
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Standardized output filename: `{std_id}_{NNNN}.wav`, 1-based.
pub fn sequential_name(std_id: &str, index: usize) -> String {
    format!("{}_{:04}.wav", std_id, index)
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

#[derive(Debug)]
pub struct IngestOutcome {
    pub found: usize,
    pub processed: usize,
}

/// Ingests one character's raw audio tree into a standardized dataset
/// directory: every discovered file is resampled to mono, silence-trimmed
/// and renamed to a zero-padded sequential name. Per-file failures are
/// logged and skipped; they never abort the remaining files.
pub fn ingest_character(
    input_dir: &Path,
    std_id: &str,
    output_base: &Path,
    config: &IngestConfig,
) -> Result<IngestOutcome> {
    let output_dir = output_base.join(std_id);

    info!("Target ID: {}", std_id);
    info!("Input: {}", input_dir.display());
    info!("Output: {}", output_dir.display());

    if output_dir.exists() {
        warn!(
            "Output directory {} already exists, merging/overwriting",
            output_dir.display()
        );
    } else {
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    }

    let files = discover_audio_files(input_dir)?;
    info!("Found {} audio files", files.len());

    let pb = progress_bar(files.len() as u64)?;
    let mut processed = 0;
    for (i, file) in files.iter().enumerate() {
        let out_path = output_dir.join(sequential_name(std_id, i + 1));
        match audio::process_audio(file, &out_path, config.sample_rate, config.trim_db) {
            Ok(()) => processed += 1,
            Err(e) => warn!("Error processing {}: {}", file.display(), e),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(IngestOutcome {
        found: files.len(),
        processed,
    })
}

#[derive(Debug)]
pub struct CollectOutcome {
    pub matched: usize,
    pub copied: usize,
    pub manifest: PathBuf,
    pub entries: usize,
}

/// First phase of the two-phase manifest flow: copies matching raw WAV
/// files flat into `dest` (skipping files already present with the same
/// size) and writes a placeholder manifest for a later
/// `transcribe-manifest` pass.
pub fn collect_voices(
    src: &Path,
    dest: &Path,
    manifest_path: &Path,
    name_tokens: &[String],
    speaker: &str,
    language: &str,
) -> Result<CollectOutcome> {
    if !src.exists() {
        bail!("Source directory {} does not exist", src.display());
    }
    fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    info!("Scanning {} recursively for wav files", src.display());
    let all_wavs: Vec<PathBuf> = discover_audio_files(src)?
        .into_iter()
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("wav"))
        .collect();

    let tokens: Vec<String> = name_tokens.iter().map(|t| t.to_lowercase()).collect();
    let matched: Vec<PathBuf> = all_wavs
        .iter()
        .filter(|p| {
            if tokens.is_empty() {
                return true;
            }
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            tokens.iter().any(|t| name.contains(t))
        })
        .cloned()
        .collect();

    if matched.is_empty() {
        bail!(
            "No matching wav files found in {} (out of {} total)",
            src.display(),
            all_wavs.len()
        );
    }
    info!(
        "Found {} matching files (out of {} total wavs), copying to {}",
        matched.len(),
        all_wavs.len(),
        dest.display()
    );

    // Partial manifest goes to a .temp.jsonl sibling so downstream tooling
    // can tell it apart from a transcribed one.
    let temp_manifest = manifest_path.with_extension("temp.jsonl");
    let mut writer = ManifestWriter::create(&temp_manifest)?;

    let pb = progress_bar(matched.len() as u64)?;
    let mut copied = 0;
    for src_file in &matched {
        let file_name = src_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let dest_file = dest.join(&file_name);
        if copy_if_changed(src_file, &dest_file)? {
            copied += 1;
        }

        let stem = src_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        writer.write(&ManifestEntry {
            id: stem,
            text: PLACEHOLDER_TEXT.to_string(),
            // Filename only; the transcription pass resolves and rewrites
            // it against the destination directory.
            audio: file_name,
            speaker: speaker.to_string(),
            language: language.to_string(),
            duration: None,
        })?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    let entries = writer.count();
    Ok(CollectOutcome {
        matched: matched.len(),
        copied,
        manifest: temp_manifest,
        entries,
    })
}
