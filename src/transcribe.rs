use crate::audio::list_wav_files;
use crate::manifest::{read_manifest, ManifestEntry, ManifestWriter};
use crate::stt::SpeechRecognizer;
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Transcribes every WAV in a dataset directory into a fresh manifest.
/// Entries are streamed and flushed one line at a time; files whose
/// recognition fails or comes back empty are skipped.
pub async fn transcribe_directory(
    recognizer: &dyn SpeechRecognizer,
    audio_dir: &Path,
    output: &Path,
    language: &str,
    speaker: &str,
) -> Result<usize> {
    let audio_files = list_wav_files(audio_dir);
    info!(
        "Found {} WAV files in {}",
        audio_files.len(),
        audio_dir.display()
    );
    if audio_files.is_empty() {
        bail!("No audio files found in {}", audio_dir.display());
    }

    let mut writer = ManifestWriter::create(output)?;
    let pb = progress_bar(audio_files.len() as u64)?;

    for audio_path in &audio_files {
        pb.inc(1);
        let transcription = match recognizer.transcribe(audio_path, language).await {
            Ok(t) => t,
            Err(e) => {
                warn!("Error processing {}: {}", audio_path.display(), e);
                continue;
            }
        };
        if transcription.text.is_empty() {
            debug!("Empty transcription for {}, dropping", audio_path.display());
            continue;
        }

        let stem = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let absolute = fs::canonicalize(audio_path)
            .with_context(|| format!("Failed to resolve {}", audio_path.display()))?;

        writer.write(&ManifestEntry {
            id: format!("{}_{}", speaker, stem),
            text: transcription.text,
            audio: absolute.to_string_lossy().to_string(),
            speaker: speaker.to_string(),
            language: language.to_string(),
            duration: transcription.duration,
        })?;
    }
    pb.finish_and_clear();

    info!("Manifest saved to {}", output.display());
    Ok(writer.count())
}

/// Re-transcribes an existing manifest (typically one with placeholder
/// text), resolving relative audio paths against `audio_base`, skipping
/// entries whose audio is missing, and streaming the updated entries to
/// `output`.
pub async fn transcribe_manifest(
    recognizer: &dyn SpeechRecognizer,
    input: &Path,
    output: &Path,
    audio_base: Option<&Path>,
    language: &str,
) -> Result<usize> {
    let entries = read_manifest(input)?;
    info!("Processing {} entries from {}", entries.len(), input.display());

    let mut writer = ManifestWriter::create(output)?;
    let pb = progress_bar(entries.len() as u64)?;

    for mut entry in entries {
        pb.inc(1);
        let audio_path = resolve_audio_path(&entry.audio, audio_base);
        if !audio_path.exists() {
            warn!("Audio file not found: {}", audio_path.display());
            continue;
        }

        let transcription = match recognizer.transcribe(&audio_path, language).await {
            Ok(t) => t,
            Err(e) => {
                warn!("Error transcribing {}: {}", audio_path.display(), e);
                continue;
            }
        };

        let absolute = fs::canonicalize(&audio_path)
            .with_context(|| format!("Failed to resolve {}", audio_path.display()))?;
        entry.text = transcription.text;
        entry.audio = absolute.to_string_lossy().to_string();
        writer.write(&entry)?;
    }
    pb.finish_and_clear();

    info!("Saved to {}", output.display());
    Ok(writer.count())
}

fn resolve_audio_path(audio: &str, audio_base: Option<&Path>) -> PathBuf {
    let path = Path::new(audio);
    match audio_base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}
