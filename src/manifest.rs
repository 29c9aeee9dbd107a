use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Placeholder transcript used by `collect` until the real transcription
/// pass runs. `transcribe-manifest` replaces it.
pub const PLACEHOLDER_TEXT: &str = "[pending transcription]";

/// One utterance, stored as one JSON object per line of a manifest file.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ManifestEntry {
    pub id: String,
    pub text: String,
    pub audio: String,
    pub speaker: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl ManifestEntry {
    pub fn is_placeholder(&self) -> bool {
        self.text == PLACEHOLDER_TEXT
    }
}

/// Provenance record written next to a mixed dataset.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MixManifest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sources: Vec<String>,
    pub gender: String,
    pub sample_count: usize,
}

/// Side file written just before a checkpoint upload.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CheckpointMetadata {
    pub id: String,
    pub gender: String,
    pub checkpoint: String,
    pub uploaded_at: String,
    pub size_bytes: u64,
}

/// Reads a newline-delimited manifest, skipping blank lines.
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open manifest {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut entries = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: ManifestEntry = serde_json::from_str(&line).with_context(|| {
            format!("Malformed manifest line {} in {}", lineno + 1, path.display())
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Streaming manifest writer. Every entry is flushed as soon as it is
/// written, so a crash partway through a run keeps all completed lines.
pub struct ManifestWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    count: usize,
}

impl ManifestWriter {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create manifest {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            count: 0,
        })
    }

    pub fn write(&mut self, entry: &ManifestEntry) -> Result<()> {
        serde_json::to_writer(&mut self.writer, entry)?;
        self.writer.write_all(b"\n")?;
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush manifest {}", self.path.display()))?;
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }
}
