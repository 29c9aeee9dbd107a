use super::{SpeechRecognizer, Transcription};
use crate::audio::truncate;
use crate::config::WhisperConfig;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::Command;

/// Drives the `whisper` CLI once per audio file. The preferred device is
/// tried first; after one device failure the rest of the run sticks to cpu,
/// mirroring the load-time fallback of the original tool.
pub struct WhisperCli {
    binary: String,
    model: String,
    device: String,
    cpu_fallback: AtomicBool,
    work_dir: PathBuf,
}

#[derive(Deserialize)]
struct WhisperOutput {
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Deserialize)]
struct WhisperSegment {
    end: f64,
}

impl WhisperCli {
    pub fn new(config: &WhisperConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            model: config.model.clone(),
            device: config.device.clone(),
            cpu_fallback: AtomicBool::new(false),
            work_dir: std::env::temp_dir()
                .join(format!("lora-factory-whisper-{}", std::process::id())),
        }
    }

    fn device(&self) -> &str {
        if self.cpu_fallback.load(Ordering::Relaxed) {
            "cpu"
        } else {
            &self.device
        }
    }

    async fn run(&self, audio: &Path, language: &str, device: &str) -> Result<WhisperOutput> {
        fs::create_dir_all(&self.work_dir)?;

        let output = Command::new(&self.binary)
            .arg(audio)
            .args(["--model", self.model.as_str()])
            .args(["--device", device])
            .args(["--language", language])
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .arg(&self.work_dir)
            .args(["--verbose", "False"])
            .output()
            .await
            .with_context(|| format!("Failed to run {} (is it installed?)", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} failed on {}: {}",
                self.binary,
                audio.display(),
                truncate(stderr.trim(), 200)
            );
        }

        let stem = audio
            .file_stem()
            .ok_or_else(|| anyhow!("No file stem for {}", audio.display()))?;
        let json_path = self.work_dir.join(stem).with_extension("json");
        let content = fs::read_to_string(&json_path)
            .with_context(|| format!("Missing whisper output {}", json_path.display()))?;
        let _ = fs::remove_file(&json_path);

        let parsed: WhisperOutput = serde_json::from_str(&content)
            .with_context(|| format!("Malformed whisper output {}", json_path.display()))?;
        Ok(parsed)
    }
}

#[async_trait]
impl SpeechRecognizer for WhisperCli {
    async fn transcribe(&self, audio: &Path, language: &str) -> Result<Transcription> {
        let device = self.device().to_string();
        let result = match self.run(audio, language, &device).await {
            Ok(output) => output,
            Err(e) if device != "cpu" => {
                warn!("Recognition failed on {}, falling back to cpu: {}", device, e);
                self.cpu_fallback.store(true, Ordering::Relaxed);
                self.run(audio, language, "cpu").await?
            }
            Err(e) => return Err(e),
        };

        Ok(Transcription {
            text: result.text.trim().to_string(),
            duration: result.segments.last().map(|s| s.end),
        })
    }
}
