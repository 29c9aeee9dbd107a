use anyhow::{bail, Context, Result};
use hound::{WavReader, WavSpec, WavWriter};
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const AUDIO_EXTENSIONS: [&str; 4] = ["wav", "mp3", "flac", "ogg"];

/// Recursively collects audio files under `root`, sorted for deterministic
/// numbering across runs.
pub fn discover_audio_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_audio_files(root, &mut files)
        .with_context(|| format!("Failed to scan {}", root.display()))?;
    files.sort();
    Ok(files)
}

fn collect_audio_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_audio_files(&path, files)?;
        } else if has_audio_extension(&path) {
            files.push(path);
        }
    }
    Ok(())
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str())
        })
}

/// Flat, sorted listing of `*.wav` in a dataset directory. Absent directory
/// yields an empty list; callers decide whether that is fatal.
pub fn list_wav_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("wav")
        })
        .collect();
    files.sort();
    files
}

/// Decodes any supported input, downmixes to mono and resamples, then trims
/// leading/trailing silence. ffmpeg does the decoding; the trim runs on the
/// intermediate WAV.
pub fn process_audio(
    input: &Path,
    output: &Path,
    sample_rate: u32,
    trim_db: f32,
) -> Result<()> {
    let intermediate = output.with_extension("tmp.wav");

    let result = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(input)
        .args(["-ac", "1", "-ar"])
        .arg(sample_rate.to_string())
        .args(["-c:a", "pcm_s16le"])
        .arg(&intermediate)
        .output()
        .context("Failed to run ffmpeg (is it installed?)")?;

    if !result.status.success() {
        let _ = fs::remove_file(&intermediate);
        let stderr = String::from_utf8_lossy(&result.stderr);
        bail!(
            "ffmpeg failed on {}: {}",
            input.display(),
            truncate(stderr.trim(), 200)
        );
    }

    let trim_result = trim_silence_file(&intermediate, output, trim_db);
    let _ = fs::remove_file(&intermediate);
    trim_result
}

/// Rewrites a 16-bit WAV with leading/trailing samples quieter than
/// `trim_db` below the file's peak removed.
pub fn trim_silence_file(input: &Path, output: &Path, trim_db: f32) -> Result<()> {
    let mut reader = WavReader::open(input)
        .with_context(|| format!("Failed to open WAV {}", input.display()))?;
    let spec = reader.spec();
    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Failed to decode WAV {}", input.display()))?;

    let trimmed = trim_silence(&samples, trim_db);

    let mut writer = WavWriter::create(output, spec)
        .with_context(|| format!("Failed to create WAV {}", output.display()))?;
    for &sample in trimmed {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Returns the sub-slice with leading/trailing samples below
/// `peak * 10^(-trim_db / 20)` removed. All-silent input trims to nothing.
pub fn trim_silence(samples: &[i16], trim_db: f32) -> &[i16] {
    let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
    if peak == 0 {
        return &[];
    }
    let threshold = (peak as f32 * 10f32.powf(-trim_db / 20.0)) as u16;

    let first = samples.iter().position(|s| s.unsigned_abs() >= threshold);
    let last = samples.iter().rposition(|s| s.unsigned_abs() >= threshold);
    match (first, last) {
        (Some(first), Some(last)) => &samples[first..=last],
        _ => &[],
    }
}

pub fn wav_duration_seconds(path: &Path) -> Result<f64> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV {}", path.display()))?;
    let spec = reader.spec();
    let frames = reader.len() as f64 / spec.channels as f64;
    Ok(frames / spec.sample_rate as f64)
}

/// Copies `src` to `dst` unless `dst` already exists with the same size.
/// Returns whether a copy actually happened.
pub fn copy_if_changed(src: &Path, dst: &Path) -> Result<bool> {
    if dst.exists() {
        let src_len = fs::metadata(src)?.len();
        let dst_len = fs::metadata(dst)?.len();
        if src_len == dst_len {
            return Ok(false);
        }
        warn!(
            "Size mismatch for existing {}, re-copying",
            dst.display()
        );
    }
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(true)
}

pub fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_trim_silence_strips_both_ends() {
        // Quiet edges around a loud middle: peak 10000, threshold at
        // 20 dB below peak is 1000, so the 50s go.
        let samples = vec![50, 50, 10000, 8000, 50, 50];
        let trimmed = trim_silence(&samples, 20.0);
        assert_eq!(trimmed, &[10000, 8000]);
    }

    #[test]
    fn test_trim_silence_keeps_interior_quiet_samples() {
        let samples = vec![0, 10000, 10, 10000, 0];
        let trimmed = trim_silence(&samples, 20.0);
        assert_eq!(trimmed, &[10000, 10, 10000]);
    }

    #[test]
    fn test_trim_silence_all_zero() {
        let samples = vec![0i16; 16];
        assert!(trim_silence(&samples, 20.0).is_empty());
    }

    #[test]
    fn test_trim_silence_file_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        write_wav(&input, &[0, 0, 12000, -9000, 0], 24000);

        trim_silence_file(&input, &output, 20.0)?;

        let mut reader = WavReader::open(&output)?;
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![12000, -9000]);
        assert_eq!(reader.spec().sample_rate, 24000);
        Ok(())
    }

    #[test]
    fn test_wav_duration() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a.wav");
        write_wav(&path, &vec![100i16; 24000], 24000);
        let dur = wav_duration_seconds(&path)?;
        assert!((dur - 1.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_discover_is_recursive_case_insensitive_and_sorted() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("nested/deep"))?;
        fs::write(dir.path().join("b.wav"), b"x")?;
        fs::write(dir.path().join("a.MP3"), b"x")?;
        fs::write(dir.path().join("nested/c.flac"), b"x")?;
        fs::write(dir.path().join("nested/deep/d.ogg"), b"x")?;
        fs::write(dir.path().join("notes.txt"), b"x")?;

        let files = discover_audio_files(dir.path())?;
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.MP3", "b.wav", "c.flac", "d.ogg"]);
        Ok(())
    }

    #[test]
    fn test_list_wav_files_missing_dir_is_empty() {
        assert!(list_wav_files(Path::new("no/such/dir")).is_empty());
    }

    #[test]
    fn test_copy_if_changed_skips_identical_size() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let src = dir.path().join("src.wav");
        let dst = dir.path().join("dst.wav");
        fs::write(&src, b"12345")?;

        assert!(copy_if_changed(&src, &dst)?);
        assert!(!copy_if_changed(&src, &dst)?);

        fs::write(&src, b"1234567")?;
        assert!(copy_if_changed(&src, &dst)?);
        assert_eq!(fs::read(&dst)?, b"1234567");
        Ok(())
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("こんにちは", 2), "こん");
    }
}
