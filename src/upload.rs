use crate::audio::truncate;
use crate::config::StorageConfig;
use crate::manifest::CheckpointMetadata;
use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Checkpoint files named `model_step{N}.pth`, sorted by step so the last
/// element is the most recent. Numeric-aware: `step100` outranks `step50`,
/// which a plain string sort gets wrong.
pub fn find_checkpoints(dir: &Path) -> Vec<(u64, PathBuf)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut checkpoints: Vec<(u64, PathBuf)> = entries
        .flatten()
        .map(|e| e.path())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let step = name
                .strip_prefix("model_step")?
                .strip_suffix(".pth")?
                .parse::<u64>()
                .ok()?;
            Some((step, path))
        })
        .collect();
    checkpoints.sort();
    checkpoints
}

/// Storage bucket from the `{game}_{name}_{f|m}_{lang}` naming convention.
pub fn gender_bucket(char_id: &str) -> &'static str {
    let parts: Vec<&str> = char_id.split('_').collect();
    if parts.len() >= 3 {
        match parts[parts.len() - 2] {
            "f" => return "female",
            "m" => return "male",
            _ => {}
        }
    }
    "unknown"
}

/// Detects a configured client alias via `mc alias ls`, preferring `minio`
/// and falling back to `local`.
pub fn detect_alias(binary: &str) -> String {
    let output = Command::new(binary).args(["alias", "ls"]).output();
    if let Ok(output) = output {
        if String::from_utf8_lossy(&output.stdout).contains("minio") {
            return "minio".to_string();
        }
    }
    "local".to_string()
}

fn storage_copy(binary: &str, src: &Path, dst: &str) -> Result<()> {
    let output = Command::new(binary)
        .arg("cp")
        .arg(src)
        .arg(dst)
        .output()
        .with_context(|| format!("Failed to run {} (is it installed?)", binary))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("Upload failed: {}", truncate(stderr.trim(), 200));
    }
    Ok(())
}

pub fn build_metadata(char_id: &str, checkpoint: &Path) -> Result<CheckpointMetadata> {
    let size_bytes = fs::metadata(checkpoint)
        .with_context(|| format!("Failed to stat {}", checkpoint.display()))?
        .len();
    Ok(CheckpointMetadata {
        id: char_id.to_string(),
        gender: gender_bucket(char_id).to_string(),
        checkpoint: checkpoint
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        uploaded_at: chrono::Utc::now().to_rfc3339(),
        size_bytes,
    })
}

/// Uploads the latest checkpoint plus a metadata side file to
/// `{alias}/{bucket}/{gender}/{char_id}/`. Either copy failing aborts.
pub fn upload_checkpoint(
    checkpoint_dir: &Path,
    char_id: &str,
    storage: &StorageConfig,
    alias: &str,
    dry_run: bool,
) -> Result<()> {
    let checkpoints = find_checkpoints(checkpoint_dir);
    let Some((_, latest)) = checkpoints.last() else {
        bail!("No checkpoints found in {}", checkpoint_dir.display());
    };

    let metadata = build_metadata(char_id, latest)?;
    info!(
        "Latest checkpoint: {} ({:.2} GB)",
        metadata.checkpoint,
        metadata.size_bytes as f64 / 1e9
    );

    let remote_prefix = format!("{}/{}/{}/{}/", alias, storage.bucket, metadata.gender, char_id);

    let metadata_file = checkpoint_dir.join("metadata.json");
    fs::write(&metadata_file, serde_json::to_string_pretty(&metadata)?)
        .with_context(|| format!("Failed to write {}", metadata_file.display()))?;

    if dry_run {
        println!("[DRY RUN] Would upload to: {}", remote_prefix);
        println!("  - {}", metadata.checkpoint);
        println!("  - metadata.json");
        return Ok(());
    }

    info!("Uploading to {}", remote_prefix);
    storage_copy(&storage.binary, latest, &format!("{}model.pth", remote_prefix))?;
    storage_copy(
        &storage.binary,
        &metadata_file,
        &format!("{}metadata.json", remote_prefix),
    )
    .context("Metadata upload failed")?;

    println!("Uploaded to {}", remote_prefix);
    Ok(())
}

/// Deletes every checkpoint except the most recent, returning bytes freed.
/// Run only after a successful upload.
pub fn cleanup_local(checkpoint_dir: &Path, dry_run: bool) -> Result<u64> {
    let checkpoints = find_checkpoints(checkpoint_dir);
    let to_delete = if checkpoints.len() > 1 {
        &checkpoints[..checkpoints.len() - 1]
    } else {
        &checkpoints[..0]
    };

    let mut freed = 0;
    for (_, path) in to_delete {
        let size = fs::metadata(path)?.len();
        if dry_run {
            println!(
                "[DRY RUN] Would delete: {} ({:.2} GB)",
                path.display(),
                size as f64 / 1e9
            );
        } else {
            fs::remove_file(path)
                .with_context(|| format!("Failed to delete {}", path.display()))?;
            info!("Deleted: {}", path.display());
        }
        freed += size;
    }

    if freed > 0 {
        println!("Freed: {:.2} GB", freed as f64 / 1e9);
    } else {
        warn!("Nothing to clean up in {}", checkpoint_dir.display());
    }
    Ok(freed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_checkpoint_is_numeric_aware() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["model_step100.pth", "model_step50.pth", "model_step9.pth"] {
            fs::write(dir.path().join(name), b"ckpt")?;
        }

        let checkpoints = find_checkpoints(dir.path());
        assert_eq!(checkpoints.len(), 3);
        let (step, latest) = checkpoints.last().unwrap();
        assert_eq!(*step, 100);
        assert_eq!(
            latest.file_name().unwrap().to_string_lossy(),
            "model_step100.pth"
        );
        Ok(())
    }

    #[test]
    fn test_non_checkpoint_files_are_ignored() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("model_step10.pth"), b"ckpt")?;
        fs::write(dir.path().join("optimizer_step20.pth"), b"x")?;
        fs::write(dir.path().join("model_stepABC.pth"), b"x")?;
        fs::write(dir.path().join("metadata.json"), b"{}")?;

        let checkpoints = find_checkpoints(dir.path());
        assert_eq!(checkpoints.len(), 1);
        assert_eq!(checkpoints[0].0, 10);
        Ok(())
    }

    #[test]
    fn test_missing_dir_has_no_checkpoints() {
        assert!(find_checkpoints(Path::new("no/such/dir")).is_empty());
    }

    #[test]
    fn test_gender_bucket() {
        assert_eq!(gender_bucket("gen_ayaka_f_jp"), "female");
        assert_eq!(gender_bucket("zzz_lycaon_m_jp"), "male");
        assert_eq!(gender_bucket("gen_ayaka_x_jp"), "unknown");
        assert_eq!(gender_bucket("noformat"), "unknown");
        assert_eq!(gender_bucket("a_b"), "unknown");
    }

    #[test]
    fn test_build_metadata() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let ckpt = dir.path().join("model_step500.pth");
        fs::write(&ckpt, vec![0u8; 1234])?;

        let metadata = build_metadata("gen_ayaka_f_jp", &ckpt)?;
        assert_eq!(metadata.id, "gen_ayaka_f_jp");
        assert_eq!(metadata.gender, "female");
        assert_eq!(metadata.checkpoint, "model_step500.pth");
        assert_eq!(metadata.size_bytes, 1234);
        // RFC 3339 with a date/time separator.
        assert!(metadata.uploaded_at.contains('T'));
        Ok(())
    }

    #[test]
    fn test_upload_dry_run_writes_metadata_only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("model_step10.pth"), b"ckpt")?;

        let storage = StorageConfig::default();
        upload_checkpoint(dir.path(), "gen_ayaka_f_jp", &storage, "minio", true)?;

        let metadata_path = dir.path().join("metadata.json");
        assert!(metadata_path.exists());
        let metadata: CheckpointMetadata =
            serde_json::from_str(&fs::read_to_string(metadata_path)?)?;
        assert_eq!(metadata.checkpoint, "model_step10.pth");
        Ok(())
    }

    #[test]
    fn test_upload_without_checkpoints_fails() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = StorageConfig::default();
        let result = upload_checkpoint(dir.path(), "gen_ayaka_f_jp", &storage, "minio", true);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_cleanup_keeps_only_latest() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("model_step9.pth"), vec![0u8; 10])?;
        fs::write(dir.path().join("model_step50.pth"), vec![0u8; 20])?;
        fs::write(dir.path().join("model_step100.pth"), vec![0u8; 30])?;

        // Dry run reports but deletes nothing.
        let freed = cleanup_local(dir.path(), true)?;
        assert_eq!(freed, 30);
        assert_eq!(find_checkpoints(dir.path()).len(), 3);

        let freed = cleanup_local(dir.path(), false)?;
        assert_eq!(freed, 30);
        let remaining = find_checkpoints(dir.path());
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, 100);
        Ok(())
    }

    #[test]
    fn test_cleanup_single_checkpoint_is_untouched() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("model_step10.pth"), vec![0u8; 10])?;

        let freed = cleanup_local(dir.path(), false)?;
        assert_eq!(freed, 0);
        assert_eq!(find_checkpoints(dir.path()).len(), 1);
        Ok(())
    }
}
