use crate::audio::truncate;
use crate::catalog::{filter_characters, Catalog, CharacterFilter};
use anyhow::Result;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// How one child unit of work ended.
#[derive(Debug)]
pub enum ChildOutcome {
    Success,
    /// Non-zero exit; carries truncated stderr.
    Failed(String),
    TimedOut,
    /// The child could not be spawned or awaited at all.
    SpawnError(String),
}

/// Runs a child command bounded by a wall-clock deadline. The child is
/// killed when the deadline expires.
pub async fn run_child(mut command: Command, deadline: Duration) -> ChildOutcome {
    command.kill_on_drop(true);
    match timeout(deadline, command.output()).await {
        Ok(Ok(output)) => {
            if output.status.success() {
                ChildOutcome::Success
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                ChildOutcome::Failed(truncate(stderr.trim(), 200).to_string())
            }
        }
        Ok(Err(e)) => ChildOutcome::SpawnError(e.to_string()),
        Err(_) => ChildOutcome::TimedOut,
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub success: usize,
    pub failed: usize,
}

/// Drives the per-character ingestion routine out-of-process for every
/// filtered catalog entry. Any per-character failure is counted and the
/// batch continues.
pub struct BatchDriver {
    /// Binary to spawn; the tool's own executable in production, a stand-in
    /// in tests.
    program: PathBuf,
    config_path: PathBuf,
    output_base: PathBuf,
    deadline: Duration,
    dry_run: bool,
}

impl BatchDriver {
    pub fn new(
        program: PathBuf,
        config_path: PathBuf,
        output_base: PathBuf,
        deadline: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            program,
            config_path,
            output_base,
            deadline,
            dry_run,
        }
    }

    pub async fn run(&self, catalog: &Catalog, filter: &CharacterFilter) -> Result<BatchReport> {
        let filtered = filter_characters(&catalog.characters, filter);
        println!("Processing {} characters", filtered.len());
        if self.dry_run {
            println!("DRY RUN MODE");
        }

        let mut report = BatchReport::default();
        for character in &filtered {
            let source_path = Path::new(&catalog.source_base).join(&character.source);
            if self.ingest_one(character, &source_path).await {
                report.success += 1;
            } else {
                report.failed += 1;
            }
        }
        Ok(report)
    }

    async fn ingest_one(&self, character: &crate::catalog::Character, source_path: &Path) -> bool {
        if !source_path.exists() {
            warn!("Source not found: {}", source_path.display());
            return false;
        }

        let args = self.ingest_args(character, source_path);
        info!("-> {}: {}", character.id, source_path.display());

        if self.dry_run {
            println!(
                "  [DRY RUN] Would run: {} {}",
                self.program.display(),
                args.join(" ")
            );
            return true;
        }

        let mut command = Command::new(&self.program);
        command.args(&args);
        match run_child(command, self.deadline).await {
            ChildOutcome::Success => {
                info!("{}: success", character.id);
                true
            }
            ChildOutcome::Failed(stderr) => {
                error!("{}: error: {}", character.id, stderr);
                false
            }
            ChildOutcome::TimedOut => {
                error!("{}: timeout", character.id);
                false
            }
            ChildOutcome::SpawnError(e) => {
                error!("{}: exception: {}", character.id, e);
                false
            }
        }
    }

    fn ingest_args(&self, character: &crate::catalog::Character, source_path: &Path) -> Vec<String> {
        vec![
            "ingest".to_string(),
            "--config".to_string(),
            self.config_path.to_string_lossy().to_string(),
            "--input-dir".to_string(),
            source_path.to_string_lossy().to_string(),
            "--game".to_string(),
            character.game.clone(),
            "--char".to_string(),
            character.name.to_lowercase().replace(' ', ""),
            "--gender".to_string(),
            character.gender.clone(),
            "--lang".to_string(),
            character.lang.clone(),
            "--output-base".to_string(),
            self.output_base.to_string_lossy().to_string(),
        ]
    }
}
