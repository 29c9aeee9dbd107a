use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use lora_factory::batch::BatchDriver;
use lora_factory::catalog::{Catalog, CharacterFilter};
use lora_factory::cli::{Cli, Commands};
use lora_factory::config::Config;
use lora_factory::{convert, ingest, mixer, stt, transcribe, upload};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::BatchIngest {
            catalog,
            output_base,
            gender,
            game,
            lang,
            chars,
            dry_run,
            limit,
            timeout,
        } => {
            let catalog_path = catalog.unwrap_or_else(|| PathBuf::from(&config.catalog));
            if !catalog_path.exists() {
                bail!("Catalog not found: {}", catalog_path.display());
            }
            let catalog = Catalog::load(&catalog_path)?;
            println!("Loaded catalog: {} characters", catalog.characters.len());
            println!("Source base: {}", catalog.source_base);

            let filter = CharacterFilter {
                gender,
                game,
                lang,
                ids: chars,
                limit,
            };
            let driver = BatchDriver::new(
                std::env::current_exe().context("Failed to locate own executable")?,
                cli.config.clone(),
                output_base.unwrap_or_else(|| PathBuf::from(&config.data_base)),
                Duration::from_secs(timeout.unwrap_or(config.ingest.timeout_secs)),
                dry_run,
            );
            let report = driver.run(&catalog, &filter).await?;
            println!("Success: {}", report.success);
            println!("Failed: {}", report.failed);
        }

        Commands::Ingest {
            input_dir,
            game,
            character,
            gender,
            lang,
            output_base,
        } => {
            let std_id = format!(
                "{}_{}_{}_{}",
                game,
                character.to_lowercase().replace(' ', ""),
                gender,
                lang
            );
            let output_base = output_base.unwrap_or_else(|| PathBuf::from(&config.data_base));
            let outcome =
                ingest::ingest_character(&input_dir, &std_id, &output_base, &config.ingest)?;
            println!(
                "Successfully processed: {}/{}",
                outcome.processed, outcome.found
            );
            println!(
                "Ready for transcription/training at: {}",
                output_base.join(&std_id).display()
            );
        }

        Commands::Collect {
            src,
            dest,
            manifest,
            chars,
            speaker,
            language,
        } => {
            let outcome = ingest::collect_voices(
                &src,
                &dest,
                &manifest,
                &chars.unwrap_or_default(),
                &speaker,
                &language,
            )?;
            println!(
                "Copied {} of {} matching files",
                outcome.copied, outcome.matched
            );
            println!(
                "Created partial manifest at {} ({} entries)",
                outcome.manifest.display(),
                outcome.entries
            );
        }

        Commands::Transcribe {
            audio_dir,
            output,
            language,
            speaker,
        } => {
            let recognizer = stt::create_recognizer(&config.whisper);
            let count = transcribe::transcribe_directory(
                recognizer.as_ref(),
                &audio_dir,
                &output,
                &language,
                &speaker,
            )
            .await?;
            println!("Manifest saved to {} ({} entries)", output.display(), count);
        }

        Commands::TranscribeManifest {
            input,
            output,
            audio_dir,
            language,
        } => {
            let recognizer = stt::create_recognizer(&config.whisper);
            let count = transcribe::transcribe_manifest(
                recognizer.as_ref(),
                &input,
                &output,
                audio_dir.as_deref(),
                &language,
            )
            .await?;
            println!("Done, saved {} entries to {}", count, output.display());
        }

        Commands::Convert {
            input,
            output,
            language,
            speaker,
        } => {
            let count = convert::convert_list(&input, &output, &language, &speaker)?;
            println!("Wrote {} entries to {}", count, output.display());
        }

        Commands::Mix {
            sources,
            output,
            data_base,
            catalog,
            ratio,
            max_samples,
            seed,
            skip_validation,
        } => {
            let data_base = data_base.unwrap_or_else(|| PathBuf::from(&config.data_base));
            let catalog_path = catalog.unwrap_or_else(|| PathBuf::from(&config.catalog));
            let ratio = mixer::parse_ratio(&ratio, sources.len())?;

            println!("Voice Mixer");
            println!("  Sources: {:?}", sources);
            println!("  Output: {}", output);
            println!("  Ratio: {:?}", ratio);

            let gender = if !skip_validation && catalog_path.exists() {
                let catalog = Catalog::load(&catalog_path)?;
                let gender = mixer::validate_same_gender(&sources, &catalog)
                    .context("Use --skip-validation to override")?;
                println!("Gender validated: {}", gender);
                gender
            } else {
                println!("Skipping gender validation");
                "unknown".to_string()
            };

            let total = mixer::mix_datasets(&mixer::MixOptions {
                sources: sources.clone(),
                output_id: output.clone(),
                data_base: data_base.clone(),
                ratio,
                max_samples,
                seed,
            })?;
            let manifest_path = mixer::write_mix_manifest(&sources, &output, &data_base, &gender)?;
            println!("Manifest saved: {}", manifest_path.display());
            println!("Created {} with {} samples", output, total);
            println!("Location: {}", data_base.join(&output).display());
        }

        Commands::Upload {
            character_id,
            checkpoints_dir,
            bucket,
            alias,
            cleanup,
            dry_run,
        } => {
            let base = checkpoints_dir.unwrap_or_else(|| PathBuf::from(&config.checkpoints_dir));
            let checkpoint_dir = base.join(&character_id);
            if !checkpoint_dir.exists() {
                bail!("Directory not found: {}", checkpoint_dir.display());
            }

            let mut storage = config.storage.clone();
            if let Some(bucket) = bucket {
                storage.bucket = bucket;
            }
            let alias = alias
                .or_else(|| (!storage.alias.is_empty()).then(|| storage.alias.clone()))
                .unwrap_or_else(|| upload::detect_alias(&storage.binary));

            println!("Upload to cold storage");
            println!("  Character: {}", character_id);
            println!("  Source: {}", checkpoint_dir.display());
            println!("  Bucket: {}", storage.bucket);
            println!("  Alias: {}", alias);

            upload::upload_checkpoint(&checkpoint_dir, &character_id, &storage, &alias, dry_run)?;

            if cleanup {
                println!("Cleanup");
                upload::cleanup_local(&checkpoint_dir, dry_run)?;
            }
        }
    }

    Ok(())
}
