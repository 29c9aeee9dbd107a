use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lora-factory")]
#[command(about = "Dataset preparation and orchestration for voice LoRA training")]
pub struct Cli {
    /// Optional YAML config file; missing file means built-in defaults
    #[arg(long, global = true, default_value = "config.yml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest every cataloged character through the per-character routine
    BatchIngest {
        /// Path to the character catalog
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Base output directory for standardized datasets
        #[arg(long)]
        output_base: Option<PathBuf>,

        /// Filter by gender
        #[arg(long, value_parser = ["f", "m"])]
        gender: Option<String>,

        /// Filter by game (e.g. genshin, zzz)
        #[arg(long)]
        game: Option<String>,

        /// Filter by language (e.g. jp, en)
        #[arg(long)]
        lang: Option<String>,

        /// Specific character IDs to process
        #[arg(long, num_args = 1..)]
        chars: Option<Vec<String>>,

        /// Preview without processing
        #[arg(long)]
        dry_run: bool,

        /// Limit number of characters to process
        #[arg(long)]
        limit: Option<usize>,

        /// Per-character timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Ingest and standardize one character's raw voice files
    Ingest {
        /// Folder containing raw wav/mp3/flac/ogg files
        #[arg(long)]
        input_dir: PathBuf,

        /// Game prefix (e.g. zzz, gen)
        #[arg(long)]
        game: String,

        /// Character name (e.g. anbi, hutao)
        #[arg(long = "char")]
        character: String,

        /// Gender
        #[arg(long, value_parser = ["f", "m"])]
        gender: String,

        /// Language code (e.g. jp, en)
        #[arg(long)]
        lang: String,

        /// Base data directory
        #[arg(long)]
        output_base: Option<PathBuf>,
    },

    /// Copy matching raw voice files and write a placeholder manifest
    Collect {
        /// Source directory with extracted audio
        #[arg(long)]
        src: PathBuf,

        /// Destination directory for filtered audio
        #[arg(long)]
        dest: PathBuf,

        /// Output manifest path (written with a .temp.jsonl suffix)
        #[arg(long)]
        manifest: PathBuf,

        /// Character name tokens to filter filenames by
        #[arg(long, num_args = 1..)]
        chars: Option<Vec<String>>,

        /// Speaker identifier for manifest entries
        #[arg(long)]
        speaker: String,

        /// Audio language
        #[arg(long, default_value = "ja")]
        language: String,
    },

    /// Transcribe a directory of WAV files into a fresh manifest
    Transcribe {
        /// Directory of WAV files
        #[arg(long)]
        audio_dir: PathBuf,

        /// Output manifest path
        #[arg(long)]
        output: PathBuf,

        /// Audio language (ja, en)
        #[arg(long, default_value = "ja")]
        language: String,

        /// Speaker identifier
        #[arg(long)]
        speaker: String,
    },

    /// Re-transcribe an existing manifest, resolving relative audio paths
    TranscribeManifest {
        /// Input manifest
        #[arg(long)]
        input: PathBuf,

        /// Output manifest
        #[arg(long)]
        output: PathBuf,

        /// Base directory for audio files referenced by relative path
        #[arg(long)]
        audio_dir: Option<PathBuf>,

        /// Audio language
        #[arg(long, default_value = "ja")]
        language: String,
    },

    /// Convert a pipe-delimited path|text list into a manifest
    Convert {
        /// Input list file
        #[arg(long)]
        input: PathBuf,

        /// Output manifest path
        #[arg(long)]
        output: PathBuf,

        /// Audio language
        #[arg(long, default_value = "en")]
        language: String,

        /// Speaker identifier
        #[arg(long)]
        speaker: String,
    },

    /// Mix audio from several datasets into a hybrid dataset
    Mix {
        /// Source character IDs to mix
        #[arg(long, num_args = 1.., required = true)]
        sources: Vec<String>,

        /// Output mixed dataset ID
        #[arg(long)]
        output: String,

        /// Base data directory
        #[arg(long)]
        data_base: Option<PathBuf>,

        /// Character catalog path
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Mix ratio (e.g. 50:50, 60:40)
        #[arg(long, default_value = "50:50")]
        ratio: String,

        /// Maximum total samples (0 = use all)
        #[arg(long, default_value_t = 0)]
        max_samples: usize,

        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Skip gender validation
        #[arg(long)]
        skip_validation: bool,
    },

    /// Upload the latest checkpoint to cold storage
    Upload {
        /// Character ID (e.g. gen_ayaka_f_jp)
        character_id: String,

        /// Base checkpoints directory
        #[arg(long)]
        checkpoints_dir: Option<PathBuf>,

        /// Storage bucket name
        #[arg(long)]
        bucket: Option<String>,

        /// Client alias (auto-detect if omitted)
        #[arg(long)]
        alias: Option<String>,

        /// Delete intermediate checkpoints after upload
        #[arg(long)]
        cleanup: bool,

        /// Preview without uploading or deleting
        #[arg(long)]
        dry_run: bool,
    },
}
