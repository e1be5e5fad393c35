//! Snapmatch CLI — upload event photos, index faces, and search by selfie.
//!
//! Set SNAPMATCH_BUCKET and AWS_REGION (plus the usual AWS credential
//! variables). SNAPMATCH_S3_ENDPOINT points at an S3-compatible provider
//! such as MinIO.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use snapmatch_cli::{content_type_for, init_tracing};
use snapmatch_core::config::{IndexingConfig, SearchConfig, UploadConfig};
use snapmatch_core::models::SourceFile;
use snapmatch_core::naming::shared_image_prefix;
use snapmatch_media::Normalizer;
use snapmatch_pipeline::{BatchProgress, FaceIndexer, FaceMatcher, UploadOrchestrator};
use snapmatch_recognition::RekognitionFaceIndex;
use snapmatch_storage::{BlobStore, S3BlobStore};

#[derive(Parser)]
#[command(name = "snapmatch", about = "Event photo upload and face search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload every file in a directory as one batch for an event
    Upload {
        /// Directory of photos to upload
        dir: PathBuf,
        /// Event identifier
        #[arg(long)]
        event: String,
    },
    /// Index every stored image of an event into its face collection
    Index {
        /// Event identifier
        #[arg(long)]
        event: String,
    },
    /// Store a selfie and search the event's faces with it
    Search {
        /// Path to the selfie image
        selfie: PathBuf,
        /// Event identifier
        #[arg(long)]
        event: String,
        /// Attendee user identifier
        #[arg(long)]
        user: String,
    },
}

struct Backends {
    store: Arc<S3BlobStore>,
    faces: Arc<RekognitionFaceIndex>,
}

async fn backends_from_env() -> anyhow::Result<Backends> {
    let bucket = std::env::var("SNAPMATCH_BUCKET").context("SNAPMATCH_BUCKET is not set")?;
    let region = std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
    let endpoint = std::env::var("SNAPMATCH_S3_ENDPOINT").ok();

    let store = S3BlobStore::new(bucket.clone(), region.clone(), endpoint)
        .context("Failed to configure the S3 blob store")?;
    let faces = RekognitionFaceIndex::new(&region, bucket).await;

    Ok(Backends {
        store: Arc::new(store),
        faces: Arc::new(faces),
    })
}

fn read_directory(dir: &PathBuf) -> anyhow::Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Read directory {:?}", dir))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let bytes =
            std::fs::read(entry.path()).with_context(|| format!("Read file {:?}", entry.path()))?;
        let content_type = content_type_for(&name);
        files.push(SourceFile::new(&name, content_type, bytes));
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

async fn list_event_images(store: &S3BlobStore, event_id: &str) -> anyhow::Result<Vec<String>> {
    let prefix = shared_image_prefix(event_id);
    let mut keys = Vec::new();
    let mut token = None;
    loop {
        let page = store
            .list(&prefix, token)
            .await
            .context("List stored images")?;
        keys.extend(page.keys);
        token = page.next_token;
        if token.is_none() {
            break;
        }
    }
    Ok(keys)
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load the env file before the EnvFilter reads RUST_LOG.
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let backends = backends_from_env().await?;

    match cli.command {
        Commands::Upload { dir, event } => {
            let files = read_directory(&dir)?;
            anyhow::ensure!(!files.is_empty(), "No files found in {:?}", dir);

            let orchestrator = UploadOrchestrator::new(
                backends.store.clone(),
                Normalizer::default(),
                UploadConfig::from_env(),
            );
            let progress = BatchProgress::new();
            let result = orchestrator.submit_batch(files, &event, &progress).await?;
            print_json(&result)?;
        }
        Commands::Index { event } => {
            let keys = list_event_images(&backends.store, &event).await?;
            anyhow::ensure!(!keys.is_empty(), "No stored images for event {}", event);

            let indexer = FaceIndexer::new(
                backends.faces.clone(),
                backends.store.clone(),
                IndexingConfig::from_env(),
            );
            let outcome = indexer.index_batch(&event, &keys).await?;
            print_json(&serde_json::json!({
                "successful": outcome.successful.len(),
                "failed": outcome
                    .failed
                    .iter()
                    .map(|f| serde_json::json!({ "key": f.image_key, "error": f.error }))
                    .collect::<Vec<_>>(),
            }))?;
        }
        Commands::Search { selfie, event, user } => {
            let name = selfie
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .context("Selfie path has no file name")?;
            let bytes =
                std::fs::read(&selfie).with_context(|| format!("Read selfie {:?}", selfie))?;

            let indexer = FaceIndexer::new(
                backends.faces.clone(),
                backends.store.clone(),
                IndexingConfig::from_env(),
            );
            let matcher = FaceMatcher::new(
                backends.faces.clone(),
                backends.store.clone(),
                indexer,
                SearchConfig::from_env(),
            );

            let content_type = content_type_for(&name);
            let selfie_key = matcher
                .store_selfie(&user, &name, bytes, content_type)
                .await?;
            let matches = matcher.search(&event, &selfie_key).await?;
            print_json(&serde_json::json!({
                "selfie_key": selfie_key,
                "matches": matches,
            }))?;
        }
    }

    Ok(())
}
