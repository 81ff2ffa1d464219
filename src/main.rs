use anyhow::{bail, Context};
use clap::Parser;
use serde_json::json;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use renditions::config::Config;
use renditions::storage::{with_reader, FileSystemStorage, Storage};
use renditions::store::JsonRenditionStore;
use renditions::transform::probe_dimensions;
use renditions::{FocalPoint, OperationRegistry, RenditionService, SourceImage};

/// Render an image through a filter spec into the media root
#[derive(Parser, Debug)]
#[command(name = "renditions")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source image, relative to the media root
    #[arg(short, long, required_unless_present = "test")]
    source: Option<String>,

    /// Filter spec, e.g. "fill-200x200-c50|format-webp"
    #[arg(long, required_unless_present_any = ["test", "delete"])]
    spec: Option<String>,

    /// Focal point as x,y,width,height
    #[arg(long)]
    focal_point: Option<FocalPoint>,

    /// Id the source image is recorded under
    #[arg(long, default_value_t = 1)]
    image_id: u64,

    /// Print the cache key and output name without rendering
    #[arg(long)]
    dry_run: bool,

    /// Delete every rendition recorded for the image
    #[arg(long, conflicts_with_all = ["spec", "dry_run"])]
    delete: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    renditions::logging::init_subscriber(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging subsystem: {}", e))?;

    tracing::info!(
        config_file = ?args.config,
        media_root = %config.storage.media_root.display(),
        renditions_dir = %config.images.renditions_dir,
        jpeg_quality = config.images.jpeg_quality,
        "Configuration loaded successfully"
    );

    if args.test {
        println!("configuration OK");
        return Ok(());
    }

    let Some(source_name) = args.source.as_deref() else {
        bail!("--source is required");
    };

    let storage = Arc::new(FileSystemStorage::new(&config.storage.media_root));
    let store = Arc::new(
        JsonRenditionStore::open(config.storage.index_path())
            .context("Failed to open rendition index")?,
    );
    let service = RenditionService::new(
        Arc::new(OperationRegistry::new()),
        storage.clone(),
        store,
        &config.images,
    );

    let (width, height) = with_reader(storage.as_ref(), source_name, |reader| {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(data)
    })
    .map_err(anyhow::Error::from)
    .and_then(|data| probe_dimensions(&data).map_err(anyhow::Error::from))
    .unwrap_or_else(|e| {
        // Unreadable sources still get a (placeholder) rendition below
        tracing::warn!(source = %source_name, error = %e, "Could not read source dimensions");
        (0, 0)
    });

    let mut source = SourceImage::new(args.image_id, source_name, width, height);
    source.focal_point = args.focal_point;

    if args.delete {
        let count = service.delete_renditions(&source)?;
        println!("{}", json!({ "image_id": source.id, "deleted": count }));
        return Ok(());
    }

    let Some(spec) = args.spec.as_deref() else {
        bail!("--spec is required");
    };
    let filter = service.filter(spec)?;

    if args.dry_run {
        let output = json!({
            "spec": filter.spec(),
            "vary_key": filter.vary_key(&source),
            "cache_key": filter.cache_key(&source),
            "operations": filter.operations().iter().map(|op| op.name()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let rendition = service.get_rendition_for_filter(&source, &filter)?;
    let output = json!({
        "rendition": rendition,
        "url": rendition.url(&config.images.base_url),
        "placeholder": rendition.is_placeholder(),
        "exists": !rendition.is_placeholder() && storage.exists(&rendition.file),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
