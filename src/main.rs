use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use faceid::matcher::Neighbor;
use faceid::{
    config, storage, Face, FsImageSource, Gallery, GalleryBuilder, GalleryHandle, ImageSource,
    MatchResult, OnnxExtractor, Roster,
};
use log::{info, warn};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "faceid")]
#[command(version, about = "Identify people in photos against an enrolled gallery")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the gallery from sample images and cache it
    Enroll {
        /// Scan this directory for <label>_<n> images instead of the configured layout
        #[arg(short, long)]
        samples: Option<PathBuf>,
        /// Enroll only these labels (repeatable)
        #[arg(short, long = "label")]
        labels: Vec<String>,
    },
    /// Identify the person in an image
    Identify {
        image: PathBuf,
        /// Override the configured distance threshold
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Also show the K closest identities
        #[arg(long, default_value_t = 0)]
        top: usize,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List enrolled identities
    List,
    /// Remove the cached gallery
    Purge,
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(None)?;

    match cli.command {
        Commands::Enroll { samples, labels } => enroll(&cfg, samples.as_deref(), &labels),
        Commands::Identify {
            image,
            threshold,
            top,
            json,
        } => identify(&cfg, &image, threshold, top, json),
        Commands::List => list(),
        Commands::Purge => purge(),
        Commands::Config => open_config(),
    }
}

fn load_extractor(cfg: &config::Config) -> Result<OnnxExtractor> {
    info!("Loading face models from {}", cfg.model_dir.display());
    OnnxExtractor::load(&cfg.model_dir, cfg.detector_params())
        .map_err(|e| faceid::Error::ModelsUnavailable(e.to_string()))
        .context("Failed to initialize face recognition pipeline")
}

fn roster_for(cfg: &config::Config, samples: Option<&Path>, labels: &[String]) -> Result<Roster> {
    match samples {
        // with no --label every <label>_<n> file in the directory is enrolled
        Some(dir) => Roster::discover(dir, labels, &cfg.sample_extension),
        None => Ok(Roster::from_pattern(
            &cfg.samples_dir,
            if labels.is_empty() {
                &cfg.labels[..]
            } else {
                labels
            },
            cfg.samples_per_label,
            &cfg.sample_extension,
        )),
    }
}

fn build_and_cache(
    cfg: &config::Config,
    extractor: &OnnxExtractor,
    roster: &Roster,
) -> Result<Gallery> {
    let builder = GalleryBuilder::new(&FsImageSource, extractor).workers(cfg.workers);
    let (gallery, report) = builder.build(roster).context("Failed to build gallery")?;

    for (label, count) in &report.accepted {
        info!("  {}: {} signature(s)", label, count);
    }
    for label in &report.omitted {
        warn!("  {}: no usable samples, not enrolled", label);
    }
    if !report.failures.is_empty() {
        warn!("{} sample(s) skipped", report.failures.len());
    }

    if gallery.is_empty() {
        anyhow::bail!("No faces could be enrolled. Please check the sample images.");
    }
    storage::save_gallery(&config::STORE_PREFIX, &gallery).context("Failed to save gallery")?;
    Ok(gallery)
}

fn enroll(cfg: &config::Config, samples: Option<&Path>, labels: &[String]) -> Result<()> {
    let roster = roster_for(cfg, samples, labels)?;
    if roster.is_empty() {
        anyhow::bail!("No identities to enroll. Check the configured labels and sample directory.");
    }
    let extractor = load_extractor(cfg)?;
    let gallery = build_and_cache(cfg, &extractor, &roster)?;
    info!("✓ Enrolled {} identities", gallery.len());
    Ok(())
}

#[derive(Serialize)]
struct IdentifyOutput<'a> {
    face: Option<&'a Face>,
    result: Option<&'a MatchResult>,
    ranking: Vec<Neighbor<'a>>,
}

fn identify(
    cfg: &config::Config,
    image: &Path,
    threshold: Option<f32>,
    top: usize,
    json: bool,
) -> Result<()> {
    let extractor = load_extractor(cfg)?;
    let gallery = match storage::load_gallery(&config::STORE_PREFIX)? {
        Some(gallery) => gallery,
        None => {
            info!("No cached gallery, enrolling from configured samples");
            build_and_cache(cfg, &extractor, &cfg.roster())?
        }
    };
    let handle = GalleryHandle::with_gallery(gallery);

    let img = FsImageSource
        .load_image(image)
        .with_context(|| format!("Failed to load {}", image.display()))?;
    let detected = extractor
        .process_image(&img)
        .context("Failed to process query image")?;

    let Some((face, query)) = detected else {
        if json {
            let output = IdentifyOutput {
                face: None,
                result: None,
                ranking: Vec::new(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            info!("No face detected");
        }
        return Ok(());
    };

    let matcher = match threshold {
        Some(t) => faceid::Matcher::new(t),
        None => cfg.matcher(),
    };
    let result = handle.match_query(&matcher, &query)?;

    let snapshot = handle.snapshot().ok_or(faceid::Error::GalleryNotReady)?;
    let ranking = if top > 0 {
        matcher.rank(snapshot.as_ref(), &query, top)?
    } else {
        Vec::new()
    };

    if json {
        let output = IdentifyOutput {
            face: Some(&face),
            result: Some(&result),
            ranking,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let [x, y, w, h] = face.bbox;
    info!(
        "Face at ({:.0}, {:.0}) {:.0}x{:.0}, score {:.3}",
        x, y, w, h, face.score
    );
    match &result {
        MatchResult::Matched { label, confidence } => {
            info!("Detected: {} ({:.1}%)", label, confidence)
        }
        MatchResult::Unmatched { best_distance } => info!(
            "Detected: {} (closest distance {:.3}, threshold {:.3})",
            result.display_name(),
            best_distance,
            matcher.threshold()
        ),
    }
    for (rank, n) in ranking.iter().enumerate() {
        info!("  #{} {} (distance {:.3})", rank + 1, n.label, n.distance);
    }
    Ok(())
}

fn list() -> Result<()> {
    match storage::load_gallery(&config::STORE_PREFIX).context("Failed to load gallery")? {
        Some(gallery) if !gallery.is_empty() => {
            info!(
                "{} identities, {}-d signatures",
                gallery.len(),
                gallery.dim().unwrap_or(0)
            );
            for identity in gallery.identities() {
                info!("  {}: {} signature(s)", identity.label(), identity.len());
            }
        }
        _ => info!("No enrolled identities. Run 'enroll' first."),
    }
    Ok(())
}

fn purge() -> Result<()> {
    if storage::purge(&config::STORE_PREFIX).context("Failed to purge gallery")? {
        info!("✓ Gallery removed");
    } else {
        info!("No gallery to remove");
    }
    Ok(())
}

fn open_config() -> Result<()> {
    let config_path = config::CONFIG_PATH.as_os_str();
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
