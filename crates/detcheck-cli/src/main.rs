mod engine;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use detcheck_proto::record::{ImageRecord, LetterboxRecord};
use detcheck_vision::{compare, doctor as vision_doctor, NmsMode, Pipeline, SourceImage, VisionConfig};

use engine::TensorFileEngine;

const IMAGE_EXTS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

#[derive(Debug, Parser)]
#[command(name = "detcheck", version, about = "detcheck - detector postprocessing and cross-runtime parity checks")]
struct Cli {
    #[arg(long, default_value = "detcheck.toml")]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sanity-check thresholds, classes and paths.
    Doctor,
    /// Letterbox one image and write the network input blob (f32 LE, NCHW).
    Preprocess {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Postprocess one image from a dumped output tensor.
    Detect {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        tensor: PathBuf,
        /// Tensor shape when the dump has no `.shape.json`, e.g. `1,8400,85`.
        #[arg(long, value_delimiter = ',')]
        shape: Option<Vec<usize>>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Detect every test image that has a `<stem>.bin` tensor dump. Shapes come
    /// from `<stem>.shape.json`, else `tensor_shape`.
    Batch,
    /// Compare a candidate run against a reference run.
    Compare {
        #[arg(long)]
        reference: Option<PathBuf>,
        #[arg(long)]
        candidate: Option<PathBuf>,
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
struct Config {
    input_size: u32,
    confidence_threshold: f64,
    nms_iou_threshold: f64,
    match_iou_threshold: f64,
    classes: Vec<String>,
    nms_mode: NmsMode,
    max_detections: Option<usize>,
    clip_to_image: bool,
    tensor_shape: Option<Vec<usize>>,
    jobs: usize,
    paths: PathsCfg,
}

impl Default for Config {
    fn default() -> Self {
        let v = VisionConfig::default();
        Self {
            input_size: v.input_size,
            confidence_threshold: v.confidence_threshold,
            nms_iou_threshold: v.nms_iou_threshold,
            match_iou_threshold: compare::DEFAULT_MATCH_IOU,
            classes: Vec::new(),
            nms_mode: v.nms_mode,
            max_detections: v.max_detections,
            clip_to_image: v.clip_to_image,
            tensor_shape: None,
            jobs: 4,
            paths: PathsCfg::default(),
        }
    }
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct PathsCfg {
    test_images: Option<PathBuf>,
    tensors: Option<PathBuf>,
    output: Option<PathBuf>,
    reference: Option<PathBuf>,
    candidate: Option<PathBuf>,
    report: Option<PathBuf>,
}

impl Config {
    fn vision(&self) -> VisionConfig {
        VisionConfig {
            input_size: self.input_size,
            confidence_threshold: self.confidence_threshold,
            nms_iou_threshold: self.nms_iou_threshold,
            nms_mode: self.nms_mode,
            max_detections: self.max_detections,
            clip_to_image: self.clip_to_image,
            num_classes: self.classes.len(),
        }
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    parse_config(&s)
}

fn parse_config(s: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(s).context("parse config toml")?;
    anyhow::ensure!(!cfg.classes.is_empty(), "config: classes must list at least one name");
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Preprocess { image, out } => preprocess(&cfg, &image, &out).await?,
        Command::Detect { image, tensor, shape, out } => {
            let shape = shape.or_else(|| cfg.tensor_shape.clone());
            detect(&cfg, &image, &tensor, shape, out.as_deref()).await?
        }
        Command::Batch => batch(&cfg).await?,
        Command::Compare { reference, candidate, report } => compare_cmd(&cfg, reference, candidate, report).await?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    vision_doctor::check_thresholds(&cfg.vision())?;
    vision_doctor::check_input_size(cfg.input_size)?;
    vision_doctor::check_classes(&cfg.classes)?;
    vision_doctor::check_match_threshold(cfg.match_iou_threshold)?;
    anyhow::ensure!(cfg.jobs > 0, "jobs must be > 0");
    if let Some(shape) = &cfg.tensor_shape {
        let columns = shape.last().copied().unwrap_or(0);
        anyhow::ensure!(
            matches!(shape.len(), 2 | 3) && columns == 5 + cfg.classes.len(),
            "tensor_shape {:?} does not fit {} classes",
            shape,
            cfg.classes.len()
        );
    }

    let p = &cfg.paths;
    for (name, dir) in [("paths.test_images", &p.test_images), ("paths.tensors", &p.tensors)] {
        match dir {
            Some(d) if d.is_dir() => {}
            Some(d) => warn!("doctor: {} is not a directory: {}", name, d.display()),
            None => warn!("doctor: {} not set (batch unavailable)", name),
        }
    }
    for (name, file) in [("paths.reference", &p.reference), ("paths.candidate", &p.candidate)] {
        if let Some(f) = file {
            if !f.is_file() { warn!("doctor: {} missing: {}", name, f.display()); }
        }
    }

    info!("doctor: OK ({} classes, input {})", cfg.classes.len(), cfg.input_size);
    Ok(())
}

fn load_image(path: &Path) -> Result<SourceImage> {
    let img = image::open(path).with_context(|| format!("decode image {}", path.display()))?;
    Ok(SourceImage::from_rgb(img.to_rgb8())?)
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

async fn preprocess(cfg: &Config, image: &Path, out: &Path) -> Result<()> {
    let src = load_image(image)?;
    let (g, blob) = Pipeline::new(cfg.vision()).prepare(&src)?;

    tokio::fs::write(out, blob.to_le_bytes()).await.with_context(|| format!("write blob {}", out.display()))?;

    let sidecar = out.with_extension("json");
    let rec = LetterboxRecord {
        image: file_name(image),
        input_size: g.input_size,
        orig_width: g.orig_width,
        orig_height: g.orig_height,
        ratio: g.ratio,
        pad_x: g.pad_x,
        pad_y: g.pad_y,
    };
    tokio::fs::write(&sidecar, serde_json::to_vec_pretty(&rec)?).await
        .with_context(|| format!("write sidecar {}", sidecar.display()))?;

    info!("preprocess: {} -> {} {:?} (ratio={:.5})", image.display(), out.display(), blob.shape(), g.ratio);
    Ok(())
}

fn detect_one(
    pipeline: &Pipeline,
    classes: &[String],
    image: &Path,
    tensor: &Path,
    shape: Option<Vec<usize>>,
) -> Result<ImageRecord> {
    let src = load_image(image)?;
    let mut engine = TensorFileEngine::new(tensor, shape, classes.len());
    let dets = pipeline
        .detect(&src, &mut engine)
        .with_context(|| format!("detect {}", image.display()))?;
    Ok(ImageRecord {
        image: file_name(image),
        detections: dets.iter().map(|d| d.to_record(classes)).collect(),
    })
}

async fn detect(cfg: &Config, image: &Path, tensor: &Path, shape: Option<Vec<usize>>, out: Option<&Path>) -> Result<()> {
    let rec = detect_one(&Pipeline::new(cfg.vision()), &cfg.classes, image, tensor, shape)?;
    info!("detect: {} detections={}", rec.image, rec.detections.len());

    let json = serde_json::to_string_pretty(&rec)?;
    match out {
        Some(p) => tokio::fs::write(p, json).await.with_context(|| format!("write {}", p.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let path = entry?.path();
        let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();
        if path.is_file() && IMAGE_EXTS.contains(&ext.as_str()) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

async fn batch(cfg: &Config) -> Result<()> {
    let images_dir = cfg.paths.test_images.as_ref().context("paths.test_images missing")?;
    let tensors_dir = cfg.paths.tensors.as_ref().context("paths.tensors missing")?;
    let output = cfg.paths.output.as_ref().context("paths.output missing")?;
    anyhow::ensure!(cfg.jobs > 0, "jobs must be > 0");

    let pipeline = Arc::new(Pipeline::new(cfg.vision()));
    let classes = Arc::new(cfg.classes.clone());
    let permits = Arc::new(Semaphore::new(cfg.jobs));

    let mut handles = Vec::new();
    for image in list_images(images_dir)? {
        let stem = image.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let tensor = tensors_dir.join(format!("{}.bin", stem));
        if !tensor.is_file() {
            warn!("batch: no tensor for {}, skipping", image.display());
            continue;
        }

        let permit = permits.clone().acquire_owned().await?;
        let (pipeline, classes, shape) = (pipeline.clone(), classes.clone(), cfg.tensor_shape.clone());
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            detect_one(&pipeline, &classes, &image, &tensor, shape)
        }));
    }

    let mut records = Vec::with_capacity(handles.len());
    for h in handles {
        let rec = h.await.context("batch worker panicked")??;
        info!("batch: {} detections={}", rec.image, rec.detections.len());
        records.push(rec);
    }

    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(output, serde_json::to_vec_pretty(&records)?).await
        .with_context(|| format!("write {}", output.display()))?;
    info!("batch: saved {} image results to {}", records.len(), output.display());
    Ok(())
}

async fn read_records(path: &Path) -> Result<Vec<ImageRecord>> {
    let s = tokio::fs::read_to_string(path).await.with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

async fn compare_cmd(
    cfg: &Config,
    reference: Option<PathBuf>,
    candidate: Option<PathBuf>,
    report: Option<PathBuf>,
) -> Result<()> {
    let reference = reference.or_else(|| cfg.paths.reference.clone()).context("no reference run (--reference or paths.reference)")?;
    let candidate = candidate.or_else(|| cfg.paths.candidate.clone()).context("no candidate run (--candidate or paths.candidate)")?;
    let report = report.or_else(|| cfg.paths.report.clone()).context("no report path (--report or paths.report)")?;

    let ref_recs = read_records(&reference).await?;
    let cand_recs = read_records(&candidate).await?;

    let now_ms = time::OffsetDateTime::now_utc().unix_timestamp_nanos() as i64 / 1_000_000;
    let rep = compare::compare_runs(&ref_recs, &cand_recs, cfg.match_iou_threshold, now_ms);

    if let Some(dir) = report.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(&report, serde_json::to_vec_pretty(&rep)?).await
        .with_context(|| format!("write {}", report.display()))?;

    info!(
        "compare: matched {}/{} reference detections (ratio {:.3}) over {} images",
        rep.overall.matched_total, rep.overall.ref_total, rep.overall.match_ratio, rep.images.len()
    );
    Ok(())
}
