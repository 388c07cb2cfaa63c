use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use globset::{Glob, GlobSetBuilder};
use grid_packer_core::raster::{cell_occupancy, decode_sprite, decode_strict};
use grid_packer_core::{
    BundleConfig, CategoryReport, RunReport, inspect_png, list_categories, lookup_table,
    run_with,
};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "grid-packer",
    about = "Fold new sprites into per-category grid atlases",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack new sprites into atlases and record their positions
    Pack(PackArgs),
    /// Print the sprite -> atlas lookup table built from the sidecars
    Lookup(LookupArgs),
    /// Report which grid cells of an atlas contain pixels
    CheckGrid(CheckGridArgs),
    /// Inspect sprite files for trailing garbage and decode problems
    CheckImages(CheckImagesArgs),
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    /// Categories to process (names or glob patterns); all categories when omitted
    #[arg(help_heading = "Input/Output")]
    categories: Vec<String>,
    /// Sprite tree root ({root}/{category}/{subdir}/{file}.png)
    #[arg(long, default_value = "img", help_heading = "Input/Output")]
    image_root: PathBuf,
    /// Sidecar root ({root}/{category}/{subdir}/name.json)
    #[arg(long, default_value = "names", help_heading = "Input/Output")]
    metadata_root: PathBuf,
    /// Atlas output directory
    #[arg(long, default_value = "dist", help_heading = "Input/Output")]
    bundle_root: PathBuf,
    /// YAML config file path (keys set there override the command line)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,

    // Layout
    /// Grid rows per page
    #[arg(long, default_value_t = 4, help_heading = "Layout")]
    rows: u32,
    /// Grid columns per page
    #[arg(long, default_value_t = 4, help_heading = "Layout")]
    cols: u32,

    // Metadata
    /// Sidecar file name inside each subdirectory
    #[arg(long, default_value = "name.json", help_heading = "Metadata")]
    sidecar_name: String,
    /// Per-category manifest file name
    #[arg(long, default_value = "bundle.json", help_heading = "Metadata")]
    manifest_name: String,
    /// Create a minimal sidecar entry for packed sprites that have none
    #[arg(long, default_value_t = true, action=ArgAction::Set, help_heading = "Metadata")]
    create_missing_entries: bool,

    // Export
    /// Write the run report (JSON) to this file
    #[arg(long, help_heading = "Export")]
    report: Option<PathBuf>,
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
    /// Dry run: plan and render but do not write atlases or metadata
    #[arg(long, default_value_t = false, help_heading = "Export")]
    dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
struct LookupArgs {
    /// Sidecar root
    #[arg(long, default_value = "names")]
    metadata_root: PathBuf,
    /// Sidecar file name inside each subdirectory
    #[arg(long, default_value = "name.json")]
    sidecar_name: String,
    /// Write the table here instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
struct CheckGridArgs {
    /// Atlas PNG
    atlas: PathBuf,
    #[arg(long, default_value_t = 4)]
    rows: u32,
    #[arg(long, default_value_t = 4)]
    cols: u32,
}

#[derive(Parser, Debug, Clone)]
struct CheckImagesArgs {
    /// Sprite files to inspect
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Pack(args) => run_pack(args, cli.progress && !cli.quiet),
        Commands::Lookup(args) => run_lookup(args),
        Commands::CheckGrid(args) => run_check_grid(args),
        Commands::CheckImages(args) => run_check_images(args),
    }
}

fn run_pack(cli: &PackArgs, show_progress: bool) -> anyhow::Result<()> {
    let base = BundleConfig {
        image_root: cli.image_root.clone(),
        metadata_root: cli.metadata_root.clone(),
        bundle_root: cli.bundle_root.clone(),
        rows: cli.rows,
        cols: cli.cols,
        sidecar_name: cli.sidecar_name.clone(),
        manifest_name: cli.manifest_name.clone(),
        create_missing_entries: cli.create_missing_entries,
        dry_run: cli.dry_run,
    };
    // Load config file if provided; keys present in the file win over CLI values
    let cfg = if let Some(path) = &cli.config {
        let file = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let y: YamlConfig = serde_yaml::from_str(&file)
            .with_context(|| format!("parse config {}", path.display()))?;
        y.into_bundle_config(base)
    } else {
        base
    };

    if cli.print_config {
        match cli.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }
    cfg.validate()?;

    if !cfg.dry_run {
        fs::create_dir_all(&cfg.bundle_root)
            .with_context(|| format!("create bundle_root {}", cfg.bundle_root.display()))?;
    }

    let categories = select_categories(&cfg.image_root, &cli.categories)?;
    if categories.is_empty() {
        // an empty list would make the core bundle every category
        warn!(root = %cfg.image_root.display(), "no categories to process");
        return Ok(());
    }
    let report = bundle_with_progress(&cfg, &categories, show_progress)?;

    let stats = report.stats();
    info!(
        categories = report.categories.len(),
        failed = report.failed.len(),
        pages = stats.num_pages,
        sprites = stats.num_sprites,
        occupancy = %format!("{:.2}%", stats.occupancy * 100.0),
        "stats"
    );
    for c in report.categories.iter().filter(|c| !c.is_clean()) {
        warn!(
            category = %c.category,
            decode_failures = c.decode_failures.len(),
            unrecorded = c.unrecorded.len(),
            failed_pages = c.failed_pages.len(),
            skipped_pages = c.skipped_pages.len(),
            failed_sidecars = c.failed_sidecars.len(),
            "category finished with problems"
        );
    }

    if let Some(report_path) = &cli.report {
        fs::write(report_path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("write {}", report_path.display()))?;
        info!(?report_path, "report exported");
    }

    if !report.failed.is_empty() {
        let names: Vec<&str> = report.failed.iter().map(|f| f.category.as_str()).collect();
        anyhow::bail!("{} categories failed: {}", names.len(), names.join(", "));
    }
    Ok(())
}

fn bundle_with_progress(
    cfg: &BundleConfig,
    categories: &[String],
    progress: bool,
) -> anyhow::Result<RunReport> {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(categories.len() as u64);
        b.set_style(ProgressStyle::with_template(
            "{spinner:.green} bundling {pos}/{len} [{elapsed_precise}] {wide_msg}",
        )?);
        Some(b)
    } else {
        None
    };
    let report = run_with(cfg, categories, |category, outcome| {
        if let Ok(r) = outcome {
            log_category(r);
        }
        if let Some(b) = &bar {
            b.set_message(category.to_string());
            b.inc(1);
        }
    })?;
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    Ok(report)
}

fn log_category(r: &CategoryReport) {
    if r.pages.is_empty() {
        return;
    }
    let atlases: Vec<&str> = r.pages.iter().map(|p| p.atlas.as_str()).collect();
    info!(
        category = %r.category,
        new = r.new_sprites,
        recorded = r.recorded,
        atlases = %atlases.join(","),
        "bundled"
    );
}

/// Expands category arguments. Plain names are taken as given (a missing one fails for
/// that category only); glob patterns are matched against the directories under `root`.
fn select_categories(root: &Path, args: &[String]) -> anyhow::Result<Vec<String>> {
    if args.is_empty() {
        return list_categories(root)
            .with_context(|| format!("list categories in {}", root.display()));
    }
    let (patterns, literals): (Vec<&String>, Vec<&String>) = args
        .iter()
        .partition(|a| a.contains(['*', '?', '[', '{']));
    let mut out: Vec<String> = literals.into_iter().cloned().collect();
    if !patterns.is_empty() {
        let mut b = GlobSetBuilder::new();
        for pat in &patterns {
            b.add(Glob::new(pat)?);
        }
        let set = b.build()?;
        let all = list_categories(root)
            .with_context(|| format!("list categories in {}", root.display()))?;
        out.extend(all.into_iter().filter(|c| set.is_match(c)));
    }
    out.sort();
    out.dedup();
    Ok(out)
}

fn run_lookup(args: &LookupArgs) -> anyhow::Result<()> {
    let cfg = BundleConfig {
        metadata_root: args.metadata_root.clone(),
        sidecar_name: args.sidecar_name.clone(),
        ..Default::default()
    };
    let table = lookup_table(&cfg)?;
    let json = serde_json::to_string_pretty(&table)?;
    match &args.out {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
            info!(?path, entries = table.len(), "lookup table written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_check_grid(args: &CheckGridArgs) -> anyhow::Result<()> {
    let bytes =
        fs::read(&args.atlas).with_context(|| format!("read {}", args.atlas.display()))?;
    let rgba = decode_sprite(&bytes)?;
    let (w, h) = rgba.dimensions();
    println!("{}: {}x{}", args.atlas.display(), w, h);
    let occupancy = cell_occupancy(&rgba, args.rows, args.cols)?;
    let (cell_w, cell_h) = (w / args.cols, h / args.rows);
    println!("cell: {}x{}", cell_w, cell_h);
    for (i, filled) in occupancy.iter().enumerate() {
        let (r, c) = (i as u32 / args.cols, i as u32 % args.cols);
        println!(
            "cell [{},{}] at {},{}: {}",
            r,
            c,
            c * cell_w,
            r * cell_h,
            if *filled { "content" } else { "empty" }
        );
    }
    let filled = occupancy.iter().filter(|f| **f).count();
    println!("{}/{} cells filled", filled, occupancy.len());
    Ok(())
}

fn run_check_images(args: &CheckImagesArgs) -> anyhow::Result<()> {
    for path in &args.files {
        println!("{}", path.display());
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                println!("  unreadable: {e}");
                continue;
            }
        };
        let info = inspect_png(&bytes);
        println!("  png signature: {}", info.valid_signature);
        match info.iend_offset {
            Some(off) => println!("  IEND at byte {off}, {} trailing bytes", info.trailing_bytes),
            None => println!("  no IEND chunk"),
        }
        match decode_strict(&bytes) {
            Ok(img) => println!("  strict decode: ok ({}x{})", img.width(), img.height()),
            Err(e) => println!("  strict decode: {e}"),
        }
        match decode_sprite(&bytes) {
            Ok(img) => println!("  sanitized decode: ok ({}x{})", img.width(), img.height()),
            Err(e) => println!("  sanitized decode: {e}"),
        }
    }
    Ok(())
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Deserialize, Default)]
struct YamlConfig {
    image_root: Option<PathBuf>,
    metadata_root: Option<PathBuf>,
    bundle_root: Option<PathBuf>,
    rows: Option<u32>,
    cols: Option<u32>,
    sidecar_name: Option<String>,
    manifest_name: Option<String>,
    create_missing_entries: Option<bool>,
    dry_run: Option<bool>,
}

impl YamlConfig {
    fn into_bundle_config(self, mut cfg: BundleConfig) -> BundleConfig {
        if let Some(v) = self.image_root {
            cfg.image_root = v;
        }
        if let Some(v) = self.metadata_root {
            cfg.metadata_root = v;
        }
        if let Some(v) = self.bundle_root {
            cfg.bundle_root = v;
        }
        if let Some(v) = self.rows {
            cfg.rows = v;
        }
        if let Some(v) = self.cols {
            cfg.cols = v;
        }
        if let Some(v) = self.sidecar_name {
            cfg.sidecar_name = v;
        }
        if let Some(v) = self.manifest_name {
            cfg.manifest_name = v;
        }
        if let Some(v) = self.create_missing_entries {
            cfg.create_missing_entries = v;
        }
        if let Some(v) = self.dry_run {
            cfg.dry_run = v;
        }
        cfg
    }
}
