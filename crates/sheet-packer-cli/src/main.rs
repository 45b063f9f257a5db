use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use sheet_packer_core::prelude::*;
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "sheet-packer",
    about = "Pack images into cached sprite sheets",
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
    /// Pack, composite and cache sheets, then sweep expired outputs
    Pack(PackArgs),
    /// Layout-only: compute placements and print/export JSON (no sheets written)
    Layout(PackArgs),
    /// Remove expired files from the output directories
    Sweep(ConfigArgs),
}

/// Options shared by every subcommand. Unset flags fall back to the YAML file, then defaults.
#[derive(Args, Debug, Clone, Default)]
struct ConfigArgs {
    /// YAML config file path
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Base directory for keys and outputs
    #[arg(long, help_heading = "Input/Output")]
    root: Option<PathBuf>,
    /// Sheet directory, relative to the root
    #[arg(short, long, help_heading = "Input/Output")]
    out_dir: Option<PathBuf>,
    /// Template directory swept together with the sheets
    #[arg(long, help_heading = "Input/Output")]
    template_dir: Option<PathBuf>,
    /// Sheet lifetime in minutes (0 rebuilds every run)
    #[arg(long, help_heading = "Cache")]
    cache_minutes: Option<u64>,
}

#[derive(Args, Debug, Clone)]
struct PackArgs {
    #[command(flatten)]
    common: ConfigArgs,

    // Input
    /// Input files or directories
    #[arg(help_heading = "Input/Output")]
    inputs: Vec<PathBuf>,
    /// Include patterns (glob). If set, only files matching any pattern are considered
    #[arg(long, help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob). Files matching any pattern will be ignored
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,
    /// Accepted source extensions (comma separated)
    #[arg(long, value_delimiter = ',', help_heading = "Input/Output")]
    accept: Vec<String>,

    // Per-image parameters for positional inputs
    /// Sheet name; images sharing name and type share a sheet
    #[arg(long, help_heading = "Images")]
    name: Option<String>,
    /// Force sheet type: png | jpg | gif
    #[arg(long = "type", help_heading = "Images")]
    image_type: Option<String>,
    /// Margin in pixels: `all`, `vertical,horizontal` or `top,right,bottom,left`
    #[arg(long, help_heading = "Images")]
    margin: Option<String>,
    /// Snap to the group's longest side: left | right | top | bottom
    #[arg(long, help_heading = "Images")]
    align: Option<String>,
    /// Background repeat axis: x | y
    #[arg(long, help_heading = "Images")]
    repeat: Option<String>,

    // Layout
    /// Sort order: area_desc|max_side_desc|name_asc|none
    #[arg(long, help_heading = "Layout")]
    sorter: Option<String>,
    /// Packer: tree | horizontal
    #[arg(long, help_heading = "Layout")]
    packer: Option<String>,
    /// Extent of the unbounded axis of the packing area
    #[arg(long, help_heading = "Layout")]
    bounding_box: Option<u32>,
    /// JPEG quality (1..=100)
    #[arg(long, help_heading = "Layout")]
    jpg_quality: Option<u8>,
    /// Process sheets in parallel (requires core feature `parallel`)
    #[arg(long, help_heading = "Layout")]
    parallel: Option<bool>,
    /// Overall deadline in milliseconds
    #[arg(long, help_heading = "Layout")]
    deadline_ms: Option<u64>,

    // Export
    /// JSON manifest path (pack: defaults to `<out-dir>/manifest.json`; layout: stdout)
    #[arg(long, help_heading = "Export")]
    manifest: Option<PathBuf>,
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Pack(args) => run_pack(args, cli.progress && !cli.quiet, false),
        Commands::Layout(args) => run_pack(args, false, true),
        Commands::Sweep(args) => run_sweep(args),
    }
}

fn run_pack(cli: &PackArgs, show_progress: bool, layout_only: bool) -> anyhow::Result<()> {
    let yaml = load_yaml(cli.common.config.as_deref())?;
    let registrations = yaml.images.clone();
    let cfg = apply_pack_args(cli, yaml.into_sheet_config(SheetConfig::default())?)?;

    if cli.print_config {
        match cli.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }

    let root = cfg.root_dir.clone();
    let mut engine = PackingEngine::new(cfg).context("invalid configuration")?;

    let params = image_params(cli)?;
    register_inputs(
        &mut engine,
        &cli.inputs,
        &params,
        &cli.include,
        &cli.exclude,
        show_progress,
    )?;
    for reg in &registrations {
        let path = root.join(&reg.path);
        register_inputs(
            &mut engine,
            std::slice::from_ref(&path),
            &reg.params,
            &cli.include,
            &cli.exclude,
            show_progress,
        )?;
    }
    let images: usize = engine.groups().map(|g| g.len()).sum();
    info!(images, sheets = engine.groups().count(), "registered input images");
    if images == 0 {
        anyhow::bail!("no images registered");
    }

    if layout_only {
        let layout = engine.layout();
        report_errors(&layout.errors);
        let value = sheet_packer_core::placements_to_json(&layout.placements);
        let json = serde_json::to_string_pretty(&value)?;
        match &cli.manifest {
            Some(path) => {
                write_file(path, json.as_bytes())?;
                info!(?path, placements = layout.placements.len(), "layout written");
            }
            None => println!("{}", json),
        }
        return Ok(());
    }

    let out = engine.process();
    for sheet in &out.sheets {
        info!(
            group = %sheet.record.group_key,
            path = %sheet.record.relative_path,
            written = sheet.written,
            stats = %sheet.stats.summary(),
            "sheet"
        );
    }
    if !out.sweep.removed.is_empty() || !out.sweep.failed.is_empty() {
        info!(
            removed = out.sweep.removed.len(),
            failed = out.sweep.failed.len(),
            "swept expired outputs"
        );
    }
    report_errors(&out.errors);

    if !out.sheets.is_empty() {
        let path = cli
            .manifest
            .clone()
            .unwrap_or_else(|| engine.config().image_output_path().join("manifest.json"));
        let json = serde_json::to_string_pretty(&sheet_packer_core::to_json(&out.sheets))?;
        write_file(&path, json.as_bytes())?;
        info!(?path, sheets = out.sheets.len(), "manifest written");
    }

    let fatal = out.errors.iter().filter(|e| !e.is_recoverable()).count();
    if fatal > 0 {
        anyhow::bail!("{} sheet(s) could not be generated", fatal);
    }
    Ok(())
}

fn run_sweep(args: &ConfigArgs) -> anyhow::Result<()> {
    let yaml = load_yaml(args.config.as_deref())?;
    let cfg = apply_config_args(args, yaml.into_sheet_config(SheetConfig::default())?);
    let engine = PackingEngine::new(cfg).context("invalid configuration")?;
    if engine.cache().ttl().is_none() {
        warn!("cache_time_minutes is 0; nothing is ever considered expired");
    }
    let report = engine.sweep();
    for (path, reason) in &report.failed {
        error!(?path, %reason, "could not remove");
    }
    info!(
        removed = report.removed.len(),
        failed = report.failed.len(),
        "sweep finished"
    );
    Ok(())
}

fn report_errors(errors: &[SheetPackerError]) {
    for e in errors {
        if e.is_recoverable() {
            warn!(error = %e, "skipped");
        } else {
            error!(error = %e, "failed");
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
}

fn register_inputs(
    engine: &mut PackingEngine,
    inputs: &[PathBuf],
    params: &ImageParams,
    include: &[String],
    exclude: &[String],
    show_progress: bool,
) -> anyhow::Result<()> {
    if include.is_empty() && exclude.is_empty() {
        for input in inputs {
            if input.is_dir() {
                let report = engine
                    .add_directory(input, params)
                    .with_context(|| format!("scan {}", input.display()))?;
                for e in &report.rejected {
                    warn!(error = %e, "skip image");
                }
            } else if let Err(e) = engine.add_image(input, params) {
                warn!(error = %e, "skip image");
            }
        }
        return Ok(());
    }

    let mut paths = Vec::new();
    for input in inputs {
        paths.extend(gather_paths(input, include, exclude, engine.config())?);
    }
    add_with_progress(engine, &paths, params, show_progress);
    Ok(())
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for pat in patterns {
        b.add(Glob::new(pat).with_context(|| format!("invalid glob `{}`", pat))?);
    }
    Ok(Some(b.build()?))
}

fn gather_paths(
    path: &Path,
    include: &[String],
    exclude: &[String],
    cfg: &SheetConfig,
) -> anyhow::Result<Vec<PathBuf>> {
    let inc_set = build_globset(include)?;
    let exc_set = build_globset(exclude)?;
    let mut list: Vec<PathBuf> = Vec::new();
    if path.is_file() {
        if !should_skip(path, inc_set.as_ref(), exc_set.as_ref()) && is_accepted(path, cfg) {
            list.push(path.to_path_buf());
        }
    } else {
        let walker = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_metadata(e.file_name().to_string_lossy().as_ref()));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "directory walk error");
                    continue;
                }
            };
            let p = entry.path();
            if p.is_file()
                && !should_skip(p, inc_set.as_ref(), exc_set.as_ref())
                && is_accepted(p, cfg)
            {
                list.push(p.to_path_buf());
            }
        }
    }
    Ok(list)
}

fn is_metadata(name: &str) -> bool {
    matches!(name, ".git" | ".svn" | ".DS_Store")
}

fn should_skip(p: &Path, include: Option<&GlobSet>, exclude: Option<&GlobSet>) -> bool {
    let s = p.to_string_lossy().replace('\\', "/");
    if let Some(ex) = exclude {
        if ex.is_match(&s) {
            return true;
        }
    }
    if let Some(inc) = include {
        if !inc.is_match(&s) {
            return true;
        }
    }
    false
}

fn is_accepted(p: &Path, cfg: &SheetConfig) -> bool {
    p.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| cfg.accepts(e))
}

fn add_with_progress(
    engine: &mut PackingEngine,
    paths: &[PathBuf],
    params: &ImageParams,
    progress: bool,
) {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(paths.len() as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} registering {pos}/{len} [{elapsed_precise}] {wide_msg}",
        ) {
            b.set_style(style);
        }
        Some(b)
    } else {
        None
    };
    for p in paths {
        if let Some(b) = &bar {
            let msg = p.file_name().and_then(|s| s.to_str()).unwrap_or("");
            b.set_message(msg.to_string());
        }
        if let Err(e) = engine.add_image(p, params) {
            error!(?p, error = %e, "skip image");
        }
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
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

/// One `images:` entry of the YAML file.
#[derive(Debug, Clone, Deserialize)]
struct Registration {
    /// File or directory, relative to `root_dir`.
    path: PathBuf,
    #[serde(flatten)]
    params: ImageParams,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct YamlConfig {
    root_dir: Option<PathBuf>,
    image_output_dir: Option<PathBuf>,
    template_output_dir: Option<PathBuf>,
    accepted_types: Option<Vec<String>>,
    cache_time_minutes: Option<u64>,
    bounding_box_size: Option<u32>,
    sorter: Option<String>,
    packer: Option<String>,
    jpg_quality: Option<u8>,
    parallel: Option<bool>,
    deadline_ms: Option<u64>,
    images: Vec<Registration>,
}

impl YamlConfig {
    /// Unknown strategy names are configuration errors.
    fn into_sheet_config(self, mut cfg: SheetConfig) -> anyhow::Result<SheetConfig> {
        if let Some(v) = self.root_dir {
            cfg.root_dir = v;
        }
        if let Some(v) = self.image_output_dir {
            cfg.image_output_dir = v;
        }
        if let Some(v) = self.template_output_dir {
            cfg.template_output_dir = Some(v);
        }
        if let Some(v) = self.accepted_types {
            cfg.accepted_types = v.iter().map(|s| s.to_ascii_lowercase()).collect();
        }
        if let Some(v) = self.cache_time_minutes {
            cfg.cache_time_minutes = v;
        }
        if let Some(v) = self.bounding_box_size {
            cfg.bounding_box_size = v;
        }
        if let Some(v) = self.sorter {
            cfg.sorter = parse_sort_order(&v)?;
        }
        if let Some(v) = self.packer {
            cfg.packer = parse_packer(&v)?;
        }
        if let Some(v) = self.jpg_quality {
            cfg.image_properties.jpg_quality = v;
        }
        if let Some(v) = self.parallel {
            cfg.parallel = v;
        }
        if let Some(v) = self.deadline_ms {
            cfg.deadline_ms = Some(v);
        }
        Ok(cfg)
    }
}

fn load_yaml(path: Option<&Path>) -> anyhow::Result<YamlConfig> {
    let Some(path) = path else {
        return Ok(YamlConfig::default());
    };
    let file = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let y: YamlConfig =
        serde_yaml::from_str(&file).with_context(|| format!("parse {}", path.display()))?;
    Ok(y)
}

fn apply_config_args(args: &ConfigArgs, mut cfg: SheetConfig) -> SheetConfig {
    if let Some(v) = &args.root {
        cfg.root_dir = v.clone();
    }
    if let Some(v) = &args.out_dir {
        cfg.image_output_dir = v.clone();
    }
    if let Some(v) = &args.template_dir {
        cfg.template_output_dir = Some(v.clone());
    }
    if let Some(v) = args.cache_minutes {
        cfg.cache_time_minutes = v;
    }
    cfg
}

fn apply_pack_args(cli: &PackArgs, cfg: SheetConfig) -> anyhow::Result<SheetConfig> {
    let mut cfg = apply_config_args(&cli.common, cfg);
    if !cli.accept.is_empty() {
        cfg.accepted_types = cli.accept.iter().map(|s| s.to_ascii_lowercase()).collect();
    }
    if let Some(v) = &cli.sorter {
        cfg.sorter = parse_sort_order(v)?;
    }
    if let Some(v) = &cli.packer {
        cfg.packer = parse_packer(v)?;
    }
    if let Some(v) = cli.bounding_box {
        cfg.bounding_box_size = v;
    }
    if let Some(v) = cli.jpg_quality {
        cfg.image_properties.jpg_quality = v;
    }
    if let Some(v) = cli.parallel {
        cfg.parallel = v;
    }
    if let Some(v) = cli.deadline_ms {
        cfg.deadline_ms = Some(v);
    }
    Ok(cfg)
}

fn image_params(cli: &PackArgs) -> anyhow::Result<ImageParams> {
    Ok(ImageParams {
        name: cli.name.clone(),
        image_type: match &cli.image_type {
            Some(s) => Some(
                s.parse::<ImageType>()
                    .map_err(|_| anyhow::anyhow!("unknown image type: {}", s))?,
            ),
            None => None,
        },
        margin: cli.margin.as_deref().map(parse_margin).transpose()?,
        align: match &cli.align {
            Some(s) => Some(
                s.parse::<Alignment>()
                    .map_err(|_| anyhow::anyhow!("unknown alignment: {}", s))?,
            ),
            None => None,
        },
        repeat: match &cli.repeat {
            Some(s) => Some(
                s.parse::<Repeat>()
                    .map_err(|_| anyhow::anyhow!("unknown repeat axis: {}", s))?,
            ),
            None => None,
        },
    })
}

/// CSS shorthand: 1, 2 or 4 comma-separated values.
fn parse_margin(s: &str) -> anyhow::Result<[u32; 4]> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<u32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid margin `{}`", s))?;
    Ok(match values.as_slice() {
        [a] => [*a; 4],
        [v, h] => [*v, *h, *v, *h],
        [t, r, b, l] => [*t, *r, *b, *l],
        _ => anyhow::bail!("margin `{}` needs 1, 2 or 4 values", s),
    })
}

fn parse_sort_order(s: &str) -> anyhow::Result<SortOrder> {
    s.parse().map_err(|_| {
        SheetPackerError::UnknownStrategy {
            kind: "sorter",
            name: s.to_string(),
        }
        .into()
    })
}

fn parse_packer(s: &str) -> anyhow::Result<PackerKind> {
    s.parse().map_err(|_| {
        SheetPackerError::UnknownStrategy {
            kind: "packer",
            name: s.to_string(),
        }
        .into()
    })
}
