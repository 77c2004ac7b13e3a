//! proxyview CLI
//!
//! Command-line interface for classifying image files, loading them as proxy
//! textures and dumping subresources back out as PNG.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use proxyview_core::Subresource;
use proxyview_parsers::logging::{init_with_config, TracingConfig};
use proxyview_parsers::{classify, LoadOptions};
use proxyview_replay::{GetTextureDataParams, ImageViewer, MemoryBackend, RemapTexture, SupportPolicy};

/// proxyview - load still images as proxy textures
#[derive(Parser)]
#[command(name = "proxyview")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for structured data
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// JSON file with load options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Formats the backend should refuse, e.g. BC1 or R8_UNORM (can be repeated)
    #[arg(long, global = true)]
    unsupported: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {s}")),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the container kind of an image file
    Sniff(SniffArgs),

    /// Load an image and describe the resulting texture
    Info(InfoArgs),

    /// Write one subresource of an image out as PNG
    Dump(DumpArgs),
}

#[derive(Args)]
struct SniffArgs {
    /// Path to the image file
    path: PathBuf,
}

#[derive(Args)]
struct InfoArgs {
    /// Path to the image file
    path: PathBuf,
}

#[derive(Args)]
struct DumpArgs {
    /// Path to the image file
    path: PathBuf,

    /// Output PNG path
    #[arg(short, long)]
    output: PathBuf,

    /// Mip level to dump
    #[arg(long, default_value = "0")]
    mip: u32,

    /// Array slice (or depth slice of a volume) to dump
    #[arg(long, default_value = "0")]
    slice: u32,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_with_config(TracingConfig::for_verbosity(cli.verbose));

    let options = load_options(cli.config.as_deref())?;

    match cli.command {
        Commands::Sniff(args) => cmd_sniff(&args, cli.format),
        Commands::Info(args) => cmd_info(&args, options, &cli.unsupported, cli.format),
        Commands::Dump(args) => cmd_dump(&args, options, &cli.unsupported),
    }
}

fn load_options(config: Option<&Path>) -> Result<LoadOptions> {
    match config {
        Some(path) => {
            let options = LoadOptions::from_file(path)?;
            debug!(?options, "Loaded options from {}", path.display());
            Ok(options)
        }
        None => Ok(LoadOptions::default()),
    }
}

fn make_backend(unsupported: &[String]) -> MemoryBackend {
    let policy = unsupported
        .iter()
        .fold(SupportPolicy::default(), |policy, name| policy.deny_named(name));
    MemoryBackend::new(policy)
}

fn open_viewer(path: &Path, options: LoadOptions, unsupported: &[String]) -> Result<ImageViewer<MemoryBackend>> {
    if !path.exists() {
        bail!("File not found: {:?}", path);
    }

    info!("Loading image: {:?}", path);
    let viewer = ImageViewer::open(path, options, make_backend(unsupported))
        .with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(viewer)
}

fn cmd_sniff(args: &SniffArgs, format: OutputFormat) -> Result<()> {
    let file = File::open(&args.path).with_context(|| format!("Failed to open {}", args.path.display()))?;
    let kind = classify(&mut BufReader::new(file)).context("Failed to read image header")?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "path": args.path,
                "kind": kind,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => println!("{}: {}", args.path.display(), kind),
    }
    Ok(())
}

fn cmd_info(args: &InfoArgs, options: LoadOptions, unsupported: &[String], format: OutputFormat) -> Result<()> {
    let viewer = open_viewer(&args.path, options, unsupported)?;
    let desc = viewer.get_texture();
    let frame = viewer.frame_record();
    let strategy = viewer.strategy();
    let kind = viewer.loader().current().map(|c| c.kind);

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "path": args.path,
                "kind": kind,
                "texture": desc,
                "frame": frame,
                "strategy": strategy,
                "resources": viewer.get_resources(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Image: {}", args.path.display());
            if let Some(kind) = kind {
                println!("  Container:     {kind}");
            }
            println!("  Type:          {:?} ({}D)", desc.texture_type, desc.dimension);
            println!("  Dimensions:    {}x{}x{}", desc.width, desc.height, desc.depth);
            println!("  Array size:    {}", desc.array_size);
            println!("  Mips:          {}", desc.mips);
            println!("  Cubemap:       {}", desc.cubemap);
            println!("  Format:        {}", desc.format);
            println!("  File size:     {}", format_size(desc.byte_size));
            println!("  Decoded size:  {}", format_size(frame.uncompressed_file_size));
            if let Some(strategy) = strategy {
                println!("  Proxy:         {strategy}");
            }
        }
    }
    Ok(())
}

fn cmd_dump(args: &DumpArgs, options: LoadOptions, unsupported: &[String]) -> Result<()> {
    let mut viewer = open_viewer(&args.path, options, unsupported)?;
    let desc = viewer.get_texture();

    if args.mip >= desc.mips {
        bail!("Mip {} out of range, image has {} mips", args.mip, desc.mips);
    }
    let slices = desc.array_size.max(desc.depth);
    if args.slice >= slices {
        bail!("Slice {} out of range, image has {} slices", args.slice, slices);
    }

    let (width, height, _) = desc.mip_dimensions(args.mip);
    let sub = Subresource::new(args.mip, args.slice);
    let mut bytes = viewer
        .get_texture_data(viewer.resource_id(), sub, &GetTextureDataParams::remapped(RemapTexture::Rgba8))
        .context("Failed to read back subresource")?;

    // Volumes read back every depth slice of the mip; keep the first
    bytes.truncate(width as usize * height as usize * 4);

    let image = image::RgbaImage::from_raw(width, height, bytes).context("Read-back was smaller than the subresource")?;
    image
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!("Wrote {}x{} mip {} slice {} to {:?}", width, height, args.mip, args.slice, args.output);
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
