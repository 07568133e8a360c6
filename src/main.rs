use clap::{Parser, Subcommand};
use pixchain::config;
use pixchain::exporter::MimeType;
use pixchain::loader::{self, LoadOptions};
use pixchain::output::{self, ApplySummary};
use pixchain::pipeline::Pipeline;
use pixchain::recipe::Recipe;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixchain")]
#[command(about = "Apply image transformation recipes")]
#[command(long_about = "\
Apply image transformation recipes

A recipe is a TOML file listing pipeline steps in order:

  [[step]]
  op = \"resize\"
  width = 200
  height = 100

  [[step]]
  op = \"grayscale\"

  [[step]]
  op = \"draw_text\"
  at = [10, 40]
  text = \"draft\"

Steps: resize, crop, rotate, center_in_rectangle, to_circle, perspective,
grayscale, pixelize, gaussian_blur, draw_line, draw_polygon,
draw_rectangle, draw_text.

Defaults come from pixchain.toml in the working directory (or --config).
Run 'pixchain gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Log pipeline activity to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ./pixchain.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a recipe over an image and write the result
    Apply {
        /// Input image
        input: PathBuf,
        /// Recipe file
        #[arg(long, short)]
        recipe: PathBuf,
        /// Output file; its extension picks the format unless --mime is given
        #[arg(long, short)]
        output: PathBuf,
        /// Output mime type, e.g. image/png
        #[arg(long)]
        mime: Option<String>,
        /// Lossy quality in [0, 1]
        #[arg(long)]
        quality: Option<String>,
    },
    /// Print dimensions and EXIF tags of an image
    Info {
        input: PathBuf,
    },
    /// Print a stock pixchain.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(&std::env::current_dir()?)?,
    };
    init_thread_pool(&config.processing);

    match cli.command {
        Command::Apply {
            input,
            recipe,
            output,
            mime,
            quality,
        } => {
            let recipe = Recipe::load(&recipe)?;
            let mime = mime.or_else(|| mime_from_extension(&output));

            let mut pipeline = Pipeline::with_config(config);
            pipeline.load_file(input.clone());
            recipe.apply(&mut pipeline);
            let blob =
                pollster::block_on(pipeline.save_as_blob(mime.as_deref(), quality.as_deref()))?;

            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&output, &blob.bytes)?;

            let dimensions = pipeline
                .canvas()
                .map(|s| s.dimensions())
                .unwrap_or_default();
            output::print_apply(&ApplySummary {
                input: &input.display().to_string(),
                output: &output.display().to_string(),
                steps: &recipe.steps,
                bytes: blob.bytes.len(),
                mime: &blob.mime,
                dimensions,
            });
        }
        Command::Info { input } => {
            let options = LoadOptions {
                read_exif: true,
                ..config.loader
            };
            let loaded = loader::load_file(&input, options)?;
            let name = loaded
                .file_name
                .unwrap_or_else(|| input.display().to_string());
            output::print_info(
                &name,
                loaded.surface.dimensions(),
                &loaded.exif.unwrap_or_default(),
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the stderr log subscriber: `warn` by default, `debug` with -v.
fn init_tracing(verbose: bool) {
    let default = if verbose { "pixchain=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the config can lower it, not raise it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Mime type implied by the output file's extension, if it names a known format.
fn mime_from_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => MimeType::Jpeg,
        "png" => MimeType::Png,
        "webp" => MimeType::WebP,
        "bmp" => MimeType::Bmp,
        "tif" | "tiff" => MimeType::Tiff,
        _ => return None,
    };
    Some(mime.as_str().to_string())
}
