use clap::{Parser, Subcommand, ValueEnum};
use image_craft::config::{self, CraftConfig, InputConfig};
use image_craft::controller::{CollectionController, ControllerConfig, CraftError, Workspace};
use image_craft::hydration::{self, HttpFetcher};
use image_craft::imaging::{
    CompressTarget, CropRect, DisplayedSize, FlipAxis, OutputFormat, Quality, RasterCodec,
    RotateParams, RustCodec, rust_codec,
};
use image_craft::messages::MessageTable;
use image_craft::output::{self, RasterSummary};
use image_craft::store::SourceFile;
use image_craft::units::parse_size_to_bytes;
use image_craft::validation::{DuplicatePolicy, DuplicateRequest};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "image-craft")]
#[command(about = "Crop, rotate, flip and compress images the way the upload widget does")]
#[command(long_about = "\
Crop, rotate, flip and compress images the way the upload widget does

Every command runs the same engine as the embedded widget: files go through
the validation gate of an input, edits are applied to a record and the
record's current content is written back out.

Edited files are encoded in the configured output format (AVIF by default).

Run 'image-craft gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags for commands that write an edited image.
#[derive(clap::Args, Clone)]
struct EditArgs {
    /// Image to edit
    input: PathBuf,

    /// Output file (default: <input>-edited.<format extension>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format (overrides config)
    #[arg(long)]
    format: Option<Format>,

    /// Quality 0.1-1.0 (overrides config)
    #[arg(long)]
    quality: Option<f32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Avif,
    Jpeg,
    Png,
    Webp,
}

impl From<Format> for OutputFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Avif => OutputFormat::Avif,
            Format::Jpeg => OutputFormat::Jpeg,
            Format::Png => OutputFormat::Png,
            Format::Webp => OutputFormat::Webp,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Axis {
    Horizontal,
    Vertical,
}

#[derive(Subcommand)]
enum Command {
    /// Crop a rectangle given in displayed coordinates
    Crop {
        #[command(flatten)]
        edit: EditArgs,
        #[arg(long, default_value_t = 0.0)]
        x: f64,
        #[arg(long, default_value_t = 0.0)]
        y: f64,
        #[arg(long)]
        width: f64,
        #[arg(long)]
        height: f64,
        /// Displayed width the rectangle refers to (default: natural width)
        #[arg(long)]
        displayed_width: Option<f64>,
        /// Displayed height the rectangle refers to (default: natural height)
        #[arg(long)]
        displayed_height: Option<f64>,
    },
    /// Rotate clockwise about a pivot (default: image center)
    Rotate {
        #[command(flatten)]
        edit: EditArgs,
        /// Angle in degrees, clockwise
        #[arg(long, allow_negative_numbers = true)]
        angle: f64,
        #[arg(long)]
        center_x: Option<f64>,
        #[arg(long)]
        center_y: Option<f64>,
    },
    /// Mirror horizontally or vertically
    Flip {
        #[command(flatten)]
        edit: EditArgs,
        #[arg(long, value_enum, default_value = "horizontal")]
        axis: Axis,
    },
    /// Compress to a byte budget or to bounding dimensions
    Compress {
        #[command(flatten)]
        edit: EditArgs,
        /// Byte budget, e.g. "500KB" (default: compression.max_file_size)
        #[arg(long, conflicts_with_all = ["max_width", "max_height"])]
        max_size: Option<String>,
        /// Compress by dimensions instead of size
        #[arg(long)]
        max_width: Option<u32>,
        #[arg(long)]
        max_height: Option<u32>,
        /// Ignore aspect ratio when compressing by dimensions
        #[arg(long)]
        stretch: bool,
    },
    /// Run the validation gate of an input over files and directories
    Check {
        /// Input name from [[inputs]] (undeclared names get no limits)
        #[arg(long, default_value = "images")]
        input: String,
        /// Answer to duplicate prompts when the input's policy is "ask"
        #[arg(long)]
        keep_duplicates: bool,
        paths: Vec<PathBuf>,
    },
    /// Fetch a JSON list of existing image URLs and report what loads
    Hydrate {
        /// e.g. '["https://example.com/a.jpg"]'
        list: String,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let craft_config = config::load_config(&cli.config)?;
    let messages = MessageTable::with_overrides(&craft_config.messages);

    match cli.command {
        Command::Crop {
            edit,
            x,
            y,
            width,
            height,
            displayed_width,
            displayed_height,
        } => {
            run_edit(&craft_config, &messages, &edit, |ctl, ws, id, natural| {
                let displayed = DisplayedSize::new(
                    displayed_width.unwrap_or(natural.0 as f64),
                    displayed_height.unwrap_or(natural.1 as f64),
                );
                let rect = CropRect {
                    x,
                    y,
                    width,
                    height,
                };
                ctl.crop(ws, id, rect, displayed).map(|_| Vec::new())
            })?;
        }
        Command::Rotate {
            edit,
            angle,
            center_x,
            center_y,
        } => {
            run_edit(&craft_config, &messages, &edit, |ctl, ws, id, natural| {
                let displayed = DisplayedSize::natural(natural.0, natural.1);
                let mut params = RotateParams::about_center(angle, displayed);
                if let Some(cx) = center_x {
                    params.center.0 = cx;
                }
                if let Some(cy) = center_y {
                    params.center.1 = cy;
                }
                ctl.rotate(ws, id, params).map(|_| Vec::new())
            })?;
        }
        Command::Flip { edit, axis } => {
            let axis = match axis {
                Axis::Horizontal => FlipAxis::Horizontal,
                Axis::Vertical => FlipAxis::Vertical,
            };
            run_edit(&craft_config, &messages, &edit, |ctl, ws, id, _| {
                ctl.flip(ws, id, axis).map(|_| Vec::new())
            })?;
        }
        Command::Compress {
            edit,
            max_size,
            max_width,
            max_height,
            stretch,
        } => {
            let settings = &craft_config.compression;
            let (target, budget) = if max_width.is_some() || max_height.is_some() {
                let target = CompressTarget::Dimensions {
                    max_width: max_width.unwrap_or(0),
                    max_height: max_height.unwrap_or(0),
                    maintain_aspect: !stretch,
                };
                (target, None)
            } else {
                let max_bytes = match &max_size {
                    Some(s) => parse_size_to_bytes(s),
                    None => settings.max_file_size_bytes(),
                };
                if max_bytes == 0 {
                    return Err(format!("not a size: {}", max_size.unwrap_or_default()).into());
                }
                (CompressTarget::FileSize { max_bytes }, Some(max_bytes))
            };
            let quality = edit
                .quality
                .map(Quality::new)
                .unwrap_or_else(|| settings.initial_quality());
            run_edit(&craft_config, &messages, &edit, |ctl, ws, id, _| {
                let result = ctl.compress(ws, id, target, quality)?;
                Ok(output::format_compression(&result, ctl.messages(), budget))
            })?;
        }
        Command::Check {
            input,
            keep_duplicates,
            paths,
        } => {
            let input_config = craft_config.input(&input).cloned().unwrap_or(InputConfig {
                name: input,
                ..InputConfig::default()
            });
            run_check(&craft_config, &messages, &input_config, &paths, keep_duplicates)?;
        }
        Command::Hydrate { list } => {
            let urls = hydration::parse_url_list(&list)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let images = runtime.block_on(hydration::fetch_all(&HttpFetcher::new(), &urls));
            output::print_lines(&output::format_hydration(urls.len(), &images));
        }
        Command::GenConfig => unreachable!("handled above"),
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

type Controller = CollectionController<RustCodec>;

/// Load `edit.input` as a single record, apply `op`, write the result.
///
/// `op` receives the record id and its natural dimensions and returns extra
/// report lines.
fn run_edit(
    craft_config: &CraftConfig,
    messages: &MessageTable,
    edit: &EditArgs,
    op: impl FnOnce(&mut Controller, &mut Workspace, &str, (u32, u32)) -> Result<Vec<String>, CraftError>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut controller_config = ControllerConfig::new("cli");
    controller_config.output_format = edit
        .format
        .map(OutputFormat::from)
        .unwrap_or(craft_config.output_format);
    controller_config.quality = edit
        .quality
        .map(Quality::new)
        .unwrap_or_else(|| craft_config.quality());
    controller_config.compression = craft_config.compression.settings();
    controller_config.limits.duplicates = DuplicatePolicy::Keep;
    let format = controller_config.output_format;

    let codec = RustCodec::new();
    let source = SourceFile::from_path(&edit.input)?;
    let original = codec.decode(&source.data)?;
    let before = RasterSummary {
        width: original.width(),
        height: original.height(),
        bytes: source.size(),
    };

    let mut ws = Workspace::new();
    let mut ctl = Controller::new(controller_config, codec, messages.clone());
    let outcome = ctl
        .add_files(&mut ws, vec![source], &mut |_: &DuplicateRequest<'_>| true)
        .map_err(|e| report(&ctl, e))?;
    let Some(id) = outcome.added.first().cloned() else {
        return Err(format!("{} is not an image", edit.input.display()).into());
    };

    let extra = op(&mut ctl, &mut ws, &id, (before.width, before.height)).map_err(|e| report(&ctl, e))?;

    let download = ctl.download(&ws, &id).map_err(|e| report(&ctl, e))?;
    let out_path = edit
        .output
        .clone()
        .unwrap_or_else(|| default_output(&edit.input, format));
    std::fs::write(&out_path, &download.bytes)?;

    let edited = codec.decode(&download.bytes)?;
    let after = RasterSummary {
        width: edited.width(),
        height: edited.height(),
        bytes: download.bytes.len() as u64,
    };
    let mut lines = output::format_edit(&edit.input, &out_path, before, after);
    lines.extend(extra);
    output::print_lines(&lines);
    ctl.cleanup(&mut ws);
    Ok(())
}

/// Log the full error, return the localized message.
fn report(ctl: &Controller, error: CraftError) -> String {
    log::error!("{error}");
    ctl.messages().user_message(&error)
}

/// `<dir>/<stem>-edited.<ext>` next to the input.
fn default_output(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{stem}-edited.{}", format.extension()))
}

/// Collect files from `paths`, descending into directories.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<SourceFile>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = walkdir::WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| {
                            rust_codec::supported_input_extensions()
                                .contains(&e.to_ascii_lowercase().as_str())
                        })
                })
                .collect();
            entries.sort();
            for entry in entries {
                files.push(SourceFile::from_path(&entry)?);
            }
        } else {
            files.push(SourceFile::from_path(path)?);
        }
    }
    Ok(files)
}

fn run_check(
    craft_config: &CraftConfig,
    messages: &MessageTable,
    input: &InputConfig,
    paths: &[PathBuf],
    keep_duplicates: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = collect_files(paths)?;
    let controller_config = ControllerConfig::from_config(craft_config, input);
    let mut ctl = Controller::new(controller_config, RustCodec::new(), messages.clone());
    let mut ws = Workspace::new();

    let mut decide = |request: &DuplicateRequest<'_>| {
        log::info!("{}", messages.duplicate(&request.file.name));
        keep_duplicates
    };
    match ctl.add_files(&mut ws, files.clone(), &mut decide) {
        Ok(outcome) => output::print_lines(&output::format_check(input, &files, &outcome)),
        Err(e) => {
            let message = report(&ctl, e);
            output::print_lines(&output::format_rejection(input, &message));
        }
    }
    ctl.cleanup(&mut ws);
    Ok(())
}
