// ============================================================================
// Collage CLI: headless flatten / normalize
// ============================================================================
//
// Usage examples:
//   collage -i a.png b.png c.jpg --aspect 16:9 -o board.png
//   collage -i "shots/*.jpg" -o board.png --filter lanczos3
//   collage -i *.jpg --normalize 1024x1024 --output-dir refs/
//   collage -i ref.jpg --normalize            (uses reference_size)
//
// Flatten mode decodes every input as one batch, lays them out with the
// default placement and writes the flattened canvas.  Normalize mode fits
// each input onto a transparent target on its own.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::{AspectRatio, CanvasSize};
use crate::compositor::{self, Interpolation};
use crate::io::{self, ImageSource};
use crate::session::EditorSession;
use crate::settings::EditorSettings;
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Collage headless compositor.
#[derive(Parser, Debug)]
#[command(
    name = "collage",
    about = "Lay out images on a canvas and flatten them, or normalize reference images",
    long_about = "Decode images, place them on a canvas from the aspect-ratio menu\n\
                  (1:1, 16:9, 9:16, 4:3, 3:4) and write the flattened PNG, or fit each\n\
                  image onto a fixed-size transparent PNG.\n\n\
                  Example:\n  \
                  collage -i a.png b.png --aspect 16:9 -o out.png\n  \
                  collage -i *.jpg --normalize 1024x1024 --output-dir refs/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Flattened output PNG (flatten mode, default `collage.png`).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory (normalize mode).  Files keep their stem.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Canvas aspect ratio: 1:1, 16:9, 9:16, 4:3, 3:4.
    #[arg(short, long, value_name = "W:H")]
    pub aspect: Option<AspectRatio>,

    /// Normalize each input onto a WxH transparent canvas instead of
    /// flattening them together.  Without a value the configured
    /// `reference_size` is used.
    #[arg(short, long, value_name = "WxH", num_args = 0..=1)]
    pub normalize: Option<Option<CanvasSize>>,

    /// Resampling filter: nearest, triangle, catmullrom, lanczos3.
    #[arg(short, long, value_name = "FILTER", value_parser = parse_filter)]
    pub filter: Option<Interpolation>,

    /// Settings file to use instead of the per-user one.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_filter(s: &str) -> Result<Interpolation, String> {
    Interpolation::from_key(s).ok_or_else(|| {
        let known: Vec<&str> = Interpolation::all().iter().map(|f| f.key()).collect();
        format!("unknown filter '{}' (expected one of: {})", s, known.join(", "))
    })
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let mut settings = match &args.config {
        Some(path) => match EditorSettings::load_from(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: could not read config '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => EditorSettings::load(),
    };
    if let Some(filter) = args.filter {
        settings.resample_filter = filter;
    }

    // Resolve glob patterns / literal paths → concrete PathBufs
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    let ok = match normalize_target(&args, &settings) {
        Some(target) => run_normalize(&inputs, target, &args, &settings),
        None => run_flatten(&inputs, &args, settings),
    };
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

// ============================================================================
// Flatten mode
// ============================================================================

fn run_flatten(inputs: &[PathBuf], args: &CliArgs, settings: EditorSettings) -> bool {
    let start = Instant::now();
    let output = args.output.clone().unwrap_or_else(|| PathBuf::from("collage.png"));
    let aspect = args.aspect.unwrap_or(settings.default_aspect);

    let mut any_failure = false;
    let mut sources = Vec::with_capacity(inputs.len());
    for path in inputs {
        match io::read_source(path) {
            Ok(src) => sources.push(src),
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    let mut session = EditorSession::new_untitled(1, settings);
    if let Err(e) = session.canvas.set_aspect_ratio(aspect) {
        eprintln!("error: {}", e);
        return false;
    }
    let outcome = pollster::block_on(session.add_images(sources));
    for e in &outcome.failed {
        eprintln!("  error: {}", e);
        any_failure = true;
    }
    if args.verbose {
        for id in &outcome.added {
            if let Some(layer) = session.canvas.layers.get(*id) {
                println!(
                    "  {} → ({:.0}, {:.0}) {:.0}x{:.0}",
                    layer.name, layer.x, layer.y, layer.width, layer.height
                );
            }
        }
    }

    let flat = match session.canvas.composite() {
        Ok(img) => img,
        Err(e) => {
            eprintln!("error: {}", e);
            log_err!("CLI flatten failed: {}", e);
            return false;
        }
    };
    if let Err(e) = io::write_png(&flat, &output) {
        eprintln!("error: could not write '{}': {}", output.display(), e);
        return false;
    }

    log_info!("CLI flattened {} layers to {}", outcome.added.len(), output.display());
    if args.verbose {
        println!(
            "{} layers on {} ({}) → {} ({:.0}ms)",
            outcome.added.len(),
            aspect.size(),
            session.canvas.settings.resample_filter.label(),
            output.display(),
            start.elapsed().as_secs_f64() * 1000.0
        );
    }
    !any_failure
}

// ============================================================================
// Normalize mode
// ============================================================================

fn run_normalize(inputs: &[PathBuf], target: CanvasSize, args: &CliArgs, settings: &EditorSettings) -> bool {
    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return false;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return false;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;
    if args.verbose {
        println!("Normalizing onto {} ({})", target, settings.resample_filter.label());
    }

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match normalize_one(input_path, &output_path, target, settings.resample_filter) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }
    !any_failure
}

fn normalize_one(input: &Path, output: &Path, target: CanvasSize, filter: Interpolation) -> Result<(), String> {
    let source: ImageSource = io::read_source(input).map_err(|e| e.to_string())?;
    let decoded = io::decode_image(&source).map_err(|e| e.to_string())?;
    let normalized = compositor::normalize(&decoded.pixels, target, filter)
        .map_err(|e| format!("normalize failed: {}", e))?;
    io::write_png(&normalized.image, output).map_err(|e| format!("save failed: {}", e))
}

// ============================================================================
// Helpers
// ============================================================================

/// Normalize target, if normalize mode was requested.
fn normalize_target(args: &CliArgs, settings: &EditorSettings) -> Option<CanvasSize> {
    args.normalize.map(|size| size.unwrap_or(settings.reference_size))
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Output path for one normalized file.
///
/// Priority:
/// 1. `--output` (explicit path, single-file input)
/// 2. `--output-dir` (input stem + `.png`)
/// 3. Next to the input as `<stem>.png`, or `<stem>_out.png` if that
///    would overwrite the input
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.png", stem)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.png", stem));
    if candidate == input {
        Some(parent.join(format!("{}_out.png", stem)))
    } else {
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("collage-cli-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_input(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        io::write_png(&RgbaImage::from_pixel(w, h, Rgba([0, 128, 255, 255])), &path).unwrap();
        path
    }

    #[test]
    fn parses_modes() {
        let args = CliArgs::try_parse_from(["collage", "-i", "a.png", "b.png", "--aspect", "9:16", "-o", "x.png"]).unwrap();
        assert_eq!(args.input, ["a.png", "b.png"]);
        assert_eq!(args.aspect, Some(AspectRatio::Portrait));
        assert!(args.normalize.is_none());

        let args = CliArgs::try_parse_from(["collage", "-i", "a.png", "--normalize", "512x256", "--filter", "nearest"]).unwrap();
        assert_eq!(args.normalize, Some(Some(CanvasSize { width: 512, height: 256 })));
        assert_eq!(args.filter, Some(Interpolation::Nearest));

        assert!(CliArgs::try_parse_from(["collage", "-i", "a.png", "--aspect", "2:1"]).is_err());
        let err = parse_filter("box").unwrap_err();
        for key in ["nearest", "triangle", "catmullrom", "lanczos3"] {
            assert!(err.contains(key), "{err}");
        }
        assert!(CliArgs::try_parse_from(["collage", "-o", "x.png"]).is_err());
    }

    #[test]
    fn bare_normalize_uses_reference_size() {
        let mut settings = EditorSettings::default();
        settings.reference_size = CanvasSize { width: 640, height: 480 };

        let args = CliArgs::try_parse_from(["collage", "-i", "a.png", "--normalize"]).unwrap();
        assert_eq!(args.normalize, Some(None));
        assert_eq!(normalize_target(&args, &settings), Some(CanvasSize { width: 640, height: 480 }));

        let args = CliArgs::try_parse_from(["collage", "--normalize", "-i", "a.png"]).unwrap();
        assert_eq!(normalize_target(&args, &settings), Some(CanvasSize { width: 640, height: 480 }));

        let args = CliArgs::try_parse_from(["collage", "-i", "a.png", "-n", "32x32"]).unwrap();
        assert_eq!(normalize_target(&args, &settings), Some(CanvasSize { width: 32, height: 32 }));

        let args = CliArgs::try_parse_from(["collage", "-i", "a.png"]).unwrap();
        assert_eq!(normalize_target(&args, &settings), None);
    }

    #[test]
    fn output_path_priority() {
        let input = Path::new("shots/cat.png");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), Some(Path::new("out"))),
            Some(PathBuf::from("x.png"))
        );
        assert_eq!(build_output_path(input, None, Some(Path::new("out"))), Some(PathBuf::from("out/cat.png")));
        assert_eq!(build_output_path(input, None, None), Some(PathBuf::from("shots/cat_out.png")));
        assert_eq!(
            build_output_path(Path::new("shots/cat.jpg"), None, None),
            Some(PathBuf::from("shots/cat.png"))
        );
    }

    #[test]
    fn flatten_writes_canvas_sized_png() {
        let dir = temp_dir();
        let a = write_input(&dir, "a.png", 40, 20);
        let b = write_input(&dir, "b.png", 2000, 500);
        let out = dir.join("board.png");
        let args = CliArgs::try_parse_from([
            "collage",
            "-i",
            a.to_str().unwrap(),
            b.to_str().unwrap(),
            "--aspect",
            "4:3",
            "-o",
            out.to_str().unwrap(),
        ])
        .unwrap();
        assert!(run_flatten(&[a, b], &args, EditorSettings::default()));
        let written = image::open(&out).unwrap();
        assert_eq!((written.width(), written.height()), (1024, 768));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn flatten_reports_bad_inputs() {
        let dir = temp_dir();
        let good = write_input(&dir, "good.png", 8, 8);
        let bad = dir.join("bad.png");
        std::fs::write(&bad, b"not an image").unwrap();
        let out = dir.join("out.png");
        let args = CliArgs::try_parse_from([
            "collage",
            "-i",
            good.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ])
        .unwrap();
        assert!(!run_flatten(&[good, bad], &args, EditorSettings::default()));
        // The good image still produced output.
        assert!(out.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn normalize_writes_each_file() {
        let dir = temp_dir();
        let a = write_input(&dir, "wide.png", 300, 100);
        let b = write_input(&dir, "tiny.png", 10, 10);
        let out_dir = dir.join("refs");
        let args = CliArgs::try_parse_from([
            "collage",
            "-i",
            a.to_str().unwrap(),
            "--normalize",
            "128x128",
            "--output-dir",
            out_dir.to_str().unwrap(),
        ])
        .unwrap();
        let target = CanvasSize { width: 128, height: 128 };
        assert!(run_normalize(&[a, b], target, &args, &EditorSettings::default()));
        for name in ["wide.png", "tiny.png"] {
            let img = image::open(out_dir.join(name)).unwrap();
            assert_eq!((img.width(), img.height()), (128, 128));
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn resolve_dedupes_and_globs() {
        let dir = temp_dir();
        let a = write_input(&dir, "a.png", 2, 2);
        write_input(&dir, "b.png", 2, 2);
        let a_str = a.to_string_lossy().into_owned();
        let pattern = dir.join("*.png").to_string_lossy().into_owned();
        let found = resolve_inputs(&[a_str.clone(), a_str, pattern]);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], a);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
