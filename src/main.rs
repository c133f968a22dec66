//! Effect Compositor - Command Line Entry Point
//!
//! Loads an image, runs it through the configured effect chain for a number
//! of frames and writes the last frame.
//!
//! Usage: effect-compositor <input> <output> [options]

use std::env;
use std::path::PathBuf;
use std::process;

use effect_compositor::effects::{EffectController, EffectRegistry, ImageTransfer, RenderBackend};
use effect_compositor::settings::EffectSettings;
use effect_compositor::telemetry::{init_logging, LogConfig};
use effect_compositor::{CpuBackend, WgpuBackend};

const USAGE: &str = "Usage: effect-compositor <input> <output> [options]

Options:
  --settings FILE        Load settings XML (default: user config directory)
  --frames N             Frames to render (default: 1)
  --backend cpu|gpu      Rendering backend (default: cpu)
  --fallback-adapter     Request a software GPU adapter
  --set NAME=VALUE       Override a parameter (repeatable); NAME is the
                         schema name (vignette_intensity) or the XML
                         element name (vignetteIntensity)
  --save-settings FILE   Write the effective settings to FILE
  --log-file FILE        Also log to FILE
  -v, --verbose          Debug logging
  -h, --help             Show this help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    Cpu,
    Gpu,
}

#[derive(Debug)]
struct CliArgs {
    input: PathBuf,
    output: PathBuf,
    settings: Option<PathBuf>,
    frames: u32,
    backend: BackendKind,
    fallback_adapter: bool,
    overrides: Vec<(String, f32)>,
    save_settings: Option<PathBuf>,
    log_file: Option<PathBuf>,
    verbose: bool,
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut positional = Vec::new();
    let mut settings = None;
    let mut frames = 1;
    let mut backend = BackendKind::Cpu;
    let mut fallback_adapter = false;
    let mut overrides = Vec::new();
    let mut save_settings = None;
    let mut log_file = None;
    let mut verbose = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| iter.next().cloned().ok_or_else(|| format!("{} needs a value", flag));
        match arg.as_str() {
            "--settings" => settings = Some(PathBuf::from(value(arg.as_str())?)),
            "--frames" => {
                let raw = value(arg.as_str())?;
                frames = raw
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| format!("invalid frame count: {}", raw))?;
            }
            "--backend" => {
                backend = match value(arg.as_str())?.as_str() {
                    "cpu" => BackendKind::Cpu,
                    "gpu" => BackendKind::Gpu,
                    other => return Err(format!("unknown backend: {}", other)),
                }
            }
            "--fallback-adapter" => fallback_adapter = true,
            "--set" => {
                let raw = value(arg.as_str())?;
                let (name, v) = raw
                    .split_once('=')
                    .ok_or_else(|| format!("expected NAME=VALUE, got {}", raw))?;
                let v = v
                    .trim()
                    .parse::<f32>()
                    .map_err(|_| format!("invalid value for {}: {}", name, v))?;
                overrides.push((name.trim().to_string(), v));
            }
            "--save-settings" => save_settings = Some(PathBuf::from(value(arg.as_str())?)),
            "--log-file" => log_file = Some(PathBuf::from(value(arg.as_str())?)),
            "-v" | "--verbose" => verbose = true,
            flag if flag.starts_with('-') => return Err(format!("unknown option: {}", flag)),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let mut positional = positional.into_iter();
    let (Some(input), Some(output), None) = (positional.next(), positional.next(), positional.next()) else {
        return Err("expected exactly <input> and <output>".to_string());
    };

    Ok(CliArgs {
        input,
        output,
        settings,
        frames,
        backend,
        fallback_adapter,
        overrides,
        save_settings,
        log_file,
        verbose,
    })
}

fn load_settings(args: &CliArgs) -> Result<EffectSettings, String> {
    let mut settings = match &args.settings {
        Some(path) => EffectSettings::load_from_file(path)
            .map_err(|e| format!("failed to load {}: {}", path.display(), e))?,
        None => EffectSettings::load_or_default(),
    };

    apply_overrides(&mut settings, &args.overrides)?;

    if let Some(path) = &args.save_settings {
        settings
            .save_to_file(path)
            .map_err(|e| format!("failed to save {}: {}", path.display(), e))?;
        tracing::info!(path = %path.display(), "Saved settings");
    }
    Ok(settings)
}

fn apply_overrides(settings: &mut EffectSettings, overrides: &[(String, f32)]) -> Result<(), String> {
    for (name, value) in overrides {
        if !settings.set_parameter(name, *value) {
            return Err(format!("unknown parameter: {}", name));
        }
    }
    Ok(())
}

/// Render `frames` ticks of the effect chain and return the last frame
fn render<B: RenderBackend + ImageTransfer>(
    backend: &mut B,
    settings: EffectSettings,
    image: &image::RgbaImage,
    frames: u32,
) -> Result<image::RgbaImage, String> {
    let registry = EffectRegistry::with_builtin();
    let delta_time = settings.frame_interval().as_secs_f32();
    let mut controller = EffectController::new(settings).map_err(|e| e.to_string())?;
    controller
        .initialize(backend, &registry)
        .map_err(|e| format!("failed to initialize effects: {}", e))?;

    let result = run_frames(backend, &mut controller, image, frames, delta_time);

    let metrics = controller.metrics();
    tracing::info!(
        frames = metrics.frame_count,
        passes = metrics.pass_count,
        active = metrics.active_pass_count,
        avg_ms = metrics.frame_stats.avg_ms,
        p95_ms = metrics.frame_stats.p95_ms,
        budget = metrics.budget_usage(),
        "Render complete"
    );
    controller.dispose(backend);
    result
}

fn run_frames<B: RenderBackend + ImageTransfer>(
    backend: &mut B,
    controller: &mut EffectController,
    image: &image::RgbaImage,
    frames: u32,
    delta_time: f32,
) -> Result<image::RgbaImage, String> {
    let (width, height) = image.dimensions();
    let source = backend
        .create_framebuffer(width, height, "Source")
        .map_err(|e| e.to_string())?;
    let destination = match backend.create_framebuffer(width, height, "Destination") {
        Ok(id) => id,
        Err(e) => {
            backend.release_framebuffer(source);
            return Err(e.to_string());
        }
    };

    let result = (|| -> Result<image::RgbaImage, String> {
        backend.upload(source, image).map_err(|e| e.to_string())?;
        for _ in 0..frames {
            let report = controller
                .tick(backend, delta_time, source, destination)
                .map_err(|e| format!("frame failed: {}", e))?;
            for (effect, uniform) in &report.apply.missing_uniforms {
                tracing::debug!(frame = report.frame, effect = %effect, uniform = %uniform, "Uniform not bound");
            }
        }
        backend.download(destination).map_err(|e| e.to_string())
    })();

    backend.release_framebuffer(source);
    backend.release_framebuffer(destination);
    result
}

fn run(args: CliArgs) -> Result<(), String> {
    let settings = load_settings(&args)?;
    tracing::info!(
        target_fps = settings.target_fps,
        passes = settings.passes.len(),
        "Loaded settings"
    );

    let image = image::open(&args.input)
        .map_err(|e| format!("failed to read {}: {}", args.input.display(), e))?
        .to_rgba8();
    tracing::info!(
        path = %args.input.display(),
        width = image.width(),
        height = image.height(),
        "Loaded input"
    );

    let output = match args.backend {
        BackendKind::Cpu => render(&mut CpuBackend::new(), settings, &image, args.frames)?,
        BackendKind::Gpu => {
            let mut backend = WgpuBackend::new_headless(args.fallback_adapter).map_err(|e| e.to_string())?;
            tracing::info!(adapter = %backend.context().adapter_name(), "GPU backend ready");
            render(&mut backend, settings, &image, args.frames)?
        }
    };

    output
        .save(&args.output)
        .map_err(|e| format!("failed to write {}: {}", args.output.display(), e))?;
    tracing::info!(path = %args.output.display(), "Wrote output");
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{}", USAGE);
        return;
    }

    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            process::exit(2);
        }
    };

    // Keep the guard alive for the program duration
    let _log_guard = match init_logging(&LogConfig::for_cli(args.verbose, args.log_file.clone())) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("Effect Compositor v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_minimal() {
        let cli = parse_args(&args(&["in.png", "out.png"])).unwrap();
        assert_eq!(cli.input, PathBuf::from("in.png"));
        assert_eq!(cli.output, PathBuf::from("out.png"));
        assert_eq!(cli.frames, 1);
        assert_eq!(cli.backend, BackendKind::Cpu);
        assert!(cli.overrides.is_empty());
    }

    #[test]
    fn test_parse_options() {
        let cli = parse_args(&args(&[
            "--backend",
            "gpu",
            "in.png",
            "--set",
            "vignette_intensity=0.8",
            "--set",
            "blur_intensity = 0.25",
            "--frames",
            "30",
            "out.png",
            "-v",
        ]))
        .unwrap();
        assert_eq!(cli.backend, BackendKind::Gpu);
        assert_eq!(cli.frames, 30);
        assert!(cli.verbose);
        assert_eq!(
            cli.overrides,
            vec![
                ("vignette_intensity".to_string(), 0.8),
                ("blur_intensity".to_string(), 0.25)
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&["in.png"])).is_err());
        assert!(parse_args(&args(&["a", "b", "c"])).is_err());
        assert!(parse_args(&args(&["a", "b", "--frames", "0"])).is_err());
        assert!(parse_args(&args(&["a", "b", "--backend", "vulkan"])).is_err());
        assert!(parse_args(&args(&["a", "b", "--set", "novalue"])).is_err());
        assert!(parse_args(&args(&["a", "b", "--settings"])).is_err());
        assert!(parse_args(&args(&["a", "b", "--bogus"])).is_err());
    }

    #[test]
    fn test_overrides_accept_both_name_forms() {
        let cli = parse_args(&args(&[
            "in.png",
            "out.png",
            "--set",
            "impastoIntensity=0.5",
            "--set",
            "blur_intensity=0.2",
        ]))
        .unwrap();
        let mut settings = EffectSettings::default();
        apply_overrides(&mut settings, &cli.overrides).unwrap();
        assert_eq!(settings.impasto_intensity, 0.5);
        assert_eq!(settings.blur_intensity, 0.2);

        let bad = vec![("exposure".to_string(), 1.0)];
        assert!(apply_overrides(&mut settings, &bad).is_err());
    }

    #[test]
    fn test_render_on_cpu() {
        let image = image::RgbaImage::from_pixel(16, 16, image::Rgba([90, 140, 200, 255]));
        let mut settings = EffectSettings::default();
        settings.vignette_intensity = 1.0;
        let mut backend = CpuBackend::new();

        let output = render(&mut backend, settings, &image, 3).unwrap();
        assert_eq!(output.dimensions(), (16, 16));
        assert!(output.get_pixel(0, 0)[0] < 90);
        // Everything the run allocated is released again
        assert_eq!(backend.framebuffer_count(), 0);
        assert_eq!(backend.program_count(), 0);
    }
}
