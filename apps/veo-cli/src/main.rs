use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use veo_core::{
    canvas_spec, resolve_converter_config, ConversionError, ConverterOverrides, PlatformTarget, DEFAULT_PADDING, DEFAULT_WIDTH,
};
use veo_image::convert_bytes_with_telemetry;
use veo_telemetry::sink_from_env;

#[derive(Parser, Debug)]
#[command(
    name = "veo",
    version,
    about = "Scale an image onto a 16:9 canvas (1920x1080 by default) with white bands at the top and bottom"
)]
struct Cli {
    /// Path to the source image.
    input: PathBuf,
    #[arg(long, allow_negative_numbers = true, help = format!("Height of the top and bottom bands in pixels [default: {DEFAULT_PADDING}]"))]
    padding: Option<i64>,
    #[arg(long, allow_negative_numbers = true, help = format!("Width of the output canvas in pixels, the height follows at 16:9 [default: {DEFAULT_WIDTH}]"))]
    width: Option<i64>,
    /// Output PNG path (defaults to '<name>_veo.png' next to the input).
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
    /// Suppress progress lines.
    #[arg(long, short = 'q', default_value_t = false, action = clap::ArgAction::SetTrue)]
    quiet: bool,
    /// Print a JSON report of the placement (or of the failure) on stdout.
    #[arg(long, default_value_t = false, action = clap::ArgAction::SetTrue)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!("conversion failed: {err:?}");
            eprintln!("[error] {err:#}");
            if cli.json {
                match serde_json::to_string_pretty(&error_report(&err)) {
                    Ok(report) => println!("{}", report),
                    Err(e) => tracing::warn!("could not serialize error report: {e}"),
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let input = expand_home(&cli.input);
    if !input.exists() {
        return Err(anyhow!("input file not found: {}", input.display()));
    }

    let config = resolve_converter_config(ConverterOverrides {
        padding: cli.padding,
        width: cli.width,
    });
    canvas_spec(config.width, config.padding)?;
    let output = build_output_path(&input, cli.output.as_deref())?;

    progress(cli, format!("[info] loading '{}'...", input.display()));
    let source = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;

    let telemetry = sink_from_env();
    let telemetry_ref = telemetry.as_ref().map(|sink| sink.as_ref());
    let converted = convert_bytes_with_telemetry(&source, &config, PlatformTarget::Cli, telemetry_ref)?;
    let report = &converted.report;

    progress(cli, format!("[info] source size: {}x{} px", report.source_width, report.source_height));
    progress(
        cli,
        format!(
            "[info] resizing to {}x{} px (scale {:.4}).",
            report.resized_width, report.resized_height, report.scale
        ),
    );
    progress(cli, format!("[info] saving result to '{}' (uncompressed PNG)...", output.display()));

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(&output, &converted.png).with_context(|| format!("writing {}", output.display()))?;
    progress(cli, "[done] finished.".to_string());

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "output": output,
                "report": report,
            }))?
        );
    }
    Ok(())
}

/// Conversion failures carry their stable error code; anything else (missing
/// input, I/O) only has a message.
fn error_report(err: &anyhow::Error) -> serde_json::Value {
    match err.downcast_ref::<ConversionError>() {
        Some(conversion) => serde_json::json!({ "error": conversion.as_error_info() }),
        None => serde_json::json!({ "error": { "code": null, "message": format!("{err:#}") } }),
    }
}

fn progress(cli: &Cli, line: String) {
    if !cli.quiet {
        println!("{}", line);
    }
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn build_output_path(input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let mut path = match output {
        Some(path) => path.to_path_buf(),
        None => default_output_path(input)?,
    };
    path.set_extension("png");
    Ok(path)
}

fn default_output_path(input: &Path) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .ok_or_else(|| anyhow!("input file must include a valid file name"))?
        .to_string_lossy();
    let filename = format!("{}_veo.png", stem);
    let out_path = if let Some(parent) = input.parent() {
        parent.join(filename)
    } else {
        PathBuf::from(filename)
    };
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_sits_next_to_input() {
        let out = build_output_path(Path::new("shots/photo.final.jpg"), None).expect("path should resolve");
        assert_eq!(out, PathBuf::from("shots/photo.final_veo.png"));
    }

    #[test]
    fn explicit_output_is_forced_to_png() {
        let out = build_output_path(Path::new("photo.jpg"), Some(Path::new("out/result.jpg"))).expect("path should resolve");
        assert_eq!(out, PathBuf::from("out/result.png"));
        let out = build_output_path(Path::new("photo.jpg"), Some(Path::new("result"))).expect("path should resolve");
        assert_eq!(out, PathBuf::from("result.png"));
    }

    #[test]
    fn home_prefix_is_expanded() {
        let plain = expand_home(Path::new("images/a.png"));
        assert_eq!(plain, PathBuf::from("images/a.png"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/a.png")), home.join("a.png"));
        }
    }

    #[test]
    fn error_report_keeps_conversion_codes() {
        let err = anyhow::Error::from(ConversionError::InvalidPadding(-1));
        let report = error_report(&err);
        assert_eq!(report["error"]["code"], "invalid-padding");
        assert_eq!(report["error"]["message"], "padding cannot be negative (got -1)");

        let report = error_report(&anyhow!("input file not found: a.png"));
        assert!(report["error"]["code"].is_null());
        assert_eq!(report["error"]["message"], "input file not found: a.png");
    }

    #[test]
    fn negative_numbers_reach_the_core() {
        let cli = Cli::try_parse_from(["veo", "a.png", "--padding", "-1", "--width", "-5"]).expect("args should parse");
        assert_eq!(cli.padding, Some(-1));
        assert_eq!(cli.width, Some(-5));
        assert!(!cli.quiet);
    }
}
