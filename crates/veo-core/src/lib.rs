use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PADDING: i64 = 180;
pub const DEFAULT_WIDTH: i64 = 1920;
pub const ASPECT_WIDTH: i64 = 16;
pub const ASPECT_HEIGHT: i64 = 9;
/// Widest canvas either shell will allocate. At this width the canvas and its
/// resampled interior together stay under a gigabyte of 8-bit RGB.
pub const MAX_CANVAS_WIDTH: i64 = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformTarget {
    Cli,
    Web,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Output canvas geometry. `height` is derived from `width` at 16:9 and the
/// padding bands never cover more than `height - 1` rows in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
}

impl CanvasSpec {
    pub fn available_width(&self) -> u32 {
        self.width
    }

    pub fn available_height(&self) -> u32 {
        self.height.saturating_sub(self.padding.saturating_mul(2))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub resized_width: u32,
    pub resized_height: u32,
    pub scale: f64,
    pub offset_x: u32,
    pub offset_y: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReport {
    pub source_width: u32,
    pub source_height: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub padding: u32,
    pub resized_width: u32,
    pub resized_height: u32,
    pub scale: f64,
    pub offset_x: u32,
    pub offset_y: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TelemetryEventType {
    ConversionStart,
    ConversionSuccess,
    ConversionError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_type: TelemetryEventType,
    pub platform: PlatformTarget,
    pub duration_ms: Option<u64>,
    pub detail: Option<String>,
}

pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("invalid canvas size: {0}")]
    InvalidDimension(String),
    #[error("padding cannot be negative (got {0})")]
    InvalidPadding(i64),
    #[error("padding of {padding}px leaves no room for the image on a {height}px tall canvas")]
    InsufficientSpace { padding: i64, height: i64 },
    #[error("source image has invalid dimensions {width}x{height}")]
    EmptySource { width: u32, height: u32 },
    #[error("could not compute a valid scale factor")]
    DegenerateScale,
    #[error("could not recognize the file contents as an image: {0}")]
    UnrecognizedImage(String),
    #[error("failed to encode PNG: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    InvalidDimension,
    InvalidPadding,
    InsufficientSpace,
    EmptySource,
    DegenerateScale,
    UnrecognizedImage,
    EncodeError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ConversionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidDimension(_) => ErrorCode::InvalidDimension,
            Self::InvalidPadding(_) => ErrorCode::InvalidPadding,
            Self::InsufficientSpace { .. } => ErrorCode::InsufficientSpace,
            Self::EmptySource { .. } => ErrorCode::EmptySource,
            Self::DegenerateScale => ErrorCode::DegenerateScale,
            Self::UnrecognizedImage(_) => ErrorCode::UnrecognizedImage,
            Self::Encode(_) => ErrorCode::EncodeError,
        }
    }

    pub fn as_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverterConfig {
    pub padding: i64,
    pub width: i64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
            width: DEFAULT_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverterOverrides {
    pub padding: Option<i64>,
    pub width: Option<i64>,
}

pub fn resolve_converter_config(overrides: ConverterOverrides) -> ConverterConfig {
    let mut cfg = ConverterConfig::default();
    if let Some(padding) = overrides.padding {
        cfg.padding = padding;
    }
    if let Some(width) = overrides.width {
        cfg.width = width;
    }
    cfg
}

/// Rounds half-way cases to the even neighbour, so 4.5 becomes 4 and 5.5 becomes 6.
fn round_half_even(value: f64) -> f64 {
    value.round_ties_even()
}

pub fn compute_canvas_size(target_width: i64) -> Result<(u32, u32), ConversionError> {
    let target_height = round_half_even(target_width.saturating_mul(ASPECT_HEIGHT) as f64 / ASPECT_WIDTH as f64);
    if target_height <= 0.0 {
        return Err(ConversionError::InvalidDimension(format!(
            "canvas height must be positive (width {} gives height {})",
            target_width, target_height
        )));
    }
    if target_width > MAX_CANVAS_WIDTH {
        return Err(ConversionError::InvalidDimension(format!(
            "canvas width {} exceeds the maximum of {}",
            target_width, MAX_CANVAS_WIDTH
        )));
    }
    let width = u32::try_from(target_width)
        .map_err(|_| ConversionError::InvalidDimension(format!("canvas width {} is too large", target_width)))?;
    Ok((width, target_height as u32))
}

pub fn validate_parameters(padding: i64, target_width: i64, target_height: i64) -> Result<(), ConversionError> {
    if target_width <= 0 {
        return Err(ConversionError::InvalidDimension(format!(
            "canvas width must be positive (got {})",
            target_width
        )));
    }
    if padding < 0 {
        return Err(ConversionError::InvalidPadding(padding));
    }
    if padding.saturating_mul(2) >= target_height {
        return Err(ConversionError::InsufficientSpace {
            padding,
            height: target_height,
        });
    }
    Ok(())
}

/// Derives the canvas for `target_width` and checks `padding` against it.
pub fn canvas_spec(target_width: i64, padding: i64) -> Result<CanvasSpec, ConversionError> {
    let (width, height) = compute_canvas_size(target_width)?;
    validate_parameters(padding, width as i64, height as i64)?;
    Ok(CanvasSpec {
        width,
        height,
        // validate_parameters bounds padding below height / 2
        padding: padding as u32,
    })
}

/// Scale-to-fit geometry for a source of `source` size inside the unpadded
/// interior of `spec`. The source is never cropped and never distorted beyond
/// the one pixel that clamping after rounding can cost.
pub fn plan_placement(source: ImageSize, spec: &CanvasSpec) -> Result<Placement, ConversionError> {
    let available_width = spec.available_width();
    let available_height = spec.available_height();
    if available_width == 0 || available_height == 0 {
        return Err(ConversionError::InsufficientSpace {
            padding: spec.padding as i64,
            height: spec.height as i64,
        });
    }
    if source.width == 0 || source.height == 0 {
        return Err(ConversionError::EmptySource {
            width: source.width,
            height: source.height,
        });
    }

    let width_ratio = available_width as f64 / source.width as f64;
    let height_ratio = available_height as f64 / source.height as f64;
    let scale = width_ratio.min(height_ratio);
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ConversionError::DegenerateScale);
    }

    let resized_width = fit_dimension(source.width, scale, available_width);
    let resized_height = fit_dimension(source.height, scale, available_height);

    let offset_x = available_width.saturating_sub(resized_width) / 2;
    let offset_y = spec.padding + available_height.saturating_sub(resized_height) / 2;

    Ok(Placement {
        resized_width,
        resized_height,
        scale,
        offset_x,
        offset_y,
    })
}

fn fit_dimension(source: u32, scale: f64, available: u32) -> u32 {
    let scaled = round_half_even(source as f64 * scale).max(1.0);
    // rounding may overshoot the interior by a pixel
    (scaled.min(available as f64) as u32).clamp(1, available)
}

/// Upper bound on bytes held at once while compositing: the decoded source,
/// its resampled copy, and the canvas, all as 8-bit RGB.
pub fn estimate_peak_rgb_bytes(source: ImageSize, spec: &CanvasSpec) -> u64 {
    let source_bytes = (source.width as u64)
        .saturating_mul(source.height as u64)
        .saturating_mul(3);
    let canvas_bytes = (spec.width as u64)
        .saturating_mul(spec.height as u64)
        .saturating_mul(3);
    source_bytes.saturating_add(canvas_bytes.saturating_mul(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(width: i64, padding: i64) -> CanvasSpec {
        canvas_spec(width, padding).expect("canvas spec should be valid")
    }

    #[test]
    fn canvas_height_follows_sixteen_by_nine() {
        assert_eq!(compute_canvas_size(1920).expect("1920 is valid"), (1920, 1080));
        assert_eq!(compute_canvas_size(1280).expect("1280 is valid"), (1280, 720));
        assert_eq!(compute_canvas_size(1).expect("1 is valid"), (1, 1));
        assert_eq!(compute_canvas_size(2).expect("2 is valid"), (2, 1));
    }

    #[test]
    fn canvas_height_rounds_half_to_even() {
        // 8 * 9 / 16 = 4.5, 24 * 9 / 16 = 13.5
        assert_eq!(compute_canvas_size(8).expect("8 is valid"), (8, 4));
        assert_eq!(compute_canvas_size(24).expect("24 is valid"), (24, 14));
    }

    #[test]
    fn canvas_height_is_positive_for_every_small_width() {
        for width in 1..=64 {
            let (w, h) = compute_canvas_size(width).expect("positive widths are valid");
            assert_eq!(w as i64, width);
            assert!(h > 0);
            assert_eq!(h as f64, (width as f64 * 9.0 / 16.0).round_ties_even());
        }
    }

    #[test]
    fn non_positive_width_is_invalid_dimension() {
        for width in [0, -1, -1920] {
            let err = compute_canvas_size(width).expect_err("non-positive width must fail");
            assert_eq!(err.code(), ErrorCode::InvalidDimension);
        }
    }

    #[test]
    fn oversized_width_is_invalid_dimension() {
        let (w, h) = compute_canvas_size(MAX_CANVAS_WIDTH).expect("the maximum itself is allowed");
        assert_eq!((w, h), (16_384, 9_216));
        for width in [MAX_CANVAS_WIDTH + 1, 4_000_000_000, i64::MAX] {
            let err = compute_canvas_size(width).expect_err("oversized width must fail");
            assert_eq!(err.code(), ErrorCode::InvalidDimension);
            assert!(err.to_string().contains("exceeds the maximum of 16384"), "{}", err);
        }
        assert_eq!(
            canvas_spec(4_000_000_000, 0).expect_err("shared guard").code(),
            ErrorCode::InvalidDimension
        );
    }

    #[test]
    fn validate_rejects_bad_parameters() {
        assert_eq!(
            validate_parameters(180, 0, 1080).expect_err("zero width").code(),
            ErrorCode::InvalidDimension
        );
        assert_eq!(
            validate_parameters(-1, 1920, 1080).expect_err("negative padding").code(),
            ErrorCode::InvalidPadding
        );
        assert_eq!(
            validate_parameters(600, 1920, 1080).expect_err("padding too large").code(),
            ErrorCode::InsufficientSpace
        );
        assert_eq!(
            validate_parameters(540, 1920, 1080).expect_err("exactly half").code(),
            ErrorCode::InsufficientSpace
        );
        validate_parameters(539, 1920, 1080).expect("one row remains");
        validate_parameters(0, 1920, 1080).expect("no padding is fine");
    }

    #[test]
    fn validate_checks_width_before_padding() {
        let err = validate_parameters(-5, -5, 1080).expect_err("both invalid");
        assert_eq!(err.code(), ErrorCode::InvalidDimension);
    }

    #[test]
    fn landscape_source_binds_on_height() {
        let placement = plan_placement(
            ImageSize {
                width: 3000,
                height: 2000,
            },
            &spec(1920, 180),
        )
        .expect("placement should work");
        assert!((placement.scale - 0.36).abs() < 1e-9);
        assert_eq!((placement.resized_width, placement.resized_height), (1080, 720));
        assert_eq!((placement.offset_x, placement.offset_y), (420, 180));
    }

    #[test]
    fn square_source_without_padding_fills_height() {
        let placement = plan_placement(
            ImageSize {
                width: 500,
                height: 500,
            },
            &spec(1920, 0),
        )
        .expect("placement should work");
        assert!((placement.scale - 2.16).abs() < 1e-9);
        assert_eq!((placement.resized_width, placement.resized_height), (1080, 1080));
        assert_eq!((placement.offset_x, placement.offset_y), (420, 0));
    }

    #[test]
    fn wide_source_binds_on_width_and_centers_vertically() {
        let canvas = spec(1920, 180);
        let placement = plan_placement(
            ImageSize {
                width: 4000,
                height: 1000,
            },
            &canvas,
        )
        .expect("placement should work");
        assert_eq!((placement.resized_width, placement.resized_height), (1920, 480));
        assert_eq!(placement.offset_x, 0);
        assert_eq!(placement.offset_y, 180 + (720 - 480) / 2);
    }

    #[test]
    fn placement_never_exceeds_interior_and_keeps_aspect() {
        let canvas = spec(1920, 180);
        let sources = [(1, 1), (7, 3), (3, 7), (1921, 721), (10_000, 1), (1, 10_000), (640, 480), (333, 999)];
        for (w, h) in sources {
            let placement = plan_placement(ImageSize { width: w, height: h }, &canvas).expect("placement should work");
            assert!(placement.resized_width >= 1 && placement.resized_width <= canvas.available_width());
            assert!(placement.resized_height >= 1 && placement.resized_height <= canvas.available_height());
            assert!(placement.scale <= canvas.available_width() as f64 / w as f64 + 1e-12);
            assert!(placement.scale <= canvas.available_height() as f64 / h as f64 + 1e-12);
            assert!(placement.offset_y >= canvas.padding);
            assert!(placement.offset_x + placement.resized_width <= canvas.width);
            assert!(placement.offset_y + placement.resized_height <= canvas.height - canvas.padding);

            let touches_width = placement.resized_width == canvas.available_width();
            let touches_height = placement.resized_height == canvas.available_height();
            assert!(touches_width || touches_height, "{}x{} should touch an edge", w, h);

            if touches_height && placement.resized_width > 1 {
                let expected = placement.resized_height as f64 * w as f64 / h as f64;
                assert!((placement.resized_width as f64 - expected).abs() <= 1.0);
            }
            if touches_width && placement.resized_height > 1 {
                let expected = placement.resized_width as f64 * h as f64 / w as f64;
                assert!((placement.resized_height as f64 - expected).abs() <= 1.0);
            }
        }
    }

    #[test]
    fn empty_source_is_rejected() {
        let err = plan_placement(ImageSize { width: 0, height: 10 }, &spec(1920, 180)).expect_err("zero width source");
        assert_eq!(err.code(), ErrorCode::EmptySource);
    }

    #[test]
    fn hand_built_spec_without_interior_is_rejected() {
        let canvas = CanvasSpec {
            width: 16,
            height: 9,
            padding: 5,
        };
        let err = plan_placement(ImageSize { width: 4, height: 4 }, &canvas).expect_err("no interior");
        assert_eq!(err.code(), ErrorCode::InsufficientSpace);
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let cfg = resolve_converter_config(ConverterOverrides {
            padding: Some(0),
            width: None,
        });
        assert_eq!(cfg.padding, 0);
        assert_eq!(cfg.width, DEFAULT_WIDTH);
        assert_eq!(resolve_converter_config(ConverterOverrides::default()), ConverterConfig::default());
    }

    #[test]
    fn error_info_uses_kebab_case_codes() {
        let info = ConversionError::InvalidPadding(-1).as_error_info();
        let json = serde_json::to_value(&info).expect("error info serializes");
        assert_eq!(json["code"], "invalid-padding");
        assert_eq!(json["message"], "padding cannot be negative (got -1)");
    }
}
