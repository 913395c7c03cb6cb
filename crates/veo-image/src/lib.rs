use std::io::Cursor;
use std::time::Instant;

use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::{self, FilterType};
use image::metadata::Orientation;
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageReader, Rgb, RgbImage};
use veo_core::{
    canvas_spec, estimate_peak_rgb_bytes, plan_placement, CanvasSpec, ConversionError, ConversionReport, ConverterConfig, ImageSize,
    PlatformTarget, TelemetryEvent, TelemetryEventType, TelemetrySink,
};

pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
pub const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// A decoded image together with the orientation its metadata asks for.
/// The stored pixels are never rotated in place.
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: DynamicImage,
    orientation: Orientation,
}

impl SourceImage {
    pub fn new(image: DynamicImage, orientation: Orientation) -> Self {
        Self { image, orientation }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ConversionError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ConversionError::UnrecognizedImage(e.to_string()))?;
        let mut decoder = reader
            .into_decoder()
            .map_err(|e| ConversionError::UnrecognizedImage(e.to_string()))?;
        // broken metadata is not worth failing the conversion for
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let image = DynamicImage::from_decoder(decoder).map_err(|e| ConversionError::UnrecognizedImage(e.to_string()))?;
        Ok(Self { image, orientation })
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn stored_size(&self) -> ImageSize {
        ImageSize {
            width: self.image.width(),
            height: self.image.height(),
        }
    }

    /// Size as displayed once the orientation has been applied.
    pub fn oriented_size(&self) -> ImageSize {
        let stored = self.stored_size();
        match self.orientation {
            Orientation::Rotate90 | Orientation::Rotate270 | Orientation::Rotate90FlipH | Orientation::Rotate270FlipH => ImageSize {
                width: stored.height,
                height: stored.width,
            },
            _ => stored,
        }
    }

    /// An upright 8-bit RGB copy. Alpha is dropped, not composited.
    pub fn to_oriented_rgb(&self) -> RgbImage {
        let mut upright = DynamicImage::ImageRgb8(self.image.to_rgb8());
        upright.apply_orientation(self.orientation);
        upright.into_rgb8()
    }
}

#[derive(Debug, Clone)]
pub struct PlacementResult {
    pub output_image: RgbImage,
    pub source_size: ImageSize,
    pub resized_width: u32,
    pub resized_height: u32,
    pub scale: f64,
    pub offset_x: u32,
    pub offset_y: u32,
}

pub fn place_on_canvas(source: &SourceImage, spec: &CanvasSpec) -> Result<PlacementResult, ConversionError> {
    // plan from metadata first so bad geometry fails before any pixel copy
    let source_size = source.oriented_size();
    let placement = plan_placement(source_size, spec)?;
    tracing::debug!(
        source = %format!("{}x{}", source_size.width, source_size.height),
        canvas = %format!("{}x{}", spec.width, spec.height),
        resized = %format!("{}x{}", placement.resized_width, placement.resized_height),
        scale = placement.scale,
        peak_bytes = estimate_peak_rgb_bytes(source_size, spec),
        "placing source on canvas"
    );

    let upright = source.to_oriented_rgb();
    let resized = imageops::resize(&upright, placement.resized_width, placement.resized_height, RESAMPLE_FILTER);
    let mut canvas = RgbImage::from_pixel(spec.width, spec.height, BACKGROUND);
    imageops::replace(&mut canvas, &resized, placement.offset_x as i64, placement.offset_y as i64);

    Ok(PlacementResult {
        output_image: canvas,
        source_size,
        resized_width: placement.resized_width,
        resized_height: placement.resized_height,
        scale: placement.scale,
        offset_x: placement.offset_x,
        offset_y: placement.offset_y,
    })
}

/// Lossless 24-bit PNG with compression level 0.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, ConversionError> {
    let mut encoded = Vec::new();
    PngEncoder::new_with_quality(Cursor::new(&mut encoded), CompressionType::Uncompressed, PngFilterType::NoFilter)
        .write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8)
        .map_err(|e| ConversionError::Encode(e.to_string()))?;
    Ok(encoded)
}

#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub png: Vec<u8>,
    pub report: ConversionReport,
}

pub fn convert_bytes(bytes: &[u8], config: &ConverterConfig) -> Result<ConvertedImage, ConversionError> {
    convert_bytes_with_telemetry(bytes, config, PlatformTarget::Cli, None)
}

/// Validates the parameters, then decodes, fits and encodes `bytes`.
/// Parameter errors win over decode errors.
pub fn convert_bytes_with_telemetry(
    bytes: &[u8],
    config: &ConverterConfig,
    platform: PlatformTarget,
    telemetry: Option<&dyn TelemetrySink>,
) -> Result<ConvertedImage, ConversionError> {
    let start = Instant::now();
    if let Some(sink) = telemetry {
        sink.emit(TelemetryEvent {
            event_type: TelemetryEventType::ConversionStart,
            platform,
            duration_ms: None,
            detail: Some(format!("width={},padding={},bytes={}", config.width, config.padding, bytes.len())),
        });
    }

    match convert(bytes, config) {
        Ok(converted) => {
            if let Some(sink) = telemetry {
                let report = &converted.report;
                sink.emit(TelemetryEvent {
                    event_type: TelemetryEventType::ConversionSuccess,
                    platform,
                    duration_ms: Some(start.elapsed().as_millis() as u64),
                    detail: Some(format!(
                        "canvas={}x{},resized={}x{},scale={:.4}",
                        report.canvas_width, report.canvas_height, report.resized_width, report.resized_height, report.scale
                    )),
                });
            }
            Ok(converted)
        }
        Err(err) => {
            if let Some(sink) = telemetry {
                sink.emit(TelemetryEvent {
                    event_type: TelemetryEventType::ConversionError,
                    platform,
                    duration_ms: Some(start.elapsed().as_millis() as u64),
                    detail: Some(err.to_string()),
                });
            }
            Err(err)
        }
    }
}

fn convert(bytes: &[u8], config: &ConverterConfig) -> Result<ConvertedImage, ConversionError> {
    let spec = canvas_spec(config.width, config.padding)?;
    let source = SourceImage::decode(bytes)?;
    let placed = place_on_canvas(&source, &spec)?;
    let png = encode_png(&placed.output_image)?;
    Ok(ConvertedImage {
        png,
        report: ConversionReport {
            source_width: placed.source_size.width,
            source_height: placed.source_size.height,
            canvas_width: spec.width,
            canvas_height: spec.height,
            padding: spec.padding,
            resized_width: placed.resized_width,
            resized_height: placed.resized_height,
            scale: placed.scale,
            offset_x: placed.offset_x,
            offset_y: placed.offset_y,
        },
    })
}
