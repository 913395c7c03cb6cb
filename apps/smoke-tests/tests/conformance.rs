use anyhow::{anyhow, Result};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use veo_core::ConverterConfig;
use veo_web::{process_submission, AppState, Outcome, Submission, WebConfig};

fn build_sample_png(width: u32, height: u32) -> Result<Vec<u8>> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([10, 10, 10])
        }
    });
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img).write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}

#[tokio::test]
async fn shells_produce_identical_png() -> Result<()> {
    let state = AppState::new(WebConfig::default(), None);
    for (width, height, padding, canvas_width) in [(3000, 2000, 180, 1920), (500, 500, 0, 1920), (64, 200, 20, 320)] {
        let sample = build_sample_png(width, height)?;

        let cli = veo_image::convert_bytes(
            &sample,
            &ConverterConfig {
                padding,
                width: canvas_width,
            },
        )?;

        let web = process_submission(
            &state,
            Submission {
                file_name: Some("sample.png".to_string()),
                image: Some(sample),
                padding: Some(padding.to_string()),
                width: Some(canvas_width.to_string()),
            },
        )
        .await;
        let web_png = match web {
            Outcome::Download { file_name, png } => {
                assert_eq!(file_name, "sample_veo.png");
                png
            }
            Outcome::Form(model) => return Err(anyhow!("web shell rejected the upload: {:?}", model.message)),
        };

        assert_eq!(cli.png, web_png);
        let decoded = image::load_from_memory(&web_png)?;
        assert_eq!(decoded.width() as i64, canvas_width);
        assert_eq!(decoded.height() as i64, (canvas_width as f64 * 9.0 / 16.0).round() as i64);
    }
    Ok(())
}

#[test]
fn reference_scenario_places_landscape_source() -> Result<()> {
    let sample = build_sample_png(3000, 2000)?;
    let converted = veo_image::convert_bytes(&sample, &ConverterConfig::default())?;
    let report = converted.report;
    assert_eq!((report.canvas_width, report.canvas_height), (1920, 1080));
    assert_eq!((report.resized_width, report.resized_height), (1080, 720));
    assert_eq!((report.offset_x, report.offset_y), (420, 180));
    Ok(())
}
