use dct_forensics::{
    analysis::{
        noise_residual::ResidualExtractor,
        quality_factor::QualityEstimator,
        upsampling::{UpsamplingMode, UpsamplingUndo},
    },
    detection::Detector,
    error::Result,
    image_utils::rgb_to_ycbcr,
    report::visualization::Visualizer,
    transform::BlockTransform,
};
use image::{Rgb, RgbImage};

fn main() -> Result<()> {
    // Half-resolution chroma, replicated back to full size
    let small = RgbImage::from_fn(64, 48, |x, y| {
        Rgb([(x * 4) as u8, (y * 5) as u8, ((x * y) % 256) as u8])
    });
    let image = RgbImage::from_fn(128, 96, |x, y| *small.get_pixel(x / 2, y / 2));

    let [_, cb, _] = rgb_to_ycbcr(&image);
    println!("Simple upsampling score: {:.3}", UpsamplingUndo::classify(&cb));

    let transform = BlockTransform::jpeg();
    let cb_blocks = transform.plane_to_coefficients(&cb)?;
    let reduced = UpsamplingUndo::new().reduce(&cb_blocks, UpsamplingMode::Auto)?;
    println!("Reduced {:?} blocks to {:?}", &cb_blocks.shape()[..2], &reduced.shape()[..2]);

    let detector = Detector::default();
    println!("{} score: {:.4}", detector.name(), detector.detect_score(&reduced)?);

    let residual = ResidualExtractor::new().extract(&reduced, true)?;
    println!("Noise residual score: {:.4}", detector.detect_score(&residual.dct_blocks)?);

    let mut estimator = QualityEstimator::new("output/quality_factors.json");
    estimator.append(50, &[16.0; 64])?;
    estimator.append(90, &[3.0; 64])?;
    let estimate = estimator.find_nearest(&[4.0; 64])?;
    println!(
        "Estimated quality factor: {} (distance {:.2})",
        estimate.quality_factor, estimate.distance
    );

    let map = detector.detect_map(&reduced)?;
    let visualizer = Visualizer::new();
    visualizer.visualize_channels(&map, &map).save_all("output")?;
    if let Some(pixels) = residual.pixels {
        visualizer.render_plane(&pixels).save("output/cb_residual.png")?;
    }

    Ok(())
}
