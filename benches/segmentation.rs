use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgb, RgbImage};
use roi_slicer::{AutoDetector, CancelToken, Point, RectInput, SmartSeed, SmartSegmenter, SuperpixelSegmenter};

fn synthetic_screen(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let in_button = (x / 80) % 3 == 1 && (y / 40) % 4 == 1;
        if in_button {
            Rgb([40, 120, 220])
        } else {
            Rgb([(x % 7) as u8 + 240, 240, (y % 5) as u8 + 240])
        }
    })
}

fn benchmark_segmentation(c: &mut Criterion) {
    let image = synthetic_screen(640, 360);
    let cancel = CancelToken::new();

    c.bench_function("auto_detect_seed", |b| {
        let detector = AutoDetector::new();
        b.iter(|| detector.detect(black_box(&image), Point::new(100, 60), 30.0))
    });

    c.bench_function("superpixel_precompute_640x360", |b| {
        let segmenter = SuperpixelSegmenter::new();
        b.iter(|| segmenter.precompute(black_box(&image), 400, 10.0, &cancel))
    });

    c.bench_function("smart_refine_box", |b| {
        let segmenter = SmartSegmenter::new();
        let seed = SmartSeed::Rect(RectInput::new(70, 30, 110, 60));
        b.iter(|| segmenter.refine(black_box(&image), &seed, 5, &cancel))
    });
}

criterion_group!(benches, benchmark_segmentation);
criterion_main!(benches);
