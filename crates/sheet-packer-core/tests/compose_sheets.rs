use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use sheet_packer_core::prelude::*;

fn png(dir: &Path, name: &str, w: u32, h: u32, px: Rgba<u8>) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(w, h, px).save(&path).unwrap();
    path
}

fn engine_in(root: &Path) -> PackingEngine {
    let cfg = SheetConfig::builder()
        .root_dir(root)
        .image_output_dir("sprites")
        .build();
    PackingEngine::new(cfg).unwrap()
}

#[test]
fn margins_are_never_painted() {
    let dir = tempfile::tempdir().unwrap();
    let red = Rgba([255, 0, 0, 255]);
    let src = png(dir.path(), "dot.png", 10, 10, red);

    let mut engine = engine_in(dir.path());
    let params = ImageParams {
        margin: Some([5, 5, 5, 5]),
        ..Default::default()
    };
    let key = engine.add_image(&src, &params).unwrap();
    assert_eq!(key, "dot.png");
    let d = &engine.group("png").unwrap().images()[0];
    assert_eq!((d.effective_width(), d.effective_height()), (20, 20));

    let out = engine.process();
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let sheet = &out.sheets[0];
    assert!(sheet.written);
    assert_eq!((sheet.record.width, sheet.record.height), (20, 20));

    let p = out.placements().next().unwrap();
    assert_eq!((p.x, p.y, p.width, p.height), (0, 0, 20, 20));

    let raster = image::open(&sheet.path).unwrap().to_rgba8();
    assert_eq!(raster.dimensions(), (20, 20));
    assert_eq!(raster.get_pixel(4, 4)[3], 0);
    assert_eq!(*raster.get_pixel(5, 5), red);
    assert_eq!(*raster.get_pixel(14, 14), red);
    assert_eq!(raster.get_pixel(15, 15)[3], 0);
    assert_eq!(raster.get_pixel(5, 15)[3], 0);
}

#[test]
fn every_placement_points_inside_the_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let sizes = [(12, 7), (3, 30), (25, 25), (9, 9), (40, 2), (16, 16)];
    let mut engine = engine_in(dir.path());
    for (i, &(w, h)) in sizes.iter().enumerate() {
        let shade = (i as u8 + 1) * 30;
        let src = png(dir.path(), &format!("s{i}.png"), w, h, Rgba([shade, shade, 0, 255]));
        engine.add_image(&src, &ImageParams::default()).unwrap();
    }

    let out = engine.process();
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    assert_eq!(out.sheets.len(), 1);
    let sheet = &out.sheets[0];
    let raster = image::open(&sheet.path).unwrap().to_rgba8();
    let (w, h) = raster.dimensions();
    assert_eq!((w, h), (sheet.record.width, sheet.record.height));

    let records: Vec<&PlacementRecord> = out.placements().collect();
    assert_eq!(records.len(), sizes.len());
    for r in records {
        assert!(r.x + r.width <= w && r.y + r.height <= h, "{} escapes the sheet", r.key);
        assert_eq!(r.sheet, sheet.record.relative_path);
        let (i, _) = sizes
            .iter()
            .enumerate()
            .find(|(i, _)| r.key == format!("s{i}.png"))
            .unwrap();
        let shade = (i as u8 + 1) * 30;
        assert_eq!(*raster.get_pixel(r.x, r.y), Rgba([shade, shade, 0, 255]));
    }
    assert!(sheet.stats.occupancy > 0.0 && sheet.stats.occupancy <= 1.0);
}

#[test]
fn sheet_is_named_after_its_hash() {
    let dir = tempfile::tempdir().unwrap();
    let src = png(dir.path(), "a.png", 4, 4, Rgba([0, 0, 255, 255]));
    let mut engine = engine_in(dir.path());
    engine
        .add_image(
            &src,
            &ImageParams {
                name: Some("icons".into()),
                ..Default::default()
            },
        )
        .unwrap();
    let out = engine.process();
    let record = &out.sheets[0].record;
    assert_eq!(record.group_key, "icons-png");
    assert!(record.relative_path.starts_with("sprites/"));
    assert!(record.relative_path.ends_with(".png"));
    let stem = record
        .relative_path
        .trim_start_matches("sprites/")
        .trim_end_matches(".png");
    assert_eq!(stem.len(), 32);
    assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(out.sheets[0].path, dir.path().join(&record.relative_path));
}

#[test]
fn jpeg_sheets_are_opaque() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.jpg");
    RgbImage::from_pixel(16, 8, Rgb([250, 250, 250])).save(&path).unwrap();
    let small = dir.path().join("thumb.jpg");
    RgbImage::from_pixel(4, 4, Rgb([250, 250, 250])).save(&small).unwrap();

    let cfg = SheetConfig::builder()
        .root_dir(dir.path())
        .jpg_quality(90)
        .build();
    let mut engine = PackingEngine::new(cfg).unwrap();
    engine.add_image(&path, &ImageParams::default()).unwrap();
    engine.add_image(&small, &ImageParams::default()).unwrap();

    let out = engine.process();
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let sheet = &out.sheets[0];
    assert_eq!(sheet.record.format, ImageType::Jpg);
    assert!(sheet.record.relative_path.ends_with(".jpg"));
    let decoded = image::open(&sheet.path).unwrap();
    assert_eq!(decoded.color(), image::ColorType::Rgb8);
    assert_eq!(
        (decoded.width(), decoded.height()),
        (sheet.record.width, sheet.record.height)
    );
}

#[test]
fn forced_type_changes_the_encoder() {
    let dir = tempfile::tempdir().unwrap();
    let src = png(dir.path(), "a.png", 6, 6, Rgba([10, 20, 30, 255]));
    let mut engine = engine_in(dir.path());
    engine
        .add_image(
            &src,
            &ImageParams {
                image_type: Some(ImageType::Gif),
                ..Default::default()
            },
        )
        .unwrap();
    let out = engine.process();
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let sheet = &out.sheets[0];
    assert_eq!(sheet.record.group_key, "gif");
    let format = image::ImageReader::open(&sheet.path)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .format();
    assert_eq!(format, Some(image::ImageFormat::Gif));
}
