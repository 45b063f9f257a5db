use sheet_packer_core::packer::tree::SplitPolicy;
use sheet_packer_core::prelude::*;

fn descriptors(sizes: &[(&str, u32, u32)]) -> Vec<ImageDescriptor> {
    sizes
        .iter()
        .map(|&(k, w, h)| {
            ImageDescriptor::from_dimensions(k, w, h, ImageType::Png, &ImageParams::default())
                .unwrap()
        })
        .collect()
}

fn place(packer: &mut TreePacker<String>, images: &[ImageDescriptor], order: &[usize]) -> Vec<(String, Rect)> {
    order
        .iter()
        .map(|&i| {
            let d = &images[i];
            let r = packer
                .pack(d.key().to_string(), d.effective_width(), d.effective_height())
                .expect("fits");
            (d.key().to_string(), r)
        })
        .collect()
}

#[test]
fn golden_layout_in_square_root() {
    let images = descriptors(&[("a", 50, 50), ("b", 30, 30), ("c", 20, 80)]);
    let order = SortOrder::AreaDesc.strategy().order(&images);
    assert_eq!(order, vec![0, 2, 1]);

    let mut packer = TreePacker::new(Rect::with_size(0, 0, 200, 200), SplitPolicy::LargerSlack);
    let placed = place(&mut packer, &images, &order);
    // 50x50: dw == dh so the root is cut horizontally, then its top strip vertically.
    assert_eq!(placed[0], ("a".into(), Rect::with_size(0, 0, 50, 50)));
    // 20x80 is taller than the 50px strip and drops to the lower region.
    assert_eq!(placed[1], ("c".into(), Rect::with_size(0, 50, 20, 80)));
    // 30x30 reuses the slack right of the first image.
    assert_eq!(placed[2], ("b".into(), Rect::with_size(50, 0, 30, 30)));
}

#[test]
fn golden_layout_with_group_bounding_box() {
    let cfg = SheetConfig::builder().bounding_box_size(200).build();
    let mut engine = PackingEngine::new(cfg).unwrap();
    for d in descriptors(&[("a", 50, 50), ("b", 30, 30), ("c", 20, 80)]) {
        engine.add_descriptor(d).unwrap();
    }
    let group = engine.group("png").unwrap();
    // longest height (80) wins, so the box is 200 wide and 80 tall.
    assert_eq!(
        PackerKind::Tree.bounding_box(group, 200),
        Rect::with_size(0, 0, 200, 80)
    );

    let layout = engine.layout();
    assert!(layout.errors.is_empty());
    let at = |k: &str| {
        let p = layout.placements.iter().find(|p| p.key == k).unwrap();
        (p.x, p.y)
    };
    assert_eq!(at("a"), (0, 0));
    assert_eq!(at("c"), (50, 0));
    assert_eq!(at("b"), (0, 50));
    assert_eq!(layout.groups[0].sheet_size(), (70, 80));
}

#[test]
fn golden_layout_is_reproducible() {
    let run = || {
        let mut engine = PackingEngine::new(SheetConfig::default()).unwrap();
        for d in descriptors(&[("a", 17, 9), ("b", 9, 17), ("c", 33, 3), ("d", 3, 33), ("e", 12, 12)]) {
            engine.add_descriptor(d).unwrap();
        }
        engine
            .layout()
            .placements
            .into_iter()
            .map(|p| (p.key, p.x, p.y))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn repeat_pins_the_other_axis() {
    let mut x = SheetGroup::new(Some("bg"), ImageType::Png);
    let params = ImageParams {
        name: Some("bg".into()),
        repeat: Some(Repeat::X),
        ..Default::default()
    };
    x.add_image(ImageDescriptor::from_dimensions("h.png", 40, 4, ImageType::Png, &params).unwrap())
        .unwrap();
    x.add_image(ImageDescriptor::from_dimensions("h2.png", 10, 6, ImageType::Png, &params).unwrap())
        .unwrap();
    assert_eq!(
        PackerKind::Tree.bounding_box(&x, 500),
        Rect::with_size(0, 0, 40, 500)
    );

    let mut y = SheetGroup::new(Some("bg"), ImageType::Png);
    let params = ImageParams {
        repeat: Some(Repeat::Y),
        ..params
    };
    y.add_image(ImageDescriptor::from_dimensions("v.png", 4, 40, ImageType::Png, &params).unwrap())
        .unwrap();
    assert_eq!(
        PackerKind::Tree.bounding_box(&y, 500),
        Rect::with_size(0, 0, 500, 40)
    );
}

#[test]
fn horizontal_packer_lays_out_one_row() {
    let cfg = SheetConfig::builder()
        .packer(PackerKind::Horizontal)
        .sorter(SortOrder::None)
        .bounding_box_size(1000)
        .build();
    let mut engine = PackingEngine::new(cfg).unwrap();
    for d in descriptors(&[("a", 20, 30), ("b", 10, 12), ("c", 5, 30)]) {
        engine.add_descriptor(d).unwrap();
    }
    let layout = engine.layout();
    assert!(layout.errors.is_empty());
    let xs: Vec<(String, u32, u32)> = layout
        .placements
        .iter()
        .map(|p| (p.key.clone(), p.x, p.y))
        .collect();
    assert_eq!(
        xs,
        vec![("a".into(), 0, 0), ("b".into(), 20, 0), ("c".into(), 30, 0)]
    );
    assert_eq!(layout.groups[0].sheet_size(), (35, 30));
}
