use detcheck_vision::{
    decode_candidates, letterbox, nms, ChannelOrder, Detection, InverseMap, LetterboxGeometry, Pipeline,
    RawPrediction, SourceImage, VisionConfig,
};

fn logit(p: f64) -> f32 {
    (p / (1.0 - p)).ln() as f32
}

#[test]
fn one_confident_anchor_becomes_one_detection() {
    let mut data = vec![10.0, 10.0, 4.0, 4.0, 40.0, logit(0.9)];
    data.extend(std::iter::repeat(-40.0).take(79));
    let raw = RawPrediction::from_shape(data, &[1, 1, 85], 80).unwrap();

    let cands = decode_candidates(&raw, &InverseMap::IDENTITY, 0.25);
    let dets = nms(cands, 0.45);

    assert_eq!(dets.len(), 1);
    let d = dets[0];
    for (got, want) in d.bbox().iter().zip([8.0, 8.0, 12.0, 12.0]) {
        assert!((got - want).abs() < 1e-9);
    }
    assert!((d.score - 0.9).abs() < 1e-6);
    assert_eq!(d.class_id, 0);
}

#[test]
fn overlapping_same_class_pair_keeps_best() {
    let hi = Detection { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0, score: 0.9, class_id: 2 };
    let lo = Detection { x1: 1.0, y1: 0.0, x2: 9.0, y2: 10.0, score: 0.7, class_id: 2 };
    assert!((hi.iou(&lo) - 0.8).abs() < 1e-12);
    assert_eq!(nms(vec![lo, hi], 0.5), vec![hi]);
}

#[test]
fn overlapping_pair_of_different_classes_keeps_best() {
    let hi = Detection { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0, score: 0.8, class_id: 0 };
    let lo = Detection { x1: 0.5, y1: 0.0, x2: 9.5, y2: 10.0, score: 0.6, class_id: 5 };
    assert!((hi.iou(&lo) - 0.9).abs() < 1e-12);
    assert_eq!(nms(vec![lo, hi], 0.5), vec![hi]);
}

#[test]
fn zero_anchor_tensor_yields_nothing() {
    let raw = RawPrediction::from_shape(Vec::new(), &[1, 0, 85], 80).unwrap();
    let cands = decode_candidates(&raw, &InverseMap::IDENTITY, 0.25);
    assert!(cands.is_empty());
    assert!(nms(cands, 0.45).is_empty());
}

#[test]
fn letterboxed_box_maps_back_onto_the_object() {
    // bright 20x10 patch at (30, 40) in a 200x100 image
    let (w, h) = (200u32, 100u32);
    let mut px = vec![0u8; (w * h * 3) as usize];
    for y in 40..50 {
        for x in 30..50 {
            let i = ((y * w + x) * 3) as usize;
            px[i..i + 3].copy_from_slice(&[255, 255, 255]);
        }
    }
    let src = SourceImage::new(w, h, px, ChannelOrder::Rgb).unwrap();
    let lb = letterbox(&src, 64).unwrap();
    let g = lb.geometry;
    assert_eq!(g, LetterboxGeometry::compute(w, h, 64).unwrap());

    // pretend the network found the patch exactly
    let (x1, y1) = g.forward(30.0, 40.0);
    let (x2, y2) = g.forward(50.0, 50.0);
    let row = vec![
        ((x1 + x2) / 2.0) as f32,
        ((y1 + y2) / 2.0) as f32,
        (x2 - x1) as f32,
        (y2 - y1) as f32,
        10.0,
        10.0,
    ];
    let raw = RawPrediction::from_flat(row, 1).unwrap();
    let pipeline = Pipeline::new(VisionConfig { input_size: 64, num_classes: 1, ..Default::default() });
    let dets = pipeline.postprocess(&raw, &g).unwrap();
    assert_eq!(dets.len(), 1);
    for (got, want) in dets[0].bbox().iter().zip([30.0, 40.0, 50.0, 50.0]) {
        assert!((got - want).abs() < 1e-3, "{got} vs {want}");
    }
}
