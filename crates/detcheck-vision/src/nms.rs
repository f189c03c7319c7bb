use std::collections::VecDeque;

use serde::Deserialize;

use crate::Detection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NmsMode {
    /// Any overlapping pair competes, whatever the class.
    #[default]
    Agnostic,
    /// Only boxes of the same class suppress each other.
    PerClass,
}

/// IoU of two `[x1, y1, x2, y2]` boxes. Inverted or empty boxes have zero
/// area; a zero union yields 0.
pub fn iou_xyxy(a: [f64; 4], b: [f64; 4]) -> f64 {
    let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = ix * iy;
    let a1 = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let a2 = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = a1 + a2 - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

/// Class-agnostic greedy suppression without a cap.
pub fn nms(dets: Vec<Detection>, iou_th: f64) -> Vec<Detection> {
    nms_filter(dets, iou_th, NmsMode::Agnostic, None)
}

/// Greedy highest-score-first suppression. A candidate is dropped when its
/// IoU with a kept box exceeds `iou_th`. Equal scores keep input order.
pub fn nms_filter(dets: Vec<Detection>, iou_th: f64, mode: NmsMode, max_det: Option<usize>) -> Vec<Detection> {
    let mut order: Vec<usize> = (0..dets.len()).collect();
    order.sort_by(|&a, &b| dets[b].score.total_cmp(&dets[a].score));

    let mut pool: VecDeque<usize> = order.into();
    let mut kept: Vec<Detection> = Vec::new();

    while let Some(best) = pool.pop_front() {
        if max_det.is_some_and(|m| kept.len() >= m) { break; }
        let k = dets[best];
        kept.push(k);

        pool.retain(|&i| {
            let d = &dets[i];
            let competes = mode == NmsMode::Agnostic || d.class_id == k.class_id;
            !(competes && k.iou(d) > iou_th)
        });
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn det(x1: f64, y1: f64, x2: f64, y2: f64, score: f64, class_id: u32) -> Detection {
        Detection { x1, y1, x2, y2, score, class_id }
    }

    #[test]
    fn iou_basics() {
        assert_eq!(iou_xyxy([0.0, 0.0, 10.0, 10.0], [0.0, 0.0, 10.0, 10.0]), 1.0);
        assert_eq!(iou_xyxy([0.0, 0.0, 10.0, 10.0], [20.0, 20.0, 30.0, 30.0]), 0.0);
        let v = iou_xyxy([0.0, 0.0, 10.0, 10.0], [5.0, 0.0, 15.0, 10.0]);
        assert!((v - 50.0 / 150.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_boxes_never_overlap() {
        let point = [5.0, 5.0, 5.0, 5.0];
        let inverted = [10.0, 10.0, 0.0, 0.0];
        let real = [0.0, 0.0, 10.0, 10.0];
        assert_eq!(iou_xyxy(point, point), 0.0);
        assert_eq!(iou_xyxy(point, real), 0.0);
        assert_eq!(iou_xyxy(inverted, real), 0.0);
        assert_eq!(iou_xyxy(inverted, inverted), 0.0);
    }

    #[test]
    fn same_class_overlap_keeps_higher_score() {
        // 10x10 vs 10x8 inside it: IoU 0.8
        let a = det(0.0, 0.0, 10.0, 10.0, 0.7, 0);
        let b = det(0.0, 1.0, 10.0, 9.0, 0.9, 0);
        assert!((a.iou(&b) - 0.8).abs() < 1e-12);
        let kept = nms(vec![a, b], 0.5);
        assert_eq!(kept, vec![b]);
    }

    #[test]
    fn agnostic_suppresses_across_classes() {
        // IoU 0.9
        let a = det(0.0, 0.0, 10.0, 10.0, 0.9, 0);
        let b = det(0.0, 0.5, 10.0, 9.5, 0.6, 7);
        assert!((a.iou(&b) - 0.9).abs() < 1e-12);
        assert_eq!(nms(vec![b, a], 0.5), vec![a]);
        assert_eq!(nms_filter(vec![b, a], 0.5, NmsMode::PerClass, None), vec![a, b]);
    }

    #[test]
    fn ties_keep_input_order() {
        let a = det(0.0, 0.0, 10.0, 10.0, 0.5, 1);
        let b = det(0.0, 0.0, 10.0, 10.0, 0.5, 2);
        assert_eq!(nms(vec![a, b], 0.5), vec![a]);
        assert_eq!(nms(vec![b, a], 0.5), vec![b]);
    }

    #[test]
    fn iou_equal_to_threshold_survives() {
        let a = det(0.0, 0.0, 10.0, 10.0, 0.9, 0);
        let b = det(0.0, 0.0, 10.0, 5.0, 0.8, 0);
        assert_eq!(nms(vec![a, b], 0.5).len(), 2);
    }

    #[test]
    fn max_detections_caps_in_keep_order() {
        let dets: Vec<_> = (0..5).map(|i| det(i as f64 * 20.0, 0.0, i as f64 * 20.0 + 10.0, 10.0, 0.1 * i as f64, 0)).collect();
        let kept = nms_filter(dets, 0.5, NmsMode::Agnostic, Some(2));
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.1 * 4.0);
        assert_eq!(kept[1].score, 0.1 * 3.0);
        assert!(nms_filter(vec![det(0.0, 0.0, 1.0, 1.0, 0.9, 0)], 0.5, NmsMode::Agnostic, Some(0)).is_empty());
    }

    #[test]
    fn empty_in_empty_out() {
        assert!(nms(Vec::new(), 0.45).is_empty());
    }

    fn random_dets(rng: &mut StdRng, n: usize) -> Vec<Detection> {
        (0..n)
            .map(|_| {
                let x = rng.gen_range(0.0..200.0);
                let y = rng.gen_range(0.0..200.0);
                let w = rng.gen_range(1.0..60.0);
                let h = rng.gen_range(1.0..60.0);
                det(x, y, x + w, y + h, rng.gen_range(0.0..1.0), rng.gen_range(0..3))
            })
            .collect()
    }

    #[test]
    fn output_is_a_fixed_point() {
        let mut rng = StdRng::seed_from_u64(42);
        for round in 0..50 {
            let dets = random_dets(&mut rng, 80);
            for mode in [NmsMode::Agnostic, NmsMode::PerClass] {
                let once = nms_filter(dets.clone(), 0.45, mode, None);
                let twice = nms_filter(once.clone(), 0.45, mode, None);
                assert_eq!(once, twice, "round {round} {mode:?}");
            }
        }
    }

    #[test]
    fn kept_boxes_are_sorted_and_pairwise_below_threshold() {
        let mut rng = StdRng::seed_from_u64(9);
        let kept = nms(random_dets(&mut rng, 200), 0.3);
        for (i, a) in kept.iter().enumerate() {
            for b in &kept[i + 1..] {
                assert!(a.score >= b.score);
                assert!(a.iou(b) <= 0.3);
            }
        }
    }

    #[test]
    fn looser_threshold_keeps_at_least_as_many_on_nested_chain() {
        // concentric squares, larger = higher score
        let dets: Vec<_> = (0..6)
            .map(|i| {
                let half = (10 - i) as f64 / 2.0;
                det(50.0 - half, 50.0 - half, 50.0 + half, 50.0 + half, 1.0 - 0.1 * i as f64, 0)
            })
            .collect();
        let mut last = 0;
        for u in [0.15, 0.3, 0.45, 0.6, 0.75, 0.9] {
            let n = nms(dets.clone(), u).len();
            assert!(n >= last, "u={u}: {n} < {last}");
            last = n;
        }
        assert_eq!(nms(dets.clone(), 0.9).len(), 6);
        assert_eq!(nms(dets, 0.15).len(), 1);
    }
}
