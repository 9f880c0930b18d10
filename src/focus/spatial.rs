//! Geometric focus navigation.
//!
//! Candidates must lie strictly past the current box's edge in the move
//! direction. If none do, candidates whose center lies past the current
//! center are considered instead. Each candidate scores
//!
//! ```text
//! 1 / (1 + distance between centers along the move axis)
//!   × (1 + 0.5 × cross-axis overlap fraction)
//! ```
//!
//! and the highest score wins. Ties go to the earlier candidate.

use crate::types::{Direction, Rect};

pub fn find_best_candidate<'a>(
    from: Rect,
    direction: Direction,
    candidates: impl IntoIterator<Item = (&'a str, Rect)>,
) -> Option<&'a str> {
    let candidates: Vec<(&str, Rect)> = candidates.into_iter().collect();

    let strict: Vec<&(&str, Rect)> = candidates
        .iter()
        .filter(|(_, r)| past_edge(&from, r, direction))
        .collect();
    let pool = if strict.is_empty() {
        candidates
            .iter()
            .filter(|(_, r)| past_center(&from, r, direction))
            .collect()
    } else {
        strict
    };

    let mut best: Option<(&str, f64)> = None;
    for (id, rect) in pool {
        let s = score(&from, rect, direction);
        if best.is_none_or(|(_, b)| s > b) {
            best = Some((*id, s));
        }
    }
    best.map(|(id, _)| id)
}

fn past_edge(from: &Rect, to: &Rect, direction: Direction) -> bool {
    match direction {
        Direction::Down => to.y >= from.bottom(),
        Direction::Up => to.bottom() <= from.y,
        Direction::Right => to.x >= from.right(),
        Direction::Left => to.right() <= from.x,
    }
}

fn past_center(from: &Rect, to: &Rect, direction: Direction) -> bool {
    let (fx, fy) = from.center2();
    let (tx, ty) = to.center2();
    match direction {
        Direction::Down => ty > fy,
        Direction::Up => ty < fy,
        Direction::Right => tx > fx,
        Direction::Left => tx < fx,
    }
}

fn score(from: &Rect, to: &Rect, direction: Direction) -> f64 {
    let (fx, fy) = from.center2();
    let (tx, ty) = to.center2();
    let distance = if direction.is_vertical() {
        (ty - fy).abs() as f64 / 2.0
    } else {
        (tx - fx).abs() as f64 / 2.0
    };

    let (overlap, span) = if direction.is_vertical() {
        (
            span_overlap(from.x, from.right(), to.x, to.right()),
            from.width,
        )
    } else {
        (
            span_overlap(from.y, from.bottom(), to.y, to.bottom()),
            from.height,
        )
    };
    let fraction = if span == 0 {
        0.0
    } else {
        (overlap as f64 / span as f64).min(1.0)
    };

    (1.0 / (1.0 + distance)) * (1.0 + 0.5 * fraction)
}

fn span_overlap(a0: u16, a1: u16, b0: u16, b1: u16) -> u16 {
    a1.min(b1).saturating_sub(a0.max(b0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stacked() -> Vec<(&'static str, Rect)> {
        vec![
            ("a", Rect::new(0, 0, 10, 3)),
            ("b", Rect::new(0, 3, 10, 3)),
            ("c", Rect::new(0, 6, 10, 3)),
        ]
    }

    fn others(boxes: &[(&'static str, Rect)], me: &str) -> Vec<(&'static str, Rect)> {
        boxes.iter().filter(|(id, _)| *id != me).copied().collect()
    }

    #[test]
    fn test_vertical_round_trip() {
        let boxes = stacked();
        assert_eq!(find_best_candidate(boxes[0].1, Direction::Down, others(&boxes, "a")), Some("b"));
        assert_eq!(find_best_candidate(boxes[1].1, Direction::Down, others(&boxes, "b")), Some("c"));
        assert_eq!(find_best_candidate(boxes[2].1, Direction::Up, others(&boxes, "c")), Some("b"));
        assert_eq!(find_best_candidate(boxes[1].1, Direction::Up, others(&boxes, "b")), Some("a"));
    }

    #[test]
    fn test_no_candidate() {
        let boxes = stacked();
        assert_eq!(find_best_candidate(boxes[0].1, Direction::Up, others(&boxes, "a")), None);
    }

    #[test]
    fn test_overlap_bonus_prefers_aligned() {
        let from = Rect::new(0, 0, 10, 2);
        // Same vertical distance; only one overlaps horizontally.
        let candidates = vec![("side", Rect::new(20, 4, 10, 2)), ("below", Rect::new(0, 4, 10, 2))];
        assert_eq!(find_best_candidate(from, Direction::Down, candidates), Some("below"));
    }

    #[test]
    fn test_center_crossing_fallback() {
        let from = Rect::new(0, 0, 10, 6);
        // Overlaps the current box, so not strictly below, but its center is lower.
        let candidates = vec![("overlap", Rect::new(12, 2, 10, 6))];
        assert_eq!(find_best_candidate(from, Direction::Down, candidates), Some("overlap"));
        let candidates = vec![("overlap", Rect::new(12, 2, 10, 6))];
        assert_eq!(find_best_candidate(from, Direction::Up, candidates), None);
    }

    #[test]
    fn test_horizontal() {
        let from = Rect::new(10, 0, 5, 1);
        let candidates = vec![("left", Rect::new(0, 0, 5, 1)), ("right", Rect::new(20, 0, 5, 1))];
        assert_eq!(find_best_candidate(from, Direction::Left, candidates.clone()), Some("left"));
        assert_eq!(find_best_candidate(from, Direction::Right, candidates), Some("right"));
    }
}
