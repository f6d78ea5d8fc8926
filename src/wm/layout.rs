//! Deterministic split-screen geometry.
//!
//! Fraction tables indexed by [player_count][slot_index]: one player gets
//! the full screen, two split top/bottom, three give the first player the
//! full-width top half and split the bottom half, four tile the quadrants
//! in slot-ordinal order. Every layout covers the whole screen.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

const X_FRAC: [[f32; 4]; 5] = [
    [0.0, 0.0, 0.0, 0.0], // 0 players (unused)
    [0.0, 0.0, 0.0, 0.0], // 1 player
    [0.0, 0.0, 0.0, 0.0], // 2 players (top/bottom)
    [0.0, 0.0, 0.5, 0.0], // 3 players (full top, split bottom)
    [0.0, 0.5, 0.0, 0.5], // 4 players
];

const Y_FRAC: [[f32; 4]; 5] = [
    [0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0],
    [0.0, 0.5, 0.0, 0.0],
    [0.0, 0.5, 0.5, 0.0],
    [0.0, 0.0, 0.5, 0.5],
];

const W_FRAC: [[f32; 4]; 5] = [
    [1.0, 1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0, 1.0],
    [1.0, 0.5, 0.5, 1.0],
    [0.5, 0.5, 0.5, 0.5],
];

const H_FRAC: [[f32; 4]; 5] = [
    [1.0, 1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0, 1.0],
    [0.5, 0.5, 1.0, 1.0],
    [0.5, 0.5, 0.5, 1.0],
    [0.5, 0.5, 0.5, 0.5],
];

/// Rectangles for `total` players on a screen of the given pixel size,
/// in slot-ordinal order.
///
/// Edges are computed from cumulative fractions so adjacent rectangles
/// share a boundary exactly, even for odd screen dimensions.
pub fn compute_rectangles(total: usize, screen_w: u32, screen_h: u32) -> Vec<Rect> {
    let count = total.clamp(1, 4);

    (0..count)
        .map(|i| {
            let left = (X_FRAC[count][i] * screen_w as f32).round() as i32;
            let top = (Y_FRAC[count][i] * screen_h as f32).round() as i32;
            let right = ((X_FRAC[count][i] + W_FRAC[count][i]) * screen_w as f32).round() as i32;
            let bottom = ((Y_FRAC[count][i] + H_FRAC[count][i]) * screen_h as f32).round() as i32;

            Rect {
                x: left,
                y: top,
                width: (right - left) as u32,
                height: (bottom - top) as u32,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlaps(a: &Rect, b: &Rect) -> bool {
        let a_right = a.x + a.width as i32;
        let a_bottom = a.y + a.height as i32;
        let b_right = b.x + b.width as i32;
        let b_bottom = b.y + b.height as i32;
        a.x < b_right && b.x < a_right && a.y < b_bottom && b.y < a_bottom
    }

    fn within_screen(rect: &Rect, w: u32, h: u32) -> bool {
        rect.x >= 0
            && rect.y >= 0
            && rect.x + rect.width as i32 <= w as i32
            && rect.y + rect.height as i32 <= h as i32
    }

    fn check(total: usize, w: u32, h: u32, expected_area: u64) {
        let rects = compute_rectangles(total, w, h);
        assert_eq!(rects.len(), total);

        for rect in &rects {
            assert!(within_screen(rect, w, h), "{:?} exceeds {}x{}", rect, w, h);
        }
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                assert!(
                    !overlaps(&rects[i], &rects[j]),
                    "{:?} overlaps {:?}",
                    rects[i],
                    rects[j]
                );
            }
        }

        let area: u64 = rects
            .iter()
            .map(|r| r.width as u64 * r.height as u64)
            .sum();
        assert_eq!(area, expected_area);
    }

    #[test]
    fn one_player_fills_the_screen() {
        check(1, 1920, 1080, 1920 * 1080);
        let rects = compute_rectangles(1, 1920, 1080);
        assert_eq!(
            rects[0],
            Rect {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn two_players_split_top_and_bottom() {
        check(2, 1920, 1080, 1920 * 1080);
        let rects = compute_rectangles(2, 1920, 1080);
        assert_eq!(rects[0].y, 0);
        assert_eq!(rects[1].y, 540);
        assert_eq!(rects[0].width, 1920);
        assert_eq!(rects[1].width, 1920);
    }

    #[test]
    fn four_players_tile_the_quadrants() {
        check(4, 1920, 1080, 1920 * 1080);
        let rects = compute_rectangles(4, 1920, 1080);
        let corners: Vec<(i32, i32)> = rects.iter().map(|r| (r.x, r.y)).collect();
        assert_eq!(corners, vec![(0, 0), (960, 0), (0, 540), (960, 540)]);
    }

    #[test]
    fn three_players_cover_the_whole_screen() {
        // Player 1 takes the full-width top half, players 2 and 3 split
        // the bottom half.
        check(3, 1920, 1080, 1920 * 1080);
        let rects = compute_rectangles(3, 1920, 1080);
        let corners: Vec<(i32, i32)> = rects.iter().map(|r| (r.x, r.y)).collect();
        assert_eq!(corners, vec![(0, 0), (0, 540), (960, 540)]);
        assert_eq!(rects[0].width, 1920);
        assert_eq!(rects[1].width + rects[2].width, 1920);
    }

    #[test]
    fn every_player_count_partitions_the_screen() {
        for total in 1..=4 {
            check(total, 1920, 1080, 1920 * 1080);
            check(total, 1367, 769, 1367 * 769);
        }
    }

    #[test]
    fn odd_dimensions_still_cover_without_gaps() {
        // 1366x768 panel with an odd width: halves must meet exactly.
        let rects = compute_rectangles(4, 1367, 769);
        assert_eq!(rects[0].width + rects[1].width, 1367);
        assert_eq!(rects[0].height + rects[2].height, 769);
        let area: u64 = rects
            .iter()
            .map(|r| r.width as u64 * r.height as u64)
            .sum();
        assert_eq!(area, 1367 * 769);
    }

    #[test]
    fn computation_is_deterministic() {
        assert_eq!(
            compute_rectangles(3, 2560, 1440),
            compute_rectangles(3, 2560, 1440)
        );
    }
}
