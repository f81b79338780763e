//! Frame annotation: tag outlines, centers, ids and the motion trail.

mod font;
mod trail;

pub use font::draw_text;
pub use trail::{TrailSegment, TrailTracker, DEFAULT_TRAIL_INTERVAL};

use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::detect::TagDetection;
use crate::frame::{Bgr, BgrImage, Frame};

pub const BOX_COLOR: Bgr = Bgr::new(0, 255, 0);
pub const TRAIL_COLOR: Bgr = Bgr::new(255, 0, 0);
pub const CENTER_COLOR: Bgr = Bgr::new(0, 0, 255);
pub const LABEL_COLOR: Bgr = Bgr::new(0, 255, 0);

const LINE_THICKNESS: i32 = 2;
const CENTER_RADIUS: i32 = 5;
/// Label baseline sits this far above corner A.
const LABEL_OFFSET_Y: i32 = 15;
const LABEL_SCALE: i32 = 2;

/// Draw every detection onto `frame`, feeding each center through `trail`.
///
/// Per tag: outline, trail segment, center dot, id label.
pub fn annotate(frame: &mut Frame, detections: &[TagDetection], trail: &mut TrailTracker) {
    let image = frame.image_mut();
    for detection in detections {
        let corners = detection.corners_px();
        for i in 0..4 {
            draw_thick_line(image, corners[i], corners[(i + 1) % 4], LINE_THICKNESS, BOX_COLOR);
        }

        let center = detection.center_px();
        let segment = trail.observe(center);
        draw_thick_line(image, segment.from, segment.to, LINE_THICKNESS, TRAIL_COLOR);

        draw_filled_circle_mut(image, center, CENTER_RADIUS, CENTER_COLOR.pixel());

        let (ax, ay) = corners[0];
        draw_text(
            image,
            ax,
            ay - LABEL_OFFSET_Y,
            &detection.id.to_string(),
            LABEL_SCALE,
            LABEL_COLOR,
        );
    }
}

/// Line of the given thickness, built from parallel one-pixel segments
/// offset along the minor axis.
pub fn draw_thick_line(
    image: &mut BgrImage,
    from: (i32, i32),
    to: (i32, i32),
    thickness: i32,
    color: Bgr,
) {
    let steep = (to.1 - from.1).abs() > (to.0 - from.0).abs();
    for offset in 0..thickness.max(1) {
        let (dx, dy) = if steep { (offset, 0) } else { (0, offset) };
        draw_line_segment_mut(
            image,
            ((from.0 + dx) as f32, (from.1 + dy) as f32),
            ((to.0 + dx) as f32, (to.1 + dy) as f32),
            color.pixel(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn blank_frame(width: u32, height: u32) -> Frame {
        Frame::from_bgr(vec![0; (width * height * 3) as usize], width, height, 1).unwrap()
    }

    fn square_tag(id: u32, left: f64, top: f64, side: f64) -> TagDetection {
        TagDetection {
            id,
            hamming: 0,
            decision_margin: 50.0,
            center: [left + side / 2.0, top + side / 2.0],
            corners: [
                [left, top + side],
                [left + side, top + side],
                [left + side, top],
                [left, top],
            ],
        }
    }

    #[test]
    fn draws_box_center_and_trail() {
        let mut frame = blank_frame(120, 100);
        let mut trail = TrailTracker::default();
        trail.tick();
        annotate(&mut frame, &[square_tag(3, 40.0, 40.0, 30.0)], &mut trail);

        let image = frame.image();
        // Box edge (top side, y = 40) is green.
        assert_eq!(*image.get_pixel(50, 40), Rgb([0, 255, 0]));
        // Center dot is red in BGR order.
        assert_eq!(*image.get_pixel(55, 55), Rgb([0, 0, 255]));
        // Trail from the origin passes through (20, 20) and is blue in BGR order.
        assert_eq!(*image.get_pixel(20, 20), Rgb([255, 0, 0]));
    }

    #[test]
    fn label_is_drawn_above_corner_a() {
        let mut frame = blank_frame(120, 100);
        let mut trail = TrailTracker::default();
        annotate(&mut frame, &[square_tag(1, 40.0, 30.0, 40.0)], &mut trail);
        // Corner A is (40, 70); the label occupies rows 41..55 right of the box edge.
        let image = frame.image();
        let label_rows = 41..55;
        let green = Rgb([0, 255, 0]);
        let hit = label_rows
            .flat_map(|y| (42..52).map(move |x| (x, y)))
            .any(|(x, y)| *image.get_pixel(x, y) == green);
        assert!(hit);
    }

    #[test]
    fn tags_outside_the_frame_do_not_panic() {
        let mut frame = blank_frame(32, 32);
        let mut trail = TrailTracker::default();
        annotate(
            &mut frame,
            &[square_tag(9, -50.0, -50.0, 20.0), square_tag(12, 30.0, 30.0, 40.0)],
            &mut trail,
        );
    }

    #[test]
    fn thick_line_covers_two_rows() {
        let mut image = BgrImage::new(20, 20);
        draw_thick_line(&mut image, (2, 5), (15, 5), 2, BOX_COLOR);
        assert_eq!(*image.get_pixel(8, 5), Rgb([0, 255, 0]));
        assert_eq!(*image.get_pixel(8, 6), Rgb([0, 255, 0]));
        assert_eq!(*image.get_pixel(8, 7), Rgb([0, 0, 0]));
    }
}
