/// A decoded tag in pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct TagDetection {
    pub id: u32,
    /// Bits corrected while decoding.
    pub hamming: u32,
    pub decision_margin: f32,
    pub center: [f64; 2],
    /// Corners A, B, C, D in the detector's winding order.
    pub corners: [[f64; 2]; 4],
}

impl TagDetection {
    /// Center truncated to integer pixels.
    pub fn center_px(&self) -> (i32, i32) {
        (self.center[0] as i32, self.center[1] as i32)
    }

    /// Corners truncated to integer pixels.
    pub fn corners_px(&self) -> [(i32, i32); 4] {
        self.corners.map(|[x, y]| (x as i32, y as i32))
    }
}
