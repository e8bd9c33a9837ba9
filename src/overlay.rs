use crate::detector::FaceDetection;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use tracing::{debug, trace};

const BOX_COLOR: Rgba<u8> = Rgba([0, 160, 255, 255]);
const KEYPOINT_COLOR: Rgba<u8> = Rgba([255, 64, 64, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// A shape rendered on the overlay, in overlay-space coordinates.
///
/// Retained alongside the raster so the UI and tests can inspect what is
/// currently drawn without decoding pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawnShape {
    Box {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Keypoint {
        x: f32,
        y: f32,
    },
}

/// The annotation overlay surface.
///
/// An RGBA raster sized to the displayed video dimensions. Written only by the
/// annotation loop: resized to track layout changes, fully cleared before each
/// frame's results are drawn, and cleared again when annotation stops so no
/// stale box ever persists.
pub struct OverlayCanvas {
    image: RgbaImage,
    shapes: Vec<DrawnShape>,
    keypoint_radius: u32,
}

impl OverlayCanvas {
    pub fn new(width: u32, height: u32, keypoint_radius: u32) -> Self {
        Self {
            image: RgbaImage::new(width.max(1), height.max(1)),
            shapes: Vec::new(),
            keypoint_radius: keypoint_radius.max(1),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Shapes currently drawn, in overlay-space coordinates
    pub fn shapes(&self) -> &[DrawnShape] {
        &self.shapes
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Match the canvas to the displayed video dimensions.
    ///
    /// A no-op when unchanged; a reallocation (which also clears) when the
    /// layout resized.
    pub fn resize(&mut self, width: u32, height: u32) {
        let target = (width.max(1), height.max(1));
        if self.image.dimensions() == target {
            return;
        }
        debug!(
            "Overlay resized: {:?} -> {:?}",
            self.image.dimensions(),
            target
        );
        self.image = RgbaImage::new(target.0, target.1);
        self.shapes.clear();
    }

    /// Erase everything previously drawn
    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = TRANSPARENT;
        }
        self.shapes.clear();
    }

    /// Draw detection results, scaling detector-space coordinates (relative to
    /// the native video resolution) into overlay-space coordinates via
    /// independent horizontal/vertical scale factors.
    pub fn draw_detections(&mut self, detections: &[FaceDetection], native_size: (u32, u32)) {
        let (display_w, display_h) = self.image.dimensions();
        let scale_x = display_w as f32 / native_size.0.max(1) as f32;
        let scale_y = display_h as f32 / native_size.1.max(1) as f32;

        for detection in detections {
            let b = &detection.bounding_box;
            let (x, y) = (b.x * scale_x, b.y * scale_y);
            let (w, h) = (b.width * scale_x, b.height * scale_y);
            self.draw_box(x, y, w, h);

            for keypoint in &detection.keypoints {
                self.draw_keypoint(keypoint.x * scale_x, keypoint.y * scale_y);
            }
        }
        trace!(
            "Overlay drew {} detection(s) at scale ({:.3}, {:.3})",
            detections.len(),
            scale_x,
            scale_y
        );
    }

    fn draw_box(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let rect_w = (width.round() as i64).max(1) as u32;
        let rect_h = (height.round() as i64).max(1) as u32;
        let rect = Rect::at(x.round() as i32, y.round() as i32).of_size(rect_w, rect_h);
        draw_hollow_rect_mut(&mut self.image, rect, BOX_COLOR);
        self.shapes.push(DrawnShape::Box {
            x,
            y,
            width,
            height,
        });
    }

    fn draw_keypoint(&mut self, x: f32, y: f32) {
        draw_filled_circle_mut(
            &mut self.image,
            (x.round() as i32, y.round() as i32),
            self.keypoint_radius as i32,
            KEYPOINT_COLOR,
        );
        self.shapes.push(DrawnShape::Keypoint { x, y });
    }
}
