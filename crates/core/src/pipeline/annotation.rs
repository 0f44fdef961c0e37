use std::convert::Infallible;

use embedded_graphics::{
    mono_font::{ascii, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};

use crate::attendance::domain::system_mode::SystemMode;
use crate::shared::detection_result::DetectionResult;
use crate::shared::frame::Frame;

const KNOWN_COLOR: Rgb888 = Rgb888::new(0, 200, 0);
const UNKNOWN_COLOR: Rgb888 = Rgb888::new(220, 0, 0);
const LABEL_TEXT_COLOR: Rgb888 = Rgb888::new(255, 255, 255);
const OVERLAY_COLOR: Rgb888 = Rgb888::new(255, 255, 0);

const BOX_STROKE: u32 = 2;
const LABEL_HEIGHT: u32 = 14;
const LABEL_PADDING: i32 = 3;
const OVERLAY_MARGIN: i32 = 8;

/// Status shown in the corner of every output frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlay {
    pub detection_scale: f64,
    pub mode: SystemMode,
}

impl Overlay {
    pub fn text(&self) -> String {
        format!(
            "Scale: {}x | Mode: {}",
            self.detection_scale,
            self.mode.overlay_label()
        )
    }
}

/// Draw a box and name label for each face plus the status overlay onto a
/// copy of `frame`.
pub fn annotate(frame: &Frame, faces: &[DetectionResult], overlay: &Overlay) -> Frame {
    let mut annotated = frame.clone();
    if annotated.channels() != 3 {
        return annotated;
    }
    let (width, height) = (annotated.width(), annotated.height());
    let mut target = Target {
        data: annotated.data_mut(),
        width,
        height,
    };

    for face in faces {
        draw_face(&mut target, face);
    }

    let style = MonoTextStyle::new(&ascii::FONT_6X10, OVERLAY_COLOR);
    let text = overlay.text();
    draw_on(
        &mut target,
        &Text::with_baseline(
            &text,
            Point::new(OVERLAY_MARGIN, OVERLAY_MARGIN),
            style,
            Baseline::Top,
        ),
    );
    annotated
}

fn draw_face(target: &mut Target<'_>, face: &DetectionResult) {
    let color = if face.is_known() {
        KNOWN_COLOR
    } else {
        UNKNOWN_COLOR
    };
    let b = face.face_box;
    if b.width() <= 0 || b.height() <= 0 {
        return;
    }
    let size = Size::new(b.width() as u32, b.height() as u32);

    draw_on(
        target,
        &Rectangle::new(Point::new(b.left, b.top), size)
            .into_styled(PrimitiveStyle::with_stroke(color, BOX_STROKE)),
    );

    // Filled name bar along the bottom edge of the box.
    let label_top = b.bottom - LABEL_HEIGHT as i32;
    draw_on(
        target,
        &Rectangle::new(
            Point::new(b.left, label_top),
            Size::new(size.width, LABEL_HEIGHT),
        )
        .into_styled(PrimitiveStyle::with_fill(color)),
    );
    draw_on(
        target,
        &Text::with_baseline(
            &face.name,
            Point::new(b.left + LABEL_PADDING, label_top + 2),
            MonoTextStyle::new(&ascii::FONT_6X10, LABEL_TEXT_COLOR),
            Baseline::Top,
        ),
    );
}

fn draw_on<D>(target: &mut Target<'_>, drawable: &D)
where
    D: Drawable<Color = Rgb888>,
{
    match drawable.draw(target) {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}

/// Tightly packed RGB buffer as an embedded-graphics canvas. Pixels outside
/// the frame are dropped.
struct Target<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
}

impl OriginDimensions for Target<'_> {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Target<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0
                && (point.x as u32) < self.width
                && point.y >= 0
                && (point.y as u32) < self.height
            {
                let offset = (point.y as usize * self.width as usize + point.x as usize) * 3;
                self.data[offset] = color.r();
                self.data[offset + 1] = color.g();
                self.data[offset + 2] = color.b();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::face_box::FaceBox;

    fn black(width: u32, height: u32) -> Frame {
        Frame::new(vec![0u8; (width * height * 3) as usize], width, height, 3, 0)
    }

    fn pixel(frame: &Frame, x: usize, y: usize) -> [u8; 3] {
        let arr = frame.as_ndarray();
        [arr[[y, x, 0]], arr[[y, x, 1]], arr[[y, x, 2]]]
    }

    fn overlay() -> Overlay {
        Overlay {
            detection_scale: 0.5,
            mode: SystemMode::Auto,
        }
    }

    #[test]
    fn test_known_face_is_outlined_green() {
        let frame = black(200, 200);
        let face = DetectionResult::new(FaceBox::new(60, 150, 150, 60), "alice");
        let out = annotate(&frame, &[face], &overlay());

        assert_eq!(pixel(&out, 100, 60), [0, 200, 0]);
        assert_eq!(pixel(&out, 60, 100), [0, 200, 0]);
        assert_eq!(pixel(&out, 100, 100), [0, 0, 0]);
    }

    #[test]
    fn test_unknown_face_is_outlined_red() {
        let frame = black(200, 200);
        let face = DetectionResult::unknown(FaceBox::new(60, 150, 150, 60));
        let out = annotate(&frame, &[face], &overlay());
        assert_eq!(pixel(&out, 100, 60), [220, 0, 0]);
    }

    #[test]
    fn test_label_bar_is_filled() {
        let frame = black(200, 200);
        let face = DetectionResult::new(FaceBox::new(60, 150, 150, 60), "al");
        let out = annotate(&frame, &[face], &overlay());
        // Right end of the bar, past the two label glyphs.
        assert_eq!(pixel(&out, 140, 145), [0, 200, 0]);
    }

    #[test]
    fn test_overlay_is_drawn_and_source_untouched() {
        let frame = black(320, 240);
        let out = annotate(&frame, &[], &overlay());

        let region_has_overlay = (8..20)
            .flat_map(|y| (8..120).map(move |x| (x, y)))
            .any(|(x, y)| pixel(&out, x, y) == [255, 255, 0]);
        assert!(region_has_overlay);
        assert!(frame.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_box_partly_outside_frame_is_clipped() {
        let frame = black(50, 50);
        let face = DetectionResult::new(FaceBox::new(-20, 80, 70, -10), "edge");
        let out = annotate(&frame, &[face], &overlay());
        assert_eq!(out.data().len(), frame.data().len());
    }

    #[test]
    fn test_overlay_text() {
        let text = Overlay {
            detection_scale: 0.75,
            mode: SystemMode::ForceOn,
        }
        .text();
        assert_eq!(text, "Scale: 0.75x | Mode: ON");
    }
}
