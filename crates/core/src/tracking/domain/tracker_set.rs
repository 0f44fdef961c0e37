use crate::shared::detection_result::DetectionResult;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

use super::visual_tracker::{TrackerError, VisualTracker};

struct TrackedFace {
    tracker: Box<dyn VisualTracker>,
    name: String,
}

/// Trackers for every face of one detection cycle.
///
/// The whole set is replaced each cycle. `generation` is the detection
/// cycle that produced it.
pub struct TrackerSet {
    generation: u64,
    faces: Vec<TrackedFace>,
}

impl TrackerSet {
    pub fn empty() -> Self {
        Self {
            generation: 0,
            faces: Vec::new(),
        }
    }

    /// Start one tracker per detection on the full-resolution `frame`.
    /// Detections whose tracker cannot start are left out.
    pub fn build<F>(generation: u64, frame: &Frame, detections: &[DetectionResult], start: F) -> Self
    where
        F: Fn(&Frame, &FaceBox) -> Result<Box<dyn VisualTracker>, TrackerError>,
    {
        let faces = detections
            .iter()
            .filter_map(|det| match start(frame, &det.face_box) {
                Ok(tracker) => Some(TrackedFace {
                    tracker,
                    name: det.name.clone(),
                }),
                Err(e) => {
                    log::debug!("Not tracking {} at {:?}: {e}", det.name, det.face_box);
                    None
                }
            })
            .collect();
        Self { generation, faces }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Advance every tracker against `frame` and return the faces that are
    /// still located. A tracker that fails is skipped for this frame only.
    pub fn advance(&mut self, frame: &Frame) -> Vec<DetectionResult> {
        self.faces
            .iter_mut()
            .filter_map(|face| match face.tracker.update(frame) {
                Ok(face_box) => Some(DetectionResult::new(face_box, face.name.clone())),
                Err(e) => {
                    log::debug!("Tracker for {} skipped: {e}", face.name);
                    None
                }
            })
            .collect()
    }
}

impl Default for TrackerSet {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Moves right by `step` each update; fails every update after `fail_after`.
    struct ScriptedTracker {
        position: FaceBox,
        step: i32,
        updates: usize,
        fail_after: Option<usize>,
    }

    impl VisualTracker for ScriptedTracker {
        fn update(&mut self, _frame: &Frame) -> Result<FaceBox, TrackerError> {
            self.updates += 1;
            if self.fail_after.is_some_and(|n| self.updates > n) {
                return Err(TrackerError::TargetLost);
            }
            self.position = self.position.translated(self.step, 0);
            Ok(self.position)
        }
    }

    fn frame() -> Frame {
        Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, 3, 0)
    }

    /// Trackers started on a box whose left edge equals `failing_left` fail
    /// after their first update.
    fn start_scripted(
        failing_left: Option<i32>,
    ) -> impl Fn(&Frame, &FaceBox) -> Result<Box<dyn VisualTracker>, TrackerError> {
        move |_frame: &Frame, face: &FaceBox| -> Result<Box<dyn VisualTracker>, TrackerError> {
            if face.width() < 2 {
                return Err(TrackerError::TooSmall(*face));
            }
            Ok(Box::new(ScriptedTracker {
                position: *face,
                step: 1,
                updates: 0,
                fail_after: (Some(face.left) == failing_left).then_some(1),
            }))
        }
    }

    #[test]
    fn test_build_skips_trackers_that_fail_to_start() {
        let detections = vec![
            DetectionResult::new(FaceBox::new(0, 10, 10, 0), "alice"),
            DetectionResult::unknown(FaceBox::new(0, 1, 10, 0)),
        ];
        let set = TrackerSet::build(3, &frame(), &detections, start_scripted(None));
        assert_eq!(set.len(), 1);
        assert_eq!(set.generation(), 3);
    }

    #[test]
    fn test_advance_reports_updated_positions_with_names() {
        let detections = vec![DetectionResult::new(FaceBox::new(0, 10, 10, 0), "alice")];
        let mut set = TrackerSet::build(1, &frame(), &detections, start_scripted(None));

        set.advance(&frame());
        let faces = set.advance(&frame());
        assert_eq!(faces, vec![DetectionResult::new(FaceBox::new(0, 12, 10, 2), "alice")]);
    }

    #[test]
    fn test_failing_tracker_is_skipped_individually() {
        let detections = vec![
            DetectionResult::new(FaceBox::new(0, 10, 10, 0), "alice"),
            DetectionResult::new(FaceBox::new(20, 30, 30, 20), "bob"),
        ];
        let mut set = TrackerSet::build(1, &frame(), &detections, start_scripted(Some(0)));
        assert_eq!(set.advance(&frame()).len(), 2);

        let faces = set.advance(&frame());
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].name, "bob");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_empty_set() {
        let mut set = TrackerSet::empty();
        assert!(set.is_empty());
        assert_eq!(set.generation(), 0);
        assert!(set.advance(&frame()).is_empty());
    }
}
