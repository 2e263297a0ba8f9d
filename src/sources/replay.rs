//! Replay of recorded sessions.
//!
//! A recording is a JSON Lines file with one frame per line:
//!
//! ```json
//! {"timestamp": "2024-05-01T12:00:00Z", "width": 640, "height": 480,
//!  "faces": [{"region": {"x": 10, "y": 20, "width": 96, "height": 96},
//!             "encoding": [0.1, 0.2],
//!             "vitals": {"heart_rate": 110, "breathing_rate": 16}}]}
//! ```
//!
//! `encoding` and `vitals` may be `null`, which replays as an extraction
//! failure or a missing reading for that face. Blank lines are ignored. A line
//! that does not parse is reported as an error for that frame only.
//!
//! One recording backs all four collaborator traits. The frame source
//! publishes the faces of the frame it just returned; the detector, extractor
//! and vitals views read from that.

use super::{FaceDetector, FeatureExtractor, FrameSource, VitalsSource};
use crate::models::{FaceEncoding, FaceRegion, Frame, VitalReading};
use crate::storage::sqlite::acquire_lock;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug, Deserialize)]
struct RecordedFrame {
    timestamp: DateTime<Utc>,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    faces: Vec<RecordedFace>,
}

#[derive(Debug, Clone, Deserialize)]
struct RecordedFace {
    region: FaceRegion,
    encoding: Option<Vec<f64>>,
    vitals: Option<RecordedVitals>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct RecordedVitals {
    heart_rate: u32,
    breathing_rate: u32,
}

#[derive(Debug)]
struct CurrentFrame {
    index: u64,
    faces: Vec<RecordedFace>,
}

type Shared = Arc<Mutex<Option<CurrentFrame>>>;

/// The four collaborator views over one recording.
pub struct Replay {
    /// Frame source.
    pub frames: ReplayFrameSource,
    /// Face detector.
    pub detector: ReplayDetector,
    /// Feature extractor.
    pub extractor: ReplayExtractor,
    /// Vitals source.
    pub vitals: ReplayVitals,
}

impl Replay {
    /// Opens a recording file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameSourceUnavailable`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            Error::FrameSourceUnavailable(format!("cannot open {}: {e}", path.display()))
        })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }

    /// Replays a recording from any buffered reader.
    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        let shared: Shared = Arc::new(Mutex::new(None));
        Self {
            frames: ReplayFrameSource {
                lines: Box::new(reader.lines()),
                next_index: 0,
                line_number: 0,
                shared: Arc::clone(&shared),
            },
            detector: ReplayDetector {
                shared: Arc::clone(&shared),
            },
            extractor: ReplayExtractor {
                shared: Arc::clone(&shared),
            },
            vitals: ReplayVitals { shared },
        }
    }
}

/// Frame source view of a recording.
pub struct ReplayFrameSource {
    lines: Box<dyn Iterator<Item = std::io::Result<String>> + Send>,
    next_index: u64,
    line_number: usize,
    shared: Shared,
}

impl FrameSource for ReplayFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            let Some(line) = self.lines.next() else {
                *acquire_lock(&self.shared) = None;
                return Ok(None);
            };
            self.line_number += 1;

            let line = line.map_err(|e| {
                self.next_index += 1;
                Error::OperationFailed {
                    operation: "read_replay_line".to_string(),
                    cause: format!("line {}: {e}", self.line_number),
                }
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let index = self.next_index;
            self.next_index += 1;

            let recorded: RecordedFrame = match serde_json::from_str(&line) {
                Ok(recorded) => recorded,
                Err(e) => {
                    *acquire_lock(&self.shared) = None;
                    return Err(Error::OperationFailed {
                        operation: "parse_replay_frame".to_string(),
                        cause: format!("line {}: {e}", self.line_number),
                    });
                },
            };

            let frame = Frame::empty(index, recorded.timestamp, recorded.width, recorded.height);
            *acquire_lock(&self.shared) = Some(CurrentFrame {
                index,
                faces: recorded.faces,
            });
            return Ok(Some(frame));
        }
    }
}

fn with_face<T>(
    shared: &Shared,
    frame: &Frame,
    region: &FaceRegion,
    f: impl FnOnce(&RecordedFace) -> Result<T>,
) -> Result<T> {
    let current = acquire_lock(shared);
    let face = current
        .as_ref()
        .filter(|current| current.index == frame.index)
        .and_then(|current| current.faces.get(region.id))
        .ok_or_else(|| Error::OperationFailed {
            operation: "replay_lookup".to_string(),
            cause: format!("no recorded face {} in frame {}", region.id, frame.index),
        })?;
    f(face)
}

/// Detector view of a recording.
pub struct ReplayDetector {
    shared: Shared,
}

impl FaceDetector for ReplayDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>> {
        let current = acquire_lock(&self.shared);
        let current = current
            .as_ref()
            .filter(|current| current.index == frame.index)
            .ok_or_else(|| Error::OperationFailed {
                operation: "replay_detect".to_string(),
                cause: format!("frame {} is not the current replay frame", frame.index),
            })?;

        Ok(current
            .faces
            .iter()
            .enumerate()
            .map(|(id, face)| FaceRegion { id, ..face.region })
            .collect())
    }
}

/// Feature extractor view of a recording.
pub struct ReplayExtractor {
    shared: Shared,
}

impl FeatureExtractor for ReplayExtractor {
    fn extract(&mut self, frame: &Frame, region: &FaceRegion) -> Result<FaceEncoding> {
        with_face(&self.shared, frame, region, |face| {
            face.encoding
                .clone()
                .map(FaceEncoding::new)
                .ok_or_else(|| {
                    Error::ExtractionFailed(format!(
                        "no encoding recorded for face {} in frame {}",
                        region.id, frame.index
                    ))
                })
        })
    }
}

/// Vitals view of a recording.
pub struct ReplayVitals {
    shared: Shared,
}

impl VitalsSource for ReplayVitals {
    fn read(&mut self, region: &FaceRegion, frame: &Frame) -> Result<VitalReading> {
        with_face(&self.shared, frame, region, |face| {
            face.vitals
                .map(|v| VitalReading::new(v.heart_rate, v.breathing_rate, frame.captured_at))
                .ok_or_else(|| {
                    Error::VitalsUnavailable(format!(
                        "no vitals recorded for face {} in frame {}",
                        region.id, frame.index
                    ))
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const RECORDING: &str = r#"{"timestamp":"2024-05-01T12:00:00Z","width":640,"height":480,"faces":[{"region":{"x":1,"y":2,"width":3,"height":4},"encoding":[0.5,0.5],"vitals":{"heart_rate":110,"breathing_rate":16}},{"region":{"x":5,"y":6,"width":7,"height":8},"encoding":null,"vitals":null}]}

not json
{"timestamp":"2024-05-01T12:00:01Z","faces":[]}
"#;

    fn replay() -> Replay {
        Replay::from_reader(Cursor::new(RECORDING.as_bytes().to_vec()))
    }

    #[test]
    fn test_replays_faces_of_current_frame() {
        let mut replay = replay();
        let frame = replay.frames.next_frame().unwrap().unwrap();
        assert_eq!(frame.index, 0);
        assert_eq!(frame.width, 640);

        let regions = replay.detector.detect(&frame).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1].id, 1);
        assert_eq!(regions[1].x, 5);

        let encoding = replay.extractor.extract(&frame, &regions[0]).unwrap();
        assert_eq!(encoding.as_slice(), &[0.5, 0.5]);
        let reading = replay.vitals.read(&regions[0], &frame).unwrap();
        assert_eq!((reading.heart_rate, reading.breathing_rate), (110, 16));
        assert_eq!(reading.observed_at, frame.captured_at);

        assert!(matches!(
            replay.extractor.extract(&frame, &regions[1]),
            Err(Error::ExtractionFailed(_))
        ));
        assert!(matches!(
            replay.vitals.read(&regions[1], &frame),
            Err(Error::VitalsUnavailable(_))
        ));
    }

    #[test]
    fn test_bad_line_is_a_per_frame_error() {
        let mut replay = replay();
        replay.frames.next_frame().unwrap().unwrap();

        let err = replay.frames.next_frame().unwrap_err();
        assert!(err.to_string().contains("line 3"));

        let frame = replay.frames.next_frame().unwrap().unwrap();
        assert_eq!(frame.index, 2);
        assert!(replay.detector.detect(&frame).unwrap().is_empty());

        assert!(replay.frames.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_stale_frame_is_rejected() {
        let mut replay = replay();
        let first = replay.frames.next_frame().unwrap().unwrap();
        let _ = replay.frames.next_frame();
        assert!(replay.detector.detect(&first).is_err());
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let result = Replay::open(Path::new("/nonexistent/recording.jsonl"));
        assert!(matches!(result, Err(Error::FrameSourceUnavailable(_))));
    }
}
