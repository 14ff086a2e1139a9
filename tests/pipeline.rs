use std::path::{Path, PathBuf};
use std::sync::Mutex;

use video_dots::{
    ConversionConfig, DotMatrixConverter, DotMatrixDocument, DotsError, ExtractOptions, ExtractRequest, FrameSource,
    JsonStyle, RasterFrame, Result,
};

/// Hands back canned frames and records what it was asked for.
struct CannedFrames {
    frames: Vec<Vec<u8>>,
    seen: Mutex<Vec<(ExtractRequest, PathBuf)>>,
}

impl CannedFrames {
    fn new(frames: Vec<Vec<u8>>) -> Self {
        Self { frames, seen: Mutex::new(Vec::new()) }
    }
}

impl FrameSource for CannedFrames {
    fn extract_frames(&self, request: &ExtractRequest, work_dir: &Path) -> Result<Vec<RasterFrame>> {
        assert!(work_dir.is_dir());
        self.seen.lock().unwrap().push((request.clone(), work_dir.to_path_buf()));
        Ok(self.frames.iter().cloned().map(RasterFrame::new).collect())
    }
}

fn video_file() -> tempfile::NamedTempFile {
    tempfile::Builder::new().suffix(".mp4").tempfile().unwrap()
}

fn grid_2x2() -> ConversionConfig {
    ConversionConfig::default().with_grid(2, 2).with_fps(15)
}

#[test]
fn threshold_scenario_end_to_end() {
    let video = video_file();
    let converter = DotMatrixConverter::with_source(CannedFrames::new(vec![vec![0, 100, 200, 255]]));
    let doc = converter
        .convert_video(video.path(), &ExtractOptions::default(), &grid_2x2().with_threshold(128))
        .unwrap();

    assert_eq!(doc.frame_count(), 1);
    assert_eq!(doc.frames()[0].values(), &[0.0, 0.0, 1.0, 1.0]);

    let inverted = converter
        .convert_video(video.path(), &ExtractOptions::default(), &grid_2x2().with_invert(true))
        .unwrap();
    assert_eq!(inverted.frames()[0].values(), &[1.0, 1.0, 0.0, 0.0]);
}

#[test]
fn frames_keep_extraction_order() {
    let video = video_file();
    let f0 = vec![255, 0, 0, 0];
    let f1 = vec![0, 255, 0, 0];
    let f2 = vec![0, 0, 255, 0];
    let converter = DotMatrixConverter::with_source(CannedFrames::new(vec![f0, f1, f2]));

    let doc = converter
        .convert_video(video.path(), &ExtractOptions::default(), &grid_2x2())
        .unwrap();

    let lit: Vec<usize> = doc
        .frames()
        .iter()
        .map(|f| (0..f.len()).position(|i| f.is_on(i)).unwrap())
        .collect();
    assert_eq!(lit, vec![0, 1, 2]);
}

#[test]
fn many_frames_stay_ordered_through_the_pool() {
    let video = video_file();
    let frames: Vec<Vec<u8>> = (0..64u32).map(|i| vec![if i % 3 == 0 { 255 } else { 0 }; 4]).collect();
    let converter = DotMatrixConverter::with_source(CannedFrames::new(frames));

    let doc = converter
        .convert_video(video.path(), &ExtractOptions::default(), &grid_2x2())
        .unwrap();

    assert_eq!(doc.frame_count(), 64);
    for (i, frame) in doc.frames().iter().enumerate() {
        assert_eq!(frame.lit_count(), if i % 3 == 0 { 4 } else { 0 }, "frame {}", i);
    }
}

#[test]
fn request_carries_window_and_grid() {
    let video = video_file();
    let converter = DotMatrixConverter::with_source(CannedFrames::new(vec![vec![0; 12]]));
    let window = ExtractOptions::from_timestamps("00:30", "2.5").unwrap();
    let config = ConversionConfig::default().with_grid(4, 3).with_fps(24);

    converter.convert_video(video.path(), &window, &config).unwrap();

    let seen = converter.source().seen.lock().unwrap();
    let (request, work_dir) = &seen[0];
    assert_eq!(request.source, video.path());
    assert_eq!((request.start, request.duration), (30.0, 2.5));
    assert_eq!((request.fps, request.cols, request.rows), (24, 4, 3));
    // scratch space is gone once the run returns
    assert!(!work_dir.exists());
}

#[test]
fn wrong_sized_frame_aborts_the_run() {
    let video = video_file();
    let converter = DotMatrixConverter::with_source(CannedFrames::new(vec![vec![0; 12], vec![0; 11]]));
    let config = ConversionConfig::default().with_grid(4, 3);

    let err = converter
        .convert_video(video.path(), &ExtractOptions::default(), &config)
        .unwrap_err();
    assert!(matches!(err, DotsError::DimensionMismatch { expected: 12, actual: 11 }));
}

#[test]
fn no_frames_is_an_error_not_an_empty_document() {
    let video = video_file();
    let converter = DotMatrixConverter::with_source(CannedFrames::new(Vec::new()));
    let err = converter
        .convert_video(video.path(), &ExtractOptions::default(), &grid_2x2())
        .unwrap_err();
    assert!(matches!(err, DotsError::ExtractionFailed(_)));

    let err = converter.convert_frames(Vec::new(), &grid_2x2()).unwrap_err();
    assert!(matches!(err, DotsError::EmptySequence));
}

#[test]
fn invalid_window_is_rejected_before_extraction() {
    let video = video_file();
    let converter = DotMatrixConverter::with_source(CannedFrames::new(vec![vec![0; 4]]));
    let window = ExtractOptions { start: 0.0, duration: 0.0 };

    let err = converter.convert_video(video.path(), &window, &grid_2x2()).unwrap_err();
    assert!(matches!(err, DotsError::InvalidConfig(_)));
    assert!(converter.source().seen.lock().unwrap().is_empty());
}

#[test]
fn written_document_reads_back() {
    let video = video_file();
    let out_dir = tempfile::tempdir().unwrap();
    let out = out_dir.path().join("dot_video.json");
    let converter = DotMatrixConverter::with_source(CannedFrames::new(vec![vec![0, 100, 200, 255], vec![255; 4]]));

    let doc = converter
        .convert_video(video.path(), &ExtractOptions::default(), &grid_2x2())
        .unwrap();
    let size = doc.write_to_path(&out, JsonStyle::Compact).unwrap();

    let text = std::fs::read_to_string(&out).unwrap();
    assert_eq!(size, text.len() as u64);
    assert!(text.starts_with(r#"{"cols": 2, "rows": 2, "fps": 15, "frameCount": 2, "frames": [["#));

    let back = DotMatrixDocument::from_path(&out).unwrap();
    assert_eq!(back, doc);
    assert_eq!(back.frames()[1].values(), &[1.0; 4]);
}
