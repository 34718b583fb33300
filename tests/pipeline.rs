// 该文件是 Kanmen （看门） 项目的一部分。
// tests/pipeline.rs - 端到端检测流程测试
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};
use thiserror::Error;
use url::Url;

use kanmen::{
  FromUrl,
  frame::InputShape,
  label::LabelTable,
  model::{InferenceEngine, Interpreter, LoadModel},
  output::OutputWrapper,
  task::{BatchScanner, EngineSlot, HandleOutcome, WatchContext, WatchEvent, WatchHandler},
};

#[derive(Error, Debug)]
#[error("{0}")]
struct FakeError(String);

/// 从模型文件读取一行 `class score` 作为固定输出
struct FakeRuntime {
  class_id: f32,
  score: f32,
  outputs: Vec<Vec<f32>>,
}

impl LoadModel for FakeRuntime {
  fn load(path: &Path) -> Result<Self, Self::Error> {
    let content = std::fs::read_to_string(path).map_err(|e| FakeError(e.to_string()))?;
    let mut fields = content.split_whitespace().map(str::parse::<f32>);
    match (fields.next(), fields.next()) {
      (Some(Ok(class_id)), Some(Ok(score))) => Ok(FakeRuntime {
        class_id,
        score,
        outputs: Vec::new(),
      }),
      _ => Err(FakeError(format!("bad model file {}", path.display()))),
    }
  }
}

impl Interpreter for FakeRuntime {
  type Error = FakeError;

  fn allocate_tensors(&mut self) -> Result<InputShape, Self::Error> {
    Ok(InputShape::rgb(32, 32))
  }

  fn num_outputs(&self) -> usize {
    4
  }

  fn set_input(&mut self, data: &[u8]) -> Result<(), Self::Error> {
    if data.len() != 32 * 32 * 3 {
      return Err(FakeError(format!("input length {}", data.len())));
    }
    Ok(())
  }

  fn invoke(&mut self) -> Result<(), Self::Error> {
    self.outputs = vec![
      vec![0.25, 0.25, 0.75, 0.75, 0.0, 0.0, 0.1, 0.1],
      vec![self.class_id, 1.0],
      vec![self.score, 0.1],
      vec![2.0],
    ];
    Ok(())
  }

  fn output(&self, index: usize) -> Result<&[f32], Self::Error> {
    self
      .outputs
      .get(index)
      .map(Vec::as_slice)
      .ok_or_else(|| FakeError(format!("no output {}", index)))
  }
}

fn write_model(dir: &Path, content: &str) -> PathBuf {
  let path = dir.join("model.fake");
  std::fs::write(&path, content).unwrap();
  path
}

fn write_jpeg(path: &Path) {
  RgbImage::from_pixel(64, 48, Rgb([90, 90, 90]))
    .save_with_format(path, ImageFormat::Jpeg)
    .unwrap();
}

#[test]
fn batch_scan_prints_one_line_per_detection() {
  let dir = tempfile::tempdir().unwrap();
  let model = write_model(dir.path(), "1 0.85");
  let labels_path = dir.path().join("labels.txt");
  std::fs::write(&labels_path, "0 person\n1 car\n").unwrap();
  let images = dir.path().join("snapshots");
  std::fs::create_dir(&images).unwrap();
  write_jpeg(&images.join("frontdoor-0001.jpg"));
  write_jpeg(&images.join("frontdoor-0002.jpg"));
  write_jpeg(&images.join("garage-0001.jpg"));

  let labels = LabelTable::load(&labels_path).unwrap();
  let mut engine = InferenceEngine::<FakeRuntime>::load_ready(&model).unwrap();
  let scan = BatchScanner::new(&images, "frontdoor", 0.7)
    .scan(&mut engine)
    .unwrap()
    .unwrap();

  let lines: Vec<String> = scan
    .map(Result::unwrap)
    .flat_map(|record| record.describe(&labels))
    .collect();
  assert_eq!(lines.len(), 2);
  assert!(lines[0].starts_with("I found car with 0.85% certainty in frontdoor-0001.jpg"));
  assert!(lines[1].contains("frontdoor-0002.jpg"));
}

#[test]
fn batch_scan_of_empty_folder_has_no_sequence() {
  let dir = tempfile::tempdir().unwrap();
  let model = write_model(dir.path(), "0 0.9");
  let mut engine = InferenceEngine::<FakeRuntime>::load_ready(&model).unwrap();
  let scan = BatchScanner::new(dir.path(), "frontdoor", 0.7)
    .scan(&mut engine)
    .unwrap();
  assert!(scan.is_none());
}

#[cfg(feature = "directory_record")]
#[test]
fn watch_handler_records_annotated_frames() {
  let dir = tempfile::tempdir().unwrap();
  let model = write_model(dir.path(), "0 0.85");
  let records = dir.path().join("records");
  std::fs::create_dir(&records).unwrap();
  let snapshot = dir.path().join("frontdoor-1.jpg");
  write_jpeg(&snapshot);

  let url = Url::parse(&format!("folder://{}?record=json", records.display())).unwrap();
  let context = WatchContext {
    labels: LabelTable::parse("person\n").unwrap(),
    threshold: 0.4,
    annotator: Some(OutputWrapper::from_url(&url).unwrap()),
  };
  let mut handler = WatchHandler::new(context, EngineSlot::<FakeRuntime>::from_path(&model, false));

  let outcome = handler.handle(WatchEvent::Created(snapshot)).unwrap();
  let HandleOutcome::Detected(detections) = outcome else {
    panic!("expected detections");
  };
  assert_eq!(detections.len(), 1);
  assert_eq!(detections[0].class_id, 0);

  let mut saved = Vec::new();
  let mut pending = vec![records];
  while let Some(dir) = pending.pop() {
    for entry in std::fs::read_dir(dir).unwrap() {
      let path = entry.unwrap().path();
      if path.is_dir() {
        pending.push(path);
      } else {
        saved.push(path);
      }
    }
  }
  saved.sort();
  let extensions: Vec<_> = saved
    .iter()
    .filter_map(|p| p.extension().and_then(|e| e.to_str()).map(str::to_owned))
    .collect();
  assert_eq!(extensions, vec!["json", "png"]);
}

#[test]
fn broken_model_fails_before_any_event() {
  let dir = tempfile::tempdir().unwrap();
  let model = write_model(dir.path(), "not a model");
  let mut engines = EngineSlot::<FakeRuntime>::from_path(&model, false);
  assert!(engines.ready().is_err());
  assert_eq!(engines.loads(), 0);
}

#[test]
fn unknown_annotate_scheme_is_rejected() {
  let url = Url::parse("rtsp://camera/stream").unwrap();
  assert!(OutputWrapper::from_url(&url).is_err());
  let url = Url::parse("log://").unwrap();
  assert!(matches!(
    OutputWrapper::from_url(&url),
    Ok(OutputWrapper::LogOverlay(_))
  ));
}
