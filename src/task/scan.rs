// 该文件是 Kanmen （看门） 项目的一部分。
// src/task/scan.rs - 批量检测
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

use std::{
  borrow::Cow,
  io::Write,
  path::{Path, PathBuf},
  time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{error, info};

use crate::{
  frame::InputShape,
  input::{list_camera_images, read_frame},
  label::LabelTable,
  model::{Detection, EngineError, InferenceEngine, Interpreter},
  task::describe_detection,
};

#[derive(Debug, Clone)]
pub struct ScanRecord {
  pub path: PathBuf,
  /// 仅包含推理耗时，不含解码与缩放
  pub elapsed: Duration,
  pub detections: Vec<Detection>,
}

impl ScanRecord {
  pub fn file_name(&self) -> Cow<'_, str> {
    self
      .path
      .file_name()
      .map(|name| name.to_string_lossy())
      .unwrap_or_else(|| self.path.to_string_lossy())
  }

  pub fn describe(&self, labels: &LabelTable) -> Vec<String> {
    let file_name = self.file_name();
    self
      .detections
      .iter()
      .map(|detection| describe_detection(labels, detection, &file_name, self.elapsed))
      .collect()
  }
}

/// 扫描目录中某个摄像头的快照
#[derive(Debug, Clone)]
pub struct BatchScanner {
  directory: PathBuf,
  camera: String,
  threshold: f32,
}

impl BatchScanner {
  pub fn new(directory: impl Into<PathBuf>, camera: impl Into<String>, threshold: f32) -> Self {
    BatchScanner {
      directory: directory.into(),
      camera: camera.into(),
      threshold,
    }
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  /// 没有匹配文件时返回 `Ok(None)`
  ///
  /// 引擎必须已经分配张量。
  pub fn scan<'e, I: Interpreter>(
    &self,
    engine: &'e mut InferenceEngine<I>,
  ) -> Result<Option<BatchScan<'e, I>>, EngineError> {
    let shape = engine.input_shape()?;
    let paths = list_camera_images(&self.directory, &self.camera);
    if paths.is_empty() {
      info!(
        "目录 {} 中没有 {} 的图像",
        self.directory.display(),
        self.camera
      );
      return Ok(None);
    }

    info!("共 {} 张图像待检测", paths.len());
    Ok(Some(BatchScan {
      engine,
      paths: paths.into_iter(),
      shape,
      threshold: self.threshold,
      failed: false,
      decode_failures: 0,
    }))
  }
}

/// 惰性、有限、只能遍历一次的检测序列
///
/// 解码失败的文件被记录并跳过；引擎错误只产出一次，之后序列结束。
pub struct BatchScan<'e, I> {
  engine: &'e mut InferenceEngine<I>,
  paths: std::vec::IntoIter<PathBuf>,
  shape: InputShape,
  threshold: f32,
  failed: bool,
  decode_failures: usize,
}

impl<I> BatchScan<'_, I> {
  pub fn remaining(&self) -> usize {
    self.paths.len()
  }

  pub fn decode_failures(&self) -> usize {
    self.decode_failures
  }
}

impl<I: Interpreter> Iterator for BatchScan<'_, I> {
  type Item = Result<ScanRecord, EngineError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.failed {
      return None;
    }

    for path in self.paths.by_ref() {
      let frame = match read_frame(&path, self.shape) {
        Ok(frame) => frame,
        Err(e) => {
          error!("跳过无法解码的文件: {}", e);
          self.decode_failures += 1;
          continue;
        }
      };

      let now = Instant::now();
      let result = self.engine.detect(&frame, self.threshold);
      let elapsed = now.elapsed();

      return match result {
        Ok(detections) => Some(Ok(ScanRecord {
          path,
          elapsed,
          detections,
        })),
        Err(e) => {
          error!("检测 {} 失败: {}", path.display(), e);
          self.failed = true;
          Some(Err(e))
        }
      };
    }

    None
  }
}

/// 没有匹配文件时输出的提示
pub const NO_MATCHING_FILES: &str = "File Path is invalid";

#[derive(Error, Debug)]
pub enum ScanReportError {
  #[error(transparent)]
  Engine(#[from] EngineError),
  #[error("写出检测结果失败: {0}")]
  Io(#[from] std::io::Error),
}

/// 边消费扫描序列边逐行写出检测结果，返回写出的行数
///
/// `scan` 为 `None` 时只写出 [`NO_MATCHING_FILES`]。
pub fn report_scan<W: Write, I: Interpreter>(
  out: &mut W,
  scan: Option<BatchScan<'_, I>>,
  labels: &LabelTable,
) -> Result<usize, ScanReportError> {
  let Some(scan) = scan else {
    writeln!(out, "{}", NO_MATCHING_FILES)?;
    return Ok(0);
  };

  let mut lines = 0;
  for record in scan {
    for line in record?.describe(labels) {
      writeln!(out, "{}", line)?;
      lines += 1;
    }
  }
  Ok(lines)
}
