// 该文件是 Kanmen （看门） 项目的一部分。
// src/output.rs - 标注输出定义
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

use std::{path::Path, time::Duration};

use thiserror::Error;
use url::Url;

use crate::FromUrl;
#[cfg(feature = "directory_record")]
use crate::FromUrlWithScheme;
use crate::frame::RgbNhwcFrame;
use crate::label::LabelTable;
use crate::model::Detection;

/// 标注叠加层接口
///
/// 一次标注的调用顺序为 `clear`，若干 `bounding_box` / `text`，最后 `update`。
pub trait Annotator {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 清空叠加层，并以 `frame` 作为新的底图
  fn clear(&mut self, frame: &RgbNhwcFrame, source: &Path) -> Result<(), Self::Error>;
  /// 像素坐标 [xmin, ymin, xmax, ymax]
  fn bounding_box(&mut self, rect: [i32; 4]) -> Result<(), Self::Error>;
  fn text(&mut self, position: [i32; 2], text: &str) -> Result<(), Self::Error>;
  fn update(&mut self) -> Result<(), Self::Error>;
}

#[cfg(feature = "directory_record")]
pub mod draw;

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError, RecordFormat};

mod log_overlay;
pub use self::log_overlay::LogOverlay;

/// 在叠加层上绘制检测框、标签与推理耗时
pub fn annotate_objects<A: Annotator>(
  annotator: &mut A,
  frame: &RgbNhwcFrame,
  source: &Path,
  detections: &[Detection],
  labels: &LabelTable,
  elapsed: Duration,
) -> Result<(), A::Error> {
  annotator.clear(frame, source)?;

  let (width, height) = (frame.width() as u32, frame.height() as u32);
  for detection in detections {
    let [xmin, ymin, xmax, ymax] = detection.bbox.to_pixels(width, height);
    annotator.bounding_box([xmin, ymin, xmax, ymax])?;
    annotator.text(
      [xmin, ymin],
      &format!("{}\n{:.2}", labels.display(detection.class_id), detection.score),
    )?;
  }

  annotator.text(
    [5, 0],
    &format!("{:.1}ms", elapsed.as_secs_f64() * 1000.0),
  )?;
  annotator.update()
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
  LogOverlay(LogOverlay),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      LogOverlay::SCHEME => Ok(OutputWrapper::LogOverlay(LogOverlay::default())),
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Annotator for OutputWrapper {
  type Error = OutputError;

  fn clear(&mut self, frame: &RgbNhwcFrame, source: &Path) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => Ok(output.clear(frame, source)?),
      OutputWrapper::LogOverlay(output) => {
        let Ok(()) = output.clear(frame, source);
        Ok(())
      }
    }
  }

  fn bounding_box(&mut self, rect: [i32; 4]) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => Ok(output.bounding_box(rect)?),
      OutputWrapper::LogOverlay(output) => {
        let Ok(()) = output.bounding_box(rect);
        Ok(())
      }
    }
  }

  fn text(&mut self, position: [i32; 2], text: &str) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => Ok(output.text(position, text)?),
      OutputWrapper::LogOverlay(output) => {
        let Ok(()) = output.text(position, text);
        Ok(())
      }
    }
  }

  fn update(&mut self) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => Ok(output.update()?),
      OutputWrapper::LogOverlay(output) => {
        let Ok(()) = output.update();
        Ok(())
      }
    }
  }
}
