// 该文件是 Kanmen （看门） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{Datelike, Utc};
use image::RgbImage;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNhwcFrame,
  output::{Annotator, draw::Draw},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("字体加载错误: {0}: {1}")]
  FontError(PathBuf, std::io::Error),
  #[error("叠加层尚未清空, 没有底图")]
  NotCleared,
}

/// 记录模式下，检测框以文本或 JSON 形式保存在原图旁边
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
  Text,
  Json,
}

struct Canvas {
  image: RgbImage,
  source: PathBuf,
  boxes: Vec<[i32; 4]>,
  texts: Vec<([i32; 2], String)>,
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  record: Option<RecordFormat>,
  always: bool,
  frame_counter: u16,
  canvas: Option<Canvas>,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let mut output = DirectoryRecordOutput::new(uri.path());
    for (k, v) in uri.query_pairs() {
      match k.as_ref() {
        "record" if v == "json" => output = output.with_record(Some(RecordFormat::Json)),
        "record" => output = output.with_record(Some(RecordFormat::Text)),
        "always" => output = output.with_always(true),
        "font" => {
          let path = PathBuf::from(v.as_ref());
          let draw = std::mem::take(&mut output.draw);
          output.draw = draw
            .with_font_file(&path)
            .map_err(|e| DirectoryRecordOutputError::FontError(path, e))?;
        }
        _ => debug!("忽略未知参数 {}={}", k, v),
      }
    }

    Ok(output)
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    DirectoryRecordOutput {
      directory: directory.into(),
      draw: Draw::default(),
      record: None,
      always: false,
      frame_counter: 0,
      canvas: None,
    }
  }

  pub fn with_record(mut self, record: Option<RecordFormat>) -> Self {
    self.record = record;
    self
  }

  pub fn with_always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  fn frame_id(&mut self) -> u16 {
    self.frame_counter = self.frame_counter.wrapping_add(1);
    self.frame_counter
  }

  fn frame_path(&mut self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn canvas(&mut self) -> Result<&mut Canvas, DirectoryRecordOutputError> {
    self
      .canvas
      .as_mut()
      .ok_or(DirectoryRecordOutputError::NotCleared)
  }
}

fn write_record(
  format: RecordFormat,
  canvas: &Canvas,
  path: &Path,
) -> Result<(), DirectoryRecordOutputError> {
  match format {
    RecordFormat::Text => {
      let mut records = Vec::new();
      for rect in &canvas.boxes {
        records.push(format!(
          "box, {}, {}, {}, {}",
          rect[0], rect[1], rect[2], rect[3]
        ));
      }
      for (position, text) in &canvas.texts {
        records.push(format!(
          "text, {}, {}, {}",
          position[0],
          position[1],
          text.replace('\n', " ")
        ));
      }
      std::fs::write(path.with_extension("txt"), records.join("\n"))?;
    }
    RecordFormat::Json => {
      let record = json!({
        "source": canvas.source.display().to_string(),
        "boxes": canvas.boxes,
        "texts": canvas
          .texts
          .iter()
          .map(|(position, text)| json!({ "position": position, "text": text }))
          .collect::<Vec<_>>(),
      });
      std::fs::write(path.with_extension("json"), serde_json::to_vec_pretty(&record)?)?;
    }
  }
  Ok(())
}

impl Annotator for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn clear(&mut self, frame: &RgbNhwcFrame, source: &Path) -> Result<(), Self::Error> {
    self.canvas = Some(Canvas {
      image: frame.to_rgb_image(),
      source: source.to_path_buf(),
      boxes: Vec::new(),
      texts: Vec::new(),
    });
    Ok(())
  }

  fn bounding_box(&mut self, rect: [i32; 4]) -> Result<(), Self::Error> {
    self.canvas()?.boxes.push(rect);
    Ok(())
  }

  fn text(&mut self, position: [i32; 2], text: &str) -> Result<(), Self::Error> {
    self.canvas()?.texts.push((position, text.to_string()));
    Ok(())
  }

  fn update(&mut self) -> Result<(), Self::Error> {
    let Some(mut canvas) = self.canvas.take() else {
      return Err(DirectoryRecordOutputError::NotCleared);
    };

    if !self.always && canvas.boxes.is_empty() {
      debug!("{} 没有检测结果，跳过保存", canvas.source.display());
      return Ok(());
    }

    let path = self.frame_path()?;
    match self.record {
      Some(format) => {
        canvas.image.save(&path)?;
        write_record(format, &canvas, &path)?;
      }
      None => {
        for rect in &canvas.boxes {
          self.draw.draw_box(&mut canvas.image, *rect);
        }
        for (position, text) in &canvas.texts {
          self.draw.draw_text(&mut canvas.image, *position, text);
        }
        canvas.image.save(&path)?;
      }
    }

    info!("保存 {} 的标注到文件: {}", canvas.source.display(), path.display());
    Ok(())
  }
}
