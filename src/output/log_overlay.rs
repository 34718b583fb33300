// 该文件是 Kanmen （看门） 项目的一部分。
// src/output/log_overlay.rs - 日志叠加层
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

use std::{convert::Infallible, path::Path};

use tracing::info;

use crate::{frame::RgbNhwcFrame, output::Annotator};

/// 把叠加层操作写入日志，用于无显示环境
#[derive(Debug, Default)]
pub struct LogOverlay {
  operations: usize,
}

impl LogOverlay {
  pub const SCHEME: &'static str = "log";
}

impl Annotator for LogOverlay {
  type Error = Infallible;

  fn clear(&mut self, frame: &RgbNhwcFrame, source: &Path) -> Result<(), Self::Error> {
    self.operations = 0;
    info!(
      "overlay clear: {} ({}x{})",
      source.display(),
      frame.width(),
      frame.height()
    );
    Ok(())
  }

  fn bounding_box(&mut self, rect: [i32; 4]) -> Result<(), Self::Error> {
    self.operations += 1;
    info!("overlay box: {:?}", rect);
    Ok(())
  }

  fn text(&mut self, position: [i32; 2], text: &str) -> Result<(), Self::Error> {
    self.operations += 1;
    info!("overlay text at {:?}: {:?}", position, text);
    Ok(())
  }

  fn update(&mut self) -> Result<(), Self::Error> {
    info!("overlay update: {} operations", self.operations);
    Ok(())
  }
}
