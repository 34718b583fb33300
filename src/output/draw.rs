// 该文件是 Kanmen （看门） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const LABEL_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const BOX_THICKNESS: i32 = 2;

pub struct Draw {
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  font: Option<FontVec>,
  label_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      label_color: LABEL_COLOR,
      font: None,
    }
  }
}

impl Draw {
  /// 没有字体时只绘制边框
  pub fn with_font_file(mut self, path: &Path) -> Result<Self, std::io::Error> {
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data)
      .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    self.font = Some(font);
    Ok(self)
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 绘制像素坐标 [xmin, ymin, xmax, ymax] 的边框，超出图像部分被裁掉
  pub fn draw_box(&self, image: &mut RgbImage, rect: [i32; 4]) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = rect[0].clamp(0, w - 1);
    let y_min = rect[1].clamp(0, h - 1);
    let x_max = rect[2].clamp(0, w - 1);
    let y_max = rect[3].clamp(0, h - 1);

    for thickness in 0..BOX_THICKNESS {
      let width = x_max - x_min - 2 * thickness + 1;
      let height = y_max - y_min - 2 * thickness + 1;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + thickness, y_min + thickness).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.label_color));
    }
  }

  /// 在 `position` 处绘制多行文本，背景为标签色
  pub fn draw_text(&self, image: &mut RgbImage, position: [i32; 2], text: &str) {
    let Some(font) = self.font.as_ref() else {
      return;
    };

    let w = image.width() as i32;
    let scale = PxScale::from(self.font_size);
    let text_color = Rgb([255u8, 255u8, 255u8]); // 白色文本

    for (row, line) in text.lines().enumerate() {
      let label_x = position[0].max(0);
      let label_y = (position[1] + row as i32 * self.label_text_height).max(0);

      let text_width = (line.chars().count() as f32 * self.label_char_width) as i32;
      let max_width = (w - label_x).max(0);
      let label_width = text_width.min(max_width);

      if label_width > 0 {
        let rect = Rect::at(label_x, label_y).of_size(label_width as u32, self.label_text_height as u32);
        draw_filled_rect_mut(image, rect, Rgb(self.label_color));
        draw_text_mut(
          image,
          text_color,
          label_x,
          label_y + self.label_text_vertical_padding,
          scale,
          font,
          line,
        );
      }
    }
  }
}
