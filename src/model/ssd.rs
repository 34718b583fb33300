// 该文件是 Kanmen （看门） 项目的一部分。
// src/model/ssd.rs - SSD 风格检测输出的后处理
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

use thiserror::Error;
use tracing::{debug, error};

use crate::frame::InputShape;
use crate::model::{BoundingBox, Detection};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractError {
  #[error("输入张量形状无效: {0}")]
  InputShape(InputShape),
  #[error("预期模型输出数量为 4, 实际为 {0}")]
  OutputCount(usize),
  #[error("检测数量张量应只有一个元素, 实际为 {0}")]
  CountTensor(usize),
  #[error("输出大小不匹配 - boxes: {boxes}, classes: {classes}, scores: {scores}")]
  OutputSizes {
    boxes: usize,
    classes: usize,
    scores: usize,
  },
  #[error("检测数量 {count} 超过输出容量 {capacity}")]
  CountOverflow { count: usize, capacity: usize },
}

/// 从四个输出张量中取出分数不低于阈值的检测结果
///
/// 只有前 `count` 项有效；结果保持输出张量中的原始顺序。
pub fn extract_detections(
  boxes: &[f32],
  classes: &[f32],
  scores: &[f32],
  count: &[f32],
  threshold: f32,
) -> Result<Vec<Detection>, ContractError> {
  let count = match count {
    [value] => *value as usize,
    other => return Err(ContractError::CountTensor(other.len())),
  };

  let capacity = scores.len();
  if classes.len() != capacity || boxes.len() != capacity * 4 {
    error!(
      "输出大小不匹配 - boxes: {}, classes: {}, scores: {}",
      boxes.len(),
      classes.len(),
      scores.len()
    );
    return Err(ContractError::OutputSizes {
      boxes: boxes.len(),
      classes: classes.len(),
      scores: scores.len(),
    });
  }
  if count > capacity {
    return Err(ContractError::CountOverflow { count, capacity });
  }

  debug!("有效检测数量 {} / {}", count, capacity);

  let detections = (0..count)
    .filter(|&i| scores[i] >= threshold)
    .map(|i| Detection {
      bbox: BoundingBox::from_slice(&boxes[i * 4..i * 4 + 4]),
      class_id: classes[i] as u32,
      score: scores[i],
    })
    .collect();

  Ok(detections)
}
