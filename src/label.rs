// 该文件是 Kanmen （看门） 项目的一部分。
// src/label.rs - 标签表
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
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("无法读取标签文件 {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("第 {row} 行的标签编号 {id} 超出范围")]
  IdOutOfRange { row: usize, id: String },
}

/// 类别编号到显示名称的映射
///
/// 支持两种标签文件格式：`"0 person"`（带编号）与 `"person"`（按行号编号）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
  labels: BTreeMap<u32, String>,
}

impl LabelTable {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let table = Self::parse(&content)?;
    debug!("从 {} 读取 {} 个标签", path.display(), table.len());
    Ok(table)
  }

  /// 编号超出 `u32` 范围的行是错误，而不是退回按行号编号
  pub fn parse(content: &str) -> Result<Self, LabelError> {
    let mut labels = BTreeMap::new();

    for (row_number, line) in content.lines().enumerate() {
      let (id, label) = parse_line(row_number, line)?;
      if let Some(previous) = labels.insert(id, label.to_string()) {
        warn!("标签编号 {} 重复，覆盖旧标签 {:?}", id, previous);
      }
    }

    Ok(LabelTable { labels })
  }

  pub fn get(&self, id: u32) -> Option<&str> {
    self.labels.get(&id).map(String::as_str)
  }

  /// 未知编号时回退为编号本身
  pub fn display(&self, id: u32) -> Cow<'_, str> {
    match self.get(id) {
      Some(label) => Cow::Borrowed(label),
      None => Cow::Owned(id.to_string()),
    }
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
    self.labels.iter().map(|(id, label)| (*id, label.as_str()))
  }
}

fn is_separator(c: char) -> bool {
  c == ':' || c.is_whitespace()
}

fn parse_line(row_number: usize, line: &str) -> Result<(u32, &str), LabelError> {
  let trimmed = line.trim();

  if let Some(split_at) = trimmed.find(is_separator) {
    let (head, rest) = trimmed.split_at(split_at);
    let is_number = !head.is_empty() && head.chars().all(|c| c.is_ascii_digit());
    if is_number {
      let id = head.parse::<u32>().map_err(|_| LabelError::IdOutOfRange {
        row: row_number,
        id: head.to_string(),
      })?;
      return Ok((id, rest.trim_start_matches(is_separator).trim()));
    }
  }

  let id = u32::try_from(row_number).map_err(|_| LabelError::IdOutOfRange {
    row: row_number,
    id: row_number.to_string(),
  })?;
  Ok((id, trimmed))
}
