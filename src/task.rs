// 该文件是 Kanmen （看门） 项目的一部分。
// src/task.rs - 批量检测与目录监视任务
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

use std::time::Duration;

use crate::{label::LabelTable, model::Detection};

mod scan;
mod watch;

pub use self::scan::{
  BatchScan, BatchScanner, NO_MATCHING_FILES, ScanRecord, ScanReportError, report_scan,
};
pub use self::watch::{
  EngineLoader, EngineSlot, HandleOutcome, WatchContext, WatchError, WatchEvent, WatchHandler,
  WatchLoop, WatchState, WatchStats,
};

pub fn elapsed_ms(elapsed: Duration) -> f64 {
  elapsed.as_nanos() as f64 / 1_000_000.0
}

/// 单条检测结果的控制台描述
pub fn describe_detection(
  labels: &LabelTable,
  detection: &Detection,
  file_name: &str,
  elapsed: Duration,
) -> String {
  format!(
    "I found {} with {}% certainty in {} and it took {} milliseconds",
    labels.display(detection.class_id),
    detection.score,
    file_name,
    elapsed_ms(elapsed)
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BoundingBox;

  #[test]
  fn description_names_label_score_file_and_time() {
    let labels = LabelTable::parse("0 person\n1 car\n").unwrap();
    let detection = Detection {
      bbox: BoundingBox::from_slice(&[0.0, 0.0, 1.0, 1.0]),
      class_id: 0,
      score: 0.5,
    };
    assert_eq!(
      describe_detection(&labels, &detection, "frontdoor-1.jpg", Duration::from_millis(12)),
      "I found person with 0.5% certainty in frontdoor-1.jpg and it took 12 milliseconds"
    );
  }
}
