// 该文件是 Kanmen （看门） 项目的一部分。
// src/model.rs - 模型与推理引擎
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

use thiserror::Error;
use tracing::{debug, error, info};

use crate::frame::{InputShape, RGB_CHANNELS, RgbNhwcFrame};

mod ssd;
pub use self::ssd::{ContractError, extract_detections};

#[cfg(feature = "onnx_runtime")]
mod onnx;
#[cfg(feature = "onnx_runtime")]
pub use self::onnx::{OnnxError, OnnxInterpreter};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 检测模型输出张量的数量：boxes, classes, scores, count
pub const DETECTION_NUM_OUTPUTS: usize = 4;
pub const OUTPUT_BOXES: usize = 0;
pub const OUTPUT_CLASSES: usize = 1;
pub const OUTPUT_SCORES: usize = 2;
pub const OUTPUT_COUNT: usize = 3;

/// 推理运行时接口
///
/// 一个输入张量，若干浮点输出张量。输出在 `invoke` 之后按序号读取，
/// 读取到的是去掉单维后的扁平数据。
pub trait Interpreter {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 分配张量并返回输入张量形状
  fn allocate_tensors(&mut self) -> Result<InputShape, Self::Error>;
  fn num_outputs(&self) -> usize;
  fn set_input(&mut self, data: &[u8]) -> Result<(), Self::Error>;
  fn invoke(&mut self) -> Result<(), Self::Error>;
  fn output(&self, index: usize) -> Result<&[f32], Self::Error>;
}

pub trait LoadModel: Interpreter + Sized {
  fn load(path: &Path) -> Result<Self, Self::Error>;
}

/// 相对坐标 [0, 1] 的边框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub ymin: f32,
  pub xmin: f32,
  pub ymax: f32,
  pub xmax: f32,
}

impl BoundingBox {
  pub fn from_slice(values: &[f32]) -> Self {
    BoundingBox {
      ymin: values[0],
      xmin: values[1],
      ymax: values[2],
      xmax: values[3],
    }
  }

  /// 换算为像素坐标 [xmin, ymin, xmax, ymax]，截断取整
  pub fn to_pixels(&self, width: u32, height: u32) -> [i32; 4] {
    let (w, h) = (width as f32, height as f32);
    [
      (self.xmin * w) as i32,
      (self.ymin * h) as i32,
      (self.xmax * w) as i32,
      (self.ymax * h) as i32,
    ]
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub bbox: BoundingBox,
  pub class_id: u32,
  pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
  Created,
  Loaded,
  Allocated,
  Ready,
}

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("模型加载错误: {path}: {source}")]
  ModelLoadError { path: PathBuf, source: BoxError },
  #[error("引擎状态错误: 期望 {expected:?}, 实际 {actual:?}")]
  InvalidState {
    expected: EngineState,
    actual: EngineState,
  },
  #[error("输入帧尺寸不匹配: 期望 {expected}, 实际 {actual}")]
  FrameShapeMismatch {
    expected: InputShape,
    actual: InputShape,
  },
  #[error("模型契约违反: {0}")]
  Contract(#[from] ContractError),
  #[error("推理运行时错误: {0}")]
  Runtime(BoxError),
}

impl EngineError {
  fn runtime<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    EngineError::Runtime(Box::new(err))
  }
}

/// 推理引擎，状态机 `Created → Loaded → Allocated → Ready`
pub struct InferenceEngine<I> {
  state: EngineState,
  interpreter: I,
  input_shape: Option<InputShape>,
}

impl<I: LoadModel> InferenceEngine<I> {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
    let path = path.as_ref();
    debug!("引擎状态: {:?}", EngineState::Created);
    info!("加载模型文件: {}", path.display());

    if !path.is_file() {
      error!("模型文件不存在: {}", path.display());
      return Err(EngineError::ModelLoadError {
        path: path.to_path_buf(),
        source: Box::new(std::io::Error::new(
          std::io::ErrorKind::NotFound,
          "模型文件不存在",
        )),
      });
    }

    let interpreter = I::load(path).map_err(|e| EngineError::ModelLoadError {
      path: path.to_path_buf(),
      source: Box::new(e),
    })?;
    info!("模型加载完成");

    Ok(Self::from_interpreter(interpreter))
  }

  /// 加载并分配，直接得到 Ready 状态的引擎
  pub fn load_ready(path: impl AsRef<Path>) -> Result<Self, EngineError> {
    let mut engine = Self::load(path)?;
    engine.allocate()?;
    Ok(engine)
  }
}

impl<I: Interpreter> InferenceEngine<I> {
  /// 包装已加载的运行时，状态为 Loaded
  pub fn from_interpreter(interpreter: I) -> Self {
    debug!("引擎状态: {:?}", EngineState::Loaded);
    InferenceEngine {
      state: EngineState::Loaded,
      interpreter,
      input_shape: None,
    }
  }

  pub fn state(&self) -> EngineState {
    self.state
  }

  fn expect_state(&self, expected: EngineState) -> Result<(), EngineError> {
    if self.state != expected {
      return Err(EngineError::InvalidState {
        expected,
        actual: self.state,
      });
    }
    Ok(())
  }

  /// 分配张量并校验模型签名，只能调用一次
  pub fn allocate(&mut self) -> Result<InputShape, EngineError> {
    self.expect_state(EngineState::Loaded)?;

    let shape = self
      .interpreter
      .allocate_tensors()
      .map_err(EngineError::runtime)?;
    self.state = EngineState::Allocated;
    self.input_shape = Some(shape);
    debug!("引擎状态: {:?}, 输入形状 {}", self.state, shape);

    if shape.channels != RGB_CHANNELS || shape.is_empty() {
      return Err(ContractError::InputShape(shape).into());
    }

    let num_outputs = self.interpreter.num_outputs();
    if num_outputs != DETECTION_NUM_OUTPUTS {
      error!(
        "预期模型输出数量为 {}, 实际为 {}",
        DETECTION_NUM_OUTPUTS, num_outputs
      );
      return Err(ContractError::OutputCount(num_outputs).into());
    }

    self.state = EngineState::Ready;
    debug!("引擎状态: {:?}", self.state);
    Ok(shape)
  }

  pub fn input_shape(&self) -> Result<InputShape, EngineError> {
    self.input_shape.ok_or(EngineError::InvalidState {
      expected: EngineState::Allocated,
      actual: self.state,
    })
  }

  pub fn detect(
    &mut self,
    frame: &RgbNhwcFrame,
    threshold: f32,
  ) -> Result<Vec<Detection>, EngineError> {
    self.expect_state(EngineState::Ready)?;

    let expected = self.input_shape()?;
    if frame.shape() != expected {
      return Err(EngineError::FrameShapeMismatch {
        expected,
        actual: frame.shape(),
      });
    }

    self
      .interpreter
      .set_input(frame.as_nhwc())
      .map_err(EngineError::runtime)?;

    let now = std::time::Instant::now();
    self.interpreter.invoke().map_err(EngineError::runtime)?;
    debug!("推理完成，耗时: {:.2?}", now.elapsed());

    let boxes = self.output(OUTPUT_BOXES)?;
    let classes = self.output(OUTPUT_CLASSES)?;
    let scores = self.output(OUTPUT_SCORES)?;
    let count = self.output(OUTPUT_COUNT)?;

    let detections = extract_detections(boxes, classes, scores, count, threshold)?;
    debug!("检测到 {} 个物体", detections.len());
    Ok(detections)
  }

  fn output(&self, index: usize) -> Result<&[f32], EngineError> {
    self.interpreter.output(index).map_err(EngineError::runtime)
  }
}


#[cfg(test)]
mod tests {
  use super::testing::ScriptedInterpreter;
  use super::*;

  fn shape() -> InputShape {
    InputShape::rgb(4, 6)
  }

  fn engine(detections: &[([f32; 4], f32, f32)]) -> InferenceEngine<ScriptedInterpreter> {
    InferenceEngine::from_interpreter(ScriptedInterpreter::new(shape(), detections, 10))
  }

  #[test]
  fn detect_before_allocate_fails_fast() {
    let mut engine = engine(&[]);
    let frame = RgbNhwcFrame::with_shape(4, 6);
    let err = engine.detect(&frame, 0.5).unwrap_err();
    assert!(matches!(
      err,
      EngineError::InvalidState {
        expected: EngineState::Ready,
        actual: EngineState::Loaded
      }
    ));
    assert!(engine.input_shape().is_err());
  }

  #[test]
  fn allocate_moves_to_ready_once() {
    let mut engine = engine(&[]);
    assert_eq!(engine.allocate().unwrap(), shape());
    assert_eq!(engine.state(), EngineState::Ready);
    assert_eq!(engine.input_shape().unwrap(), shape());
    assert!(matches!(
      engine.allocate(),
      Err(EngineError::InvalidState { .. })
    ));
  }

  #[test]
  fn wrong_output_count_is_a_contract_violation() {
    let mut interpreter = ScriptedInterpreter::new(shape(), &[], 10);
    interpreter.outputs.pop();
    let mut engine = InferenceEngine::from_interpreter(interpreter);
    let err = engine.allocate().unwrap_err();
    assert!(matches!(err, EngineError::Contract(ContractError::OutputCount(3))));
    assert_eq!(engine.state(), EngineState::Allocated);
  }

  #[test]
  fn detect_copies_frame_and_filters() {
    let mut engine = engine(&[
      ([0.1, 0.2, 0.3, 0.4], 1.0, 0.9),
      ([0.5, 0.5, 0.6, 0.6], 2.0, 0.3),
    ]);
    engine.allocate().unwrap();

    let mut frame = RgbNhwcFrame::with_shape(4, 6);
    frame.as_mut()[0] = 77;
    let detections = engine.detect(&frame, 0.5).unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].class_id, 1);
    assert_eq!(detections[0].bbox.xmin, 0.2);
    assert_eq!(engine.interpreter.input[0], 77);
    assert_eq!(engine.interpreter.invocations, 1);
  }

  #[test]
  fn mismatched_frame_is_rejected() {
    let mut engine = engine(&[]);
    engine.allocate().unwrap();
    let frame = RgbNhwcFrame::with_shape(6, 4);
    assert!(matches!(
      engine.detect(&frame, 0.5),
      Err(EngineError::FrameShapeMismatch { .. })
    ));
  }

  #[test]
  fn higher_threshold_returns_a_subset() {
    let mut engine = engine(&[
      ([0.0, 0.0, 1.0, 1.0], 0.0, 0.95),
      ([0.0, 0.0, 1.0, 1.0], 1.0, 0.41),
      ([0.0, 0.0, 1.0, 1.0], 2.0, 0.7),
    ]);
    engine.allocate().unwrap();
    let frame = RgbNhwcFrame::with_shape(4, 6);

    let loose = engine.detect(&frame, 0.4).unwrap();
    let strict = engine.detect(&frame, 0.7).unwrap();
    assert_eq!(loose.len(), 3);
    assert_eq!(strict.len(), 2);
    assert!(strict.iter().all(|d| loose.contains(d)));
    assert!(strict.iter().all(|d| d.score >= 0.7));
  }

  #[test]
  fn missing_model_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = InferenceEngine::<NeverLoads>::load(dir.path().join("model.onnx"));
    assert!(matches!(result, Err(EngineError::ModelLoadError { .. })));
  }

  #[test]
  fn pixel_conversion_truncates() {
    let bbox = BoundingBox::from_slice(&[0.25, 0.5, 0.75, 0.999]);
    assert_eq!(bbox.to_pixels(640, 480), [320, 120, 639, 360]);
  }

  struct NeverLoads;

  impl Interpreter for NeverLoads {
    type Error = std::io::Error;
    fn allocate_tensors(&mut self) -> Result<InputShape, Self::Error> {
      unreachable!()
    }
    fn num_outputs(&self) -> usize {
      0
    }
    fn set_input(&mut self, _: &[u8]) -> Result<(), Self::Error> {
      unreachable!()
    }
    fn invoke(&mut self) -> Result<(), Self::Error> {
      unreachable!()
    }
    fn output(&self, _: usize) -> Result<&[f32], Self::Error> {
      unreachable!()
    }
  }

  impl LoadModel for NeverLoads {
    fn load(_: &Path) -> Result<Self, Self::Error> {
      Ok(NeverLoads)
    }
  }
}
