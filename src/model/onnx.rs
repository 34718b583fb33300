// 该文件是 Kanmen （看门） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理后端
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

use ndarray::Array4;
use ort::{GraphOptimizationLevel, Session, TensorElementType, ValueType};
use thiserror::Error;
use tracing::debug;

use crate::frame::InputShape;
use crate::model::{Interpreter, LoadModel};

const ONNX_NUM_INPUTS: usize = 1;

#[derive(Error, Debug)]
pub enum OnnxError {
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型输入数量应为 1, 实际为 {0}")]
  InputCount(usize),
  #[error("模型输入 {name} 应为 [1, H, W, C] 的 uint8 张量, 实际为 {ty:?} {dimensions:?}")]
  InputSignature {
    name: String,
    ty: Option<TensorElementType>,
    dimensions: Vec<i64>,
  },
  #[error("输入数据长度不匹配: 期望 {expected}, 实际 {actual}")]
  InputLength { expected: usize, actual: usize },
  #[error("张量尚未分配")]
  NotAllocated,
  #[error("没有第 {0} 个输出")]
  MissingOutput(usize),
}

/// 以 ONNX Runtime 运行的量化 SSD 检测模型
///
/// 输入为 `[1, H, W, 3]` 的 uint8 张量，输出依次为 boxes、classes、
/// scores 与 count 四个浮点张量。
pub struct OnnxInterpreter {
  session: Session,
  input: Option<Array4<u8>>,
  outputs: Vec<Vec<f32>>,
}

impl LoadModel for OnnxInterpreter {
  fn load(path: &Path) -> Result<Self, Self::Error> {
    let session = Session::builder()?
      .with_optimization_level(GraphOptimizationLevel::Level3)?
      .commit_from_file(path)?;

    debug!("模型输入数量: {}", session.inputs.len());
    debug!("模型输出数量: {}", session.outputs.len());

    Ok(OnnxInterpreter {
      session,
      input: None,
      outputs: Vec::new(),
    })
  }
}

impl Interpreter for OnnxInterpreter {
  type Error = OnnxError;

  fn allocate_tensors(&mut self) -> Result<InputShape, Self::Error> {
    if self.session.inputs.len() != ONNX_NUM_INPUTS {
      return Err(OnnxError::InputCount(self.session.inputs.len()));
    }

    let input = &self.session.inputs[0];
    let (ty, dimensions) = match &input.input_type {
      ValueType::Tensor { ty, dimensions, .. } => (Some(*ty), dimensions.clone()),
      _ => (None, Vec::new()),
    };

    let shape = match (ty, dimensions.as_slice()) {
      (Some(TensorElementType::Uint8), &[1, h, w, c]) if h > 0 && w > 0 && c > 0 => {
        InputShape::new(h as usize, w as usize, c as usize)
      }
      _ => {
        return Err(OnnxError::InputSignature {
          name: input.name.clone(),
          ty,
          dimensions,
        });
      }
    };

    debug!("模型输入 {}: {}", input.name, shape);
    self.input = Some(Array4::zeros((1, shape.height, shape.width, shape.channels)));
    Ok(shape)
  }

  fn num_outputs(&self) -> usize {
    self.session.outputs.len()
  }

  fn set_input(&mut self, data: &[u8]) -> Result<(), Self::Error> {
    let input = self.input.as_mut().ok_or(OnnxError::NotAllocated)?;
    let expected = input.len();
    match input.as_slice_mut() {
      Some(slice) if slice.len() == data.len() => {
        slice.copy_from_slice(data);
        Ok(())
      }
      _ => Err(OnnxError::InputLength {
        expected,
        actual: data.len(),
      }),
    }
  }

  fn invoke(&mut self) -> Result<(), Self::Error> {
    let input = self.input.as_ref().ok_or(OnnxError::NotAllocated)?;
    let input_name = self.session.inputs[0].name.as_str();
    let num_outputs = self.session.outputs.len();

    let outputs = self
      .session
      .run(ort::inputs![input_name => input.view()]?)?;

    let mut tensors = Vec::with_capacity(num_outputs);
    for index in 0..num_outputs {
      let tensor = outputs[index].try_extract_tensor::<f32>()?;
      tensors.push(tensor.iter().copied().collect::<Vec<f32>>());
    }
    drop(outputs);

    self.outputs = tensors;
    Ok(())
  }

  fn output(&self, index: usize) -> Result<&[f32], Self::Error> {
    self
      .outputs
      .get(index)
      .map(Vec::as_slice)
      .ok_or(OnnxError::MissingOutput(index))
  }
}
