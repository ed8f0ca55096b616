//! 错误分类体系
//!
//! 所有阶段的失败都以 `ClassifiedError` 向上传播，类别和可重试性只由种类决定

pub mod classified;
pub mod kind;

pub use classified::{classify, make, Classification, ClassifiedError};
pub use kind::{Category, ErrorKind};

/// 阶段返回值
pub type StageResult<T> = Result<T, ClassifiedError>;
