// crates/sf_foundation/src/lib.rs

//! SegFlow Foundation Layer
//!
//! 基础层，提供整个工作区共享的最小抽象。
//!
//! # 模块概览
//!
//! - [`scalar`]: 计算用标量类型与常用数值常量
//! - [`error`]: 统一错误类型 [`SfError`] 与 [`SfResult`]
//!
//! # 设计原则
//!
//! 1. **最少依赖**: 仅依赖 thiserror
//! 2. **无物理语义**: 物理相关的错误在 `sf_physics` 中扩展
//!
//! # 示例
//!
//! ```
//! use sf_foundation::{SfError, SfResult, Scalar};
//!
//! fn positive(x: Scalar) -> SfResult<Scalar> {
//!     SfError::check_range("x", x, 0.0, Scalar::MAX)?;
//!     Ok(x)
//! }
//!
//! assert!(positive(1.0).is_ok());
//! assert!(positive(-1.0).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod scalar;

// 重导出常用类型
pub use error::{SfError, SfResult};
pub use scalar::{Scalar, SMALL, VSMALL};
