// crates/sf_config/src/lib.rs

//! SegFlow Config Layer
//!
//! 配置层，提供压力-速度耦合的运行参数。
//! 本层只依赖基础层，所有数值使用 f64，便于 JSON 序列化。
//!
//! # 模块概览
//!
//! - [`pressure_config`]: PressureControls 压力修正控制参数
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! sf_physics    ─> 读取 PressureControls 驱动修正循环
//! sf_config     ─> PressureControls (本层)
//! sf_foundation ─> Scalar, SfError
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod pressure_config;

// 重导出核心类型
pub use error::ConfigError;
pub use pressure_config::{
    BuoyancyConfig, ClipPolicy, DensityLimits, LinearSolverConfig, LinearSolverKind,
    MonitorConfig, PreconditionerKind, PressureControls, ReferenceConfig, RelaxationFactors,
};
