// crates/sf_physics/src/pressure/mod.rs

//! 压力-速度耦合修正
//!
//! 分离式求解中由动量预测速度求出满足连续性的压力场与通量，支持四种
//! 方程类型（见 [`EquationKind`]）：
//! - 不可压稳态 SIMPLE
//! - 可压瞬态 PISO（可选跨音速形式）
//! - 可压稳态 SIMPLE（可选跨音速形式）
//! - 浮力驱动稳态 SIMPLE（求解 `p_rgh`）
//!
//! # 阶段
//!
//! - [`predictor`]: `rAU`、`HbyA`、预测通量、出流调整、固定通量压力边界
//! - [`equation`]: 压力方程组装
//! - [`non_orthogonal`]: 非正交修正循环与守恒通量
//! - [`reference`]: 参考单元
//! - [`closed_volume`]: 闭域质量修正
//! - [`reconstruct`]: 速度重构
//! - [`density`]: 密度截断、松弛与密度连续性方程
//! - [`continuity`]、[`monitor`]: 诊断
//!
//! 入口为 [`PressureCorrector`]。

pub mod closed_volume;
pub mod context;
pub mod continuity;
pub mod corrector;
pub mod density;
pub mod equation;
pub mod error;
pub mod hydrostatic;
pub mod monitor;
pub mod non_orthogonal;
pub mod predictor;
pub mod reconstruct;
pub mod reference;

pub use closed_volume::{correct_closed_volume, mass_integral, InitialMass};
pub use context::{kinetic_energy, EquationKind, FlowFields};
pub use continuity::{ContinuityErrors, ContinuityTracker};
pub use corrector::{CorrectionReport, PressureCorrector};
pub use density::{solve_density_continuity, DensityReport, DensityStage};
pub use equation::{CompressibleTerms, PressureEquation};
pub use error::{PressureError, PressureResult};
pub use hydrostatic::Hydrostatic;
pub use monitor::ConvergenceMonitor;
pub use non_orthogonal::{LoopSettings, LoopState, NonOrthIteration, NonOrthOutcome, NonOrthogonalLoop, SolveRecord};
pub use predictor::{adjust_phi, constrain_pressure, predict, FluxPrediction};
pub use reconstruct::{correct_velocity, correct_velocity_buoyant};
pub use reference::ReferenceCell;
