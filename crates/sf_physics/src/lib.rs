// crates/sf_physics/src/lib.rs

//! 物理求解层
//!
//! 有限体积压力-速度耦合，包括：
//! - 网格 (mesh)
//! - 体场与面场 (fields)
//! - 数值算子与线性求解 (numerics)
//! - 热物性与状态方程 (thermo)
//! - 源项 (sources)
//! - 动量方程 A/H 分解 (momentum)
//! - 压力修正 (pressure)
//!
//! # 特性
//!
//! - `parallel`: 线性代数内核使用 rayon 并行

pub mod fields;
pub mod mesh;
pub mod momentum;
pub mod numerics;
pub mod pressure;
pub mod sources;
pub mod thermo;

pub use fields::{BoundaryKind, SurfaceScalarField, VolField, VolScalarField, VolVectorField};
pub use mesh::{FvMesh, MeshBuilder, Patch};
pub use momentum::{FrozenMomentum, LduMomentum, MomentumSystem};
pub use numerics::{FvMatrix, MatrixError, SolverResult, SolverStatus};
pub use pressure::{
    CorrectionReport, EquationKind, FlowFields, PressureCorrector, PressureError, PressureResult,
    ReferenceCell,
};
pub use sources::{FvOptions, FvSource, MassSource, VelocityLimiter};
pub use thermo::{EquationOfState, IncompressiblePerfectGas, LinearCompressibility, PerfectGas, Thermo};
