// crates/sf_physics/src/numerics/mod.rs

//! 数值方法模块
//!
//! - [`linear_algebra`]: CSR 稀疏矩阵、预条件器与 Krylov 求解器
//! - [`fvc`]: 显式有限体积算子
//! - [`fvm`]: 隐式有限体积算子
//! - [`fv_matrix`]: LDU 方程矩阵及其求解

pub mod fv_matrix;
pub mod fvc;
pub mod fvm;
pub mod linear_algebra;

pub use fv_matrix::{FvMatrix, MatrixError};
pub use linear_algebra::{SolverResult, SolverStatus};
