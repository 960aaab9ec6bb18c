// crates/sf_physics/src/numerics/linear_algebra/mod.rs

//! 稀疏线性代数模块
//!
//! 为压力方程提供 CSR 矩阵、预条件器和 Krylov 迭代求解器。
//! 压力方程在组装阶段使用 LDU 存储（见 [`crate::numerics::fv_matrix`]），
//! 求解前统一转换为 CSR。
//!
//! # 求解器选择
//!
//! - 对称正定（纯拉普拉斯）: [`PcgSolver`]
//! - 非对称（含 `div(phid, p)` 对流项）: [`BiCgStabSolver`]

pub mod csr;
pub mod preconditioner;
pub mod solver;
pub mod vector_ops;

pub use csr::{CsrBuilder, CsrMatrix, CsrPattern};
pub use preconditioner::{
    make_preconditioner, IdentityPreconditioner, Ilu0Preconditioner, JacobiPreconditioner,
    Preconditioner,
};
pub use solver::{
    BiCgStabSolver, IterativeSolver, PcgSolver, SolverConfig, SolverResult, SolverStatus,
};
pub use vector_ops::{axpy, copy, dot, norm2, norm_inf};
