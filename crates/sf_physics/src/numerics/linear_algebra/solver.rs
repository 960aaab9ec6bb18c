// crates/sf_physics/src/numerics/linear_algebra/solver.rs

//! 迭代线性求解器
//!
//! - [`PcgSolver`]: 预条件共轭梯度法（对称正定）
//! - [`BiCgStabSolver`]: 稳定双共轭梯度法（非对称）
//!
//! 收敛判据为 `||r|| < max(atol, rtol·||b||)`，对 `b ≈ 0` 的方程同样稳健。

use serde::{Deserialize, Serialize};
use sf_config::LinearSolverConfig;

use super::csr::CsrMatrix;
use super::preconditioner::Preconditioner;
use super::vector_ops::{axpy, copy, dot, norm2};

/// 求解器配置
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolverConfig {
    /// 相对收敛容差（相对于 ||b||）
    pub rtol: f64,
    /// 绝对收敛容差
    pub atol: f64,
    /// 最大迭代次数
    pub max_iter: usize,
    /// 是否输出逐次迭代残差
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-14,
            max_iter: 1000,
            verbose: false,
        }
    }
}

impl SolverConfig {
    /// 创建求解器配置
    pub fn new(rtol: f64, max_iter: usize) -> Self {
        Self {
            rtol,
            max_iter,
            ..Default::default()
        }
    }

    /// 设置绝对容差
    pub fn with_atol(mut self, atol: f64) -> Self {
        self.atol = atol;
        self
    }
}

impl From<&LinearSolverConfig> for SolverConfig {
    fn from(cfg: &LinearSolverConfig) -> Self {
        Self {
            rtol: cfg.rtol,
            atol: cfg.atol,
            max_iter: cfg.max_iter,
            verbose: log::log_enabled!(log::Level::Trace),
        }
    }
}

/// 求解器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverStatus {
    /// 收敛
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
    /// 发散
    Diverged,
    /// 停滞
    Stagnated,
}

/// 求解器结果
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SolverResult {
    /// 求解器名称
    pub solver: &'static str,
    /// 求解状态
    pub status: SolverStatus,
    /// 迭代次数
    pub iterations: usize,
    /// 最终残差范数
    pub residual_norm: f64,
    /// 初始残差范数
    pub initial_residual_norm: f64,
}

impl SolverResult {
    /// 是否成功收敛
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    fn new(
        solver: &'static str,
        status: SolverStatus,
        iterations: usize,
        residual_norm: f64,
        initial_residual_norm: f64,
    ) -> Self {
        Self {
            solver,
            status,
            iterations,
            residual_norm,
            initial_residual_norm,
        }
    }
}

/// 迭代求解器 trait
pub trait IterativeSolver {
    /// 求解 Ax = b，x 作为初值输入并被解覆盖
    fn solve(
        &mut self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &dyn Preconditioner,
    ) -> SolverResult;

    /// 求解器名称
    fn name(&self) -> &'static str;
}

const STAG_TOL: f64 = 1e-300;

fn effective_tol(config: &SolverConfig, b: &[f64]) -> f64 {
    let b_norm = norm2(b);
    if b_norm < f64::MIN_POSITIVE {
        config.atol
    } else {
        config.atol.max(config.rtol * b_norm)
    }
}

// =============================================================================
// PCG
// =============================================================================

/// 预条件共轭梯度求解器
pub struct PcgSolver {
    config: SolverConfig,
    r: Vec<f64>,
    z: Vec<f64>,
    p: Vec<f64>,
    ap: Vec<f64>,
}

impl PcgSolver {
    /// 创建 PCG 求解器
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            r: Vec::new(),
            z: Vec::new(),
            p: Vec::new(),
            ap: Vec::new(),
        }
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            self.r = vec![0.0; n];
            self.z = vec![0.0; n];
            self.p = vec![0.0; n];
            self.ap = vec![0.0; n];
        }
    }
}

impl IterativeSolver for PcgSolver {
    fn solve(
        &mut self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &dyn Preconditioner,
    ) -> SolverResult {
        let n = b.len();
        self.ensure_workspace(n);
        let tol = effective_tol(&self.config, b);

        matrix.residual(x, b, &mut self.r);
        let initial_norm = norm2(&self.r);
        if initial_norm < tol {
            return SolverResult::new("PCG", SolverStatus::Converged, 0, initial_norm, initial_norm);
        }

        precond.apply(&self.r, &mut self.z);
        copy(&self.z, &mut self.p);
        let mut rz = dot(&self.r, &self.z);

        for iter in 0..self.config.max_iter {
            matrix.mul_vec(&self.p, &mut self.ap);

            let pap = dot(&self.p, &self.ap);
            if pap.abs() < STAG_TOL {
                let res = norm2(&self.r);
                return SolverResult::new("PCG", SolverStatus::Stagnated, iter, res, initial_norm);
            }

            let alpha = rz / pap;
            axpy(alpha, &self.p, x);
            axpy(-alpha, &self.ap, &mut self.r);

            let res_norm = norm2(&self.r);
            if self.config.verbose {
                log::trace!("PCG iter {}: residual = {:.6e}", iter + 1, res_norm);
            }

            if res_norm < tol {
                return SolverResult::new(
                    "PCG",
                    SolverStatus::Converged,
                    iter + 1,
                    res_norm,
                    initial_norm,
                );
            }

            precond.apply(&self.r, &mut self.z);
            let rz_new = dot(&self.r, &self.z);
            let beta = rz_new / rz;
            rz = rz_new;

            for (pi, &zi) in self.p.iter_mut().zip(self.z.iter()) {
                *pi = zi + beta * *pi;
            }
        }

        SolverResult::new(
            "PCG",
            SolverStatus::MaxIterationsReached,
            self.config.max_iter,
            norm2(&self.r),
            initial_norm,
        )
    }

    fn name(&self) -> &'static str {
        "PCG"
    }
}

// =============================================================================
// BiCGStab
// =============================================================================

/// 稳定双共轭梯度求解器（右预条件）
pub struct BiCgStabSolver {
    config: SolverConfig,
    r: Vec<f64>,
    r0: Vec<f64>,
    p: Vec<f64>,
    v: Vec<f64>,
    s: Vec<f64>,
    t: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
}

impl BiCgStabSolver {
    /// 创建 BiCGStab 求解器
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            r: Vec::new(),
            r0: Vec::new(),
            p: Vec::new(),
            v: Vec::new(),
            s: Vec::new(),
            t: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
        }
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            for w in [
                &mut self.r,
                &mut self.r0,
                &mut self.p,
                &mut self.v,
                &mut self.s,
                &mut self.t,
                &mut self.y,
                &mut self.z,
            ] {
                *w = vec![0.0; n];
            }
        }
    }
}

impl IterativeSolver for BiCgStabSolver {
    fn solve(
        &mut self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &dyn Preconditioner,
    ) -> SolverResult {
        let n = b.len();
        self.ensure_workspace(n);
        let tol = effective_tol(&self.config, b);
        let div_factor = 1e8;

        matrix.residual(x, b, &mut self.r);
        let initial_norm = norm2(&self.r);
        if initial_norm < tol {
            return SolverResult::new(
                "BiCGStab",
                SolverStatus::Converged,
                0,
                initial_norm,
                initial_norm,
            );
        }

        // 影子残差固定为初始残差
        copy(&self.r, &mut self.r0);
        let mut rho_old = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;
        self.v.fill(0.0);
        self.p.fill(0.0);

        for iter in 0..self.config.max_iter {
            let rho = dot(&self.r0, &self.r);
            if rho.abs() < STAG_TOL {
                let res = norm2(&self.r);
                return SolverResult::new("BiCGStab", SolverStatus::Stagnated, iter, res, initial_norm);
            }

            let beta = if iter == 0 {
                0.0
            } else {
                (rho / rho_old) * (alpha / omega)
            };
            rho_old = rho;

            for i in 0..n {
                self.p[i] = self.r[i] + beta * (self.p[i] - omega * self.v[i]);
            }

            // y = M⁻¹ p, v = A y
            precond.apply(&self.p, &mut self.y);
            matrix.mul_vec(&self.y, &mut self.v);

            let r0v = dot(&self.r0, &self.v);
            if r0v.abs() < STAG_TOL {
                let res = norm2(&self.r);
                return SolverResult::new("BiCGStab", SolverStatus::Stagnated, iter, res, initial_norm);
            }
            alpha = rho / r0v;

            for i in 0..n {
                self.s[i] = self.r[i] - alpha * self.v[i];
            }

            let s_norm = norm2(&self.s);
            if s_norm < tol {
                axpy(alpha, &self.y, x);
                return SolverResult::new(
                    "BiCGStab",
                    SolverStatus::Converged,
                    iter + 1,
                    s_norm,
                    initial_norm,
                );
            }

            // z = M⁻¹ s, t = A z
            precond.apply(&self.s, &mut self.z);
            matrix.mul_vec(&self.z, &mut self.t);

            let tt = dot(&self.t, &self.t);
            omega = if tt < STAG_TOL {
                0.0
            } else {
                dot(&self.t, &self.s) / tt
            };

            axpy(alpha, &self.y, x);
            axpy(omega, &self.z, x);

            if omega.abs() < STAG_TOL {
                return SolverResult::new(
                    "BiCGStab",
                    SolverStatus::Stagnated,
                    iter + 1,
                    s_norm,
                    initial_norm,
                );
            }

            for i in 0..n {
                self.r[i] = self.s[i] - omega * self.t[i];
            }

            let res_norm = norm2(&self.r);
            if self.config.verbose {
                log::trace!("BiCGStab iter {}: residual = {:.6e}", iter + 1, res_norm);
            }

            if res_norm < tol {
                return SolverResult::new(
                    "BiCGStab",
                    SolverStatus::Converged,
                    iter + 1,
                    res_norm,
                    initial_norm,
                );
            }

            if res_norm > initial_norm * div_factor {
                return SolverResult::new(
                    "BiCGStab",
                    SolverStatus::Diverged,
                    iter + 1,
                    res_norm,
                    initial_norm,
                );
            }
        }

        SolverResult::new(
            "BiCGStab",
            SolverStatus::MaxIterationsReached,
            self.config.max_iter,
            norm2(&self.r),
            initial_norm,
        )
    }

    fn name(&self) -> &'static str {
        "BiCGStab"
    }
}
