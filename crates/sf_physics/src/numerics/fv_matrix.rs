// crates/sf_physics/src/numerics/fv_matrix.rs

//! 有限体积方程矩阵（LDU 存储）
//!
//! 方程写作 `L(x) = rhs`，其中单元 P 行的算子为
//!
//! ```text
//! L(x)_P = D_P·x_P + Σ_f(owner=P) U_f·x_N + Σ_f(nei=P) L_f·x_O
//!        + Σ_b (ic_b·x_P + bc_b) + 显式项
//! ```
//!
//! - `upper[f]`: owner 行中邻居未知量的系数
//! - `lower[f]`: neighbour 行中 owner 未知量的系数
//! - `internal_coeffs` / `boundary_coeffs`: 边界面通量 `ic·x_P + bc`
//! - `source`: 右端项（显式项已移至右端）
//!
//! 所有项均为积分形式（未除以体积）。面通量 `upper·x_N − lower·x_P`
//! 在 owner 行以正号、neighbour 行以负号出现，因此 [`FvMatrix::flux`]
//! 给出的通量与矩阵严格守恒一致。

use sf_config::{LinearSolverConfig, LinearSolverKind};
use sf_foundation::{SfError, SfResult};
use thiserror::Error;

use super::fvc;
use super::linear_algebra::{
    make_preconditioner, BiCgStabSolver, CsrBuilder, CsrMatrix, IterativeSolver, PcgSolver,
    SolverConfig, SolverResult,
};
use crate::fields::{SurfaceScalarField, VolScalarField};
use crate::mesh::FvMesh;

/// 矩阵操作错误
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatrixError {
    /// 方程奇异且未设置参考单元
    #[error("方程 {field} 奇异（所有行和为零），且未设置参考单元")]
    Singular {
        /// 场名
        field: String,
    },

    /// 参考单元越界
    #[error("参考单元 {cell} 越界（单元数 {n_cells}）")]
    ReferenceOutOfRange {
        /// 参考单元
        cell: usize,
        /// 单元数
        n_cells: usize,
    },

    /// 基础错误
    #[error(transparent)]
    Foundation(#[from] SfError),
}

/// 滞后的非正交修正项
///
/// 保存每个内部面的 `γ_f·|Sf|`（含符号，随矩阵取负）以及当前已计入
/// 右端的修正通量。
#[derive(Debug, Clone, PartialEq)]
struct NonOrthogonalTerm {
    gamma_mag_sf: Vec<f64>,
    correction: Vec<f64>,
}

/// 有限体积方程矩阵
#[derive(Debug, Clone, PartialEq)]
pub struct FvMatrix {
    diag: Vec<f64>,
    upper: Vec<f64>,
    lower: Vec<f64>,
    source: Vec<f64>,
    internal_coeffs: Vec<f64>,
    boundary_coeffs: Vec<f64>,
    non_orth: Option<NonOrthogonalTerm>,
    asymmetric: bool,
    reference: Option<(usize, f64)>,
}

const ROW_SUM_TOL: f64 = 1e-12;

impl FvMatrix {
    /// 零矩阵
    pub fn new(mesh: &FvMesh) -> Self {
        Self {
            diag: vec![0.0; mesh.n_cells()],
            upper: vec![0.0; mesh.n_internal_faces()],
            lower: vec![0.0; mesh.n_internal_faces()],
            source: vec![0.0; mesh.n_cells()],
            internal_coeffs: vec![0.0; mesh.n_boundary_faces()],
            boundary_coeffs: vec![0.0; mesh.n_boundary_faces()],
            non_orth: None,
            asymmetric: false,
            reference: None,
        }
    }

    // ---------------------------------------------------------------------
    // 访问器
    // ---------------------------------------------------------------------

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.diag.len()
    }

    /// 对角系数（不含边界贡献）
    #[inline]
    pub fn diag(&self) -> &[f64] {
        &self.diag
    }

    /// 上三角系数
    #[inline]
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// 下三角系数
    #[inline]
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// 右端项
    #[inline]
    pub fn source(&self) -> &[f64] {
        &self.source
    }

    /// 是否含非对称项（对流）
    #[inline]
    pub fn is_asymmetric(&self) -> bool {
        self.asymmetric
    }

    /// 是否含非正交修正项
    #[inline]
    pub fn has_non_orthogonal_term(&self) -> bool {
        self.non_orth.is_some()
    }

    /// 当前设置的参考单元
    #[inline]
    pub fn reference(&self) -> Option<(usize, f64)> {
        self.reference
    }

    // ---------------------------------------------------------------------
    // 组装（供 fvm 使用）
    // ---------------------------------------------------------------------

    pub(crate) fn diag_mut(&mut self) -> &mut [f64] {
        &mut self.diag
    }

    pub(crate) fn source_mut(&mut self) -> &mut [f64] {
        &mut self.source
    }

    /// 内部面系数：owner 行 `upper`，neighbour 行 `lower`
    pub(crate) fn set_face(&mut self, mesh: &FvMesh, face: usize, upper: f64, lower: f64) {
        self.upper[face] += upper;
        self.lower[face] += lower;
        self.diag[mesh.owner(face)] -= lower;
        self.diag[mesh.neighbour(face)] -= upper;
    }

    /// 边界面通量系数 `ic·x_P + bc`
    pub(crate) fn set_boundary_face(&mut self, mesh: &FvMesh, face: usize, ic: f64, bc: f64) {
        let b = mesh.boundary_index(face);
        self.internal_coeffs[b] += ic;
        self.boundary_coeffs[b] += bc;
    }

    pub(crate) fn mark_asymmetric(&mut self) {
        self.asymmetric = true;
    }

    pub(crate) fn attach_non_orthogonal(&mut self, gamma_mag_sf: Vec<f64>) {
        let n = gamma_mag_sf.len();
        self.non_orth = Some(NonOrthogonalTerm {
            gamma_mag_sf,
            correction: vec![0.0; n],
        });
    }

    // ---------------------------------------------------------------------
    // 组合
    // ---------------------------------------------------------------------

    fn check_compatible(&self, other: &FvMatrix) -> SfResult<()> {
        SfError::check_size("FvMatrix cells", self.diag.len(), other.diag.len())?;
        SfError::check_size("FvMatrix faces", self.upper.len(), other.upper.len())?;
        SfError::check_size("FvMatrix boundary", self.internal_coeffs.len(), other.internal_coeffs.len())
    }

    /// `self + other`
    pub fn add(mut self, other: FvMatrix) -> SfResult<Self> {
        self.check_compatible(&other)?;
        add_into(&mut self.diag, &other.diag);
        add_into(&mut self.upper, &other.upper);
        add_into(&mut self.lower, &other.lower);
        add_into(&mut self.source, &other.source);
        add_into(&mut self.internal_coeffs, &other.internal_coeffs);
        add_into(&mut self.boundary_coeffs, &other.boundary_coeffs);
        self.asymmetric |= other.asymmetric;
        self.non_orth = match (self.non_orth.take(), other.non_orth) {
            (Some(mut a), Some(b)) => {
                add_into(&mut a.gamma_mag_sf, &b.gamma_mag_sf);
                add_into(&mut a.correction, &b.correction);
                Some(a)
            }
            (a, b) => a.or(b),
        };
        if self.reference.is_none() {
            self.reference = other.reference;
        }
        Ok(self)
    }

    /// `self − other`
    pub fn subtract(self, other: FvMatrix) -> SfResult<Self> {
        self.add(other.negate())
    }

    /// `−self`
    pub fn negate(mut self) -> Self {
        for v in self
            .diag
            .iter_mut()
            .chain(self.upper.iter_mut())
            .chain(self.lower.iter_mut())
            .chain(self.source.iter_mut())
            .chain(self.internal_coeffs.iter_mut())
            .chain(self.boundary_coeffs.iter_mut())
        {
            *v = -*v;
        }
        if let Some(term) = &mut self.non_orth {
            term.gamma_mag_sf.iter_mut().for_each(|g| *g = -*g);
            term.correction.iter_mut().for_each(|c| *c = -*c);
        }
        self
    }

    /// 在算子一侧加入显式项（积分形式），即右端减去 `values`
    pub fn add_explicit(mut self, values: &[f64]) -> SfResult<Self> {
        SfError::check_size("FvMatrix::add_explicit", self.source.len(), values.len())?;
        for (s, v) in self.source.iter_mut().zip(values) {
            *s -= v;
        }
        Ok(self)
    }

    /// `L(x) == rhs`（积分形式）
    pub fn equals(mut self, rhs: &[f64]) -> SfResult<Self> {
        SfError::check_size("FvMatrix::equals", self.source.len(), rhs.len())?;
        add_into(&mut self.source, rhs);
        Ok(self)
    }

    // ---------------------------------------------------------------------
    // 非正交修正
    // ---------------------------------------------------------------------

    /// 用当前场重建显式非正交修正项，只改变右端，不触碰隐式系数
    ///
    /// 返回修正通量的最大模。正交网格上为零。
    pub fn refresh_non_orthogonal(&mut self, mesh: &FvMesh, field: &VolScalarField) -> f64 {
        let Some(term) = &mut self.non_orth else {
            return 0.0;
        };
        if mesh.is_orthogonal(1e-12) {
            return 0.0;
        }

        let grad = fvc::grad(mesh, field);
        let mut max_corr: f64 = 0.0;
        for f in mesh.internal_faces() {
            let w = mesh.weight(f);
            let gf = grad[mesh.owner(f)] * w + grad[mesh.neighbour(f)] * (1.0 - w);
            let corr = term.gamma_mag_sf[f] * mesh.corr_vector(f).dot(gf);
            let delta = corr - term.correction[f];
            self.source[mesh.owner(f)] -= delta;
            self.source[mesh.neighbour(f)] += delta;
            term.correction[f] = corr;
            max_corr = max_corr.max(corr.abs());
        }
        max_corr
    }

    // ---------------------------------------------------------------------
    // 松弛与参考
    // ---------------------------------------------------------------------

    /// 隐式松弛，同时保证对角占优
    ///
    /// `D' = sign·max(|D|, Σ|offdiag|)/α`，右端补 `(D' − D)·x_prev`。
    pub fn relax(&mut self, mesh: &FvMesh, alpha: f64, x_prev: &[f64]) -> SfResult<()> {
        SfError::check_range("relaxation factor", alpha, f64::MIN_POSITIVE, 1.0)?;
        SfError::check_size("FvMatrix::relax", self.diag.len(), x_prev.len())?;

        let d0 = self.total_diagonal(mesh);
        let sign = if d0.iter().sum::<f64>() < 0.0 { -1.0 } else { 1.0 };
        let mut sum_off = vec![0.0; self.diag.len()];
        for f in mesh.internal_faces() {
            sum_off[mesh.owner(f)] += self.upper[f].abs();
            sum_off[mesh.neighbour(f)] += self.lower[f].abs();
        }

        for i in 0..self.diag.len() {
            let d_new = sign * d0[i].abs().max(sum_off[i]) / alpha;
            let increment = d_new - d0[i];
            self.diag[i] += increment;
            self.source[i] += increment * x_prev[i];
        }
        Ok(())
    }

    /// 固定单元 `cell` 的值为 `value`
    ///
    /// 在下一次 [`FvMatrix::solve`] 时生效并随之清除：
    /// `b_r += D_r·value, D_r ← 2·D_r`。
    pub fn set_reference(&mut self, cell: usize, value: f64) -> Result<(), MatrixError> {
        if cell >= self.diag.len() {
            return Err(MatrixError::ReferenceOutOfRange {
                cell,
                n_cells: self.diag.len(),
            });
        }
        self.reference = Some((cell, value));
        Ok(())
    }

    // ---------------------------------------------------------------------
    // 诊断
    // ---------------------------------------------------------------------

    fn total_diagonal(&self, mesh: &FvMesh) -> Vec<f64> {
        let mut d = self.diag.clone();
        for f in mesh.boundary_faces() {
            d[mesh.owner(f)] += self.internal_coeffs[mesh.boundary_index(f)];
        }
        d
    }

    /// 所有行和均为零（常数向量位于零空间）
    pub fn is_singular(&self, mesh: &FvMesh) -> bool {
        let d = self.total_diagonal(mesh);
        let mut row_sum = d.clone();
        let mut row_mag: Vec<f64> = d.iter().map(|v| v.abs()).collect();
        for f in mesh.internal_faces() {
            let (o, n) = (mesh.owner(f), mesh.neighbour(f));
            row_sum[o] += self.upper[f];
            row_mag[o] += self.upper[f].abs();
            row_sum[n] += self.lower[f];
            row_mag[n] += self.lower[f].abs();
        }
        row_sum
            .iter()
            .zip(&row_mag)
            .all(|(s, m)| s.abs() <= ROW_SUM_TOL * m.max(f64::MIN_POSITIVE))
    }

    /// 残差 `rhs − L(x)`（积分形式）
    pub fn residual(&self, mesh: &FvMesh, x: &[f64]) -> SfResult<Vec<f64>> {
        SfError::check_size("FvMatrix::residual", self.diag.len(), x.len())?;
        let (a, b) = self.assemble(mesh, None);
        let mut r = vec![0.0; x.len()];
        a.residual(x, &b, &mut r);
        // 还原组装时可能的整体取负
        if self.total_diagonal(mesh).iter().sum::<f64>() < 0.0 {
            r.iter_mut().for_each(|v| *v = -*v);
        }
        Ok(r)
    }

    // ---------------------------------------------------------------------
    // 求解
    // ---------------------------------------------------------------------

    /// 组装 CSR 系统；`reference` 按参考单元修改对应行
    fn assemble(&self, mesh: &FvMesh, reference: Option<(usize, f64)>) -> (CsrMatrix, Vec<f64>) {
        let n = self.diag.len();
        let mut total_diag = self.total_diagonal(mesh);
        let mut b = self.source.clone();
        for f in mesh.boundary_faces() {
            b[mesh.owner(f)] -= self.boundary_coeffs[mesh.boundary_index(f)];
        }
        if let Some((cell, value)) = reference {
            b[cell] += total_diag[cell] * value;
            total_diag[cell] *= 2.0;
        }

        // PCG 需要正定矩阵：对角和为负时整体取负
        let sign = if total_diag.iter().sum::<f64>() < 0.0 { -1.0 } else { 1.0 };
        let mut builder = CsrBuilder::new_square(n);
        for (i, &d) in total_diag.iter().enumerate() {
            builder.add(i, i, sign * d);
        }
        for f in mesh.internal_faces() {
            let (o, nb) = (mesh.owner(f), mesh.neighbour(f));
            builder.add(o, nb, sign * self.upper[f]);
            builder.add(nb, o, sign * self.lower[f]);
        }
        b.iter_mut().for_each(|v| *v *= sign);
        (builder.build(), b)
    }

    /// 求解方程并写回场（含边界值刷新）
    ///
    /// 参考单元在本次求解后清除，下一次求解前须重新设置。
    pub fn solve(
        &mut self,
        mesh: &FvMesh,
        field: &mut VolScalarField,
        config: &LinearSolverConfig,
    ) -> Result<SolverResult, MatrixError> {
        SfError::check_size("FvMatrix::solve", self.diag.len(), field.internal().len())?;

        let reference = self.reference.take();
        if reference.is_none() && self.is_singular(mesh) {
            return Err(MatrixError::Singular {
                field: field.name().to_string(),
            });
        }
        let (a, b) = self.assemble(mesh, reference);

        let precond = make_preconditioner(config.preconditioner, &a);
        let solver_config = SolverConfig::from(config);
        let mut x = field.internal().to_vec();
        let use_pcg = match config.kind {
            LinearSolverKind::Pcg => true,
            LinearSolverKind::BiCgStab => false,
            LinearSolverKind::Auto => !self.asymmetric,
        };
        let result = if use_pcg {
            PcgSolver::new(solver_config).solve(&a, &b, &mut x, precond.as_ref())
        } else {
            BiCgStabSolver::new(solver_config).solve(&a, &b, &mut x, precond.as_ref())
        };

        log::debug!(
            "{}: 求解 {}, 初始残差 = {:.3e}, 最终残差 = {:.3e}, 迭代 {}",
            result.solver,
            field.name(),
            result.initial_residual_norm,
            result.residual_norm,
            result.iterations
        );
        if !result.is_converged() {
            log::warn!(
                "{} 求解未收敛: {:?}, 残差 {:.3e}（{} 次迭代）",
                field.name(),
                result.status,
                result.residual_norm,
                result.iterations
            );
        }

        field.assign(x)?;
        field.correct_boundary_conditions(mesh);
        Ok(result)
    }

    /// 矩阵对应的面通量
    ///
    /// 内部面 `upper·x_N − lower·x_P + 非正交修正`，边界面 `ic·x_P + bc`。
    pub fn flux(&self, mesh: &FvMesh, field: &VolScalarField) -> SfResult<SurfaceScalarField> {
        SfError::check_size("FvMatrix::flux cells", self.diag.len(), field.internal().len())?;
        SfError::check_size("FvMatrix::flux faces", self.upper.len(), mesh.n_internal_faces())?;
        SfError::check_size("FvMatrix::flux boundary", self.internal_coeffs.len(), mesh.n_boundary_faces())?;
        let x = field.internal();
        let mut values = Vec::with_capacity(mesh.n_faces());
        for f in mesh.internal_faces() {
            let corr = self.non_orth.as_ref().map_or(0.0, |t| t.correction[f]);
            values.push(self.upper[f] * x[mesh.neighbour(f)] - self.lower[f] * x[mesh.owner(f)] + corr);
        }
        for f in mesh.boundary_faces() {
            let bi = mesh.boundary_index(f);
            values.push(self.internal_coeffs[bi] * x[mesh.owner(f)] + self.boundary_coeffs[bi]);
        }
        SurfaceScalarField::from_values(format!("flux({})", field.name()), mesh, values)
    }
}

fn add_into(a: &mut [f64], b: &[f64]) {
    for (x, y) in a.iter_mut().zip(b) {
        *x += y;
    }
}
