// crates/sf_physics/src/numerics/linear_algebra/preconditioner.rs

//! 预条件器模块
//!
//! 将 Ax = b 转换为条件数更好的 M⁻¹Ax = M⁻¹b。
//!
//! # 预条件器类型
//!
//! - [`IdentityPreconditioner`]: 恒等（无预条件）
//! - [`JacobiPreconditioner`]: 对角预条件
//! - [`Ilu0Preconditioner`]: 保持稀疏模式的不完全 LU 分解

use sf_config::PreconditionerKind;

use super::csr::CsrMatrix;

/// 预条件器 trait
///
/// 核心操作是 `apply`: z = M⁻¹ * r
pub trait Preconditioner: Send + Sync {
    /// 应用预条件器: z = M⁻¹ * r
    fn apply(&self, r: &[f64], z: &mut [f64]);

    /// 预条件器名称
    fn name(&self) -> &'static str;

    /// 矩阵值变化但结构不变时更新
    fn update(&mut self, matrix: &CsrMatrix);
}

/// 按配置构造预条件器
pub fn make_preconditioner(kind: PreconditionerKind, matrix: &CsrMatrix) -> Box<dyn Preconditioner> {
    match kind {
        PreconditionerKind::None => Box::new(IdentityPreconditioner),
        PreconditionerKind::Jacobi => Box::new(JacobiPreconditioner::from_matrix(matrix)),
        PreconditionerKind::Ilu0 => Box::new(Ilu0Preconditioner::new(matrix)),
    }
}

// =============================================================================
// Identity
// =============================================================================

/// 恒等预条件器，z = r
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPreconditioner;

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        z.copy_from_slice(r);
    }

    fn name(&self) -> &'static str {
        "Identity"
    }

    fn update(&mut self, _matrix: &CsrMatrix) {}
}

// =============================================================================
// Jacobi
// =============================================================================

/// Jacobi 预条件器
///
/// 零对角元处退化为恒等映射。
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner {
    inv_diag: Vec<f64>,
}

impl JacobiPreconditioner {
    /// 从矩阵对角线构造
    pub fn from_matrix(matrix: &CsrMatrix) -> Self {
        Self::from_diagonal(&matrix.extract_diagonal())
    }

    /// 从对角线数组构造
    pub fn from_diagonal(diag: &[f64]) -> Self {
        let inv_diag = diag
            .iter()
            .map(|&d| if d.abs() > 1e-300 { 1.0 / d } else { 1.0 })
            .collect();
        Self { inv_diag }
    }

    /// 对角倒数
    pub fn inv_diagonal(&self) -> &[f64] {
        &self.inv_diag
    }
}

impl Preconditioner for JacobiPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        for ((zi, &ri), &di) in z.iter_mut().zip(r.iter()).zip(self.inv_diag.iter()) {
            *zi = ri * di;
        }
    }

    fn name(&self) -> &'static str {
        "Jacobi"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        *self = Self::from_matrix(matrix);
    }
}

// =============================================================================
// ILU(0)
// =============================================================================

/// ILU(0) 预条件器
///
/// L 的严格下三角部分与 U 的上三角部分（含对角）共用一个数组。
#[derive(Debug, Clone)]
pub struct Ilu0Preconditioner {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    lu_values: Vec<f64>,
    diag_ptr: Vec<Option<usize>>,
}

impl Ilu0Preconditioner {
    /// 主元下限
    const PIVOT_TOL: f64 = 1e-300;

    /// 从 CSR 矩阵创建并分解
    pub fn new(matrix: &CsrMatrix) -> Self {
        let n = matrix.n_rows();
        let row_ptr = matrix.row_ptr().to_vec();
        let col_idx = matrix.col_idx().to_vec();

        let diag_ptr = (0..n)
            .map(|i| (row_ptr[i]..row_ptr[i + 1]).find(|&k| col_idx[k] == i))
            .collect();

        let mut pc = Self {
            n,
            row_ptr,
            col_idx,
            lu_values: matrix.values().to_vec(),
            diag_ptr,
        };
        pc.factorize();
        pc
    }

    fn pivot(&self, row: usize) -> f64 {
        match self.diag_ptr[row] {
            Some(k) if self.lu_values[k].abs() > Self::PIVOT_TOL => self.lu_values[k],
            _ => 1.0,
        }
    }

    fn factorize(&mut self) {
        for i in 1..self.n {
            for k_idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                let k = self.col_idx[k_idx];
                if k >= i {
                    break;
                }

                let factor = self.lu_values[k_idx] / self.pivot(k);
                self.lu_values[k_idx] = factor;

                for j_idx in (k_idx + 1)..self.row_ptr[i + 1] {
                    let j = self.col_idx[j_idx];
                    let row_k = self.row_ptr[k]..self.row_ptr[k + 1];
                    if let Ok(local) = self.col_idx[row_k.clone()].binary_search(&j) {
                        let update = factor * self.lu_values[row_k.start + local];
                        self.lu_values[j_idx] -= update;
                    }
                }
            }
        }
    }
}

impl Preconditioner for Ilu0Preconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        // L * y = r（单位下三角）
        z.copy_from_slice(r);
        for i in 0..self.n {
            for k_idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                let j = self.col_idx[k_idx];
                if j >= i {
                    break;
                }
                z[i] -= self.lu_values[k_idx] * z[j];
            }
        }

        // U * z = y
        for i in (0..self.n).rev() {
            for k_idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                let j = self.col_idx[k_idx];
                if j > i {
                    z[i] -= self.lu_values[k_idx] * z[j];
                }
            }
            z[i] /= self.pivot(i);
        }
    }

    fn name(&self) -> &'static str {
        "ILU(0)"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        self.lu_values.copy_from_slice(matrix.values());
        self.factorize();
    }
}
