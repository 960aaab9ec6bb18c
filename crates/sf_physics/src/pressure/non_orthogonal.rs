// crates/sf_physics/src/pressure/non_orthogonal.rs

//! 非正交修正循环
//!
//! 隐式系数只组装一次。每次子迭代只用最新的压力重建滞后的非正交
//! 修正项（只改右端），重新钉住参考单元后求解。最后一次子迭代求解
//! 后由方程的通量算子得到守恒通量。
//!
//! ```text
//! Iterating ──(未到最后一次)──> Iterating
//! Iterating ──(最后一次求解)──> Done
//! ```

use serde::Serialize;
use sf_config::LinearSolverConfig;

use super::equation::PressureEquation;
use super::error::PressureResult;
use super::reference::ReferenceCell;
use crate::fields::{SurfaceScalarField, VolScalarField};
use crate::mesh::FvMesh;
use crate::numerics::{SolverResult, SolverStatus};

/// 循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// 仍有子迭代
    Iterating,
    /// 已完成最后一次
    Done,
}

/// 一次子迭代的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonOrthIteration {
    /// 子迭代序号（从 0 开始）
    pub index: usize,
    /// 首次子迭代（非正交项已在组装时计入）
    pub is_first: bool,
    /// 最后一次子迭代（之后捕获通量）
    pub is_final: bool,
}

/// 有界的非正交子迭代序列，共 `n_non_orth_correctors + 1` 次
#[derive(Debug, Clone)]
pub struct NonOrthogonalLoop {
    n_iterations: usize,
    next: usize,
    state: LoopState,
}

impl NonOrthogonalLoop {
    /// 创建循环
    pub fn new(n_non_orth_correctors: usize) -> Self {
        Self {
            n_iterations: n_non_orth_correctors + 1,
            next: 0,
            state: LoopState::Iterating,
        }
    }

    /// 当前状态
    pub fn state(&self) -> LoopState {
        self.state
    }
}

impl Iterator for NonOrthogonalLoop {
    type Item = NonOrthIteration;

    fn next(&mut self) -> Option<NonOrthIteration> {
        if self.state == LoopState::Done {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let is_final = self.next == self.n_iterations;
        if is_final {
            self.state = LoopState::Done;
        }
        Some(NonOrthIteration {
            index,
            is_first: index == 0,
            is_final,
        })
    }
}

/// 一次线性求解的记录
#[derive(Debug, Clone, Serialize)]
pub struct SolveRecord {
    /// 求解变量
    pub field: String,
    /// PISO 修正序号
    pub corrector: usize,
    /// 非正交子迭代序号
    pub non_orth: usize,
    /// 最大非正交修正通量
    pub non_orth_correction: f64,
    /// 线性求解结果
    pub result: SolverResult,
}

impl SolveRecord {
    /// 线性求解是否收敛
    pub fn converged(&self) -> bool {
        self.result.status == SolverStatus::Converged
    }
}

/// 非正交循环的输出
#[derive(Debug, Clone)]
pub struct NonOrthOutcome {
    /// 每次求解的记录
    pub solves: Vec<SolveRecord>,
    /// 最后一次求解后的守恒通量
    pub phi: SurfaceScalarField,
}

/// 循环参数
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings<'a> {
    /// 参考单元（开域为 None）
    pub reference: Option<ReferenceCell>,
    /// 非正交修正次数
    pub n_non_orth_correctors: usize,
    /// 当前 PISO 修正序号（仅用于记录）
    pub corrector: usize,
    /// 线性求解器
    pub solver: &'a LinearSolverConfig,
}

/// 执行非正交修正循环
///
/// `refresh` 在除第一次以外的每次子迭代开始时调用，只允许重建方程的
/// 显式非正交项，返回修正通量的最大模。
pub fn run<F>(
    mesh: &FvMesh,
    equation: &mut PressureEquation,
    field: &mut VolScalarField,
    phi_hby_a: &SurfaceScalarField,
    settings: LoopSettings<'_>,
    mut refresh: F,
) -> PressureResult<NonOrthOutcome>
where
    F: FnMut(&mut PressureEquation, &VolScalarField) -> f64,
{
    let mut solves = Vec::with_capacity(settings.n_non_orth_correctors + 1);
    let mut phi = None;

    for it in NonOrthogonalLoop::new(settings.n_non_orth_correctors) {
        let non_orth_correction = if it.is_first { 0.0 } else { refresh(equation, field) };
        if let Some(r) = settings.reference {
            r.pin(equation.matrix_mut())?;
        }

        let result = equation.matrix_mut().solve(mesh, field, settings.solver)?;
        log::debug!(
            "{} 修正 {} 非正交 {}: 非正交修正 {:.3e}",
            field.name(),
            settings.corrector,
            it.index,
            non_orth_correction
        );
        solves.push(SolveRecord {
            field: field.name().to_string(),
            corrector: settings.corrector,
            non_orth: it.index,
            non_orth_correction,
            result,
        });

        if it.is_final {
            phi = Some(equation.conservative_flux(mesh, phi_hby_a, field)?);
        }
    }

    // 循环至少执行一次，最后一次必然捕获通量
    let phi = phi.unwrap_or_else(|| phi_hby_a.clone());
    Ok(NonOrthOutcome { solves, phi })
}

/// 默认的刷新闭包：用当前场重建矩阵的非正交项
pub fn refresh_lagged_term(mesh: &FvMesh) -> impl FnMut(&mut PressureEquation, &VolScalarField) -> f64 + '_ {
    move |equation: &mut PressureEquation, field: &VolScalarField| {
        equation.matrix_mut().refresh_non_orthogonal(mesh, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_states() {
        let mut l = NonOrthogonalLoop::new(2);
        let its: Vec<_> = l.by_ref().collect();
        assert_eq!(its.len(), 3);
        assert!(its[0].is_first && !its[0].is_final);
        assert!(!its[1].is_first && !its[1].is_final);
        assert!(its[2].is_final);
        assert_eq!(l.state(), LoopState::Done);
        assert!(l.next().is_none());
    }

    #[test]
    fn test_single_iteration_is_final() {
        let mut l = NonOrthogonalLoop::new(0);
        assert_eq!(l.state(), LoopState::Iterating);
        let it = l.next().unwrap();
        assert!(it.is_first && it.is_final);
        assert_eq!(l.state(), LoopState::Done);
    }
}
