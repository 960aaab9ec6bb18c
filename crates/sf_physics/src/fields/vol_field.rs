// crates/sf_physics/src/fields/vol_field.rs

//! 体场（单元中心值 + 边界面值）
//!
//! [`VolField<T>`] 同时服务标量场（压力、密度）和向量场（速度）。
//! 场内保存：
//! - 单元值与每个边界面的值
//! - 每个边界片的 [`BoundaryKind`] 以及梯度类边界的法向梯度
//! - 上一次外迭代的值（显式松弛用）与上一时间步的值（瞬态项用）

use std::fmt::Debug;
use std::ops::{Add, Mul, Sub};

use glam::DVec3;
use sf_foundation::{SfError, SfResult};

use super::boundary::BoundaryKind;
use crate::mesh::FvMesh;

/// 场元素类型
pub trait FieldValue:
    Copy
    + Default
    + Debug
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f64, Output = Self>
    + Send
    + Sync
    + 'static
{
    /// 零值
    const ZERO: Self;

    /// 模
    fn magnitude(self) -> f64;
}

impl FieldValue for f64 {
    const ZERO: Self = 0.0;

    #[inline]
    fn magnitude(self) -> f64 {
        self.abs()
    }
}

impl FieldValue for DVec3 {
    const ZERO: Self = DVec3::ZERO;

    #[inline]
    fn magnitude(self) -> f64 {
        self.length()
    }
}

/// 体场
#[derive(Debug, Clone)]
pub struct VolField<T: FieldValue> {
    name: String,
    internal: Vec<T>,
    boundary: Vec<T>,
    gradient: Vec<T>,
    kinds: Vec<BoundaryKind>,
    prev_iter: Option<(Vec<T>, Vec<T>)>,
    old_time: Option<Vec<T>>,
}

/// 标量体场
pub type VolScalarField = VolField<f64>;
/// 向量体场
pub type VolVectorField = VolField<DVec3>;

impl<T: FieldValue> VolField<T> {
    /// 均匀场，所有边界片为零梯度
    pub fn new(name: impl Into<String>, mesh: &FvMesh, value: T) -> Self {
        Self {
            name: name.into(),
            internal: vec![value; mesh.n_cells()],
            boundary: vec![value; mesh.n_boundary_faces()],
            gradient: vec![T::ZERO; mesh.n_boundary_faces()],
            kinds: vec![BoundaryKind::ZeroGradient; mesh.patches().len()],
            prev_iter: None,
            old_time: None,
        }
    }

    /// 由单元值构造，边界值按零梯度外推
    pub fn from_values(name: impl Into<String>, mesh: &FvMesh, values: Vec<T>) -> SfResult<Self> {
        SfError::check_size("VolField", mesh.n_cells(), values.len())?;
        let mut field = Self::new(name, mesh, T::ZERO);
        field.internal = values;
        field.correct_boundary_conditions(mesh);
        Ok(field)
    }

    /// 设置边界片类型
    ///
    /// `value` 对 FixedValue 为边界值，对梯度类边界为法向梯度，
    /// 其他类型忽略。
    pub fn with_patch(mut self, mesh: &FvMesh, patch: &str, kind: BoundaryKind, value: T) -> SfResult<Self> {
        self.set_patch(mesh, patch, kind, value)?;
        Ok(self)
    }

    /// 设置边界片类型（原地）
    pub fn set_patch(&mut self, mesh: &FvMesh, patch: &str, kind: BoundaryKind, value: T) -> SfResult<()> {
        let pi = mesh.find_patch(patch)?;
        self.kinds[pi] = kind;
        for f in mesh.patches()[pi].faces() {
            let b = mesh.boundary_index(f);
            match kind {
                BoundaryKind::FixedValue => self.boundary[b] = value,
                BoundaryKind::FixedGradient | BoundaryKind::FixedFluxPressure => self.gradient[b] = value,
                BoundaryKind::ZeroGradient | BoundaryKind::Calculated => {}
            }
        }
        self.correct_boundary_conditions(mesh);
        Ok(())
    }

    /// 场名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 单元值
    #[inline]
    pub fn internal(&self) -> &[T] {
        &self.internal
    }

    /// 单元值（可变）
    #[inline]
    pub fn internal_mut(&mut self) -> &mut [T] {
        &mut self.internal
    }

    /// 整体替换单元值
    pub fn assign(&mut self, values: Vec<T>) -> SfResult<()> {
        SfError::check_size("VolField::assign", self.internal.len(), values.len())?;
        self.internal = values;
        Ok(())
    }

    /// 边界面值（按边界面局部索引）
    #[inline]
    pub fn boundary(&self) -> &[T] {
        &self.boundary
    }

    /// 边界面值（可变）
    #[inline]
    pub fn boundary_mut(&mut self) -> &mut [T] {
        &mut self.boundary
    }

    /// 全局面索引处的边界值
    #[inline]
    pub fn boundary_value(&self, mesh: &FvMesh, face: usize) -> T {
        self.boundary[mesh.boundary_index(face)]
    }

    /// 边界面法向梯度
    #[inline]
    pub fn gradient(&self) -> &[T] {
        &self.gradient
    }

    /// 设置全局面索引处的法向梯度
    #[inline]
    pub fn set_gradient(&mut self, mesh: &FvMesh, face: usize, value: T) {
        let b = mesh.boundary_index(face);
        self.gradient[b] = value;
    }

    /// 边界片类型
    #[inline]
    pub fn kind(&self, patch: usize) -> BoundaryKind {
        self.kinds[patch]
    }

    /// 全部边界片类型
    #[inline]
    pub fn kinds(&self) -> &[BoundaryKind] {
        &self.kinds
    }

    /// 全局面索引处的边界类型
    #[inline]
    pub fn face_kind(&self, mesh: &FvMesh, face: usize) -> BoundaryKind {
        self.kinds[mesh.patch_of(face)]
    }

    /// 没有任何边界片固定场的水平（需要参考单元）
    pub fn needs_reference(&self) -> bool {
        !self.kinds.iter().any(|k| k.fixes_level())
    }

    /// 根据单元值刷新非固定值边界
    pub fn correct_boundary_conditions(&mut self, mesh: &FvMesh) {
        for f in mesh.boundary_faces() {
            let b = mesh.boundary_index(f);
            let owner_value = self.internal[mesh.owner(f)];
            match self.kinds[mesh.patch_of(f)] {
                BoundaryKind::FixedValue | BoundaryKind::Calculated => {}
                BoundaryKind::ZeroGradient => self.boundary[b] = owner_value,
                BoundaryKind::FixedGradient | BoundaryKind::FixedFluxPressure => {
                    self.boundary[b] = owner_value + self.gradient[b] * (1.0 / mesh.delta_coeff(f));
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // 松弛与时间层
    // ---------------------------------------------------------------------

    /// 保存当前单元值与边界值作为上一次迭代值
    pub fn store_prev_iter(&mut self) {
        self.prev_iter = Some((self.internal.clone(), self.boundary.clone()));
    }

    /// 上一次迭代的单元值
    #[inline]
    pub fn prev_iter(&self) -> Option<&[T]> {
        self.prev_iter.as_ref().map(|(internal, _)| internal.as_slice())
    }

    /// 显式松弛: φ = φ_prev + α(φ - φ_prev)
    ///
    /// 单元值与边界值一起松弛；未保存上一次迭代值时不做任何事。
    pub fn relax_with(&mut self, alpha: f64) {
        if let Some((prev, prev_boundary)) = &self.prev_iter {
            for (v, &p) in self.internal.iter_mut().zip(prev.iter()) {
                *v = p + (*v - p) * alpha;
            }
            for (v, &p) in self.boundary.iter_mut().zip(prev_boundary.iter()) {
                *v = p + (*v - p) * alpha;
            }
        }
    }

    /// 保存当前值作为上一时间步值
    pub fn store_old_time(&mut self) {
        self.old_time = Some(self.internal.clone());
    }

    /// 上一时间步值（未保存时返回当前值）
    #[inline]
    pub fn old_time(&self) -> &[T] {
        self.old_time.as_deref().unwrap_or(&self.internal)
    }

    /// 是否保存过上一时间步值
    #[inline]
    pub fn has_old_time(&self) -> bool {
        self.old_time.is_some()
    }

    /// 直接设置上一时间步值
    pub fn set_old_time(&mut self, values: Vec<T>) -> SfResult<()> {
        SfError::check_size("VolField::set_old_time", self.internal.len(), values.len())?;
        self.old_time = Some(values);
        Ok(())
    }
}

impl VolScalarField {
    /// 单元最大值
    pub fn max(&self) -> f64 {
        self.internal.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// 单元最小值
    pub fn min(&self) -> f64 {
        self.internal.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// 边界面值系数 `(vic, vbc)`
    #[inline]
    pub fn value_coeffs(&self, mesh: &FvMesh, face: usize) -> (f64, f64) {
        let b = mesh.boundary_index(face);
        self.face_kind(mesh, face)
            .value_coeffs(self.boundary[b], self.gradient[b], mesh.delta_coeff(face))
    }

    /// 边界面梯度系数 `(gic, gbc)`
    #[inline]
    pub fn gradient_coeffs(&self, mesh: &FvMesh, face: usize) -> (f64, f64) {
        let b = mesh.boundary_index(face);
        self.face_kind(mesh, face)
            .gradient_coeffs(self.boundary[b], self.gradient[b], mesh.delta_coeff(face))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshBuilder;

    #[test]
    fn test_fixed_value_patch() {
        let mesh = MeshBuilder::channel(3, 1, 3.0, 1.0).unwrap();
        let p = VolScalarField::new("p", &mesh, 1.0)
            .with_patch(&mesh, "outlet", BoundaryKind::FixedValue, 0.0)
            .unwrap();
        assert!(!p.needs_reference());

        let outlet = &mesh.patches()[mesh.find_patch("outlet").unwrap()];
        for f in outlet.faces() {
            assert_eq!(p.boundary_value(&mesh, f), 0.0);
        }
        let inlet = &mesh.patches()[mesh.find_patch("inlet").unwrap()];
        for f in inlet.faces() {
            assert_eq!(p.boundary_value(&mesh, f), 1.0);
        }
    }

    #[test]
    fn test_unknown_patch() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let p = VolScalarField::new("p", &mesh, 0.0);
        assert!(p.with_patch(&mesh, "nowhere", BoundaryKind::FixedValue, 0.0).is_err());
    }

    #[test]
    fn test_gradient_boundary_extrapolation() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let mut p = VolScalarField::new("p", &mesh, 2.0)
            .with_patch(&mesh, "inlet", BoundaryKind::FixedGradient, 4.0)
            .unwrap();
        p.correct_boundary_conditions(&mesh);
        let f = mesh.patches()[mesh.find_patch("inlet").unwrap()].start;
        // 中心到面距离 0.5
        assert!((p.boundary_value(&mesh, f) - 4.0).abs() < 1e-12);
        assert!(p.needs_reference());
    }

    #[test]
    fn test_explicit_relaxation() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let mut p = VolScalarField::new("p", &mesh, 1.0);
        // 未保存上一次迭代值
        p.relax_with(0.5);
        assert_eq!(p.internal(), &[1.0, 1.0]);

        p.store_prev_iter();
        p.internal_mut().iter_mut().for_each(|v| *v = 5.0);
        p.boundary_mut().iter_mut().for_each(|v| *v = 5.0);
        p.relax_with(0.25);
        assert_eq!(p.internal(), &[2.0, 2.0]);
        assert!(p.boundary().iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_relaxed_boundary_matches_interior() {
        let mesh = MeshBuilder::closed_box(2, 2, 1.0, 1.0, false).unwrap();
        let mut rho = VolScalarField::new("rho", &mesh, 1.0);
        rho.store_prev_iter();
        let eos = VolScalarField::new("rho", &mesh, 3.0);
        rho.internal_mut().copy_from_slice(eos.internal());
        rho.boundary_mut().copy_from_slice(eos.boundary());
        rho.relax_with(0.5);
        for f in mesh.boundary_faces() {
            assert_eq!(rho.boundary_value(&mesh, f), rho.internal()[mesh.owner(f)]);
        }
        assert!(rho.internal().iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_old_time_fallback() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let mut u = VolVectorField::new("U", &mesh, DVec3::X);
        assert_eq!(u.old_time()[0], DVec3::X);
        u.store_old_time();
        u.internal_mut()[0] = DVec3::Y;
        assert_eq!(u.old_time()[0], DVec3::X);
    }

    #[test]
    fn test_from_values_size_check() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        assert!(VolScalarField::from_values("rho", &mesh, vec![1.0]).is_err());
        let rho = VolScalarField::from_values("rho", &mesh, vec![1.0, 3.0]).unwrap();
        assert_eq!(rho.max(), 3.0);
        assert_eq!(rho.min(), 1.0);
    }
}
