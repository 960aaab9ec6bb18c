// crates/sf_physics/src/fields/surface_field.rs

//! 面场（每个面一个标量）
//!
//! 主要用于体积/质量通量 `phi` 以及插值得到的面系数 `rAUf`、`rhorAUf`。
//! 通量符号约定：沿面积向量 `Sf` 方向为正（内部面 owner → neighbour，
//! 边界面指向域外）。

use sf_foundation::{SfError, SfResult};

use crate::mesh::FvMesh;

/// 标量面场
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceScalarField {
    name: String,
    values: Vec<f64>,
    old_time: Option<Vec<f64>>,
}

impl SurfaceScalarField {
    /// 均匀面场
    pub fn new(name: impl Into<String>, mesh: &FvMesh, value: f64) -> Self {
        Self {
            name: name.into(),
            values: vec![value; mesh.n_faces()],
            old_time: None,
        }
    }

    /// 由面值构造
    pub fn from_values(name: impl Into<String>, mesh: &FvMesh, values: Vec<f64>) -> SfResult<Self> {
        SfError::check_size("SurfaceScalarField", mesh.n_faces(), values.len())?;
        Ok(Self {
            name: name.into(),
            values,
            old_time: None,
        })
    }

    /// 场名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 改名（用于派生场）
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 所有面值
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// 所有面值（可变）
    #[inline]
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// 边界片上的面值
    pub fn patch_values<'a>(&'a self, mesh: &FvMesh, patch: usize) -> &'a [f64] {
        &self.values[mesh.patches()[patch].faces()]
    }

    /// 逐面相乘
    pub fn multiply(&mut self, other: &[f64]) {
        for (v, &o) in self.values.iter_mut().zip(other.iter()) {
            *v *= o;
        }
    }

    /// 逐面相加
    pub fn add_assign(&mut self, other: &[f64]) {
        for (v, &o) in self.values.iter_mut().zip(other.iter()) {
            *v += o;
        }
    }

    /// 逐面相减
    pub fn sub_assign(&mut self, other: &[f64]) {
        for (v, &o) in self.values.iter_mut().zip(other.iter()) {
            *v -= o;
        }
    }

    /// 保存当前值作为上一时间步值
    pub fn store_old_time(&mut self) {
        self.old_time = Some(self.values.clone());
    }

    /// 上一时间步值（未保存时返回当前值）
    #[inline]
    pub fn old_time(&self) -> &[f64] {
        self.old_time.as_deref().unwrap_or(&self.values)
    }

    /// 所有面值中是否存在非正值
    pub fn first_non_positive(&self) -> Option<(usize, f64)> {
        self.values
            .iter()
            .copied()
            .enumerate()
            .find(|&(_, v)| !(v > 0.0))
    }
}
