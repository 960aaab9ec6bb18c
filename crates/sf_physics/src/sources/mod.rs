// crates/sf_physics/src/sources/mod.rs

//! 有限体积源项（fvOptions）
//!
//! 源项以两种方式参与压力修正：
//! - 质量源加到压力方程右端以及密度连续方程
//! - 速度重构后对速度场做修正（如限速）
//!
//! 所有源项实现 [`FvSource`]，由 [`FvOptions`] 按注册顺序统一调用。

mod mass_source;
mod velocity_limiter;

pub use mass_source::MassSource;
pub use velocity_limiter::VelocityLimiter;

use std::collections::HashMap;

use crate::fields::VolVectorField;
use crate::mesh::FvMesh;

/// 源项 Trait
pub trait FvSource: Send + Sync {
    /// 源项名称
    fn name(&self) -> &str;

    /// 累加质量源（积分形式，单位时间质量）
    fn add_mass_source(&self, _mesh: &FvMesh, _out: &mut [f64]) {}

    /// 速度重构后的修正
    fn correct_velocity(&self, _mesh: &FvMesh, _u: &mut VolVectorField) {}
}

/// 源项容器
#[derive(Default)]
pub struct FvOptions {
    sources: Vec<Box<dyn FvSource>>,
    name_index: HashMap<String, usize>,
    enabled: Vec<bool>,
}

impl std::fmt::Debug for FvOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FvOptions")
            .field("sources", &self.list_sources())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl FvOptions {
    /// 空容器
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册源项，返回索引
    pub fn register<S: FvSource + 'static>(&mut self, source: S) -> usize {
        let idx = self.sources.len();
        self.name_index.insert(source.name().to_string(), idx);
        self.sources.push(Box::new(source));
        self.enabled.push(true);
        idx
    }

    /// 启用/禁用源项
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.name_index.get(name).and_then(|&i| self.enabled.get_mut(i)) {
            Some(flag) => {
                *flag = enabled;
                true
            }
            None => false,
        }
    }

    /// 已注册源项名称
    pub fn list_sources(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// 是否没有任何源项
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn active(&self) -> impl Iterator<Item = &dyn FvSource> {
        self.sources
            .iter()
            .zip(&self.enabled)
            .filter(|(_, on)| **on)
            .map(|(s, _)| s.as_ref())
    }

    /// 所有启用源项的质量源之和（每个单元）
    pub fn mass_source(&self, mesh: &FvMesh) -> Vec<f64> {
        let mut out = vec![0.0; mesh.n_cells()];
        for source in self.active() {
            source.add_mass_source(mesh, &mut out);
        }
        out
    }

    /// 依次应用速度修正
    pub fn correct(&self, mesh: &FvMesh, u: &mut VolVectorField) {
        for source in self.active() {
            source.correct_velocity(mesh, u);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshBuilder;
    use glam::DVec3;

    #[test]
    fn test_registry_and_enable() {
        let mesh = MeshBuilder::channel(4, 1, 4.0, 1.0).unwrap();
        let mut options = FvOptions::new();
        assert!(options.is_empty());
        options.register(MassSource::new("injector", vec![1], 2.0));
        options.register(VelocityLimiter::new("limiter", 1.0));
        assert_eq!(options.list_sources(), vec!["injector", "limiter"]);

        let s = options.mass_source(&mesh);
        assert!((s.iter().sum::<f64>() - 2.0).abs() < 1e-14);

        assert!(options.set_enabled("injector", false));
        assert!(options.mass_source(&mesh).iter().all(|&v| v == 0.0));
        assert!(!options.set_enabled("missing", false));

        let mut u = VolVectorField::new("U", &mesh, DVec3::new(3.0, 4.0, 0.0));
        options.correct(&mesh, &mut u);
        assert!((u.internal()[0].length() - 1.0).abs() < 1e-14);
    }
}
