// crates/sf_physics/src/sources/mass_source.rs

//! 点/区域质量源

use super::FvSource;
use crate::mesh::FvMesh;

/// 在一组单元上按体积分配的恒定质量源
///
/// `rate` 为总源强（单位时间质量，负值为汇）。
#[derive(Debug, Clone, PartialEq)]
pub struct MassSource {
    name: String,
    cells: Vec<usize>,
    rate: f64,
}

impl MassSource {
    /// 创建质量源
    pub fn new(name: impl Into<String>, cells: Vec<usize>, rate: f64) -> Self {
        Self {
            name: name.into(),
            cells,
            rate,
        }
    }

    /// 总源强
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// 修改源强
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }
}

impl FvSource for MassSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_mass_source(&self, mesh: &FvMesh, out: &mut [f64]) {
        let vols = mesh.cell_volumes();
        let cells: Vec<usize> = self.cells.iter().copied().filter(|&c| c < vols.len()).collect();
        if cells.len() < self.cells.len() {
            log::warn!("质量源 {} 含越界单元，已忽略", self.name);
        }
        let total: f64 = cells.iter().map(|&c| vols[c]).sum();
        if total <= 0.0 {
            return;
        }
        for c in cells {
            out[c] += self.rate * vols[c] / total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshBuilder;

    #[test]
    fn test_volume_weighted_distribution() {
        let mesh = MeshBuilder::channel(4, 1, 4.0, 1.0).unwrap();
        let src = MassSource::new("m", vec![0, 3, 99], 1.0);
        let mut out = vec![0.0; 4];
        src.add_mass_source(&mesh, &mut out);
        assert_eq!(out, vec![0.5, 0.0, 0.0, 0.5]);
    }
}
