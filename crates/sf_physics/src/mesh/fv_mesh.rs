// crates/sf_physics/src/mesh/fv_mesh.rs

//! 有限体积网格
//!
//! 面按 OpenFOAM 风格排列：内部面在前（owner < neighbour），
//! 边界面按边界片连续存放在后。每个面的面积向量 `Sf` 由 owner 指向
//! neighbour（边界面指向域外）。
//!
//! 除基本几何量外，网格还预计算离散算子所需的派生量：
//! - 线性插值权重 `w`（owner 侧），`φ_f = w·φ_P + (1-w)·φ_N`
//! - 过松弛非正交 delta 系数 `1/max(n·d, 0.05|d|)`
//! - 非正交修正向量 `k = n - d·delta`

use std::ops::Range;

use glam::DVec3;
use sf_foundation::{SfError, SfResult};

/// 非正交 delta 系数中 `n·d` 的下限比例
const DELTA_FLOOR: f64 = 0.05;

/// 边界片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// 名称
    pub name: String,
    /// 起始面（全局面索引）
    pub start: usize,
    /// 面数
    pub size: usize,
}

impl Patch {
    /// 全局面索引范围
    #[inline]
    pub fn faces(&self) -> Range<usize> {
        self.start..self.start + self.size
    }
}

/// 原始面数据
#[derive(Debug, Clone, Copy)]
pub struct RawFace {
    /// owner 单元
    pub owner: usize,
    /// neighbour 单元（边界面为 None）
    pub neighbour: Option<usize>,
    /// 面中心
    pub centre: DVec3,
    /// 面积向量，由 owner 指向外侧
    pub area: DVec3,
}

/// 有限体积网格
#[derive(Debug, Clone)]
pub struct FvMesh {
    cell_centres: Vec<DVec3>,
    cell_volumes: Vec<f64>,

    n_internal_faces: usize,
    owner: Vec<usize>,
    neighbour: Vec<usize>,
    face_centres: Vec<DVec3>,
    face_areas: Vec<DVec3>,
    face_mag: Vec<f64>,

    weights: Vec<f64>,
    delta_coeffs: Vec<f64>,
    corr_vectors: Vec<DVec3>,

    patches: Vec<Patch>,
    boundary_patch: Vec<usize>,
}

impl FvMesh {
    /// 由单元与面构造网格
    ///
    /// `faces` 必须内部面在前、边界面按 `patches` 顺序连续排列。
    pub fn from_parts(
        cell_centres: Vec<DVec3>,
        cell_volumes: Vec<f64>,
        faces: Vec<RawFace>,
        patches: Vec<Patch>,
    ) -> SfResult<Self> {
        let n_cells = cell_centres.len();
        SfError::check_size("cell_volumes", n_cells, cell_volumes.len())?;
        if n_cells == 0 {
            return Err(SfError::invalid_mesh("网格没有单元"));
        }
        if let Some((i, v)) = cell_volumes.iter().enumerate().find(|&(_, &v)| !(v > 0.0)) {
            return Err(SfError::invalid_mesh(format!("单元 {} 体积非正: {}", i, v)));
        }

        let n_internal_faces = faces.iter().take_while(|f| f.neighbour.is_some()).count();
        if faces[n_internal_faces..].iter().any(|f| f.neighbour.is_some()) {
            return Err(SfError::invalid_mesh("内部面必须排在边界面之前"));
        }

        // 边界片覆盖全部边界面
        let mut expected = n_internal_faces;
        let mut boundary_patch = Vec::with_capacity(faces.len() - n_internal_faces);
        for (pi, patch) in patches.iter().enumerate() {
            if patch.start != expected {
                return Err(SfError::invalid_mesh(format!(
                    "边界片 '{}' 起始面 {} 不连续（期望 {}）",
                    patch.name, patch.start, expected
                )));
            }
            expected += patch.size;
            boundary_patch.extend(std::iter::repeat(pi).take(patch.size));
        }
        SfError::check_size("boundary faces", faces.len() - n_internal_faces, expected - n_internal_faces)?;

        let n_faces = faces.len();
        let mut owner = Vec::with_capacity(n_faces);
        let mut neighbour = Vec::with_capacity(n_internal_faces);
        let mut face_centres = Vec::with_capacity(n_faces);
        let mut face_areas = Vec::with_capacity(n_faces);
        let mut face_mag = Vec::with_capacity(n_faces);
        let mut weights = Vec::with_capacity(n_faces);
        let mut delta_coeffs = Vec::with_capacity(n_faces);
        let mut corr_vectors = Vec::with_capacity(n_faces);

        for (fi, face) in faces.iter().enumerate() {
            SfError::check_index("Cell", face.owner, n_cells)?;
            let mag = face.area.length();
            if !(mag > 0.0) {
                return Err(SfError::invalid_mesh(format!("面 {} 面积为零", fi)));
            }
            let n = face.area / mag;
            let c_p = cell_centres[face.owner];

            match face.neighbour {
                Some(nb) => {
                    SfError::check_index("Cell", nb, n_cells)?;
                    if nb == face.owner {
                        return Err(SfError::invalid_mesh(format!("面 {} 的 owner 与 neighbour 相同", fi)));
                    }
                    let c_n = cell_centres[nb];
                    let d = c_n - c_p;
                    let dist_p = n.dot(face.centre - c_p).abs();
                    let dist_n = n.dot(c_n - face.centre).abs();
                    let w = if dist_p + dist_n > 0.0 { dist_n / (dist_p + dist_n) } else { 0.5 };
                    let delta = 1.0 / n.dot(d).max(DELTA_FLOOR * d.length());
                    weights.push(w);
                    delta_coeffs.push(delta);
                    corr_vectors.push(n - d * delta);
                    neighbour.push(nb);
                }
                None => {
                    let d = face.centre - c_p;
                    let delta = 1.0 / n.dot(d).max(DELTA_FLOOR * d.length());
                    weights.push(1.0);
                    delta_coeffs.push(delta);
                    corr_vectors.push(DVec3::ZERO);
                }
            }

            owner.push(face.owner);
            face_centres.push(face.centre);
            face_areas.push(face.area);
            face_mag.push(mag);
        }

        if delta_coeffs.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return Err(SfError::invalid_mesh("存在非正的 delta 系数（面位于单元中心背侧）"));
        }

        Ok(Self {
            cell_centres,
            cell_volumes,
            n_internal_faces,
            owner,
            neighbour,
            face_centres,
            face_areas,
            face_mag,
            weights,
            delta_coeffs,
            corr_vectors,
            patches,
            boundary_patch,
        })
    }

    // ---------------------------------------------------------------------
    // 规模
    // ---------------------------------------------------------------------

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.cell_centres.len()
    }

    /// 面总数
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.owner.len()
    }

    /// 内部面数
    #[inline]
    pub fn n_internal_faces(&self) -> usize {
        self.n_internal_faces
    }

    /// 边界面数
    #[inline]
    pub fn n_boundary_faces(&self) -> usize {
        self.n_faces() - self.n_internal_faces
    }

    /// 内部面索引范围
    #[inline]
    pub fn internal_faces(&self) -> Range<usize> {
        0..self.n_internal_faces
    }

    /// 边界面索引范围
    #[inline]
    pub fn boundary_faces(&self) -> Range<usize> {
        self.n_internal_faces..self.n_faces()
    }

    // ---------------------------------------------------------------------
    // 单元几何
    // ---------------------------------------------------------------------

    /// 单元中心
    #[inline]
    pub fn cell_centres(&self) -> &[DVec3] {
        &self.cell_centres
    }

    /// 单元体积
    #[inline]
    pub fn cell_volumes(&self) -> &[f64] {
        &self.cell_volumes
    }

    /// 计算域总体积
    pub fn total_volume(&self) -> f64 {
        self.cell_volumes.iter().sum()
    }

    // ---------------------------------------------------------------------
    // 面几何
    // ---------------------------------------------------------------------

    /// 面 owner
    #[inline]
    pub fn owner(&self, face: usize) -> usize {
        self.owner[face]
    }

    /// 内部面 neighbour
    #[inline]
    pub fn neighbour(&self, face: usize) -> usize {
        self.neighbour[face]
    }

    /// 面中心
    #[inline]
    pub fn face_centre(&self, face: usize) -> DVec3 {
        self.face_centres[face]
    }

    /// 面积向量 Sf
    #[inline]
    pub fn sf(&self, face: usize) -> DVec3 {
        self.face_areas[face]
    }

    /// 面积 |Sf|
    #[inline]
    pub fn mag_sf(&self, face: usize) -> f64 {
        self.face_mag[face]
    }

    /// owner 侧插值权重
    #[inline]
    pub fn weight(&self, face: usize) -> f64 {
        self.weights[face]
    }

    /// 非正交 delta 系数
    #[inline]
    pub fn delta_coeff(&self, face: usize) -> f64 {
        self.delta_coeffs[face]
    }

    /// 非正交修正向量 k
    #[inline]
    pub fn corr_vector(&self, face: usize) -> DVec3 {
        self.corr_vectors[face]
    }

    // ---------------------------------------------------------------------
    // 边界
    // ---------------------------------------------------------------------

    /// 边界片列表
    #[inline]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// 按名称查找边界片
    pub fn find_patch(&self, name: &str) -> SfResult<usize> {
        self.patches
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| SfError::not_found(format!("边界片 '{}'", name)))
    }

    /// 边界面所在的边界片（`face` 为全局面索引）
    #[inline]
    pub fn patch_of(&self, face: usize) -> usize {
        self.boundary_patch[face - self.n_internal_faces]
    }

    /// 全局面索引转边界面局部索引
    #[inline]
    pub fn boundary_index(&self, face: usize) -> usize {
        face - self.n_internal_faces
    }

    // ---------------------------------------------------------------------
    // 质量指标
    // ---------------------------------------------------------------------

    /// 最大非正交角 [度]
    pub fn max_non_orthogonality(&self) -> f64 {
        self.internal_faces()
            .map(|f| {
                let d = self.cell_centres[self.neighbour[f]] - self.cell_centres[self.owner[f]];
                let n = self.face_areas[f] / self.face_mag[f];
                (n.dot(d) / d.length()).clamp(-1.0, 1.0).acos().to_degrees()
            })
            .fold(0.0, f64::max)
    }

    /// 网格是否正交（所有修正向量近似为零）
    pub fn is_orthogonal(&self, tol: f64) -> bool {
        self.corr_vectors.iter().all(|k| k.length() <= tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 两个单位立方体沿 x 相连
    fn two_cells() -> FvMesh {
        let cc = vec![DVec3::new(0.5, 0.5, 0.5), DVec3::new(1.5, 0.5, 0.5)];
        let faces = vec![
            RawFace { owner: 0, neighbour: Some(1), centre: DVec3::new(1.0, 0.5, 0.5), area: DVec3::X },
            RawFace { owner: 0, neighbour: None, centre: DVec3::new(0.0, 0.5, 0.5), area: -DVec3::X },
            RawFace { owner: 1, neighbour: None, centre: DVec3::new(2.0, 0.5, 0.5), area: DVec3::X },
        ];
        let patches = vec![
            Patch { name: "left".into(), start: 1, size: 1 },
            Patch { name: "right".into(), start: 2, size: 1 },
        ];
        FvMesh::from_parts(cc, vec![1.0, 1.0], faces, patches).unwrap()
    }

    #[test]
    fn test_geometry() {
        let mesh = two_cells();
        assert_eq!(mesh.n_cells(), 2);
        assert_eq!(mesh.n_internal_faces(), 1);
        assert_eq!(mesh.n_boundary_faces(), 2);
        assert!((mesh.weight(0) - 0.5).abs() < 1e-14);
        assert!((mesh.delta_coeff(0) - 1.0).abs() < 1e-14);
        assert!((mesh.delta_coeff(1) - 2.0).abs() < 1e-14);
        assert!(mesh.is_orthogonal(1e-12));
        assert!(mesh.max_non_orthogonality() < 1e-6);
    }

    #[test]
    fn test_patch_lookup() {
        let mesh = two_cells();
        assert_eq!(mesh.find_patch("right").unwrap(), 1);
        assert_eq!(mesh.patch_of(2), 1);
        assert_eq!(mesh.patches()[0].faces(), 1..2);
        assert!(mesh.find_patch("top").is_err());
    }

    #[test]
    fn test_rejects_bad_volume() {
        let cc = vec![DVec3::ZERO];
        let faces = vec![RawFace { owner: 0, neighbour: None, centre: DVec3::X, area: DVec3::X }];
        let patches = vec![Patch { name: "all".into(), start: 0, size: 1 }];
        assert!(FvMesh::from_parts(cc, vec![0.0], faces, patches).is_err());
    }

    #[test]
    fn test_rejects_unordered_faces() {
        let cc = vec![DVec3::new(0.5, 0.0, 0.0), DVec3::new(1.5, 0.0, 0.0)];
        let faces = vec![
            RawFace { owner: 0, neighbour: None, centre: DVec3::ZERO, area: -DVec3::X },
            RawFace { owner: 0, neighbour: Some(1), centre: DVec3::X, area: DVec3::X },
        ];
        let patches = vec![Patch { name: "left".into(), start: 0, size: 1 }];
        assert!(FvMesh::from_parts(cc, vec![1.0, 1.0], faces, patches).is_err());
    }
}
