// crates/sf_physics/src/mesh/builder.rs

//! 网格构建器
//!
//! 由二维多边形单元拉伸单位厚度生成三维有限体积网格。前后两个
//! 拉伸面不参与离散（等价于 OpenFOAM 的 `empty` 边界），因此所有
//! 面积向量的 z 分量为零。
//!
//! # 使用示例
//!
//! ```
//! use sf_physics::mesh::MeshBuilder;
//!
//! let mesh = MeshBuilder::channel(4, 2, 4.0, 1.0).unwrap();
//! assert_eq!(mesh.n_cells(), 8);
//! assert!(mesh.find_patch("inlet").is_ok());
//! ```

use std::collections::BTreeMap;

use glam::{DVec2, DVec3};
use sf_foundation::{SfError, SfResult};

use super::fv_mesh::{FvMesh, Patch, RawFace};

/// 拉伸厚度
const DEPTH: f64 = 1.0;

/// 二维多边形网格构建器
#[derive(Debug, Clone, Default)]
pub struct MeshBuilder {
    points: Vec<DVec2>,
    cells: Vec<Vec<usize>>,
}

/// 一个单元看到的边
struct HalfEdge {
    cell: usize,
    centre: DVec3,
    area: DVec3,
}

impl MeshBuilder {
    /// 创建空构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加节点，返回索引
    pub fn add_point(&mut self, p: DVec2) -> usize {
        self.points.push(p);
        self.points.len() - 1
    }

    /// 添加多边形单元（顶点顺序任意方向），返回单元索引
    pub fn add_cell(&mut self, vertices: &[usize]) -> usize {
        self.cells.push(vertices.to_vec());
        self.cells.len() - 1
    }

    /// 构建网格
    ///
    /// `classify(face_centre, unit_normal)` 为每个边界面返回所属边界片名称。
    pub fn build<F>(self, classify: F) -> SfResult<FvMesh>
    where
        F: Fn(DVec3, DVec3) -> String,
    {
        let n_cells = self.cells.len();
        let mut centres = Vec::with_capacity(n_cells);
        let mut volumes = Vec::with_capacity(n_cells);
        let mut edges: BTreeMap<(usize, usize), Vec<HalfEdge>> = BTreeMap::new();

        for (ci, cell) in self.cells.iter().enumerate() {
            if cell.len() < 3 {
                return Err(SfError::invalid_mesh(format!("单元 {} 顶点数少于 3", ci)));
            }
            for &v in cell {
                SfError::check_index("Point", v, self.points.len())?;
            }

            let (area, centroid) = polygon_area_centroid(cell.iter().map(|&v| self.points[v]));
            if area.abs() < 1e-300 {
                return Err(SfError::invalid_mesh(format!("单元 {} 面积为零", ci)));
            }
            // 统一为逆时针
            let ordered: Vec<usize> = if area > 0.0 {
                cell.clone()
            } else {
                cell.iter().rev().copied().collect()
            };

            centres.push(DVec3::new(centroid.x, centroid.y, 0.5 * DEPTH));
            volumes.push(area.abs() * DEPTH);

            for k in 0..ordered.len() {
                let (a, b) = (ordered[k], ordered[(k + 1) % ordered.len()]);
                let (pa, pb) = (self.points[a], self.points[b]);
                let d = pb - pa;
                // 逆时针多边形的外法向为 (dy, -dx)
                let half = HalfEdge {
                    cell: ci,
                    centre: DVec3::new(0.5 * (pa.x + pb.x), 0.5 * (pa.y + pb.y), 0.5 * DEPTH),
                    area: DVec3::new(d.y, -d.x, 0.0) * DEPTH,
                };
                edges.entry((a.min(b), a.max(b))).or_default().push(half);
            }
        }

        let mut internal: Vec<RawFace> = Vec::new();
        let mut boundary: BTreeMap<String, Vec<RawFace>> = BTreeMap::new();

        for (key, halves) in edges {
            match halves.as_slice() {
                [only] => {
                    let normal = only.area.normalize();
                    boundary.entry(classify(only.centre, normal)).or_default().push(RawFace {
                        owner: only.cell,
                        neighbour: None,
                        centre: only.centre,
                        area: only.area,
                    });
                }
                [first, second] => {
                    let (own, nei, area) = if first.cell < second.cell {
                        (first.cell, second.cell, first.area)
                    } else {
                        (second.cell, first.cell, second.area)
                    };
                    internal.push(RawFace {
                        owner: own,
                        neighbour: Some(nei),
                        centre: first.centre,
                        area,
                    });
                }
                _ => {
                    return Err(SfError::invalid_mesh(format!(
                        "边 ({}, {}) 被 {} 个单元共享",
                        key.0,
                        key.1,
                        halves.len()
                    )));
                }
            }
        }

        internal.sort_by_key(|f| (f.owner, f.neighbour));

        let mut faces = internal;
        let mut patches = Vec::with_capacity(boundary.len());
        for (name, patch_faces) in boundary {
            patches.push(Patch {
                name,
                start: faces.len(),
                size: patch_faces.len(),
            });
            faces.extend(patch_faces);
        }

        let mesh = FvMesh::from_parts(centres, volumes, faces, patches)?;
        log::debug!(
            "构建网格: {} 单元, {} 内部面, {} 边界面, 最大非正交角 {:.2}°",
            mesh.n_cells(),
            mesh.n_internal_faces(),
            mesh.n_boundary_faces(),
            mesh.max_non_orthogonality()
        );
        Ok(mesh)
    }

    // ---------------------------------------------------------------------
    // 结构化生成器
    // ---------------------------------------------------------------------

    /// nx × ny 的四边形网格，节点 x 坐标按 `shear·y` 错切
    pub fn structured(nx: usize, ny: usize, lx: f64, ly: f64, shear: f64) -> Self {
        let mut builder = Self::new();
        let (dx, dy) = (lx / nx as f64, ly / ny as f64);
        for j in 0..=ny {
            for i in 0..=nx {
                let y = j as f64 * dy;
                builder.add_point(DVec2::new(i as f64 * dx + shear * y, y));
            }
        }
        let idx = |i: usize, j: usize| j * (nx + 1) + i;
        for j in 0..ny {
            for i in 0..nx {
                builder.add_cell(&[idx(i, j), idx(i + 1, j), idx(i + 1, j + 1), idx(i, j + 1)]);
            }
        }
        builder
    }

    /// 直通道：左侧 `inlet`，右侧 `outlet`，上下 `walls`
    pub fn channel(nx: usize, ny: usize, lx: f64, ly: f64) -> SfResult<FvMesh> {
        Self::structured(nx, ny, lx, ly, 0.0).build(classify_channel)
    }

    /// 错切通道（非正交网格），边界片命名同 [`MeshBuilder::channel`]
    pub fn sheared_channel(nx: usize, ny: usize, lx: f64, ly: f64, shear: f64) -> SfResult<FvMesh> {
        Self::structured(nx, ny, lx, ly, shear).build(classify_channel)
    }

    /// 封闭方腔：全部边界为 `walls`，可选顶盖 `lid`
    pub fn closed_box(nx: usize, ny: usize, lx: f64, ly: f64, with_lid: bool) -> SfResult<FvMesh> {
        Self::structured(nx, ny, lx, ly, 0.0).build(move |_, n| {
            if with_lid && n.y > 0.5 {
                "lid".to_string()
            } else {
                "walls".to_string()
            }
        })
    }
}

fn classify_channel(_centre: DVec3, normal: DVec3) -> String {
    if normal.x < -0.5 {
        "inlet".to_string()
    } else if normal.x > 0.5 {
        "outlet".to_string()
    } else {
        "walls".to_string()
    }
}

/// 多边形有向面积与形心（逆时针为正）
fn polygon_area_centroid(points: impl Iterator<Item = DVec2>) -> (f64, DVec2) {
    let pts: Vec<DVec2> = points.collect();
    let n = pts.len();
    let mut area2 = 0.0;
    let mut c = DVec2::ZERO;
    for k in 0..n {
        let (p, q) = (pts[k], pts[(k + 1) % n]);
        let cross = p.x * q.y - q.x * p.y;
        area2 += cross;
        c += (p + q) * cross;
    }
    let area = 0.5 * area2;
    if area2.abs() < 1e-300 {
        return (0.0, DVec2::ZERO);
    }
    (area, c / (3.0 * area2))
}
