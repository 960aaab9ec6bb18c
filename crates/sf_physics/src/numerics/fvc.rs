// crates/sf_physics/src/numerics/fvc.rs

//! 显式有限体积算子（fvc）
//!
//! 所有算子只读取场的当前值，返回新数组，不修改输入。
//!
//! | 算子 | 结果 |
//! |------|------|
//! | [`interpolate`] | 线性插值到面，边界面取边界值 |
//! | [`flux`] | `Sf · U_f` |
//! | [`surface_sum`] | 单元通量和（积分形式） |
//! | [`div`] | `surface_sum / V` |
//! | [`grad`] | Gauss 线性梯度 |
//! | [`sn_grad`] | 带非正交修正的面法向梯度 |
//! | [`reconstruct`] | 由面通量重构单元向量 |
//! | [`domain_integrate`] | `Σ φ·V` |
//! | [`ddt_corr`] | Euler 通量时间修正 |

use glam::{DMat3, DVec3};
use sf_foundation::SMALL;

use crate::fields::{FieldValue, SurfaceScalarField, VolField, VolScalarField, VolVectorField};
use crate::mesh::FvMesh;

/// 线性插值到面
pub fn interpolate<T: FieldValue>(mesh: &FvMesh, field: &VolField<T>) -> Vec<T> {
    interpolate_values(mesh, field.internal(), field.boundary())
}

/// 由单元值与边界面值插值到面
pub fn interpolate_values<T: FieldValue>(mesh: &FvMesh, internal: &[T], boundary: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(mesh.n_faces());
    for f in mesh.internal_faces() {
        let w = mesh.weight(f);
        out.push(internal[mesh.owner(f)] * w + internal[mesh.neighbour(f)] * (1.0 - w));
    }
    out.extend_from_slice(boundary);
    out
}

/// 标量场插值为面场
pub fn interpolate_scalar(mesh: &FvMesh, field: &VolScalarField) -> SurfaceScalarField {
    SurfaceScalarField::from_values(format!("interpolate({})", field.name()), mesh, interpolate(mesh, field))
        .unwrap_or_else(|_| SurfaceScalarField::new("interpolate", mesh, 0.0))
}

/// 两个标量场乘积的插值 `interpolate(a*b)`
pub fn interpolate_product(mesh: &FvMesh, a: &VolScalarField, b: &VolScalarField) -> Vec<f64> {
    let internal: Vec<f64> = a.internal().iter().zip(b.internal()).map(|(x, y)| x * y).collect();
    let boundary: Vec<f64> = a.boundary().iter().zip(b.boundary()).map(|(x, y)| x * y).collect();
    interpolate_values(mesh, &internal, &boundary)
}

/// 体积通量 `Sf · interpolate(U)`
pub fn flux(mesh: &FvMesh, u: &VolVectorField) -> SurfaceScalarField {
    let uf = interpolate(mesh, u);
    let values = uf.iter().enumerate().map(|(f, v)| mesh.sf(f).dot(*v)).collect();
    SurfaceScalarField::from_values(format!("flux({})", u.name()), mesh, values)
        .unwrap_or_else(|_| SurfaceScalarField::new("flux", mesh, 0.0))
}

/// 单元净流出通量 `Σ_f φ_f`（积分形式，未除体积）
pub fn surface_sum(mesh: &FvMesh, phi: &[f64]) -> Vec<f64> {
    let mut sum = vec![0.0; mesh.n_cells()];
    for f in mesh.internal_faces() {
        sum[mesh.owner(f)] += phi[f];
        sum[mesh.neighbour(f)] -= phi[f];
    }
    for f in mesh.boundary_faces() {
        sum[mesh.owner(f)] += phi[f];
    }
    sum
}

/// 散度 `Σ_f φ_f / V`
pub fn div(mesh: &FvMesh, phi: &[f64]) -> Vec<f64> {
    surface_sum(mesh, phi)
        .into_iter()
        .zip(mesh.cell_volumes())
        .map(|(s, v)| s / v)
        .collect()
}

/// Gauss 线性梯度
pub fn grad(mesh: &FvMesh, field: &VolScalarField) -> Vec<DVec3> {
    let phi_f = interpolate(mesh, field);
    let mut g = vec![DVec3::ZERO; mesh.n_cells()];
    for f in mesh.internal_faces() {
        let s = mesh.sf(f) * phi_f[f];
        g[mesh.owner(f)] += s;
        g[mesh.neighbour(f)] -= s;
    }
    for f in mesh.boundary_faces() {
        g[mesh.owner(f)] += mesh.sf(f) * phi_f[f];
    }
    for (gi, &v) in g.iter_mut().zip(mesh.cell_volumes()) {
        *gi /= v;
    }
    g
}

/// 面法向梯度（内部面含非正交修正）
pub fn sn_grad(mesh: &FvMesh, field: &VolScalarField) -> Vec<f64> {
    let x = field.internal();
    let gf = interpolate_values(mesh, &grad(mesh, field), &vec![DVec3::ZERO; mesh.n_boundary_faces()]);
    let mut out = Vec::with_capacity(mesh.n_faces());
    for f in mesh.internal_faces() {
        let orth = mesh.delta_coeff(f) * (x[mesh.neighbour(f)] - x[mesh.owner(f)]);
        out.push(orth + mesh.corr_vector(f).dot(gf[f]));
    }
    for f in mesh.boundary_faces() {
        out.push(mesh.delta_coeff(f) * (field.boundary_value(mesh, f) - x[mesh.owner(f)]));
    }
    out
}

/// 由面通量重构单元向量
///
/// `U = (Σ Sf⊗Sf/|Sf|)⁻¹ · Σ (Sf/|Sf|)·φ_f`。拉伸二维网格的 z 方向
/// 没有面，对应的对角元补 1。
pub fn reconstruct(mesh: &FvMesh, phi: &[f64]) -> Vec<DVec3> {
    let n = mesh.n_cells();
    let mut tensors = vec![DMat3::ZERO; n];
    let mut vectors = vec![DVec3::ZERO; n];

    let mut accumulate = |cell: usize, f: usize| {
        let sf = mesh.sf(f);
        let mag = mesh.mag_sf(f);
        tensors[cell] += outer(sf, sf) * (1.0 / mag);
        vectors[cell] += sf * (phi[f] / mag);
    };
    for f in mesh.internal_faces() {
        accumulate(mesh.owner(f), f);
        accumulate(mesh.neighbour(f), f);
    }
    for f in mesh.boundary_faces() {
        accumulate(mesh.owner(f), f);
    }

    tensors
        .into_iter()
        .zip(vectors)
        .map(|(t, v)| fill_degenerate(t).inverse() * v)
        .collect()
}

fn outer(a: DVec3, b: DVec3) -> DMat3 {
    DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}

fn fill_degenerate(mut t: DMat3) -> DMat3 {
    let scale = t.x_axis.x + t.y_axis.y + t.z_axis.z;
    let tol = 1e-12 * scale.max(SMALL);
    if t.x_axis.x < tol {
        t.x_axis = DVec3::X;
        t.y_axis.x = 0.0;
        t.z_axis.x = 0.0;
    }
    if t.y_axis.y < tol {
        t.y_axis = DVec3::Y;
        t.x_axis.y = 0.0;
        t.z_axis.y = 0.0;
    }
    if t.z_axis.z < tol {
        t.z_axis = DVec3::Z;
        t.x_axis.z = 0.0;
        t.y_axis.z = 0.0;
    }
    t
}

/// 体积分 `Σ φ·V`
pub fn domain_integrate(mesh: &FvMesh, values: &[f64]) -> f64 {
    values.iter().zip(mesh.cell_volumes()).map(|(v, vol)| v * vol).sum()
}

/// Euler 格式的通量时间修正 `ddtCorr(rho, U, phi)`
///
/// `c·(φ_old - Sf·interpolate(ρ_old U_old))/Δt`，耦合系数
/// `c = 1 - min(|φ_old - Sf·(ρU)_f| / (|φ_old| + small), 1)`。
/// 边界面系数取零，边界通量保持由边界条件确定。
pub fn ddt_corr(
    mesh: &FvMesh,
    rho: &VolScalarField,
    u: &VolVectorField,
    phi: &SurfaceScalarField,
    delta_t: f64,
) -> Vec<f64> {
    let rho_old = rho.old_time();
    let u_old = u.old_time();
    let rho_u_old: Vec<DVec3> = u_old.iter().zip(rho_old).map(|(v, r)| *v * *r).collect();
    let phi_old = phi.old_time();

    let mut corr = vec![0.0; mesh.n_faces()];
    for f in mesh.internal_faces() {
        let w = mesh.weight(f);
        let rho_u_f = rho_u_old[mesh.owner(f)] * w + rho_u_old[mesh.neighbour(f)] * (1.0 - w);
        let diff = phi_old[f] - mesh.sf(f).dot(rho_u_f);
        let coeff = 1.0 - (diff.abs() / (phi_old[f].abs() + SMALL)).min(1.0);
        corr[f] = coeff * diff / delta_t;
    }
    corr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::BoundaryKind;
    use crate::mesh::MeshBuilder;

    #[test]
    fn test_grad_of_linear_field_is_exact() {
        let mesh = MeshBuilder::channel(6, 3, 3.0, 1.0).unwrap();
        let values: Vec<f64> = mesh.cell_centres().iter().map(|c| 2.0 * c.x + 3.0 * c.y).collect();
        let mut p = VolScalarField::from_values("p", &mesh, values).unwrap();
        // 边界取精确值
        for f in mesh.boundary_faces() {
            let c = mesh.face_centre(f);
            p.boundary_mut()[mesh.boundary_index(f)] = 2.0 * c.x + 3.0 * c.y;
        }
        for g in grad(&mesh, &p) {
            assert!((g - DVec3::new(2.0, 3.0, 0.0)).length() < 1e-10);
        }
        for (f, s) in sn_grad(&mesh, &p).iter().enumerate() {
            let n = mesh.sf(f) / mesh.mag_sf(f);
            assert!((s - n.dot(DVec3::new(2.0, 3.0, 0.0))).abs() < 1e-10);
        }
    }

    #[test]
    fn test_uniform_flow_is_divergence_free() {
        let mesh = MeshBuilder::sheared_channel(4, 3, 2.0, 1.0, 0.3).unwrap();
        let u = VolVectorField::new("U", &mesh, DVec3::new(1.0, 0.5, 0.0));
        let phi = flux(&mesh, &u);
        for d in div(&mesh, phi.values()) {
            assert!(d.abs() < 1e-12);
        }
    }

    #[test]
    fn test_reconstruct_uniform_flux() {
        let mesh = MeshBuilder::sheared_channel(3, 3, 1.0, 1.0, 0.4).unwrap();
        let target = DVec3::new(0.7, -0.2, 0.0);
        let phi: Vec<f64> = (0..mesh.n_faces()).map(|f| mesh.sf(f).dot(target)).collect();
        for v in reconstruct(&mesh, &phi) {
            assert!((v - target).length() < 1e-10);
        }
    }

    #[test]
    fn test_domain_integrate() {
        let mesh = MeshBuilder::closed_box(4, 4, 2.0, 1.0, false).unwrap();
        let ones = vec![1.0; mesh.n_cells()];
        assert!((domain_integrate(&mesh, &ones) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_interpolate_uses_boundary_values() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let p = VolScalarField::from_values("p", &mesh, vec![1.0, 3.0])
            .unwrap()
            .with_patch(&mesh, "outlet", BoundaryKind::FixedValue, 10.0)
            .unwrap();
        let pf = interpolate(&mesh, &p);
        assert!((pf[0] - 2.0).abs() < 1e-14);
        let outlet = mesh.patches()[mesh.find_patch("outlet").unwrap()].start;
        assert_eq!(pf[outlet], 10.0);
    }

    #[test]
    fn test_ddt_corr_vanishes_for_consistent_flux() {
        let mesh = MeshBuilder::channel(3, 2, 3.0, 1.0).unwrap();
        let rho = VolScalarField::new("rho", &mesh, 1.2);
        let u = VolVectorField::new("U", &mesh, DVec3::X);
        let mut phi = flux(&mesh, &u);
        phi.multiply(&vec![1.2; mesh.n_faces()]);
        let corr = ddt_corr(&mesh, &rho, &u, &phi, 0.01);
        assert!(corr.iter().all(|c| c.abs() < 1e-12));
    }
}
