// crates/sf_physics/src/mesh/mod.rs

//! 网格模块
//!
//! - [`FvMesh`]: 非结构有限体积网格（几何 + 拓扑 + 派生插值量）
//! - [`MeshBuilder`]: 二维多边形拉伸构建器与结构化生成器

mod builder;
mod fv_mesh;

pub use builder::MeshBuilder;
pub use fv_mesh::{FvMesh, Patch, RawFace};
