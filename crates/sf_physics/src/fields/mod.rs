// crates/sf_physics/src/fields/mod.rs

//! 场存储
//!
//! - [`VolField`]: 体场（标量/向量），含边界条件、松弛与时间层
//! - [`SurfaceScalarField`]: 面场（通量与面系数）
//! - [`BoundaryKind`]: 边界条件类型

mod boundary;
mod surface_field;
mod vol_field;

pub use boundary::BoundaryKind;
pub use surface_field::SurfaceScalarField;
pub use vol_field::{FieldValue, VolField, VolScalarField, VolVectorField};
