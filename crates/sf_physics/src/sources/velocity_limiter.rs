// crates/sf_physics/src/sources/velocity_limiter.rs

//! 速度限幅

use super::FvSource;
use crate::fields::VolVectorField;
use crate::mesh::FvMesh;

/// 把单元速度模限制在 `max_speed` 以内
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityLimiter {
    name: &'static str,
    max_speed: f64,
}

impl VelocityLimiter {
    /// 创建限速器
    pub fn new(name: &'static str, max_speed: f64) -> Self {
        Self { name, max_speed }
    }
}

impl FvSource for VelocityLimiter {
    fn name(&self) -> &str {
        self.name
    }

    fn correct_velocity(&self, mesh: &FvMesh, u: &mut VolVectorField) {
        let mut n_limited = 0usize;
        for v in u.internal_mut() {
            let mag = v.length();
            if mag > self.max_speed {
                *v *= self.max_speed / mag;
                n_limited += 1;
            }
        }
        if n_limited > 0 {
            log::debug!("{}: 限制了 {} 个单元的速度", self.name, n_limited);
            u.correct_boundary_conditions(mesh);
        }
    }
}
