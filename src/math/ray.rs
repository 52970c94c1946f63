use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Unprojects a point in normalized device coordinates into a world-space ray.
    ///
    /// Assumes a `[0, 1]` depth range, which is what wgpu and glam's `perspective_rh` use.
    pub fn from_ndc(inverse_view_projection: Mat4, ndc: Vec2) -> Self {
        let near = inverse_view_projection * ndc.extend(0.0).extend(1.0);
        let far = inverse_view_projection * ndc.extend(1.0).extend(1.0);

        let near = near.xyz() / near.w;
        let far = far.xyz() / far.w;

        Self::new(near, far - near)
    }
}
