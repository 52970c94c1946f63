use glam::Vec3;

use crate::math::ray::Ray;

/// Plane in Hessian normal form: points `p` with `normal.dot(p) + d == 0`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            d: -normal.dot(point),
        }
    }

    /// The horizontal plane at the given height.
    pub fn horizontal(height: f32) -> Self {
        Self::from_point_normal(Vec3::Y * height, Vec3::Y)
    }

    pub fn signed_distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    /// Distance along the ray to the intersection, if the ray hits the plane in front of its origin.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let denominator = self.normal.dot(ray.direction);

        if denominator.abs() < 1e-6 {
            return None;
        }

        let t = -self.signed_distance_to_point(ray.origin) / denominator;

        (t >= 0.0).then_some(t)
    }
}
