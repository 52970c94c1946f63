use glam::{Mat4, Vec2, Vec3};
use wgpu::util::DeviceExt;

use crate::math::ray::Ray;

/// The viewer. In the simulated session it stands at eye height looking slightly down at the floor.
#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn standing_viewer() -> Self {
        Self {
            eye: Vec3::new(0.0, 1.6, 0.0),
            target: Vec3::new(0.0, 0.9, -2.0),
            up: Vec3::Y,
            fov_y: 75f32.to_radians(),
            near: 0.01,
            far: 20.0,
        }
    }

    pub fn get_vp_matrix(&self, resolution: Vec2) -> Mat4 {
        let aspect = if resolution.y > 0.0 {
            resolution.x / resolution.y
        } else {
            1.0
        };

        let view = Mat4::look_at_rh(self.eye, self.target, self.up);
        let projection = Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far);
        projection * view
    }

    /// Ray from the eye through a point on screen, in physical pixels with the origin top left.
    pub fn viewer_ray(&self, cursor: Vec2, resolution: Vec2) -> Option<Ray> {
        if resolution.x <= 0.0 || resolution.y <= 0.0 {
            return None;
        }

        let ndc = Vec2::new(
            cursor.x / resolution.x * 2.0 - 1.0,
            1.0 - cursor.y / resolution.y * 2.0,
        );

        Some(Ray::from_ndc(self.get_vp_matrix(resolution).inverse(), ndc))
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Default)]
pub struct CameraUniform {
    view_proj: Mat4,
    eye: [f32; 4],
}

impl CameraUniform {
    pub fn update(&mut self, resolution: winit::dpi::PhysicalSize<u32>, camera: &Camera) {
        self.view_proj =
            camera.get_vp_matrix(Vec2::new(resolution.width as f32, resolution.height as f32));
        self.eye = camera.eye.extend(1.0).to_array();
    }

    pub fn create_buffer(&self, device: &wgpu::Device) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Uniform Buffer"),
            contents: bytemuck::cast_slice(&[*self]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
    }

    pub fn update_buffer(&self, queue: &wgpu::Queue, buffer: &wgpu::Buffer) {
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[*self]));
    }
}
