use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use wgpu::BufferUsages;

use crate::model::Material;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct InstanceData {
    pub model: Mat4,
    pub base_color: Vec4,
    pub unlit: f32,
    _padding: [f32; 3],
}

impl InstanceData {
    pub fn new(model: Mat4, material: &Material) -> Self {
        Self {
            model,
            base_color: material.base_color,
            unlit: if material.unlit { 1.0 } else { 0.0 },
            _padding: [0.0; 3],
        }
    }

    pub fn descriptor() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
            5 => Float32x4,
            6 => Float32x4,
            7 => Float32x4,
            8 => Float32x4,
            9 => Float32x4,
            10 => Float32,
        ];

        wgpu::VertexBufferLayout {
            array_stride: size_of::<InstanceData>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }
}

pub struct Instances {
    instances: Vec<InstanceData>,
}

impl Instances {
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
        }
    }

    pub fn add(&mut self, instance: InstanceData) {
        self.instances.push(instance);
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }

    /// Uploads as many instances as the buffer holds and returns how many that was.
    pub fn write_to_buffer(&self, queue: &wgpu::Queue, instance_buffer: &InstanceBuffer) -> u32 {
        let count = self.instances.len().min(InstanceBuffer::MAX_INSTANCES);

        if count < self.instances.len() {
            log::warn!(
                "Dropping {} instances over the limit of {}",
                self.instances.len() - count,
                InstanceBuffer::MAX_INSTANCES
            );
        }

        queue.write_buffer(
            instance_buffer.buffer(),
            0,
            bytemuck::cast_slice(&self.instances[..count]),
        );

        count as u32
    }

    pub fn should_render(&self) -> bool {
        !self.instances.is_empty()
    }
}

pub struct InstanceBuffer(wgpu::Buffer);

impl InstanceBuffer {
    pub const MAX_INSTANCES: usize = 128;

    pub fn new(device: &wgpu::Device, name: &str) -> Self {
        let label = format!("Instance buffer ({})", name);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&label),
            size: (size_of::<InstanceData>() * Self::MAX_INSTANCES) as u64,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self(buffer)
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.0
    }

    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_vertex_buffer(1, self.buffer().slice(..));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_layout_matches_shader_stride() {
        assert_eq!(size_of::<InstanceData>(), 96);
        assert_eq!(InstanceData::descriptor().array_stride, 96);
    }

    #[test]
    fn unlit_flag_is_encoded_as_float() {
        let material = Material {
            base_color: Vec4::new(0.0, 1.0, 0.0, 1.0),
            unlit: true,
        };
        let instance = InstanceData::new(Mat4::IDENTITY, &material);

        assert_eq!(instance.unlit, 1.0);
        assert_eq!(instance.base_color, material.base_color);
    }
}
