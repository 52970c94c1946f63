use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use gltf::buffer;
use itertools::izip;

use crate::asset_loader::AssetError;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
}

pub struct ModelPrimitive {
    pub index: usize,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub base_color: Vec4,
    /// Unlit materials ignore scene lighting, like a basic material in most engines.
    pub unlit: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            unlit: false,
        }
    }
}

pub struct Model {
    pub name: String,
    pub primitives: Vec<ModelPrimitive>,
    pub material: Material,
}

pub type Buffers<'a> = &'a [buffer::Data];

impl Model {
    pub fn from_gltf(
        name: impl Into<String>,
        mesh: gltf::Mesh,
        buffers: Buffers,
    ) -> Result<Model, AssetError> {
        let mut model = Model {
            name: name.into(),
            primitives: Vec::new(),
            material: Material::default(),
        };

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                return Err(AssetError::Mesh(format!(
                    "unsupported primitive mode {:?} in {}",
                    primitive.mode(),
                    model.name
                )));
            }

            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let positions: Vec<Vec3> = reader
                .read_positions()
                .ok_or_else(|| {
                    AssetError::Mesh(format!("primitive without positions in {}", model.name))
                })?
                .map(Vec3::from)
                .collect();

            // Flat-ish fallback for meshes exported without normals
            let normals: Vec<Vec3> = match reader.read_normals() {
                Some(normals) => normals.map(Vec3::from).collect(),
                None => vec![Vec3::Y; positions.len()],
            };

            let vertices = izip!(positions.iter(), normals.iter())
                .map(|(position, normal)| Vertex {
                    position: *position,
                    normal: *normal,
                })
                .collect::<Vec<Vertex>>();

            let indices = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect::<Vec<u32>>(),
                None => (0..vertices.len() as u32).collect(),
            };

            if model.primitives.is_empty() {
                let color = primitive
                    .material()
                    .pbr_metallic_roughness()
                    .base_color_factor();
                model.material.base_color = Vec4::from(color);
            }

            model.primitives.push(ModelPrimitive {
                index: primitive.index(),
                vertices,
                indices,
            });
        }

        if model.primitives.is_empty() {
            return Err(AssetError::Mesh(format!(
                "mesh without primitives: {}",
                model.name
            )));
        }

        Ok(model)
    }

    /// A flat annulus in the XZ plane facing +Y, centered on the origin.
    pub fn ring(
        name: impl Into<String>,
        inner_radius: f32,
        outer_radius: f32,
        segments: u32,
        material: Material,
    ) -> Model {
        let segments = segments.max(3);
        let mut vertices = Vec::with_capacity(segments as usize * 2);
        let mut indices = Vec::with_capacity(segments as usize * 6);

        for i in 0..segments {
            let angle = i as f32 / segments as f32 * TAU;
            let direction = Vec3::new(angle.cos(), 0.0, -angle.sin());

            vertices.push(Vertex {
                position: direction * inner_radius,
                normal: Vec3::Y,
            });
            vertices.push(Vertex {
                position: direction * outer_radius,
                normal: Vec3::Y,
            });

            let inner = i * 2;
            let outer = inner + 1;
            let next_inner = (inner + 2) % (segments * 2);
            let next_outer = next_inner + 1;

            indices.extend_from_slice(&[inner, outer, next_outer, inner, next_outer, next_inner]);
        }

        Model {
            name: name.into(),
            primitives: vec![ModelPrimitive {
                index: 0,
                vertices,
                indices,
            }],
            material,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_vertices_stay_between_radii() {
        let ring = Model::ring("Reticle", 0.1, 0.2, 32, Material::default());
        let primitive = &ring.primitives[0];

        assert_eq!(primitive.vertices.len(), 64);
        assert_eq!(primitive.indices.len(), 32 * 6);

        for vertex in &primitive.vertices {
            let radius = vertex.position.length();
            assert!(radius > 0.099 && radius < 0.201, "radius {radius}");
            assert_eq!(vertex.position.y, 0.0);
        }

        assert!(primitive
            .indices
            .iter()
            .all(|&index| (index as usize) < primitive.vertices.len()));
    }
}
