use glam::{Mat4, Quat};
use id_arena::Arena;
use std::collections::HashMap;

use crate::asset_loader::AssetError;
use crate::math::pose::Pose;
use crate::model::{Buffers, Model};
use crate::scene_graph::object3d::{Object3D, ObjectId};
use crate::scene_graph::scene_model::{SceneModel, SceneModelId};
use crate::scene_graph::transform::Transform;

pub struct Scene {
    pub objects: Arena<Object3D>,
    pub models: Arena<SceneModel>,
    /// Tombstoned slots that `add_object` fills before growing the arena.
    free_objects: Vec<ObjectId>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Arena::new(),
            models: Arena::new(),
            free_objects: Vec::new(),
        }
    }

    /// Ids of removed objects are handed out again, so they must not be kept after removal.
    pub fn add_object(&mut self, object: Object3D) -> ObjectId {
        while let Some(id) = self.free_objects.pop() {
            if let Some(slot) = self.objects.get_mut(id) {
                *slot = object;
                return id;
            }
        }

        self.objects.alloc(object)
    }

    /// Returns `None` for objects that have been removed from the scene.
    pub fn get_object(&self, id: ObjectId) -> Option<&Object3D> {
        self.objects.get(id).filter(|object| !object.is_removed())
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Option<&mut Object3D> {
        self.objects.get_mut(id).filter(|object| !object.is_removed())
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get_object(id).is_some()
    }

    pub fn live_objects(&self) -> impl Iterator<Item = (ObjectId, &Object3D)> {
        self.objects.iter().filter(|(_, object)| !object.is_removed())
    }

    pub fn add_model(&mut self, model: SceneModel) -> SceneModelId {
        self.models.alloc(model)
    }

    pub fn find_model_by_name(&self, name: &str) -> Option<SceneModelId> {
        self.models
            .iter()
            .find(|(_, model)| model.name() == name)
            .map(|(id, _)| id)
    }

    /// Spawns every root node of the document's default scene under a new root object.
    ///
    /// On error nothing from the document is left in the scene.
    pub fn spawn_gltf_scene(
        &mut self,
        root_name: &str,
        document: &gltf::Document,
        buffers: Buffers,
    ) -> Result<ObjectId, AssetError> {
        let gltf_scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or_else(|| AssetError::Mesh(format!("no scenes in {root_name}")))?;

        let root = self.add_object(Object3D::new(root_name));
        let mut mesh_to_model = HashMap::new();

        for node in gltf_scene.nodes() {
            if let Err(error) = self.spawn_gltf_node(buffers, &node, root, &mut mesh_to_model) {
                self.remove_object(root);
                return Err(error);
            }
        }

        Ok(root)
    }

    fn spawn_gltf_node(
        &mut self,
        buffers: Buffers,
        node: &gltf::Node,
        parent: ObjectId,
        mesh_to_model: &mut HashMap<usize, SceneModelId>,
    ) -> Result<ObjectId, AssetError> {
        let node_name = node.name().unwrap_or("Unnamed").to_string();
        let (translation, rotation, scale) = node.transform().decomposed();

        let mut object = Object3D::new(node_name.clone()).with_transform(Transform::new(
            translation.into(),
            Quat::from_array(rotation),
            // Non-uniform node scale is flattened to its x component
            scale[0],
        ));

        if let Some(mesh) = node.mesh() {
            let model_id = match mesh_to_model.get(&mesh.index()).copied() {
                Some(model_id) => model_id,
                None => {
                    let mesh_name = mesh
                        .name()
                        .map(String::from)
                        .unwrap_or_else(|| format!("{} (Mesh)", node_name));
                    let mesh_index = mesh.index();

                    let model = Model::from_gltf(mesh_name, mesh, buffers)?;
                    let model_id = self.add_model(SceneModel::new(model));
                    mesh_to_model.insert(mesh_index, model_id);

                    model_id
                }
            };

            object = object.with_model(model_id);
        }

        let object_id = self.add_object(object);
        self.set_object_parent(object_id, Some(parent));

        for child in node.children() {
            self.spawn_gltf_node(buffers, &child, object_id, mesh_to_model)?;
        }

        Ok(object_id)
    }

    /// Sets the parent of an object and updates child relationships
    pub fn set_object_parent(&mut self, child_id: ObjectId, new_parent_id: Option<ObjectId>) {
        if let Some(old_parent_id) = self.get_object(child_id).and_then(|child| child.parent_id) {
            if let Some(old_parent) = self.get_object_mut(old_parent_id) {
                old_parent.child_ids.retain(|&id| id != child_id);
            }
        }

        if let Some(child) = self.get_object_mut(child_id) {
            child.parent_id = new_parent_id;
        }

        if let Some(new_parent_id) = new_parent_id {
            if let Some(new_parent) = self.get_object_mut(new_parent_id) {
                new_parent.child_ids.push(child_id);
            }
        }

        self.invalidate_object_hierarchy(child_id);
    }

    /// Detaches an object and its descendants from the scene.
    ///
    /// The arena never frees slots, so removed objects are tombstoned and skipped by lookups
    /// until `add_object` reuses them.
    pub fn remove_object(&mut self, object_id: ObjectId) -> bool {
        if !self.contains(object_id) {
            return false;
        }

        self.set_object_parent(object_id, None);

        let mut pending = vec![object_id];
        while let Some(id) = pending.pop() {
            if let Some(object) = self.objects.get_mut(id) {
                pending.extend(object.child_ids.iter().copied());
                object.mark_removed();
                self.free_objects.push(id);
            }
        }

        true
    }

    pub fn invalidate_object_hierarchy(&self, object_id: ObjectId) {
        if let Some(object) = self.get_object(object_id) {
            object.transform.invalidate_world();

            for &child_id in &object.child_ids {
                self.invalidate_object_hierarchy(child_id);
            }
        }
    }

    pub fn set_object_visible(&mut self, object_id: ObjectId, visible: bool) {
        if let Some(object) = self.get_object_mut(object_id) {
            object.visible = visible;
        }
    }

    /// The object's own visibility flag; removed objects are never visible.
    pub fn is_object_visible(&self, object_id: ObjectId) -> bool {
        self.get_object(object_id)
            .map(|object| object.visible)
            .unwrap_or(false)
    }

    pub fn set_object_pose(&mut self, object_id: ObjectId, pose: Pose) {
        if let Some(object) = self.get_object_mut(object_id) {
            object.transform.set_pose(pose);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn set_object_scale(&mut self, object_id: ObjectId, scale: f32) {
        if let Some(object) = self.get_object_mut(object_id) {
            object.transform.set_scale(scale);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn rotate_object(&mut self, object_id: ObjectId, rotation: Quat) {
        if let Some(object) = self.get_object_mut(object_id) {
            object.transform.rotate(rotation);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn get_object_transform(&self, object_id: ObjectId) -> Option<&Transform> {
        self.get_object(object_id).map(|object| &object.transform)
    }

    /// Objects that are visible through their whole ancestry and carry a model.
    pub fn drawable_objects(&self) -> impl Iterator<Item = (ObjectId, &Object3D, SceneModelId)> {
        self.live_objects().filter_map(|(id, object)| {
            let model_id = object.model_id?;
            object.is_world_visible().then_some((id, object, model_id))
        })
    }

    pub fn late_update(&mut self) {
        let roots = self
            .live_objects()
            .filter(|(_, object)| object.parent_id.is_none())
            .map(|(id, _)| id)
            .collect::<Vec<_>>();

        for root_id in roots {
            self.update_object_recursive(root_id, Mat4::IDENTITY, false, true);
        }
    }

    fn update_object_recursive(
        &self,
        object_id: ObjectId,
        parent_world_matrix: Mat4,
        parent_changed: bool,
        parent_visible: bool,
    ) {
        let Some(object) = self.get_object(object_id) else {
            return;
        };

        let changed = parent_changed || object.transform.is_world_dirty();
        if changed {
            let world_matrix = parent_world_matrix * *object.transform.local_matrix();
            object.transform.set_world_matrix(world_matrix);
        }

        let visible = parent_visible && object.visible;
        object.set_world_visible(visible);

        let world_matrix = *object.transform.world_matrix();
        for &child_id in &object.child_ids {
            self.update_object_recursive(child_id, world_matrix, changed, visible);
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::asset_loader::{POINTS_SECOND_NODE_GLTF, TRIANGLE_GLTF};
    use crate::model::Material;

    fn import(source: &str) -> (gltf::Document, Vec<gltf::buffer::Data>) {
        let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(source.as_bytes()).unwrap();
        let buffers = gltf::import_buffers(&document, None, blob).unwrap();
        (document, buffers)
    }

    fn scene_with_child() -> (Scene, ObjectId, ObjectId) {
        let mut scene = Scene::new();
        let model = scene.add_model(SceneModel::new(Model::ring(
            "Ring",
            0.1,
            0.2,
            8,
            Material::default(),
        )));

        let parent = scene.add_object(
            Object3D::new("Parent").with_transform(Transform::from_translation(Vec3::X)),
        );
        let child = scene.add_object(
            Object3D::new("Child")
                .with_model(model)
                .with_transform(Transform::from_translation(Vec3::Y)),
        );
        scene.set_object_parent(child, Some(parent));
        scene.late_update();

        (scene, parent, child)
    }

    #[test]
    fn world_matrices_follow_parent() {
        let (mut scene, parent, child) = scene_with_child();

        let world = *scene.get_object(child).unwrap().transform.world_matrix();
        assert!(world.w_axis.truncate().abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-5));

        scene.set_object_pose(parent, Pose::new(Vec3::Z, Quat::IDENTITY));
        scene.late_update();

        let world = *scene.get_object(child).unwrap().transform.world_matrix();
        assert!(world.w_axis.truncate().abs_diff_eq(Vec3::new(0.0, 1.0, 1.0), 1e-5));
    }

    #[test]
    fn hidden_parent_hides_children() {
        let (mut scene, parent, child) = scene_with_child();
        assert_eq!(scene.drawable_objects().count(), 1);

        scene.set_object_visible(parent, false);
        scene.late_update();

        assert!(scene.is_object_visible(child));
        assert!(!scene.get_object(child).unwrap().is_world_visible());
        assert_eq!(scene.drawable_objects().count(), 0);
    }

    #[test]
    fn removed_objects_disappear_with_descendants() {
        let (mut scene, parent, child) = scene_with_child();

        assert!(scene.remove_object(parent));
        scene.late_update();

        assert!(!scene.contains(parent));
        assert!(!scene.contains(child));
        assert_eq!(scene.drawable_objects().count(), 0);
        assert!(!scene.remove_object(parent));
    }

    #[test]
    fn removing_a_child_detaches_it_from_the_parent() {
        let (mut scene, parent, child) = scene_with_child();

        scene.remove_object(child);

        assert!(scene.get_object(parent).unwrap().child_ids.is_empty());
    }

    #[test]
    fn gltf_scene_spawns_under_one_root() {
        let (document, buffers) = import(TRIANGLE_GLTF);
        let mut scene = Scene::new();

        let root = scene
            .spawn_gltf_scene("Triangle", &document, &buffers)
            .unwrap();
        scene.late_update();

        assert_eq!(scene.get_object(root).unwrap().child_ids.len(), 1);
        assert_eq!(scene.drawable_objects().count(), 1);
    }

    #[test]
    fn failed_gltf_scene_leaves_nothing_drawable() {
        let (document, buffers) = import(POINTS_SECOND_NODE_GLTF);
        let mut scene = Scene::new();

        let result = scene.spawn_gltf_scene("Broken", &document, &buffers);
        scene.late_update();

        assert!(matches!(result, Err(AssetError::Mesh(_))));
        assert_eq!(scene.live_objects().count(), 0);
        assert_eq!(scene.drawable_objects().count(), 0);
    }

    #[test]
    fn removed_slots_are_reused() {
        let (mut scene, parent, _child) = scene_with_child();
        scene.remove_object(parent);

        let first = scene.add_object(Object3D::new("First"));
        let second = scene.add_object(Object3D::new("Second"));
        scene.add_object(Object3D::new("Third"));

        assert!(first == parent || second == parent);
        assert_eq!(scene.objects.len(), 3);
        assert_eq!(scene.live_objects().count(), 3);
        assert!(scene.get_object(first).unwrap().child_ids.is_empty());
    }
}
