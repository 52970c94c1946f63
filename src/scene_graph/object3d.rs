use std::cell::Cell;

use id_arena::Id;

use crate::scene_graph::scene_model::SceneModelId;
use crate::scene_graph::transform::Transform;

pub type ObjectId = Id<Object3D>;

pub struct Object3D {
    pub name: String,
    pub transform: Transform,
    pub model_id: Option<SceneModelId>,
    pub parent_id: Option<ObjectId>,
    pub child_ids: Vec<ObjectId>,
    /// Own visibility flag. An object is drawn only if it and all of its ancestors are visible.
    pub visible: bool,
    world_visible: Cell<bool>,
    removed: bool,
}

impl Object3D {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_model(mut self, model_id: SceneModelId) -> Self {
        self.model_id = Some(model_id);
        self
    }

    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Visibility including ancestors, as of the last `Scene::late_update`.
    pub fn is_world_visible(&self) -> bool {
        self.world_visible.get()
    }

    pub(super) fn set_world_visible(&self, visible: bool) {
        self.world_visible.set(visible);
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub(super) fn mark_removed(&mut self) {
        self.removed = true;
        self.visible = false;
        self.world_visible.set(false);
        self.parent_id = None;
        self.child_ids.clear();
    }
}

impl Default for Object3D {
    fn default() -> Self {
        Self {
            name: String::new(),
            transform: Transform::default(),
            model_id: None,
            parent_id: None,
            child_ids: Vec::new(),
            visible: true,
            world_visible: Cell::new(false),
            removed: false,
        }
    }
}
