use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use log::debug;

use crate::camera::Camera;
use crate::convert;
use crate::error::SceneError;
use crate::mesh::Model;
use crate::renderer::adapter::{upload_composition, GpuAdapter, MeshBuffer};
use crate::renderer::compositor::{Composition, Compositor};
use crate::textures::{MaterialSource, TextureCache};
use crate::world::{Document, DocumentCamera, Solid};

const CAMERA_ASPECT: f32 = 4.0 / 3.0;

/// Everything drawn for one open document: its brushes, the meshes derived
/// from them, its cameras, and the single composition all brushes are drawn
/// from.
pub struct Scene {
    adapter: Rc<dyn GpuAdapter>,
    textures: Arc<TextureCache>,
    materials: Arc<dyn MaterialSource>,
    field_of_view: f32,

    solids: HashMap<i32, Solid>,
    solid_meshes: HashMap<i32, Model>,
    cameras: HashMap<String, Camera>,

    compositor: Compositor,
    composition: Option<Rc<Composition>>,
    frame_mesh: Option<MeshBuffer>,
}

impl Scene {
    pub fn new(
        adapter: Rc<dyn GpuAdapter>,
        textures: Arc<TextureCache>,
        materials: Arc<dyn MaterialSource>,
        field_of_view: f32,
    ) -> Scene {
        Scene {
            adapter,
            textures,
            materials,
            field_of_view,
            solids: HashMap::new(),
            solid_meshes: HashMap::new(),
            cameras: HashMap::new(),
            compositor: Compositor::new(),
            composition: None,
            frame_mesh: None,
        }
    }

    pub fn from_document(
        document: &Document,
        adapter: Rc<dyn GpuAdapter>,
        textures: Arc<TextureCache>,
        materials: Arc<dyn MaterialSource>,
        field_of_view: f32,
    ) -> Scene {
        let mut scene = Scene::new(adapter, textures, materials, field_of_view);
        for solid in &document.solids {
            scene.add_solid(solid.clone());
        }
        for (i, camera) in document.cameras.iter().enumerate() {
            scene.add_camera(camera, format!("Default_{i}"));
        }
        scene
    }

    /// Converts `solid` into meshes and queues them for composition. A solid
    /// whose id is already in the scene replaces the old one.
    pub fn add_solid(&mut self, solid: Solid) {
        self.remove_solid_meshes(solid.id);
        let textures = &self.textures;
        let model = convert::solid_to_model(&solid, |key| textures.dimensions(key));
        for mesh in model.meshes() {
            self.compositor.add_mesh(Rc::clone(mesh));
        }
        self.solid_meshes.insert(solid.id, model);
        self.solids.insert(solid.id, solid);
    }

    pub fn remove_solid(&mut self, id: i32) -> Option<Solid> {
        self.remove_solid_meshes(id);
        self.solids.remove(&id)
    }

    fn remove_solid_meshes(&mut self, id: i32) {
        if let Some(model) = self.solid_meshes.remove(&id) {
            for mesh in model.meshes() {
                self.compositor.remove_mesh(mesh);
            }
        }
    }

    pub fn solid(&self, id: i32) -> Option<&Solid> {
        self.solids.get(&id)
    }

    pub fn solid_model(&self, id: i32) -> Option<&Model> {
        self.solid_meshes.get(&id)
    }

    pub fn solid_count(&self) -> usize {
        self.solids.len()
    }

    pub fn add_camera(&mut self, camera: &DocumentCamera, name: impl Into<String>) {
        let camera = Camera::from_document(camera, self.field_of_view, CAMERA_ASPECT);
        self.cameras.insert(name.into(), camera);
    }

    pub fn camera(&self, name: &str) -> Option<&Camera> {
        self.cameras.get(name)
    }

    pub fn camera_mut(&mut self, name: &str) -> Option<&mut Camera> {
        self.cameras.get_mut(name)
    }

    /// Camera names in alphabetical order.
    pub fn camera_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cameras.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn is_outdated(&self) -> bool {
        self.compositor.is_outdated()
    }

    /// The composition the frame mesh was uploaded from.
    pub fn composition(&self) -> Option<&Rc<Composition>> {
        self.composition.as_ref()
    }

    pub fn frame_mesh(&self) -> Option<MeshBuffer> {
        self.frame_mesh
    }

    /// Recomposes and re-uploads the scene if anything changed since the last
    /// call, then makes sure every material it draws with is bound or being
    /// loaded. Returns whether a new composition was made.
    pub fn recompose_scene(&mut self) -> Result<bool, SceneError> {
        if !self.compositor.is_outdated() {
            return Ok(false);
        }

        let composition = Rc::new(self.compositor.compose_scene()?);
        if let Some(old) = self.frame_mesh.take() {
            self.adapter.delete_mesh(old);
        }
        self.composition = None;
        let frame_mesh = upload_composition(self.adapter.as_ref(), &composition)?;
        debug!(
            "Composed {} meshes into {} draw ranges ({} vertices)",
            self.compositor.len(),
            composition.draw_ranges().len(),
            composition.vertex_count(),
        );

        self.frame_mesh = Some(frame_mesh);
        self.composition = Some(Rc::clone(&composition));

        for material in composition.materials() {
            self.textures
                .ensure_bound(material, self.adapter.as_ref(), self.materials.as_ref())?;
        }
        Ok(true)
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        if let Some(mesh) = self.frame_mesh.take() {
            self.adapter.delete_mesh(mesh);
        }
    }
}
