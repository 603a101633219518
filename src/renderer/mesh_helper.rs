use std::rc::Rc;

use crate::error::SceneError;
use crate::mesh::Mesh;
use crate::renderer::adapter::{upload_composition, GpuAdapter, MeshBuffer};
use crate::renderer::compositor::Composition;

/// Keeps a single, frequently edited mesh on the GPU, re-uploading it only
/// after it has been changed through one of the mutating accessors.
pub struct MeshHelper {
    adapter: Rc<dyn GpuAdapter>,
    mesh: Mesh,
    composition: Option<Rc<Composition>>,
    buffer: Option<MeshBuffer>,
    dirty: bool,
}

impl MeshHelper {
    pub fn new(adapter: Rc<dyn GpuAdapter>) -> MeshHelper {
        MeshHelper {
            adapter,
            mesh: Mesh::new(),
            composition: None,
            buffer: None,
            dirty: true,
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Marks the mesh dirty, so the next [`MeshHelper::rebuild`] uploads it
    /// again.
    pub fn mesh_mut(&mut self) -> &mut Mesh {
        self.dirty = true;
        &mut self.mesh
    }

    pub fn set_mesh(&mut self, mesh: Mesh) {
        self.dirty = true;
        self.mesh = mesh;
    }

    /// Appends the vertex data of every mesh in `meshes` and regenerates
    /// tangents.
    pub fn add_mesh<'a>(&mut self, meshes: impl IntoIterator<Item = &'a Mesh>) {
        self.dirty = true;
        for mesh in meshes {
            self.mesh.append(mesh);
        }
    }

    pub fn reset_mesh(&mut self) {
        self.dirty = true;
        self.mesh = Mesh::new();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_valid(&self) -> bool {
        self.mesh.vertex_count() > 0
    }

    pub fn has_been_built(&self) -> bool {
        !self.dirty && self.composition.is_some() && self.buffer.is_some()
    }

    pub fn composition(&self) -> Option<&Rc<Composition>> {
        self.composition.as_ref()
    }

    pub fn buffer(&self) -> Option<MeshBuffer> {
        self.buffer
    }

    /// Returns the composition and GPU buffer for the current mesh,
    /// recomposing and re-uploading only if the mesh changed since the last
    /// call. An empty mesh is never uploaded and yields `None`.
    pub fn rebuild(&mut self) -> Result<Option<(Rc<Composition>, MeshBuffer)>, SceneError> {
        if !self.dirty {
            return Ok(self.built());
        }

        self.release();
        if !self.is_valid() {
            self.dirty = false;
            return Ok(None);
        }

        let composition = Rc::new(Composition::compose([&self.mesh])?);
        let buffer = upload_composition(self.adapter.as_ref(), &composition)?;
        self.composition = Some(composition);
        self.buffer = Some(buffer);
        self.dirty = false;
        Ok(self.built())
    }

    fn built(&self) -> Option<(Rc<Composition>, MeshBuffer)> {
        let composition = self.composition.as_ref()?;
        Some((Rc::clone(composition), self.buffer?))
    }

    fn release(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.adapter.delete_mesh(buffer);
        }
        self.composition = None;
    }
}

impl Drop for MeshHelper {
    fn drop(&mut self) {
        self.release();
    }
}
