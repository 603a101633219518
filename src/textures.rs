//! Material name to GPU texture table, shared between the render thread
//! and the preloading workers.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::error::{GpuError, MaterialError};
use crate::renderer::adapter::{GpuAdapter, TextureId};

const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "tga"];
const ERROR_TEXTURE_SIZE: u32 = 64;
const ERROR_TEXTURE_CELL: u32 = 8;

/// Decoded, tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    /// A magenta and black checkerboard, used for materials that failed to
    /// load.
    pub fn checkerboard(size: u32, cell: u32) -> TextureData {
        let mut rgba = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let magenta = ((x / cell) + (y / cell)) % 2 == 0;
                if magenta {
                    rgba.extend_from_slice(&[255, 0, 255, 255]);
                } else {
                    rgba.extend_from_slice(&[0, 0, 0, 255]);
                }
            }
        }
        TextureData {
            width: size,
            height: size,
            rgba,
        }
    }
}

/// Where material textures come from.
pub trait MaterialSource: Send + Sync {
    /// Every material key this source can load.
    fn keys(&self) -> Vec<String>;
    fn load(&self, key: &str) -> Result<TextureData, MaterialError>;
}

/// Loads `materials/<key>.<ext>` image files from a game directory.
pub struct DirectoryMaterials {
    root: PathBuf,
}

impl DirectoryMaterials {
    pub fn new(game_dir: impl AsRef<Path>) -> DirectoryMaterials {
        DirectoryMaterials {
            root: game_dir.as_ref().join("materials"),
        }
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{key}.{ext}")))
            .find(|path| path.is_file())
    }

    fn collect_keys(&self, dir: &Path, keys: &mut Vec<String>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                self.collect_keys(&path, keys);
                continue;
            }
            let supported = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if !supported {
                continue;
            }
            if let Ok(relative) = path.with_extension("").strip_prefix(&self.root) {
                keys.push(normalize(&relative.to_string_lossy().replace('\\', "/")));
            }
        }
    }
}

impl MaterialSource for DirectoryMaterials {
    fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        self.collect_keys(&self.root, &mut keys);
        keys.sort();
        keys.dedup();
        keys
    }

    fn load(&self, key: &str) -> Result<TextureData, MaterialError> {
        let path = self
            .path_for(key)
            .ok_or_else(|| MaterialError::NotFound(key.to_string()))?;
        let bytes = fs::read(&path).map_err(|source| MaterialError::Io {
            path: path.clone(),
            source,
        })?;
        let image = image::load_from_memory(&bytes)
            .map_err(|source| MaterialError::Decode { path, source })?
            .to_rgba8();
        Ok(TextureData {
            width: image.width(),
            height: image.height(),
            rgba: image.into_raw(),
        })
    }
}

/// Used when no game directory is configured. Every material is missing.
pub struct NoMaterials;

impl MaterialSource for NoMaterials {
    fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn load(&self, key: &str) -> Result<TextureData, MaterialError> {
        Err(MaterialError::NotFound(key.to_string()))
    }
}

/// Where a material is in its journey to the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureState {
    /// A worker is loading it.
    Pending,
    /// Pixels are in memory, waiting for the render thread to upload them.
    Decoded,
    Bound(TextureId),
    /// Loading failed; the error texture is drawn instead.
    Missing,
}

enum Slot {
    Pending,
    Decoded(Arc<TextureData>),
    Bound {
        texture: TextureId,
        width: u32,
        height: u32,
    },
    Missing,
}

/// Material keys are case-insensitive.
pub fn normalize(key: &str) -> String {
    key.to_lowercase()
}

/// Maps material keys to GPU textures. Lookups never block on loading: a
/// key that is not bound yet simply has no texture.
#[derive(Default)]
pub struct TextureCache {
    slots: RwLock<HashMap<String, Slot>>,
    error_texture: RwLock<Option<TextureId>>,
}

impl TextureCache {
    pub fn new() -> TextureCache {
        TextureCache::default()
    }

    /// The texture to draw `key` with: its own texture once bound, the error
    /// texture if it failed to load, or `None` if it is not bound yet.
    pub fn lookup(&self, key: &str) -> Option<TextureId> {
        match self.slots.read().get(&normalize(key)) {
            Some(Slot::Bound { texture, .. }) => Some(*texture),
            Some(Slot::Missing) => *self.error_texture.read(),
            _ => None,
        }
    }

    pub fn state(&self, key: &str) -> Option<TextureState> {
        let state = match self.slots.read().get(&normalize(key))? {
            Slot::Pending => TextureState::Pending,
            Slot::Decoded(_) => TextureState::Decoded,
            Slot::Bound { texture, .. } => TextureState::Bound(*texture),
            Slot::Missing => TextureState::Missing,
        };
        Some(state)
    }

    /// Width and height of the material's texture, once its pixels are known.
    pub fn dimensions(&self, key: &str) -> Option<(u32, u32)> {
        match self.slots.read().get(&normalize(key))? {
            Slot::Decoded(data) => Some((data.width, data.height)),
            Slot::Bound { width, height, .. } => Some((*width, *height)),
            Slot::Pending | Slot::Missing => None,
        }
    }

    /// Claims `key` for loading. Returns false if it is already known.
    pub fn begin_load(&self, key: &str) -> bool {
        let mut slots = self.slots.write();
        let key = normalize(key);
        if slots.contains_key(&key) {
            return false;
        }
        slots.insert(key, Slot::Pending);
        true
    }

    /// Records the outcome of loading a key claimed with
    /// [`TextureCache::begin_load`].
    pub fn finish_load(&self, key: &str, result: Result<TextureData, MaterialError>) {
        let key = normalize(key);
        let slot = match result {
            Ok(data) => Slot::Decoded(Arc::new(data)),
            Err(err) => {
                warn!("Failed to load material {key}: {err}");
                Slot::Missing
            }
        };
        let mut slots = self.slots.write();
        if matches!(slots.get(&key), None | Some(Slot::Pending)) {
            slots.insert(key, slot);
        }
    }

    /// Makes sure `key` is bound or on its way. Unknown keys are loaded and
    /// uploaded right away; keys a worker is still loading are left alone.
    pub fn ensure_bound(
        &self,
        key: &str,
        adapter: &dyn GpuAdapter,
        source: &dyn MaterialSource,
    ) -> Result<Option<TextureId>, GpuError> {
        let key = normalize(key);
        if self.begin_load(&key) {
            self.finish_load(&key, source.load(&key));
        }
        let decoded = match self.slots.read().get(&key) {
            Some(Slot::Decoded(data)) => Some(Arc::clone(data)),
            _ => None,
        };
        match decoded {
            Some(data) => self.upload(&key, &data, adapter).map(Some),
            None => Ok(self.lookup(&key)),
        }
    }

    /// Uploads up to `limit` decoded textures. Returns how many were bound.
    pub fn upload_ready(&self, adapter: &dyn GpuAdapter, limit: usize) -> Result<usize, GpuError> {
        let ready: Vec<(String, Arc<TextureData>)> = self
            .slots
            .read()
            .iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Decoded(data) => Some((key.clone(), Arc::clone(data))),
                _ => None,
            })
            .take(limit)
            .collect();
        for (key, data) in &ready {
            self.upload(key, data, adapter)?;
        }
        Ok(ready.len())
    }

    fn upload(
        &self,
        key: &str,
        data: &TextureData,
        adapter: &dyn GpuAdapter,
    ) -> Result<TextureId, GpuError> {
        let texture = adapter.create_texture_2d(data.width, data.height, &data.rgba)?;
        self.slots.write().insert(
            key.to_string(),
            Slot::Bound {
                texture,
                width: data.width,
                height: data.height,
            },
        );
        debug!("Bound texture {key}");
        Ok(texture)
    }

    /// Creates the texture drawn in place of materials that failed to load.
    pub fn install_error_texture(&self, adapter: &dyn GpuAdapter) -> Result<TextureId, GpuError> {
        let data = TextureData::checkerboard(ERROR_TEXTURE_SIZE, ERROR_TEXTURE_CELL);
        let texture = adapter.create_texture_2d(data.width, data.height, &data.rgba)?;
        if let Some(old) = self.error_texture.write().replace(texture) {
            adapter.delete_texture(old);
        }
        Ok(texture)
    }

    pub fn error_texture(&self) -> Option<TextureId> {
        *self.error_texture.read()
    }

    /// Every known material key, sorted.
    pub fn materials(&self) -> Vec<String> {
        let mut materials: Vec<String> = self.slots.read().keys().cloned().collect();
        materials.sort();
        materials
    }

    /// Deletes every texture this cache created and forgets all entries.
    pub fn release_all(&self, adapter: &dyn GpuAdapter) {
        for (_, slot) in self.slots.write().drain() {
            if let Slot::Bound { texture, .. } = slot {
                adapter.delete_texture(texture);
            }
        }
        if let Some(texture) = self.error_texture.write().take() {
            adapter.delete_texture(texture);
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// An in-memory material source that counts loads.
    #[derive(Default)]
    pub struct MemoryMaterials {
        pub textures: HashMap<String, TextureData>,
        pub loads: AtomicUsize,
    }

    impl MemoryMaterials {
        pub fn with(keys: &[(&str, u32, u32)]) -> MemoryMaterials {
            let textures = keys
                .iter()
                .map(|&(key, width, height)| {
                    let data = TextureData {
                        width,
                        height,
                        rgba: vec![255; (width * height * 4) as usize],
                    };
                    (key.to_string(), data)
                })
                .collect();
            MemoryMaterials {
                textures,
                loads: AtomicUsize::new(0),
            }
        }

        pub fn load_count(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    impl MaterialSource for MemoryMaterials {
        fn keys(&self) -> Vec<String> {
            let mut keys: Vec<String> = self.textures.keys().cloned().collect();
            keys.sort();
            keys
        }

        fn load(&self, key: &str) -> Result<TextureData, MaterialError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.textures
                .get(key)
                .cloned()
                .ok_or_else(|| MaterialError::NotFound(key.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryMaterials;
    use super::*;
    use crate::renderer::fake::{FakeAdapter, GpuCall};

    #[test]
    fn unknown_keys_are_not_bound() {
        let cache = TextureCache::new();
        assert_eq!(cache.lookup("brick"), None);
        assert_eq!(cache.state("brick"), None);
    }

    #[test]
    fn ensure_bound_loads_and_uploads_once() {
        let cache = TextureCache::new();
        let adapter = FakeAdapter::new();
        let source = MemoryMaterials::with(&[("brick/wall01", 256, 128)]);

        let texture = cache
            .ensure_bound("Brick/Wall01", &adapter, &source)
            .unwrap()
            .unwrap();
        assert_eq!(cache.lookup("brick/wall01"), Some(texture));
        assert_eq!(cache.dimensions("BRICK/WALL01"), Some((256, 128)));

        cache.ensure_bound("brick/wall01", &adapter, &source).unwrap();
        assert_eq!(source.load_count(), 1);
        assert_eq!(
            adapter.calls(),
            [GpuCall::CreateTexture {
                id: texture.0,
                width: 256,
                height: 128
            }]
        );
    }

    #[test]
    fn missing_material_falls_back_to_error_texture() {
        let cache = TextureCache::new();
        let adapter = FakeAdapter::new();
        let source = MemoryMaterials::default();
        let error = cache.install_error_texture(&adapter).unwrap();

        let texture = cache.ensure_bound("nope", &adapter, &source).unwrap();
        assert_eq!(texture, Some(error));
        assert_eq!(cache.state("nope"), Some(TextureState::Missing));
        assert_eq!(cache.lookup("nope"), Some(error));
        assert_eq!(cache.dimensions("nope"), None);
    }

    #[test]
    fn pending_keys_are_left_to_their_worker() {
        let cache = TextureCache::new();
        let adapter = FakeAdapter::new();
        let source = MemoryMaterials::with(&[("brick", 8, 8)]);

        assert!(cache.begin_load("brick"));
        assert!(!cache.begin_load("BRICK"));
        assert_eq!(cache.ensure_bound("brick", &adapter, &source).unwrap(), None);
        assert_eq!(source.load_count(), 0);

        cache.finish_load("brick", source.load("brick"));
        assert_eq!(cache.state("brick"), Some(TextureState::Decoded));
        assert_eq!(cache.lookup("brick"), None);
        assert_eq!(cache.upload_ready(&adapter, 10).unwrap(), 1);
        assert!(matches!(cache.state("brick"), Some(TextureState::Bound(_))));
        assert_eq!(cache.upload_ready(&adapter, 10).unwrap(), 0);
    }

    #[test]
    fn upload_ready_respects_limit() {
        let cache = TextureCache::new();
        let adapter = FakeAdapter::new();
        let source = MemoryMaterials::with(&[("a", 1, 1), ("b", 1, 1), ("c", 1, 1)]);
        for key in source.keys() {
            cache.begin_load(&key);
            cache.finish_load(&key, source.load(&key));
        }
        assert_eq!(cache.upload_ready(&adapter, 2).unwrap(), 2);
        assert_eq!(cache.upload_ready(&adapter, 2).unwrap(), 1);
        assert_eq!(cache.materials(), ["a", "b", "c"]);
    }

    #[test]
    fn release_all_deletes_textures() {
        let cache = TextureCache::new();
        let adapter = FakeAdapter::new();
        let source = MemoryMaterials::with(&[("a", 1, 1)]);
        let error = cache.install_error_texture(&adapter).unwrap();
        let a = cache.ensure_bound("a", &adapter, &source).unwrap().unwrap();
        cache.release_all(&adapter);
        assert_eq!(adapter.count(|c| *c == GpuCall::DeleteTexture { id: a.0 }), 1);
        assert_eq!(adapter.count(|c| *c == GpuCall::DeleteTexture { id: error.0 }), 1);
        assert!(cache.materials().is_empty());
        assert_eq!(cache.error_texture(), None);
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let data = TextureData::checkerboard(4, 2);
        assert_eq!(data.rgba.len(), 4 * 4 * 4);
        assert_eq!(&data.rgba[0..4], &[255, 0, 255, 255]);
        assert_eq!(&data.rgba[8..12], &[0, 0, 0, 255]);
    }
}
