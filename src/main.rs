use std::error::Error;
use std::fmt::Display;
use std::rc::Rc;
use std::sync::Arc;

use env_logger::Env;
use glam::Vec3;
use log::{error, info, warn};
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::{Keycode, Scancode};
use sdl2::mouse::MouseButton;
use sdl2::video::{GLContext, GLProfile, Window};
use sdl2::EventPump;

use mapforge::config::EditorConfig;
use mapforge::preload::Preloader;
use mapforge::renderer::adapter::GpuAdapter;
use mapforge::renderer::opengl::OpenGlAdapter;
use mapforge::renderer::{RenderMode, Renderer};
use mapforge::scene::Scene;
use mapforge::textures::{DirectoryMaterials, MaterialSource, NoMaterials, TextureCache};
use mapforge::world::Document;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let config = EditorConfig::load()?;

    let sdl_context = sdl2::init().map_err(SdlErr)?;
    let video_subsystem = sdl_context.video().map_err(SdlErr)?;
    let gl_attr = video_subsystem.gl_attr();
    gl_attr.set_context_profile(GLProfile::GLES);
    gl_attr.set_context_version(3, 0);
    gl_attr.set_depth_size(24);
    // Linear->SRGB conversion is done in shader.
    gl_attr.set_framebuffer_srgb_compatible(false);
    let window = video_subsystem
        .window(env!("CARGO_PKG_NAME"), config.window_width, config.window_height)
        .resizable()
        .opengl()
        .build()?;
    let gl_context = window.gl_create_context().map_err(SdlErr)?;
    video_subsystem.gl_set_swap_interval(1).map_err(SdlErr)?;
    let event_pump = sdl_context.event_pump().map_err(SdlErr)?;

    let adapter: Rc<dyn GpuAdapter> = Rc::new(OpenGlAdapter::new(&video_subsystem));
    let mut state = State::new(config, adapter, window, gl_context, event_pump)?;
    while state.run_frame()? {}
    Ok(())
}

struct State {
    config: EditorConfig,
    adapter: Rc<dyn GpuAdapter>,
    textures: Arc<TextureCache>,
    preloader: Preloader,
    scene: Scene,
    renderer: Renderer,
    camera_name: Option<String>,
    render_mode: RenderMode,
    window: Window,
    event_pump: EventPump,
    _gl_context: GLContext,
}

impl State {
    fn new(
        config: EditorConfig,
        adapter: Rc<dyn GpuAdapter>,
        window: Window,
        gl_context: GLContext,
        event_pump: EventPump,
    ) -> anyhow::Result<State> {
        let textures = Arc::new(TextureCache::new());
        textures.install_error_texture(adapter.as_ref())?;

        let materials: Arc<dyn MaterialSource> = match &config.game_dir {
            Some(game_dir) => Arc::new(DirectoryMaterials::new(game_dir)),
            None => {
                warn!("No game_dir configured, materials will not be loaded");
                Arc::new(NoMaterials)
            }
        };
        let preloader = Preloader::start(
            Arc::clone(&materials),
            Arc::clone(&textures),
            config.preload_workers,
            config.preload_channel_capacity,
        );

        let document = match &config.document {
            Some(path) => {
                info!("Opening {}", path.display());
                Document::load(path)?
            }
            None => Document::sample_room(),
        };
        let scene = Scene::from_document(
            &document,
            Rc::clone(&adapter),
            Arc::clone(&textures),
            materials,
            config.field_of_view,
        );
        let camera_name = scene.camera_names().into_iter().next();

        let renderer = Renderer::new(Rc::clone(&adapter))?;
        let (w, h) = window.drawable_size();
        renderer.resize(w as i32, h as i32);

        let mut state = State {
            render_mode: config.render_mode,
            config,
            adapter,
            textures,
            preloader,
            scene,
            renderer,
            camera_name,
            window,
            event_pump,
            _gl_context: gl_context,
        };
        state.set_aspect(w, h);
        Ok(state)
    }

    fn set_aspect(&mut self, width: u32, height: u32) {
        let Some(name) = &self.camera_name else {
            return;
        };
        if let Some(camera) = self.scene.camera_mut(name) {
            camera.aspect = width as f32 / height.max(1) as f32;
        }
    }

    /// Handles input and draws one frame. Returns false once the window has
    /// been closed.
    fn run_frame(&mut self) -> anyhow::Result<bool> {
        let sensitivity = self.config.camera_sensitivity * 0.1;
        let mut look = (0.0, 0.0);
        let events: Vec<Event> = self.event_pump.poll_iter().collect();
        for event in events {
            match event {
                Event::Quit { .. } => return Ok(false),
                Event::Window {
                    win_event: WindowEvent::Resized(..),
                    ..
                } => {
                    let (w, h) = self.window.drawable_size();
                    self.renderer.resize(w as i32, h as i32);
                    self.set_aspect(w, h);
                }
                Event::MouseMotion {
                    mousestate,
                    xrel,
                    yrel,
                    ..
                } if mousestate.is_mouse_button_pressed(MouseButton::Right) => {
                    look.0 -= yrel as f32 * sensitivity;
                    look.1 -= xrel as f32 * sensitivity;
                }
                Event::KeyDown {
                    keycode: Some(Keycode::Tab),
                    repeat: false,
                    ..
                } => {
                    self.render_mode = self.render_mode.next();
                    info!("Render mode: {}", self.render_mode);
                }
                _ => {}
            }
        }

        let keyboard = self.event_pump.keyboard_state();
        let axis = |positive, negative| {
            keyboard.is_scancode_pressed(positive) as i32 as f32
                - keyboard.is_scancode_pressed(negative) as i32 as f32
        };
        let movement = Vec3::new(
            axis(Scancode::D, Scancode::A),
            axis(Scancode::W, Scancode::S),
            axis(Scancode::E, Scancode::Q),
        ) * self.config.camera_move_speed;
        if let Some(camera) = self
            .camera_name
            .as_deref()
            .and_then(|name| self.scene.camera_mut(name))
        {
            camera.rotate(look.0.to_radians(), look.1.to_radians());
            camera.translate_local(movement);
        }

        self.preloader.drain(self.config.preload_drain_per_frame);
        self.textures
            .upload_ready(self.adapter.as_ref(), self.config.texture_uploads_per_frame)?;
        if let Err(err) = self.scene.recompose_scene() {
            error!("Scene recomposition failed: {err}");
            return Err(err.into());
        }

        self.renderer.clear();
        if let Some(camera) = self
            .camera_name
            .as_deref()
            .and_then(|name| self.scene.camera(name))
        {
            self.renderer.bind_camera(camera);
        }
        if let (Some(composition), Some(mesh)) = (self.scene.composition(), self.scene.frame_mesh())
        {
            self.renderer
                .draw_composition(composition, &mesh, self.render_mode, &self.textures);
        }
        self.renderer.draw_axis()?;

        self.window.gl_swap_window();
        Ok(true)
    }
}

impl Drop for State {
    fn drop(&mut self) {
        self.textures.release_all(self.adapter.as_ref());
    }
}

#[derive(Debug)]
pub struct SdlErr(String);
impl Display for SdlErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sdl error: {}", self.0)
    }
}
impl Error for SdlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
