use std::sync::Arc;

use anyhow::Context;
use id_arena::Arena;
use wgpu::CommandEncoderDescriptor;
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    camera::{Camera, CameraUniform},
    demo::Presenter,
    rendering::{
        imgui_renderer::ImguiRendererState,
        passes::scene_pass::{ScenePass, ScenePassTextureViews},
        render_model::{gather_instances, render_model_instances, RenderModel},
        texture::DepthTexture,
    },
    scene_graph::Scene,
    xr::{sim::SimSession, XrError, XrLayerBinding},
};

const IDLE_CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.03,
    a: 1.0,
};

/// Stand-in for the camera passthrough while a session presents.
const PASSTHROUGH_CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.28,
    g: 0.30,
    b: 0.33,
    a: 1.0,
};

pub struct Renderer {
    pub window: Arc<Window>,
    pub size: PhysicalSize<u32>,

    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,

    depth_texture: DepthTexture,
    render_models: Arena<RenderModel>,

    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,

    scene_pass: ScenePass,
    imgui_renderer: ImguiRendererState,

    /// Whether a session is bound and frames go to it.
    presenting: bool,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        imgui_context: &mut imgui::Context,
    ) -> anyhow::Result<Renderer> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable graphics adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to create device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("Surface reports no supported formats")?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let camera_uniform = CameraUniform::default();
        let camera_buffer = camera_uniform.create_buffer(&device);

        let depth_texture = DepthTexture::new(&device, size, "Depth Texture");
        let scene_pass = ScenePass::create(&device, surface_format, &camera_buffer);
        let imgui_renderer =
            ImguiRendererState::new(&device, &queue, surface_format, imgui_context);

        Ok(Self {
            window,
            size,
            surface,
            surface_config,
            device,
            queue,
            depth_texture,
            render_models: Arena::new(),
            camera_uniform,
            camera_buffer,
            scene_pass,
            imgui_renderer,
            presenting: false,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.surface_config.width = new_size.width;
            self.surface_config.height = new_size.height;
            self.depth_texture.resize(&self.device, new_size);
            self.surface.configure(&self.device, &self.surface_config);
        }
    }

    /// Gets the next surface texture, or `None` if this frame has to be skipped.
    fn acquire_frame(&mut self) -> anyhow::Result<Option<wgpu::SurfaceTexture>> {
        match self.surface.get_current_texture() {
            Ok(output) => Ok(Some(output)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.resize(self.size);
                Ok(None)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(anyhow::anyhow!("Out of memory")),
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timeout");
                Ok(None)
            }
            Err(other) => {
                log::error!("Unexpected error: {:?}", other);
                Ok(None)
            }
        }
    }

    pub fn render(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        imgui_context: &mut imgui::Context,
    ) -> anyhow::Result<()> {
        let Some(output) = self.acquire_frame()? else {
            // Close the UI frame anyway so the next one can start
            imgui_context.render();
            return Ok(());
        };

        self.camera_uniform.update(self.size, camera);
        self.camera_uniform
            .update_buffer(&self.queue, &self.camera_buffer);

        gather_instances(scene, &mut self.render_models);

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let clear_color = if self.presenting {
            PASSTHROUGH_CLEAR_COLOR
        } else {
            IDLE_CLEAR_COLOR
        };

        self.scene_pass.render(
            ScenePassTextureViews {
                color: &view,
                depth: self.depth_texture.view(),
            },
            clear_color,
            &mut encoder,
            |render_pass| {
                for (_id, render_model) in self.render_models.iter() {
                    if !render_model.instances.should_render() {
                        continue;
                    }

                    render_model_instances(render_pass, &self.queue, render_model);
                }
            },
        );

        self.imgui_renderer.render(
            &view,
            imgui_context,
            &self.device,
            &self.queue,
            &mut encoder,
        )?;

        self.queue.submit([encoder.finish()]);
        output.present();

        Ok(())
    }
}

impl Presenter for Renderer {
    type Overlay = imgui::Context;

    fn upload_models(&mut self, scene: &mut Scene) {
        for (_id, scene_model) in scene
            .models
            .iter_mut()
            .filter(|(_, scene_model)| scene_model.render_model.is_none())
        {
            let render_model = RenderModel::from_model(&self.device, &scene_model.model);
            scene_model.render_model = Some(self.render_models.alloc(render_model));

            log::info!(
                "Uploaded model {} with {} primitives",
                scene_model.name(),
                scene_model.model.primitives.len()
            );
        }
    }

    fn present(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        overlay: &mut imgui::Context,
    ) -> anyhow::Result<()> {
        self.render(scene, camera, overlay)
    }
}

impl XrLayerBinding<SimSession> for Renderer {
    async fn bind_session(&mut self, session: &SimSession) -> Result<(), XrError> {
        if session.is_ended() {
            return Err(XrError::SessionEnded);
        }

        if self.size.width == 0 || self.size.height == 0 {
            return Err(XrError::Binding("window has no drawable area".to_string()));
        }

        self.presenting = true;
        log::debug!("Renderer bound to session");
        Ok(())
    }

    fn unbind_session(&mut self) {
        self.presenting = false;
        log::debug!("Renderer unbound from session");
    }
}
