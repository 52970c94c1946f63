use std::{collections::HashMap, sync::Arc, time::Instant};

use anyhow::Context;
use glam::Vec2;
use imgui::{FontConfig, FontSource};
use imgui_winit_support::WinitPlatform;
use winit::{
    application::ApplicationHandler,
    event::{
        ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent,
    },
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::Window,
};

use crate::{
    config::AppConfig,
    demo::DemoState,
    overlay::OverlayAction,
    placement::TouchGesture,
    rendering::renderer::Renderer,
};

/// Pinch distance the mouse wheel starts from, in logical pixels. Maps to the initial scale.
const WHEEL_PINCH_START: f32 = 500.0;
const WHEEL_PINCH_MAX: f32 = 2000.0;
const WHEEL_PIXELS_PER_LINE: f32 = 40.0;

struct ImguiState {
    context: imgui::Context,
    platform: WinitPlatform,
}

/// Contacts currently on the screen, in logical pixels.
#[derive(Default)]
struct TouchTracker {
    contacts: HashMap<u64, Vec2>,
}

impl TouchTracker {
    /// Updates a contact and returns a gesture if two or more fingers are down.
    fn update(&mut self, id: u64, phase: TouchPhase, location: Vec2) -> Option<TouchGesture> {
        match phase {
            TouchPhase::Started => {
                self.contacts.insert(id, location);
                None
            }
            TouchPhase::Moved => {
                self.contacts.insert(id, location);
                self.gesture()
            }
            TouchPhase::Ended | TouchPhase::Cancelled => {
                self.contacts.remove(&id);
                None
            }
        }
    }

    fn gesture(&self) -> Option<TouchGesture> {
        if self.contacts.len() < 2 {
            return None;
        }

        let mut ids: Vec<u64> = self.contacts.keys().copied().collect();
        ids.sort_unstable();
        let contacts = ids.iter().map(|id| self.contacts[id]).collect();

        Some(TouchGesture::new(contacts, Instant::now()))
    }

    fn len(&self) -> usize {
        self.contacts.len()
    }
}

struct App {
    renderer: Option<Renderer>,
    demo_state: DemoState,
    mouse_pos: Vec2,
    touches: TouchTracker,
    wheel_pinch: f32,
    imgui: Option<ImguiState>,
    last_frame: Instant,
}

impl App {
    fn from_demo_state(demo_state: DemoState) -> Self {
        Self {
            renderer: None,
            demo_state,
            mouse_pos: Vec2::ZERO,
            touches: TouchTracker::default(),
            wheel_pinch: WHEEL_PINCH_START,
            imgui: None,
            last_frame: Instant::now(),
        }
    }

    fn setup_imgui(&mut self, window: &Window) {
        let mut context = imgui::Context::create();
        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(
            context.io_mut(),
            window,
            imgui_winit_support::HiDpiMode::Default,
        );

        let font_size = 16.0;
        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: font_size,
                ..Default::default()
            }),
        }]);

        // Disable INI support because it's broken in the published version of imgui
        context.set_ini_filename(None);

        self.imgui = Some(ImguiState { context, platform });
    }

    fn create_renderer(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attributes = Window::default_attributes().with_title("AR placement");
        let window = event_loop
            .create_window(window_attributes)
            .context("Failed to create window")?;

        self.setup_imgui(&window);
        let imgui = self.imgui.as_mut().context("Imgui was not initialised")?;

        let renderer = pollster::block_on(Renderer::new(Arc::new(window), &mut imgui.context))?;
        self.renderer = Some(renderer);

        Ok(())
    }

    fn resolution(renderer: &Renderer) -> Vec2 {
        Vec2::new(renderer.size.width as f32, renderer.size.height as f32)
    }

    fn redraw(&mut self) -> anyhow::Result<()> {
        let (Some(renderer), Some(imgui)) = (self.renderer.as_mut(), self.imgui.as_mut()) else {
            return Ok(());
        };

        let now = Instant::now();
        imgui
            .context
            .io_mut()
            .update_delta_time(now - self.last_frame);
        self.last_frame = now;

        renderer.window.request_redraw();

        imgui
            .platform
            .prepare_frame(imgui.context.io_mut(), &renderer.window)
            .context("Failed to prepare Imgui frame")?;

        let ui = imgui.context.new_frame();
        let action = self.demo_state.overlay.draw(ui);

        match action {
            Some(OverlayAction::StartSession) => self.demo_state.start_session(renderer),
            Some(OverlayAction::EndSession) => self.demo_state.end_session(renderer),
            None => {}
        }

        self.demo_state.frame(renderer, &mut imgui.context)
    }

    fn handle_touch(&mut self, id: u64, phase: TouchPhase, location: Vec2) {
        let was_single = self.touches.contacts.is_empty() && phase == TouchPhase::Started;

        if let Some(gesture) = self.touches.update(id, phase, location) {
            self.demo_state.gesture(&gesture);
        } else if was_single {
            self.demo_state.select();
        }
    }

    fn handle_wheel(&mut self, delta: MouseScrollDelta) {
        let pixels = match delta {
            MouseScrollDelta::LineDelta(_, lines) => lines * WHEEL_PIXELS_PER_LINE,
            MouseScrollDelta::PixelDelta(position) => position.y as f32,
        };

        self.wheel_pinch = (self.wheel_pinch + pixels).clamp(0.0, WHEEL_PINCH_MAX);

        let gesture = TouchGesture::new(
            vec![Vec2::ZERO, Vec2::new(self.wheel_pinch, 0.0)],
            Instant::now(),
        );
        self.demo_state.gesture(&gesture);
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }

        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        match &event.logical_key {
            Key::Named(NamedKey::Enter) => self.demo_state.start_session(renderer),
            Key::Named(NamedKey::Escape) => self.demo_state.end_session(renderer),
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }

        if let Err(error) = self.create_renderer(event_loop) {
            log::error!("Failed to start renderer: {:#}", error);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let ui_wants_mouse = self
            .imgui
            .as_ref()
            .is_some_and(|imgui| imgui.context.io().want_capture_mouse);

        match &event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(*new_size);
                    let resolution = Self::resolution(renderer);
                    self.demo_state.set_cursor(self.mouse_pos, resolution);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(error) = self.redraw() {
                    log::error!("Frame failed: {:#}", error);
                    event_loop.exit();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_pos = Vec2::new(position.x as f32, position.y as f32);
                if let Some(renderer) = self.renderer.as_ref() {
                    let resolution = Self::resolution(renderer);
                    self.demo_state.set_cursor(self.mouse_pos, resolution);
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } if !ui_wants_mouse => {
                self.demo_state.select();
            }
            WindowEvent::MouseWheel { delta, .. } if !ui_wants_mouse => {
                self.handle_wheel(*delta);
            }
            WindowEvent::Touch(touch) => {
                let scale_factor = self
                    .renderer
                    .as_ref()
                    .map(|renderer| renderer.window.scale_factor())
                    .unwrap_or(1.0);
                let location = touch.location.to_logical::<f32>(scale_factor);

                self.handle_touch(touch.id, touch.phase, Vec2::new(location.x, location.y));
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(event);
            }
            _ => (),
        }

        if let (Some(renderer), Some(imgui)) = (self.renderer.as_ref(), self.imgui.as_mut()) {
            imgui.platform.handle_event::<()>(
                imgui.context.io_mut(),
                &renderer.window,
                &Event::WindowEvent { window_id, event },
            );
        }
    }
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let demo_state = DemoState::new(config);
    let mut app = App::from_demo_state(demo_state);
    event_loop.run_app(&mut app)?;

    Ok(())
}
