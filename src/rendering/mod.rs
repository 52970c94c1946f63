pub mod imgui_renderer;
pub mod instance;
pub mod passes;
pub mod render_model;
pub mod renderer;
pub mod texture;
