//! The 2D layer drawn over the camera feed: loading indicator, activation button and alerts.

use imgui::Condition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The start button is shown and usable.
    Available,
    /// A session is running, the button is out of the way.
    Hidden,
    /// The environment can never host a session; the button is shown but cannot be used.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAction {
    StartSession,
    EndSession,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayState {
    /// Loaded fraction while the model is loading, `None` once it finished or failed.
    loading: Option<f32>,
    activation: Activation,
    alert: Option<String>,
}

impl OverlayState {
    pub fn new() -> Self {
        Self {
            loading: Some(0.0),
            activation: Activation::Available,
            alert: None,
        }
    }

    pub fn set_loading_progress(&mut self, loaded: u64, total: u64) {
        if self.loading.is_some() {
            let fraction = if total == 0 {
                0.0
            } else {
                (loaded as f64 / total as f64) as f32
            };
            self.loading = Some(fraction.clamp(0.0, 1.0));
        }
    }

    pub fn hide_loading(&mut self) {
        self.loading = None;
    }

    pub fn loading(&self) -> Option<f32> {
        self.loading
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Permanently blocks activation. Later session changes do not re-enable it.
    pub fn disable_activation(&mut self) {
        self.activation = Activation::Disabled;
    }

    pub fn session_started(&mut self) {
        if self.activation != Activation::Disabled {
            self.activation = Activation::Hidden;
        }
    }

    pub fn session_ended(&mut self) {
        if self.activation != Activation::Disabled {
            self.activation = Activation::Available;
        }
    }

    pub fn alert(&mut self, message: impl Into<String>) {
        self.alert = Some(message.into());
    }

    pub fn current_alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    pub fn draw(&mut self, ui: &imgui::Ui) -> Option<OverlayAction> {
        let mut action = None;
        let [width, height] = ui.io().display_size;

        if let Some(fraction) = self.loading {
            ui.window("Loading")
                .position([width * 0.5, height * 0.5], Condition::Always)
                .position_pivot([0.5, 0.5])
                .no_decoration()
                .always_auto_resize(true)
                .build(|| {
                    ui.text(format!("Loading model: {:.2}%", fraction * 100.0));
                });
        }

        ui.window("AR")
            .position([width * 0.5, height - 24.0], Condition::Always)
            .position_pivot([0.5, 1.0])
            .no_decoration()
            .always_auto_resize(true)
            .build(|| match self.activation {
                Activation::Available => {
                    if ui.button("Start AR") {
                        action = Some(OverlayAction::StartSession);
                    }
                }
                Activation::Hidden => {
                    ui.text("Tap a surface to place the model, pinch to scale");
                    if ui.button("Exit AR") {
                        action = Some(OverlayAction::EndSession);
                    }
                }
                Activation::Disabled => {
                    ui.text_disabled("AR unavailable");
                }
            });

        let mut dismissed = false;
        if let Some(message) = &self.alert {
            ui.window("Notice")
                .position([width * 0.5, height * 0.3], Condition::Always)
                .position_pivot([0.5, 0.5])
                .collapsible(false)
                .always_auto_resize(true)
                .build(|| {
                    ui.text_wrapped(message);
                    if ui.button("OK") {
                        dismissed = true;
                    }
                });
        }

        if dismissed {
            self.dismiss_alert();
        }

        action
    }
}

impl Default for OverlayState {
    fn default() -> Self {
        Self::new()
    }
}
