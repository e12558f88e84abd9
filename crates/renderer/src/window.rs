use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::backend::BackendError;
use crate::gpu::{WgpuBackend, WgpuBackendOptions};
use crate::params::{ParameterAxis, ViewportSize};
use crate::render_loop::{FrameRequester, RenderLoop};
use crate::runtime::SystemClock;
use crate::sandbox::{Sandbox, SandboxInit, SandboxMessage, StatusReport};
use crate::texture::TextureAxis;

/// Everything the interactive window needs at start-up.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub size: ViewportSize,
    /// File re-read on F5/R. Without it, reload keys are ignored.
    pub shader_path: Option<PathBuf>,
    pub init: SandboxInit,
    pub param_step: f32,
    pub backend: WgpuBackendOptions,
}

/// Events delivered into the window's event loop from other threads.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Message(SandboxMessage),
    /// Re-read the configured shader file and recompile it.
    Reload,
    Shutdown,
}

/// Cloneable, `Send` handle for feeding a running [`WindowHost`].
#[derive(Clone)]
pub struct HostHandle {
    proxy: EventLoopProxy<HostEvent>,
}

impl HostHandle {
    pub fn send(&self, message: SandboxMessage) -> Result<()> {
        self.post(HostEvent::Message(message))
    }

    pub fn reload(&self) -> Result<()> {
        self.post(HostEvent::Reload)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.post(HostEvent::Shutdown)
    }

    fn post(&self, event: HostEvent) -> Result<()> {
        self.proxy
            .send_event(event)
            .map_err(|_| anyhow!("window event loop has already exited"))
    }
}

impl FrameRequester for Window {
    fn request_frame(&self) {
        self.request_redraw();
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum KeyAction {
    SelectParameter(ParameterAxis),
    Nudge(f32),
    CycleWrap(TextureAxis),
    Reload,
    Quit,
}

fn action_for_key(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::ArrowUp) => Some(KeyAction::Nudge(1.0)),
        Key::Named(NamedKey::ArrowDown) => Some(KeyAction::Nudge(-1.0)),
        Key::Named(NamedKey::F5) => Some(KeyAction::Reload),
        Key::Named(NamedKey::Escape) => Some(KeyAction::Quit),
        Key::Character(text) => match text.to_ascii_lowercase().as_str() {
            "1" => Some(KeyAction::SelectParameter(ParameterAxis::X)),
            "2" => Some(KeyAction::SelectParameter(ParameterAxis::Y)),
            "3" => Some(KeyAction::SelectParameter(ParameterAxis::Z)),
            "4" => Some(KeyAction::SelectParameter(ParameterAxis::W)),
            "x" => Some(KeyAction::CycleWrap(TextureAxis::X)),
            "y" => Some(KeyAction::CycleWrap(TextureAxis::Y)),
            "r" => Some(KeyAction::Reload),
            _ => None,
        },
        _ => None,
    }
}

/// Per-window state. Field order matters: the sandbox (and with it the
/// surface) must drop before the window it was created from.
struct HostState {
    sandbox: Sandbox<WgpuBackend>,
    render: RenderLoop,
    selected: ParameterAxis,
    title: String,
    shader_path: Option<PathBuf>,
    param_step: f32,
    window: Arc<Window>,
}

impl HostState {
    fn apply(&mut self, message: SandboxMessage) {
        if let Some(report) = self.sandbox.handle(message) {
            self.report(&report);
        }
        self.refresh_title();
    }

    fn reload(&mut self) {
        let Some(path) = self.shader_path.as_ref() else {
            tracing::debug!("reload requested but no shader file is configured");
            return;
        };
        match std::fs::read_to_string(path) {
            Ok(source) => self.apply(SandboxMessage::RecompileRequested { source }),
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "failed to read shader"),
        }
    }

    fn report(&self, report: &StatusReport) {
        match &report.log {
            None => tracing::info!(status = %report.status, "shader status"),
            Some(log) => tracing::warn!(status = %report.status, "{log}"),
        }
    }

    fn handle_key(&mut self, key: &Key) -> bool {
        let Some(action) = action_for_key(key) else {
            return true;
        };
        match action {
            KeyAction::SelectParameter(axis) => {
                self.selected = axis;
                self.refresh_title();
            }
            KeyAction::Nudge(direction) => {
                let value = self.sandbox.params().get(self.selected) + direction * self.param_step;
                self.apply(SandboxMessage::ParameterChanged {
                    axis: self.selected,
                    value,
                });
            }
            KeyAction::CycleWrap(axis) => {
                let mode = self.sandbox.texture().wrap_mode(axis).cycle();
                self.apply(SandboxMessage::WrapModeChanged { axis, mode });
            }
            KeyAction::Reload => self.reload(),
            KeyAction::Quit => return false,
        }
        true
    }

    fn refresh_title(&self) {
        let params = self.sandbox.params().snapshot();
        let texture = self.sandbox.texture();
        self.window.set_title(&format!(
            "{} - {} - {}={:.3} [{:.2} {:.2} {:.2} {:.2}] wrap {}/{}",
            self.title,
            self.sandbox.status().status,
            self.selected,
            params.get(self.selected),
            params.x,
            params.y,
            params.z,
            params.w,
            texture.wrap_mode(TextureAxis::X),
            texture.wrap_mode(TextureAxis::Y),
        ));
    }

    /// Returns `false` when the loop should exit.
    fn redraw(&mut self) -> bool {
        match self.render.tick(&mut self.sandbox, self.window.as_ref()) {
            Ok(_) => true,
            Err(BackendError::SurfaceLost | BackendError::SurfaceOutdated) => {
                self.sandbox.backend_mut().reconfigure();
                true
            }
            Err(BackendError::Timeout) => {
                tracing::warn!("surface timeout; retrying next frame");
                true
            }
            Err(err) if err.is_recoverable() => {
                tracing::warn!(error = %err, "frame failed; retrying next frame");
                true
            }
            Err(err) => {
                tracing::error!(error = %err, "unrecoverable render error; exiting");
                false
            }
        }
    }
}

/// Interactive sandbox window driven by winit.
pub struct WindowHost {
    event_loop: EventLoop<HostEvent>,
    state: HostState,
}

impl WindowHost {
    pub fn new(config: WindowConfig) -> Result<Self> {
        let event_loop = EventLoopBuilder::<HostEvent>::with_user_event()
            .build()
            .map_err(|err| anyhow!("failed to create event loop: {err}"))?;

        let window = WindowBuilder::new()
            .with_title(&config.title)
            .with_inner_size(PhysicalSize::new(config.size.width, config.size.height))
            .build(&event_loop)
            .map_err(|err| anyhow!("failed to create sandbox window: {err}"))?;
        let window = Arc::new(window);

        let inner = window.inner_size();
        let backend = WgpuBackend::new(
            window.as_ref(),
            ViewportSize::new(inner.width, inner.height),
            config.backend,
        )
        .context("failed to initialise GPU backend")?;
        let sandbox = Sandbox::new(backend, Box::new(SystemClock::new()), config.init)
            .context("failed to initialise sandbox")?;

        let state = HostState {
            sandbox,
            render: RenderLoop::new(),
            selected: ParameterAxis::X,
            title: config.title,
            shader_path: config.shader_path,
            param_step: config.param_step,
            window,
        };
        state.refresh_title();
        Ok(Self { event_loop, state })
    }

    pub fn handle(&self) -> HostHandle {
        HostHandle {
            proxy: self.event_loop.create_proxy(),
        }
    }

    /// Runs until the window closes or a shutdown event arrives.
    pub fn run(self) -> Result<()> {
        let Self {
            event_loop,
            mut state,
        } = self;
        let stop = state.render.stop_handle();
        state.window.request_redraw();

        event_loop
            .run(move |event, elwt| {
                elwt.set_control_flow(ControlFlow::Wait);
                match event {
                    Event::UserEvent(HostEvent::Message(message)) => state.apply(message),
                    Event::UserEvent(HostEvent::Reload) => state.reload(),
                    Event::UserEvent(HostEvent::Shutdown) => {
                        stop.stop();
                        elwt.exit();
                    }
                    Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                        match event {
                            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                                stop.stop();
                                elwt.exit();
                            }
                            WindowEvent::KeyboardInput { event, .. }
                                if event.state == ElementState::Pressed =>
                            {
                                if !state.handle_key(&event.logical_key) {
                                    stop.stop();
                                    elwt.exit();
                                }
                            }
                            WindowEvent::Resized(size) => {
                                state
                                    .sandbox
                                    .backend_mut()
                                    .resize(ViewportSize::new(size.width, size.height));
                                state.window.request_redraw();
                            }
                            WindowEvent::RedrawRequested => {
                                if !state.redraw() {
                                    stop.stop();
                                    elwt.exit();
                                }
                            }
                            _ => {}
                        }
                    }
                    _ => {}
                }
            })
            .map_err(|err| anyhow!("window event loop error: {err}"))
    }
}
