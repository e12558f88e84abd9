use std::fmt;

use image::DynamicImage;

use crate::backend::GraphicsBackend;
use crate::geometry::GeometryBuffers;
use crate::params::{ParameterAxis, ParameterStore, ParameterVector};
use crate::pipeline::{CompileStatus, PipelineError, ShaderPipeline};
use crate::runtime::{BoxedClock, Clock};
use crate::texture::{TextureAxis, TextureError, TextureManager, WrapMode};

/// Discrete inputs the host feeds into a running sandbox.
#[derive(Debug, Clone, PartialEq)]
pub enum SandboxMessage {
    ParameterChanged { axis: ParameterAxis, value: f32 },
    WrapModeChanged { axis: TextureAxis, mode: WrapMode },
    RecompileRequested { source: String },
}

/// Status line plus the raw driver log of the latest compile attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: CompileStatus,
    /// Diagnostic text on failure; cleared on success.
    pub log: Option<String>,
}

impl StatusReport {
    pub fn compiled() -> Self {
        Self {
            status: CompileStatus::Compiled,
            log: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == CompileStatus::Compiled
    }
}

impl From<&PipelineError> for StatusReport {
    fn from(err: &PipelineError) -> Self {
        Self {
            status: err.status(),
            log: Some(err.log().to_string()),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.log {
            Some(log) => write!(f, "{}\n{}", self.status, log),
            None => write!(f, "{}", self.status),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Texture(#[from] TextureError),
}

/// Everything needed to bring a sandbox up.
#[derive(Debug, Clone)]
pub struct SandboxInit {
    pub fragment_source: String,
    pub image: DynamicImage,
    pub params: ParameterVector,
    pub wrap_x: WrapMode,
    pub wrap_y: WrapMode,
}

impl SandboxInit {
    pub fn new(fragment_source: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            fragment_source: fragment_source.into(),
            image,
            params: ParameterVector::default(),
            wrap_x: WrapMode::default(),
            wrap_y: WrapMode::default(),
        }
    }
}

/// Owned render context: one backend, one quad, one texture, one program.
///
/// There is no global state; every operation goes through a `Sandbox`, so
/// several can live side by side (each test builds its own).
pub struct Sandbox<B: GraphicsBackend> {
    pub(crate) backend: B,
    pub(crate) clock: BoxedClock,
    pub(crate) geometry: GeometryBuffers,
    pub(crate) texture: TextureManager,
    pub(crate) pipeline: ShaderPipeline,
    pub(crate) params: ParameterStore,
    status: StatusReport,
}

impl<B: GraphicsBackend> Sandbox<B> {
    /// Uploads the quad and image and compiles the initial shader.
    ///
    /// Any failure here is fatal: there is no earlier state to fall back to.
    pub fn new(mut backend: B, clock: BoxedClock, init: SandboxInit) -> Result<Self, SandboxError> {
        let geometry = GeometryBuffers::upload(&mut backend);
        let mut texture = TextureManager::from_image(&mut backend, &init.image)?;
        texture.set_wrap_mode(TextureAxis::X, init.wrap_x);
        texture.set_wrap_mode(TextureAxis::Y, init.wrap_y);
        texture.apply_wrap_mode(&mut backend);
        let pipeline = ShaderPipeline::new(&mut backend, clock.as_ref(), &init.fragment_source)?;

        Ok(Self {
            backend,
            clock,
            geometry,
            texture,
            pipeline,
            params: ParameterStore::new(init.params),
            status: StatusReport::compiled(),
        })
    }

    /// Applies one host message. Recompiles return the resulting status.
    pub fn handle(&mut self, message: SandboxMessage) -> Option<StatusReport> {
        match message {
            SandboxMessage::ParameterChanged { axis, value } => {
                self.set_parameter(axis, value);
                None
            }
            SandboxMessage::WrapModeChanged { axis, mode } => {
                self.set_wrap_mode(axis, mode);
                None
            }
            SandboxMessage::RecompileRequested { source } => Some(self.recompile(&source)),
        }
    }

    /// Compiles `source` and swaps it in; on failure the previous program
    /// keeps rendering.
    pub fn recompile(&mut self, source: &str) -> StatusReport {
        let report = match self
            .pipeline
            .compile_and_link(&mut self.backend, source, self.clock.as_ref())
        {
            Ok(_) => StatusReport::compiled(),
            Err(err) => StatusReport::from(&err),
        };
        self.status = report.clone();
        report
    }

    pub fn set_parameter(&mut self, axis: ParameterAxis, value: f32) {
        tracing::trace!(%axis, value, "parameter changed");
        self.params.set(axis, value);
    }

    /// Records the wrap mode; it reaches the GPU on the next tick.
    pub fn set_wrap_mode(&mut self, axis: TextureAxis, mode: WrapMode) {
        tracing::debug!(%axis, %mode, "wrap mode changed");
        self.texture.set_wrap_mode(axis, mode);
    }

    pub fn status(&self) -> &StatusReport {
        &self.status
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn texture(&self) -> &TextureManager {
        &self.texture
    }

    pub fn pipeline(&self) -> &ShaderPipeline {
        &self.pipeline
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Releases the program objects and hands the backend back.
    pub fn into_backend(self) -> B {
        let Self {
            mut backend,
            pipeline,
            ..
        } = self;
        pipeline.release(&mut backend);
        backend
    }
}

impl<B: GraphicsBackend> fmt::Debug for Sandbox<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("program", &self.pipeline.active().program())
            .field("params", &self.params.snapshot())
            .field("status", &self.status.status)
            .finish_non_exhaustive()
    }
}
