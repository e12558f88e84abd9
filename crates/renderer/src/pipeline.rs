//! Fragment shader compile/link with rollback.
//!
//! `ShaderPipeline` keeps exactly one active [`CompiledProgram`]. Every
//! recompile builds a complete replacement program off to the side; only a
//! fully linked program is swapped in, so a broken edit never disturbs what
//! is currently on screen.

use std::fmt;
use std::time::Instant;

use crate::backend::{GraphicsBackend, ProgramId, ShaderId, ShaderStage, UniformLocation};
use crate::compile::VERTEX_SHADER_GLSL;
use crate::runtime::Clock;

pub const POSITION_ATTRIBUTE: &str = "a_position";
pub const TEX_COORD_ATTRIBUTE: &str = "a_texcoord";
pub const USER_PARAM_UNIFORM: &str = "userParam";
pub const VIEWPORT_SIZE_UNIFORM: &str = "viewportSize";
pub const TIME_UNIFORM: &str = "time";

const EMPTY_LOG: &str = "no diagnostic output was produced";

/// Host-facing outcome of the latest compile attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStatus {
    Compiled,
    CompileFailed,
    LinkingFailed,
}

impl fmt::Display for CompileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileStatus::Compiled => f.write_str("Compiled"),
            CompileStatus::CompileFailed => f.write_str("Compile Failed"),
            CompileStatus::LinkingFailed => f.write_str("Linking Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("program failed to link:\n{log}")]
    Link { log: String },
}

impl PipelineError {
    pub fn status(&self) -> CompileStatus {
        match self {
            PipelineError::Compile { .. } => CompileStatus::CompileFailed,
            PipelineError::Link { .. } => CompileStatus::LinkingFailed,
        }
    }

    /// Raw driver diagnostic text.
    pub fn log(&self) -> &str {
        match self {
            PipelineError::Compile { log, .. } | PipelineError::Link { log } => log,
        }
    }

    /// Vertex stage failures leave nothing to render with.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Compile {
                stage: ShaderStage::Vertex,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributeLocations {
    pub position: Option<u32>,
    pub tex_coord: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UniformLocations {
    pub user_param: Option<UniformLocation>,
    pub viewport_size: Option<UniformLocation>,
    pub time: Option<UniformLocation>,
}

/// A linked program plus everything the render loop needs to feed it.
///
/// Never mutated after construction; recompiles replace it wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledProgram {
    program: ProgramId,
    attributes: AttributeLocations,
    uniforms: UniformLocations,
    compiled_at: Instant,
}

impl CompiledProgram {
    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn attributes(&self) -> &AttributeLocations {
        &self.attributes
    }

    pub fn uniforms(&self) -> &UniformLocations {
        &self.uniforms
    }

    /// The compile clock: when this program became active.
    pub fn compiled_at(&self) -> Instant {
        self.compiled_at
    }

    /// Seconds elapsed since the program was compiled, as fed to `time`.
    pub fn elapsed_seconds(&self, now: Instant) -> f32 {
        now.saturating_duration_since(self.compiled_at)
            .as_secs_f32()
    }
}

/// Owns the persistent vertex shader and the single active program.
///
/// Takes `&mut self` for every attempt, so compiles are serialised by the
/// borrow checker rather than by convention.
#[derive(Debug)]
pub struct ShaderPipeline {
    vertex_shader: ShaderId,
    active: CompiledProgram,
}

impl ShaderPipeline {
    /// Compiles the fixed vertex shader and the initial fragment shader.
    ///
    /// Both failures are fatal here: the vertex source is not user editable
    /// and there is no earlier program to fall back to.
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        clock: &dyn Clock,
        fragment_source: &str,
    ) -> Result<Self, PipelineError> {
        let vertex_shader = backend.create_shader(ShaderStage::Vertex);
        if !backend.compile_shader(vertex_shader, VERTEX_SHADER_GLSL) {
            let log = non_empty(backend.shader_info_log(vertex_shader));
            backend.delete_shader(vertex_shader);
            tracing::error!(%log, "fixed vertex shader failed to compile");
            return Err(PipelineError::Compile {
                stage: ShaderStage::Vertex,
                log,
            });
        }

        match build_program(backend, vertex_shader, fragment_source, clock) {
            Ok(active) => {
                tracing::info!(program = %active.program, "initial shader compiled");
                Ok(Self {
                    vertex_shader,
                    active,
                })
            }
            Err(err) => {
                backend.delete_shader(vertex_shader);
                Err(err)
            }
        }
    }

    pub fn active(&self) -> &CompiledProgram {
        &self.active
    }

    pub fn vertex_shader(&self) -> ShaderId {
        self.vertex_shader
    }

    /// Compiles and links `fragment_source`, swapping it in on success.
    ///
    /// On failure the active program and compile clock are untouched and the
    /// returned error carries the driver log.
    pub fn compile_and_link<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        fragment_source: &str,
        clock: &dyn Clock,
    ) -> Result<&CompiledProgram, PipelineError> {
        let next = match build_program(backend, self.vertex_shader, fragment_source, clock) {
            Ok(next) => next,
            Err(err) => {
                tracing::warn!(
                    status = %err.status(),
                    active = %self.active.program,
                    "shader rejected; keeping previous program"
                );
                return Err(err);
            }
        };

        let previous = std::mem::replace(&mut self.active, next);
        backend.delete_program(previous.program);
        tracing::info!(
            program = %self.active.program,
            replaced = %previous.program,
            "shader recompiled"
        );
        Ok(&self.active)
    }

    /// Deletes the active program and the persistent vertex shader.
    pub fn release<B: GraphicsBackend>(self, backend: &mut B) {
        backend.delete_program(self.active.program);
        backend.delete_shader(self.vertex_shader);
    }
}

fn build_program<B: GraphicsBackend>(
    backend: &mut B,
    vertex_shader: ShaderId,
    fragment_source: &str,
    clock: &dyn Clock,
) -> Result<CompiledProgram, PipelineError> {
    let fragment = backend.create_shader(ShaderStage::Fragment);
    if !backend.compile_shader(fragment, fragment_source) {
        let log = non_empty(backend.shader_info_log(fragment));
        backend.delete_shader(fragment);
        return Err(PipelineError::Compile {
            stage: ShaderStage::Fragment,
            log,
        });
    }

    let program = backend.create_program();
    backend.attach_shader(program, vertex_shader);
    backend.attach_shader(program, fragment);
    if !backend.link_program(program) {
        let log = non_empty(backend.program_info_log(program));
        backend.detach_shader(program, fragment);
        backend.detach_shader(program, vertex_shader);
        backend.delete_shader(fragment);
        backend.delete_program(program);
        return Err(PipelineError::Link { log });
    }

    backend.detach_shader(program, fragment);
    backend.delete_shader(fragment);

    let attributes = AttributeLocations {
        position: backend.attrib_location(program, POSITION_ATTRIBUTE),
        tex_coord: backend.attrib_location(program, TEX_COORD_ATTRIBUTE),
    };
    let uniforms = UniformLocations {
        user_param: backend.uniform_location(program, USER_PARAM_UNIFORM),
        viewport_size: backend.uniform_location(program, VIEWPORT_SIZE_UNIFORM),
        time: backend.uniform_location(program, TIME_UNIFORM),
    };
    tracing::debug!(%program, ?attributes, ?uniforms, "resolved program interface");

    Ok(CompiledProgram {
        program,
        attributes,
        uniforms,
        compiled_at: clock.now(),
    })
}

fn non_empty(log: String) -> String {
    if log.trim().is_empty() {
        EMPTY_LOG.to_string()
    } else {
        log
    }
}
