//! The seam between the sandbox core and a concrete graphics API.
//!
//! The core only ever talks to the GPU through [`GraphicsBackend`], which
//! models the classic "named object" style: shaders, programs, buffers and
//! textures are created by the backend and referred to afterwards through
//! small copyable handles. `gpu::WgpuBackend` is the production
//! implementation; unit tests use an in-crate recording fake.

use std::fmt;

use crate::params::ViewportSize;
use crate::texture::WrapMode;

macro_rules! object_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Wraps a backend-assigned object name.
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// Returns the backend-assigned object name.
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $kind, self.0)
            }
        }
    };
}

object_handle!(
    /// Handle to a single compiled (or failed) shader stage object.
    ShaderId,
    "shader"
);
object_handle!(
    /// Handle to a program object pairing a vertex and a fragment stage.
    ProgramId,
    "program"
);
object_handle!(
    /// Handle to a vertex or index buffer.
    BufferId,
    "buffer"
);
object_handle!(
    /// Handle to a 2D texture object.
    TextureId,
    "texture"
);

/// Pipeline stage a shader object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// What a buffer object will be bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Backend-defined location of a named uniform inside a linked program.
///
/// The value is opaque to the core: the wgpu backend stores the byte offset
/// of the member inside the std140 uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(u32);

impl UniformLocation {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Frame-level failures reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("presentation surface was lost")]
    SurfaceLost,
    #[error("presentation surface is outdated")]
    SurfaceOutdated,
    #[error("timed out acquiring the next surface texture")]
    Timeout,
    #[error("GPU is out of memory")]
    OutOfMemory,
    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u32 },
    #[error("draw issued without {0} bound")]
    MissingBinding(&'static str),
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Whether the render loop can simply try again on the next refresh.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, BackendError::OutOfMemory)
    }
}

/// GL-style object interface implemented by every graphics backend.
///
/// Object management calls never fail loudly: like a GL driver, a call that
/// names an unknown object is ignored (and logged by the implementation).
/// Only frame submission reports errors, because surface loss is an expected
/// runtime condition the host has to react to.
pub trait GraphicsBackend {
    fn create_shader(&mut self, stage: ShaderStage) -> ShaderId;
    /// Submits source text and compiles it. Returns the compile status.
    fn compile_shader(&mut self, shader: ShaderId, source: &str) -> bool;
    fn shader_info_log(&self, shader: ShaderId) -> String;
    fn delete_shader(&mut self, shader: ShaderId);

    fn create_program(&mut self) -> ProgramId;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);
    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId);
    /// Links the attached stages. Returns the link status.
    fn link_program(&mut self, program: ProgramId) -> bool;
    fn program_info_log(&self, program: ProgramId) -> String;
    fn delete_program(&mut self, program: ProgramId);
    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<u32>;
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> BufferId;
    /// Largest width or height `create_texture` accepts.
    fn max_texture_dimension(&self) -> u32;
    /// Uploads tightly packed RGBA8 rows as a linearly filtered 2D texture.
    fn create_texture(&mut self, rgba: &[u8], width: u32, height: u32) -> TextureId;
    fn set_texture_wrap(&mut self, texture: TextureId, wrap_x: WrapMode, wrap_y: WrapMode);

    /// Current size of the presentation surface in physical pixels.
    fn surface_size(&self) -> ViewportSize;
    fn begin_frame(&mut self) -> Result<(), BackendError>;
    fn clear(&mut self, color: [f32; 4]);
    fn use_program(&mut self, program: ProgramId);
    fn bind_vertex_buffer(&mut self, location: u32, buffer: BufferId);
    fn bind_index_buffer(&mut self, buffer: BufferId);
    fn bind_texture(&mut self, texture: TextureId);
    fn set_uniform_vec4(&mut self, location: UniformLocation, value: [f32; 4]);
    fn set_uniform_uvec2(&mut self, location: UniformLocation, value: [u32; 2]);
    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32);
    fn set_viewport(&mut self, size: ViewportSize);
    fn draw_indexed(&mut self, index_count: u32) -> Result<(), BackendError>;
    /// Submits the recorded work and presents the frame.
    fn end_frame(&mut self) -> Result<(), BackendError>;
}
