//! Renderer crate for fragbox, an interactive fragment-shader sandbox.
//!
//! A full-screen quad is drawn every display refresh with a user-supplied
//! fragment shader, one image texture, and three live uniforms. The flow is:
//!
//! ```text
//!   keyboard / stdin / file watcher
//!          │ SandboxMessage (EventLoopProxy)
//!          ▼
//!   WindowHost ──▶ Sandbox ──▶ RenderLoop::tick ──▶ GraphicsBackend
//!                    │                                   │
//!                    └─ ShaderPipeline (compile/link)    └─ WgpuBackend
//! ```
//!
//! Everything above [`backend::GraphicsBackend`] is independent of the GPU
//! API, which is what lets the tests drive the sandbox headlessly.

pub mod backend;
pub mod compile;
pub mod geometry;
pub mod gpu;
pub mod params;
pub mod pipeline;
pub mod render_loop;
pub mod runtime;
pub mod sandbox;
pub mod texture;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{BackendError, GraphicsBackend};
pub use compile::{check_fragment, ShaderCompiler};
pub use gpu::{WgpuBackend, WgpuBackendOptions};
pub use params::{ParameterAxis, ParameterVector, ViewportSize};
pub use pipeline::{CompileStatus, PipelineError};
pub use render_loop::{FrameReport, FrameRequester, RenderLoop, StopHandle};
pub use sandbox::{Sandbox, SandboxError, SandboxInit, SandboxMessage, StatusReport};
pub use texture::{TextureAxis, WrapMode};
pub use window::{HostEvent, HostHandle, WindowConfig, WindowHost};
