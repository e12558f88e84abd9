//! wgpu implementation of [`GraphicsBackend`](crate::backend::GraphicsBackend).
//!
//! - `context` owns instance/device/surface wiring and reconfigures the
//!   swapchain on resize or surface loss.
//! - `textures` creates the image texture and caches one sampler per wrap pair.
//! - `uniforms` is the CPU shadow of the std140 block the fragment prologue
//!   declares.
//! - `backend` emulates GL-style shader/program objects on top of render
//!   pipelines and records each frame into a single render pass.

mod backend;
mod context;
mod textures;
mod uniforms;

pub use backend::{WgpuBackend, WgpuBackendOptions};
