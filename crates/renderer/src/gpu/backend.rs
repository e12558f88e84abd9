use std::borrow::Cow;
use std::collections::HashMap;

use anyhow::Result;
use bytemuck::Zeroable;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::naga;
use wgpu::util::DeviceExt;

use crate::backend::{
    BackendError, BufferId, BufferKind, GraphicsBackend, ProgramId, ShaderId, ShaderStage,
    TextureId, UniformLocation,
};
use crate::compile::{self, ShaderCompiler, StageArtifact, StageCode};
use crate::params::ViewportSize;
use crate::pipeline::{
    POSITION_ATTRIBUTE, TEX_COORD_ATTRIBUTE, TIME_UNIFORM, USER_PARAM_UNIFORM,
    VIEWPORT_SIZE_UNIFORM,
};
use crate::texture::WrapMode;

use super::context::GpuContext;
use super::textures::{create_texture_layout, ImageTexture, SamplerCache};
use super::uniforms::{UniformBlock, UNIFORM_BLOCK_SIZE};

/// Options fixed for the lifetime of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WgpuBackendOptions {
    pub vsync: bool,
    pub compiler: ShaderCompiler,
}

impl Default for WgpuBackendOptions {
    fn default() -> Self {
        Self {
            vsync: true,
            compiler: ShaderCompiler::default(),
        }
    }
}

struct ShaderObject {
    stage: ShaderStage,
    artifact: Option<StageArtifact>,
    log: String,
}

struct LinkedProgram {
    pipeline: wgpu::RenderPipeline,
    /// `(shader location, vertex buffer slot)` pairs.
    slots: Vec<(u32, u32)>,
    attributes: HashMap<&'static str, u32>,
    uniforms: HashMap<&'static str, UniformLocation>,
}

#[derive(Default)]
struct ProgramObject {
    attached: Vec<ShaderId>,
    linked: Option<LinkedProgram>,
    log: String,
}

struct BufferObject {
    buffer: wgpu::Buffer,
    kind: BufferKind,
}

/// Bindings recorded between `begin_frame` and `end_frame`.
struct FrameState {
    surface: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
    clear: Option<wgpu::Color>,
    program: Option<ProgramId>,
    vertex_buffers: HashMap<u32, BufferId>,
    index_buffer: Option<BufferId>,
    texture: Option<TextureId>,
    viewport: ViewportSize,
}

/// [`GraphicsBackend`] on top of wgpu.
///
/// Shader and program objects are emulated: compiling parses and validates
/// with naga, linking checks the stage interface and builds a
/// `wgpu::RenderPipeline` inside a validation error scope. All programs share
/// one uniform buffer mirroring [`UniformBlock`].
pub struct WgpuBackend {
    context: GpuContext,
    compiler: ShaderCompiler,
    next_id: u32,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    buffers: HashMap<u32, BufferObject>,
    textures: HashMap<u32, ImageTexture>,
    samplers: SamplerCache,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniforms: UniformBlock,
    frame: Option<FrameState>,
}

impl WgpuBackend {
    pub fn new<T>(target: &T, size: ViewportSize, options: WgpuBackendOptions) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size, options.vsync)?;
        tracing::debug!(compiler = %options.compiler, format = ?context.surface_format, "wgpu backend ready");

        let uniform_layout =
            context
                .device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("uniform layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                });
        let texture_layout = create_texture_layout(&context.device);

        let uniforms = UniformBlock::zeroed();
        let uniform_buffer =
            context
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("uniform buffer"),
                    contents: bytemuck::bytes_of(&uniforms),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniform bind group"),
                layout: &uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });
        debug_assert_eq!(uniform_buffer.size(), UNIFORM_BLOCK_SIZE);

        Ok(Self {
            context,
            compiler: options.compiler,
            next_id: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            samplers: SamplerCache::default(),
            uniform_layout,
            texture_layout,
            uniform_buffer,
            uniform_bind_group,
            uniforms,
            frame: None,
        })
    }

    pub fn resize(&mut self, size: ViewportSize) {
        self.context.resize(size);
    }

    /// Reconfigures the surface after it was reported lost or outdated.
    pub fn reconfigure(&mut self) {
        self.context.reconfigure();
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    fn link(&self, program: &ProgramObject) -> Result<LinkedProgram, String> {
        let stage = |wanted: ShaderStage| {
            program
                .attached
                .iter()
                .filter_map(|id| self.shaders.get(&id.raw()))
                .find(|shader| shader.stage == wanted)
                .and_then(|shader| shader.artifact.as_ref())
        };
        let vertex = stage(ShaderStage::Vertex)
            .ok_or_else(|| "error: no compiled vertex shader attached".to_string())?;
        let fragment = stage(ShaderStage::Fragment)
            .ok_or_else(|| "error: no compiled fragment shader attached".to_string())?;

        compile::check_stage_interface(&vertex.module, &fragment.module)?;

        let inputs = compile::vertex_inputs(&vertex.module);
        let mut formats = Vec::with_capacity(inputs.len());
        for (location, inner) in &inputs {
            let format = vertex_format(inner).ok_or_else(|| {
                format!("error: vertex input at location {location} has unsupported type {inner:?}")
            })?;
            formats.push((*location, format));
        }
        let attribute_sets: Vec<[wgpu::VertexAttribute; 1]> = formats
            .iter()
            .map(|(location, format)| {
                [wgpu::VertexAttribute {
                    format: *format,
                    offset: 0,
                    shader_location: *location,
                }]
            })
            .collect();
        let vertex_layouts: Vec<wgpu::VertexBufferLayout> = formats
            .iter()
            .zip(&attribute_sets)
            .map(|((_, format), attributes)| wgpu::VertexBufferLayout {
                array_stride: format.size(),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex_module = create_module(device, vertex);
        let fragment_module = create_module(device, fragment);
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sandbox pipeline layout"),
            bind_group_layouts: &[&self.uniform_layout, &self.texture_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sandbox pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &vertex_layouts,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.context.surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(err.to_string());
        }

        let slots = formats
            .iter()
            .enumerate()
            .map(|(slot, (location, _))| (*location, slot as u32))
            .collect();
        let attributes = [POSITION_ATTRIBUTE, TEX_COORD_ATTRIBUTE]
            .into_iter()
            .filter_map(|name| compile::reflect_attribute(vertex, name).map(|loc| (name, loc)))
            .collect();
        let uniforms = [USER_PARAM_UNIFORM, VIEWPORT_SIZE_UNIFORM, TIME_UNIFORM]
            .into_iter()
            .filter_map(|name| {
                compile::reflect_uniform(&fragment.module, name).map(|loc| (name, loc))
            })
            .collect();

        Ok(LinkedProgram {
            pipeline,
            slots,
            attributes,
            uniforms,
        })
    }

    fn linked(&self, program: ProgramId) -> Option<&LinkedProgram> {
        self.programs.get(&program.raw())?.linked.as_ref()
    }

    fn record_draw(&mut self, index_count: u32) -> Result<(), BackendError> {
        let frame = self
            .frame
            .as_mut()
            .ok_or_else(|| BackendError::Other("draw issued outside a frame".to_string()))?;
        let program_id = frame
            .program
            .ok_or(BackendError::MissingBinding("program"))?;
        let linked = self
            .programs
            .get(&program_id.raw())
            .and_then(|program| program.linked.as_ref())
            .ok_or(BackendError::UnknownHandle {
                kind: "program",
                id: program_id.raw(),
            })?;
        let texture_id = frame
            .texture
            .ok_or(BackendError::MissingBinding("texture"))?;
        let texture = self
            .textures
            .get(&texture_id.raw())
            .ok_or(BackendError::UnknownHandle {
                kind: "texture",
                id: texture_id.raw(),
            })?;
        let index_id = frame
            .index_buffer
            .ok_or(BackendError::MissingBinding("index buffer"))?;
        let index_buffer = lookup_buffer(&self.buffers, index_id, BufferKind::Index)?;
        let mut vertex_buffers = Vec::with_capacity(linked.slots.len());
        for (location, slot) in &linked.slots {
            let id = frame
                .vertex_buffers
                .get(location)
                .ok_or(BackendError::MissingBinding("vertex buffer"))?;
            vertex_buffers.push((*slot, lookup_buffer(&self.buffers, *id, BufferKind::Vertex)?));
        }

        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));

        let load = match frame.clear.take() {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };
        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("sandbox pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        let viewport = frame.viewport;
        if !viewport.is_empty() {
            pass.set_viewport(
                0.0,
                0.0,
                viewport.width as f32,
                viewport.height as f32,
                0.0,
                1.0,
            );
        }
        pass.set_pipeline(&linked.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, &texture.bind_group, &[]);
        for (slot, buffer) in vertex_buffers {
            pass.set_vertex_buffer(slot, buffer.slice(..));
        }
        pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..index_count, 0, 0..1);
        Ok(())
    }

    fn write_uniform(&mut self, location: UniformLocation, bytes: &[u8]) {
        if !self.uniforms.write(location, bytes) {
            tracing::warn!(offset = location.raw(), len = bytes.len(), "uniform write out of range");
        }
    }
}

fn lookup_buffer(
    buffers: &HashMap<u32, BufferObject>,
    id: BufferId,
    kind: BufferKind,
) -> Result<&wgpu::Buffer, BackendError> {
    match buffers.get(&id.raw()) {
        Some(object) if object.kind == kind => Ok(&object.buffer),
        _ => Err(BackendError::UnknownHandle {
            kind: "buffer",
            id: id.raw(),
        }),
    }
}

fn create_module(device: &wgpu::Device, artifact: &StageArtifact) -> wgpu::ShaderModule {
    let (label, stage) = match artifact.stage {
        ShaderStage::Vertex => ("sandbox vertex", naga::ShaderStage::Vertex),
        ShaderStage::Fragment => ("sandbox fragment", naga::ShaderStage::Fragment),
    };
    let source = match &artifact.code {
        StageCode::Glsl(code) => wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(code.clone()),
            stage,
            defines: &[],
        },
        StageCode::SpirV(words) => wgpu::ShaderSource::SpirV(Cow::Owned(words.clone())),
    };
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source,
    })
}

fn vertex_format(inner: &naga::TypeInner) -> Option<wgpu::VertexFormat> {
    match inner {
        naga::TypeInner::Scalar(scalar) if *scalar == naga::Scalar::F32 => {
            Some(wgpu::VertexFormat::Float32)
        }
        naga::TypeInner::Vector { size, scalar } if *scalar == naga::Scalar::F32 => Some(match size {
            naga::VectorSize::Bi => wgpu::VertexFormat::Float32x2,
            naga::VectorSize::Tri => wgpu::VertexFormat::Float32x3,
            naga::VectorSize::Quad => wgpu::VertexFormat::Float32x4,
        }),
        _ => None,
    }
}

fn surface_error(err: wgpu::SurfaceError) -> BackendError {
    match err {
        wgpu::SurfaceError::Lost => BackendError::SurfaceLost,
        wgpu::SurfaceError::Outdated => BackendError::SurfaceOutdated,
        wgpu::SurfaceError::Timeout => BackendError::Timeout,
        wgpu::SurfaceError::OutOfMemory => BackendError::OutOfMemory,
        wgpu::SurfaceError::Other => BackendError::Other("surface error".to_string()),
    }
}

impl GraphicsBackend for WgpuBackend {
    fn create_shader(&mut self, stage: ShaderStage) -> ShaderId {
        let id = self.allocate();
        self.shaders.insert(
            id,
            ShaderObject {
                stage,
                artifact: None,
                log: String::new(),
            },
        );
        ShaderId::from_raw(id)
    }

    fn compile_shader(&mut self, shader: ShaderId, source: &str) -> bool {
        let compiler = self.compiler;
        let Some(object) = self.shaders.get_mut(&shader.raw()) else {
            tracing::warn!(%shader, "compile on unknown shader");
            return false;
        };
        match compile::compile_stage(compiler, object.stage, source) {
            Ok(artifact) => {
                object.artifact = Some(artifact);
                object.log.clear();
                true
            }
            Err(log) => {
                object.artifact = None;
                object.log = log;
                false
            }
        }
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        self.shaders
            .get(&shader.raw())
            .map(|object| object.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader.raw());
    }

    fn create_program(&mut self) -> ProgramId {
        let id = self.allocate();
        self.programs.insert(id, ProgramObject::default());
        ProgramId::from_raw(id)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        match self.programs.get_mut(&program.raw()) {
            Some(object) if !object.attached.contains(&shader) => object.attached.push(shader),
            Some(_) => {}
            None => tracing::warn!(%program, %shader, "attach to unknown program"),
        }
    }

    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if let Some(object) = self.programs.get_mut(&program.raw()) {
            object.attached.retain(|attached| *attached != shader);
        }
    }

    fn link_program(&mut self, program: ProgramId) -> bool {
        let Some(object) = self.programs.get(&program.raw()) else {
            tracing::warn!(%program, "link of unknown program");
            return false;
        };
        let result = self.link(object);
        let Some(object) = self.programs.get_mut(&program.raw()) else {
            return false;
        };
        match result {
            Ok(linked) => {
                object.linked = Some(linked);
                object.log.clear();
                true
            }
            Err(log) => {
                object.linked = None;
                object.log = log;
                false
            }
        }
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        self.programs
            .get(&program.raw())
            .map(|object| object.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program.raw());
    }

    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.linked(program)?.attributes.get(name).copied()
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.linked(program)?.uniforms.get(name).copied()
    }

    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> BufferId {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self
            .context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(match kind {
                    BufferKind::Vertex => "vertex buffer",
                    BufferKind::Index => "index buffer",
                }),
                contents,
                usage,
            });
        let id = self.allocate();
        self.buffers.insert(id, BufferObject { buffer, kind });
        BufferId::from_raw(id)
    }

    fn max_texture_dimension(&self) -> u32 {
        self.context.device.limits().max_texture_dimension_2d
    }

    fn create_texture(&mut self, rgba: &[u8], width: u32, height: u32) -> TextureId {
        let texture = ImageTexture::new(
            &self.context.device,
            &self.context.queue,
            &self.texture_layout,
            &mut self.samplers,
            rgba,
            width,
            height,
        );
        let id = self.allocate();
        self.textures.insert(id, texture);
        TextureId::from_raw(id)
    }

    fn set_texture_wrap(&mut self, texture: TextureId, wrap_x: WrapMode, wrap_y: WrapMode) {
        match self.textures.get_mut(&texture.raw()) {
            Some(object) => object.set_wrap(
                &self.context.device,
                &self.texture_layout,
                &mut self.samplers,
                (wrap_x, wrap_y),
            ),
            None => tracing::warn!(%texture, "wrap mode on unknown texture"),
        }
    }

    fn surface_size(&self) -> ViewportSize {
        self.context.size
    }

    fn begin_frame(&mut self) -> Result<(), BackendError> {
        if self.frame.take().is_some() {
            tracing::warn!("previous frame was never ended; discarding it");
        }
        let surface = self
            .context
            .surface
            .get_current_texture()
            .map_err(surface_error)?;
        let view = surface
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sandbox encoder"),
            });
        self.frame = Some(FrameState {
            surface,
            view,
            encoder,
            clear: None,
            program: None,
            vertex_buffers: HashMap::new(),
            index_buffer: None,
            texture: None,
            viewport: self.context.size,
        });
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) {
        if let Some(frame) = self.frame.as_mut() {
            let [r, g, b, a] = color.map(f64::from);
            frame.clear = Some(wgpu::Color { r, g, b, a });
        }
    }

    fn use_program(&mut self, program: ProgramId) {
        if let Some(frame) = self.frame.as_mut() {
            frame.program = Some(program);
        }
    }

    fn bind_vertex_buffer(&mut self, location: u32, buffer: BufferId) {
        if let Some(frame) = self.frame.as_mut() {
            frame.vertex_buffers.insert(location, buffer);
        }
    }

    fn bind_index_buffer(&mut self, buffer: BufferId) {
        if let Some(frame) = self.frame.as_mut() {
            frame.index_buffer = Some(buffer);
        }
    }

    fn bind_texture(&mut self, texture: TextureId) {
        if let Some(frame) = self.frame.as_mut() {
            frame.texture = Some(texture);
        }
    }

    fn set_uniform_vec4(&mut self, location: UniformLocation, value: [f32; 4]) {
        self.write_uniform(location, bytemuck::cast_slice(&value));
    }

    fn set_uniform_uvec2(&mut self, location: UniformLocation, value: [u32; 2]) {
        self.write_uniform(location, bytemuck::cast_slice(&value));
    }

    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32) {
        self.write_uniform(location, bytemuck::bytes_of(&value));
    }

    fn set_viewport(&mut self, size: ViewportSize) {
        if let Some(frame) = self.frame.as_mut() {
            frame.viewport = size;
        }
    }

    fn draw_indexed(&mut self, index_count: u32) -> Result<(), BackendError> {
        self.record_draw(index_count)
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        let Some(mut frame) = self.frame.take() else {
            return Err(BackendError::Other("end_frame without begin_frame".to_string()));
        };
        if let Some(color) = frame.clear.take() {
            // Nothing was drawn; still honour the clear.
            frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
        }
        self.context
            .queue
            .submit(std::iter::once(frame.encoder.finish()));
        frame.surface.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_formats_follow_float_vectors() {
        let vec2 = naga::TypeInner::Vector {
            size: naga::VectorSize::Bi,
            scalar: naga::Scalar::F32,
        };
        let ivec2 = naga::TypeInner::Vector {
            size: naga::VectorSize::Bi,
            scalar: naga::Scalar::I32,
        };
        assert_eq!(vertex_format(&vec2), Some(wgpu::VertexFormat::Float32x2));
        assert_eq!(vertex_format(&ivec2), None);
        assert_eq!(
            vertex_format(&naga::TypeInner::Scalar(naga::Scalar::F32)),
            Some(wgpu::VertexFormat::Float32)
        );
    }

    #[test]
    fn surface_errors_map_to_backend_errors() {
        assert_eq!(surface_error(wgpu::SurfaceError::Lost), BackendError::SurfaceLost);
        assert_eq!(
            surface_error(wgpu::SurfaceError::OutOfMemory),
            BackendError::OutOfMemory
        );
        assert!(surface_error(wgpu::SurfaceError::Timeout).is_recoverable());
    }
}
