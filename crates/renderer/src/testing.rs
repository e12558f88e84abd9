//! Recording backend used by the unit tests.

use std::collections::HashMap;

use crate::backend::{
    BackendError, BufferId, BufferKind, GraphicsBackend, ProgramId, ShaderId, ShaderStage,
    TextureId, UniformLocation,
};
use crate::params::ViewportSize;
use crate::texture::WrapMode;

/// Any source containing this fails to compile.
pub const COMPILE_ERROR_MARKER: &str = "#error";
/// A fragment source containing this compiles but fails to link.
pub const LINK_ERROR_MARKER: &str = "// link_error";

pub const PASSTHROUGH_FRAGMENT: &str = "\
#version 300 es
precision mediump float;
uniform vec4 userParam;
uniform uvec2 viewportSize;
uniform float time;
uniform sampler2D userTexture;
in vec2 texcoord;
out vec4 fragColor;
void main() { fragColor = texture(userTexture, texcoord) * userParam.w; }
";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    BeginFrame,
    Clear([f32; 4]),
    UseProgram(ProgramId),
    BindVertexBuffer(u32, BufferId),
    BindIndexBuffer(BufferId),
    BindTexture(TextureId),
    SetTextureWrap(TextureId, WrapMode, WrapMode),
    UniformVec4(UniformLocation, [f32; 4]),
    UniformUvec2(UniformLocation, [u32; 2]),
    UniformF32(UniformLocation, f32),
    Viewport(ViewportSize),
    DrawIndexed(u32),
    EndFrame,
}

#[derive(Debug, Clone)]
pub struct FakeShader {
    pub stage: ShaderStage,
    pub source: String,
    pub compiled: bool,
    pub log: String,
}

#[derive(Debug, Clone, Default)]
pub struct FakeProgram {
    pub attached: Vec<ShaderId>,
    pub linked_fragment: Option<String>,
    pub log: String,
}

#[derive(Debug, Clone)]
pub struct FakeTexture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub wrap: (WrapMode, WrapMode),
}

#[derive(Debug)]
pub struct FakeBackend {
    pub calls: Vec<Call>,
    pub shaders: HashMap<u32, FakeShader>,
    pub programs: HashMap<u32, FakeProgram>,
    pub buffers: HashMap<u32, (Vec<u8>, BufferKind)>,
    pub textures: HashMap<u32, FakeTexture>,
    pub surface: ViewportSize,
    /// Largest texture edge the fake device accepts.
    pub max_texture_dimension: u32,
    /// Makes every vertex stage compile fail.
    pub reject_vertex: bool,
    /// Reports empty info logs, like some drivers do.
    pub silent_logs: bool,
    /// Error returned by the next `begin_frame`, consumed once.
    pub fail_next_frame: Option<BackendError>,
    next_id: u32,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            surface: ViewportSize::new(640, 480),
            max_texture_dimension: 8192,
            reject_vertex: false,
            silent_logs: false,
            fail_next_frame: None,
            next_id: 1,
        }
    }
}

impl FakeBackend {
    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn live_shaders(&self) -> Vec<ShaderId> {
        let mut ids: Vec<_> = self.shaders.keys().copied().map(ShaderId::from_raw).collect();
        ids.sort();
        ids
    }

    pub fn live_programs(&self) -> Vec<ProgramId> {
        let mut ids: Vec<_> = self.programs.keys().copied().map(ProgramId::from_raw).collect();
        ids.sort();
        ids
    }

    /// Calls recorded between the latest `BeginFrame` and its `EndFrame`.
    pub fn last_frame(&self) -> &[Call] {
        let start = self
            .calls
            .iter()
            .rposition(|call| *call == Call::BeginFrame)
            .unwrap_or(0);
        &self.calls[start..]
    }

    fn log_or_silent(&self, log: String) -> String {
        if self.silent_logs {
            String::new()
        } else {
            log
        }
    }
}

impl GraphicsBackend for FakeBackend {
    fn create_shader(&mut self, stage: ShaderStage) -> ShaderId {
        let id = self.allocate();
        self.shaders.insert(
            id,
            FakeShader {
                stage,
                source: String::new(),
                compiled: false,
                log: String::new(),
            },
        );
        ShaderId::from_raw(id)
    }

    fn compile_shader(&mut self, shader: ShaderId, source: &str) -> bool {
        let reject_vertex = self.reject_vertex;
        let Some(entry) = self.shaders.get_mut(&shader.raw()) else {
            return false;
        };
        entry.source = source.to_string();
        let rejected = source.contains(COMPILE_ERROR_MARKER)
            || (reject_vertex && entry.stage == ShaderStage::Vertex);
        entry.compiled = !rejected;
        entry.log = if rejected {
            format!("0:1: error: {} stage rejected", entry.stage)
        } else {
            String::new()
        };
        entry.compiled
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        let log = self
            .shaders
            .get(&shader.raw())
            .map(|entry| entry.log.clone())
            .unwrap_or_default();
        self.log_or_silent(log)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader.raw());
    }

    fn create_program(&mut self) -> ProgramId {
        let id = self.allocate();
        self.programs.insert(id, FakeProgram::default());
        ProgramId::from_raw(id)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if let Some(entry) = self.programs.get_mut(&program.raw()) {
            entry.attached.push(shader);
        }
    }

    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if let Some(entry) = self.programs.get_mut(&program.raw()) {
            entry.attached.retain(|attached| *attached != shader);
        }
    }

    fn link_program(&mut self, program: ProgramId) -> bool {
        let Some(entry) = self.programs.get(&program.raw()) else {
            return false;
        };
        let fragment = entry
            .attached
            .iter()
            .filter_map(|id| self.shaders.get(&id.raw()))
            .find(|shader| shader.stage == ShaderStage::Fragment && shader.compiled)
            .map(|shader| shader.source.clone());
        let has_vertex = entry
            .attached
            .iter()
            .filter_map(|id| self.shaders.get(&id.raw()))
            .any(|shader| shader.stage == ShaderStage::Vertex && shader.compiled);

        let (linked, log) = match fragment {
            Some(source) if has_vertex && !source.contains(LINK_ERROR_MARKER) => {
                (Some(source), String::new())
            }
            Some(_) if has_vertex => (None, "error: link failed: varying mismatch".to_string()),
            _ => (None, "error: link failed: missing stage".to_string()),
        };
        let ok = linked.is_some();
        if let Some(entry) = self.programs.get_mut(&program.raw()) {
            entry.linked_fragment = linked;
            entry.log = log;
        }
        ok
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        let log = self
            .programs
            .get(&program.raw())
            .map(|entry| entry.log.clone())
            .unwrap_or_default();
        self.log_or_silent(log)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program.raw());
    }

    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs
            .get(&program.raw())?
            .linked_fragment
            .as_ref()?;
        match name {
            "a_position" => Some(0),
            "a_texcoord" => Some(1),
            _ => None,
        }
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let source = self.programs.get(&program.raw())?.linked_fragment.as_ref()?;
        if !source.contains(name) {
            return None;
        }
        let offset = match name {
            "userParam" => 0,
            "viewportSize" => 16,
            "time" => 24,
            _ => return None,
        };
        Some(UniformLocation::new(offset))
    }

    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> BufferId {
        let id = self.allocate();
        self.buffers.insert(id, (contents.to_vec(), kind));
        BufferId::from_raw(id)
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_texture_dimension
    }

    fn create_texture(&mut self, rgba: &[u8], width: u32, height: u32) -> TextureId {
        assert!(
            width <= self.max_texture_dimension && height <= self.max_texture_dimension,
            "texture {width}x{height} exceeds the device limit"
        );
        let id = self.allocate();
        self.textures.insert(
            id,
            FakeTexture {
                width,
                height,
                pixels: rgba.to_vec(),
                wrap: (WrapMode::Repeat, WrapMode::Repeat),
            },
        );
        TextureId::from_raw(id)
    }

    fn set_texture_wrap(&mut self, texture: TextureId, wrap_x: WrapMode, wrap_y: WrapMode) {
        self.calls.push(Call::SetTextureWrap(texture, wrap_x, wrap_y));
        if let Some(entry) = self.textures.get_mut(&texture.raw()) {
            entry.wrap = (wrap_x, wrap_y);
        }
    }

    fn surface_size(&self) -> ViewportSize {
        self.surface
    }

    fn begin_frame(&mut self) -> Result<(), BackendError> {
        if let Some(err) = self.fail_next_frame.take() {
            return Err(err);
        }
        self.calls.push(Call::BeginFrame);
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.calls.push(Call::Clear(color));
    }

    fn use_program(&mut self, program: ProgramId) {
        self.calls.push(Call::UseProgram(program));
    }

    fn bind_vertex_buffer(&mut self, location: u32, buffer: BufferId) {
        self.calls.push(Call::BindVertexBuffer(location, buffer));
    }

    fn bind_index_buffer(&mut self, buffer: BufferId) {
        self.calls.push(Call::BindIndexBuffer(buffer));
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.calls.push(Call::BindTexture(texture));
    }

    fn set_uniform_vec4(&mut self, location: UniformLocation, value: [f32; 4]) {
        self.calls.push(Call::UniformVec4(location, value));
    }

    fn set_uniform_uvec2(&mut self, location: UniformLocation, value: [u32; 2]) {
        self.calls.push(Call::UniformUvec2(location, value));
    }

    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32) {
        self.calls.push(Call::UniformF32(location, value));
    }

    fn set_viewport(&mut self, size: ViewportSize) {
        self.calls.push(Call::Viewport(size));
    }

    fn draw_indexed(&mut self, index_count: u32) -> Result<(), BackendError> {
        self.calls.push(Call::DrawIndexed(index_count));
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        self.calls.push(Call::EndFrame);
        Ok(())
    }
}
