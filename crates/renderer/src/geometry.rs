use crate::backend::{BufferId, BufferKind, GraphicsBackend};
use crate::pipeline::AttributeLocations;

/// Clip-space corners: top-left, top-right, bottom-left, bottom-right.
pub const QUAD_POSITIONS: [[f32; 2]; 4] = [[-1.0, 1.0], [1.0, 1.0], [-1.0, -1.0], [1.0, -1.0]];

/// Texture coordinates with `(0, 0)` at the bottom-left corner, matching the
/// bottom-up row order images are uploaded in.
pub const QUAD_TEX_COORDS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0]];

/// Two triangles covering the quad.
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 1, 2, 3];

pub const QUAD_INDEX_COUNT: u32 = QUAD_INDICES.len() as u32;

/// Static full-screen quad uploaded once at startup.
#[derive(Debug, Clone, Copy)]
pub struct GeometryBuffers {
    positions: BufferId,
    tex_coords: BufferId,
    indices: BufferId,
}

impl GeometryBuffers {
    pub fn upload<B: GraphicsBackend>(backend: &mut B) -> Self {
        let positions =
            backend.create_buffer(BufferKind::Vertex, bytemuck::cast_slice(&QUAD_POSITIONS));
        let tex_coords =
            backend.create_buffer(BufferKind::Vertex, bytemuck::cast_slice(&QUAD_TEX_COORDS));
        let indices = backend.create_buffer(BufferKind::Index, bytemuck::cast_slice(&QUAD_INDICES));
        Self {
            positions,
            tex_coords,
            indices,
        }
    }

    /// Binds the quad's buffers at the attribute locations of the program in use.
    ///
    /// Attributes the program does not declare are skipped.
    pub fn bind<B: GraphicsBackend>(&self, backend: &mut B, attributes: &AttributeLocations) {
        if let Some(location) = attributes.position {
            backend.bind_vertex_buffer(location, self.positions);
        }
        if let Some(location) = attributes.tex_coord {
            backend.bind_vertex_buffer(location, self.tex_coords);
        }
        backend.bind_index_buffer(self.indices);
    }

    pub fn index_count(&self) -> u32 {
        QUAD_INDEX_COUNT
    }
}
