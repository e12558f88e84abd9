use bytemuck::{Pod, Zeroable};

use crate::backend::UniformLocation;

/// CPU shadow of the `SandboxUniforms` std140 block declared by the fragment
/// prologue. Uniform locations are byte offsets into this struct.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct UniformBlock {
    pub user_param: [f32; 4],
    pub viewport_size: [u32; 2],
    pub time: f32,
    pub _padding0: f32,
}

pub(crate) const UNIFORM_BLOCK_SIZE: u64 = std::mem::size_of::<UniformBlock>() as u64;

impl UniformBlock {
    /// Copies `value` into the block at `location`.
    ///
    /// Returns `false` (leaving the block untouched) when the write would run
    /// past the end of the block.
    pub fn write(&mut self, location: UniformLocation, value: &[u8]) -> bool {
        let start = location.raw() as usize;
        let Some(end) = start.checked_add(value.len()) else {
            return false;
        };
        match bytemuck::bytes_of_mut(self).get_mut(start..end) {
            Some(target) => {
                target.copy_from_slice(value);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_std140_block() {
        assert_eq!(UNIFORM_BLOCK_SIZE, 32);
        assert_eq!(std::mem::offset_of!(UniformBlock, viewport_size), 16);
        assert_eq!(std::mem::offset_of!(UniformBlock, time), 24);
    }

    #[test]
    fn writes_land_at_offsets() {
        let mut block = UniformBlock::zeroed();
        assert!(block.write(
            UniformLocation::new(0),
            bytemuck::cast_slice(&[1.0f32, 2.0, 3.0, 4.0])
        ));
        assert!(block.write(UniformLocation::new(16), bytemuck::cast_slice(&[640u32, 480])));
        assert!(block.write(UniformLocation::new(24), bytemuck::bytes_of(&1.5f32)));
        assert_eq!(block.user_param, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(block.viewport_size, [640, 480]);
        assert_eq!(block.time, 1.5);
    }

    #[test]
    fn out_of_range_writes_are_rejected() {
        let mut block = UniformBlock::zeroed();
        assert!(!block.write(UniformLocation::new(24), &[0u8; 16]));
        assert_eq!(block, UniformBlock::zeroed());
    }
}
