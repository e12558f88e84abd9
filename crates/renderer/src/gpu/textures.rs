use std::collections::HashMap;

use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::texture::WrapMode;

pub(crate) fn address_mode(mode: WrapMode) -> wgpu::AddressMode {
    match mode {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

/// One sampler per wrap-mode pair, created on first use.
#[derive(Default)]
pub(crate) struct SamplerCache {
    samplers: HashMap<(WrapMode, WrapMode), wgpu::Sampler>,
}

impl SamplerCache {
    pub fn get(&mut self, device: &wgpu::Device, wrap: (WrapMode, WrapMode)) -> wgpu::Sampler {
        self.samplers
            .entry(wrap)
            .or_insert_with(|| {
                tracing::debug!(wrap_x = %wrap.0, wrap_y = %wrap.1, "creating sampler");
                device.create_sampler(&wgpu::SamplerDescriptor {
                    label: Some("sandbox image sampler"),
                    address_mode_u: address_mode(wrap.0),
                    address_mode_v: address_mode(wrap.1),
                    address_mode_w: wgpu::AddressMode::ClampToEdge,
                    mag_filter: wgpu::FilterMode::Linear,
                    min_filter: wgpu::FilterMode::Linear,
                    mipmap_filter: wgpu::FilterMode::Nearest,
                    ..Default::default()
                })
            })
            .clone()
    }
}

pub(crate) fn create_texture_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("sandbox image layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// GPU side of a texture object. The bind group is rebuilt only when the
/// wrap pair changes.
pub(crate) struct ImageTexture {
    pub _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub wrap: (WrapMode, WrapMode),
    pub bind_group: wgpu::BindGroup,
}

impl ImageTexture {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        samplers: &mut SamplerCache,
        rgba: &[u8],
        width: u32,
        height: u32,
    ) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("sandbox image"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            rgba,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let wrap = (WrapMode::default(), WrapMode::default());
        let bind_group = bind_image(device, layout, &view, &samplers.get(device, wrap));
        Self {
            _texture: texture,
            view,
            wrap,
            bind_group,
        }
    }

    pub fn set_wrap(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        samplers: &mut SamplerCache,
        wrap: (WrapMode, WrapMode),
    ) {
        if self.wrap == wrap {
            return;
        }
        self.bind_group = bind_image(device, layout, &self.view, &samplers.get(device, wrap));
        self.wrap = wrap;
    }
}

fn bind_image(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("sandbox image bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}
