use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::texture::{PixelFormat, TextureResource};

/// A sampled texture as wgpu sees it: the view plus the sampler paired with it.
pub(crate) struct GpuTexture {
    pub _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
    }
}

fn linear_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

fn create_with_data(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    data: &[u8],
) -> GpuTexture {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        data,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        _texture: texture,
        view,
        sampler: linear_sampler(device),
    }
}

/// Uploads texels with a tight row pitch; any width is accepted.
pub(crate) fn upload(device: &wgpu::Device, queue: &wgpu::Queue, texture: &TextureResource) -> GpuTexture {
    create_with_data(
        device,
        queue,
        texture.label(),
        texture.width(),
        texture.height(),
        texture_format(texture.format()),
        texture.pixels(),
    )
}

/// Opaque white 1x1 texture bound to sampler inputs that have no unit yet.
pub(crate) fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> GpuTexture {
    create_with_data(
        device,
        queue,
        "placeholder texture",
        1,
        1,
        wgpu::TextureFormat::Rgba8Unorm,
        &[255, 255, 255, 255],
    )
}
