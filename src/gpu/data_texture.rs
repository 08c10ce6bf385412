//! Float textures that carry particle data.
//!
//! Both the state buffer and the history atlas are `Rgba32Float`: xyz is a
//! position, w is life. Compute passes read them with `textureLoad` and write
//! them through a write-only storage binding, so they are never filtered.

use glam::Vec4;
use wgpu::util::DeviceExt;

/// Texel format of every particle data texture.
pub const DATA_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Bytes per `Rgba32Float` texel.
pub const TEXEL_SIZE: u32 = 16;

const DATA_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::STORAGE_BINDING)
    .union(wgpu::TextureUsages::COPY_DST)
    .union(wgpu::TextureUsages::COPY_SRC);

/// A 2D `Rgba32Float` texture and its default view.
#[derive(Debug)]
pub struct DataTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl DataTexture {
    /// A zero-filled texture.
    pub fn new(device: &wgpu::Device, label: &str, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&descriptor(label, width, height));
        Self::from_texture(texture, width, height)
    }

    /// A texture initialized from row-major texels.
    pub fn with_data(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        texels: &[Vec4],
    ) -> Self {
        debug_assert_eq!(texels.len(), (width * height) as usize);
        let texture = device.create_texture_with_data(
            queue,
            &descriptor(label, width, height),
            wgpu::util::TextureDataOrder::LayerMajor,
            bytemuck::cast_slice(texels),
        );
        Self::from_texture(texture, width, height)
    }

    fn from_texture(texture: wgpu::Texture, width: u32, height: u32) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    /// Overwrite the whole texture.
    pub fn write(&self, queue: &wgpu::Queue, texels: &[Vec4]) {
        debug_assert_eq!(texels.len(), (self.width * self.height) as usize);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row(self.width)),
                rows_per_image: Some(self.height),
            },
            extent(self.width, self.height),
        );
    }

    pub fn size_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * TEXEL_SIZE as u64
    }
}

pub fn bytes_per_row(width: u32) -> u32 {
    width * TEXEL_SIZE
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn descriptor(label: &str, width: u32, height: u32) -> wgpu::TextureDescriptor<'_> {
    wgpu::TextureDescriptor {
        label: Some(label),
        size: extent(width, height),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DATA_FORMAT,
        usage: DATA_USAGE,
        view_formats: &[],
    }
}

/// Layout entry for a data texture read with `textureLoad`.
pub fn sampled_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Layout entry for a write-only data texture in a compute pass.
pub fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: DATA_FORMAT,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

/// Layout entry for a uniform buffer.
pub fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_row() {
        assert_eq!(bytes_per_row(16), 256);
        assert_eq!(bytes_per_row(1), 16);
    }

    #[test]
    fn test_usage_covers_compute_and_render() {
        assert!(DATA_USAGE.contains(wgpu::TextureUsages::STORAGE_BINDING));
        assert!(DATA_USAGE.contains(wgpu::TextureUsages::TEXTURE_BINDING));
        assert!(DATA_USAGE.contains(wgpu::TextureUsages::COPY_DST));
    }

    #[test]
    fn test_layout_entries() {
        let entry = sampled_entry(1, wgpu::ShaderStages::VERTEX);
        assert!(matches!(
            entry.ty,
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                ..
            }
        ));
        match storage_entry(2).ty {
            wgpu::BindingType::StorageTexture { access, format, .. } => {
                assert_eq!(access, wgpu::StorageTextureAccess::WriteOnly);
                assert_eq!(format, DATA_FORMAT);
            }
            other => panic!("unexpected binding type {other:?}"),
        }
    }
}
