use oceanview_gpu::{
    ComponentType, FilterMode, TextureFormat, TextureStorage, VertexAttribute, WrapMode,
};

/// Rgb8 has no three-channel wgpu counterpart; it is stored as Rgba8 and
/// expanded on upload.
pub fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 | TextureFormat::Rgb8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Depth24 => wgpu::TextureFormat::Depth24Plus,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        TextureFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
    }
}

pub fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

pub fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

/// Sampler settings recorded with a texture's storage, for whoever samples it.
pub fn sampler_descriptor(storage: &TextureStorage) -> wgpu::SamplerDescriptor<'static> {
    let address_mode = address_mode(storage.wrap);
    let filter = filter_mode(storage.filter);
    wgpu::SamplerDescriptor {
        label: Some("ocean_sampler"),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: filter,
        min_filter: filter,
        ..Default::default()
    }
}

/// `None` for component counts outside 1..=4.
pub fn vertex_format(attribute: &VertexAttribute) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    let format = match (attribute.ty, attribute.components) {
        (ComponentType::Float32, 1) => F::Float32,
        (ComponentType::Float32, 2) => F::Float32x2,
        (ComponentType::Float32, 3) => F::Float32x3,
        (ComponentType::Float32, 4) => F::Float32x4,
        (ComponentType::Uint32, 1) => F::Uint32,
        (ComponentType::Uint32, 2) => F::Uint32x2,
        (ComponentType::Uint32, 3) => F::Uint32x3,
        (ComponentType::Uint32, 4) => F::Uint32x4,
        (ComponentType::Sint32, 1) => F::Sint32,
        (ComponentType::Sint32, 2) => F::Sint32x2,
        (ComponentType::Sint32, 3) => F::Sint32x3,
        (ComponentType::Sint32, 4) => F::Sint32x4,
        _ => return None,
    };
    Some(format)
}

/// Widens tightly packed RGB rows to RGBA with opaque alpha.
pub fn expand_rgb(pixels: &[u8]) -> Vec<u8> {
    pixels
        .chunks_exact(3)
        .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], u8::MAX])
        .collect()
}

pub fn color(c: oceanview_common::ClearColor) -> wgpu::Color {
    wgpu::Color {
        r: f64::from(c.r),
        g: f64::from(c.g),
        b: f64::from(c.b),
        a: f64::from(c.a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_expands_with_opaque_alpha() {
        assert_eq!(expand_rgb(&[1, 2, 3, 4, 5, 6]), vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn depth_formats_stay_depth() {
        for format in [
            TextureFormat::Depth24,
            TextureFormat::Depth32Float,
            TextureFormat::Depth24Stencil8,
        ] {
            assert!(texture_format(format).is_depth_stencil_format());
        }
        assert!(!texture_format(TextureFormat::Rgba8).is_depth_stencil_format());
    }

    #[test]
    fn sampler_follows_storage_modes() {
        let storage = TextureStorage {
            extent: oceanview_common::Extent2d::new(4, 4).unwrap(),
            format: TextureFormat::Rgba8,
            samples: 1,
            filter: FilterMode::Nearest,
            wrap: WrapMode::MirroredRepeat,
        };
        let desc = sampler_descriptor(&storage);
        assert_eq!(desc.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(desc.min_filter, wgpu::FilterMode::Nearest);
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::MirrorRepeat);
        assert_eq!(desc.address_mode_v, wgpu::AddressMode::MirrorRepeat);
    }

    #[test]
    fn vertex_formats() {
        let attr = VertexAttribute {
            index: 0,
            components: 3,
            ty: ComponentType::Float32,
            normalized: false,
            offset: 0,
        };
        assert_eq!(vertex_format(&attr), Some(wgpu::VertexFormat::Float32x3));
        assert_eq!(
            vertex_format(&VertexAttribute {
                components: 5,
                ..attr
            }),
            None
        );
    }
}
