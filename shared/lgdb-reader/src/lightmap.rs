use byteorder::{ByteOrder, LittleEndian};
use texture_atlas::RgbaU8Image;

/// Storage format of one lightmap texel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    /// One intensity byte.
    Gray8,
    /// Little-endian 16-bit word with three 5-bit channels.
    Rgb555,
    /// Little-endian 32-bit word with four 8-bit channels.
    Rgba8888,
}

impl TexelFormat {
    pub fn bytes_per_texel(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb555 => 2,
            Self::Rgba8888 => 4,
        }
    }
}

/// Which packed channel field is red. `Rgb` puts red in the lowest bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ChannelOrder {
    fn apply(self, [r, g, b, a]: [f32; 4]) -> [f32; 4] {
        match self {
            Self::Rgb => [r, g, b, a],
            Self::Bgr => [b, g, r, a],
        }
    }
}

/// Decodes one texel to normalized RGBA.
///
/// # Panics
///
/// Panics if `raw` is shorter than `format.bytes_per_texel()`.
pub fn decode_texel(raw: &[u8], format: TexelFormat) -> [f32; 4] {
    decode_texel_with_order(raw, format, ChannelOrder::Rgb)
}

pub fn decode_texel_with_order(raw: &[u8], format: TexelFormat, order: ChannelOrder) -> [f32; 4] {
    match format {
        TexelFormat::Gray8 => {
            let v = raw[0] as f32 / 255.0;
            [v, v, v, 1.0]
        }
        TexelFormat::Rgb555 => {
            let v = LittleEndian::read_u16(raw);
            let channel = |shift: u16| ((v >> shift) & 31) as f32 / 32.0;
            order.apply([channel(0), channel(5), channel(10), 1.0])
        }
        TexelFormat::Rgba8888 => {
            let v = LittleEndian::read_u32(raw);
            let channel = |shift: u32| ((v >> shift) & 255) as f32 / 255.0;
            order.apply([channel(0), channel(8), channel(16), channel(24)])
        }
    }
}

/// A decoded lightmap: the static layer followed by one layer per animated light in the
/// polygon's bitmask. Texels are row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Lightmap {
    width: usize,
    height: usize,
    layers: Vec<Vec<[f32; 4]>>,
}

impl Lightmap {
    /// Decodes `layer_count` consecutive `width` x `height` layers from `raw`.
    ///
    /// # Panics
    ///
    /// Panics if `raw` is not exactly the size of the declared layers.
    pub fn decode(
        raw: &[u8],
        width: usize,
        height: usize,
        layer_count: usize,
        format: TexelFormat,
        order: ChannelOrder,
    ) -> Self {
        let texel_bytes = format.bytes_per_texel();
        let layer_bytes = width * height * texel_bytes;
        assert_eq!(raw.len(), layer_count * layer_bytes);

        let layers = (0..layer_count)
            .map(|layer| {
                raw[layer * layer_bytes..(layer + 1) * layer_bytes]
                    .chunks_exact(texel_bytes)
                    .map(|texel| decode_texel_with_order(texel, format, order))
                    .collect()
            })
            .collect();
        Self {
            width,
            height,
            layers,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, index: usize) -> &[[f32; 4]] {
        &self.layers[index]
    }

    pub fn texel(&self, layer: usize, x: usize, y: usize) -> [f32; 4] {
        self.layers[layer][self.width * y + x]
    }

    /// The static layer quantized to 8 bits per channel.
    pub fn to_rgba8(&self) -> RgbaU8Image {
        let data = self.layers[0]
            .iter()
            .flat_map(|texel| {
                texel.map(|c| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8)
            })
            .collect();
        RgbaU8Image::new(self.width, self.height, data)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::{decode_texel, decode_texel_with_order, ChannelOrder, Lightmap, TexelFormat};

    #[test]
    fn gray8() {
        let [r, g, b, a] = decode_texel(&[128], TexelFormat::Gray8);
        for c in [r, g, b] {
            assert_abs_diff_eq!(c, 0.502, epsilon = 1.0 / 255.0);
        }
        assert_eq!(a, 1.0);
    }

    #[test]
    fn rgb555() {
        let [r, g, b, a] = decode_texel(&0x7fffu16.to_le_bytes(), TexelFormat::Rgb555);
        for c in [r, g, b] {
            assert_abs_diff_eq!(c, 31.0 / 32.0);
        }
        assert_eq!(a, 1.0);

        // Red is the low field.
        let [r, g, b, _] = decode_texel(&0x001fu16.to_le_bytes(), TexelFormat::Rgb555);
        assert_eq!([r, g, b], [31.0 / 32.0, 0.0, 0.0]);
    }

    #[test]
    fn rgba8888() {
        assert_eq!(
            decode_texel(&0x01020304u32.to_le_bytes(), TexelFormat::Rgba8888),
            [4.0 / 255.0, 3.0 / 255.0, 2.0 / 255.0, 1.0 / 255.0],
        );
    }

    #[test]
    fn bgr_order_swaps_red_and_blue() {
        assert_eq!(
            decode_texel_with_order(
                &0x01020304u32.to_le_bytes(),
                TexelFormat::Rgba8888,
                ChannelOrder::Bgr,
            ),
            [2.0 / 255.0, 3.0 / 255.0, 4.0 / 255.0, 1.0 / 255.0],
        );
    }

    #[test]
    fn decodes_layers_in_order() {
        let raw = [0, 255, 255, 0, 10, 20, 30, 40];
        let lightmap = Lightmap::decode(&raw, 2, 2, 2, TexelFormat::Gray8, ChannelOrder::Rgb);
        assert_eq!(lightmap.layer_count(), 2);
        assert_eq!(lightmap.texel(0, 1, 0), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(lightmap.texel(0, 1, 1), [0.0, 0.0, 0.0, 1.0]);
        assert_abs_diff_eq!(lightmap.texel(1, 0, 1)[0], 30.0 / 255.0);

        let image = lightmap.to_rgba8();
        assert_eq!(image.texel(1, 0), [255, 255, 255, 255]);
        assert_eq!(image.texel(0, 0), [0, 0, 0, 255]);
    }

    #[quickcheck]
    fn every_format_decodes_into_unit_range(raw: u32) -> bool {
        let bytes = raw.to_le_bytes();
        [TexelFormat::Gray8, TexelFormat::Rgb555, TexelFormat::Rgba8888]
            .into_iter()
            .all(|format| {
                decode_texel(&bytes, format)
                    .iter()
                    .all(|c| (0.0..=1.0).contains(c))
            })
    }
}
