use std::fmt;

use log::debug;

use crate::container::{Chunk, ContainerFile, Version};
use crate::error::{Error, Result};
use crate::lightmap::TexelFormat;

/// The three world geometry chunk flavors. They differ in header and render polygon layout and
/// in lightmap texel width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorldVariant {
    /// "WR": 8-bit grayscale lightmaps.
    Standard,
    /// "WRRGB": 16-bit 5:5:5 lightmaps.
    Rgb,
    /// "WREXT": extended header and render polygons, 16- or 32-bit lightmaps.
    Extended,
}

impl WorldVariant {
    /// Lookup order when a container holds more than one flavor.
    pub const PRECEDENCE: [Self; 3] = [Self::Standard, Self::Rgb, Self::Extended];

    pub fn chunk_name(self) -> &'static str {
        match self {
            Self::Standard => "WR",
            Self::Rgb => "WRRGB",
            Self::Extended => "WREXT",
        }
    }

    pub fn required_version(self) -> Version {
        match self {
            Self::Standard => Version::new(0, 23),
            Self::Rgb => Version::new(0, 24),
            Self::Extended => Version::new(0, 30),
        }
    }

    pub fn is_extended(self) -> bool {
        self == Self::Extended
    }

    /// `lightmap_format` is the extended header field and is ignored by the other variants.
    pub fn texel_format(self, lightmap_format: u32) -> TexelFormat {
        match self {
            Self::Standard => TexelFormat::Gray8,
            Self::Rgb => TexelFormat::Rgb555,
            Self::Extended if lightmap_format != 0 => TexelFormat::Rgba8888,
            Self::Extended => TexelFormat::Rgb555,
        }
    }

    pub fn params(self, lightmap_format: u32) -> DecodeParams {
        DecodeParams {
            extended: self.is_extended(),
            texel_format: self.texel_format(lightmap_format),
        }
    }
}

impl fmt::Display for WorldVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.chunk_name())
    }
}

/// Layout switches every record decoder takes explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeParams {
    pub extended: bool,
    pub texel_format: TexelFormat,
}

pub struct SelectedChunk<'a> {
    pub variant: WorldVariant,
    pub params: DecodeParams,
    pub chunk: Chunk<'a>,
}

/// Finds the world geometry chunk, checks its version and derives the decode parameters.
pub fn select_world_chunk(container: &ContainerFile) -> Result<SelectedChunk<'_>> {
    for variant in WorldVariant::PRECEDENCE {
        let chunk = match container.chunk(variant.chunk_name())? {
            Some(chunk) => chunk,
            None => continue,
        };

        let expected = variant.required_version();
        if chunk.version() != expected {
            return Err(Error::UnsupportedVersion {
                name: variant.chunk_name().to_string(),
                found: chunk.version(),
                expected,
            });
        }

        let lightmap_format = if variant.is_extended() {
            // The format field follows 12 reserved bytes at the start of the extended header.
            let mut r = chunk.reader();
            r.skip(12)?;
            r.u32()?
        } else {
            0
        };
        let params = variant.params(lightmap_format);
        debug!(
            "selected world chunk {} v{} ({:?} lightmaps)",
            variant, expected, params.texel_format,
        );

        return Ok(SelectedChunk {
            variant,
            params,
            chunk,
        });
    }
    Err(Error::ChunkNotFound)
}
