#[cfg(test)]
#[macro_use]
extern crate quickcheck_macros;

use std::path::Path;

pub mod atlas;
pub mod cell;
pub mod container;
mod error;
pub mod lightmap;
pub mod manager;
pub mod mesh;
pub mod reader;
#[cfg(test)]
mod testing;
pub mod uv;
pub mod variant;
pub mod world;

pub use crate::container::{Chunk, ContainerFile, Version};
pub use crate::error::{Error, Result};
pub use crate::lightmap::ChannelOrder;
pub use crate::manager::{LoadedWorld, WorldSlot};
pub use crate::mesh::{AxisConvention, MeshVertex};
pub use crate::variant::WorldVariant;
pub use crate::world::{
    decode_world_geometry, decode_world_geometry_with, Cell, DecodeOptions, WorldGeometry,
};

pub fn open_container<P: AsRef<Path>>(path: P) -> Result<ContainerFile> {
    ContainerFile::open(path)
}

/// `Ok(None)` when the container has no chunk called `name`.
pub fn get_chunk<'a>(container: &'a ContainerFile, name: &str) -> Result<Option<Chunk<'a>>> {
    container.chunk(name)
}
