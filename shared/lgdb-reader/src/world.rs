use log::debug;
use nalgebra_glm::Vec3;

use crate::atlas::{pack_cell, LightmapAtlas};
use crate::cell::CellRecord;
use crate::container::{ContainerFile, Version};
use crate::error::Result;
use crate::lightmap::ChannelOrder;
use crate::mesh::{assemble, AxisConvention, CellMesh};
use crate::reader::ByteReader;
use crate::uv::{project_cell, PolygonUvs};
use crate::variant::{select_world_chunk, DecodeParams, WorldVariant};

/// Cell header plus the two trailing count fields every cell carries, even an empty one.
const MIN_CELL_SIZE: usize = 31 + 4 + 4;

/// Caller choices that the file format leaves open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
    pub channel_order: ChannelOrder,
    pub axis_convention: AxisConvention,
    /// Largest atlas edge the packer may grow to.
    pub max_atlas_dimension: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            channel_order: ChannelOrder::default(),
            axis_convention: AxisConvention::default(),
            max_atlas_dimension: 4096,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldHeader {
    /// Zero unless extended.
    pub lightmap_format: u32,
    /// One unless extended; a stored zero also reads as one.
    pub lightmap_scale: i32,
    pub data_size: u32,
    pub cell_count: u32,
}

impl WorldHeader {
    fn read(r: &mut ByteReader, extended: bool) -> Result<Self> {
        let (lightmap_format, lightmap_scale) = if extended {
            r.skip(12)?;
            (r.u32()?, r.i32()?)
        } else {
            (0, 0)
        };
        Ok(Self {
            lightmap_format,
            lightmap_scale: if lightmap_scale == 0 { 1 } else { lightmap_scale },
            data_size: r.u32()?,
            cell_count: r.u32()?,
        })
    }
}

/// One fully decoded cell: its records, its lightmap atlas and its renderable mesh.
#[derive(Clone, Debug)]
pub struct Cell {
    record: CellRecord,
    atlas: LightmapAtlas,
    polygon_uvs: Vec<PolygonUvs>,
    mesh: CellMesh,
}

impl Cell {
    fn decode(
        r: &mut ByteReader,
        index: usize,
        params: DecodeParams,
        options: &DecodeOptions,
    ) -> Result<Self> {
        let record = CellRecord::decode(r, index, params, options.channel_order)?;
        let uvs = project_cell(index, &record)?;
        let (atlas, polygon_uvs) = pack_cell(index, &record, &uvs, options.max_atlas_dimension)?;
        let mesh = assemble(&record, &polygon_uvs, options.axis_convention);
        Ok(Self {
            record,
            atlas,
            polygon_uvs,
            mesh,
        })
    }

    pub fn record(&self) -> &CellRecord {
        &self.record
    }

    /// Vertex positions, indexed by the values of `triangle_indices`.
    pub fn vertices(&self) -> &[Vec3] {
        self.mesh.positions()
    }

    pub fn triangle_indices(&self) -> &[u16] {
        self.mesh.indices()
    }

    /// Atlas coordinates, one per entry of `triangle_indices`.
    pub fn uvs(&self) -> &[[f32; 2]] {
        self.mesh.uvs()
    }

    /// Atlas coordinates per rendered polygon, one per entry of the polygon's vertex list.
    pub fn polygon_uvs(&self) -> &[PolygonUvs] {
        &self.polygon_uvs
    }

    pub fn lightmap_atlas(&self) -> &LightmapAtlas {
        &self.atlas
    }

    pub fn mesh(&self) -> &CellMesh {
        &self.mesh
    }
}

/// The decoded world geometry chunk.
#[derive(Clone, Debug)]
pub struct WorldGeometry {
    chunk_name: String,
    chunk_version: Version,
    variant: WorldVariant,
    params: DecodeParams,
    header: WorldHeader,
    cells: Vec<Cell>,
}

impl WorldGeometry {
    pub fn chunk_name(&self) -> &str {
        &self.chunk_name
    }

    pub fn chunk_version(&self) -> Version {
        self.chunk_version
    }

    pub fn variant(&self) -> WorldVariant {
        self.variant
    }

    pub fn params(&self) -> DecodeParams {
        self.params
    }

    pub fn header(&self) -> &WorldHeader {
        &self.header
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }
}

pub fn decode_world_geometry(container: &ContainerFile) -> Result<WorldGeometry> {
    decode_world_geometry_with(container, &DecodeOptions::default())
}

/// Decodes every cell of the container's world geometry chunk. Any failing cell fails the whole
/// decode.
pub fn decode_world_geometry_with(
    container: &ContainerFile,
    options: &DecodeOptions,
) -> Result<WorldGeometry> {
    let selected = select_world_chunk(container)?;
    let mut r = selected.chunk.reader();
    let header = WorldHeader::read(&mut r, selected.params.extended)?;
    debug!(
        "{}: {} cells in {} bytes, lightmap format {} scale {}",
        selected.variant,
        header.cell_count,
        header.data_size,
        header.lightmap_format,
        header.lightmap_scale,
    );

    let cell_count = header.cell_count as usize;
    r.ensure_records(cell_count, MIN_CELL_SIZE, "cells")?;
    let cells = (0..cell_count)
        .map(|index| Cell::decode(&mut r, index, selected.params, options))
        .collect::<Result<Vec<_>>>()?;
    debug!(
        "decoded {} cells, {} bytes of the chunk left",
        cells.len(),
        r.remaining(),
    );

    Ok(WorldGeometry {
        chunk_name: selected.chunk.name().to_string(),
        chunk_version: selected.chunk.version(),
        variant: selected.variant,
        params: selected.params,
        header,
        cells,
    })
}
