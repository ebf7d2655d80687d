use log::debug;
use texture_atlas::{RgbaU8Image, TextureAtlas};

use crate::cell::CellRecord;
use crate::error::{Error, Result};
use crate::uv::PolygonUvs;

/// Where one polygon's lightmap landed in its cell's atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub polygon: usize,
}

impl AtlasRect {
    pub fn overlaps(&self, other: &AtlasRect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// The static layers of a cell's lightmaps packed into one image.
#[derive(Clone, Debug)]
pub struct LightmapAtlas {
    image: RgbaU8Image,
    rects: Vec<AtlasRect>,
}

impl LightmapAtlas {
    pub fn image(&self) -> &RgbaU8Image {
        &self.image
    }

    pub fn width(&self) -> usize {
        self.image.width()
    }

    pub fn height(&self) -> usize {
        self.image.height()
    }

    /// One rect per rendered polygon, in polygon order.
    pub fn rects(&self) -> &[AtlasRect] {
        &self.rects
    }
}

/// Drops the integer part of `x`, reflecting negative values: -0.3 wraps to 0.3, not 0.7.
pub fn wrap_unit(x: f32) -> f32 {
    (x - x.trunc()).abs()
}

fn reciprocal(extent: usize) -> f32 {
    if extent == 0 {
        0.0
    } else {
        1.0 / extent as f32
    }
}

/// Packs the lightmaps of every rendered polygon and moves their UVs into atlas space, with V
/// pointing up.
pub fn pack_cell(
    cell: usize,
    record: &CellRecord,
    uvs: &[PolygonUvs],
    max_dimension: usize,
) -> Result<(LightmapAtlas, Vec<PolygonUvs>)> {
    let mut atlas = TextureAtlas::new();
    let patch_ids: Vec<_> = (0..record.rendered_polygon_count())
        .map(|polygon| atlas.insert(record.lightmaps[polygon].to_rgba8()))
        .collect();

    let overflow = || Error::AtlasOverflow {
        cell,
        max_dimension,
    };
    let baked = atlas.bake_smallest(max_dimension).map_err(|err| {
        debug!("cell {}: {:#}", cell, err);
        overflow()
    })?;

    let rects = patch_ids
        .iter()
        .enumerate()
        .map(|(polygon, &patch_id)| {
            let [x, y] = baked.offset(patch_id).ok_or_else(overflow)?;
            let lightmap = &record.lightmaps[polygon];
            Ok(AtlasRect {
                x,
                y,
                width: lightmap.width(),
                height: lightmap.height(),
                polygon,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let inv_width = reciprocal(baked.width());
    let inv_height = reciprocal(baked.height());
    let remapped = uvs
        .iter()
        .map(|polygon_uvs| {
            let rect = &rects[polygon_uvs.polygon];
            PolygonUvs {
                polygon: polygon_uvs.polygon,
                uvs: polygon_uvs
                    .uvs
                    .iter()
                    .map(|&[u, v]| {
                        let u = (rect.x as f32 + wrap_unit(u) * rect.width as f32) * inv_width;
                        let v = (rect.y as f32 + wrap_unit(v) * rect.height as f32) * inv_height;
                        [u, 1.0 - v]
                    })
                    .collect(),
            }
        })
        .collect();

    debug!(
        "cell {}: {} lightmaps in a {}x{} atlas",
        cell,
        rects.len(),
        baked.width(),
        baked.height(),
    );

    Ok((
        LightmapAtlas {
            image: baked.into_image(),
            rects,
        },
        remapped,
    ))
}
