use log::warn;
use nalgebra_glm::dot;

use crate::cell::CellRecord;
use crate::error::Result;

/// Render polygon base UVs are 20.12 fixed point.
const BASE_UV_SCALE: f32 = 4096.0;

/// Lightmap space UVs of one rendered polygon, one pair per entry of its vertex list.
#[derive(Clone, Debug, PartialEq)]
pub struct PolygonUvs {
    pub polygon: usize,
    pub uvs: Vec<[f32; 2]>,
}

/// Lightmap texels per texture unit along an edge of `size` texels.
fn texel_scale(size: u8) -> f32 {
    if size == 0 {
        0.0
    } else {
        4.0 / size as f32
    }
}

/// Projects every vertex of a rendered polygon onto its texture basis. Vertices shared with other
/// polygons get a separate pair per polygon. A polygon whose basis cannot be inverted maps every
/// vertex to its base UV.
pub fn project_polygon(cell: usize, record: &CellRecord, polygon: usize) -> Result<PolygonUvs> {
    let render = &record.render_polygons[polygon];
    let info = &record.lightmap_infos[polygon];
    let (u, v) = (&render.tex_u, &render.tex_v);

    let uu = dot(u, u);
    let vv = dot(v, v);
    let uv = dot(u, v);
    let determinant = uu * vv - uv * uv;

    let su = texel_scale(info.width);
    let sv = texel_scale(info.height);
    let base_u = su * (render.base_u / BASE_UV_SCALE + (0.5 - info.base_u as f32) / 4.0);
    let base_v = sv * (render.base_v / BASE_UV_SCALE + (0.5 - info.base_v as f32) / 4.0);

    if uu == 0.0 || vv == 0.0 || determinant == 0.0 {
        warn!(
            "cell {}: polygon {} has a degenerate texture basis, using constant UVs",
            cell, polygon
        );
        let uvs = vec![[base_u, base_v]; record.polygon_indices(polygon).len()];
        return Ok(PolygonUvs { polygon, uvs });
    }

    let anchor_id = record.polygon_indices(polygon)[render.texture_anchor as usize];
    let anchor = record.vertices[anchor_id as usize];

    let uvs = record
        .polygon_vertices(polygon)
        .map(|vertex| {
            let delta = vertex - anchor;
            let du = dot(&delta, u);
            let dv = dot(&delta, v);
            if uv == 0.0 {
                [du * su / uu + base_u, dv * sv / vv + base_v]
            } else {
                let denom = 1.0 / determinant;
                [
                    base_u + vv * su * denom * du - uv * su * denom * dv,
                    base_v + uu * sv * denom * dv - uv * sv * denom * du,
                ]
            }
        })
        .collect();
    Ok(PolygonUvs { polygon, uvs })
}

pub fn project_cell(cell: usize, record: &CellRecord) -> Result<Vec<PolygonUvs>> {
    (0..record.rendered_polygon_count())
        .map(|polygon| project_polygon(cell, record, polygon))
        .collect()
}
