use nalgebra_glm::Vec3;

use crate::error::{Error, Result};
use crate::lightmap::{ChannelOrder, Lightmap};
use crate::reader::ByteReader;
use crate::variant::DecodeParams;

#[derive(Clone, Debug)]
pub struct CellHeader {
    pub vertex_count: u8,
    pub polygon_count: u8,
    pub render_polygon_count: u8,
    pub portal_polygon_count: u8,
    pub plane_count: u8,
    pub medium: u8,
    pub flags: u8,
    pub portal_vertex_list: i32,
    pub vertex_list_size: u16,
    pub anim_light_count: u8,
    pub motion_index: u8,
    pub sphere_center: Vec3,
    pub sphere_radius: f32,
}

impl CellHeader {
    fn read(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            vertex_count: r.u8()?,
            polygon_count: r.u8()?,
            render_polygon_count: r.u8()?,
            portal_polygon_count: r.u8()?,
            plane_count: r.u8()?,
            medium: r.u8()?,
            flags: r.u8()?,
            portal_vertex_list: r.i32()?,
            vertex_list_size: r.u16()?,
            anim_light_count: r.u8()?,
            motion_index: r.u8()?,
            sphere_center: r.vec3()?,
            sphere_radius: r.f32()?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Polygon {
    pub flags: u8,
    pub vertex_count: u8,
    pub plane_id: u8,
    pub clut_id: u8,
    pub destination: u16,
    pub motion_index: u8,
}

impl Polygon {
    fn read(r: &mut ByteReader) -> Result<Self> {
        let polygon = Self {
            flags: r.u8()?,
            vertex_count: r.u8()?,
            plane_id: r.u8()?,
            clut_id: r.u8()?,
            destination: r.u16()?,
            motion_index: r.u8()?,
        };
        r.skip(1)?;
        Ok(polygon)
    }
}

#[derive(Clone, Debug)]
pub struct RenderPolygon {
    pub tex_u: Vec3,
    pub tex_v: Vec3,
    /// Raw base UV fields; the fixed-point scale is applied during UV projection.
    pub base_u: f32,
    pub base_v: f32,
    pub texture_id: u16,
    /// Position within the polygon's vertex list of the UV origin. Always 0 in extended cells.
    pub texture_anchor: u8,
    pub cached_surface: u16,
    pub texture_scale: f32,
    pub center: Vec3,
}

impl RenderPolygon {
    fn read(r: &mut ByteReader, extended: bool) -> Result<Self> {
        let tex_u = r.vec3()?;
        let tex_v = r.vec3()?;
        let (base_u, base_v, texture_id, texture_anchor) = if extended {
            let base_u = r.f32()?;
            let base_v = r.f32()?;
            (base_u, base_v, r.u16()?, 0)
        } else {
            let base_u = r.u16()? as f32;
            let base_v = r.u16()? as f32;
            let texture_id = r.u8()? as u16;
            (base_u, base_v, texture_id, r.u8()?)
        };
        Ok(Self {
            tex_u,
            tex_v,
            base_u,
            base_v,
            texture_id,
            texture_anchor,
            cached_surface: r.u16()?,
            texture_scale: r.f32()?,
            center: r.vec3()?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

#[derive(Clone, Debug)]
pub struct LightmapInfo {
    pub base_u: i16,
    pub base_v: i16,
    pub padded_width: i16,
    pub height: u8,
    pub width: u8,
    pub data_ptr: u32,
    pub dynamic_light_ptr: u32,
    pub anim_light_bitmask: u32,
}

impl LightmapInfo {
    fn read(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            base_u: r.i16()?,
            base_v: r.i16()?,
            padded_width: r.i16()?,
            height: r.u8()?,
            width: r.u8()?,
            data_ptr: r.u32()?,
            dynamic_light_ptr: r.u32()?,
            anim_light_bitmask: r.u32()?,
        })
    }

    /// The static layer plus one per animated light.
    pub fn layer_count(&self) -> usize {
        1 + self.anim_light_bitmask.count_ones() as usize
    }
}

/// One fan triangle of a rendered polygon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Triangle {
    pub polygon: usize,
    /// Positions within the polygon's slice of the index list.
    pub corners: [usize; 3],
    /// Cell vertex ids.
    pub vertices: [usize; 3],
}

/// Every record of one cell, in file order, plus the triangulation of its rendered polygons.
#[derive(Clone, Debug)]
pub struct CellRecord {
    pub header: CellHeader,
    pub vertices: Vec<Vec3>,
    pub polygons: Vec<Polygon>,
    pub render_polygons: Vec<RenderPolygon>,
    pub index_list: Vec<u32>,
    pub planes: Vec<Plane>,
    pub anim_lights: Vec<u16>,
    pub lightmap_infos: Vec<LightmapInfo>,
    pub lightmaps: Vec<Lightmap>,
    pub light_indices: Vec<u16>,
    pub triangles: Vec<Triangle>,
    polygon_offsets: Vec<usize>,
}

impl CellRecord {
    /// Decodes the cell starting at the reader's position and leaves the reader just past it.
    pub fn decode(
        r: &mut ByteReader,
        cell: usize,
        params: DecodeParams,
        channel_order: ChannelOrder,
    ) -> Result<Self> {
        let header = CellHeader::read(r)?;

        let vertices = (0..header.vertex_count)
            .map(|_| r.vec3())
            .collect::<Result<Vec<_>>>()?;
        let polygons = (0..header.polygon_count)
            .map(|_| Polygon::read(r))
            .collect::<Result<Vec<_>>>()?;
        let render_polygons = (0..header.render_polygon_count)
            .map(|_| RenderPolygon::read(r, params.extended))
            .collect::<Result<Vec<_>>>()?;

        let index_count = r.u32()? as usize;
        let index_list = r.bytes(index_count)?.iter().map(|&i| i as u32).collect();

        let planes = (0..header.plane_count)
            .map(|_| {
                Ok(Plane {
                    normal: r.vec3()?,
                    distance: r.f32()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let anim_lights = (0..header.anim_light_count)
            .map(|_| r.u16())
            .collect::<Result<Vec<_>>>()?;
        let lightmap_infos = (0..header.render_polygon_count)
            .map(|_| LightmapInfo::read(r))
            .collect::<Result<Vec<_>>>()?;

        let texel_bytes = params.texel_format.bytes_per_texel();
        let lightmaps = lightmap_infos
            .iter()
            .map(|info| {
                let (width, height) = (info.width as usize, info.height as usize);
                let raw = r.bytes(info.layer_count() * width * height * texel_bytes)?;
                Ok(Lightmap::decode(
                    raw,
                    width,
                    height,
                    info.layer_count(),
                    params.texel_format,
                    channel_order,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let light_index_offset = r.position();
        let light_index_count = r.i32()?;
        let light_index_count = usize::try_from(light_index_count).map_err(|_| {
            Error::corrupt(
                light_index_offset,
                format!("negative light index count {}", light_index_count),
            )
        })?;
        r.ensure_records(light_index_count, 2, "light indices")?;
        let light_indices = (0..light_index_count)
            .map(|_| r.u16())
            .collect::<Result<Vec<_>>>()?;

        let mut record = Self {
            header,
            vertices,
            polygons,
            render_polygons,
            index_list,
            planes,
            anim_lights,
            lightmap_infos,
            lightmaps,
            light_indices,
            triangles: Vec::new(),
            polygon_offsets: Vec::new(),
        };
        record.validate(cell)?;
        record.triangulate();
        Ok(record)
    }

    fn validate(&mut self, cell: usize) -> Result<()> {
        if self.polygons.len() < self.header.portal_polygon_count as usize {
            return Err(Error::geometry(
                cell,
                format!(
                    "{} portal polygons out of {} polygons",
                    self.header.portal_polygon_count,
                    self.polygons.len(),
                ),
            ));
        }

        let mut offset = 0;
        for (index, polygon) in self.polygons.iter().enumerate() {
            if polygon.vertex_count < 3 {
                return Err(Error::geometry(
                    cell,
                    format!("polygon {} has {} vertices", index, polygon.vertex_count),
                ));
            }
            if polygon.plane_id as usize >= self.planes.len() {
                return Err(Error::geometry(
                    cell,
                    format!(
                        "polygon {} uses plane {} of {}",
                        index,
                        polygon.plane_id,
                        self.planes.len(),
                    ),
                ));
            }
            self.polygon_offsets.push(offset);
            offset += polygon.vertex_count as usize;
        }
        if offset > self.index_list.len() {
            return Err(Error::geometry(
                cell,
                format!(
                    "polygons need {} indices but the index list holds {}",
                    offset,
                    self.index_list.len(),
                ),
            ));
        }

        if let Some(&index) = self
            .index_list
            .iter()
            .find(|&&index| index as usize >= self.vertices.len())
        {
            return Err(Error::geometry(
                cell,
                format!("index {} is past {} vertices", index, self.vertices.len()),
            ));
        }

        for polygon in 0..self.rendered_polygon_count() {
            let anchor = self.render_polygons[polygon].texture_anchor;
            if anchor >= self.polygons[polygon].vertex_count {
                return Err(Error::geometry(
                    cell,
                    format!(
                        "polygon {} anchors its texture at vertex {} of {}",
                        polygon, anchor, self.polygons[polygon].vertex_count,
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Fans every rendered polygon around its first vertex.
    fn triangulate(&mut self) {
        let mut triangles = Vec::new();
        for polygon in 0..self.rendered_polygon_count() {
            let indices = self.polygon_indices(polygon);
            for k in 1..indices.len() - 1 {
                let corners = [0, k, k + 1];
                triangles.push(Triangle {
                    polygon,
                    corners,
                    vertices: corners.map(|corner| indices[corner] as usize),
                });
            }
        }
        self.triangles = triangles;
    }

    /// Polygons that are both render polygons and not portals. Portals are always the trailing
    /// polygons, so these are exactly the first `rendered_polygon_count()` polygons.
    pub fn rendered_polygon_count(&self) -> usize {
        let non_portal = self.polygons.len() - self.header.portal_polygon_count as usize;
        non_portal.min(self.render_polygons.len())
    }

    pub fn is_rendered(&self, polygon: usize) -> bool {
        polygon < self.rendered_polygon_count()
    }

    /// The polygon's slice of the index list.
    pub fn polygon_indices(&self, polygon: usize) -> &[u32] {
        let offset = self.polygon_offsets[polygon];
        &self.index_list[offset..offset + self.polygons[polygon].vertex_count as usize]
    }

    pub fn polygon_vertices(&self, polygon: usize) -> impl Iterator<Item = &Vec3> + '_ {
        self.polygon_indices(polygon)
            .iter()
            .map(move |&index| &self.vertices[index as usize])
    }

    /// Cell vertex ids of every triangle, three per triangle.
    pub fn triangle_vertex_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.triangles.iter().flat_map(|triangle| triangle.vertices)
    }
}
