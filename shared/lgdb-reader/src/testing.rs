//! Writers for synthetic containers used by the unit tests.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::container::{Version, HEADER_SIZE};

fn write_name(out: &mut Vec<u8>, name: &str) {
    let mut field = [0u8; 12];
    field[..name.len()].copy_from_slice(name.as_bytes());
    out.extend_from_slice(&field);
}

fn write_vec3(out: &mut Vec<u8>, v: [f32; 3]) {
    for c in v {
        out.write_f32::<LittleEndian>(c).unwrap();
    }
}

pub struct ContainerBuilder {
    version: Version,
    chunks: Vec<(String, Version, Vec<u8>)>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            version: Version::new(0, 1),
            chunks: Vec::new(),
        }
    }

    pub fn chunk(mut self, name: &str, version: Version, payload: Vec<u8>) -> Self {
        self.chunks.push((name.to_string(), version, payload));
        self
    }

    /// Header, then every chunk back to back, then the table of contents.
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(self.version.major).unwrap();
        out.write_u32::<LittleEndian>(self.version.minor).unwrap();
        out.extend_from_slice(&[0; 256]);
        out.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(out.len(), HEADER_SIZE);

        let mut entries = Vec::new();
        for (name, version, payload) in &self.chunks {
            entries.push((name, out.len() as u32, payload.len() as u32));
            write_name(&mut out, name);
            out.write_u32::<LittleEndian>(version.major).unwrap();
            out.write_u32::<LittleEndian>(version.minor).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.extend_from_slice(payload);
        }

        let toc_offset = out.len() as u32;
        out[..4].copy_from_slice(&toc_offset.to_le_bytes());
        out.write_u32::<LittleEndian>(entries.len() as u32).unwrap();
        for (name, offset, size) in entries {
            write_name(&mut out, name);
            out.write_u32::<LittleEndian>(offset).unwrap();
            out.write_u32::<LittleEndian>(size).unwrap();
        }
        out
    }
}

pub struct WorldBuilder {
    extended: Option<(u32, i32)>,
    cells: Vec<CellBuilder>,
}

impl WorldBuilder {
    pub fn new() -> Self {
        Self {
            extended: None,
            cells: Vec::new(),
        }
    }

    /// Switches to the extended layout with the given lightmap format and scale.
    pub fn extended(mut self, lightmap_format: u32, lightmap_scale: i32) -> Self {
        self.extended = Some((lightmap_format, lightmap_scale));
        self
    }

    pub fn cell(mut self, cell: CellBuilder) -> Self {
        self.cells.push(cell);
        self
    }

    pub fn build(&self, texel_width: usize) -> Vec<u8> {
        let mut body = Vec::new();
        for cell in &self.cells {
            cell.write(&mut body, self.extended.is_some(), texel_width);
        }

        let mut out = Vec::new();
        if let Some((format, scale)) = self.extended {
            out.extend_from_slice(&[0; 12]);
            out.write_u32::<LittleEndian>(format).unwrap();
            out.write_i32::<LittleEndian>(scale).unwrap();
        }
        out.write_u32::<LittleEndian>(body.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(self.cells.len() as u32).unwrap();
        out.extend_from_slice(&body);
        out
    }
}

#[derive(Clone)]
pub struct RenderPolygonSpec {
    pub u: [f32; 3],
    pub v: [f32; 3],
    pub base: [f32; 2],
    pub anchor: u8,
}

#[derive(Clone)]
pub struct LightmapSpec {
    pub base: [i16; 2],
    pub width: u8,
    pub height: u8,
    pub bitmask: u32,
    /// Raw texel bytes; zero filled to the declared size when shorter.
    pub texels: Vec<u8>,
}

#[derive(Clone)]
pub struct CellBuilder {
    pub vertices: Vec<[f32; 3]>,
    /// `(vertex count, plane id)` per polygon.
    pub polygons: Vec<(u8, u8)>,
    pub render_polygons: Vec<RenderPolygonSpec>,
    pub portal_polygon_count: u8,
    pub index_list: Vec<u8>,
    pub planes: Vec<([f32; 3], f32)>,
    pub anim_lights: Vec<u16>,
    pub lightmaps: Vec<LightmapSpec>,
    pub light_indices: Vec<u16>,
}

impl CellBuilder {
    /// One right triangle in the z = 0 plane with a 2x2 lightmap.
    pub fn triangle() -> Self {
        Self {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            polygons: vec![(3, 0)],
            render_polygons: vec![RenderPolygonSpec {
                u: [1.0, 0.0, 0.0],
                v: [0.0, 1.0, 0.0],
                base: [0.0, 0.0],
                anchor: 0,
            }],
            portal_polygon_count: 0,
            index_list: vec![0, 1, 2],
            planes: vec![([0.0, 0.0, 1.0], 0.0)],
            anim_lights: vec![],
            lightmaps: vec![LightmapSpec {
                base: [0, 0],
                width: 2,
                height: 2,
                bitmask: 0,
                texels: vec![],
            }],
            light_indices: vec![3, 7],
        }
    }

    /// A unit square split into two quads: the first rendered, the second a portal.
    pub fn quad_with_portal() -> Self {
        Self {
            vertices: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            polygons: vec![(4, 0), (4, 1)],
            render_polygons: vec![
                RenderPolygonSpec {
                    u: [1.0, 0.0, 0.0],
                    v: [0.0, 1.0, 0.0],
                    base: [0.0, 0.0],
                    anchor: 0,
                },
                RenderPolygonSpec {
                    u: [1.0, 0.0, 0.0],
                    v: [0.0, 1.0, 0.0],
                    base: [0.0, 0.0],
                    anchor: 0,
                },
            ],
            portal_polygon_count: 1,
            index_list: vec![0, 1, 2, 3, 3, 2, 1, 0],
            planes: vec![([0.0, 0.0, 1.0], 0.0), ([0.0, 0.0, -1.0], 0.0)],
            anim_lights: vec![],
            lightmaps: vec![
                LightmapSpec {
                    base: [0, 0],
                    width: 4,
                    height: 4,
                    bitmask: 0,
                    texels: vec![],
                },
                LightmapSpec {
                    base: [0, 0],
                    width: 2,
                    height: 2,
                    bitmask: 0,
                    texels: vec![],
                },
            ],
            light_indices: vec![],
        }
    }

    pub fn write(&self, out: &mut Vec<u8>, extended: bool, texel_width: usize) {
        out.write_u8(self.vertices.len() as u8).unwrap();
        out.write_u8(self.polygons.len() as u8).unwrap();
        out.write_u8(self.render_polygons.len() as u8).unwrap();
        out.write_u8(self.portal_polygon_count).unwrap();
        out.write_u8(self.planes.len() as u8).unwrap();
        out.write_u8(0).unwrap(); // medium
        out.write_u8(0).unwrap(); // flags
        out.write_i32::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(self.index_list.len() as u16).unwrap();
        out.write_u8(self.anim_lights.len() as u8).unwrap();
        out.write_u8(0).unwrap(); // motion index
        write_vec3(out, [0.5, 0.5, 0.0]);
        out.write_f32::<LittleEndian>(1.0).unwrap();

        for &v in &self.vertices {
            write_vec3(out, v);
        }

        for &(vertex_count, plane_id) in &self.polygons {
            out.write_u8(0).unwrap();
            out.write_u8(vertex_count).unwrap();
            out.write_u8(plane_id).unwrap();
            out.write_u8(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u8(0).unwrap();
            out.write_u8(0).unwrap();
        }

        for render in &self.render_polygons {
            write_vec3(out, render.u);
            write_vec3(out, render.v);
            if extended {
                out.write_f32::<LittleEndian>(render.base[0]).unwrap();
                out.write_f32::<LittleEndian>(render.base[1]).unwrap();
                out.write_u16::<LittleEndian>(7).unwrap();
            } else {
                out.write_u16::<LittleEndian>(render.base[0] as u16).unwrap();
                out.write_u16::<LittleEndian>(render.base[1] as u16).unwrap();
                out.write_u8(7).unwrap();
                out.write_u8(render.anchor).unwrap();
            }
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_f32::<LittleEndian>(1.0).unwrap();
            write_vec3(out, [0.0, 0.0, 0.0]);
        }

        out.write_u32::<LittleEndian>(self.index_list.len() as u32).unwrap();
        out.extend_from_slice(&self.index_list);

        for &(normal, distance) in &self.planes {
            write_vec3(out, normal);
            out.write_f32::<LittleEndian>(distance).unwrap();
        }

        for &light in &self.anim_lights {
            out.write_u16::<LittleEndian>(light).unwrap();
        }

        for lightmap in &self.lightmaps {
            out.write_i16::<LittleEndian>(lightmap.base[0]).unwrap();
            out.write_i16::<LittleEndian>(lightmap.base[1]).unwrap();
            out.write_i16::<LittleEndian>(lightmap.width as i16).unwrap();
            out.write_u8(lightmap.height).unwrap();
            out.write_u8(lightmap.width).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(lightmap.bitmask).unwrap();
        }

        for lightmap in &self.lightmaps {
            let layers = 1 + lightmap.bitmask.count_ones() as usize;
            let size =
                layers * lightmap.width as usize * lightmap.height as usize * texel_width;
            let mut texels = lightmap.texels.clone();
            texels.resize(size, 0);
            out.extend_from_slice(&texels);
        }

        out.write_i32::<LittleEndian>(self.light_indices.len() as i32).unwrap();
        for &index in &self.light_indices {
            out.write_u16::<LittleEndian>(index).unwrap();
        }
    }
}
