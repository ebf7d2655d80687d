use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use nalgebra_glm::{vec3, Vec3};

use crate::cell::CellRecord;
use crate::uv::PolygonUvs;

/// How file coordinates are mapped for the consuming renderer. The same mapping is applied to
/// positions and plane normals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AxisConvention {
    /// File coordinates and stored winding.
    #[default]
    Native,
    /// `(x, y, z) -> (x, z, -y)`. A rotation, so winding is kept.
    YUpRightHanded,
    /// `(x, y, z) -> (x, z, y)`. A reflection, so every triangle's winding is reversed.
    YUpLeftHanded,
}

impl AxisConvention {
    pub fn map(self, v: &Vec3) -> Vec3 {
        match self {
            Self::Native => *v,
            Self::YUpRightHanded => vec3(v.x, v.z, -v.y),
            Self::YUpLeftHanded => vec3(v.x, v.z, v.y),
        }
    }

    pub fn reverses_winding(self) -> bool {
        self == Self::YUpLeftHanded
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub lightmap_coord: [f32; 2],
}

/// Renderer input for one cell. `positions` is indexed by the cell's vertex ids; `uvs` and
/// `normals` run parallel to `indices` since a vertex shared by two polygons has a different
/// lightmap coordinate in each.
#[derive(Clone, Debug, Default)]
pub struct CellMesh {
    positions: Vec<Vec3>,
    indices: Vec<u16>,
    uvs: Vec<[f32; 2]>,
    normals: Vec<Vec3>,
    triangle_polygons: Vec<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct VertexKey {
    polygon: usize,
    vertex_id: u16,
}

impl CellMesh {
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn uvs(&self) -> &[[f32; 2]] {
        &self.uvs
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_polygons.len()
    }

    /// The polygon each triangle came from.
    pub fn triangle_polygons(&self) -> &[usize] {
        &self.triangle_polygons
    }

    /// Expands the mesh into one vertex per distinct (polygon, vertex id) pair.
    pub fn render_vertices(&self) -> (Vec<MeshVertex>, Vec<u16>) {
        let mut vertices = Vec::new();
        let mut indices = Vec::with_capacity(self.indices.len());
        let mut emitted_vertices_by_key = HashMap::new();

        for (slot, &vertex_id) in self.indices.iter().enumerate() {
            let key = VertexKey {
                polygon: self.triangle_polygons[slot / 3],
                vertex_id,
            };
            let index = *emitted_vertices_by_key.entry(key).or_insert_with(|| {
                let position = &self.positions[vertex_id as usize];
                let normal = &self.normals[slot];
                vertices.push(MeshVertex {
                    position: [position.x, position.y, position.z],
                    normal: [normal.x, normal.y, normal.z],
                    lightmap_coord: self.uvs[slot],
                });
                // At most 255 polygons of at most 255 vertices each.
                (vertices.len() - 1) as u16
            });
            indices.push(index);
        }
        (vertices, indices)
    }
}

/// Builds a cell's mesh from its triangulation and atlas space UVs.
pub fn assemble(
    record: &CellRecord,
    remapped: &[PolygonUvs],
    convention: AxisConvention,
) -> CellMesh {
    let positions = record
        .vertices
        .iter()
        .map(|v| convention.map(v))
        .collect();

    let mut mesh = CellMesh {
        positions,
        ..Default::default()
    };
    for triangle in &record.triangles {
        let mut corners = triangle.corners;
        if convention.reverses_winding() {
            corners.swap(1, 2);
        }

        let plane_id = record.polygons[triangle.polygon].plane_id as usize;
        let normal = convention.map(&record.planes[plane_id].normal);
        let indices = record.polygon_indices(triangle.polygon);
        let uvs = &remapped[triangle.polygon].uvs;
        for corner in corners {
            mesh.indices.push(indices[corner] as u16);
            mesh.uvs.push(uvs[corner]);
            mesh.normals.push(normal);
        }
        mesh.triangle_polygons.push(triangle.polygon);
    }
    mesh
}
