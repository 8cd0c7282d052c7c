// Heightmap -> LOD mesh with seam stitching.
//
// Sample rings, outermost first:
//   0      out-of-mesh   normals only, addressed by negative indices
//   1      mesh-edge     always full resolution so neighbouring chunks line up
//   2      edge-connect  heights interpolated between the bracketing main vertices
//   inner  main/skipped  main vertices sit on the LOD stride, the rest are dropped
use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;

use crate::plugins::height_map::HeightMap;
use crate::plugins::terrain_settings::MeshSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexClass {
    OutOfMesh,
    MeshEdge,
    Main,
    EdgeConnection,
    Skipped,
}

/// Stride between main vertices for a LOD level.
pub fn skip_increment(lod: u32) -> usize {
    if lod == 0 {
        1
    } else {
        lod as usize * 2
    }
}

pub fn classify_vertex(x: usize, y: usize, verts_per_line: usize, skip: usize) -> VertexClass {
    let n = verts_per_line;
    if x == 0 || y == 0 || x == n - 1 || y == n - 1 {
        return VertexClass::OutOfMesh;
    }
    let on_stride = (x.saturating_sub(2)) % skip == 0 && (y.saturating_sub(2)) % skip == 0;
    if x > 2 && y > 2 && x < n - 3 && y < n - 3 && !on_stride {
        return VertexClass::Skipped;
    }
    if x == 1 || y == 1 || x == n - 2 || y == n - 2 {
        return VertexClass::MeshEdge;
    }
    if on_stride {
        VertexClass::Main
    } else {
        VertexClass::EdgeConnection
    }
}

/// Renderable mesh for one chunk at one LOD. Never contains out-of-mesh vertices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshPayload {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<u32>,
    pub uvs: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub flat_shaded: bool,
}

impl MeshPayload {
    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    pub fn triangle_list(&self) -> Vec<[u32; 3]> {
        self.triangles
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect()
    }

    pub fn to_mesh(&self) -> Mesh {
        let positions: Vec<[f32; 3]> = self.vertices.iter().map(|v| v.to_array()).collect();
        let normals: Vec<[f32; 3]> = self.normals.iter().map(|n| n.to_array()).collect();
        let uvs: Vec<[f32; 2]> = self.uvs.iter().map(|uv| uv.to_array()).collect();
        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
        mesh.insert_indices(Indices::U32(self.triangles.clone()));
        mesh
    }
}

/// Intermediate buffers. Negative index `i` lives in `border_vertices[-i - 1]`.
struct MeshData {
    vertices: Vec<Vec3>,
    uvs: Vec<Vec2>,
    triangles: Vec<u32>,
    border_vertices: Vec<Vec3>,
    border_triangles: Vec<[i32; 3]>,
    flat_shaded: bool,
}

impl MeshData {
    fn new(vertex_count: usize, border_count: usize, flat_shaded: bool) -> Self {
        Self {
            vertices: vec![Vec3::ZERO; vertex_count],
            uvs: vec![Vec2::ZERO; vertex_count],
            triangles: Vec::with_capacity(vertex_count * 6),
            border_vertices: vec![Vec3::ZERO; border_count],
            border_triangles: Vec::with_capacity(border_count * 6),
            flat_shaded,
        }
    }

    fn add_vertex(&mut self, position: Vec3, uv: Vec2, index: i32) {
        if index < 0 {
            self.border_vertices[(-index - 1) as usize] = position;
        } else {
            self.vertices[index as usize] = position;
            self.uvs[index as usize] = uv;
        }
    }

    fn add_triangle(&mut self, a: i32, b: i32, c: i32) {
        if a < 0 || b < 0 || c < 0 {
            self.border_triangles.push([a, b, c]);
        } else {
            self.triangles.extend_from_slice(&[a as u32, b as u32, c as u32]);
        }
    }

    fn point(&self, index: i32) -> Vec3 {
        if index < 0 {
            self.border_vertices[(-index - 1) as usize]
        } else {
            self.vertices[index as usize]
        }
    }

    fn surface_normal(&self, a: i32, b: i32, c: i32) -> Vec3 {
        let pa = self.point(a);
        let ab = self.point(b) - pa;
        let ac = self.point(c) - pa;
        ab.cross(ac).normalize_or_zero()
    }

    fn bake_normals(&self) -> Vec<Vec3> {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];
        for t in self.triangles.chunks_exact(3) {
            let n = self.surface_normal(t[0] as i32, t[1] as i32, t[2] as i32);
            normals[t[0] as usize] += n;
            normals[t[1] as usize] += n;
            normals[t[2] as usize] += n;
        }
        // Border triangles only contribute to the real vertices they touch.
        for &[a, b, c] in &self.border_triangles {
            let n = self.surface_normal(a, b, c);
            for i in [a, b, c] {
                if i >= 0 {
                    normals[i as usize] += n;
                }
            }
        }
        for n in &mut normals {
            *n = n.normalize_or_zero();
        }
        normals
    }

    fn into_payload(self) -> MeshPayload {
        if !self.flat_shaded {
            let normals = self.bake_normals();
            return MeshPayload {
                vertices: self.vertices,
                triangles: self.triangles,
                uvs: self.uvs,
                normals,
                flat_shaded: false,
            };
        }

        let count = self.triangles.len();
        let mut vertices = Vec::with_capacity(count);
        let mut uvs = Vec::with_capacity(count);
        let mut normals = Vec::with_capacity(count);
        for t in self.triangles.chunks_exact(3) {
            let corners = [t[0] as usize, t[1] as usize, t[2] as usize];
            let [a, b, c] = corners.map(|i| self.vertices[i]);
            let n = (b - a).cross(c - a).normalize_or_zero();
            for i in corners {
                vertices.push(self.vertices[i]);
                uvs.push(self.uvs[i]);
                normals.push(n);
            }
        }
        MeshPayload {
            vertices,
            triangles: (0..count as u32).collect(),
            uvs,
            normals,
            flat_shaded: true,
        }
    }
}

/// Build the mesh for `lod` from a bordered heightmap sized `settings.verts_per_line()`.
pub fn build_terrain_mesh(height_map: &HeightMap, settings: &MeshSettings, lod: u32) -> MeshPayload {
    let skip = skip_increment(lod);
    let n = height_map.size();
    let world_size = (n - 3) as f32 * settings.mesh_scale;
    let top_left = Vec2::new(-1.0, 1.0) * world_size / 2.0;

    let mut index_map = vec![0_i32; n * n];
    let mut mesh_vertex_index = 0_i32;
    let mut out_of_mesh_index = -1_i32;
    for y in 0..n {
        for x in 0..n {
            match classify_vertex(x, y, n, skip) {
                VertexClass::OutOfMesh => {
                    index_map[y * n + x] = out_of_mesh_index;
                    out_of_mesh_index -= 1;
                }
                VertexClass::Skipped => {}
                _ => {
                    index_map[y * n + x] = mesh_vertex_index;
                    mesh_vertex_index += 1;
                }
            }
        }
    }

    let mut data = MeshData::new(
        mesh_vertex_index as usize,
        (-out_of_mesh_index - 1) as usize,
        settings.use_flat_shading,
    );
    let at = |x: usize, y: usize| index_map[y * n + x];

    for y in 0..n {
        for x in 0..n {
            let class = classify_vertex(x, y, n, skip);
            if class == VertexClass::Skipped {
                continue;
            }
            let is_main = class == VertexClass::Main;
            let is_connection = class == VertexClass::EdgeConnection;

            let percent = Vec2::new(x as f32 - 1.0, y as f32 - 1.0) / (n - 3) as f32;
            let pos = top_left + Vec2::new(percent.x, -percent.y) * world_size;

            let mut height = height_map.get(x, y);
            if is_connection {
                let vertical = x == 2 || x == n - 3;
                let dst_a = (if vertical { y - 2 } else { x - 2 }) % skip;
                let dst_b = skip - dst_a;
                let t = dst_a as f32 / skip as f32;
                let (ax, ay) = if vertical { (x, y - dst_a) } else { (x - dst_a, y) };
                let (bx, by) = if vertical { (x, y + dst_b) } else { (x + dst_b, y) };
                height = height_map.get(ax, ay) * (1.0 - t) + height_map.get(bx, by) * t;
            }

            data.add_vertex(Vec3::new(pos.x, height, pos.y), percent, at(x, y));

            let create_triangle =
                x < n - 1 && y < n - 1 && (!is_connection || (x != 2 && y != 2));
            if create_triangle {
                let inc = if is_main && x != n - 3 && y != n - 3 { skip } else { 1 };
                let a = at(x, y);
                let b = at(x + inc, y);
                let c = at(x, y + inc);
                let d = at(x + inc, y + inc);
                data.add_triangle(a, d, c);
                data.add_triangle(d, a, b);
            }
        }
    }

    data.into_payload()
}
