//! Triangle mesh and its flat text loader.

use std::path::Path;

use super::{parse_index, read_text};
use crate::util::{BBox3f, Error, Result, Vec3};

/// Indexed triangle mesh with optional per-vertex colors.
#[derive(Debug, Clone)]
pub struct Mesh {
    positions: Vec<Vec3>,
    colors: Option<Vec<Vec3>>,
    triangles: Vec<[u32; 3]>,
}

impl Mesh {
    /// Build a mesh from parts, validating topology.
    ///
    /// `colors`, when present, must hold one entry per position.
    pub fn from_parts(
        positions: Vec<Vec3>,
        colors: Option<Vec<Vec3>>,
        triangles: Vec<[u32; 3]>,
    ) -> Result<Self> {
        if triangles.is_empty() {
            return Err(Error::InvalidMesh("mesh has no triangles".into()));
        }
        if let Some(colors) = &colors {
            if colors.len() != positions.len() {
                return Err(Error::InvalidMesh(format!(
                    "{} colors for {} vertices",
                    colors.len(),
                    positions.len()
                )));
            }
        }
        let count = positions.len();
        if let Some((i, tri)) = triangles
            .iter()
            .enumerate()
            .find(|(_, tri)| tri.iter().any(|&v| v as usize >= count))
        {
            return Err(Error::InvalidMesh(format!(
                "triangle {i} references vertex {:?} but mesh has {count} vertices",
                tri
            )));
        }
        if let Some(i) = positions.iter().position(|p| !p.is_finite()) {
            return Err(Error::InvalidMesh(format!("vertex {i} is not finite")));
        }

        Ok(Self {
            positions,
            colors,
            triangles,
        })
    }

    /// Load a mesh from a flat OBJ-style text file.
    ///
    /// Only `v` and `f` records are read. Vertex colors are taken when every
    /// `v` line carries six values. Face indices are 1-based; `a/b/c` slash
    /// forms use the position index.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = read_text(path)?;

        let mut positions = Vec::new();
        let mut colors = Vec::new();
        let mut all_colored = true;
        let mut triangles = Vec::new();

        for (n, line) in text.lines().enumerate() {
            let line_no = n + 1;
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("v") => {
                    let values = tokens
                        .map(|t| t.parse::<f32>())
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map_err(|e| Error::parse(path, line_no, format!("bad vertex value: {e}")))?;
                    match values.len() {
                        3 => all_colored = false,
                        6 => colors.push(Vec3::new(values[3], values[4], values[5])),
                        k => {
                            return Err(Error::parse(
                                path,
                                line_no,
                                format!("vertex needs 3 or 6 values, got {k}"),
                            ))
                        }
                    }
                    positions.push(Vec3::new(values[0], values[1], values[2]));
                }
                Some("f") => {
                    let corners = tokens
                        .map(parse_face_corner)
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| Error::parse(path, line_no, "bad face index"))?;
                    if corners.len() < 3 {
                        return Err(Error::parse(path, line_no, "face needs at least 3 vertices"));
                    }
                    // Fan-triangulate polygons
                    for k in 1..corners.len() - 1 {
                        triangles.push([corners[0], corners[k], corners[k + 1]]);
                    }
                }
                _ => {}
            }
        }

        let colors = (all_colored && !positions.is_empty()).then_some(colors);
        let mesh = Self::from_parts(positions, colors, triangles)?;
        tracing::info!(
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            colored = mesh.colors.is_some(),
            "mesh loaded"
        );
        Ok(mesh)
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn colors(&self) -> Option<&[Vec3]> {
        self.colors.as_deref()
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Bounding box of all vertices.
    pub fn bounds(&self) -> BBox3f {
        BBox3f::from_points(&self.positions)
    }

    /// Color of vertex `i`, white when the mesh is uncolored.
    #[inline]
    pub fn color(&self, i: u32) -> Vec3 {
        self.colors
            .as_ref()
            .map_or(Vec3::ONE, |c| c[i as usize])
    }
}

/// Parse one `f` corner (`7`, `7/2`, `7//3`, `7/2/3`) into a 0-based index.
fn parse_face_corner(token: &str) -> Option<u32> {
    let first = token.split('/').next()?;
    parse_index(first)?.checked_sub(1)
}
