//! Face topology and landmark data (`face_ind.txt`, `triangles.txt`,
//! `uv_kpt_ind.txt`).

use std::path::Path;

use super::{parse_index, read_text};
use crate::util::{Error, Result, UVec2};

/// Number of facial landmarks.
pub const LANDMARK_COUNT: usize = 68;

pub const FACE_INDEX_FILE: &str = "face_ind.txt";
pub const TRIANGLES_FILE: &str = "triangles.txt";
pub const LANDMARK_FILE: &str = "uv_kpt_ind.txt";

/// Landmark pixel positions in the UV position map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landmarks {
    points: Vec<UVec2>,
}

impl Landmarks {
    /// Build from the raw `2 * 68` values: all u coordinates, then all v.
    pub fn from_values(values: &[u32]) -> Result<Self> {
        if values.len() != 2 * LANDMARK_COUNT {
            return Err(Error::LandmarkCount {
                expected: 2 * LANDMARK_COUNT,
                actual: values.len(),
            });
        }
        let (us, vs) = values.split_at(LANDMARK_COUNT);
        let points = us.iter().zip(vs).map(|(&u, &v)| UVec2::new(u, v)).collect();
        Ok(Self { points })
    }

    pub fn points(&self) -> &[UVec2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Load landmark pixels from a whitespace separated `uv_kpt_ind.txt`.
pub fn load_landmark_indices(path: impl AsRef<Path>) -> Result<Landmarks> {
    let path = path.as_ref();
    let text = read_text(path)?;
    let mut values = Vec::with_capacity(2 * LANDMARK_COUNT);
    for (n, line) in text.lines().enumerate() {
        for token in line.split_whitespace() {
            let v = parse_index(token)
                .ok_or_else(|| Error::parse(path, n + 1, format!("bad landmark value {token:?}")))?;
            values.push(v);
        }
    }
    let landmarks = Landmarks::from_values(&values)?;
    tracing::debug!(path = %path.display(), "landmarks loaded");
    Ok(landmarks)
}

/// Face reconstruction lookup tables.
#[derive(Debug, Clone)]
pub struct FaceData {
    /// Indices of face pixels in the flattened position map.
    pub face_indices: Vec<u32>,
    /// Triangles over `face_indices`.
    pub triangles: Vec<[u32; 3]>,
    pub landmarks: Landmarks,
}

impl FaceData {
    /// Load all three tables from `dir`.
    #[tracing::instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let face_indices = load_face_indices(&dir.join(FACE_INDEX_FILE))?;
        let triangles = load_triangles(&dir.join(TRIANGLES_FILE))?;
        let landmarks = load_landmark_indices(dir.join(LANDMARK_FILE))?;

        let count = face_indices.len();
        if let Some(tri) = triangles.iter().find(|t| t.iter().any(|&v| v as usize >= count)) {
            return Err(Error::InvalidMesh(format!(
                "triangle {tri:?} references beyond {count} face indices"
            )));
        }

        tracing::info!(
            face_indices = count,
            triangles = triangles.len(),
            "face data loaded"
        );
        Ok(Self {
            face_indices,
            triangles,
            landmarks,
        })
    }
}

/// One index per non-empty line.
fn load_face_indices(path: &Path) -> Result<Vec<u32>> {
    let text = read_text(path)?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            parse_index(line.trim())
                .ok_or_else(|| Error::parse(path, n + 1, format!("bad face index {:?}", line.trim())))
        })
        .collect()
}

/// Three indices per non-empty line.
fn load_triangles(path: &Path) -> Result<Vec<[u32; 3]>> {
    let text = read_text(path)?;
    let mut triangles = Vec::new();
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let values = line
            .split_whitespace()
            .map(parse_index)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::parse(path, n + 1, "bad triangle index"))?;
        let [a, b, c] = values[..] else {
            return Err(Error::parse(
                path,
                n + 1,
                format!("expected 3 values, got {}", values.len()),
            ));
        };
        triangles.push([a, b, c]);
    }
    Ok(triangles)
}
