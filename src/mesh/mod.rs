//! Startup data loaded from flat text files.
//!
//! - [`Mesh`] - triangle mesh in the OBJ subset written by face
//!   reconstruction tools (`v x y z [r g b]`, `f a b c`)
//! - [`FaceData`] - face vertex indices, triangle list and landmark pixels
//! - [`Landmarks`] - the 68 landmark pixel positions alone
//!
//! Every loader failure is fatal to session start and is reported as an
//! [`Error`](crate::util::Error) naming the file and line.

mod face_data;
mod polymesh;

pub use face_data::*;
pub use polymesh::*;

use std::fs;
use std::path::Path;

use crate::util::{Error, Result};

/// Read a whole text file, mapping a missing file to `FileNotFound`.
fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })
}

/// Parse an index stored as a (possibly scientific notation) float.
///
/// Index files written by numpy hold integers like `1.234000e+03`, so the
/// token is read as a float and truncated.
fn parse_index(token: &str) -> Option<u32> {
    let value: f64 = token.parse().ok()?;
    if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
        return None;
    }
    Some(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_index_scientific() {
        assert_eq!(parse_index("1.234000000000000000e+03"), Some(1234));
        assert_eq!(parse_index("0.000000000000000000e+00"), Some(0));
        assert_eq!(parse_index("42"), Some(42));
    }

    #[test]
    fn test_parse_index_rejects_garbage() {
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index("nan"), None);
        assert_eq!(parse_index("abc"), None);
        assert_eq!(parse_index(""), None);
    }
}
