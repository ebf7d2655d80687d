use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::container::Version;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt data at byte {offset}: {detail}")]
    CorruptData { offset: usize, detail: String },

    #[error("no world geometry chunk (tried WR, WRRGB, WREXT)")]
    ChunkNotFound,

    #[error("chunk {name} has version {found}, expected {expected}")]
    UnsupportedVersion {
        name: String,
        found: Version,
        expected: Version,
    },

    #[error("invalid geometry in cell {cell}: {detail}")]
    InvalidGeometry { cell: usize, detail: String },

    #[error("lightmaps of cell {cell} do not fit in a {max_dimension}x{max_dimension} atlas")]
    AtlasOverflow { cell: usize, max_dimension: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn corrupt(offset: usize, detail: impl Into<String>) -> Self {
        Self::CorruptData {
            offset,
            detail: detail.into(),
        }
    }

    pub(crate) fn geometry(cell: usize, detail: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            cell,
            detail: detail.into(),
        }
    }
}
