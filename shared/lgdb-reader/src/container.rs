use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use memmap::Mmap;

use crate::error::{Error, Result};
use crate::reader::ByteReader;

/// TOC offset, version pair, reserved block and marker.
pub const HEADER_SIZE: usize = 4 + 8 + 256 + 4;
pub const TOC_ENTRY_SIZE: usize = 12 + 4 + 4;
pub const CHUNK_HEADER_SIZE: usize = 12 + 8 + 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    fn read(r: &mut ByteReader) -> Result<Self> {
        let major = r.u32()?;
        let minor = r.u32()?;
        Ok(Self { major, minor })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Clone, Debug)]
pub struct ContainerHeader {
    pub toc_offset: u32,
    pub version: Version,
    pub marker: [u8; 4],
}

impl ContainerHeader {
    /// The marker as dash-separated hex bytes, e.g. `DE-AD-BE-EF`. Never validated.
    pub fn marker_string(&self) -> String {
        self.marker
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join("-")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TocEntry {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

#[derive(Clone, Debug)]
pub struct ChunkHeader {
    pub name: String,
    pub version: Version,
}

/// One chunk's header and payload, borrowed from its container.
#[derive(Clone, Debug)]
pub struct Chunk<'a> {
    header: ChunkHeader,
    payload_offset: usize,
    data: &'a [u8],
}

impl<'a> Chunk<'a> {
    pub fn header(&self) -> &ChunkHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn version(&self) -> Version {
        self.header.version
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// File offset of the first payload byte.
    pub fn payload_offset(&self) -> usize {
        self.payload_offset
    }

    pub fn reader(&self) -> ByteReader<'a> {
        ByteReader::with_base(self.data, self.payload_offset)
    }
}

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Backing {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(map) => map,
            Self::Owned(data) => data,
        }
    }
}

pub struct ContainerFile {
    path: Option<PathBuf>,
    data: Backing,
    header: ContainerHeader,
    toc: Vec<TocEntry>,
    index_by_name: HashMap<String, usize>,
}

impl fmt::Debug for ContainerFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerFile")
            .field("path", &self.path)
            .field("len", &self.data.len())
            .field("header", &self.header)
            .field("toc", &self.toc)
            .finish()
    }
}

impl ContainerFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let io_error = |source: io::Error| match source.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            _ => Error::Io {
                path: path.to_path_buf(),
                source,
            },
        };

        let file = File::open(path).map_err(io_error)?;
        let metadata = file.metadata().map_err(io_error)?;
        if !metadata.is_file() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        if metadata.len() < HEADER_SIZE as u64 {
            return Err(Error::corrupt(
                0,
                format!(
                    "{}-byte file is shorter than the {}-byte header",
                    metadata.len(),
                    HEADER_SIZE,
                ),
            ));
        }

        // SAFETY: The mapping is read-only and the file is not expected to change while open.
        let map = unsafe { Mmap::map(&file) }.map_err(io_error)?;
        Self::parse(Some(path.to_path_buf()), Backing::Mapped(map))
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::parse(None, Backing::Owned(data))
    }

    fn parse(path: Option<PathBuf>, data: Backing) -> Result<Self> {
        let file_len = data.len();

        let mut r = ByteReader::new(&data);
        let toc_offset = r.u32()?;
        let version = Version::read(&mut r)?;
        r.skip(256)?;
        let marker = r.array::<4>()?;
        let header = ContainerHeader {
            toc_offset,
            version,
            marker,
        };

        let toc_start = toc_offset as usize;
        if toc_start >= file_len {
            return Err(Error::corrupt(
                0,
                format!(
                    "table of contents offset {} is past the end of the {}-byte file",
                    toc_offset, file_len,
                ),
            ));
        }

        let mut r = ByteReader::with_base(&data[toc_start..], toc_start);
        let item_count = r.u32()? as usize;
        r.ensure_records(item_count, TOC_ENTRY_SIZE, "table of contents entries")?;

        let mut toc = Vec::with_capacity(item_count);
        let mut index_by_name = HashMap::with_capacity(item_count);
        for _ in 0..item_count {
            let entry_offset = toc_start + r.position();
            let name = r.name::<12>()?;
            let offset = r.u32()?;
            let size = r.u32()?;

            if offset as u64 + size as u64 > file_len as u64 {
                return Err(Error::corrupt(
                    entry_offset,
                    format!(
                        "chunk {} spans {}..{} beyond the {}-byte file",
                        name,
                        offset,
                        offset as u64 + size as u64,
                        file_len,
                    ),
                ));
            }
            if index_by_name.insert(name.clone(), toc.len()).is_some() {
                return Err(Error::corrupt(
                    entry_offset,
                    format!("duplicate chunk name {}", name),
                ));
            }
            toc.push(TocEntry { name, offset, size });
        }

        debug!(
            "container version {} with {} chunks, TOC at {}",
            header.version,
            toc.len(),
            header.toc_offset,
        );

        Ok(Self {
            path,
            data,
            header,
            toc,
            index_by_name,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Table of contents entries in file order.
    pub fn toc(&self) -> &[TocEntry] {
        &self.toc
    }

    pub fn toc_entry(&self, name: &str) -> Option<&TocEntry> {
        self.index_by_name.get(name).map(|&index| &self.toc[index])
    }

    /// Looks up a chunk by name. Returns `Ok(None)` when the name is absent and `CorruptData`
    /// when the chunk header or payload runs past the end of the file.
    pub fn chunk(&self, name: &str) -> Result<Option<Chunk<'_>>> {
        let entry = match self.toc_entry(name) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let start = entry.offset as usize;
        let mut r = ByteReader::with_base(&self.data[start..], start);
        let chunk_name = r.name::<12>()?;
        let version = Version::read(&mut r)?;
        r.skip(4)?;
        let payload_offset = start + r.position();
        let data = r.bytes(entry.size as usize)?;

        if chunk_name != entry.name {
            warn!(
                "chunk at {} is listed as {} but its header says {}",
                start, entry.name, chunk_name,
            );
        }

        Ok(Some(Chunk {
            header: ChunkHeader {
                name: chunk_name,
                version,
            },
            payload_offset,
            data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::{ContainerFile, Version, HEADER_SIZE};
    use crate::error::Error;
    use crate::testing::ContainerBuilder;

    #[test]
    fn parses_header_and_toc() {
        let data = ContainerBuilder::new()
            .chunk("FAMILY", Version::new(0, 1), vec![1, 2, 3])
            .chunk("WR", Version::new(0, 23), vec![4, 5])
            .build();
        let len = data.len();
        let container = ContainerFile::from_bytes(data).unwrap();

        assert_eq!(container.header().version, Version::new(0, 1));
        assert_eq!(container.header().marker_string(), "DE-AD-BE-EF");
        assert_eq!(container.len(), len);
        let names: Vec<&str> = container.toc().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["FAMILY", "WR"]);
        for entry in container.toc() {
            assert!(entry.offset as usize + entry.size as usize <= len);
        }
    }

    #[test]
    fn chunk_returns_header_and_exact_payload() {
        let container = ContainerFile::from_bytes(
            ContainerBuilder::new()
                .chunk("FAMILY", Version::new(0, 1), vec![1, 2, 3])
                .chunk("WR", Version::new(0, 23), vec![4, 5])
                .build(),
        )
        .unwrap();

        let chunk = container.chunk("WR").unwrap().unwrap();
        assert_eq!(chunk.name(), "WR");
        assert_eq!(chunk.version(), Version::new(0, 23));
        assert_eq!(chunk.data(), &[4, 5]);
        assert_eq!(
            chunk.payload_offset(),
            container.toc_entry("WR").unwrap().offset as usize + super::CHUNK_HEADER_SIZE,
        );
        assert!(container.chunk("WREXT").unwrap().is_none());
    }

    #[test]
    fn duplicate_names_are_corrupt() {
        let data = ContainerBuilder::new()
            .chunk("WR", Version::new(0, 23), vec![])
            .chunk("WR", Version::new(0, 23), vec![])
            .build();
        assert!(matches!(
            ContainerFile::from_bytes(data),
            Err(Error::CorruptData { .. })
        ));
    }

    #[test]
    fn toc_offset_past_end_is_corrupt() {
        let mut data = ContainerBuilder::new().build();
        let len = data.len() as u32;
        data[..4].copy_from_slice(&len.to_le_bytes());
        assert!(matches!(
            ContainerFile::from_bytes(data),
            Err(Error::CorruptData { .. })
        ));
    }

    #[test]
    fn entry_past_end_is_corrupt() {
        let mut data = ContainerBuilder::new()
            .chunk("WR", Version::new(0, 23), vec![0; 8])
            .build();
        // The single TOC entry's size field is the last four bytes of the file.
        let size_offset = data.len() - 4;
        data[size_offset..].copy_from_slice(&0x10000u32.to_le_bytes());
        assert!(matches!(
            ContainerFile::from_bytes(data),
            Err(Error::CorruptData { .. })
        ));
    }

    #[test]
    fn truncated_header_is_corrupt() {
        assert!(matches!(
            ContainerFile::from_bytes(vec![0; HEADER_SIZE - 1]),
            Err(Error::CorruptData { .. })
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        assert!(matches!(
            ContainerFile::open("/definitely/not/a/real/mission.mis"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn opens_from_disk() {
        let data = ContainerBuilder::new()
            .chunk("WR", Version::new(0, 23), vec![9; 5])
            .build();
        let path = std::env::temp_dir().join(format!("lgdb-reader-{}.mis", std::process::id()));
        std::fs::write(&path, &data).unwrap();

        let container = ContainerFile::open(&path).unwrap();
        assert_eq!(container.path(), Some(path.as_path()));
        assert_eq!(container.chunk("WR").unwrap().unwrap().data(), &[9; 5]);

        drop(container);
        std::fs::remove_file(&path).unwrap();
    }
}
