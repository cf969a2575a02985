//! Class entries of zip, jar, and jmod archives
//!
//! Only what is needed to pull classes out of build outputs (and to write a few back) is
//! supported: single-disk archives with stored or deflated entries. Zip64 and encrypted entries
//! are rejected.
//!
//! A jmod file is a zip archive behind a 4-byte `JM\x01\x00` header. Rather than special-casing
//! that header, the reader locates the start of the archive from the end of central directory
//! record, so any leading bytes are tolerated.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

const SIG_LFH: u32 = 0x0403_4b50;
const SIG_CDFH: u32 = 0x0201_4b50;
const SIG_EOCD: u32 = 0x0605_4b50;
const SIG_ZIP64_LOCATOR: u32 = 0x0706_4b50;

const LFH_LEN: usize = 30;
const CDFH_LEN: usize = 46;
const EOCD_MIN_LEN: usize = 22;

/// The Zip64 end of central directory locator sits right before the end of central directory
const ZIP64_LOCATOR_LEN: usize = 20;

/// The end of central directory record is followed by at most a `u16`-sized comment
const EOCD_SEARCH_MAX: usize = EOCD_MIN_LEN + u16::MAX as usize;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;
const FLAG_ENCRYPTED: u16 = 0x0001;

/// Zip field value meaning "see the Zip64 extra field"
const ZIP64_MARKER: u32 = u32::MAX;

const CLASS_SUFFIX: &str = ".class";
const MODULE_CLASSES_PREFIX: &str = "classes/";
const MODULE_DESCRIPTOR: &str = "module-info.class";

/// Named entry of an archive, with uncompressed contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    /// Path of the entry inside the archive (eg. `me/Flag.class`)
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// No end of central directory record was found
    NotAnArchive,

    /// Structure runs past the end of the archive
    Truncated(&'static str),

    BadSignature {
        offset: usize,
        expected: u32,
    },

    Zip64(String),
    Encrypted(String),
    UnsupportedCompression {
        entry: String,
        method: u16,
    },

    /// Decompressed size or CRC does not match the central directory
    Corrupt(String),

    /// Entry or archive does not fit in a non-Zip64 archive
    TooLarge(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::NotAnArchive => write!(f, "not a zip archive"),
            Error::Truncated(what) => write!(f, "truncated {}", what),
            Error::BadSignature { offset, expected } => write!(
                f,
                "expected signature 0x{:08x} at offset {}",
                expected, offset
            ),
            Error::Zip64(entry) => write!(f, "zip64 is not supported ({})", entry),
            Error::Encrypted(entry) => write!(f, "entry {} is encrypted", entry),
            Error::UnsupportedCompression { entry, method } => write!(
                f,
                "entry {} uses unsupported compression method {}",
                entry, method
            ),
            Error::Corrupt(entry) => write!(f, "entry {} is corrupt", entry),
            Error::TooLarge(entry) => write!(f, "entry {} is too large", entry),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

/// Read the class entries of the archive at `path`
///
/// A `.jmod` extension selects the module layout: only entries under `classes/` are taken, and
/// the module descriptor is left out.
pub fn read_class_entries(path: impl AsRef<Path>) -> Result<Vec<ClassEntry>, Error> {
    let path = path.as_ref();
    let is_module = path
        .extension()
        .map_or(false, |extension| extension == "jmod");
    let archive = fs::read(path)?;
    let entries = class_entries(&archive, is_module)?;
    log::info!(
        "Read {} class entries from {}",
        entries.len(),
        path.display()
    );
    Ok(entries)
}

/// Extract the class entries from archive bytes
pub fn class_entries(archive: &[u8], is_module: bool) -> Result<Vec<ClassEntry>, Error> {
    let directory = CentralDirectory::locate(archive)?;
    let mut entries = vec![];
    let mut offset = directory.start;

    for _ in 0..directory.entry_count {
        let header = CentralHeader::read(archive, offset)?;
        offset = header.next_offset;

        if !is_class_entry(&header.name, is_module) {
            log::trace!("Skipping archive entry {}", header.name);
            continue;
        }
        let bytes = header.contents(archive, directory.base)?;
        entries.push(ClassEntry {
            name: header.name,
            bytes,
        });
    }

    log::debug!(
        "Archive has {} entries, {} class candidates",
        directory.entry_count,
        entries.len()
    );
    Ok(entries)
}

fn is_class_entry(name: &str, is_module: bool) -> bool {
    if !name.ends_with(CLASS_SUFFIX) {
        return false;
    }
    !is_module || (name.starts_with(MODULE_CLASSES_PREFIX) && !name.ends_with(MODULE_DESCRIPTOR))
}

/// Get `len` bytes at `offset`, or fail with a truncation error naming `what`
fn slice_at<'a>(
    archive: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], Error> {
    offset
        .checked_add(len)
        .and_then(|end| archive.get(offset..end))
        .ok_or(Error::Truncated(what))
}

struct CentralDirectory {
    /// Offset in the input where the zip archive proper starts (non-zero for jmod)
    base: usize,

    /// Offset in the input of the first central directory header
    start: usize,
    entry_count: u16,
}

impl CentralDirectory {
    fn locate(archive: &[u8]) -> Result<CentralDirectory, Error> {
        if archive.len() < EOCD_MIN_LEN {
            return Err(Error::NotAnArchive);
        }
        let search_from = archive.len().saturating_sub(EOCD_SEARCH_MAX);
        let eocd = (search_from..=archive.len() - EOCD_MIN_LEN)
            .rev()
            .find(|&pos| archive[pos..pos + 4] == SIG_EOCD.to_le_bytes())
            .ok_or(Error::NotAnArchive)?;

        let locator = eocd.checked_sub(ZIP64_LOCATOR_LEN).map(|pos| &archive[pos..pos + 4]);
        if locator == Some(&SIG_ZIP64_LOCATOR.to_le_bytes()[..]) {
            return Err(Error::Zip64(String::from("central directory")));
        }

        let mut record = &archive[eocd + 4..eocd + EOCD_MIN_LEN];
        let _disk = record.read_u16::<LittleEndian>()?;
        let _directory_disk = record.read_u16::<LittleEndian>()?;
        let _disk_entries = record.read_u16::<LittleEndian>()?;
        let entry_count = record.read_u16::<LittleEndian>()?;
        let directory_size = record.read_u32::<LittleEndian>()?;
        let directory_offset = record.read_u32::<LittleEndian>()?;

        // Where the central directory actually is, minus where the archive claims it is
        let start = eocd
            .checked_sub(directory_size as usize)
            .ok_or(Error::Truncated("central directory"))?;
        let base = start
            .checked_sub(directory_offset as usize)
            .ok_or(Error::Truncated("central directory"))?;
        if base > 0 {
            log::debug!("Archive starts after {} bytes of preamble", base);
        }

        Ok(CentralDirectory {
            base,
            start,
            entry_count,
        })
    }
}

struct CentralHeader {
    name: String,
    flags: u16,
    method: u16,
    crc: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    local_offset: u32,
    next_offset: usize,
}

impl CentralHeader {
    fn read(archive: &[u8], offset: usize) -> Result<CentralHeader, Error> {
        let mut header = slice_at(archive, offset, CDFH_LEN, "central directory header")?;
        if header.read_u32::<LittleEndian>()? != SIG_CDFH {
            return Err(Error::BadSignature {
                offset,
                expected: SIG_CDFH,
            });
        }
        let _version_made_by = header.read_u16::<LittleEndian>()?;
        let _version_needed = header.read_u16::<LittleEndian>()?;
        let flags = header.read_u16::<LittleEndian>()?;
        let method = header.read_u16::<LittleEndian>()?;
        let _time = header.read_u16::<LittleEndian>()?;
        let _date = header.read_u16::<LittleEndian>()?;
        let crc = header.read_u32::<LittleEndian>()?;
        let compressed_size = header.read_u32::<LittleEndian>()?;
        let uncompressed_size = header.read_u32::<LittleEndian>()?;
        let name_len = header.read_u16::<LittleEndian>()? as usize;
        let extra_len = header.read_u16::<LittleEndian>()? as usize;
        let comment_len = header.read_u16::<LittleEndian>()? as usize;
        let _disk = header.read_u16::<LittleEndian>()?;
        let _internal_attributes = header.read_u16::<LittleEndian>()?;
        let _external_attributes = header.read_u32::<LittleEndian>()?;
        let local_offset = header.read_u32::<LittleEndian>()?;

        let name_bytes = slice_at(archive, offset + CDFH_LEN, name_len, "entry name")?;
        let name = String::from_utf8_lossy(name_bytes).into_owned();

        Ok(CentralHeader {
            name,
            flags,
            method,
            crc,
            compressed_size,
            uncompressed_size,
            local_offset,
            next_offset: offset + CDFH_LEN + name_len + extra_len + comment_len,
        })
    }

    /// Find and decompress the contents of the entry
    fn contents(&self, archive: &[u8], base: usize) -> Result<Vec<u8>, Error> {
        if self.flags & FLAG_ENCRYPTED != 0 {
            return Err(Error::Encrypted(self.name.clone()));
        }
        if self.compressed_size == ZIP64_MARKER
            || self.uncompressed_size == ZIP64_MARKER
            || self.local_offset == ZIP64_MARKER
        {
            return Err(Error::Zip64(self.name.clone()));
        }

        // Sizes in the local header may be deferred to a data descriptor, so only the name and
        // extra field lengths are taken from it
        let local_offset = base + self.local_offset as usize;
        let mut local = slice_at(archive, local_offset, LFH_LEN, "local file header")?;
        if local.read_u32::<LittleEndian>()? != SIG_LFH {
            return Err(Error::BadSignature {
                offset: local_offset,
                expected: SIG_LFH,
            });
        }
        let mut lengths = &local[22..];
        let name_len = lengths.read_u16::<LittleEndian>()? as usize;
        let extra_len = lengths.read_u16::<LittleEndian>()? as usize;

        let data_offset = local_offset + LFH_LEN + name_len + extra_len;
        let data = slice_at(
            archive,
            data_offset,
            self.compressed_size as usize,
            "entry data",
        )?;

        let bytes = match self.method {
            METHOD_STORED => data.to_vec(),
            METHOD_DEFLATE => {
                let mut bytes = Vec::with_capacity(self.uncompressed_size as usize);
                DeflateDecoder::new(data)
                    .read_to_end(&mut bytes)
                    .map_err(|_| Error::Corrupt(self.name.clone()))?;
                bytes
            }
            method => {
                return Err(Error::UnsupportedCompression {
                    entry: self.name.clone(),
                    method,
                })
            }
        };

        let mut crc = Crc::new();
        crc.update(&bytes);
        if bytes.len() != self.uncompressed_size as usize || crc.sum() != self.crc {
            return Err(Error::Corrupt(self.name.clone()));
        }
        Ok(bytes)
    }
}

/// Write entries to a new zip archive at `path`, deflating each one
pub fn write_class_entries(path: impl AsRef<Path>, entries: &[ClassEntry]) -> Result<(), Error> {
    let path = path.as_ref();
    let archive = zip_entries(entries)?;
    fs::write(path, archive)?;
    log::info!("Wrote {} class entries to {}", entries.len(), path.display());
    Ok(())
}

/// Build the bytes of a zip archive holding the entries
///
/// Timestamps are zeroed so the output only depends on the entries.
pub fn zip_entries(entries: &[ClassEntry]) -> Result<Vec<u8>, Error> {
    let mut out: Vec<u8> = vec![];
    let mut directory: Vec<u8> = vec![];

    let entry_count =
        u16::try_from(entries.len()).map_err(|_| Error::TooLarge(String::from("archive")))?;

    for entry in entries {
        let too_large = || Error::TooLarge(entry.name.clone());
        let name = entry.name.as_bytes();
        let name_len = u16::try_from(name.len()).map_err(|_| too_large())?;

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&entry.bytes)?;
        let data = encoder.finish()?;

        let mut crc = Crc::new();
        crc.update(&entry.bytes);
        let crc = crc.sum();

        let compressed_size = u32::try_from(data.len()).map_err(|_| too_large())?;
        let uncompressed_size = u32::try_from(entry.bytes.len()).map_err(|_| too_large())?;
        let local_offset = u32::try_from(out.len()).map_err(|_| too_large())?;

        out.write_u32::<LittleEndian>(SIG_LFH)?;
        out.write_u16::<LittleEndian>(20)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(METHOD_DEFLATE)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(crc)?;
        out.write_u32::<LittleEndian>(compressed_size)?;
        out.write_u32::<LittleEndian>(uncompressed_size)?;
        out.write_u16::<LittleEndian>(name_len)?;
        out.write_u16::<LittleEndian>(0)?;
        out.extend_from_slice(name);
        out.extend_from_slice(&data);

        directory.write_u32::<LittleEndian>(SIG_CDFH)?;
        directory.write_u16::<LittleEndian>(20)?;
        directory.write_u16::<LittleEndian>(20)?;
        directory.write_u16::<LittleEndian>(0)?;
        directory.write_u16::<LittleEndian>(METHOD_DEFLATE)?;
        directory.write_u16::<LittleEndian>(0)?;
        directory.write_u16::<LittleEndian>(0)?;
        directory.write_u32::<LittleEndian>(crc)?;
        directory.write_u32::<LittleEndian>(compressed_size)?;
        directory.write_u32::<LittleEndian>(uncompressed_size)?;
        directory.write_u16::<LittleEndian>(name_len)?;
        directory.write_u16::<LittleEndian>(0)?;
        directory.write_u16::<LittleEndian>(0)?;
        directory.write_u16::<LittleEndian>(0)?;
        directory.write_u16::<LittleEndian>(0)?;
        directory.write_u32::<LittleEndian>(0)?;
        directory.write_u32::<LittleEndian>(local_offset)?;
        directory.extend_from_slice(name);
    }

    let too_large = || Error::TooLarge(String::from("archive"));
    let directory_offset = u32::try_from(out.len()).map_err(|_| too_large())?;
    let directory_size = u32::try_from(directory.len()).map_err(|_| too_large())?;
    out.extend_from_slice(&directory);

    out.write_u32::<LittleEndian>(SIG_EOCD)?;
    out.write_u16::<LittleEndian>(0)?;
    out.write_u16::<LittleEndian>(0)?;
    out.write_u16::<LittleEndian>(entry_count)?;
    out.write_u16::<LittleEndian>(entry_count)?;
    out.write_u32::<LittleEndian>(directory_size)?;
    out.write_u32::<LittleEndian>(directory_offset)?;
    out.write_u16::<LittleEndian>(0)?;

    Ok(out)
}
