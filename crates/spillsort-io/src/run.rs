//! On-disk run format.
//!
//! Layout on disk:
//! [ magic: u32 ][ version: u16 ][ reserved: u16 ]
//! [ record_count: u64 ][ checksum: 32 bytes ]
//! [ frame: u32 length + payload ]*
//!
//! A placeholder header is written at create time and back-patched by
//! `finish`, so a sealed run is self-describing without external
//! metadata. The checksum is blake3 over every payload byte in frame
//! order; readers verify it when the last frame has been consumed.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use spillsort_core::error::{Error, Result};
use spillsort_core::processor::Processor;
use spillsort_core::record::Record;

pub const MAGIC: u32 = 0x4E52_5353; // "SSRN"
pub const VERSION: u16 = 1;
pub const HEADER_LEN: usize = 4 + 2 + 2 + 8 + 32;

/// Largest frame a reader will accept, bounding allocations when a
/// length prefix is corrupt.
const MAX_FRAME_LEN: u32 = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct RunHeader {
    pub record_count: u64,
    pub checksum: [u8; 32],
}

impl RunHeader {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN);
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // reserved
        out.extend_from_slice(&self.record_count.to_le_bytes());
        out.extend_from_slice(&self.checksum);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::Corrupt("short run header".into()));
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().expect("sliced to width"));
        let version = u16::from_le_bytes(bytes[4..6].try_into().expect("sliced to width"));
        // bytes[6..8] reserved
        if magic != MAGIC || version != VERSION {
            return Err(Error::Corrupt(format!(
                "bad run magic/version {magic:#010x}/{version}"
            )));
        }
        let record_count = u64::from_le_bytes(bytes[8..16].try_into().expect("sliced to width"));
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&bytes[16..48]);
        Ok(Self {
            record_count,
            checksum,
        })
    }
}

/// Streaming writer that seals records into a run file.
///
/// Records must be appended in sort order; the writer does not check.
/// Doubles as a `Processor` sink so a merge can stream straight into it.
pub struct RunWriter<T> {
    out: BufWriter<File>,
    path: PathBuf,
    records: u64,
    hasher: blake3::Hasher,
    finished: bool,
    _record: PhantomData<fn(T)>,
}

impl<T: Record> RunWriter<T> {
    /// Open `path` for writing. Any pre-allocated length is preserved
    /// until `finish` truncates to the bytes actually written.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().write(true).create(true).open(&path)?;
        let mut out = BufWriter::new(file);
        out.write_all(&[0u8; HEADER_LEN])?;
        Ok(Self {
            out,
            path,
            records: 0,
            hasher: blake3::Hasher::new(),
            finished: false,
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn append(&mut self, record: &T) -> Result<()> {
        let payload = serde_json::to_vec(record)?;
        self.out.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.out.write_all(&payload)?;
        self.hasher.update(&payload);
        self.records += 1;
        Ok(())
    }

    /// Back-patch the header, truncate pre-allocation slack, and flush.
    /// Returns the final file length in bytes.
    pub fn finish(&mut self) -> Result<u64> {
        if self.finished {
            return Err(Error::Protocol("run writer already finished".into()));
        }
        self.out.flush()?;
        let header = RunHeader {
            record_count: self.records,
            checksum: self.hasher.finalize().into(),
        };
        let file = self.out.get_mut();
        let end = file.stream_position()?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.to_bytes())?;
        file.set_len(end)?;
        self.finished = true;
        Ok(end)
    }
}

impl<T: Record> Processor<T> for RunWriter<T> {
    fn process(&mut self, record: T) -> Result<()> {
        self.append(&record)
    }

    fn close(&mut self) -> Result<()> {
        self.finish().map(|_| ())
    }
}

/// Streaming reader over a sealed run.
///
/// Buffers up to `chunk` decoded records at a time, so merging many runs
/// costs bounded memory per input.
pub struct RunReader<T> {
    input: BufReader<File>,
    path: PathBuf,
    remaining: u64,
    expected: [u8; 32],
    hasher: blake3::Hasher,
    buffered: VecDeque<T>,
    chunk: usize,
    verified: bool,
}

impl<T: Record> RunReader<T> {
    pub fn open(path: impl Into<PathBuf>, chunk: usize) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        let mut input = BufReader::new(file);
        let mut raw = [0u8; HEADER_LEN];
        read_frame_bytes(&mut input, &mut raw, &path)?;
        let header = RunHeader::from_bytes(&raw)?;
        Ok(Self {
            input,
            path,
            remaining: header.record_count,
            expected: header.checksum,
            hasher: blake3::Hasher::new(),
            buffered: VecDeque::new(),
            chunk: chunk.max(1),
            verified: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next record in run order, or `None` at end of run.
    pub fn next_record(&mut self) -> Result<Option<T>> {
        if self.buffered.is_empty() {
            self.refill()?;
        }
        Ok(self.buffered.pop_front())
    }

    fn refill(&mut self) -> Result<()> {
        while self.buffered.len() < self.chunk && self.remaining > 0 {
            let mut len_raw = [0u8; 4];
            read_frame_bytes(&mut self.input, &mut len_raw, &self.path)?;
            let len = u32::from_le_bytes(len_raw);
            if len > MAX_FRAME_LEN {
                return Err(Error::Corrupt(format!(
                    "{}: frame of {len} bytes exceeds limit",
                    self.path.display()
                )));
            }
            let mut payload = vec![0u8; len as usize];
            read_frame_bytes(&mut self.input, &mut payload, &self.path)?;
            self.hasher.update(&payload);
            self.buffered.push_back(serde_json::from_slice(&payload)?);
            self.remaining -= 1;
        }
        if self.remaining == 0 && !self.verified {
            let got: [u8; 32] = self.hasher.finalize().into();
            if got != self.expected {
                return Err(Error::Corrupt(format!(
                    "{}: checksum mismatch",
                    self.path.display()
                )));
            }
            self.verified = true;
        }
        Ok(())
    }
}

fn read_frame_bytes(input: &mut BufReader<File>, buf: &mut [u8], path: &Path) -> Result<()> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            Error::Corrupt(format!("{}: truncated run", path.display()))
        }
        _ => Error::Io(e),
    })
}
