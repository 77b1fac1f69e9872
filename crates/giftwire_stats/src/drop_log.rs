//! # Drop Log
//!
//! **Append-only history of resolution runs**
//!
//! Every completed run is appended as one record. Statistics are always
//! recomputed from the full history, so the log is the only state kept.
//!
//! ## Guarantees
//!
//! 1. **Durability**: once `append()` returns, the record is on disk
//! 2. **Serialized writers**: appends from several threads never interleave
//! 3. **Recovery**: a torn record at the tail is cut off on open, and a
//!    failed append is rolled back so later records stay reachable
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "GDRP"]
//! [4 bytes: version]
//!
//! Record format:
//! [8 bytes: sequence number]
//! [4 bytes: payload length]
//! [N bytes: payload]
//! [4 bytes: CRC32 of above]
//!
//! Payload:
//! [8 bytes: timestamp][8 bytes: total opened][4 bytes: entry count]
//! entry count x ([4 bytes: name length][name bytes][8 bytes: quantity])
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{StatsError, StatsResult};
use crate::record::{DropSession, LootAggregate};

/// Magic bytes identifying a drop log file.
const LOG_MAGIC: &[u8; 4] = b"GDRP";

/// Current log format version.
const LOG_VERSION: u32 = 1;

/// Header length in bytes.
const HEADER_LEN: usize = 8;

/// Sequence number + payload length.
const RECORD_PREFIX_LEN: usize = 12;

/// Trailing CRC.
const RECORD_CRC_LEN: usize = 4;

fn header() -> [u8; HEADER_LEN] {
    let mut bytes = [0u8; HEADER_LEN];
    bytes[..4].copy_from_slice(LOG_MAGIC);
    bytes[4..].copy_from_slice(&LOG_VERSION.to_le_bytes());
    bytes
}

/// Empty, or a prefix of our header left by a crash during creation.
fn is_unfinished_header(data: &[u8]) -> bool {
    data.len() < HEADER_LEN && header().starts_with(data)
}

/// Storage for recorded sessions.
///
/// Implementations must serialize concurrent appends.
pub trait DropLog: Send + Sync {
    /// Appends one session.
    fn append(&self, session: &DropSession) -> StatsResult<()>;

    /// Returns every session in append order.
    fn sessions(&self) -> StatsResult<Vec<DropSession>>;
}

// =============================================================================
// IN-MEMORY LOG
// =============================================================================

/// Drop log kept only in memory.
#[derive(Debug, Default)]
pub struct MemoryDropLog {
    sessions: Mutex<Vec<DropSession>>,
}

impl MemoryDropLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DropLog for MemoryDropLog {
    fn append(&self, session: &DropSession) -> StatsResult<()> {
        self.sessions.lock().push(session.clone());
        Ok(())
    }

    fn sessions(&self) -> StatsResult<Vec<DropSession>> {
        Ok(self.sessions.lock().clone())
    }
}

// =============================================================================
// FILE LOG
// =============================================================================

struct FileState {
    file: File,
    sessions: Vec<DropSession>,
    next_seq: u64,
}

/// Drop log persisted to a single file.
pub struct FileDropLog {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileDropLog {
    /// Opens or creates a log file.
    ///
    /// An existing file is replayed; a damaged tail is truncated away.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Corrupt`] if the file was not written by this
    /// log, or [`StatsError::Io`] if it cannot be read or written.
    pub fn open(path: impl AsRef<Path>) -> StatsResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let (sessions, next_seq) = if is_unfinished_header(&data) {
            if !data.is_empty() {
                tracing::warn!(path = %path.display(), bytes = data.len(), "Drop log header unfinished, rewriting");
                file.set_len(0)?;
                file.seek(SeekFrom::Start(0))?;
            }
            file.write_all(&header())?;
            file.sync_all()?;
            (Vec::new(), 0)
        } else {
            let replay = replay(&data)?;
            if replay.valid_len < data.len() {
                tracing::warn!(
                    path = %path.display(),
                    dropped_bytes = data.len() - replay.valid_len,
                    "Drop log had a damaged tail, truncating"
                );
                file.set_len(replay.valid_len as u64)?;
                file.sync_all()?;
            }
            (replay.sessions, replay.next_seq)
        };
        file.seek(SeekFrom::End(0))?;

        tracing::debug!(path = %path.display(), sessions = sessions.len(), "Drop log opened");

        Ok(Self {
            path,
            state: Mutex::new(FileState {
                file,
                sessions,
                next_seq,
            }),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of sessions recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DropLog for FileDropLog {
    fn append(&self, session: &DropSession) -> StatsResult<()> {
        let payload = encode_session(session)?;
        let payload_len = u32::try_from(payload.len())
            .map_err(|_| StatsError::Encoding("session payload exceeds 4 GiB".to_string()))?;

        let mut state = self.state.lock();
        let seq = state.next_seq;

        let mut record = Vec::with_capacity(RECORD_PREFIX_LEN + payload.len() + RECORD_CRC_LEN);
        record.extend_from_slice(&seq.to_le_bytes());
        record.extend_from_slice(&payload_len.to_le_bytes());
        record.extend_from_slice(&payload);
        let crc = crc32fast::hash(&record);
        record.extend_from_slice(&crc.to_le_bytes());

        append_record(&mut state.file, &record)?;

        state.next_seq += 1;
        state.sessions.push(session.clone());
        Ok(())
    }

    fn sessions(&self) -> StatsResult<Vec<DropSession>> {
        Ok(self.state.lock().sessions.clone())
    }
}

/// File operations an append needs.
trait RecordFile: Write + Seek {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl RecordFile for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Writes one record at the end of the file. On failure the file is cut
/// back to where the record started, so the next append does not land
/// behind a torn record that replay would stop at.
fn append_record<F: RecordFile>(file: &mut F, record: &[u8]) -> io::Result<()> {
    let offset = file.stream_position()?;
    let Err(error) = file.write_all(record).and_then(|()| file.sync()) else {
        return Ok(());
    };

    tracing::warn!(offset, %error, "Drop log append failed, rolling back");
    let rollback = file
        .truncate_to(offset)
        .and_then(|()| file.seek(SeekFrom::Start(offset)).map(drop));
    if let Err(rollback_error) = rollback {
        tracing::error!(offset, error = %rollback_error, "Drop log rollback failed");
    }
    Err(error)
}

// =============================================================================
// ENCODING
// =============================================================================

fn encode_session(session: &DropSession) -> StatsResult<Vec<u8>> {
    let count = u32::try_from(session.loot.len())
        .map_err(|_| StatsError::Encoding("too many distinct items".to_string()))?;

    let mut buf = Vec::with_capacity(20 + session.loot.len() * 24);
    buf.extend_from_slice(&session.timestamp.to_le_bytes());
    buf.extend_from_slice(&session.total_opened.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());

    for (name, quantity) in session.loot.iter() {
        let name_len = u32::try_from(name.len())
            .map_err(|_| StatsError::Encoding(format!("item name too long ({} bytes)", name.len())))?;
        buf.extend_from_slice(&name_len.to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&quantity.to_le_bytes());
    }

    Ok(buf)
}

/// Little-endian cursor over a byte slice.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let slice = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn u32(&mut self) -> Option<u32> {
        Some(u32::from_le_bytes(self.take(4)?.try_into().ok()?))
    }

    fn u64(&mut self) -> Option<u64> {
        Some(u64::from_le_bytes(self.take(8)?.try_into().ok()?))
    }
}

fn decode_session(payload: &[u8]) -> Option<DropSession> {
    let mut cursor = Cursor::new(payload);
    let timestamp = cursor.u64()?;
    let total_opened = cursor.u64()?;
    let count = cursor.u32()?;

    let mut loot = LootAggregate::new();
    for _ in 0..count {
        let name_len = cursor.u32()? as usize;
        let name = std::str::from_utf8(cursor.take(name_len)?).ok()?;
        let quantity = cursor.u64()?;
        loot.add(name, quantity);
    }

    (cursor.pos == payload.len()).then_some(DropSession {
        timestamp,
        total_opened,
        loot,
    })
}

struct Replay {
    sessions: Vec<DropSession>,
    next_seq: u64,
    valid_len: usize,
}

/// Reads every intact record; stops at the first damaged one.
fn replay(data: &[u8]) -> StatsResult<Replay> {
    if data.len() < HEADER_LEN {
        return Err(StatsError::Corrupt("truncated header".to_string()));
    }
    if &data[0..4] != LOG_MAGIC {
        return Err(StatsError::Corrupt("invalid magic".to_string()));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&data[4..8]);
    let version = u32::from_le_bytes(version);
    if version != LOG_VERSION {
        return Err(StatsError::Corrupt(format!("unsupported version {version}")));
    }

    let mut sessions = Vec::new();
    let mut next_seq = 0;
    let mut cursor = Cursor::new(data);
    cursor.pos = HEADER_LEN;
    let mut valid_len = HEADER_LEN;

    while let Some((seq, session)) = read_record(&mut cursor) {
        sessions.push(session);
        next_seq = seq + 1;
        valid_len = cursor.pos;
    }

    Ok(Replay {
        sessions,
        next_seq,
        valid_len,
    })
}

fn read_record(cursor: &mut Cursor<'_>) -> Option<(u64, DropSession)> {
    let start = cursor.pos;
    let seq = cursor.u64()?;
    let payload_len = cursor.u32()? as usize;
    let payload = cursor.take(payload_len)?;
    let body_end = cursor.pos;
    let stored_crc = cursor.u32()?;

    if crc32fast::hash(&cursor.data[start..body_end]) != stored_crc {
        return None;
    }
    Some((seq, decode_session(payload)?))
}
