use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Largest payload replay will believe. A length prefix above this is
/// treated as a torn write rather than an allocation request.
const MAX_RECORD_LEN: usize = 1 << 20;

fn write_record(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())
}

/// Read one record and its size on disk. `Ok(None)` means clean end of log
/// or a tail that cannot be trusted (short read, bad CRC, undecodable payload).
fn read_record(reader: &mut impl Read) -> io::Result<Option<(Event, u64)>> {
    let mut word = [0u8; 4];
    if !read_full(reader, &mut word)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(word) as usize;
    if len > MAX_RECORD_LEN {
        return Ok(None);
    }

    let mut payload = vec![0u8; len];
    if !read_full(reader, &mut payload)? || !read_full(reader, &mut word)? {
        return Ok(None);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(bincode::deserialize(&payload)
        .ok()
        .map(|event| (event, len as u64 + 8)))
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Append-only log of ledger events.
///
/// Record layout: `[u32 le: payload len][bincode Event][u32 le: crc32 of payload]`.
/// A torn or corrupt tail left by a crash is dropped on replay and cut off
/// the file by `recover`; everything before it is kept.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            writer: BufWriter::new(open_append(path)?),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    /// Append and fsync one event. The ledger batches through
    /// `append_buffered` + `flush_sync` instead.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer an event without syncing. Not durable until `flush_sync`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        write_record(&mut self.writer, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn compact_path(path: &Path) -> PathBuf {
        path.with_extension("wal.tmp")
    }

    /// Write `events` to the side file next to `path` and fsync it.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(Self::compact_path(path))?);
        for event in events {
            write_record(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the side file over the log and reopen for appending.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        fs::rename(Self::compact_path(&self.path), &self.path)?;
        self.writer = BufWriter::new(open_append(&self.path)?);
        self.appends_since_compact = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Every intact event in the log at `path`. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        Ok(Self::scan(path)?.events)
    }

    /// Replay, then cut off any torn or corrupt tail so that records
    /// appended afterwards sit directly behind the last intact one.
    pub fn recover(path: &Path) -> io::Result<Vec<Event>> {
        let scan = Self::scan(path)?;
        if scan.valid_len < scan.file_len {
            tracing::warn!(
                path = %path.display(),
                discarded = scan.file_len - scan.valid_len,
                "truncating torn WAL tail"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }
        Ok(scan.events)
    }

    fn scan(path: &Path) -> io::Result<Scan> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Scan {
                    events: Vec::new(),
                    valid_len: 0,
                    file_len: 0,
                });
            }
            Err(e) => return Err(e),
        };
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut valid_len = 0u64;

        while let Some((event, size)) = read_record(&mut reader)? {
            valid_len += size;
            events.push(event);
        }
        Ok(Scan {
            events,
            valid_len,
            file_len,
        })
    }
}

struct Scan {
    events: Vec<Event>,
    /// Bytes up to the end of the last intact record.
    valid_len: u64,
    file_len: u64,
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Booking, BookingDetails};
    use ulid::Ulid;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("tableslot_test_wal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn table(label: &str) -> Event {
        Event::ResourceCreated {
            id: Ulid::new(),
            label: label.into(),
            capacity: 4,
            location: None,
        }
    }

    fn booked(resource_id: Ulid, start: &str) -> Event {
        Event::BookingCreated {
            booking: Booking {
                id: Ulid::new(),
                details: BookingDetails {
                    resource_id,
                    day: "today".into(),
                    start_slot: start.into(),
                    duration_minutes: 60,
                    customer_name: "Grace".into(),
                    customer_phone: "555-0199".into(),
                    guest_count: 3,
                    notes: Some("window seat".into()),
                },
            },
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.wal");
        let t = Ulid::new();
        let events = vec![table("1"), booked(t, "18:00"), booked(t, "19:30")];
        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append(e).unwrap();
            }
        }
        assert_eq!(Wal::replay(&path).unwrap(), events);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let path = tmp_path("missing.wal");
        assert!(Wal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn torn_tail_is_dropped() {
        let path = tmp_path("torn.wal");
        let first = table("1");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&first).unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[9, 0, 0, 0, 1, 2]).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![first]);
    }

    #[test]
    fn bad_crc_stops_replay() {
        let path = tmp_path("bad_crc.wal");
        let good = table("1");
        let bad = Event::BookingCancelled {
            id: Ulid::new(),
            resource_id: Ulid::new(),
        };
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&good).unwrap();
            let payload = bincode::serialize(&bad).unwrap();
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEAD_BEEFu32.to_le_bytes()).unwrap();
            // A valid record after the corrupt one is not trusted either.
            wal.append(&table("2")).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![good]);
    }

    #[test]
    fn recover_cuts_torn_tail_so_later_appends_replay() {
        let path = tmp_path("recover.wal");
        let first = table("1");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&first).unwrap();
        }
        let intact = fs::metadata(&path).unwrap().len();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[9, 0, 0, 0, 1, 2]).unwrap();
        }

        assert_eq!(Wal::recover(&path).unwrap(), vec![first.clone()]);
        assert_eq!(fs::metadata(&path).unwrap().len(), intact);

        let second = table("2");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&second).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![first, second]);
    }

    #[test]
    fn recover_leaves_clean_log_alone() {
        let path = tmp_path("recover_clean.wal");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&table("1")).unwrap();
        }
        let before = fs::metadata(&path).unwrap().len();
        assert_eq!(Wal::recover(&path).unwrap().len(), 1);
        assert_eq!(fs::metadata(&path).unwrap().len(), before);
        assert!(Wal::recover(&tmp_path("recover_missing.wal")).unwrap().is_empty());
    }

    #[test]
    fn absurd_length_prefix_is_not_allocated() {
        let path = tmp_path("huge_len.wal");
        fs::write(&path, u32::MAX.to_le_bytes()).unwrap();
        assert!(Wal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn compact_shrinks_log_and_accepts_appends() {
        let path = tmp_path("compact.wal");
        let resource = table("1");
        let Event::ResourceCreated { id: t, .. } = resource else {
            unreachable!()
        };
        let keep = booked(t, "20:00");
        let after = booked(t, "21:00");

        let mut wal = Wal::open(&path).unwrap();
        wal.append(&resource).unwrap();
        for _ in 0..10 {
            let Event::BookingCreated { booking } = booked(t, "17:00") else {
                unreachable!()
            };
            let id = booking.id;
            wal.append(&Event::BookingCreated { booking }).unwrap();
            wal.append(&Event::BookingCancelled { id, resource_id: t }).unwrap();
        }
        wal.append(&keep).unwrap();
        assert_eq!(wal.appends_since_compact(), 22);
        let before = fs::metadata(&path).unwrap().len();

        wal.compact(&[resource.clone(), keep.clone()]).unwrap();
        assert_eq!(wal.appends_since_compact(), 0);
        assert!(fs::metadata(&path).unwrap().len() < before);

        wal.append(&after).unwrap();
        drop(wal);
        assert_eq!(Wal::replay(&path).unwrap(), vec![resource, keep, after]);
    }

    #[test]
    fn buffered_appends_land_after_flush() {
        let path = tmp_path("buffered.wal");
        let events: Vec<Event> = (1..=5).map(|i| table(&i.to_string())).collect();
        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append_buffered(e).unwrap();
            }
            assert_eq!(wal.appends_since_compact(), 5);
            wal.flush_sync().unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), events);
    }
}
