use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write},
};

use crate::{error::{FsError, FsResult, IoResultExt}, Path};

/// A read session over one open file.
///
/// The stream is either open or closed. Every operation on a closed stream
/// fails with `FsError::StreamClosed`. The file is released on `close()` or
/// drop; `std::mem::take` moves it out and leaves a closed stream behind.
#[derive(Default)]
pub struct StreamReader {
    path: Path,
    reader: Option<BufReader<File>>,
    size: u64,
}

impl StreamReader {

    pub fn open(path: &Path) -> FsResult<Self> {
        let file = File::open(path).open_err(path)?;
        let size = file.metadata().metadata_err(path)?.len();

        debug!("cl-fs: Opened {} for reading ({} bytes)", path, size);

        Ok(Self {
            path: path.clone(),
            reader: Some(BufReader::new(file)),
            size,
        })
    }

    /// Like `open`, but a failure leaves a closed stream of size 0.
    pub fn new(path: &Path) -> Self {
        Self::open(path).unwrap_or_else(|e| {
            warn!("cl-fs: {}", e);
            Self { path: path.clone(), ..Self::default() }
        })
    }

    pub fn path(&self) -> &Path { &self.path }
    pub fn is_open(&self) -> bool { self.reader.is_some() }

    // Cached at open time.
    pub fn size(&self) -> u64 { self.size }

    fn reader(&mut self) -> FsResult<&mut BufReader<File>> {
        self.reader.as_mut().ok_or(FsError::StreamClosed)
    }

    /// Reads up to `size` bytes from the current position. The request is
    /// clamped to what is left in the file, so an empty result means end of
    /// file.
    pub fn read(&mut self, size: usize) -> FsResult<Vec<u8>> {
        let total = self.size;
        let path = self.path.clone();
        let reader = self.reader()?;
        if size == 0 { return Err(FsError::EmptyRead) }

        let position = reader.stream_position().io_err(&path)?;
        let remaining = total.saturating_sub(position);
        let size = (size as u64).min(remaining) as usize;

        let mut buffer = vec![0u8; size];
        reader.read_exact(&mut buffer).io_err(&path)?;
        Ok(buffer)
    }

    pub fn read_all(&mut self) -> FsResult<Vec<u8>> {
        let total = self.size;
        let path = self.path.clone();
        let reader = self.reader()?;
        if total == 0 { return Ok(Vec::new()) }

        reader.seek(SeekFrom::Start(0)).io_err(&path)?;
        let mut buffer = vec![0u8; total as usize];
        reader.read_exact(&mut buffer).io_err(&path)?;
        Ok(buffer)
    }

    /// Next line without its line break, or `None` at end of file.
    pub fn read_line(&mut self) -> FsResult<Option<String>> {
        let path = self.path.clone();
        let reader = self.reader()?;

        let mut line = String::new();
        if reader.read_line(&mut line).io_err(&path)? == 0 {
            return Ok(None);
        }

        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') { line.pop(); }
        }
        Ok(Some(line))
    }

    pub fn seek(&mut self, offset: u64) -> FsResult<u64> {
        let path = self.path.clone();
        self.reader()?.seek(SeekFrom::Start(offset)).io_err(&path)
    }

    pub fn position(&mut self) -> FsResult<u64> {
        let path = self.path.clone();
        self.reader()?.stream_position().io_err(&path)
    }

    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("cl-fs: Closed {}", self.path);
        }
        self.size = 0;
    }
}

impl fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamReader")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("size", &self.size)
            .finish()
    }
}

/// A write session over one open file. Same open/closed rules as
/// `StreamReader`.
///
/// Output is buffered; it reaches the file on `flush()`, `close()` or drop.
#[derive(Default)]
pub struct StreamWriter {
    path: Path,
    writer: Option<BufWriter<File>>,
}

impl StreamWriter {

    /// Creates the file if needed. With `append` every write lands at the end
    /// of the file regardless of `seek`; otherwise the file is truncated.
    pub fn open(path: &Path, append: bool) -> FsResult<Self> {
        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }

        let file = options.open(path).open_err(path)?;
        debug!("cl-fs: Opened {} for writing (append: {})", path, append);

        Ok(Self {
            path: path.clone(),
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Like `open`, but a failure leaves a closed stream.
    pub fn new(path: &Path, append: bool) -> Self {
        Self::open(path, append).unwrap_or_else(|e| {
            warn!("cl-fs: {}", e);
            Self { path: path.clone(), writer: None }
        })
    }

    pub fn path(&self) -> &Path { &self.path }
    pub fn is_open(&self) -> bool { self.writer.is_some() }

    fn writer(&mut self) -> FsResult<&mut BufWriter<File>> {
        self.writer.as_mut().ok_or(FsError::StreamClosed)
    }

    // Raw bytes, no line break handling.
    pub fn write(&mut self, buffer: &[u8]) -> FsResult<()> {
        self.write_n(buffer, buffer.len())
    }

    /// Writes the first `size` bytes of `buffer`; a `size` past the end of the
    /// buffer is clamped to its length.
    pub fn write_n(&mut self, buffer: &[u8], size: usize) -> FsResult<()> {
        let path = self.path.clone();
        let writer = self.writer()?;
        if size == 0 || buffer.is_empty() { return Err(FsError::EmptyWrite) }

        let size = size.min(buffer.len());
        writer.write_all(&buffer[..size]).io_err(&path)
    }

    pub fn write_line(&mut self, line: &str) -> FsResult<()> {
        let path = self.path.clone();
        let writer = self.writer()?;
        writer.write_all(line.as_bytes()).io_err(&path)?;
        writer.write_all(b"\n").io_err(&path)
    }

    pub fn flush(&mut self) -> FsResult<()> {
        let path = self.path.clone();
        self.writer()?.flush().io_err(&path)
    }

    pub fn seek(&mut self, offset: u64) -> FsResult<u64> {
        let path = self.path.clone();
        self.writer()?.seek(SeekFrom::Start(offset)).io_err(&path)
    }

    pub fn position(&mut self) -> FsResult<u64> {
        let path = self.path.clone();
        self.writer()?.stream_position().io_err(&path)
    }

    /// Flushes and releases the file. A flush failure is logged; the stream
    /// is closed either way.
    pub fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                error!("cl-fs: Failed to flush {} on close: {}", self.path, e);
            }
            debug!("cl-fs: Closed {}", self.path);
        }
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for StreamWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamWriter")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FileReader, FileWriter};

    fn scratch() -> (tempfile::TempDir, Path) {
        let dir = tempfile::tempdir().unwrap();
        let path = Path::from_std(dir.path()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_empty_file_reads_as_empty() {
        let (_dir, root) = scratch();
        let file = root.join("empty");
        FileWriter::write_bytes(&file, &[]).unwrap();

        let mut reader = StreamReader::open(&file).unwrap();
        assert!(reader.is_open());
        assert_eq!(reader.size(), 0);
        assert!(reader.read_all().unwrap().is_empty());
        assert_eq!(reader.read_line().unwrap(), None);
    }

    #[test]
    fn test_missing_file() {
        let (_dir, root) = scratch();
        let file = root.join("missing");

        assert!(StreamReader::open(&file).unwrap_err().is_not_found());

        let mut reader = StreamReader::new(&file);
        assert!(!reader.is_open());
        assert_eq!(reader.size(), 0);
        assert!(matches!(reader.read(4), Err(FsError::StreamClosed)));
        assert!(matches!(reader.read_all(), Err(FsError::StreamClosed)));
        assert!(matches!(reader.seek(0), Err(FsError::StreamClosed)));
    }

    #[test]
    fn test_read_clamps_to_remaining_bytes() {
        let (_dir, root) = scratch();
        let file = root.join("data");
        FileWriter::write_bytes(&file, b"abcdef").unwrap();

        let mut reader = StreamReader::open(&file).unwrap();
        assert_eq!(reader.size(), 6);
        assert_eq!(reader.read(4).unwrap(), b"abcd");
        assert_eq!(reader.position().unwrap(), 4);
        assert_eq!(reader.read(100).unwrap(), b"ef");
        assert!(reader.read(1).unwrap().is_empty());
        assert!(matches!(reader.read(0), Err(FsError::EmptyRead)));
    }

    #[test]
    fn test_seek_and_read_all() {
        let (_dir, root) = scratch();
        let file = root.join("data");
        FileWriter::write_bytes(&file, b"0123456789").unwrap();

        let mut reader = StreamReader::open(&file).unwrap();
        reader.seek(7).unwrap();
        assert_eq!(reader.read(3).unwrap(), b"789");

        // read_all always starts from the beginning
        assert_eq!(reader.read_all().unwrap(), b"0123456789");
    }

    #[test]
    fn test_read_line() {
        let (_dir, root) = scratch();
        let file = root.join("lines");
        FileWriter::write_bytes(&file, b"one\r\ntwo\nthree").unwrap();

        let mut reader = StreamReader::open(&file).unwrap();
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("one"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("two"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("three"));
        assert_eq!(reader.read_line().unwrap(), None);
    }

    #[test]
    fn test_close_reader() {
        let (_dir, root) = scratch();
        let file = root.join("data");
        FileWriter::write_bytes(&file, b"x").unwrap();

        let mut reader = StreamReader::open(&file).unwrap();
        reader.close();
        assert!(!reader.is_open());
        assert_eq!(reader.size(), 0);
        assert!(matches!(reader.read_line(), Err(FsError::StreamClosed)));
        reader.close();
    }

    #[test]
    fn test_moved_writer_leaves_source_closed() {
        let (_dir, root) = scratch();
        let file = root.join("moved.txt");

        let mut source = StreamWriter::open(&file, false).unwrap();
        let mut dest = std::mem::take(&mut source);

        assert!(!source.is_open());
        assert!(matches!(source.write(b"x"), Err(FsError::StreamClosed)));

        assert!(dest.is_open());
        dest.write_line("moved").unwrap();
        dest.close();
        assert_eq!(FileReader::read_text(&file).unwrap(), "moved\n");
    }

    #[test]
    fn test_moved_reader_leaves_source_closed() {
        let (_dir, root) = scratch();
        let file = root.join("data");
        FileWriter::write_bytes(&file, b"abc").unwrap();

        let mut source = StreamReader::open(&file).unwrap();
        let mut dest = std::mem::take(&mut source);
        assert!(!source.is_open());
        assert_eq!(source.size(), 0);
        assert_eq!(dest.read_all().unwrap(), b"abc");
    }

    #[test]
    fn test_truncate_then_append() {
        let (_dir, root) = scratch();
        let file = root.join("log.txt");
        FileWriter::write_text(&file, "stale").unwrap();

        {
            let mut writer = StreamWriter::open(&file, false).unwrap();
            writer.write_line("first").unwrap();
        }
        {
            let mut writer = StreamWriter::open(&file, true).unwrap();
            writer.write(b"second").unwrap();
            writer.flush().unwrap();
        }

        assert_eq!(FileReader::read_text(&file).unwrap(), "first\nsecond");
    }

    #[test]
    fn test_write_n_clamps_to_buffer() {
        let (_dir, root) = scratch();
        let file = root.join("clamp.bin");

        let mut writer = StreamWriter::open(&file, false).unwrap();
        writer.write_n(b"abcdef", 3).unwrap();
        writer.write_n(b"XY", 10).unwrap();
        assert!(matches!(writer.write_n(b"abc", 0), Err(FsError::EmptyWrite)));
        assert_eq!(writer.position().unwrap(), 5);
        writer.close();

        assert_eq!(FileReader::read_bytes(&file).unwrap(), b"abcXY");
    }

    #[test]
    fn test_writer_seek_overwrites() {
        let (_dir, root) = scratch();
        let file = root.join("seek.bin");

        let mut writer = StreamWriter::open(&file, false).unwrap();
        writer.write(b"aaaa").unwrap();
        writer.seek(1).unwrap();
        writer.write(b"B").unwrap();
        writer.close();
        assert!(matches!(writer.flush(), Err(FsError::StreamClosed)));

        assert_eq!(FileReader::read_bytes(&file).unwrap(), b"aBaa");
    }

    #[test]
    fn test_writer_into_missing_directory() {
        let (_dir, root) = scratch();
        let writer = StreamWriter::new(&root.join("no/such/file"), false);
        assert!(!writer.is_open());
    }
}
