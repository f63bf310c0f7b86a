use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write},
};

use crate::{error::{FsError, FsResult, IoResultExt}, Path};

/// One-shot reads keyed by path. Every call opens and closes its own handle.
///
/// A missing or unreadable file is an `Err`; an empty file is `Ok` with an
/// empty result.
pub struct FileReader;

impl FileReader {

    pub fn read_bytes(path: &Path) -> FsResult<Vec<u8>> {
        let mut file = File::open(path).open_err(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).io_err(path)?;
        Ok(bytes)
    }

    pub fn read_text(path: &Path) -> FsResult<String> {
        let bytes = Self::read_bytes(path)?;
        String::from_utf8(bytes).map_err(|source| FsError::InvalidUtf8 {
            path: path.clone(),
            source
        })
    }

    // Line breaks (`\n` or `\r\n`) are stripped.
    pub fn read_lines(path: &Path) -> FsResult<Vec<String>> {
        let file = File::open(path).open_err(path)?;
        BufReader::new(file)
            .lines()
            .collect::<std::io::Result<Vec<_>>>()
            .io_err(path)
    }

    /// Reads exactly `size` bytes starting at `offset`. A range that is empty
    /// or reaches past the end of the file is rejected; nothing partial is
    /// ever returned.
    pub fn read_block(path: &Path, size: usize, offset: u64) -> FsResult<Vec<u8>> {
        let mut file = File::open(path).open_err(path)?;
        let file_size = file.metadata().metadata_err(path)?.len();

        let in_range = match offset.checked_add(size as u64) {
            Some(end) => size > 0 && offset < file_size && end <= file_size,
            None => false,
        };

        if !in_range {
            return Err(FsError::BlockOutOfRange { size, offset, file_size });
        }

        file.seek(SeekFrom::Start(offset)).io_err(path)?;
        let mut buffer = vec![0u8; size];
        file.read_exact(&mut buffer).io_err(path)?;
        Ok(buffer)
    }

    pub fn query_file_size(path: &Path) -> FsResult<u64> {
        let file = File::open(path).open_err(path)?;
        Ok(file.metadata().metadata_err(path)?.len())
    }
}

/// One-shot writes keyed by path. Writes are not atomic: a failure part way
/// through leaves whatever reached the disk in place.
pub struct FileWriter;

impl FileWriter {

    // Truncates or creates.
    pub fn write_bytes(path: &Path, data: &[u8]) -> FsResult<()> {
        let mut file = File::create(path).open_err(path)?;
        file.write_all(data).io_err(path)
    }

    /// Truncates and writes `text`, making sure it ends in exactly one line
    /// break. Empty text is rejected before the file is touched.
    pub fn write_text(path: &Path, text: &str) -> FsResult<()> {
        if text.is_empty() {
            return Err(FsError::EmptyText(path.clone()));
        }

        let mut file = BufWriter::new(File::create(path).open_err(path)?);
        file.write_all(text.as_bytes()).io_err(path)?;
        if !text.ends_with('\n') {
            file.write_all(b"\n").io_err(path)?;
        }
        file.flush().io_err(path)
    }

    /// Truncates and writes each line followed by a line break. Stops at the
    /// first failed line; `PartialWrite::written` counts the lines that were
    /// handed to the OS before it.
    pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> FsResult<()> {
        // Unbuffered so a failure is reported against the line that caused it
        let mut file = File::create(path).open_err(path)?;
        let total = lines.len();
        let mut record = Vec::new();

        for (written, line) in lines.iter().enumerate() {
            record.clear();
            record.extend_from_slice(line.as_ref().as_bytes());
            record.push(b'\n');

            file.write_all(&record).map_err(|e| FsError::PartialWrite {
                path: path.clone(),
                written,
                total,
                source: e.into(),
            })?;
        }

        Ok(())
    }

    /// Writes `data` at `offset` into an existing file without truncating it.
    /// Writing past the end extends the file.
    pub fn write_block(path: &Path, data: &[u8], offset: u64) -> FsResult<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .open_err(path)?;

        file.seek(SeekFrom::Start(offset)).io_err(path)?;
        file.write_all(data).io_err(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, Path) {
        let dir = tempfile::tempdir().unwrap();
        let path = Path::from_std(dir.path()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_bytes_round_trip() {
        let (_dir, root) = scratch();
        let file = root.join("data.bin");
        let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

        FileWriter::write_bytes(&file, &payload).unwrap();
        assert_eq!(FileReader::read_bytes(&file).unwrap(), payload);

        FileWriter::write_bytes(&file, b"short").unwrap();
        assert_eq!(FileReader::read_bytes(&file).unwrap(), b"short");
    }

    #[test]
    fn test_empty_file_is_not_a_failure() {
        let (_dir, root) = scratch();
        let file = root.join("empty");
        FileWriter::write_bytes(&file, &[]).unwrap();

        assert!(FileReader::read_bytes(&file).unwrap().is_empty());
        assert_eq!(FileReader::query_file_size(&file).unwrap(), 0);
        assert!(FileReader::read_lines(&file).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_a_failure() {
        let (_dir, root) = scratch();
        let file = root.join("missing");

        assert!(FileReader::read_bytes(&file).unwrap_err().is_not_found());
        assert!(FileReader::read_text(&file).unwrap_err().is_not_found());
        assert!(FileReader::read_lines(&file).unwrap_err().is_not_found());
        assert!(FileReader::query_file_size(&file).unwrap_err().is_not_found());
    }

    #[test]
    fn test_write_text_enforces_trailing_newline() {
        let (_dir, root) = scratch();
        let file = root.join("hello.txt");

        FileWriter::write_text(&file, "hello").unwrap();
        assert_eq!(FileReader::read_text(&file).unwrap(), "hello\n");

        FileWriter::write_text(&file, "already\n").unwrap();
        assert_eq!(FileReader::read_text(&file).unwrap(), "already\n");
    }

    #[test]
    fn test_write_text_rejects_empty_input() {
        let (_dir, root) = scratch();
        let file = root.join("keep.txt");
        FileWriter::write_text(&file, "keep").unwrap();

        assert!(matches!(
            FileWriter::write_text(&file, ""),
            Err(FsError::EmptyText(_))
        ));
        assert_eq!(FileReader::read_text(&file).unwrap(), "keep\n");
    }

    #[test]
    fn test_read_text_rejects_invalid_utf8() {
        let (_dir, root) = scratch();
        let file = root.join("binary");
        FileWriter::write_bytes(&file, &[0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(FileReader::read_text(&file), Err(FsError::InvalidUtf8 { .. })));
    }

    #[test]
    fn test_lines_round_trip() {
        let (_dir, root) = scratch();
        let file = root.join("lines.txt");

        FileWriter::write_lines(&file, &["one", "", "three"]).unwrap();
        assert_eq!(FileReader::read_text(&file).unwrap(), "one\n\nthree\n");
        assert_eq!(FileReader::read_lines(&file).unwrap(), vec!["one", "", "three"]);
    }

    #[test]
    fn test_read_lines_strips_crlf() {
        let (_dir, root) = scratch();
        let file = root.join("dos.txt");
        FileWriter::write_bytes(&file, b"a\r\nb\r\nc").unwrap();
        assert_eq!(FileReader::read_lines(&file).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_read_block_in_range() {
        let (_dir, root) = scratch();
        let file = root.join("block.bin");
        FileWriter::write_bytes(&file, b"0123456789").unwrap();

        assert_eq!(FileReader::read_block(&file, 4, 0).unwrap(), b"0123");
        assert_eq!(FileReader::read_block(&file, 3, 7).unwrap(), b"789");
        assert_eq!(FileReader::read_block(&file, 10, 0).unwrap(), b"0123456789");
    }

    #[test]
    fn test_read_block_never_returns_partial_data() {
        let (_dir, root) = scratch();
        let file = root.join("block.bin");
        FileWriter::write_bytes(&file, b"0123456789").unwrap();

        for (size, offset) in [(4, 7), (1, 10), (11, 0), (0, 0), (1, u64::MAX)] {
            match FileReader::read_block(&file, size, offset) {
                Err(FsError::BlockOutOfRange { file_size, .. }) => assert_eq!(file_size, 10),
                other => panic!("read_block({size}, {offset}) returned {other:?}"),
            }
        }
    }

    #[test]
    fn test_write_block_overwrites_and_extends() {
        let (_dir, root) = scratch();
        let file = root.join("patch.bin");
        FileWriter::write_bytes(&file, b"aaaaaa").unwrap();

        FileWriter::write_block(&file, b"BB", 2).unwrap();
        assert_eq!(FileReader::read_bytes(&file).unwrap(), b"aaBBaa");

        FileWriter::write_block(&file, b"CCC", 5).unwrap();
        assert_eq!(FileReader::read_bytes(&file).unwrap(), b"aaBBaCCC");
        assert_eq!(FileReader::query_file_size(&file).unwrap(), 8);
    }

    #[test]
    fn test_write_block_requires_existing_file() {
        let (_dir, root) = scratch();
        let file = root.join("absent.bin");
        assert!(FileWriter::write_block(&file, b"x", 0).unwrap_err().is_not_found());
        assert!(!file.exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_write_lines_reports_first_failed_line() {
        let full = Path::new("/dev/full");
        if !full.exists() { return }

        match FileWriter::write_lines(&full, &["a", "b", "c"]) {
            Err(FsError::PartialWrite { written, total, source, .. }) => {
                assert_eq!(written, 0);
                assert_eq!(total, 3);
                assert_eq!(source, crate::OsError::NoSpace);
            },
            other => panic!("expected PartialWrite, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_write_lines_keeps_lines_before_failure() {
        use std::{ffi::CString, os::unix::ffi::OsStrExt};

        let (_dir, root) = scratch();
        let fifo = root.join("pipe");
        let c_path = CString::new(fifo.as_std_path().as_os_str().as_bytes()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

        // The reader takes the two short lines and hangs up while the oversized
        // third line is still being written.
        let reader_path = fifo.clone();
        let reader = std::thread::spawn(move || {
            let mut pipe = File::open(&reader_path).unwrap();
            let mut head = [0u8; 4];
            pipe.read_exact(&mut head).unwrap();
            head
        });

        let big = "x".repeat(4 * 1024 * 1024);
        let result = FileWriter::write_lines(&fifo, &["a", "b", big.as_str(), "d"]);

        assert_eq!(&reader.join().unwrap(), b"a\nb\n");
        match result {
            Err(FsError::PartialWrite { written, total, .. }) => {
                assert_eq!(written, 2);
                assert_eq!(total, 4);
            },
            other => panic!("expected PartialWrite, got {other:?}"),
        }
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let (_dir, root) = scratch();
        let file = root.join("no/such/dir/file.txt");
        assert!(matches!(
            FileWriter::write_bytes(&file, b"x"),
            Err(FsError::Open { .. })
        ));
        assert!(FileWriter::write_lines(&file, &["x"]).is_err());
    }
}
