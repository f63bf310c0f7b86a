use crate::{
    file::{FileReader, FileWriter},
    handle::IoHandle,
    pool::ThreadPool,
    FsResult,
    Path,
};

fn dispatch<T, F>(work: F) -> IoHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> FsResult<T> + Send + 'static,
{
    match crate::pool() {
        Ok(pool) => pool.run(work),
        Err(e) => {
            error!("cl-fs: Global pool unavailable: {}", e);
            IoHandle::ready(Err(e.into()))
        }
    }
}

/// `FileReader` operations run on a worker thread.
///
/// The plain methods use the global pool; the `*_on` variants take an
/// explicit one.
pub struct AsyncFileReader;

impl AsyncFileReader {

    pub fn read_bytes(path: &Path) -> IoHandle<Vec<u8>> {
        let path = path.clone();
        dispatch(move || FileReader::read_bytes(&path))
    }

    pub fn read_text(path: &Path) -> IoHandle<String> {
        let path = path.clone();
        dispatch(move || FileReader::read_text(&path))
    }

    pub fn read_lines(path: &Path) -> IoHandle<Vec<String>> {
        let path = path.clone();
        dispatch(move || FileReader::read_lines(&path))
    }

    pub fn read_block(path: &Path, size: usize, offset: u64) -> IoHandle<Vec<u8>> {
        let path = path.clone();
        dispatch(move || FileReader::read_block(&path, size, offset))
    }

    pub fn read_bytes_on(pool: &ThreadPool, path: &Path) -> IoHandle<Vec<u8>> {
        let path = path.clone();
        pool.run(move || FileReader::read_bytes(&path))
    }

    pub fn read_text_on(pool: &ThreadPool, path: &Path) -> IoHandle<String> {
        let path = path.clone();
        pool.run(move || FileReader::read_text(&path))
    }

    pub fn read_lines_on(pool: &ThreadPool, path: &Path) -> IoHandle<Vec<String>> {
        let path = path.clone();
        pool.run(move || FileReader::read_lines(&path))
    }

    pub fn read_block_on(
        pool: &ThreadPool,
        path: &Path,
        size: usize,
        offset: u64,
    ) -> IoHandle<Vec<u8>> {
        let path = path.clone();
        pool.run(move || FileReader::read_block(&path, size, offset))
    }
}

/// `FileWriter` operations run on a worker thread. Input is copied before
/// submission so the caller's buffers can be reused immediately.
pub struct AsyncFileWriter;

impl AsyncFileWriter {

    pub fn write_bytes(path: &Path, data: &[u8]) -> IoHandle<()> {
        let (path, data) = (path.clone(), data.to_vec());
        dispatch(move || FileWriter::write_bytes(&path, &data))
    }

    pub fn write_text(path: &Path, text: &str) -> IoHandle<()> {
        let (path, text) = (path.clone(), text.to_string());
        dispatch(move || FileWriter::write_text(&path, &text))
    }

    pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> IoHandle<()> {
        let path = path.clone();
        let lines: Vec<String> = lines.iter().map(|l| l.as_ref().to_string()).collect();
        dispatch(move || FileWriter::write_lines(&path, &lines))
    }

    pub fn write_block(path: &Path, data: &[u8], offset: u64) -> IoHandle<()> {
        let (path, data) = (path.clone(), data.to_vec());
        dispatch(move || FileWriter::write_block(&path, &data, offset))
    }

    pub fn write_bytes_on(pool: &ThreadPool, path: &Path, data: &[u8]) -> IoHandle<()> {
        let (path, data) = (path.clone(), data.to_vec());
        pool.run(move || FileWriter::write_bytes(&path, &data))
    }

    pub fn write_text_on(pool: &ThreadPool, path: &Path, text: &str) -> IoHandle<()> {
        let (path, text) = (path.clone(), text.to_string());
        pool.run(move || FileWriter::write_text(&path, &text))
    }

    pub fn write_lines_on<S: AsRef<str>>(
        pool: &ThreadPool,
        path: &Path,
        lines: &[S],
    ) -> IoHandle<()> {
        let path = path.clone();
        let lines: Vec<String> = lines.iter().map(|l| l.as_ref().to_string()).collect();
        pool.run(move || FileWriter::write_lines(&path, &lines))
    }

    pub fn write_block_on(
        pool: &ThreadPool,
        path: &Path,
        data: &[u8],
        offset: u64,
    ) -> IoHandle<()> {
        let (path, data) = (path.clone(), data.to_vec());
        pool.run(move || FileWriter::write_block(&path, &data, offset))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::FsError;

    fn scratch() -> (tempfile::TempDir, Path) {
        let dir = tempfile::tempdir().unwrap();
        let path = Path::from_std(dir.path()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_global_pool_round_trip() {
        let (_dir, root) = scratch();
        let file = root.join("async.txt");

        AsyncFileWriter::write_text(&file, "hello").wait().unwrap();
        assert_eq!(AsyncFileReader::read_text(&file).wait().unwrap(), "hello\n");
        assert_eq!(AsyncFileReader::read_lines(&file).wait().unwrap(), vec!["hello"]);
        assert_eq!(AsyncFileReader::read_block(&file, 2, 1).wait().unwrap(), b"el");
    }

    #[test]
    fn test_handles_can_be_awaited() {
        let (_dir, root) = scratch();
        let file = root.join("await.bin");

        let bytes = futures::executor::block_on(async {
            AsyncFileWriter::write_bytes(&file, b"abc").await?;
            AsyncFileWriter::write_block(&file, b"Z", 1).await?;
            AsyncFileReader::read_bytes(&file).await
        }).unwrap();

        assert_eq!(bytes, b"aZc");
    }

    #[test]
    fn test_failures_surface_through_handle() {
        let (_dir, root) = scratch();
        let missing = root.join("missing");

        assert!(AsyncFileReader::read_bytes(&missing).wait().unwrap_err().is_not_found());
        assert!(matches!(
            AsyncFileWriter::write_text(&missing, "").wait(),
            Err(FsError::EmptyText(_))
        ));
    }

    #[test]
    fn test_explicit_pool_variants() {
        let (_dir, root) = scratch();
        let pool = ThreadPool::new(2).start().unwrap();
        let file = root.join("lines.txt");

        AsyncFileWriter::write_lines_on(&pool, &file, &["a", "b"]).wait().unwrap();
        assert_eq!(
            AsyncFileReader::read_lines_on(&pool, &file).wait().unwrap(),
            vec!["a", "b"]
        );
        assert_eq!(AsyncFileReader::read_bytes_on(&pool, &file).wait().unwrap(), b"a\nb\n");
        pool.shutdown();
    }

    #[test]
    fn test_cancelled_write_never_touches_disk() {
        let (_dir, root) = scratch();
        let pool = ThreadPool::new(1).start().unwrap();
        let file = root.join("never.txt");

        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
        let blocker = pool.run(move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
            Ok(())
        });
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let write = AsyncFileWriter::write_text_on(&pool, &file, "data");
        write.cancel();
        release_tx.send(()).unwrap();

        blocker.wait().unwrap();
        assert!(matches!(write.wait(), Err(FsError::Cancelled)));
        assert!(!file.exists());
    }

    #[test]
    fn test_many_outstanding_operations() {
        let (_dir, root) = scratch();
        let pool = ThreadPool::new(2).with_queue_capacity(4).start().unwrap();

        let writes: Vec<_> = (0..32)
            .map(|i| {
                let file = root.join(&format!("f{i}"));
                AsyncFileWriter::write_bytes_on(&pool, &file, &[i as u8])
            })
            .collect();
        for write in writes { write.wait().unwrap(); }

        assert_eq!(root.entries().iter().count(), 32);
    }
}
