use cl_fs::{AsyncFileReader, FileReader, FsResult, Path, StreamReader};

const USAGE: &str = "\
usage: cl-fs <command> [args]

commands:
    ls <dir>            list the entries of a directory
    cat <file>          print a file line by line
    cp <src> <dest>     copy a file or a directory tree
    mkdir <dir>         create a directory and any missing parents
    size <file>         print the size of a file in bytes";

#[cfg(any(feature = "log-info", feature = "log-warn", feature = "log-error"))]
fn init_logger() {
    if let Err(err) = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .try_init()
    {
        eprintln!("Failed to initialize logger: {}", err);
    }
}

#[cfg(not(any(feature = "log-info", feature = "log-warn", feature = "log-error")))]
fn init_logger() {}

fn list(dir: &Path) -> FsResult<()> {
    if !dir.is_directory() {
        return Err(cl_fs::FsError::InvalidPath(dir.clone()));
    }

    let mut names: Vec<String> = dir
        .entries()
        .iter()
        .map(|entry| {
            let mut name = entry.filename().to_string();
            if entry.is_directory() { name.push(cl_fs::SEPARATOR) }
            name
        })
        .collect();

    names.sort();
    for name in names { println!("{name}"); }
    Ok(())
}

fn cat(file: &Path) -> FsResult<()> {
    let mut reader = StreamReader::open(file)?;
    while let Some(line) = reader.read_line()? {
        println!("{line}");
    }
    Ok(())
}

fn copy(src: &Path, dest: &Path) -> FsResult<()> {
    if src.is_directory() {
        src.copy_directory(dest)
    } else if src.is_file() {
        src.copy(dest)
    } else {
        Err(cl_fs::FsError::InvalidPath(src.clone()))
    }
}

fn size(file: &Path) -> FsResult<()> {
    // Checked against a full read done on the pool
    let expected = FileReader::query_file_size(file)?;
    let read = AsyncFileReader::read_bytes(file).wait()?.len() as u64;
    if read != expected {
        eprintln!("warning: {file} changed while being measured");
    }
    println!("{read}");
    Ok(())
}

fn run(args: &[String]) -> Result<(), String> {
    let result = match args {
        [cmd, dir] if cmd == "ls" => list(&Path::new(dir)),
        [cmd, file] if cmd == "cat" => cat(&Path::new(file)),
        [cmd, src, dest] if cmd == "cp" => copy(&Path::new(src), &Path::new(dest)),
        [cmd, dir] if cmd == "mkdir" => Path::new(dir).create_all(),
        [cmd, file] if cmd == "size" => size(&Path::new(file)),
        _ => return Err(USAGE.to_string()),
    };

    result.map_err(|e| e.to_string())
}

fn main() {
    init_logger();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = match run(&args) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("{msg}");
            1
        }
    };

    cl_fs::shutdown();
    std::process::exit(code);
}
