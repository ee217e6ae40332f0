use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

#[cfg(debug_assertions)]
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use simplelog::{CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, WriteLogger};
use upkeep_platform::AppPaths;

/// `upkeep.log` inside [`AppPaths::log_dir`].
///
/// The monthly purge sweeps the log directory while the process is running,
/// so the file (and the directory) are recreated on the next write after a
/// purge removed them.
struct LogFile {
    dir: PathBuf,
    path: PathBuf,
    handle: Option<File>,
}

impl LogFile {
    fn open(paths: &AppPaths, max_size: u64) -> io::Result<Self> {
        let mut log = Self {
            dir: paths.log_dir(),
            path: paths.log_file(),
            handle: None,
        };
        log.shrink_to(max_size)?;
        log.current()?;
        Ok(log)
    }

    fn current(&mut self) -> io::Result<&mut File> {
        if self.handle.is_none() || !self.path.exists() {
            std::fs::create_dir_all(&self.dir)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            return Ok(self.handle.insert(file));
        }
        self.handle
            .as_mut()
            .ok_or_else(|| io::Error::other("log file is not open"))
    }

    /// Drop the older half of the file once it grows past `max_size`.
    fn shrink_to(&self, max_size: u64) -> io::Result<()> {
        let size = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata.len(),
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(error) => return Err(error),
        };
        if size <= max_size {
            return Ok(());
        }

        let contents = std::fs::read(&self.path)?;
        std::fs::write(&self.path, recent_half(&contents))
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.current()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.handle.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// The second half of `contents`, starting at a line boundary.
fn recent_half(contents: &[u8]) -> &[u8] {
    let half = contents.len() / 2;
    let start = contents[half..]
        .iter()
        .position(|&byte| byte == b'\n')
        .map_or(half, |offset| half + offset + 1);
    &contents[start..]
}

fn max_level(debug_enabled: bool) -> LevelFilter {
    if debug_enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Route `upkeep*` log records to the log file and, in debug builds, the
/// terminal. Failures are reported on stderr; the scheduler runs either way.
pub fn init_logging(paths: &AppPaths, debug_enabled: bool, max_log_size: u64) {
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("upkeep")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    #[cfg(debug_assertions)]
    loggers.push(TermLogger::new(
        LevelFilter::Debug,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));

    match LogFile::open(paths, max_log_size) {
        Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, config, file)),
        Err(error) => eprintln!(
            "upkeep: cannot open log file {}: {error}",
            paths.log_file().display()
        ),
    }

    if let Err(error) = CombinedLogger::init(loggers) {
        eprintln!("upkeep: logger already initialized: {error}");
    }
    log::set_max_level(max_level(debug_enabled));
    log::info!("Logging initialized, log file: {}", paths.log_file().display());
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::time::{Duration, SystemTime};

    use simplelog::LevelFilter;
    use upkeep_platform::{AppPaths, delete_expired_files};

    use super::{LogFile, max_level, recent_half};

    #[test]
    fn log_file_lives_in_the_purged_log_dir() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let paths = AppPaths::rooted_at(temp_dir.path());

        let mut log = LogFile::open(&paths, 1024).expect("log file should open");
        log.write_all(b"started\n").expect("write should succeed");

        assert!(paths.log_file().starts_with(paths.log_dir()));
        assert_eq!(
            std::fs::read_to_string(paths.log_file()).expect("log file should be readable"),
            "started\n"
        );
    }

    #[test]
    fn purged_log_file_is_recreated_on_next_write() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let paths = AppPaths::rooted_at(temp_dir.path());
        let mut log = LogFile::open(&paths, 1024).expect("log file should open");
        log.write_all(b"before purge\n").expect("write should succeed");

        let cutoff = SystemTime::now() + Duration::from_secs(3600);
        let removed =
            delete_expired_files(&paths.log_dir(), cutoff).expect("purge should succeed");
        assert_eq!(removed, 1);
        assert!(!paths.log_file().exists());

        log.write_all(b"after purge\n")
            .expect("write should recreate the log file");

        assert_eq!(
            std::fs::read_to_string(paths.log_file()).expect("log file should be readable"),
            "after purge\n"
        );
    }

    #[test]
    fn removed_log_dir_is_recreated_too() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let paths = AppPaths::rooted_at(temp_dir.path());
        let mut log = LogFile::open(&paths, 1024).expect("log file should open");

        std::fs::remove_dir_all(paths.log_dir()).expect("log dir should be removable");
        log.write_all(b"line\n").expect("write should recreate the log dir");

        assert!(paths.log_file().is_file());
    }

    #[test]
    fn oversized_log_is_shrunk_when_opened() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let paths = AppPaths::rooted_at(temp_dir.path());
        std::fs::create_dir_all(paths.log_dir()).expect("log dir should be created");
        std::fs::write(paths.log_file(), "line-1\nline-2\nline-3\nline-4\nline-5\n")
            .expect("log file should be written");

        LogFile::open(&paths, 10).expect("log file should open");

        let kept = std::fs::read_to_string(paths.log_file()).expect("log file should be readable");
        assert!(!kept.contains("line-1"));
        assert!(kept.ends_with("line-5\n"));
    }

    #[test]
    fn recent_half_starts_at_a_line_boundary() {
        assert_eq!(recent_half(b"aaaa\nbbbb\ncccc\n"), b"cccc\n");
        assert_eq!(recent_half(b"no-newline"), b"wline");
        assert_eq!(recent_half(b""), b"");
    }

    #[test]
    fn debug_flag_selects_level() {
        assert_eq!(max_level(true), LevelFilter::Debug);
        assert_eq!(max_level(false), LevelFilter::Info);
    }
}
