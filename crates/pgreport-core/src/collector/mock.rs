//! In-memory mock filesystem for testing the local host probe without a real `/proc`.

use crate::collector::traits::FileSystem;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// In-memory filesystem for testing.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    files: HashMap<PathBuf, String>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a file with the given content.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files.insert(path.as_ref().to_path_buf(), content.into());
    }

    /// A host with 16 GiB of RAM, 4 GiB of it in use, and 4 CPUs.
    pub fn typical_host() -> Self {
        let mut fs = Self::new();
        fs.add_file(
            "/proc/meminfo",
            "MemTotal:       16777216 kB\n\
             MemFree:        10485760 kB\n\
             MemAvailable:   12582912 kB\n\
             Buffers:          524288 kB\n\
             Cached:          1572864 kB\n\
             SwapCached:            0 kB\n\
             Active:          4194304 kB\n\
             SReclaimable:     262144 kB\n",
        );
        fs.add_file(
            "/proc/stat",
            "cpu  10000 500 3000 80000 1000 200 100 0 0 0\n\
             cpu0 2500 125 750 20000 250 50 25 0 0 0\n\
             cpu1 2500 125 750 20000 250 50 25 0 0 0\n\
             cpu2 2500 125 750 20000 250 50 25 0 0 0\n\
             cpu3 2500 125 750 20000 250 50 25 0 0 0\n\
             ctxt 123456\n\
             btime 1700000000\n",
        );
        fs
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })
    }
}
