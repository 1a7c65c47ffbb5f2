//! Named shared-memory region with attach-or-create semantics

use std::fs::File;

use memmap2::MmapMut;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;
use tracing::{debug, info};

use crate::error::InitError;

/// POSIX shared-memory names live under a single slash-rooted namespace
fn os_name(name: &str) -> String {
    format!("/{name}")
}

/// A named shared-memory segment mapped read-write for the process lifetime.
///
/// Attaches to an existing identically-named segment when one exists,
/// otherwise creates one sized to `capacity`. Unmapping and closing happen
/// on drop; the name itself persists until [`SharedRegion::unlink`] so the
/// consumer can outlive the producer.
pub struct SharedRegion {
    name: String,
    map: MmapMut,
    created: bool,
    // Keeps the shm fd open for as long as the mapping lives
    _file: File,
}

impl SharedRegion {
    /// Attach to (or create) the named segment and map it
    pub fn acquire(name: &str, capacity: usize) -> Result<Self, InitError> {
        let os = os_name(name);
        let mode = Mode::S_IRUSR | Mode::S_IWUSR;

        let (fd, created) = match shm_open(os.as_str(), OFlag::O_RDWR, mode) {
            Ok(fd) => (fd, false),
            Err(Errno::ENOENT) => {
                // Not there yet; create it, falling back to attach if a
                // concurrent creator wins the race.
                match shm_open(os.as_str(), OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL, mode) {
                    Ok(fd) => (fd, true),
                    Err(Errno::EEXIST) => {
                        let fd = shm_open(os.as_str(), OFlag::O_RDWR, mode).map_err(|source| {
                            InitError::Region {
                                name: name.to_string(),
                                source,
                            }
                        })?;
                        (fd, false)
                    }
                    Err(source) => {
                        return Err(InitError::Region {
                            name: name.to_string(),
                            source,
                        })
                    }
                }
            }
            Err(source) => {
                return Err(InitError::Region {
                    name: name.to_string(),
                    source,
                })
            }
        };

        if created {
            ftruncate(&fd, capacity as i64).map_err(|source| InitError::Region {
                name: name.to_string(),
                source,
            })?;
            info!(name, capacity, "created shared region");
        } else {
            debug!(name, "attached to existing shared region");
        }

        let file = File::from(fd);
        let actual = file.metadata().map_err(InitError::Map)?.len() as usize;
        if actual < capacity {
            return Err(InitError::RegionSize {
                name: name.to_string(),
                expected: capacity,
                actual,
            });
        }

        let map = unsafe { MmapMut::map_mut(&file) }.map_err(InitError::Map)?;

        Ok(Self {
            name: name.to_string(),
            map,
            created,
            _file: file,
        })
    }

    /// Whether this handle created the segment (vs. attached to it)
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.map
    }

    /// Remove the name from the system namespace.
    ///
    /// Existing mappings stay valid; only attachment by name is cut off.
    /// Best-effort: a name that is already gone is not an error.
    pub fn unlink(name: &str) -> Result<(), Errno> {
        match shm_unlink(os_name(name).as_str()) {
            Ok(()) | Err(Errno::ENOENT) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
