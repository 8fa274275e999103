//! Geometry of a real device or disk image.

use crate::consts::BYTES_PER_SECTOR;
use crate::error::{Error, Result};
use crate::geometry::DriveGeometry;
use log::*;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

const PATH_DEV: &str = "/dev";

/// Resolve `special` the way it was given, falling back to `/dev/<name>`.
pub fn device_path(special: &str) -> PathBuf {
    let path = Path::new(special);
    if path.exists() || path.is_absolute() {
        path.to_path_buf()
    } else {
        Path::new(PATH_DEV).join(special)
    }
}

/// Mount point of `device` according to a mount table in `/proc/mounts`
/// format.
fn find_mount(table: &str, device: &Path) -> Option<String> {
    table.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let from = fields.next()?;
        let on = fields.next()?;
        (Path::new(from) == device).then(|| on.to_string())
    })
}

const MOUNT_TABLE: &str = "/proc/self/mounts";

/// Refuse to touch a device that is currently mounted.
pub fn check_not_mounted(device: &Path) -> Result<()> {
    check_mount_table(Path::new(MOUNT_TABLE), device)
}

fn check_mount_table(mounts: &Path, device: &Path) -> Result<()> {
    let table = std::fs::read_to_string(mounts).map_err(|e| {
        Error::Device(format!(
            "{}: cannot read mount table {}: {}",
            device.display(),
            mounts.display(),
            e
        ))
    })?;
    let canonical = device.canonicalize().unwrap_or_else(|_| device.to_path_buf());
    match find_mount(&table, &canonical).or_else(|| find_mount(&table, device)) {
        Some(on) => Err(Error::Device(format!(
            "{} is mounted on {}",
            device.display(),
            on
        ))),
        None => Ok(()),
    }
}

/// Open `device` and read its geometry. A dry run opens it read-only.
pub fn probe(device: &Path, writable: bool) -> Result<DriveGeometry> {
    let file = OpenOptions::new()
        .read(true)
        .write(writable)
        .open(device)
        .map_err(|e| Error::Device(format!("{}: {}", device.display(), e)))?;
    let meta = file
        .metadata()
        .map_err(|e| Error::Device(format!("{}: {}", device.display(), e)))?;

    let file_type = meta.file_type();
    if file_type.is_file() {
        info!("{}: image of {} bytes", device.display(), meta.len());
        DriveGeometry::new(BYTES_PER_SECTOR, meta.len() / BYTES_PER_SECTOR as u64)
    } else if file_type.is_block_device() {
        block_geometry(&file, device)
    } else {
        Err(Error::Device(format!(
            "{}: not a block device or disk image",
            device.display()
        )))
    }
}

#[cfg(target_os = "linux")]
mod ioctl {
    // linux/fs.h
    pub const BLKSECTGET: u64 = 0x1267;
    pub const BLKSSZGET: u64 = 0x1268;
    /// _IOR(0x12, 114, size_t)
    pub const BLKGETSIZE64: u64 =
        (2 << 30) | ((std::mem::size_of::<usize>() as u64) << 16) | (0x12 << 8) | 114;
}

#[cfg(target_os = "linux")]
fn block_geometry(file: &File, device: &Path) -> Result<DriveGeometry> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    let fail = |what: &str| {
        Error::Device(format!(
            "{}: {}: {}",
            device.display(),
            what,
            std::io::Error::last_os_error()
        ))
    };

    let mut sector_size: libc::c_int = 0;
    if unsafe { libc::ioctl(fd, ioctl::BLKSSZGET as _, &mut sector_size as *mut libc::c_int) } < 0 {
        return Err(fail("BLKSSZGET"));
    }
    let mut bytes: u64 = 0;
    if unsafe { libc::ioctl(fd, ioctl::BLKGETSIZE64 as _, &mut bytes as *mut u64) } < 0 {
        return Err(fail("BLKGETSIZE64"));
    }
    // max 512-byte sectors per request
    let mut max_sectors: libc::c_ushort = 0;
    if unsafe { libc::ioctl(fd, ioctl::BLKSECTGET as _, &mut max_sectors as *mut libc::c_ushort) } < 0 {
        return Err(fail("BLKSECTGET"));
    }

    let sector_size = u32::try_from(sector_size).unwrap_or(0);
    if sector_size == 0 {
        return Err(Error::Device(format!(
            "{}: device reports no sector size",
            device.display()
        )));
    }
    debug!(
        "{}: sector_size={} bytes={} max_sectors={}",
        device.display(),
        sector_size,
        bytes,
        max_sectors
    );

    let mut geometry = DriveGeometry::new(sector_size, bytes / sector_size as u64)?;
    geometry.limit_transfer(0, max_sectors as u64 * BYTES_PER_SECTOR as u64);
    Ok(geometry)
}

#[cfg(not(target_os = "linux"))]
fn block_geometry(_file: &File, device: &Path) -> Result<DriveGeometry> {
    Err(Error::Device(format!(
        "{}: block device probing is not supported on this platform",
        device.display()
    )))
}
