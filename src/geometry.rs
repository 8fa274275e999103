use crate::consts::*;
use crate::error::{Error, Result};
use log::*;

/// What the device (or a virtual size) tells us about the media.
///
/// The logical sector size is always the 512-byte unit; `total_sectors` is
/// the physical capacity re-expressed in that unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveGeometry {
    pub sector_size: u32,
    pub phys_sector_size: u32,
    pub total_sectors: u64,
    pub phys_total_sectors: u64,
    /// physical sectors per I/O transfer
    pub max_sectors_per_io: u64,
}

impl DriveGeometry {
    pub fn new(phys_sector_size: u32, phys_total_sectors: u64) -> Result<Self> {
        if phys_sector_size == 0 || phys_sector_size % BYTES_PER_SECTOR != 0 {
            return Err(Error::Device(format!(
                "{} is an unsupported sector size",
                phys_sector_size
            )));
        }

        let total_sectors = phys_total_sectors
            .checked_mul(phys_sector_size as u64)
            .map(|bytes| bytes / BYTES_PER_SECTOR as u64)
            .ok_or_else(|| {
                Error::GeometryOverflow(format!(
                    "{} sectors of {} bytes overflow 64 bits",
                    phys_total_sectors, phys_sector_size
                ))
            })?;

        let geometry = DriveGeometry {
            sector_size: BYTES_PER_SECTOR,
            phys_sector_size,
            total_sectors,
            phys_total_sectors,
            max_sectors_per_io: (DFL_IO_BYTES / phys_sector_size) as u64,
        };
        debug!("geometry={:?}", geometry);
        Ok(geometry)
    }

    /// Geometry for a sizing run with no device behind it.
    pub fn from_partition_size(bytes: u64) -> Result<Self> {
        Self::new(BYTES_PER_SECTOR, bytes / BYTES_PER_SECTOR as u64)
    }

    /// Apply device transfer limits. Zero means the device did not report
    /// that limit.
    pub fn limit_transfer(&mut self, max_blocks: u64, max_bytes: u64) {
        if max_blocks != 0 {
            self.max_sectors_per_io = self.max_sectors_per_io.min(max_blocks);
        }
        if max_bytes != 0 {
            self.max_sectors_per_io = self
                .max_sectors_per_io
                .min(max_bytes / self.phys_sector_size as u64);
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_sectors * self.sector_size as u64
    }
}
