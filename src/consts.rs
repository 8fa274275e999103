// hfs_format.h / newfs_hfs.h

/// logical sector unit; every geometry is expressed in these
pub const BYTES_PER_SECTOR: u32 = 512;

/* Allocation block size bounds. */
pub const HFS_MIN_BSIZE: u64 = 512;
pub const HFS_MAX_BSIZE: u64 = 2 * 1024 * 1024 * 1024;
pub const DFL_BLKSIZE: u32 = 4096;
pub const HFS_OPTIMAL_BLKSIZE: u32 = 4096;

/// block counts are stored in 32 bits on disk
pub const MAX_TOTAL_BLOCKS: u64 = 0xFFFF_FFFF;

/* B-tree node sizes. */
pub const MIN_NODE_SIZE: u32 = 1024;
pub const MIN_CATALOG_NODE_SIZE: u32 = 4096;
pub const MAX_NODE_SIZE: u32 = 32768;
pub const DFL_CATALOG_NODE_SIZE: u32 = 8192;
pub const SMALL_CATALOG_NODE_SIZE: u32 = 4096;
pub const DFL_EXTENTS_NODE_SIZE: u32 = 4096;
pub const DFL_ATTRIBUTES_NODE_SIZE: u32 = 8192;

/// below this the catalog uses the small node size
pub const SMALL_VOLUME_BYTES: u64 = 0x4000_0000;

/* Data and resource fork clump: this many default-sized blocks. */
pub const RSRC_CLUMP_FACTOR: u32 = 8;

pub const FIRST_USER_CATALOG_NODE_ID: u32 = 16;

/// kHFSPlusMaxFileNameChars
pub const MAX_VOLUME_NAME_LEN: usize = 255;
pub const DEFAULT_VOLUME_NAME: &str = "untitled";

pub const MIN_HFSPLUS_VOLUME_SIZE: u64 = 512 * 1024;

/// seconds between 1904-01-01 and 1970-01-01
pub const MAC_GMT_FACTOR: u64 = 2_082_844_800;

/* Journal sizing. */
pub const JOURNAL_DEFAULT_SIZE: u64 = 8 * 1024 * 1024;
pub const JOURNAL_MIN_SIZE: u64 = 512 * 1024;
pub const JOURNAL_MAX_SIZE: u64 = 512 * 1024 * 1024;
pub const JOURNAL_MAX_SCALE: u64 = 64;
pub const JOURNAL_SCALE_UNIT: u64 = 100 * 1024 * 1024 * 1024;
pub const JOURNAL_SMALL_VOLUME: u64 = 128 * 1024 * 1024;

/* Root directory permissions. */
pub const UMASK: u32 = 0o755;
pub const ACCESSMASK: u32 = 0o777;

/// default transfer size used when the device reports no limit
pub const DFL_IO_BYTES: u32 = 1024 * 1024;

pub fn roundup(x: u64, y: u64) -> u64 {
    (x + y - 1) / y * y
}

pub fn howmany(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}
