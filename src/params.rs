//! HFS Plus format parameters.
//!
//! `derive` turns a drive geometry plus the user's overrides into the full
//! set of numbers the volume writer lays the filesystem out with. It does no
//! I/O and keeps no state, so the same inputs always give the same answer.

use crate::clump::{btree_clump_size, BTreeFile};
use crate::consts::*;
use crate::error::{invalid, Error, Result};
use crate::geometry::DriveGeometry;
use crate::overrides::Overrides;
use log::*;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Ambient facts the derivation needs but must not look up itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    /// seconds since the Unix epoch
    pub create_time: u64,
    pub euid: u32,
    pub egid: u32,
}

impl Environment {
    pub fn current() -> Self {
        let create_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let (euid, egid) = unsafe { (libc::geteuid(), libc::getegid()) };
        Environment {
            create_time,
            euid,
            egid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeParams {
    pub node_size: u32,
    pub clump_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalParams {
    pub size: u32,
    /// external journal device
    pub device: Option<String>,
}

/// Owner, group and mode of the root directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub owner: u32,
    pub group: u32,
    pub mask: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeParameters {
    pub block_size: u32,
    pub total_blocks: u32,
    pub catalog: BTreeParams,
    pub extents: BTreeParams,
    pub attributes: BTreeParams,
    pub data_clump_size: u32,
    pub rsrc_clump_size: u32,
    /// allocation (bitmap) file size
    pub allocation_clump_size: u32,
    pub journal: Option<JournalParams>,
    pub permissions: Option<Permissions>,
    pub volume_name: String,
    pub next_cnid: u32,
    /// seconds since 1904-01-01 GMT
    pub create_date: u64,
    pub case_sensitive: bool,
}

/// Non-fatal notes about the chosen values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    SuboptimalBlockSize(u32),
    BlockSmallerThanNode {
        tree: BTreeFile,
        block_size: u32,
        node_size: u32,
    },
    JournalTooSmall { requested: u64, used: u64 },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SuboptimalBlockSize(size) => write!(
                f,
                "Warning: {} is a non-optimal block size (4096 would be a better choice)",
                size
            ),
            Self::BlockSmallerThanNode {
                tree,
                block_size,
                node_size,
            } => write!(
                f,
                "Warning: block size {} is less than {} b-tree node size {}",
                block_size,
                tree.name(),
                node_size
            ),
            Self::JournalTooSmall { requested, used } => write!(
                f,
                "journal size {}k too small.  Reset to {}k.",
                requested / 1024,
                used / 1024
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    pub params: VolumeParameters,
    pub advisories: Vec<Advisory>,
}

fn total_blocks(total_sectors: u64, sector_size: u32, block_size: u64) -> u64 {
    total_sectors / (block_size / sector_size as u64)
}

/// Pick the allocation block size, or check the one the user asked for.
pub fn validate_block_size(
    block_size: Option<u64>,
    total_sectors: u64,
    sector_size: u32,
    advisories: &mut Vec<Advisory>,
) -> Result<u32> {
    let block_size = match block_size {
        None => {
            // smallest power of two from 4K up that keeps the block count in 32 bits
            let mut block_size = DFL_BLKSIZE as u64;
            while total_blocks(total_sectors, sector_size, block_size) > MAX_TOTAL_BLOCKS {
                block_size <<= 1;
            }
            block_size
        }
        Some(block_size) => {
            if block_size < HFS_MIN_BSIZE {
                return Err(invalid!(
                    "{}: bad allocation block size (too small)",
                    block_size
                ));
            }
            if block_size > HFS_MAX_BSIZE {
                return Err(invalid!(
                    "{}: bad allocation block size (too large)",
                    block_size
                ));
            }
            if !block_size.is_power_of_two() {
                return Err(invalid!(
                    "{}: bad HFS Plus allocation block size (must be a power of two)",
                    block_size
                ));
            }
            if block_size < sector_size as u64 {
                return Err(invalid!(
                    "{}: allocation block size is smaller than the {} byte sector",
                    block_size,
                    sector_size
                ));
            }
            if total_blocks(total_sectors, sector_size, block_size) > MAX_TOTAL_BLOCKS {
                return Err(Error::GeometryOverflow(format!(
                    "{}: block size is too small for {} sectors",
                    block_size, total_sectors
                )));
            }
            if block_size < HFS_OPTIMAL_BLKSIZE as u64 {
                advisories.push(Advisory::SuboptimalBlockSize(block_size as u32));
            }
            block_size
        }
    };

    u32::try_from(block_size).map_err(|_| {
        Error::GeometryOverflow(format!(
            "{} sectors need a block size beyond 32 bits",
            total_sectors
        ))
    })
}

fn validate_node_size(tree: BTreeFile, size: u32) -> Result<u32> {
    let min = match tree {
        BTreeFile::Catalog => MIN_CATALOG_NODE_SIZE,
        _ => MIN_NODE_SIZE,
    };
    if size < min || size > MAX_NODE_SIZE || !size.is_power_of_two() {
        return Err(invalid!(
            "{}={}: invalid {} b-tree node size",
            &tree.name()[..1],
            size,
            tree.name()
        ));
    }
    Ok(size)
}

/// `blocks * block_size`, which must fit the 32-bit clump fields.
fn clump_bytes(key: char, blocks: u32, block_size: u32) -> Result<u32> {
    let bytes = blocks as u64 * block_size as u64;
    u32::try_from(bytes).map_err(|_| invalid!("{}={}: too many blocks for clump size!", key, blocks))
}

fn btree_params(
    tree: BTreeFile,
    node_size: u32,
    clump_blocks: Option<u32>,
    block_size: u32,
    total_sectors: u64,
) -> Result<BTreeParams> {
    let key = tree.name().chars().next().unwrap_or('?');

    let clump_size = match clump_blocks {
        // an explicit a=0 means no attributes file at all
        Some(0) if tree == BTreeFile::Attributes => 0,
        None | Some(0) => btree_clump_size(block_size, node_size, total_sectors, tree),
        Some(blocks) => {
            let clump_size = clump_bytes(key, blocks, block_size)?;
            if clump_size % node_size != 0 {
                return Err(invalid!(
                    "{}={}: clump size is not a multiple of node size",
                    key,
                    blocks
                ));
            }
            clump_size
        }
    };

    debug!(
        "{}: node_size={} clump_size={}",
        tree.name(),
        node_size,
        clump_size
    );
    Ok(BTreeParams {
        node_size,
        clump_size,
    })
}

/// Clump size for user data and resource forks.
fn fork_clump_size(key: char, clump_blocks: Option<u32>, block_size: u32) -> Result<u32> {
    match clump_blocks {
        None | Some(0) => {
            let size = if block_size > DFL_BLKSIZE {
                roundup((RSRC_CLUMP_FACTOR * DFL_BLKSIZE) as u64, block_size as u64)
            } else {
                (RSRC_CLUMP_FACTOR * block_size) as u64
            };
            Ok(size as u32)
        }
        Some(blocks) => clump_bytes(key, blocks, block_size),
    }
}

/// Size of the allocation bitmap: one bit per block, whole blocks.
pub fn bitmap_clump_size(total_blocks: u32, block_size: u32, clump_blocks: Option<u32>) -> Result<u32> {
    let min_clump_size = roundup(howmany(total_blocks as u64, 8), block_size as u64) as u32;

    match clump_blocks {
        None | Some(0) => Ok(min_clump_size),
        Some(blocks) => {
            let clump_size = clump_bytes('b', blocks, block_size)?;
            if clump_size < min_clump_size {
                return Err(invalid!("b={}: bitmap clump size is too small", blocks));
            }
            Ok(clump_size)
        }
    }
}

/// Journal size in bytes. Only called when a journal was requested.
pub fn journal_size(
    requested: Option<u64>,
    total_bytes: u64,
    block_size: u32,
    advisories: &mut Vec<Advisory>,
) -> u32 {
    // at least 8MB of journal for each 100GB of disk space
    let mut size = match requested {
        None => {
            let scale = (total_bytes / JOURNAL_SCALE_UNIT).min(JOURNAL_MAX_SCALE);
            JOURNAL_DEFAULT_SIZE * (scale + 1)
        }
        Some(size) if size < JOURNAL_MIN_SIZE => {
            advisories.push(Advisory::JournalTooSmall {
                requested: size,
                used: JOURNAL_MIN_SIZE,
            });
            JOURNAL_MIN_SIZE
        }
        Some(size) => size,
    };

    size = size.min(JOURNAL_MAX_SIZE).max(block_size as u64);

    // Small volumes have a one-block bitmap and a tiny catalog, so no
    // transaction touches more than 256k of metadata.
    if total_bytes < JOURNAL_SMALL_VOLUME {
        size = JOURNAL_MIN_SIZE;
    }
    size as u32
}

fn permissions(overrides: &Overrides, env: &Environment) -> Option<Permissions> {
    if overrides.owner.is_none() && overrides.group.is_none() && overrides.mask.is_none() {
        return None;
    }
    Some(Permissions {
        owner: overrides.owner.unwrap_or(env.euid),
        group: overrides.group.unwrap_or(env.egid),
        mask: overrides.mask.map(|m| m & ACCESSMASK).unwrap_or(UMASK),
    })
}

fn volume_name(name: Option<&str>) -> Result<String> {
    match name {
        None => Ok(DEFAULT_VOLUME_NAME.to_string()),
        Some("") => Err(invalid!("name required with -v option")),
        Some(name) if name.len() > MAX_VOLUME_NAME_LEN => Err(invalid!(
            "\"{}\" is too long ({} byte maximum)",
            name,
            MAX_VOLUME_NAME_LEN
        )),
        Some(name) => Ok(name.to_string()),
    }
}

/// Compute every format parameter for an HFS Plus volume on `geometry`.
pub fn derive(geometry: &DriveGeometry, overrides: &Overrides, env: &Environment) -> Result<Derivation> {
    let sectors = geometry.total_sectors;
    let sector_size = geometry.sector_size;
    let total_bytes = geometry.total_bytes();
    let mut advisories = Vec::new();

    let block_size = validate_block_size(overrides.block_size, sectors, sector_size, &mut advisories)?;

    if total_bytes < MIN_HFSPLUS_VOLUME_SIZE {
        return Err(Error::VolumeTooSmall(format!(
            "partition is too small (minimum is {} KB)",
            MIN_HFSPLUS_VOLUME_SIZE / 1024
        )));
    }

    let next_cnid = overrides.next_cnid.unwrap_or(FIRST_USER_CATALOG_NODE_ID);
    if next_cnid < FIRST_USER_CATALOG_NODE_ID {
        return Err(invalid!(
            "{}: starting catalog node id too small (must be > 15)",
            next_cnid
        ));
    }
    let volume_name = volume_name(overrides.volume_name.as_deref())?;

    let journal = overrides.journal.map(|requested| JournalParams {
        size: journal_size(requested, total_bytes, block_size, &mut advisories),
        device: overrides.journal_device.clone(),
    });

    let clumps = &overrides.clump_blocks;
    let rsrc_clump_size = fork_clump_size('r', clumps.resource, block_size)?;
    let data_clump_size = fork_clump_size('d', clumps.data, block_size)?;

    // 8K catalog nodes by default, 4K on small volumes or small blocks
    let catalog_node = match overrides.node_sizes.catalog {
        Some(size) => validate_node_size(BTreeFile::Catalog, size)?,
        None if block_size < HFS_OPTIMAL_BLKSIZE || total_bytes < SMALL_VOLUME_BYTES => {
            SMALL_CATALOG_NODE_SIZE
        }
        None => DFL_CATALOG_NODE_SIZE,
    };
    let extents_node = match overrides.node_sizes.extents {
        Some(size) => validate_node_size(BTreeFile::Extents, size)?,
        None => DFL_EXTENTS_NODE_SIZE,
    };
    let attributes_node = match overrides.node_sizes.attributes {
        Some(size) => validate_node_size(BTreeFile::Attributes, size)?,
        None => DFL_ATTRIBUTES_NODE_SIZE,
    };

    let catalog = btree_params(BTreeFile::Catalog, catalog_node, clumps.catalog, block_size, sectors)?;
    if block_size < HFS_OPTIMAL_BLKSIZE && block_size < catalog_node {
        advisories.push(Advisory::BlockSmallerThanNode {
            tree: BTreeFile::Catalog,
            block_size,
            node_size: catalog_node,
        });
    }

    let extents = btree_params(BTreeFile::Extents, extents_node, clumps.extents, block_size, sectors)?;
    if block_size < extents_node {
        advisories.push(Advisory::BlockSmallerThanNode {
            tree: BTreeFile::Extents,
            block_size,
            node_size: extents_node,
        });
    }

    let attributes = btree_params(
        BTreeFile::Attributes,
        attributes_node,
        clumps.attributes,
        block_size,
        sectors,
    )?;

    // validate_block_size keeps this within 32 bits
    let total_blocks = total_blocks(sectors, sector_size, block_size as u64) as u32;
    let allocation_clump_size = bitmap_clump_size(total_blocks, block_size, clumps.bitmap)?;

    let params = VolumeParameters {
        block_size,
        total_blocks,
        catalog,
        extents,
        attributes,
        data_clump_size,
        rsrc_clump_size,
        allocation_clump_size,
        journal,
        permissions: permissions(overrides, env),
        volume_name,
        next_cnid,
        create_date: env.create_time + MAC_GMT_FACTOR,
        case_sensitive: overrides.case_sensitive,
    };
    debug!("params={:?}", params);

    Ok(Derivation { params, advisories })
}
