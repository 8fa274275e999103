//! Default clump sizes for the B-tree backed special files.

use log::*;

/// The B-tree files whose clump sizes come from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BTreeFile {
    Catalog,
    Extents,
    Attributes,
}

impl BTreeFile {
    fn column(self) -> usize {
        match self {
            BTreeFile::Attributes => 0,
            BTreeFile::Catalog => 1,
            BTreeFile::Extents => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BTreeFile::Catalog => "catalog",
            BTreeFile::Extents => "extents",
            BTreeFile::Attributes => "attributes",
        }
    }
}

pub const CLUMP_ENTRIES: usize = 15;

/// below this many sectors the clump is 0.8% of the volume
const TABLE_MIN_SECTORS: u64 = 0x20_0000;

const MB: u32 = 1024 * 1024;

/*
 *   Volume   Attributes   Catalog   Extents
 *    Size    Clump (MB)  Clump (MB) Clump (MB)
 *
 * From 16GB on the catalog and attributes columns are geometric series,
 * sized so a full OS install does not fragment either B-tree: catalog grows
 * by 8**(1/5) per row and attributes by 4**(1/5) up to 512GB, both by
 * 2**(1/5) from 1TB to 16TB.
 */
pub const CLUMP_TABLE: [[u16; 3]; CLUMP_ENTRIES] = [
    /*   1GB */ [4, 4, 4],
    /*   2GB */ [6, 6, 4],
    /*   4GB */ [8, 8, 4],
    /*   8GB */ [11, 11, 5],
    /*  16GB */ [64, 32, 5],
    /*  32GB */ [84, 49, 6],
    /*  64GB */ [111, 74, 7],
    /* 128GB */ [147, 111, 8],
    /* 256GB */ [194, 169, 9],
    /* 512GB */ [256, 256, 11],
    /*   1TB */ [294, 294, 14],
    /*   2TB */ [338, 338, 16],
    /*   4TB */ [388, 388, 20],
    /*   8TB */ [446, 446, 25],
    /*  16TB */ [512, 512, 32],
];

/// Table row for a volume of `sectors` 512-byte sectors at or above the
/// table threshold.
pub fn clump_row(sectors: u64) -> usize {
    let mut i = 0;
    let mut s = sectors >> 22;
    while s != 0 && i < CLUMP_ENTRIES - 1 {
        i += 1;
        s >>= 1;
    }
    i
}

/// Default clump size in bytes for a B-tree file. The result is a non-zero
/// multiple of `max(node_size, block_size)`.
pub fn btree_clump_size(block_size: u32, node_size: u32, sectors: u64, file: BTreeFile) -> u32 {
    let rounding = node_size.max(block_size);

    let clump_size: u64 = if sectors < TABLE_MIN_SECTORS {
        (sectors << 2).max(8 * node_size as u64)
    } else {
        let row = clump_row(sectors);
        trace!("{}: clump table row {}", file.name(), row);
        CLUMP_TABLE[row][file.column()] as u64 * MB as u64
    };

    // rounds down
    let clump_size = (clump_size / rounding as u64 * rounding as u64) as u32;
    if clump_size == 0 {
        rounding
    } else {
        clump_size
    }
}
