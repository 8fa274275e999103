#![no_main]

use libfuzzer_sys::fuzz_target;
use newfs_hfs::overrides::{ClumpBlocks, NodeSizes};
use newfs_hfs::*;

use arbitrary::Arbitrary;

#[derive(Arbitrary, Debug)]
pub struct Input {
    phys_sector_shift: u8,
    phys_total_sectors: u64,
    block_shift: Option<u8>,
    catalog_node: Option<u16>,
    extents_node: Option<u16>,
    attributes_node: Option<u16>,
    clumps: [Option<u16>; 6],
    journal: Option<Option<u32>>,
    owner: Option<u32>,
    mask: Option<u16>,
    next_cnid: Option<u32>,
}

const ENV: Environment = Environment {
    create_time: 0,
    euid: 0,
    egid: 0,
};

fuzz_target!(|input: Input| {
    let phys_sector_size = 512u32 << (input.phys_sector_shift % 4);
    let Ok(geometry) = DriveGeometry::new(phys_sector_size, input.phys_total_sectors) else {
        return;
    };

    let [data, resource, catalog, extents, attributes, bitmap] =
        input.clumps.map(|c| c.map(u32::from));
    let overrides = Overrides {
        block_size: input.block_shift.map(|s| 1u64 << (s % 34)),
        node_sizes: NodeSizes {
            catalog: input.catalog_node.map(u32::from),
            extents: input.extents_node.map(u32::from),
            attributes: input.attributes_node.map(u32::from),
        },
        clump_blocks: ClumpBlocks {
            data,
            resource,
            catalog,
            extents,
            attributes,
            bitmap,
        },
        journal: input.journal.map(|j| j.map(u64::from)),
        owner: input.owner,
        mask: input.mask.map(u32::from),
        next_cnid: input.next_cnid,
        ..Default::default()
    };

    let Ok(d) = derive(&geometry, &overrides, &ENV) else {
        return;
    };
    let p = &d.params;

    assert!(p.block_size.is_power_of_two());
    assert!(geometry.total_sectors / (p.block_size / geometry.sector_size) as u64 <= 0xFFFF_FFFF);
    for tree in [&p.catalog, &p.extents] {
        assert!(tree.node_size.is_power_of_two());
        assert!(tree.clump_size > 0);
        assert_eq!(tree.clump_size % tree.node_size, 0);
    }
    assert_eq!(p.attributes.clump_size % p.attributes.node_size, 0);
    assert_eq!(p.allocation_clump_size % p.block_size, 0);
    assert!(p.allocation_clump_size as u64 * 8 >= p.total_blocks as u64);
    if let Some(journal) = &p.journal {
        // one block when blocks are larger than the cap
        assert!(journal.size <= p.block_size.max(512 * 1024 * 1024));
        assert!(journal.size >= 512 * 1024);
    }
    assert!(p.next_cnid >= 16);

    assert_eq!(derive(&geometry, &overrides, &ENV).unwrap(), d);
});
