use crate::geometry::DriveGeometry;
use crate::params::VolumeParameters;
use std::fmt::Write;

/// The `-N` parameter dump. `probed` carries the device geometry when the
/// run was against a real device rather than a virtual size.
pub fn dry_run(params: &VolumeParameters, probed: Option<&DriveGeometry>) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_dry_run(&mut out, params, probed);
    out
}

fn write_dry_run(
    out: &mut String,
    p: &VolumeParameters,
    probed: Option<&DriveGeometry>,
) -> std::fmt::Result {
    if let Some(g) = probed {
        writeln!(
            out,
            "{} sectors ({} bytes per sector)",
            g.phys_total_sectors, g.phys_sector_size
        )?;
    }
    writeln!(out, "HFS Plus format parameters:")?;
    writeln!(out, "\tvolume name: \"{}\"", p.volume_name)?;
    writeln!(out, "\tblock-size: {}", p.block_size)?;
    writeln!(out, "\ttotal blocks: {}", p.total_blocks)?;
    if let Some(journal) = &p.journal {
        writeln!(out, "\tjournal-size: {}k", journal.size / 1024)?;
    }
    writeln!(out, "\tfirst free catalog node id: {}", p.next_cnid)?;
    writeln!(out, "\tcatalog b-tree node size: {}", p.catalog.node_size)?;
    writeln!(out, "\tinitial catalog file size: {}", p.catalog.clump_size)?;
    writeln!(out, "\textents b-tree node size: {}", p.extents.node_size)?;
    writeln!(out, "\tinitial extents file size: {}", p.extents.clump_size)?;
    writeln!(out, "\tattributes b-tree node size: {}", p.attributes.node_size)?;
    writeln!(out, "\tinitial attributes file size: {}", p.attributes.clump_size)?;
    writeln!(
        out,
        "\tinitial allocation file size: {} ({} blocks)",
        p.allocation_clump_size,
        p.allocation_clump_size / p.block_size
    )?;
    writeln!(out, "\tdata fork clump size: {}", p.data_clump_size)?;
    writeln!(out, "\tresource fork clump size: {}", p.rsrc_clump_size)?;
    if let Some(perms) = &p.permissions {
        writeln!(out, "\tuser ID: {}", perms.owner)?;
        writeln!(out, "\tgroup ID: {}", perms.group)?;
        writeln!(out, "\taccess mask: {:o}", perms.mask)?;
    }
    Ok(())
}
