use crate::error::{Error, Result};
use std::ffi::CString;

/// Explicit B-tree node sizes, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeSizes {
    pub catalog: Option<u32>,
    pub extents: Option<u32>,
    pub attributes: Option<u32>,
}

/// Explicit clump sizes, in allocation blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClumpBlocks {
    pub data: Option<u32>,
    pub resource: Option<u32>,
    pub catalog: Option<u32>,
    pub extents: Option<u32>,
    pub attributes: Option<u32>,
    pub bitmap: Option<u32>,
}

/// Everything the user may pin down. `None` leaves the value to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub block_size: Option<u64>,
    pub node_sizes: NodeSizes,
    pub clump_blocks: ClumpBlocks,
    /// `Some` requests a journal; the inner value is an explicit size in bytes
    pub journal: Option<Option<u64>>,
    pub journal_device: Option<String>,
    pub case_sensitive: bool,
    pub owner: Option<u32>,
    pub group: Option<u32>,
    pub mask: Option<u32>,
    pub next_cnid: Option<u32>,
    pub volume_name: Option<String>,
}

/// Parse a number the way `strtoull(s, &end, 0)` does, then scale it by an
/// optional unit letter: b=512, k, m, g, t, p (powers of 1024). An unknown
/// unit yields 0.
pub fn get_num(s: &str) -> u64 {
    let (radix, digits) = if let Some(rest) = s.strip_prefix("0x").or(s.strip_prefix("0X")) {
        (16, rest)
    } else if s.len() > 1 && s.starts_with('0') {
        (8, &s[1..])
    } else {
        (10, s)
    };

    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    let num = digits[..end].chars().fold(0u64, |acc, c| {
        acc.saturating_mul(radix as u64)
            .saturating_add(c.to_digit(radix).unwrap_or(0) as u64)
    });

    let scale: u64 = match digits[end..].chars().next().map(|c| c.to_ascii_lowercase()) {
        None => 1,
        Some('b') => 512,
        Some('k') => 1 << 10,
        Some('m') => 1 << 20,
        Some('g') => 1 << 30,
        Some('t') => 1 << 40,
        Some('p') => 1 << 50,
        Some(_) => 0,
    };
    num.saturating_mul(scale)
}

fn split_list(optlist: &str) -> impl Iterator<Item = Result<(char, &str)>> {
    optlist
        .split(',')
        .take_while(|arg| !arg.is_empty())
        .map(|arg| -> Result<(char, &str)> {
            let (key, val) = arg
                .split_once('=')
                .ok_or_else(|| Error::Usage(format!("{}: expected key=value", arg)))?;
            let key = key
                .chars()
                .next()
                .ok_or_else(|| Error::Usage(format!("{}: missing key", arg)))?;
            Ok((key, val))
        })
}

fn list_value(key: char, val: &str) -> Result<u32> {
    val.trim()
        .parse()
        .map_err(|_| Error::Usage(format!("{}={}: not a number", key, val)))
}

/// `-n c=size,e=size,a=size`
pub fn parse_node_list(optlist: &str, nodes: &mut NodeSizes) -> Result<()> {
    for item in split_list(optlist) {
        let (key, val) = item?;
        let size = list_value(key, val)?;
        match key {
            'c' => nodes.catalog = Some(size),
            'e' => nodes.extents = Some(size),
            'a' => nodes.attributes = Some(size),
            _ => return Err(Error::Usage(format!("{}: unknown b-tree", key))),
        }
    }
    Ok(())
}

/// `-c a=blocks,b=blocks,c=blocks,d=blocks,e=blocks,r=blocks`
pub fn parse_clump_list(optlist: &str, clumps: &mut ClumpBlocks) -> Result<()> {
    for item in split_list(optlist) {
        let (key, val) = item?;
        let blocks = list_value(key, val)?;
        match key {
            'a' => clumps.attributes = Some(blocks),
            'b' => clumps.bitmap = Some(blocks),
            'c' => clumps.catalog = Some(blocks),
            'd' => clumps.data = Some(blocks),
            'e' => clumps.extents = Some(blocks),
            'r' => clumps.resource = Some(blocks),
            _ => return Err(Error::Usage(format!("{}: unknown clump file", key))),
        }
    }
    Ok(())
}

/// Octal access mask, as given to `-M`.
pub fn parse_mask(s: &str) -> Result<u32> {
    if !s.starts_with(|c: char| ('0'..='7').contains(&c)) {
        return Err(Error::Usage(format!("invalid access mask: {}", s)));
    }
    u32::from_str_radix(s, 8).map_err(|_| Error::Usage(format!("invalid access mask: {}", s)))
}

/// User name or numeric uid.
pub fn parse_user(s: &str) -> Result<u32> {
    let name = CString::new(s).map_err(|_| Error::Usage(format!("unknown user id: {}", s)))?;
    let pw = unsafe { libc::getpwnam(name.as_ptr()) };
    if !pw.is_null() {
        return Ok(unsafe { (*pw).pw_uid });
    }
    s.parse()
        .map_err(|_| Error::Usage(format!("unknown user id: {}", s)))
}

/// Group name or numeric gid.
pub fn parse_group(s: &str) -> Result<u32> {
    let name = CString::new(s).map_err(|_| Error::Usage(format!("unknown group id: {}", s)))?;
    let gr = unsafe { libc::getgrnam(name.as_ptr()) };
    if !gr.is_null() {
        return Ok(unsafe { (*gr).gr_gid });
    }
    s.parse()
        .map_err(|_| Error::Usage(format!("unknown group id: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_num_test() {
        assert_eq!(get_num("4096"), 4096);
        assert_eq!(get_num("0x1000"), 4096);
        assert_eq!(get_num("010"), 8);
        assert_eq!(get_num("0"), 0);
        assert_eq!(get_num("8b"), 4096);
        assert_eq!(get_num("4k"), 4096);
        assert_eq!(get_num("4K"), 4096);
        assert_eq!(get_num("8m"), 8 << 20);
        assert_eq!(get_num("1g"), 1 << 30);
        assert_eq!(get_num("2t"), 2 << 40);
        assert_eq!(get_num("1p"), 1 << 50);
        assert_eq!(get_num("16x"), 0);
        // only the first letter after the digits counts
        assert_eq!(get_num("1kb"), 1024);
    }

    #[test]
    fn node_list_test() {
        let mut nodes = NodeSizes::default();
        parse_node_list("c=4096,e=1024", &mut nodes).unwrap();
        assert_eq!(nodes.catalog, Some(4096));
        assert_eq!(nodes.extents, Some(1024));
        assert_eq!(nodes.attributes, None);

        parse_node_list("a=16384", &mut nodes).unwrap();
        assert_eq!(nodes.attributes, Some(16384));

        assert!(matches!(
            parse_node_list("x=4096", &mut nodes),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            parse_node_list("c4096", &mut nodes),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            parse_node_list("c=big", &mut nodes),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn clump_list_test() {
        let mut clumps = ClumpBlocks::default();
        parse_clump_list("b=64,c=1024,a=0,d=2,e=3,r=4", &mut clumps).unwrap();
        assert_eq!(clumps.bitmap, Some(64));
        assert_eq!(clumps.catalog, Some(1024));
        assert_eq!(clumps.attributes, Some(0));
        assert_eq!(clumps.data, Some(2));
        assert_eq!(clumps.extents, Some(3));
        assert_eq!(clumps.resource, Some(4));

        // an empty item ends the list
        let mut clumps = ClumpBlocks::default();
        parse_clump_list("c=8,,e=9", &mut clumps).unwrap();
        assert_eq!(clumps.catalog, Some(8));
        assert_eq!(clumps.extents, None);

        assert!(matches!(
            parse_clump_list("z=1", &mut clumps),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn mask_test() {
        assert_eq!(parse_mask("755").unwrap(), 0o755);
        assert_eq!(parse_mask("0700").unwrap(), 0o700);
        assert!(parse_mask("8").is_err());
        assert!(parse_mask("75x").is_err());
        assert!(parse_mask("").is_err());
    }

    #[test]
    fn numeric_ids_test() {
        assert_eq!(parse_user("4242").unwrap(), 4242);
        assert_eq!(parse_group("4343").unwrap(), 4343);
        assert!(parse_user("no-such-user-here").is_err());
        assert!(parse_group("no-such-group-here").is_err());
    }
}
