use anyhow::{bail, Result};
use argh::FromArgs;
use log::*;
use newfs_hfs::fatal::{self, ErrorReporter};
use newfs_hfs::overrides::{self, get_num};
use newfs_hfs::{params, probe, report, DriveGeometry, Environment, Error, Overrides};
use std::path::Path;

#[derive(FromArgs, Debug)]
/// Compute the layout of a new HFS Plus volume. With -N only print the
/// format parameters.
struct Args {
    /// do not create the file system, just print out parameters
    #[argh(switch, short = 'N')]
    dry_run: bool,

    /// volume size for a -N run without a device (b/k/m/g/t/p suffixes)
    #[argh(option)]
    partition_size: Option<String>,

    /// make this volume journaled
    #[argh(switch, short = 'J')]
    journaled: bool,

    /// journal size for -J (b/k/m/g/t/p suffixes)
    #[argh(option)]
    journal_size: Option<String>,

    /// use this device for an external journal
    #[argh(option, short = 'D')]
    journal_device: Option<String>,

    /// group id (for root directory)
    #[argh(option, short = 'G')]
    group: Option<String>,

    /// user id (for root directory)
    #[argh(option, short = 'U')]
    user: Option<String>,

    /// octal access mask (for root directory)
    #[argh(option, short = 'M')]
    mask: Option<String>,

    /// allocation block size (4096 optimal)
    #[argh(option, short = 'b')]
    block_size: Option<String>,

    /// clump size list: a=, b=, c=, d=, e=, r=blocks (comma separated)
    #[argh(option, short = 'c')]
    clump_sizes: Vec<String>,

    /// starting catalog node id
    #[argh(option, short = 'i')]
    catalog_id: Option<String>,

    /// b-tree node size list: c=, e=, a=size (comma separated)
    #[argh(option, short = 'n')]
    node_sizes: Vec<String>,

    /// use case-sensitive filenames (default is case-insensitive)
    #[argh(switch, short = 's')]
    case_sensitive: bool,

    /// volume name (in ascii or UTF-8)
    #[argh(option, short = 'v')]
    volume_name: Option<String>,

    /// device or disk image to format
    #[argh(positional)]
    special: Vec<String>,
}

/// Options that always consume the following argument.
const VALUE_OPTIONS: &[&str] = &[
    "-D", "-G", "-U", "-M", "-b", "-c", "-i", "-n", "-v",
    "--journal-device", "--group", "--user", "--mask", "--block-size",
    "--clump-sizes", "--catalog-id", "--node-sizes", "--volume-name",
    "--journal-size", "--partition-size",
];

/// `-J` and `-N` take an optional size: the next argument belongs to them
/// only if it starts with a digit.
fn normalize(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        out.push(arg.clone());
        let long = match arg.as_str() {
            "--" => {
                out.extend(iter.by_ref().cloned());
                break;
            }
            "-J" => "--journal-size",
            "-N" => "--partition-size",
            opt if VALUE_OPTIONS.contains(&opt) => {
                out.extend(iter.next().cloned());
                continue;
            }
            _ => continue,
        };
        if let Some(size) = iter.next_if(|next| next.starts_with(|c: char| c.is_ascii_digit())) {
            out.push(long.to_string());
            out.push(size.clone());
        }
    }
    out
}

impl Args {
    fn overrides(&self) -> newfs_hfs::Result<Overrides> {
        let mut o = Overrides {
            block_size: self.block_size.as_deref().map(get_num),
            journal: self
                .journaled
                .then(|| self.journal_size.as_deref().map(get_num)),
            journal_device: self.journal_device.clone(),
            case_sensitive: self.case_sensitive,
            owner: self.user.as_deref().map(overrides::parse_user).transpose()?,
            group: self.group.as_deref().map(overrides::parse_group).transpose()?,
            mask: self.mask.as_deref().map(overrides::parse_mask).transpose()?,
            volume_name: self.volume_name.clone(),
            ..Default::default()
        };

        for list in &self.node_sizes {
            overrides::parse_node_list(list, &mut o.node_sizes)?;
        }
        for list in &self.clump_sizes {
            overrides::parse_clump_list(list, &mut o.clump_blocks)?;
        }
        if let Some(id) = &self.catalog_id {
            let id = id
                .parse()
                .map_err(|_| Error::Usage(format!("{}: bad starting catalog node id", id)))?;
            o.next_cnid = Some(id);
        }
        Ok(o)
    }
}

fn run(progname: &str, argv: &[String], reporter: &dyn ErrorReporter) -> Result<()> {
    let argv = normalize(argv);
    let argv: Vec<&str> = argv.iter().map(String::as_str).collect();
    let args = match Args::from_args(&[progname], &argv) {
        Ok(args) => args,
        Err(early) => match early.status {
            Ok(()) => {
                println!("{}", early.output);
                return Ok(());
            }
            Err(()) => return Err(Error::Usage(early.output.trim_end().to_string()).into()),
        },
    };
    debug!("args={:?}", args);

    let overrides = args.overrides()?;

    // a zero size is the same as none
    let partition_size = args.partition_size.as_deref().map(get_num).filter(|&n| n != 0);
    let (geometry, probed, device) = match partition_size {
        Some(size) => {
            if !args.special.is_empty() {
                bail!(Error::Usage(
                    "a device may not be given together with -N size".to_string()
                ));
            }
            let geometry = DriveGeometry::from_partition_size(size)?;
            (geometry, None, None)
        }
        None => {
            let [special] = args.special.as_slice() else {
                bail!(Error::Usage(
                    "exactly one special device is required".to_string()
                ));
            };
            let device = probe::device_path(special);
            probe::check_not_mounted(&device)?;
            let geometry = probe::probe(&device, !args.dry_run)?;
            (geometry, Some(geometry), Some(device))
        }
    };
    info!("geometry={:?}", geometry);

    let derivation = params::derive(&geometry, &overrides, &Environment::current())?;
    for advisory in &derivation.advisories {
        reporter.advise(&advisory.to_string());
    }

    if args.dry_run || partition_size.is_some() {
        print!("{}", report::dry_run(&derivation.params, probed.as_ref()));
        return Ok(());
    }

    let device = device.as_deref().unwrap_or(Path::new(""));
    bail!(
        "{}: writing HFS Plus volumes is not supported by this build (use -N to print the format parameters)",
        device.display()
    )
}

fn main() {
    env_logger::init();

    let argv: Vec<String> = std::env::args().collect();
    let progname = argv
        .first()
        .and_then(|arg0| Path::new(arg0).file_name())
        .and_then(|name| name.to_str())
        .unwrap_or("newfs_hfs")
        .to_string();

    let reporter = fatal::reporter(&progname);
    if let Err(e) = run(&progname, argv.get(1..).unwrap_or(&[]), reporter.as_ref()) {
        reporter.fatal(&format!("{:#}", e));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn parse(args: &[&str]) -> Args {
        let argv = normalize(&strings(args));
        let argv: Vec<&str> = argv.iter().map(String::as_str).collect();
        Args::from_args(&["newfs_hfs"], &argv).unwrap()
    }

    #[test]
    fn normalize_test() {
        assert_eq!(
            normalize(&strings(&["-N", "1g", "-J", "-v", "x"])),
            strings(&["-N", "--partition-size", "1g", "-J", "-v", "x"])
        );
        assert_eq!(
            normalize(&strings(&["-J", "64m", "-N", "disk0s7"])),
            strings(&["-J", "--journal-size", "64m", "-N", "disk0s7"])
        );
        assert_eq!(
            normalize(&strings(&["-J"])),
            strings(&["-J"])
        );
        assert_eq!(
            normalize(&strings(&["--", "-N", "1"])),
            strings(&["--", "-N", "1"])
        );
        // option values are never taken for flags
        assert_eq!(
            normalize(&strings(&["-v", "-N", "-N", "1g"])),
            strings(&["-v", "-N", "-N", "--partition-size", "1g"])
        );
        assert_eq!(
            normalize(&strings(&["-c", "-J", "-J", "64m"])),
            strings(&["-c", "-J", "-J", "--journal-size", "64m"])
        );
    }

    #[test]
    fn args_test() {
        let args = parse(&[
            "-N", "-J", "16m", "-b", "8k", "-n", "c=16384,e=2048", "-c", "b=64", "-c", "d=4",
            "-i", "100", "-v", "Untitled", "-s", "-M", "700", "disk0s7",
        ]);
        assert!(args.dry_run);
        assert_eq!(args.partition_size, None);
        assert_eq!(args.special, strings(&["disk0s7"]));

        let o = args.overrides().unwrap();
        assert_eq!(o.block_size, Some(8192));
        assert_eq!(o.journal, Some(Some(16 * 1024 * 1024)));
        assert_eq!(o.node_sizes.catalog, Some(16384));
        assert_eq!(o.node_sizes.extents, Some(2048));
        assert_eq!(o.clump_blocks.bitmap, Some(64));
        assert_eq!(o.clump_blocks.data, Some(4));
        assert_eq!(o.next_cnid, Some(100));
        assert_eq!(o.volume_name.as_deref(), Some("Untitled"));
        assert!(o.case_sensitive);
        assert_eq!(o.mask, Some(0o700));
        assert_eq!(o.owner, None);
    }

    #[test]
    fn journal_without_size_test() {
        let args = parse(&["-J", "-N", "2g"]);
        assert_eq!(args.partition_size.as_deref(), Some("2g"));
        assert_eq!(args.overrides().unwrap().journal, Some(None));
        assert_eq!(parse(&["-N", "2g"]).overrides().unwrap().journal, None);
    }

    #[test]
    fn bad_list_test() {
        let args = parse(&["-N", "1g", "-n", "q=4096"]);
        assert!(matches!(args.overrides(), Err(Error::Usage(_))));
        let args = parse(&["-N", "1g", "-i", "abc"]);
        assert!(matches!(args.overrides(), Err(Error::Usage(_))));
    }

    #[test]
    fn run_test() {
        let reporter = fatal::Console::new("newfs_hfs");
        run("newfs_hfs", &strings(&["-N", "1g", "-J"]), &reporter).unwrap();

        // not a power of two
        let e = run("newfs_hfs", &strings(&["-N", "1g", "-b", "5000"]), &reporter).unwrap_err();
        assert!(matches!(
            e.downcast_ref::<Error>(),
            Some(Error::InvalidOverride(_))
        ));

        let e = run("newfs_hfs", &strings(&["-N", "1g", "disk0s7"]), &reporter).unwrap_err();
        assert!(matches!(e.downcast_ref::<Error>(), Some(Error::Usage(_))));

        let e = run("newfs_hfs", &strings(&["-N"]), &reporter).unwrap_err();
        assert!(matches!(e.downcast_ref::<Error>(), Some(Error::Usage(_))));

        // -N 0 is a plain dry run, so it still needs a device
        let e = run("newfs_hfs", &strings(&["-N", "0"]), &reporter).unwrap_err();
        assert!(matches!(e.downcast_ref::<Error>(), Some(Error::Usage(_))));
    }

    #[test]
    fn zero_partition_size_test() {
        let path = std::env::temp_dir().join(format!("newfs_hfs-main-{}.img", std::process::id()));
        std::fs::write(&path, vec![0u8; 1024 * 1024]).unwrap();
        let image = path.to_string_lossy().to_string();

        let reporter = fatal::Console::new("newfs_hfs");
        let result = run("newfs_hfs", &strings(&["-N", "0", &image]), &reporter);
        std::fs::remove_file(&path).unwrap();
        result.unwrap();
    }
}
