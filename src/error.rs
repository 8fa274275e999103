use derive_more::Display;

/// Every fatal condition the tool can hit. None of them is recoverable: the
/// derivation stops at the first one and the process exits with status 1.
#[derive(Debug, Display)]
pub enum Error {
    /// malformed command line
    #[display(fmt = "{}", _0)]
    Usage(String),
    /// an explicit value violates a range, power-of-two or multiple-of rule
    #[display(fmt = "{}", _0)]
    InvalidOverride(String),
    /// block or sector counts do not fit the on-disk 32-bit fields
    #[display(fmt = "{}", _0)]
    GeometryOverflow(String),
    #[display(fmt = "{}", _0)]
    VolumeTooSmall(String),
    /// geometry probe, open or stat failure
    #[display(fmt = "{}", _0)]
    Device(String),
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

macro_rules! invalid {
    ($($arg:tt)*) => {
        $crate::error::Error::InvalidOverride(format!($($arg)*))
    };
}

pub(crate) use invalid;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_test() {
        let e = Error::Device("/dev/sdb: No such file or directory".to_string());
        assert_eq!(e.to_string(), "/dev/sdb: No such file or directory");
        assert_eq!(invalid!("{}: bad", 5000).to_string(), "5000: bad");
        assert!(std::error::Error::source(&e).is_none());
    }
}
