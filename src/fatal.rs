//! Where fatal errors and advisories end up.
//!
//! An interactive run reports on stderr. When the tool was started without a
//! usable stderr (e.g. by a daemon), messages go to the system log instead.

use std::ffi::CString;

pub trait ErrorReporter {
    /// non-fatal warning
    fn advise(&self, msg: &str);
    /// report the condition that is about to end the process
    fn fatal(&self, msg: &str);
}

pub struct Console {
    progname: String,
}

impl Console {
    pub fn new(progname: &str) -> Self {
        Console {
            progname: progname.to_string(),
        }
    }

    fn line(&self, msg: &str) -> String {
        format!("{}: {}", self.progname, msg)
    }
}

impl ErrorReporter for Console {
    fn advise(&self, msg: &str) {
        eprintln!("{}", self.line(msg));
    }

    fn fatal(&self, msg: &str) {
        eprintln!("{}", self.line(msg));
    }
}

pub struct Syslog {
    ident: CString,
}

impl Syslog {
    pub fn new(progname: &str) -> Self {
        let ident = CString::new(progname.replace('\0', ""))
            .unwrap_or_else(|_| CString::from(c"newfs_hfs"));
        Syslog { ident }
    }

    fn log(&self, priority: libc::c_int, msg: &str) {
        let Ok(msg) = CString::new(msg.replace('\0', "")) else {
            return;
        };
        unsafe {
            libc::openlog(self.ident.as_ptr(), libc::LOG_CONS, libc::LOG_DAEMON);
            libc::syslog(priority, c"%s".as_ptr(), msg.as_ptr());
            libc::closelog();
        }
    }
}

impl ErrorReporter for Syslog {
    fn advise(&self, msg: &str) {
        self.log(libc::LOG_WARNING, msg);
    }

    fn fatal(&self, msg: &str) {
        self.log(libc::LOG_ERR, msg);
    }
}

/// Whether fd 2 is open at all.
pub fn stderr_available() -> bool {
    unsafe { libc::fcntl(libc::STDERR_FILENO, libc::F_GETFL) >= 0 }
}

/// Pick the sink once, at start-up.
pub fn reporter(progname: &str) -> Box<dyn ErrorReporter> {
    if stderr_available() {
        Box::new(Console::new(progname))
    } else {
        Box::new(Syslog::new(progname))
    }
}
