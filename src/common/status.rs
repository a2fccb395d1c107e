//! Operator-facing status lines for the managed-proxy protocol
//!
//! Lines are advisory and never part of a return value:
//! `PROXY-ERROR <message>` on a rejected proxy and `PROXY DONE` on shutdown.

use parking_lot::Mutex;
use std::io::{self, Write};

pub struct StatusChannel {
    out: Mutex<Box<dyn Write + Send>>,
}

impl StatusChannel {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        StatusChannel {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Write a `PROXY-ERROR` line. Embedded newlines are flattened so the
    /// message stays on one line.
    pub fn proxy_error(&self, msg: &str) {
        let msg = msg.replace(|c: char| c == '\r' || c == '\n', " ");
        self.write_line(&format!("PROXY-ERROR {}", msg));
    }

    pub fn proxy_done(&self) {
        self.write_line("PROXY DONE");
    }

    fn write_line(&self, line: &str) {
        let mut out = self.out.lock();
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();
    }
}

impl std::fmt::Debug for StatusChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusChannel").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;

    /// Cloneable in-memory sink for capturing status lines
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_status_lines() {
        let buf = SharedBuf::default();
        let status = StatusChannel::new(Box::new(buf.clone()));
        status.proxy_error("proxy URI has a path defined");
        status.proxy_done();
        assert_eq!(
            buf.contents(),
            "PROXY-ERROR proxy URI has a path defined\nPROXY DONE\n"
        );
    }

    #[test]
    fn test_error_is_single_line() {
        let buf = SharedBuf::default();
        let status = StatusChannel::new(Box::new(buf.clone()));
        status.proxy_error("bad\nthing");
        assert_eq!(buf.contents(), "PROXY-ERROR bad thing\n");
    }
}
