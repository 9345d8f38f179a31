//! # Accessory Stream Transport
//!
//! Talks to a printer over an already-opened accessory channel exposed as a
//! character device: a Bluetooth RFCOMM binding (`/dev/rfcomm0`) or a USB
//! serial adapter (`/dev/ttyUSB0`). Pairing and discovery happen outside
//! this crate; the device must exist before [`AccessoryTransport::open`].
//! Unix hosts only.
//!
//! ## TTY Configuration
//!
//! The device is opened in raw mode so binary data is transmitted without
//! modification:
//!
//! - **No input processing**: IGNBRK, BRKINT, PARMRK, ISTRIP, INLCR, IGNCR, ICRNL
//! - **No software flow control**: IXON, IXOFF, IXANY (0x11/0x13 occur in raster data)
//! - **No output processing**: OPOST (no CR/LF translation)
//! - **8-bit characters**: CS8, no parity
//! - **Non-canonical, no echo**: ICANON, ECHO, ECHONL, ISIG, IEXTEN off
//!
//! ## Chunked Writes
//!
//! Writes larger than the chunk size (default 4096 bytes) are split, with a
//! short pause between chunks so the printer's receive buffer keeps up.
//!
//! ## Reads
//!
//! Card reader data is read with `poll(2)` so a read never blocks past its
//! timeout.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::thread;
use std::time::Duration;

use super::{LinkStatus, ReadOutcome, Transport};
use crate::error::{EtiquetaError, Result};

/// Default chunk size for writes (bytes)
const CHUNK_SIZE: usize = 4096;

/// Delay between chunks (milliseconds)
const CHUNK_DELAY_MS: u64 = 2;

/// Printer connection over an accessory character device.
///
/// ## Example
///
/// ```no_run
/// use etiqueta::transport::{AccessoryTransport, LinkStatus, Transport};
/// use etiqueta::protocol::commands;
///
/// let mut transport = AccessoryTransport::open("/dev/rfcomm0", LinkStatus::new())?;
/// transport.write_all(&commands::init())?;
/// transport.close()?;
/// # Ok::<(), etiqueta::EtiquetaError>(())
/// ```
#[derive(Debug)]
pub struct AccessoryTransport {
    file: Option<File>,
    device: String,
    chunk_size: usize,
    chunk_delay: Duration,
    link: LinkStatus,
}

impl AccessoryTransport {
    /// Open the device read/write and switch it to raw mode.
    ///
    /// ## Errors
    ///
    /// [`EtiquetaError::Connect`] if the device is missing, permission is
    /// denied (dialout group), or TTY configuration fails.
    pub fn open<P: AsRef<Path>>(device: P, link: LinkStatus) -> Result<Self> {
        let path = device.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| EtiquetaError::Connect(format!("Failed to open {}: {}", path.display(), e)))?;

        configure_tty_raw(file.as_raw_fd())?;
        tracing::info!(device = %path.display(), "accessory stream opened");

        Ok(Self {
            file: Some(file),
            device: path.display().to_string(),
            chunk_size: CHUNK_SIZE,
            chunk_delay: Duration::from_millis(CHUNK_DELAY_MS),
            link,
        })
    }

    /// Set the chunk size for large writes. Zero is treated as one byte.
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size.max(1);
    }

    pub fn set_chunk_delay(&mut self, delay: Duration) {
        self.chunk_delay = delay;
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| EtiquetaError::Transport(format!("{} is closed", self.device)))
    }

    fn write_chunked(&mut self, data: &[u8]) -> io::Result<()> {
        let chunk_size = self.chunk_size;
        let chunk_delay = self.chunk_delay;
        let Some(file) = self.file.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "device closed"));
        };

        if data.len() <= chunk_size {
            file.write_all(data)?;
        } else {
            for chunk in data.chunks(chunk_size) {
                file.write_all(chunk)?;
                if !chunk_delay.is_zero() {
                    thread::sleep(chunk_delay);
                }
            }
        }
        file.flush()
    }
}

impl Transport for AccessoryTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.write_chunked(data).map_err(|e| {
            EtiquetaError::Transport(format!("Write to {} failed: {}", self.device, e))
        })
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<ReadOutcome> {
        let fd = self.file()?.as_raw_fd();
        if !wait_readable(fd, timeout)? {
            return Ok(ReadOutcome::TimedOut);
        }

        match self.file()?.read(buf) {
            Ok(0) => {
                self.link.report_closed();
                Ok(ReadOutcome::Closed)
            }
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(ReadOutcome::TimedOut),
            Err(e) => {
                self.link.report_error(e.to_string());
                Err(EtiquetaError::Transport(format!(
                    "Read from {} failed: {}",
                    self.device, e
                )))
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        match self.file.take() {
            Some(mut file) => file.flush().map_err(|e| {
                EtiquetaError::Transport(format!("Close {} failed: {}", self.device, e))
            }),
            None => Ok(()),
        }
    }
}

/// Wait until `fd` is readable or the timeout passes.
fn wait_readable(fd: i32, timeout: Duration) -> Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);

    let result = unsafe { libc::poll(&mut pfd, 1, millis) };
    if result < 0 {
        return Err(EtiquetaError::Transport(format!(
            "poll failed: {}",
            io::Error::last_os_error()
        )));
    }
    Ok(result > 0)
}

/// Configure a file descriptor for raw TTY mode.
///
/// Devices that are not terminals (pipes, plain files used in tests) are
/// left as they are.
fn configure_tty_raw(fd: i32) -> Result<()> {
    use std::mem::MaybeUninit;

    if unsafe { libc::isatty(fd) } != 1 {
        tracing::debug!(fd, "not a tty, skipping raw mode");
        return Ok(());
    }

    let mut termios = MaybeUninit::uninit();
    let result = unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) };
    if result != 0 {
        return Err(EtiquetaError::Connect(format!(
            "tcgetattr failed: {}",
            io::Error::last_os_error()
        )));
    }
    let mut termios = unsafe { termios.assume_init() };

    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);
    termios.c_oflag &= !libc::OPOST;
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;

    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) };
    if result != 0 {
        return Err(EtiquetaError::Connect(format!(
            "tcsetattr failed: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device() {
        let err = AccessoryTransport::open("/dev/nonexistent-printer", LinkStatus::new()).unwrap_err();
        assert!(matches!(err, EtiquetaError::Connect(_)));
    }

    #[test]
    fn test_chunked_write_to_plain_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut transport = AccessoryTransport::open(file.path(), LinkStatus::new()).unwrap();
        transport.set_chunk_size(3);
        transport.set_chunk_delay(Duration::ZERO);

        transport.write_all(b"ABCDEFGH").unwrap();
        transport.close().unwrap();

        assert_eq!(std::fs::read(file.path()).unwrap(), b"ABCDEFGH".to_vec());
    }

    #[test]
    fn test_write_after_close_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut transport = AccessoryTransport::open(file.path(), LinkStatus::new()).unwrap();
        transport.close().unwrap();

        assert!(matches!(
            transport.write_all(b"X"),
            Err(EtiquetaError::Transport(_))
        ));
        // Closing twice is harmless
        assert!(transport.close().is_ok());
    }

    #[test]
    fn test_zero_chunk_size_clamped() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut transport = AccessoryTransport::open(file.path(), LinkStatus::new()).unwrap();
        transport.set_chunk_size(0);
        transport.set_chunk_delay(Duration::ZERO);
        transport.write_all(b"AB").unwrap();
        transport.close().unwrap();
        assert_eq!(std::fs::read(file.path()).unwrap(), b"AB".to_vec());
    }
}
