use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};

pub use serialport::{SerialPort, SerialPortInfo};

use crate::output::{self, SharedDocument, Utf8Decoder};

pub const READ_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Debug, PartialEq, Eq)]
pub enum SerialEvent {
    Error { id: u64, message: String },
    Closed { id: u64 },
}

/// An open port. The reader thread gets its own clone of the handle.
pub trait SerialLink: Read + Write + Send {
    fn try_clone_link(&self) -> Result<Box<dyn SerialLink>>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn try_clone_link(&self) -> Result<Box<dyn SerialLink>> {
        let clone = self.try_clone().context("clone serial handle")?;
        Ok(Box::new(clone))
    }
}

pub trait Connector {
    fn open(&mut self, port: &str, baud_rate: u32) -> Result<Box<dyn SerialLink>>;
}

/// Opens real ports through the OS driver.
pub struct SystemConnector;

impl Connector for SystemConnector {
    fn open(&mut self, port: &str, baud_rate: u32) -> Result<Box<dyn SerialLink>> {
        let handle = serialport::new(port, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .with_context(|| format!("open {port}"))?;
        Ok(Box::new(handle))
    }
}

pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().context("list available ports")?;
    Ok(ports)
}

struct Reader {
    running: Arc<AtomicBool>,
    /// Hands the decoder back so a character split by a pause survives it.
    thread: JoinHandle<Utf8Decoder>,
}

pub struct Connection {
    id: u64,
    port_name: String,
    baud_rate: u32,
    link: Box<dyn SerialLink>,
    reader: Option<Reader>,
    decoder: Utf8Decoder,
    document: SharedDocument,
    events: Sender<SerialEvent>,
}

impl Connection {
    pub fn open(
        connector: &mut dyn Connector,
        id: u64,
        port_name: &str,
        baud_rate: u32,
        document: SharedDocument,
        events: Sender<SerialEvent>,
    ) -> Result<Self> {
        let link = connector.open(port_name, baud_rate)?;
        tracing::info!(id, port = port_name, baud_rate, "serial port opened");
        Ok(Self {
            id,
            port_name: port_name.to_string(),
            baud_rate,
            link,
            reader: None,
            decoder: Utf8Decoder::default(),
            document,
            events,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn is_reading(&self) -> bool {
        self.reader.is_some()
    }

    pub fn start_reading(&mut self) -> Result<()> {
        if self.reader.is_some() {
            return Ok(());
        }
        let link = self.link.try_clone_link()?;
        let running = Arc::new(AtomicBool::new(true));
        let id = self.id;
        let flag = Arc::clone(&running);
        let document = Arc::clone(&self.document);
        let events = self.events.clone();
        let decoder = std::mem::take(&mut self.decoder);

        let thread = thread::Builder::new()
            .name(format!("serial-reader-{id}"))
            .spawn(move || read_loop(id, link, decoder, flag, document, events))
            .context("spawn reader thread")?;
        self.reader = Some(Reader { running, thread });
        tracing::debug!(id, "reader started");
        Ok(())
    }

    /// Blocks until the reader notices the flag, at most one read timeout.
    pub fn stop_reading(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.running.store(false, Ordering::Relaxed);
            match reader.thread.join() {
                Ok(decoder) => self.decoder = decoder,
                Err(_) => tracing::error!(id = self.id, "reader thread panicked"),
            }
            tracing::debug!(id = self.id, "reader stopped");
        }
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.link.write_all(data).context("write to serial port")?;
        self.link.flush().context("flush serial port")?;
        Ok(())
    }

    pub fn close(self) {}
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.stop_reading();
        tracing::info!(id = self.id, port = %self.port_name, "serial port closed");
    }
}

fn read_loop(
    id: u64,
    mut link: Box<dyn SerialLink>,
    mut decoder: Utf8Decoder,
    running: Arc<AtomicBool>,
    document: SharedDocument,
    events: Sender<SerialEvent>,
) -> Utf8Decoder {
    let mut buf = [0u8; 4096];

    while running.load(Ordering::Relaxed) {
        match link.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                let text = decoder.decode(&buf[..n]);
                if !text.is_empty() {
                    output::lock(&document).append(&text);
                }
            }
            Err(ref e) if is_idle(e) => {}
            Err(e) => {
                tracing::warn!(id, error = %e, "serial read failed");
                let _ = events.send(SerialEvent::Error {
                    id,
                    message: format!("Failed to read from serial: {e}"),
                });
                let _ = events.send(SerialEvent::Closed { id });
                return decoder;
            }
        }
    }
    decoder
}

fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}


#[cfg(test)]
mod tests {
    use super::mock::{MockConnector, Tracker};
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    fn open(tracker: &Arc<Tracker>) -> (Connection, SharedDocument, mpsc::Receiver<SerialEvent>) {
        let document = output::shared();
        let (tx, rx) = mpsc::channel();
        let mut connector = MockConnector(Arc::clone(tracker));
        let conn =
            Connection::open(&mut connector, 7, "COM3", 9600, Arc::clone(&document), tx).unwrap();
        (conn, document, rx)
    }

    #[test]
    fn reader_appends_incoming_bytes() {
        let tracker = Arc::new(Tracker::default());
        let (mut conn, document, _rx) = open(&tracker);
        conn.start_reading().unwrap();

        tracker.feed(b"hello\r\nworld");
        assert!(wait_for(|| output::lock(&document).contents() == "hello\nworld"));
    }

    #[test]
    fn stop_reading_joins_the_reader() {
        let tracker = Arc::new(Tracker::default());
        let (mut conn, _document, _rx) = open(&tracker);
        conn.start_reading().unwrap();
        conn.start_reading().unwrap();
        assert_eq!(tracker.live_readers(), 1);

        conn.stop_reading();
        assert!(!conn.is_reading());
        assert_eq!(tracker.live_readers(), 0);
        assert_eq!(tracker.live_handles(), 1);
    }

    #[test]
    fn character_split_by_a_pause_is_kept() {
        let tracker = Arc::new(Tracker::default());
        let (mut conn, document, _rx) = open(&tracker);
        let degree = "°".as_bytes();
        conn.start_reading().unwrap();

        tracker.feed(&degree[..1]);
        assert!(wait_for(|| tracker.incoming.lock().unwrap().is_empty()));
        conn.stop_reading();
        assert_eq!(output::lock(&document).contents(), "");

        tracker.feed(&degree[1..]);
        tracker.feed(b"C\n");
        conn.start_reading().unwrap();
        assert!(wait_for(|| output::lock(&document).contents() == "°C\n"));
    }

    #[test]
    fn close_releases_every_handle() {
        let tracker = Arc::new(Tracker::default());
        let (mut conn, _document, _rx) = open(&tracker);
        conn.start_reading().unwrap();
        conn.close();
        assert_eq!(tracker.live_handles(), 0);
        assert_eq!(tracker.live_readers(), 0);
    }

    #[test]
    fn write_goes_out_raw() {
        let tracker = Arc::new(Tracker::default());
        let (mut conn, _document, _rx) = open(&tracker);
        conn.write(b"AT\r\n").unwrap();
        assert_eq!(*tracker.written.lock().unwrap(), b"AT\r\n");
    }

    #[test]
    fn read_failure_is_reported_and_ends_the_reader() {
        let tracker = Arc::new(Tracker::default());
        let (mut conn, _document, rx) = open(&tracker);
        tracker.fail_reads.store(true, Ordering::SeqCst);
        conn.start_reading().unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(first, SerialEvent::Error { id: 7, ref message } if message.contains("device unplugged")));
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            SerialEvent::Closed { id: 7 }
        );
    }
}
