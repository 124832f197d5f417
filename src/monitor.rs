use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::baud::{BaudRates, DEFAULT_BAUD_RATE};
use crate::output::{self, SharedDocument};
use crate::serial::{self, Connection, Connector, SerialEvent, SerialPortInfo};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadState {
    Reading,
    Paused,
}

/// Session state: which port and rate are chosen, the one open connection,
/// and the document incoming data lands in.
pub struct Monitor {
    connector: Box<dyn Connector>,
    pub ports: Vec<SerialPortInfo>,
    pub selected_port: Option<String>,
    pub baud_rate: u32,
    pub baud_rates: BaudRates,
    pub append_nl: bool,
    pub append_cr: bool,
    connection: Option<Connection>,
    next_id: u64,
    read_state: ReadState,
    document: SharedDocument,
    event_tx: Sender<SerialEvent>,
    event_rx: Receiver<SerialEvent>,
}

impl Monitor {
    pub fn new(connector: Box<dyn Connector>, baud_rates: BaudRates) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        Self {
            connector,
            ports: Vec::new(),
            selected_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            baud_rates,
            append_nl: false,
            append_cr: false,
            connection: None,
            next_id: 0,
            read_state: ReadState::Reading,
            document: output::shared(),
            event_tx,
            event_rx,
        }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn read_state(&self) -> ReadState {
        self.read_state
    }

    pub fn refresh_ports(&mut self) -> Result<()> {
        self.set_ports(serial::list_ports()?);
        Ok(())
    }

    pub fn set_ports(&mut self, ports: Vec<SerialPortInfo>) {
        tracing::debug!(count = ports.len(), "ports refreshed");
        self.ports = ports;
    }

    /// A new port starts over at the default rate.
    pub fn select_port(&mut self, port: &str) -> Result<()> {
        self.selected_port = Some(port.to_string());
        self.baud_rate = DEFAULT_BAUD_RATE;
        self.reconnect()
    }

    pub fn select_baud(&mut self, baud_rate: u32) -> Result<()> {
        if baud_rate == 0 {
            return Err(anyhow!("Invalid baud rate selected."));
        }
        self.baud_rate = baud_rate;
        self.reconnect()
    }

    /// Closes whatever is open, then opens the selected port. A port that
    /// refuses to open is reported in the output, not as an error.
    pub fn reconnect(&mut self) -> Result<()> {
        self.disconnect();
        let Some(port) = self.selected_port.clone() else {
            return Ok(());
        };

        self.next_id += 1;
        let opened = Connection::open(
            self.connector.as_mut(),
            self.next_id,
            &port,
            self.baud_rate,
            Arc::clone(&self.document),
            self.event_tx.clone(),
        );
        match opened {
            Ok(mut connection) => {
                connection.start_reading()?;
                self.read_state = ReadState::Reading;
                self.connection = Some(connection);
                self.status(&format!("Connected to {port} at {} baud.", self.baud_rate));
            }
            Err(e) => {
                tracing::warn!(port = %port, baud_rate = self.baud_rate, error = %format!("{e:#}"), "connect failed");
                self.status(&format!("Failed to connect: {e:#}"));
            }
        }
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }

    pub fn toggle_pause(&mut self) -> Result<ReadState> {
        let next = match self.read_state {
            ReadState::Reading => ReadState::Paused,
            ReadState::Paused => ReadState::Reading,
        };
        if let Some(connection) = self.connection.as_mut() {
            match next {
                ReadState::Reading => connection.start_reading()?,
                ReadState::Paused => connection.stop_reading(),
            }
        }
        self.read_state = next;
        tracing::info!(state = ?next, "read state changed");
        Ok(next)
    }

    pub fn send(&mut self, text: &str) -> Result<()> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| anyhow!("Not connected to a serial port."))?;

        let mut data = text.as_bytes().to_vec();
        if self.append_cr {
            data.push(b'\r');
        }
        if self.append_nl {
            data.push(b'\n');
        }
        if data.is_empty() {
            return Ok(());
        }
        connection.write(&data)?;
        tracing::debug!(bytes = data.len(), "sent");
        self.status(&format!(">> {text}"));
        Ok(())
    }

    pub fn clear(&self) {
        output::lock(&self.document).clear();
    }

    pub fn copy_text(&self) -> String {
        output::lock(&self.document).contents()
    }

    pub fn toggle_auto_scroll(&self) -> bool {
        let mut document = output::lock(&self.document);
        let enabled = !document.auto_scroll();
        document.set_auto_scroll(enabled);
        enabled
    }

    /// Applies reader events for the current connection and returns the
    /// error messages the user should see. Events from a connection that
    /// has since been replaced are dropped.
    pub fn drain_events(&mut self) -> Vec<String> {
        let mut errors = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            let current = self.connection.as_ref().map(Connection::id);
            match event {
                SerialEvent::Error { id, message } if Some(id) == current => errors.push(message),
                SerialEvent::Closed { id } if Some(id) == current => {
                    if let Some(connection) = self.connection.take() {
                        let port = connection.port_name().to_string();
                        connection.close();
                        self.status(&format!("Disconnected from {port}."));
                    }
                }
                stale => tracing::debug!(?stale, "ignoring event from replaced connection"),
            }
        }
        errors
    }

    fn status(&self, line: &str) {
        output::lock(&self.document).append_line(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::mock::{MockConnector, Tracker};
    use std::sync::atomic::Ordering;
    use std::thread;
    use std::time::{Duration, Instant};

    fn monitor() -> (Monitor, Arc<Tracker>) {
        let tracker = Arc::new(Tracker::default());
        let monitor = Monitor::new(
            Box::new(MockConnector(Arc::clone(&tracker))),
            BaudRates::default(),
        );
        (monitor, tracker)
    }

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

    #[test]
    fn reconnect_without_port_does_nothing() {
        let (mut monitor, tracker) = monitor();
        monitor.reconnect().unwrap();
        assert!(!monitor.is_connected());
        assert!(tracker.opens.lock().unwrap().is_empty());
    }

    #[test]
    fn select_port_connects_at_default_rate() {
        let (mut monitor, tracker) = monitor();
        monitor.baud_rate = 115200;
        monitor.select_port("/dev/ttyUSB0").unwrap();

        assert!(monitor.is_connected());
        assert_eq!(monitor.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(
            tracker.opens.lock().unwrap()[0],
            ("/dev/ttyUSB0".to_string(), 9600, 0)
        );
        assert!(monitor
            .copy_text()
            .contains("Connected to /dev/ttyUSB0 at 9600 baud."));
    }

    #[test]
    fn changes_close_the_old_handle_before_opening() {
        let (mut monitor, tracker) = monitor();
        monitor.select_port("COM1").unwrap();
        monitor.select_baud(115200).unwrap();
        monitor.select_port("COM2").unwrap();
        monitor.reconnect().unwrap();

        let opens = tracker.opens.lock().unwrap().clone();
        assert_eq!(opens.len(), 4);
        assert!(opens.iter().all(|(_, _, live)| *live == 0));
        assert_eq!(opens[1], ("COM1".to_string(), 115200, 0));
        assert_eq!(tracker.peak_handles.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.live_handles(), 1);
        assert_eq!(tracker.live_readers(), 1);
    }

    #[test]
    fn failed_open_is_reported_in_output() {
        let (mut monitor, tracker) = monitor();
        monitor.select_port("COM1").unwrap();
        tracker.refuse_open.store(true, Ordering::SeqCst);
        monitor.reconnect().unwrap();

        assert!(!monitor.is_connected());
        assert_eq!(tracker.live_handles(), 0);
        assert!(monitor
            .copy_text()
            .contains("Failed to connect: No such file or directory"));
    }

    #[test]
    fn zero_baud_is_rejected() {
        let (mut monitor, tracker) = monitor();
        monitor.selected_port = Some("COM1".to_string());
        assert!(monitor.select_baud(0).is_err());
        assert!(tracker.opens.lock().unwrap().is_empty());
    }

    #[test]
    fn reader_runs_only_while_reading() {
        let (mut monitor, tracker) = monitor();
        monitor.select_port("COM1").unwrap();
        assert_eq!(monitor.read_state(), ReadState::Reading);
        assert_eq!(tracker.live_readers(), 1);

        assert_eq!(monitor.toggle_pause().unwrap(), ReadState::Paused);
        assert_eq!(tracker.live_readers(), 0);
        assert!(!monitor.connection().unwrap().is_reading());

        assert_eq!(monitor.toggle_pause().unwrap(), ReadState::Reading);
        assert_eq!(tracker.live_readers(), 1);
        assert!(monitor.connection().unwrap().is_reading());
    }

    #[test]
    fn paused_data_waits_for_resume() {
        let (mut monitor, tracker) = monitor();
        monitor.select_port("COM1").unwrap();
        monitor.toggle_pause().unwrap();
        monitor.clear();

        tracker.feed(b"queued\n");
        thread::sleep(Duration::from_millis(30));
        assert!(output::lock(monitor.document()).is_empty());

        monitor.toggle_pause().unwrap();
        assert!(wait_for(|| monitor.copy_text() == "queued\n"));
    }

    #[test]
    fn reconnect_resumes_reading() {
        let (mut monitor, tracker) = monitor();
        monitor.select_port("COM1").unwrap();
        monitor.toggle_pause().unwrap();
        monitor.reconnect().unwrap();
        assert_eq!(monitor.read_state(), ReadState::Reading);
        assert_eq!(tracker.live_readers(), 1);
    }

    #[test]
    fn pause_without_connection_only_flips_state() {
        let (mut monitor, _tracker) = monitor();
        assert_eq!(monitor.toggle_pause().unwrap(), ReadState::Paused);
        assert_eq!(monitor.toggle_pause().unwrap(), ReadState::Reading);
    }

    #[test]
    fn send_appends_line_endings() {
        let (mut monitor, tracker) = monitor();
        monitor.select_port("COM1").unwrap();
        monitor.append_cr = true;
        monitor.append_nl = true;
        monitor.send("AT").unwrap();

        assert_eq!(*tracker.written.lock().unwrap(), b"AT\r\n");
        assert!(monitor.copy_text().contains(">> AT"));
    }

    #[test]
    fn send_without_connection_fails() {
        let (mut monitor, _tracker) = monitor();
        let err = monitor.send("AT").unwrap_err();
        assert!(err.to_string().contains("Not connected"));
    }

    #[test]
    fn empty_send_without_endings_writes_nothing() {
        let (mut monitor, tracker) = monitor();
        monitor.select_port("COM1").unwrap();
        monitor.send("").unwrap();
        assert!(tracker.written.lock().unwrap().is_empty());
    }

    #[test]
    fn read_failure_drops_the_connection() {
        let (mut monitor, tracker) = monitor();
        monitor.select_port("COM1").unwrap();
        tracker.fail_reads.store(true, Ordering::SeqCst);

        let mut errors = Vec::new();
        assert!(wait_for(|| {
            errors.extend(monitor.drain_events());
            !monitor.is_connected()
        }));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("device unplugged"));
        assert_eq!(tracker.live_handles(), 0);
        assert!(monitor.copy_text().contains("Disconnected from COM1."));
    }

    #[test]
    fn toggle_auto_scroll_flips_document_flag() {
        let (monitor, _tracker) = monitor();
        assert!(!monitor.toggle_auto_scroll());
        assert!(!output::lock(monitor.document()).auto_scroll());
        assert!(monitor.toggle_auto_scroll());
    }
}
