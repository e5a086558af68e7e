//! Scriptable stand-in for the platform interface.
//!
//! [`MockCommSys`] simulates the host OS without hardware: tests
//! declare which devices exist, script read/write submissions
//! (immediate, pending, zero-length, or failing), and afterwards
//! inspect call counters, the last applied configuration, escape
//! commands, and handle accounting.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{CommSys, DeviceHandle, EventHandle, LineCommand, PendingIo, Submission};
use crate::control::{ControlBlock, LineState};

/// One scripted read submission.
#[derive(Debug, Clone)]
pub enum ReadStep {
    /// Complete within the submit call, delivering these bytes
    /// (possibly none).
    Ready(Vec<u8>),
    /// Report the operation pending; the wait delivers these bytes.
    Wait(Vec<u8>),
    /// Fail the submit call itself.
    Fail(io::ErrorKind),
    /// Report the operation pending, then fail the wait.
    WaitFail(io::ErrorKind),
}

/// One scripted write submission.
#[derive(Debug, Clone)]
pub enum WriteStep {
    /// Accept this many bytes within the submit call.
    Ready(u32),
    /// Report the operation pending; the wait reports this many bytes.
    Wait(u32),
    /// Fail the submit call itself.
    Fail(io::ErrorKind),
    /// Report the operation pending, then fail the wait.
    WaitFail(io::ErrorKind),
}

#[derive(Debug, Default)]
struct MockSysState {
    devices: Vec<String>,
    registry_values: Vec<String>,
    next_handle: u64,
    open_devices: Vec<u64>,
    open_events: Vec<u64>,
    /// Remaining successful event creations before a forced failure.
    event_budget: Option<u32>,
    settings_pushes: u32,
    applied: Option<ControlBlock>,
    read_interval: Option<u32>,
    buffer_sizes: Option<(u32, u32)>,
    flushes: u32,
    discards: Vec<(bool, bool)>,
    line_commands: Vec<LineCommand>,
    modem: LineState,
    read_script: VecDeque<ReadStep>,
    write_script: VecDeque<WriteStep>,
    read_submissions: u32,
    write_submissions: u32,
    next_token: u64,
    pending_reads: HashMap<u64, Result<Vec<u8>, io::ErrorKind>>,
    pending_writes: HashMap<u64, Result<u32, io::ErrorKind>>,
    write_log: Vec<Vec<u8>>,
}

/// Scriptable [`CommSys`] double.
///
/// Cloning shares the underlying state, so a test can hand one clone to
/// the port and keep another for inspection.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use serline::sys::mock::{MockCommSys, ReadStep};
/// use serline::Port;
///
/// let sys = MockCommSys::with_device("COM3");
/// sys.script_read(ReadStep::Wait(b"ok".to_vec()));
///
/// let mut port = Port::open_with(Arc::new(sys.clone()), "COM3", "").unwrap();
/// let mut buf = [0u8; 8];
/// let n = port.read(&mut buf).unwrap();
/// assert_eq!(&buf[..n], b"ok");
/// assert_eq!(sys.settings_pushes(), 1);
/// ```
#[derive(Clone, Default)]
pub struct MockCommSys {
    state: Arc<Mutex<MockSysState>>,
}

impl MockCommSys {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock where only `name` exists as a device.
    pub fn with_device(name: impl Into<String>) -> Self {
        let sys = Self::new();
        sys.add_device(name);
        sys
    }

    pub fn add_device(&self, name: impl Into<String>) {
        self.state.lock().devices.push(name.into());
    }

    /// Append a raw payload to the simulated device registry.
    pub fn add_registry_value(&self, value: impl Into<String>) {
        self.state.lock().registry_values.push(value.into());
    }

    /// Let `successes` event creations succeed, then fail the next one.
    pub fn fail_event_creation_after(&self, successes: u32) {
        self.state.lock().event_budget = Some(successes);
    }

    pub fn script_read(&self, step: ReadStep) {
        self.state.lock().read_script.push_back(step);
    }

    pub fn script_write(&self, step: WriteStep) {
        self.state.lock().write_script.push_back(step);
    }

    pub fn set_modem_lines(&self, lines: LineState) {
        self.state.lock().modem = lines;
    }

    /// Invalidate every open device handle, so further calls on them
    /// fail. Event handles stay valid.
    pub fn revoke_open_devices(&self) {
        self.state.lock().open_devices.clear();
    }

    /// Number of full configuration pushes the device has seen.
    pub fn settings_pushes(&self) -> u32 {
        self.state.lock().settings_pushes
    }

    /// The last configuration the device accepted.
    pub fn applied_settings(&self) -> Option<ControlBlock> {
        self.state.lock().applied
    }

    pub fn read_submissions(&self) -> u32 {
        self.state.lock().read_submissions
    }

    pub fn write_submissions(&self) -> u32 {
        self.state.lock().write_submissions
    }

    /// Device handles currently open.
    pub fn open_device_handles(&self) -> usize {
        self.state.lock().open_devices.len()
    }

    /// Event handles currently open.
    pub fn open_event_handles(&self) -> usize {
        self.state.lock().open_events.len()
    }

    pub fn read_interval(&self) -> Option<u32> {
        self.state.lock().read_interval
    }

    pub fn buffer_sizes(&self) -> Option<(u32, u32)> {
        self.state.lock().buffer_sizes
    }

    pub fn flush_count(&self) -> u32 {
        self.state.lock().flushes
    }

    pub fn discards(&self) -> Vec<(bool, bool)> {
        self.state.lock().discards.clone()
    }

    pub fn line_commands(&self) -> Vec<LineCommand> {
        self.state.lock().line_commands.clone()
    }

    /// Every buffer handed to a write submission, in order.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    fn check_device(state: &MockSysState, dev: DeviceHandle) -> io::Result<()> {
        if state.open_devices.contains(&dev.0) {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unknown device handle",
            ))
        }
    }

    fn fill(buf: &mut [u8], data: &[u8]) -> u32 {
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        n as u32
    }
}

impl CommSys for MockCommSys {
    fn open_device(&self, name: &str) -> io::Result<DeviceHandle> {
        let mut state = self.state.lock();
        if !state.devices.iter().any(|d| d == name) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such device"));
        }
        state.next_handle += 1;
        let handle = state.next_handle;
        state.open_devices.push(handle);
        Ok(DeviceHandle(handle))
    }

    fn close_device(&self, dev: DeviceHandle) -> io::Result<()> {
        let mut state = self.state.lock();
        match state.open_devices.iter().position(|&h| h == dev.0) {
            Some(index) => {
                state.open_devices.remove(index);
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unknown device handle",
            )),
        }
    }

    fn create_event(&self) -> io::Result<EventHandle> {
        let mut state = self.state.lock();
        if let Some(budget) = state.event_budget.as_mut() {
            if *budget == 0 {
                return Err(io::Error::other("event creation refused"));
            }
            *budget -= 1;
        }
        state.next_handle += 1;
        let handle = state.next_handle;
        state.open_events.push(handle);
        Ok(EventHandle(handle))
    }

    fn close_event(&self, event: EventHandle) -> io::Result<()> {
        let mut state = self.state.lock();
        match state.open_events.iter().position(|&h| h == event.0) {
            Some(index) => {
                state.open_events.remove(index);
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unknown event handle",
            )),
        }
    }

    fn apply_settings(&self, dev: DeviceHandle, settings: &ControlBlock) -> io::Result<()> {
        let mut state = self.state.lock();
        Self::check_device(&state, dev)?;
        state.settings_pushes += 1;
        state.applied = Some(*settings);
        Ok(())
    }

    fn set_read_interval(&self, dev: DeviceHandle, millis: u32) -> io::Result<()> {
        let mut state = self.state.lock();
        Self::check_device(&state, dev)?;
        state.read_interval = Some(millis);
        Ok(())
    }

    fn set_buffer_sizes(&self, dev: DeviceHandle, receive: u32, transmit: u32) -> io::Result<()> {
        let mut state = self.state.lock();
        Self::check_device(&state, dev)?;
        state.buffer_sizes = Some((receive, transmit));
        Ok(())
    }

    fn submit_read(
        &self,
        dev: DeviceHandle,
        _event: EventHandle,
        buf: &mut [u8],
    ) -> io::Result<Submission> {
        let mut state = self.state.lock();
        Self::check_device(&state, dev)?;
        state.read_submissions += 1;
        let step = state.read_script.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::WouldBlock, "read script exhausted")
        })?;
        match step {
            ReadStep::Ready(data) => Ok(Submission::Complete(Self::fill(buf, &data))),
            ReadStep::Fail(kind) => Err(io::Error::from(kind)),
            ReadStep::Wait(data) => {
                state.next_token += 1;
                let token = state.next_token;
                state.pending_reads.insert(token, Ok(data));
                Ok(Submission::Pending(PendingIo(token)))
            }
            ReadStep::WaitFail(kind) => {
                state.next_token += 1;
                let token = state.next_token;
                state.pending_reads.insert(token, Err(kind));
                Ok(Submission::Pending(PendingIo(token)))
            }
        }
    }

    fn finish_read(&self, dev: DeviceHandle, op: PendingIo, buf: &mut [u8]) -> io::Result<u32> {
        let mut state = self.state.lock();
        Self::check_device(&state, dev)?;
        let outcome = state.pending_reads.remove(&op.0).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "unknown operation token")
        })?;
        match outcome {
            Ok(data) => Ok(Self::fill(buf, &data)),
            Err(kind) => Err(io::Error::from(kind)),
        }
    }

    fn submit_write(
        &self,
        dev: DeviceHandle,
        _event: EventHandle,
        buf: &[u8],
    ) -> io::Result<Submission> {
        let mut state = self.state.lock();
        Self::check_device(&state, dev)?;
        state.write_submissions += 1;
        state.write_log.push(buf.to_vec());
        let step = match state.write_script.pop_front() {
            Some(step) => step,
            // An unscripted device accepts everything immediately.
            None => WriteStep::Ready(buf.len() as u32),
        };
        match step {
            WriteStep::Ready(count) => Ok(Submission::Complete(count)),
            WriteStep::Fail(kind) => Err(io::Error::from(kind)),
            WriteStep::Wait(count) => {
                state.next_token += 1;
                let token = state.next_token;
                state.pending_writes.insert(token, Ok(count));
                Ok(Submission::Pending(PendingIo(token)))
            }
            WriteStep::WaitFail(kind) => {
                state.next_token += 1;
                let token = state.next_token;
                state.pending_writes.insert(token, Err(kind));
                Ok(Submission::Pending(PendingIo(token)))
            }
        }
    }

    fn finish_write(&self, dev: DeviceHandle, op: PendingIo) -> io::Result<u32> {
        let mut state = self.state.lock();
        Self::check_device(&state, dev)?;
        let outcome = state.pending_writes.remove(&op.0).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "unknown operation token")
        })?;
        match outcome {
            Ok(count) => Ok(count),
            Err(kind) => Err(io::Error::from(kind)),
        }
    }

    fn flush_output(&self, dev: DeviceHandle) -> io::Result<()> {
        let mut state = self.state.lock();
        Self::check_device(&state, dev)?;
        state.flushes += 1;
        Ok(())
    }

    fn discard_buffers(&self, dev: DeviceHandle, receive: bool, transmit: bool) -> io::Result<()> {
        let mut state = self.state.lock();
        Self::check_device(&state, dev)?;
        state.discards.push((receive, transmit));
        Ok(())
    }

    fn line_command(&self, dev: DeviceHandle, command: LineCommand) -> io::Result<()> {
        let mut state = self.state.lock();
        Self::check_device(&state, dev)?;
        state.line_commands.push(command);
        Ok(())
    }

    fn modem_status(&self, dev: DeviceHandle) -> io::Result<LineState> {
        let state = self.state.lock();
        Self::check_device(&state, dev)?;
        Ok(state.modem)
    }

    fn registered_devices(&self) -> io::Result<Vec<String>> {
        Ok(self.state.lock().registry_values.clone())
    }
}

impl std::fmt::Debug for MockCommSys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockCommSys")
            .field("devices", &state.devices)
            .field("open_devices", &state.open_devices.len())
            .field("open_events", &state.open_events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_device_is_not_found() {
        let sys = MockCommSys::new();
        let err = sys.open_device("COM3").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn handles_are_tracked() {
        let sys = MockCommSys::with_device("COM3");
        let dev = sys.open_device("COM3").unwrap();
        let event = sys.create_event().unwrap();
        assert_eq!(sys.open_device_handles(), 1);
        assert_eq!(sys.open_event_handles(), 1);

        sys.close_event(event).unwrap();
        sys.close_device(dev).unwrap();
        assert_eq!(sys.open_device_handles(), 0);
        assert_eq!(sys.open_event_handles(), 0);
    }

    #[test]
    fn double_close_is_rejected() {
        let sys = MockCommSys::with_device("COM3");
        let dev = sys.open_device("COM3").unwrap();
        sys.close_device(dev).unwrap();
        assert!(sys.close_device(dev).is_err());
    }

    #[test]
    fn event_budget_forces_failure() {
        let sys = MockCommSys::new();
        sys.fail_event_creation_after(1);
        assert!(sys.create_event().is_ok());
        assert!(sys.create_event().is_err());
    }

    #[test]
    fn scripted_read_steps_run_in_order() {
        let sys = MockCommSys::with_device("COM3");
        let dev = sys.open_device("COM3").unwrap();
        let event = sys.create_event().unwrap();
        sys.script_read(ReadStep::Ready(b"abc".to_vec()));
        sys.script_read(ReadStep::Wait(b"de".to_vec()));

        let mut buf = [0u8; 8];
        match sys.submit_read(dev, event, &mut buf).unwrap() {
            Submission::Complete(n) => {
                assert_eq!(n, 3);
                assert_eq!(&buf[..3], b"abc");
            }
            other => panic!("expected immediate completion, got {other:?}"),
        }
        match sys.submit_read(dev, event, &mut buf).unwrap() {
            Submission::Pending(op) => {
                let n = sys.finish_read(dev, op, &mut buf).unwrap();
                assert_eq!(&buf[..n as usize], b"de");
            }
            other => panic!("expected pending submission, got {other:?}"),
        }
    }

    #[test]
    fn unscripted_write_accepts_everything() {
        let sys = MockCommSys::with_device("COM3");
        let dev = sys.open_device("COM3").unwrap();
        let event = sys.create_event().unwrap();
        match sys.submit_write(dev, event, b"hello").unwrap() {
            Submission::Complete(n) => assert_eq!(n, 5),
            other => panic!("expected immediate completion, got {other:?}"),
        }
        assert_eq!(sys.write_log(), vec![b"hello".to_vec()]);
    }
}
