//! Win32 backend for the platform interface.
//!
//! Maps the [`CommSys`] surface onto the comm API: overlapped
//! `ReadFile`/`WriteFile` with manual-reset events, `SetCommState` for
//! configuration pushes, `EscapeCommFunction` for line toggles, and the
//! `SERIALCOMM` registry location for discovery.

use std::ffi::OsStr;
use std::io;
use std::iter;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::ptr;

use winapi::shared::minwindef::{DWORD, FALSE, TRUE};
use winapi::shared::winerror::{
    ERROR_FILE_NOT_FOUND, ERROR_IO_PENDING, ERROR_NO_MORE_ITEMS, ERROR_SUCCESS,
};
use winapi::um::commapi::{
    EscapeCommFunction, GetCommModemStatus, PurgeComm, SetCommState, SetCommTimeouts, SetupComm,
};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::fileapi::{CreateFileW, FlushFileBuffers, ReadFile, WriteFile, OPEN_EXISTING};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::ioapiset::GetOverlappedResult;
use winapi::um::minwinbase::OVERLAPPED;
use winapi::um::synchapi::CreateEventW;
use winapi::um::winbase::{
    CLRDTR, CLRRTS, COMMTIMEOUTS, DCB, DTR_CONTROL_DISABLE, DTR_CONTROL_ENABLE,
    EVENPARITY, FILE_FLAG_OVERLAPPED, MS_CTS_ON, MS_DSR_ON, MS_RING_ON, MS_RLSD_ON, NOPARITY,
    ODDPARITY, ONESTOPBIT, PURGE_RXABORT, PURGE_RXCLEAR, PURGE_TXABORT, PURGE_TXCLEAR,
    RTS_CONTROL_DISABLE, RTS_CONTROL_ENABLE, RTS_CONTROL_HANDSHAKE, SETDTR, SETRTS, TWOSTOPBITS,
};
use winapi::um::winnt::{GENERIC_READ, GENERIC_WRITE, HANDLE, KEY_READ, REG_SZ};
use winapi::um::winreg::{RegCloseKey, RegEnumValueW, RegOpenKeyExW, HKEY_LOCAL_MACHINE};

use super::{CommSys, DeviceHandle, EventHandle, LineCommand, PendingIo, Submission};
use crate::control::{ControlBlock, DtrMode, LineState, Parity, RtsMode, StopBits};

const SERIAL_DEVICE_KEY: &str = "HARDWARE\\DEVICEMAP\\SERIALCOMM";

/// Production [`CommSys`] backed by the Win32 comm API.
#[derive(Debug, Default)]
pub struct Win32CommSys;

impl Win32CommSys {
    pub fn new() -> Self {
        Self
    }
}

fn wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(iter::once(0)).collect()
}

fn raw(dev: DeviceHandle) -> HANDLE {
    dev.0 as usize as HANDLE
}

fn raw_event(event: EventHandle) -> HANDLE {
    event.0 as usize as HANDLE
}

fn encode(settings: &ControlBlock) -> DCB {
    let mut dcb: DCB = unsafe { mem::zeroed() };
    dcb.DCBlength = mem::size_of::<DCB>() as DWORD;
    dcb.BaudRate = settings.baud_rate;
    dcb.ByteSize = settings.word_length;
    dcb.Parity = match settings.parity {
        Parity::None => NOPARITY,
        Parity::Odd => ODDPARITY,
        Parity::Even => EVENPARITY,
    } as u8;
    dcb.StopBits = match settings.stop_bits {
        StopBits::One => ONESTOPBIT,
        StopBits::Two => TWOSTOPBITS,
    } as u8;
    dcb.set_fBinary(1);
    dcb.set_fOutxCtsFlow(settings.flags.cts_flow() as DWORD);
    dcb.set_fDtrControl(match settings.flags.dtr_mode() {
        DtrMode::Disabled => DTR_CONTROL_DISABLE,
        DtrMode::Enabled => DTR_CONTROL_ENABLE,
    });
    dcb.set_fRtsControl(match settings.flags.rts_mode() {
        RtsMode::Disabled => RTS_CONTROL_DISABLE,
        RtsMode::Enabled => RTS_CONTROL_ENABLE,
        RtsMode::Handshake => RTS_CONTROL_HANDSHAKE,
    });
    dcb
}

/// Reclaim the descriptor boxed at submission time.
///
/// Only sound for tokens produced by this backend's submit calls, each
/// of which is consumed exactly once by the engine.
unsafe fn reclaim(op: PendingIo) -> Box<OVERLAPPED> {
    Box::from_raw(op.0 as usize as *mut OVERLAPPED)
}

impl CommSys for Win32CommSys {
    fn open_device(&self, name: &str) -> io::Result<DeviceHandle> {
        let path = wide(name);
        let handle = unsafe {
            CreateFileW(
                path.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                0,
                ptr::null_mut(),
                OPEN_EXISTING,
                FILE_FLAG_OVERLAPPED,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }
        Ok(DeviceHandle(handle as usize as u64))
    }

    fn close_device(&self, dev: DeviceHandle) -> io::Result<()> {
        if unsafe { CloseHandle(raw(dev)) } == FALSE {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn create_event(&self) -> io::Result<EventHandle> {
        let handle = unsafe { CreateEventW(ptr::null_mut(), TRUE, FALSE, ptr::null()) };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(EventHandle(handle as usize as u64))
    }

    fn close_event(&self, event: EventHandle) -> io::Result<()> {
        if unsafe { CloseHandle(raw_event(event)) } == FALSE {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn apply_settings(&self, dev: DeviceHandle, settings: &ControlBlock) -> io::Result<()> {
        let mut dcb = encode(settings);
        if unsafe { SetCommState(raw(dev), &mut dcb) } == FALSE {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn set_read_interval(&self, dev: DeviceHandle, millis: u32) -> io::Result<()> {
        let mut timeouts: COMMTIMEOUTS = unsafe { mem::zeroed() };
        timeouts.ReadIntervalTimeout = millis;
        if unsafe { SetCommTimeouts(raw(dev), &mut timeouts) } == FALSE {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn set_buffer_sizes(&self, dev: DeviceHandle, receive: u32, transmit: u32) -> io::Result<()> {
        if unsafe { SetupComm(raw(dev), receive, transmit) } == FALSE {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn submit_read(
        &self,
        dev: DeviceHandle,
        event: EventHandle,
        buf: &mut [u8],
    ) -> io::Result<Submission> {
        let mut descriptor: Box<OVERLAPPED> = Box::new(unsafe { mem::zeroed() });
        descriptor.hEvent = raw_event(event);
        let mut done: DWORD = 0;
        let ok = unsafe {
            ReadFile(
                raw(dev),
                buf.as_mut_ptr().cast(),
                buf.len() as DWORD,
                &mut done,
                descriptor.as_mut(),
            )
        };
        if ok != FALSE {
            return Ok(Submission::Complete(done));
        }
        let code = unsafe { GetLastError() };
        if code != ERROR_IO_PENDING {
            return Err(io::Error::from_raw_os_error(code as i32));
        }
        Ok(Submission::Pending(PendingIo(
            Box::into_raw(descriptor) as usize as u64,
        )))
    }

    fn finish_read(&self, dev: DeviceHandle, op: PendingIo, _buf: &mut [u8]) -> io::Result<u32> {
        let mut descriptor = unsafe { reclaim(op) };
        let mut done: DWORD = 0;
        let ok = unsafe { GetOverlappedResult(raw(dev), descriptor.as_mut(), &mut done, TRUE) };
        if ok == FALSE {
            return Err(io::Error::last_os_error());
        }
        Ok(done)
    }

    fn submit_write(
        &self,
        dev: DeviceHandle,
        event: EventHandle,
        buf: &[u8],
    ) -> io::Result<Submission> {
        let mut descriptor: Box<OVERLAPPED> = Box::new(unsafe { mem::zeroed() });
        descriptor.hEvent = raw_event(event);
        let mut done: DWORD = 0;
        let ok = unsafe {
            WriteFile(
                raw(dev),
                buf.as_ptr().cast(),
                buf.len() as DWORD,
                &mut done,
                descriptor.as_mut(),
            )
        };
        if ok != FALSE {
            return Ok(Submission::Complete(done));
        }
        let code = unsafe { GetLastError() };
        if code != ERROR_IO_PENDING {
            return Err(io::Error::from_raw_os_error(code as i32));
        }
        Ok(Submission::Pending(PendingIo(
            Box::into_raw(descriptor) as usize as u64,
        )))
    }

    fn finish_write(&self, dev: DeviceHandle, op: PendingIo) -> io::Result<u32> {
        let mut descriptor = unsafe { reclaim(op) };
        let mut done: DWORD = 0;
        let ok = unsafe { GetOverlappedResult(raw(dev), descriptor.as_mut(), &mut done, TRUE) };
        if ok == FALSE {
            return Err(io::Error::last_os_error());
        }
        Ok(done)
    }

    fn flush_output(&self, dev: DeviceHandle) -> io::Result<()> {
        if unsafe { FlushFileBuffers(raw(dev)) } == FALSE {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn discard_buffers(&self, dev: DeviceHandle, receive: bool, transmit: bool) -> io::Result<()> {
        let mut flags: DWORD = 0;
        if receive {
            flags |= PURGE_RXABORT | PURGE_RXCLEAR;
        }
        if transmit {
            flags |= PURGE_TXABORT | PURGE_TXCLEAR;
        }
        if flags == 0 {
            return Ok(());
        }
        if unsafe { PurgeComm(raw(dev), flags) } == FALSE {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn line_command(&self, dev: DeviceHandle, command: LineCommand) -> io::Result<()> {
        let code = match command {
            LineCommand::SetRts => SETRTS,
            LineCommand::ClearRts => CLRRTS,
            LineCommand::SetDtr => SETDTR,
            LineCommand::ClearDtr => CLRDTR,
        };
        if unsafe { EscapeCommFunction(raw(dev), code) } == FALSE {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn modem_status(&self, dev: DeviceHandle) -> io::Result<LineState> {
        let mut bits: DWORD = 0;
        if unsafe { GetCommModemStatus(raw(dev), &mut bits) } == FALSE {
            return Err(io::Error::last_os_error());
        }
        Ok(LineState {
            cts: bits & MS_CTS_ON != 0,
            dsr: bits & MS_DSR_ON != 0,
            ring: bits & MS_RING_ON != 0,
            carrier: bits & MS_RLSD_ON != 0,
        })
    }

    fn registered_devices(&self) -> io::Result<Vec<String>> {
        let path = wide(SERIAL_DEVICE_KEY);
        let mut key = ptr::null_mut();
        let rc = unsafe {
            RegOpenKeyExW(HKEY_LOCAL_MACHINE, path.as_ptr(), 0, KEY_READ, &mut key)
        } as DWORD;
        if rc == ERROR_FILE_NOT_FOUND {
            return Ok(Vec::new());
        }
        if rc != ERROR_SUCCESS {
            return Err(io::Error::from_raw_os_error(rc as i32));
        }

        let mut values = Vec::new();
        let mut index: DWORD = 0;
        loop {
            let mut name = [0u16; 256];
            let mut name_len = name.len() as DWORD;
            let mut value_type: DWORD = 0;
            let mut data = [0u16; 512];
            let mut data_len = (data.len() * 2) as DWORD;
            let rc = unsafe {
                RegEnumValueW(
                    key,
                    index,
                    name.as_mut_ptr(),
                    &mut name_len,
                    ptr::null_mut(),
                    &mut value_type,
                    data.as_mut_ptr().cast(),
                    &mut data_len,
                )
            } as DWORD;
            if rc == ERROR_NO_MORE_ITEMS {
                break;
            }
            if rc != ERROR_SUCCESS {
                // Oversized or unreadable values are skipped; discovery
                // stays best-effort.
                index += 1;
                continue;
            }
            if value_type == REG_SZ {
                let chars = (data_len as usize / 2).min(data.len());
                let text: &[u16] = &data[..chars];
                let trimmed = match text.iter().position(|&c| c == 0) {
                    Some(end) => &text[..end],
                    None => text,
                };
                values.push(String::from_utf16_lossy(trimmed));
            }
            index += 1;
        }
        unsafe { RegCloseKey(key) };
        Ok(values)
    }
}
