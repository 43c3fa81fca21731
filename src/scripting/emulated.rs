/// `scripting/emulated.rs` - In-process host used by the demo binary and tests
///
/// Backs the memory capabilities with a big-endian RAM buffer mapped at
/// `0x8000_0000` (cached) and `0xC000_0000` (uncached mirror). Script log
/// lines go to the `log` facade and into a bounded buffer; alerts are logged
/// and remembered.
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, PoisonError,
};

use super::api::{AlertStyle, HostCapabilities, LogLevel};

/// Entries kept in the script log buffer.
const LOG_CAPACITY: usize = 200;

/// 24 MiB, the size of main memory on the reference console.
pub const DEFAULT_RAM_SIZE: usize = 24 * 1024 * 1024;

/// One `Log` call from script code.
#[derive(Debug, Clone)]
pub struct ScriptLogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub yes_no: bool,
    pub style: AlertStyle,
    pub message: String,
}

pub struct EmulatedHost {
    ram: Mutex<Vec<u8>>,
    log: Mutex<Vec<ScriptLogEntry>>,
    alerts: Mutex<Vec<AlertRecord>>,
    /// Answer given to yes/no alerts.
    default_answer: bool,
    icache_invalidations: AtomicU64,
}

impl EmulatedHost {
    pub fn new() -> Self {
        Self::with_ram_size(DEFAULT_RAM_SIZE)
    }

    pub fn with_ram_size(size: usize) -> Self {
        Self {
            ram: Mutex::new(vec![0; size]),
            log: Mutex::new(Vec::new()),
            alerts: Mutex::new(Vec::new()),
            default_answer: false,
            icache_invalidations: AtomicU64::new(0),
        }
    }

    pub fn with_default_answer(mut self, answer: bool) -> Self {
        self.default_answer = answer;
        self
    }

    /// Last `limit` script log entries, oldest first.
    pub fn recent_log(&self, limit: usize) -> Vec<ScriptLogEntry> {
        let log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = log.len().saturating_sub(limit);
        log[skip..].to_vec()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn icache_invalidations(&self) -> u64 {
        self.icache_invalidations.load(Ordering::Relaxed)
    }

    /// Offset into RAM for a physical-mapped address, if `len` bytes fit.
    fn offset(&self, address: u32, len: usize) -> Option<usize> {
        match address >> 28 {
            0x8 | 0xC => {}
            _ => return None,
        }
        let offset = (address & 0x0FFF_FFFF) as usize;
        let size = self.ram.lock().unwrap_or_else(PoisonError::into_inner).len();
        (offset + len <= size).then_some(offset)
    }

    fn read<const N: usize>(&self, address: u32) -> [u8; N] {
        let mut out = [0u8; N];
        match self.offset(address, N) {
            Some(off) => {
                let ram = self.ram.lock().unwrap_or_else(PoisonError::into_inner);
                out.copy_from_slice(&ram[off..off + N]);
            }
            None => log::debug!("Read of {N} bytes from unmapped address {address:#010x}"),
        }
        out
    }

    fn write<const N: usize>(&self, bytes: [u8; N], address: u32) {
        match self.offset(address, N) {
            Some(off) => {
                let mut ram = self.ram.lock().unwrap_or_else(PoisonError::into_inner);
                ram[off..off + N].copy_from_slice(&bytes);
            }
            None => log::debug!("Write of {N} bytes to unmapped address {address:#010x} ignored"),
        }
    }
}

impl Default for EmulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCapabilities for EmulatedHost {
    fn log(&self, level: LogLevel, text: &str) {
        log::log!(target: "script", level.as_log_level(), "{text}");
        let mut buf = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        buf.push(ScriptLogEntry {
            level,
            message: text.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        });
        if buf.len() > LOG_CAPACITY {
            let skip = buf.len() - LOG_CAPACITY;
            buf.drain(..skip);
        }
    }

    fn alert(&self, yes_no: bool, style: AlertStyle, message: &str) -> bool {
        match style {
            AlertStyle::Critical | AlertStyle::Warning => log::warn!("[alert] {message}"),
            AlertStyle::Information | AlertStyle::Question => log::info!("[alert] {message}"),
        }
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(AlertRecord { yes_no, style, message: message.to_string() });
        if yes_no {
            self.default_answer
        } else {
            true
        }
    }

    fn is_ram_address(&self, address: u32) -> bool {
        self.offset(address, 1).is_some()
    }

    fn read_u8(&self, address: u32) -> u8 {
        u8::from_be_bytes(self.read(address))
    }

    fn read_u16(&self, address: u32) -> u16 {
        u16::from_be_bytes(self.read(address))
    }

    fn read_u32(&self, address: u32) -> u32 {
        u32::from_be_bytes(self.read(address))
    }

    fn read_u64(&self, address: u32) -> u64 {
        u64::from_be_bytes(self.read(address))
    }

    fn write_u8(&self, value: u8, address: u32) {
        self.write(value.to_be_bytes(), address);
    }

    fn write_u16(&self, value: u16, address: u32) {
        self.write(value.to_be_bytes(), address);
    }

    fn write_u32(&self, value: u32, address: u32) {
        self.write(value.to_be_bytes(), address);
    }

    fn write_u64(&self, value: u64, address: u32) {
        self.write(value.to_be_bytes(), address);
    }

    fn invalidate_icache(&self, address: u32, size: u32, forced: bool) {
        log::debug!("icache invalidate {address:#010x}+{size} (forced: {forced})");
        self.icache_invalidations.fetch_add(1, Ordering::Relaxed);
    }
}
