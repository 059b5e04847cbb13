//! Storage-engine vocabulary: file identifiers, flags and result codes
//!
//! Numeric values follow the SQLite VFS contract so the codes can be handed
//! straight back to the engine.

use std::fmt;

/// Caller-assigned opaque identifier of an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u64);

impl FileId {
    /// Creates FileId from the engine's handle value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status codes returned across the storage-engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Ok,
    IoErrRead,
    IoErrShortRead,
    IoErrFstat,
    CantOpen,
}

impl ResultCode {
    /// Numeric value understood by the storage engine.
    pub fn as_raw(self) -> i32 {
        const IOERR: i32 = 10;
        match self {
            ResultCode::Ok => 0,
            ResultCode::IoErrRead => IOERR | (1 << 8),
            ResultCode::IoErrShortRead => IOERR | (2 << 8),
            ResultCode::IoErrFstat => IOERR | (7 << 8),
            ResultCode::CantOpen => 14,
        }
    }

    /// Whether the code belongs to the I/O error family.
    pub fn is_io_error(self) -> bool {
        self.as_raw() & 0xff == 10
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}({})", self.as_raw())
    }
}

/// Flags passed to open and echoed back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpenFlags(pub u32);

impl OpenFlags {
    pub const READONLY: Self = Self(0x0000_0001);
    pub const READWRITE: Self = Self(0x0000_0002);
    pub const CREATE: Self = Self(0x0000_0004);
    pub const MAIN_DB: Self = Self(0x0000_0100);
    pub const MAIN_JOURNAL: Self = Self(0x0000_0800);

    /// Returns the raw bit pattern.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Kind of access check requested by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Exists,
    ReadWrite,
    Read,
    Unknown(i32),
}

impl AccessMode {
    /// Decodes the engine's numeric access flag.
    pub fn from_raw(flags: i32) -> Self {
        match flags {
            0 => AccessMode::Exists,
            1 => AccessMode::ReadWrite,
            2 => AccessMode::Read,
            other => AccessMode::Unknown(other),
        }
    }

    /// Whether an existing swarm file satisfies this check.
    pub fn satisfied_by_existing(self) -> bool {
        matches!(self, AccessMode::Exists | AccessMode::Read)
    }
}

/// Capability bits reported for every file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCharacteristics(pub u32);

impl DeviceCharacteristics {
    /// Backing store never changes underneath the engine.
    pub const IMMUTABLE: Self = Self(0x0000_2000);

    /// Returns the raw bit pattern.
    pub fn bits(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_code_values() {
        assert_eq!(ResultCode::Ok.as_raw(), 0);
        assert_eq!(ResultCode::IoErrRead.as_raw(), 266);
        assert_eq!(ResultCode::IoErrShortRead.as_raw(), 522);
        assert_eq!(ResultCode::IoErrFstat.as_raw(), 1802);
        assert_eq!(ResultCode::CantOpen.as_raw(), 14);

        assert!(ResultCode::IoErrShortRead.is_io_error());
        assert!(!ResultCode::CantOpen.is_io_error());
        assert!(!ResultCode::Ok.is_io_error());
    }

    #[test]
    fn test_access_mode_decoding() {
        assert_eq!(AccessMode::from_raw(0), AccessMode::Exists);
        assert_eq!(AccessMode::from_raw(1), AccessMode::ReadWrite);
        assert_eq!(AccessMode::from_raw(2), AccessMode::Read);
        assert_eq!(AccessMode::from_raw(7), AccessMode::Unknown(7));

        assert!(AccessMode::Exists.satisfied_by_existing());
        assert!(AccessMode::Read.satisfied_by_existing());
        assert!(!AccessMode::ReadWrite.satisfied_by_existing());
        assert!(!AccessMode::Unknown(7).satisfied_by_existing());
    }

    #[test]
    fn test_open_flags_combination() {
        let flags = OpenFlags::READONLY | OpenFlags::MAIN_DB;
        assert!(flags.contains(OpenFlags::MAIN_DB));
        assert!(!flags.contains(OpenFlags::CREATE));
        assert_eq!(flags.bits(), 0x101);
    }
}
