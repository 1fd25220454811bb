//! Status codes and property tags reported by the bootloader.

/// Status codes the target can return in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StatusCode {
    // Generic statuses
    Success = 0,
    Fail = 1,
    ReadOnly = 2,
    OutOfRange = 3,
    InvalidArgument = 4,
    Timeout = 5,
    NoTransferInProgress = 6,

    // Flash driver errors
    FlashSizeError = 100,
    FlashAlignmentError = 101,
    FlashAddressError = 102,
    FlashAccessError = 103,
    FlashProtectionViolation = 104,
    FlashCommandFailure = 105,
    FlashUnknownProperty = 106,
    FlashEraseKeyError = 107,
    FlashRegionExecuteOnly = 108,
    FlashExecuteInRamFunctionNotReady = 109,

    // Memory interface errors
    MemoryRangeInvalid = 10200,
    MemoryReadFailed = 10201,
    MemoryWriteFailed = 10202,
    MemoryCumulativeWrite = 10203,
    MemoryAppOverlapWithExecuteOnlyRegion = 10204,

    // Property store errors
    UnknownProperty = 10300,
    ReadOnlyProperty = 10301,
    InvalidPropertyValue = 10302,

    // Application CRC check statuses
    AppCrcCheckPassed = 10400,
    AppCrcCheckFailed = 10401,
    AppCrcCheckInactive = 10402,
    AppCrcCheckInvalid = 10403,
    AppCrcCheckOutOfRange = 10404,

    // Reliable update statuses
    ReliableUpdateSuccess = 10600,
    ReliableUpdateFail = 10601,
    ReliableUpdateInactive = 10602,
    ReliableUpdateBackupApplicationInvalid = 10603,
    ReliableUpdateStillInMainApplication = 10604,
    ReliableUpdateSwapSystemNotReady = 10605,
    ReliableUpdateBackupBootloaderNotReady = 10606,
    ReliableUpdateSwapIndicatorAddressInvalid = 10607,
}

impl StatusCode {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Success,
            1 => Self::Fail,
            2 => Self::ReadOnly,
            3 => Self::OutOfRange,
            4 => Self::InvalidArgument,
            5 => Self::Timeout,
            6 => Self::NoTransferInProgress,
            100 => Self::FlashSizeError,
            101 => Self::FlashAlignmentError,
            102 => Self::FlashAddressError,
            103 => Self::FlashAccessError,
            104 => Self::FlashProtectionViolation,
            105 => Self::FlashCommandFailure,
            106 => Self::FlashUnknownProperty,
            107 => Self::FlashEraseKeyError,
            108 => Self::FlashRegionExecuteOnly,
            109 => Self::FlashExecuteInRamFunctionNotReady,
            10200 => Self::MemoryRangeInvalid,
            10201 => Self::MemoryReadFailed,
            10202 => Self::MemoryWriteFailed,
            10203 => Self::MemoryCumulativeWrite,
            10204 => Self::MemoryAppOverlapWithExecuteOnlyRegion,
            10300 => Self::UnknownProperty,
            10301 => Self::ReadOnlyProperty,
            10302 => Self::InvalidPropertyValue,
            10400 => Self::AppCrcCheckPassed,
            10401 => Self::AppCrcCheckFailed,
            10402 => Self::AppCrcCheckInactive,
            10403 => Self::AppCrcCheckInvalid,
            10404 => Self::AppCrcCheckOutOfRange,
            10600 => Self::ReliableUpdateSuccess,
            10601 => Self::ReliableUpdateFail,
            10602 => Self::ReliableUpdateInactive,
            10603 => Self::ReliableUpdateBackupApplicationInvalid,
            10604 => Self::ReliableUpdateStillInMainApplication,
            10605 => Self::ReliableUpdateSwapSystemNotReady,
            10606 => Self::ReliableUpdateBackupBootloaderNotReady,
            10607 => Self::ReliableUpdateSwapIndicatorAddressInvalid,
            _ => return None,
        })
    }
}

/// Renders a raw status word by name when known, by number otherwise.
pub fn status_name(status: u32) -> String {
    match StatusCode::from_u32(status) {
        Some(code) => format!("{code:?}"),
        None => status.to_string(),
    }
}

/// Renders a property word. Words that fall in the CRC-check or
/// reliable-update status ranges are themselves status codes and are shown by
/// name.
pub fn property_value_name(value: u32) -> String {
    let crc_check = StatusCode::AppCrcCheckPassed as u32..=StatusCode::AppCrcCheckOutOfRange as u32;
    let reliable_update = StatusCode::ReliableUpdateSuccess as u32
        ..=StatusCode::ReliableUpdateSwapIndicatorAddressInvalid as u32;

    if crc_check.contains(&value) || reliable_update.contains(&value) {
        status_name(value)
    } else {
        format!("{value:#010X}")
    }
}

/// Property tags accepted by the get-property command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PropertyTag {
    BootloaderVersion = 0x01,
    AvailablePeripherals = 0x02,
    FlashStartAddress = 0x03,
    FlashSizeInBytes = 0x04,
    FlashSectorSize = 0x05,
    FlashBlockCount = 0x06,
    AvailableCommands = 0x07,
    CrcCheckStatus = 0x08,
    VerifyWrites = 0x0A,
    MaxPacketSize = 0x0B,
    ReservedRegions = 0x0C,
    RamStartAddress = 0x0E,
    RamSizeInBytes = 0x0F,
    SystemDeviceId = 0x10,
    FlashSecurityState = 0x11,
    UniqueDeviceId = 0x12,
    FacSupport = 0x13,
    FlashAccessSegmentSize = 0x14,
    FlashAccessSegmentCount = 0x15,
    FlashReadMargin = 0x16,
    QspiInitStatus = 0x17,
    TargetVersion = 0x18,
    ExternalMemoryAttributes = 0x19,
    ReliableUpdateStatus = 0x1A,
}

impl PropertyTag {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0x01 => Self::BootloaderVersion,
            0x02 => Self::AvailablePeripherals,
            0x03 => Self::FlashStartAddress,
            0x04 => Self::FlashSizeInBytes,
            0x05 => Self::FlashSectorSize,
            0x06 => Self::FlashBlockCount,
            0x07 => Self::AvailableCommands,
            0x08 => Self::CrcCheckStatus,
            0x0A => Self::VerifyWrites,
            0x0B => Self::MaxPacketSize,
            0x0C => Self::ReservedRegions,
            0x0E => Self::RamStartAddress,
            0x0F => Self::RamSizeInBytes,
            0x10 => Self::SystemDeviceId,
            0x11 => Self::FlashSecurityState,
            0x12 => Self::UniqueDeviceId,
            0x13 => Self::FacSupport,
            0x14 => Self::FlashAccessSegmentSize,
            0x15 => Self::FlashAccessSegmentCount,
            0x16 => Self::FlashReadMargin,
            0x17 => Self::QspiInitStatus,
            0x18 => Self::TargetVersion,
            0x19 => Self::ExternalMemoryAttributes,
            0x1A => Self::ReliableUpdateStatus,
            _ => return None,
        })
    }
}
