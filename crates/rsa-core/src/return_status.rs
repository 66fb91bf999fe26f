//! Native return-status catalog.
//!
//! Every call into the vendor driver returns one of these codes. There is a
//! single catalog for the whole crate family; `Unknown` preserves any code a
//! newer driver revision may add.

use std::fmt;

macro_rules! return_statuses {
    ($($(#[$meta:meta])* $name:ident = $code:literal),+ $(,)?) => {
        /// Status code returned by a native driver call.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ReturnStatus {
            $($(#[$meta])* $name,)+
            /// Code not present in this catalog.
            Unknown(i32),
        }

        impl ReturnStatus {
            /// Map a raw native code onto the catalog.
            pub fn from_code(code: i32) -> Self {
                match code {
                    $($code => Self::$name,)+
                    other => Self::Unknown(other),
                }
            }

            /// Raw native code.
            pub fn code(self) -> i32 {
                match self {
                    $(Self::$name => $code,)+
                    Self::Unknown(other) => other,
                }
            }

            /// Vendor name of the status.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name),)+
                    Self::Unknown(_) => "Unknown",
                }
            }
        }
    };
}

return_statuses! {
    /// Call succeeded.
    NoError = 0,

    // Connection
    ErrorNotConnected = 101,
    ErrorIncompatibleFirmware = 102,
    ErrorBootLoaderNotRunning = 103,
    ErrorTooManyBootLoadersConnected = 104,
    ErrorRebootFailure = 105,

    // POST
    ErrorPostFailureFpgaLoad = 201,
    ErrorPostFailureHiPower = 202,
    ErrorPostFailureI2c = 203,
    ErrorPostFailureGpif = 204,
    ErrorPostFailureUsbSpeed = 205,
    ErrorPostDiagFailure = 206,

    // General measurement
    ErrorBufferAllocFailed = 301,
    ErrorParameter = 302,
    ErrorDataNotReady = 304,

    // Spectrum
    ErrorParameterTraceLength = 1101,
    ErrorMeasurementNotEnabled = 1102,
    ErrorSpanIsLessThanRbw = 1103,
    ErrorFrequencyOutOfRange = 1104,

    // IF streaming
    ErrorStreamAdcToDiskFileOpen = 1201,
    ErrorStreamAdcToDiskAlreadyStreaming = 1202,
    ErrorStreamAdcToDiskBadPath = 1203,
    ErrorStreamAdcToDiskThreadFailure = 1204,
    ErrorStreamedFileInvalidHeader = 1205,
    ErrorStreamedFileOpenFailure = 1206,
    ErrorStreamingOperationNotSupported = 1207,
    ErrorStreamingFastForwardTimeInvalid = 1208,
    ErrorStreamingInvalidParameters = 1209,
    ErrorStreamingEof = 1210,

    // IQ streaming
    ErrorIqStreamInvalidFileDataType = 1301,
    ErrorIqStreamFileOpenFailed = 1302,
    ErrorIqStreamBandwidthOutOfRange = 1303,

    // Internal
    ErrorTimeout = 3001,
    ErrorTransfer = 3002,
    ErrorFileOpen = 3003,
    ErrorFailed = 3004,
    ErrorCrc = 3005,
    ErrorChangeToFlashMode = 3006,
    ErrorChangeToRunMode = 3007,
    ErrorDsplError = 3008,
    ErrorLoLockFailure = 3009,
    ErrorExternalReferenceNotEnabled = 3010,
    ErrorLogFailure = 3011,
    ErrorRegisterIo = 3012,
    ErrorFileRead = 3013,
    ErrorOperationNotSupportedInSimMode = 3015,

    ErrorDisconnectedDeviceRemoved = 3101,
    ErrorDisconnectedDeviceNodeChangedAndRemoved = 3102,
    ErrorDisconnectedTimeoutWaitingForAdcData = 3103,
    ErrorDisconnectedIoBeginTransfer = 3104,

    ErrorFpgaConfigureFailure = 3201,
    ErrorCalCwNormFailure = 3202,
    ErrorSystemAppDataDirectory = 3203,
    ErrorFileCreateMru = 3204,
    ErrorDeleteUnsuitableCachePath = 3205,
    ErrorUnableToSetFilePermissions = 3206,
    ErrorCreateCachePath = 3207,
    ErrorCreateCachePathBoost = 3208,
    ErrorCreateCachePathStd = 3209,
    ErrorCreateCachePathGen = 3210,
    ErrorBufferLengthTooSmall = 3211,
    ErrorRemoveCachePath = 3212,
    ErrorGetCachingDirectoryBoost = 3213,
    ErrorGetCachingDirectoryStd = 3214,
    ErrorGetCachingDirectoryGen = 3215,
    ErrorInconsistentFileSystem = 3216,

    ErrorWriteCalConfigHeader = 3301,
    ErrorWriteCalConfigData = 3302,
    ErrorReadCalConfigHeader = 3303,
    ErrorReadCalConfigData = 3304,
    ErrorEraseCalConfig = 3305,
    ErrorCalConfigFileSize = 3306,
    ErrorInvalidCalibConstantFileFormat = 3307,
    ErrorMismatchCalibConstantsSize = 3308,
    ErrorCalConfigInvalid = 3309,

    // Flash
    ErrorFlashFileSystemUnexpectedSize = 3401,
    ErrorFlashFileSystemNotMounted = 3402,
    ErrorFlashFileSystemOutOfRange = 3403,
    ErrorFlashFileSystemIndexNotFound = 3404,
    ErrorFlashFileSystemReadErrorCrc = 3405,
    ErrorFlashFileSystemReadFileMissing = 3406,
    ErrorFlashFileSystemCreateCacheIndex = 3407,
    ErrorFlashFileSystemCreateCachedDataFile = 3408,
    ErrorFlashFileSystemUnsupportedFileSize = 3409,
    ErrorFlashFileSystemInsufficentSpace = 3410,
    ErrorFlashFileSystemInconsistentState = 3411,
    ErrorFlashFileSystemTooManyFiles = 3412,
    ErrorFlashFileSystemImportFileNotFound = 3413,
    ErrorFlashFileSystemImportFileReadError = 3414,
    ErrorFlashFileSystemImportFileError = 3415,
    ErrorFlashFileSystemFileNotFoundError = 3416,
    ErrorFlashFileSystemReadBufferTooSmall = 3417,
    ErrorFlashWriteFailure = 3418,
    ErrorFlashReadFailure = 3419,
    ErrorFlashFileSystemBadArgument = 3420,
    ErrorFlashFileSystemCreateFile = 3421,

    // Aux monitoring
    ErrorMonitoringNotSupported = 3501,
    ErrorAuxDataNotAvailable = 3502,

    // Battery
    ErrorBatteryCommFailure = 3601,
    ErrorBatteryChargerCommFailure = 3602,
    ErrorBatteryNotPresent = 3603,

    // EST
    ErrorEstOutputPathFile = 3701,
    ErrorEstPathNotDirectory = 3702,
    ErrorEstPathDoesntExist = 3703,
    ErrorEstUnableToOpenLog = 3704,
    ErrorEstUnableToOpenLimits = 3705,

    ErrorRevisionDataNotFound = 3801,

    // Alignment
    Error112MhzAlignmentSignalLevelTooLow = 3901,
    Error10MhzAlignmentSignalLevelTooLow = 3902,
    ErrorInvalidCalConstant = 3903,
    ErrorNormalizationCacheInvalid = 3904,
    ErrorInvalidAlignmentCache = 3905,

    ErrorTriggerSystem = 4000,
    ErrorVnaUnsupportedConfiguration = 4100,

    // MFC
    ErrorMfcHwNotPresent = 4200,
    ErrorMfcWriteCalFile = 4201,
    ErrorMfcReadCalFile = 4203,
    ErrorMfcFileFormatError = 4204,
    ErrorMfcFlashCorruptDataError = 4205,

    // Acquisition status
    ErrorAdcOverrange = 9000,
    ErrorOscUnlock = 9001,

    ErrorNotSupported = 9901,
    ErrorPlaceholder = 9999,
    NotImplemented = -1,
}

impl ReturnStatus {
    /// True only for [`ReturnStatus::NoError`].
    pub fn is_success(self) -> bool {
        self == Self::NoError
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown status ({})", code),
            other => write!(f, "{} ({})", other.name(), other.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_known_codes() {
        for code in [0, 101, 302, 1303, 3103, 9000, -1] {
            assert_eq!(ReturnStatus::from_code(code).code(), code);
        }
        assert_eq!(
            ReturnStatus::from_code(1303),
            ReturnStatus::ErrorIqStreamBandwidthOutOfRange
        );
    }

    #[test]
    fn test_unknown_code_preserved() {
        let status = ReturnStatus::from_code(4242);
        assert_eq!(status, ReturnStatus::Unknown(4242));
        assert_eq!(status.code(), 4242);
        assert!(status.to_string().contains("4242"));
    }

    #[test]
    fn test_success() {
        assert!(ReturnStatus::NoError.is_success());
        assert!(!ReturnStatus::ErrorTimeout.is_success());
        assert_eq!(
            ReturnStatus::ErrorTimeout.to_string(),
            "ErrorTimeout (3001)"
        );
    }
}
