// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Etikett label printer bridge.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::{EtikettError, Result};

/// Unique identifier for a bounded job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Outcome codes and job results
// ---------------------------------------------------------------------------

/// A driver-defined status value returned by a device operation.
///
/// Exactly one value of every implementing type denotes "no error".
pub trait OutcomeCode: fmt::Display {
    fn is_success(&self) -> bool;
}

/// Result codes reported by a printer channel after a print attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrintOutcome {
    NoError,
    PrintSettingsError,
    FilePathError,
    UnsupportedFile,
    SetLabelSizeError,
    PaperEmpty,
    CoverOpen,
    Busy,
    PrinterTurnedOff,
    BatteryWeak,
    ExpansionBufferFull,
    CommunicationError,
    PaperJam,
    MediaCannotBeFed,
    OverHeat,
    HighVoltageAdapter,
    SystemError,
    Canceled,
    ChannelTimeout,
    UnknownError,
}

impl PrintOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoError => "NoError",
            Self::PrintSettingsError => "PrintSettingsError",
            Self::FilePathError => "FilePathError",
            Self::UnsupportedFile => "UnsupportedFile",
            Self::SetLabelSizeError => "SetLabelSizeError",
            Self::PaperEmpty => "PaperEmpty",
            Self::CoverOpen => "CoverOpen",
            Self::Busy => "Busy",
            Self::PrinterTurnedOff => "PrinterTurnedOff",
            Self::BatteryWeak => "BatteryWeak",
            Self::ExpansionBufferFull => "ExpansionBufferFull",
            Self::CommunicationError => "CommunicationError",
            Self::PaperJam => "PaperJam",
            Self::MediaCannotBeFed => "MediaCannotBeFed",
            Self::OverHeat => "OverHeat",
            Self::HighVoltageAdapter => "HighVoltageAdapter",
            Self::SystemError => "SystemError",
            Self::Canceled => "Canceled",
            Self::ChannelTimeout => "ChannelTimeout",
            Self::UnknownError => "UnknownError",
        }
    }
}

impl fmt::Display for PrintOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OutcomeCode for PrintOutcome {
    fn is_success(&self) -> bool {
        *self == Self::NoError
    }
}

/// Terminal result of one bounded job.
///
/// Produced exactly once per submitted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult<C> {
    /// The operation finished in time and reported "no error".
    Success,
    /// The operation finished in time with a device-reported failure code.
    VendorError(C),
    /// The deadline elapsed before the operation finished.
    Timeout,
    /// The operation faulted in a way no outcome code describes.
    UnexpectedFailure(String),
}

impl<C> JobResult<C> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Short tag used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::VendorError(_) => "vendor-error",
            Self::Timeout => "timeout",
            Self::UnexpectedFailure(_) => "unexpected-failure",
        }
    }
}

impl JobResult<PrintOutcome> {
    /// Convert a finished print job into the crate-wide error taxonomy.
    pub fn into_print_result(self, deadline: Duration) -> Result<()> {
        match self {
            Self::Success => Ok(()),
            Self::VendorError(code) => Err(EtikettError::Print(code)),
            Self::Timeout => Err(EtikettError::Timeout { deadline }),
            Self::UnexpectedFailure(msg) => Err(EtikettError::Unexpected(format!(
                "Print operation failed: {msg}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Printer models and label media
// ---------------------------------------------------------------------------

/// Parse `raw` into `T`, falling back to `default`.
///
/// A missing or empty value yields the default silently. An unrecognised
/// value is logged and also yields the default; callers rely on this to
/// accept stale settings from older app versions.
pub fn parse_or<T>(raw: Option<&str>, default: T) -> T
where
    T: FromStr + fmt::Display,
{
    match raw.map(str::trim) {
        None | Some("") => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!(value, fallback = %default, "unrecognised value, using default");
            default
        }),
    }
}

/// Label printer models the bridge knows how to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum PrinterModel {
    QL_710W,
    QL_720NW,
    QL_800,
    QL_810W,
    QL_820NWB,
    QL_1100,
    QL_1110NWB,
    QL_1115NWB,
}

impl PrinterModel {
    pub const ALL: &'static [PrinterModel] = &[
        Self::QL_710W,
        Self::QL_720NW,
        Self::QL_800,
        Self::QL_810W,
        Self::QL_820NWB,
        Self::QL_1100,
        Self::QL_1110NWB,
        Self::QL_1115NWB,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QL_710W => "QL_710W",
            Self::QL_720NW => "QL_720NW",
            Self::QL_800 => "QL_800",
            Self::QL_810W => "QL_810W",
            Self::QL_820NWB => "QL_820NWB",
            Self::QL_1100 => "QL_1100",
            Self::QL_1110NWB => "QL_1110NWB",
            Self::QL_1115NWB => "QL_1115NWB",
        }
    }

    /// Wide-format models accept media up to 103 mm.
    pub fn is_wide_format(&self) -> bool {
        matches!(self, Self::QL_1100 | Self::QL_1110NWB | Self::QL_1115NWB)
    }
}

impl Default for PrinterModel {
    fn default() -> Self {
        Self::QL_820NWB
    }
}

impl fmt::Display for PrinterModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrinterModel {
    type Err = EtikettError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| EtikettError::Unexpected(format!("unknown printer model: {s}")))
    }
}

/// Label media loaded in the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelSize {
    DieCutW17H54,
    DieCutW17H87,
    DieCutW23H23,
    DieCutW29H42,
    DieCutW29H90,
    DieCutW38H90,
    DieCutW39H48,
    DieCutW52H29,
    DieCutW54H29,
    DieCutW60H86,
    DieCutW62H29,
    DieCutW62H100,
    DieCutW102H51,
    DieCutW102H152,
    DieCutW103H164,
    RollW12,
    RollW29,
    RollW38,
    RollW50,
    RollW54,
    RollW62,
    RollW62RB,
    RollW102,
    RollW103,
}

impl LabelSize {
    pub const ALL: &'static [LabelSize] = &[
        Self::DieCutW17H54,
        Self::DieCutW17H87,
        Self::DieCutW23H23,
        Self::DieCutW29H42,
        Self::DieCutW29H90,
        Self::DieCutW38H90,
        Self::DieCutW39H48,
        Self::DieCutW52H29,
        Self::DieCutW54H29,
        Self::DieCutW60H86,
        Self::DieCutW62H29,
        Self::DieCutW62H100,
        Self::DieCutW102H51,
        Self::DieCutW102H152,
        Self::DieCutW103H164,
        Self::RollW12,
        Self::RollW29,
        Self::RollW38,
        Self::RollW50,
        Self::RollW54,
        Self::RollW62,
        Self::RollW62RB,
        Self::RollW102,
        Self::RollW103,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DieCutW17H54 => "DieCutW17H54",
            Self::DieCutW17H87 => "DieCutW17H87",
            Self::DieCutW23H23 => "DieCutW23H23",
            Self::DieCutW29H42 => "DieCutW29H42",
            Self::DieCutW29H90 => "DieCutW29H90",
            Self::DieCutW38H90 => "DieCutW38H90",
            Self::DieCutW39H48 => "DieCutW39H48",
            Self::DieCutW52H29 => "DieCutW52H29",
            Self::DieCutW54H29 => "DieCutW54H29",
            Self::DieCutW60H86 => "DieCutW60H86",
            Self::DieCutW62H29 => "DieCutW62H29",
            Self::DieCutW62H100 => "DieCutW62H100",
            Self::DieCutW102H51 => "DieCutW102H51",
            Self::DieCutW102H152 => "DieCutW102H152",
            Self::DieCutW103H164 => "DieCutW103H164",
            Self::RollW12 => "RollW12",
            Self::RollW29 => "RollW29",
            Self::RollW38 => "RollW38",
            Self::RollW50 => "RollW50",
            Self::RollW54 => "RollW54",
            Self::RollW62 => "RollW62",
            Self::RollW62RB => "RollW62RB",
            Self::RollW102 => "RollW102",
            Self::RollW103 => "RollW103",
        }
    }

    /// Media width and, for die-cut labels, height in millimetres.
    /// Continuous rolls have no fixed height.
    pub fn dimensions_mm(&self) -> (u32, Option<u32>) {
        match self {
            Self::DieCutW17H54 => (17, Some(54)),
            Self::DieCutW17H87 => (17, Some(87)),
            Self::DieCutW23H23 => (23, Some(23)),
            Self::DieCutW29H42 => (29, Some(42)),
            Self::DieCutW29H90 => (29, Some(90)),
            Self::DieCutW38H90 => (38, Some(90)),
            Self::DieCutW39H48 => (39, Some(48)),
            Self::DieCutW52H29 => (52, Some(29)),
            Self::DieCutW54H29 => (54, Some(29)),
            Self::DieCutW60H86 => (60, Some(86)),
            Self::DieCutW62H29 => (62, Some(29)),
            Self::DieCutW62H100 => (62, Some(100)),
            Self::DieCutW102H51 => (102, Some(51)),
            Self::DieCutW102H152 => (102, Some(152)),
            Self::DieCutW103H164 => (103, Some(164)),
            Self::RollW12 => (12, None),
            Self::RollW29 => (29, None),
            Self::RollW38 => (38, None),
            Self::RollW50 => (50, None),
            Self::RollW54 => (54, None),
            Self::RollW62 | Self::RollW62RB => (62, None),
            Self::RollW102 => (102, None),
            Self::RollW103 => (103, None),
        }
    }

}

impl Default for LabelSize {
    fn default() -> Self {
        Self::DieCutW17H54
    }
}

impl fmt::Display for LabelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabelSize {
    type Err = EtikettError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| EtikettError::Unexpected(format!("unknown label size: {s}")))
    }
}

/// Settings handed to the printer channel for a single print.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintSettings {
    pub model: PrinterModel,
    pub label_size: LabelSize,
    /// Scratch directory the driver may use for intermediate files.
    pub work_path: PathBuf,
}

impl PrintSettings {
    pub fn new(model: PrinterModel, label_size: LabelSize, work_path: PathBuf) -> Self {
        Self {
            model,
            label_size,
            work_path,
        }
    }

    /// Wide media only fits wide-format models.
    pub fn media_fits_model(&self) -> bool {
        self.label_size.dimensions_mm().0 <= 62 || self.model.is_wide_format()
    }
}

/// A printer reported by a network search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredPrinter {
    pub ip_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

/// Outcome of a reachability check.
///
/// An unreachable printer is a normal answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingReport {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PingReport {
    pub fn available(address: &str) -> Self {
        Self {
            available: true,
            ip_address: Some(address.to_owned()),
            error: None,
        }
    }

    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            available: false,
            ip_address: None,
            error: Some(error.into()),
        }
    }
}
