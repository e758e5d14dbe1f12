// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-language messages for label printing failures.
//
// The host app shows these next to the raw error kind so that staff at a
// ticket desk know whether to reload labels, wait, or call for help.

use crate::error::EtikettError;
use crate::types::PrintOutcome;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip or busy printer; trying again is reasonable.
    Transient,
    /// Someone has to do something at the printer.
    ActionRequired,
    /// Retrying will not help.
    Permanent,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::ActionRequired => "action required",
            Self::Permanent => "permanent",
        }
    }
}

/// A human-readable error with an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    pub suggestion: String,
    /// Whether pressing "print" again might succeed without intervention.
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    fn new(message: &str, suggestion: &str, retriable: bool, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable,
            severity,
        }
    }
}

/// Convert an `EtikettError` into a `HumanError`.
pub fn humanize_error(err: &EtikettError) -> HumanError {
    match err {
        EtikettError::File(_) => HumanError::new(
            "The label image couldn't be read.",
            "Choose the image again. If it came from another app, save it to the device first.",
            false,
            Severity::ActionRequired,
        ),
        EtikettError::Channel(_) => HumanError::new(
            "We couldn't connect to the printer.",
            "Check the printer is switched on and on the same Wi-Fi network, and that the address is right.",
            true,
            Severity::Transient,
        ),
        EtikettError::Timeout { .. } => HumanError::new(
            "The printer didn't finish in time.",
            "The printer may not be responding correctly. Switch it off and on, then try again.",
            true,
            Severity::Transient,
        ),
        EtikettError::Print(code) => humanize_outcome(*code),
        EtikettError::Discovery(_) => HumanError::new(
            "We couldn't search for printers.",
            "Make sure Wi-Fi is on, or enter the printer's address by hand.",
            true,
            Severity::Transient,
        ),
        EtikettError::Unexpected(_) | EtikettError::Io(_) | EtikettError::Serialization(_) => {
            HumanError::new(
                "Something went wrong while printing.",
                "Try again. If this keeps happening, restart the app.",
                true,
                Severity::Transient,
            )
        }
    }
}

/// Describe a printer-reported outcome code.
pub fn humanize_outcome(code: PrintOutcome) -> HumanError {
    match code {
        PrintOutcome::NoError => {
            HumanError::new("The label printed.", "", false, Severity::Transient)
        }
        PrintOutcome::PaperEmpty | PrintOutcome::MediaCannotBeFed => HumanError::new(
            "The printer is out of labels.",
            "Load a new label roll, then tap Retry.",
            false,
            Severity::ActionRequired,
        ),
        PrintOutcome::CoverOpen => HumanError::new(
            "The printer cover is open.",
            "Close the roll compartment cover, then tap Retry.",
            false,
            Severity::ActionRequired,
        ),
        PrintOutcome::PaperJam => HumanError::new(
            "A label is stuck in the printer.",
            "Open the cover, remove the stuck label, and close the cover.",
            false,
            Severity::ActionRequired,
        ),
        PrintOutcome::BatteryWeak | PrintOutcome::HighVoltageAdapter => HumanError::new(
            "The printer has a power problem.",
            "Connect the printer to its original power adapter.",
            false,
            Severity::ActionRequired,
        ),
        PrintOutcome::Busy
        | PrintOutcome::ExpansionBufferFull
        | PrintOutcome::CommunicationError
        | PrintOutcome::ChannelTimeout
        | PrintOutcome::OverHeat => HumanError::new(
            "The printer is busy or didn't respond.",
            "Wait a moment, then try again.",
            true,
            Severity::Transient,
        ),
        PrintOutcome::PrinterTurnedOff => HumanError::new(
            "The printer is switched off.",
            "Switch the printer on and try again.",
            false,
            Severity::ActionRequired,
        ),
        PrintOutcome::SetLabelSizeError | PrintOutcome::PrintSettingsError => HumanError::new(
            "The label size doesn't match the printer.",
            "Pick the label size that is loaded in the printer.",
            false,
            Severity::ActionRequired,
        ),
        PrintOutcome::FilePathError | PrintOutcome::UnsupportedFile => HumanError::new(
            "The printer can't use this image.",
            "Save the label as a PNG or JPEG and try again.",
            false,
            Severity::Permanent,
        ),
        PrintOutcome::Canceled => HumanError::new(
            "The print was cancelled.",
            "Print again if you still need the label.",
            true,
            Severity::Transient,
        ),
        PrintOutcome::SystemError | PrintOutcome::UnknownError => HumanError::new(
            "The printer reported an internal error.",
            "Switch the printer off, wait ten seconds, and switch it back on.",
            true,
            Severity::Transient,
        ),
    }
}
