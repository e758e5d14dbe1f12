// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// 32-byte printer status block.
//
// QL-series printers (and the bundled simulator) send this block when a raw
// connection opens. Only the two error-information bytes are interpreted;
// everything else is passed over.

use etikett_core::types::PrintOutcome;

/// Length of a status block.
pub const STATUS_LEN: usize = 32;

const HEAD_MARK: u8 = 0x80;
const ERROR_INFO_1: usize = 8;
const ERROR_INFO_2: usize = 9;
const MEDIA_WIDTH: usize = 10;

/// Build a "ready, no error" block as sent by a QL-820NWB with 62 mm die-cut
/// media loaded.
pub fn ready_block() -> [u8; STATUS_LEN] {
    let mut block = [0u8; STATUS_LEN];
    block[0] = HEAD_MARK;
    block[1] = STATUS_LEN as u8;
    block[2] = b'B';
    block[3] = b'0';
    block[4] = b'O';
    block[MEDIA_WIDTH] = 62;
    block[11] = 0x0A;
    block
}

/// Whether `block` looks like a status block at all.
pub fn is_status_block(block: &[u8]) -> bool {
    block.len() == STATUS_LEN && block[0] == HEAD_MARK && block[1] as usize == STATUS_LEN
}

/// Map the error bits of a status block to an outcome.
///
/// Returns `None` for blocks that are not status blocks.
pub fn decode(block: &[u8]) -> Option<PrintOutcome> {
    if !is_status_block(block) {
        return None;
    }
    let e1 = block[ERROR_INFO_1];
    let e2 = block[ERROR_INFO_2];

    let outcome = if e1 & 0x03 != 0 {
        PrintOutcome::PaperEmpty
    } else if e1 & 0x04 != 0 {
        PrintOutcome::PaperJam
    } else if e1 & 0x10 != 0 {
        PrintOutcome::Busy
    } else if e1 & 0x20 != 0 {
        PrintOutcome::PrinterTurnedOff
    } else if e1 & 0x40 != 0 {
        PrintOutcome::HighVoltageAdapter
    } else if e2 & 0x01 != 0 {
        PrintOutcome::SetLabelSizeError
    } else if e2 & 0x02 != 0 {
        PrintOutcome::ExpansionBufferFull
    } else if e2 & 0x0C != 0 {
        PrintOutcome::CommunicationError
    } else if e2 & 0x10 != 0 {
        PrintOutcome::CoverOpen
    } else if e2 & 0x20 != 0 {
        PrintOutcome::OverHeat
    } else if e2 & 0x40 != 0 {
        PrintOutcome::MediaCannotBeFed
    } else if e1 & 0x80 != 0 || e2 & 0x80 != 0 {
        PrintOutcome::SystemError
    } else {
        PrintOutcome::NoError
    };
    Some(outcome)
}

/// Loaded media width in millimetres, if reported.
pub fn media_width_mm(block: &[u8]) -> Option<u8> {
    is_status_block(block)
        .then(|| block[MEDIA_WIDTH])
        .filter(|w| *w > 0)
}
