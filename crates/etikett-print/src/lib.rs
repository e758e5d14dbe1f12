// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Etikett Print — deadline-bounded job runner, printer channel drivers,
// mDNS printer search, and image locator resolution.  This crate bridges
// between the core domain types defined in `etikett-core` and the device.

pub mod discovery;
pub mod driver;
pub mod printer;
pub mod raw_channel;
pub mod resolver;
pub mod runner;
pub mod status;

pub use discovery::MdnsSearcher;
pub use driver::{ChannelProvider, PrinterChannel, PrinterSearcher};
pub use printer::LabelPrinter;
pub use raw_channel::RawChannelProvider;
pub use resolver::{DirectoryContentSource, ImageResolver};
pub use runner::run_bounded;
