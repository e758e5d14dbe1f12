// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mDNS-backed printer search.
//
// Label printers advertise their raw data port as `_pdl-datastream._tcp.local.`
// and usually an LPD queue as `_printer._tcp.local.`. We browse both with the
// `mdns-sd` crate for the requested duration and report each resolved service
// once through the caller's callback.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tracing::{debug, info, trace, warn};

use crate::driver::{ChannelInfo, PrinterSearcher, SearchError};

/// mDNS service type for raw (JetDirect-style) print data.
const PDL_SERVICE: &str = "_pdl-datastream._tcp.local.";

/// mDNS service type for LPD print queues.
const LPD_SERVICE: &str = "_printer._tcp.local.";

/// Printer search over multicast DNS.
#[derive(Debug, Clone)]
pub struct MdnsSearcher {
    service_types: Vec<&'static str>,
}

impl Default for MdnsSearcher {
    fn default() -> Self {
        Self {
            service_types: vec![PDL_SERVICE, LPD_SERVICE],
        }
    }
}

impl MdnsSearcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrinterSearcher for MdnsSearcher {
    fn search(
        &self,
        timeout: Duration,
        on_found: &(dyn Fn(ChannelInfo) + Send + Sync),
    ) -> Result<(), SearchError> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| SearchError::NetworkUnavailable(format!("failed to start mDNS daemon: {e}")))?;

        let mut receivers = Vec::with_capacity(self.service_types.len());
        for service_type in &self.service_types {
            let receiver = daemon
                .browse(service_type)
                .map_err(|e| SearchError::SearchFailed(format!("browse {service_type}: {e}")))?;
            receivers.push((*service_type, receiver));
        }

        info!(timeout_secs = timeout.as_secs(), "mDNS printer search started");
        let deadline = Instant::now() + timeout;
        let seen = Mutex::new(HashSet::new());

        // One listener per service type; all of them feed `on_found`.
        thread::scope(|scope| {
            for (service_type, receiver) in receivers {
                let seen = &seen;
                scope.spawn(move || {
                    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
                        let event = match receiver.recv_timeout(remaining) {
                            Ok(event) => event,
                            Err(_) => break,
                        };
                        match event {
                            ServiceEvent::ServiceResolved(info) => {
                                let fullname = info.get_fullname().to_owned();
                                let first_time = seen
                                    .lock()
                                    .map(|mut names| names.insert(fullname.clone()))
                                    .unwrap_or(false);
                                if !first_time {
                                    continue;
                                }
                                match service_info_to_channel(&info) {
                                    Some(channel) => {
                                        info!(
                                            address = %channel.address,
                                            model = channel.model_name.as_deref().unwrap_or("unknown"),
                                            "printer found"
                                        );
                                        on_found(channel);
                                    }
                                    None => {
                                        warn!(fullname = %fullname, "resolved service has no address");
                                    }
                                }
                            }
                            ServiceEvent::SearchStopped(stype) => {
                                debug!(service_type = %stype, "mDNS search stopped");
                                break;
                            }
                            other => trace!(service_type, event = ?other, "mDNS event"),
                        }
                    }
                });
            }
        });

        for service_type in &self.service_types {
            if let Err(e) = daemon.stop_browse(service_type) {
                debug!(service_type, error = %e, "stop browse");
            }
        }
        if let Err(e) = daemon.shutdown() {
            debug!(error = %e, "mDNS daemon shutdown");
        }
        info!("mDNS printer search finished");
        Ok(())
    }
}

/// Convert a resolved service into the driver-level printer identity.
///
/// TXT keys consulted for the model, in order:
///   - `ty`      — e.g. "Brother QL-820NWB"
///   - `product` — e.g. "(QL-820NWB)"
fn service_info_to_channel(info: &ServiceInfo) -> Option<ChannelInfo> {
    // Prefer IPv4 for wider printer compatibility.
    let ip: IpAddr = info
        .get_addresses()
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| info.get_addresses().iter().next())
        .copied()?;

    let model_name = info
        .get_property_val_str("ty")
        .or_else(|| info.get_property_val_str("product"))
        .and_then(clean_model_name);

    Some(ChannelInfo {
        address: ip.to_string(),
        model_name,
        serial_number: info.get_property_val_str("serial").map(String::from),
    })
}

/// Strip the parentheses some printers wrap their product string in.
fn clean_model_name(raw: &str) -> Option<String> {
    let name = raw.trim().trim_start_matches('(').trim_end_matches(')').trim();
    (!name.is_empty()).then(|| name.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_lose_parentheses() {
        assert_eq!(clean_model_name("(QL-820NWB)").as_deref(), Some("QL-820NWB"));
        assert_eq!(
            clean_model_name("Brother QL-1110NWB").as_deref(),
            Some("Brother QL-1110NWB")
        );
        assert_eq!(clean_model_name(" () "), None);
    }

    #[test]
    fn default_browses_raw_and_lpd() {
        let searcher = MdnsSearcher::new();
        assert_eq!(searcher.service_types, vec![PDL_SERVICE, LPD_SERVICE]);
    }
}
