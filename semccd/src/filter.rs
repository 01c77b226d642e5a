//! Energy filter control through bound script functions.
//!
//! When a capability did not resolve on this peer the call returns a
//! sentinel without touching the socket: `-1.0` (or `-1`) for slit
//! operations and setters, `0.0` for the energy offset reading.

use tracing::warn;

use crate::capability::FilterCapability;
use crate::client::Client;
use crate::error::Result;

/// Sentinel for unavailable float-valued operations.
const UNAVAILABLE: f64 = -1.0;

/// Sentinel for unavailable status-valued operations.
const UNAVAILABLE_STATUS: i32 = -1;

/// Energy shift technique applied by [`Client::set_energy_filter_offset`].
const DRIFT_TUBE: i32 = 3;

/// High-tension offset technique, reset when a drift tube shift misreads.
const HT_OFFSET: i32 = 2;

/// Read-back tolerance for offsets sent with six decimals.
const OFFSET_TOLERANCE: f64 = 1e-6;

impl Client {
    /// Function bound to `capability`, if any.
    fn bound(&self, capability: FilterCapability) -> Option<&'static str> {
        self.bindings.get(capability)
    }

    /// `1.0` if the slit is in, `-1.0` if out or unavailable.
    pub fn energy_filter(&mut self) -> Result<f64> {
        let Some(f) = self.bound(FilterCapability::SlitState) else {
            return Ok(UNAVAILABLE);
        };
        self.execute_double(&format!("if ( {f}() ) {{ Exit(1.0); }} else {{ Exit(-1.0); }}"), false)
    }

    /// Moves the slit in or out; returns the script status or `-1`.
    pub fn set_energy_filter(&mut self, inserted: bool) -> Result<i32> {
        let Some(f) = self.bound(FilterCapability::SetSlitState) else {
            return Ok(UNAVAILABLE_STATUS);
        };
        let wait = self.bindings.wait_suffix();
        self.execute_send(&format!("{f}({}); {wait}", i32::from(inserted)), false)
    }

    /// Slit width in eV, or `-1.0`.
    pub fn energy_filter_width(&mut self) -> Result<f64> {
        self.exit_value(FilterCapability::SlitWidth, UNAVAILABLE)
    }

    /// Widest slit in eV, or `-1.0`.
    pub fn energy_filter_width_max(&mut self) -> Result<f64> {
        self.exit_value(FilterCapability::MaxSlitWidth, UNAVAILABLE)
    }

    /// Sets the slit width; returns the script status or `-1`.
    pub fn set_energy_filter_width(&mut self, width: f64) -> Result<i32> {
        let Some(f) = self.bound(FilterCapability::SetSlitWidth) else {
            return Ok(UNAVAILABLE_STATUS);
        };
        self.execute_send(
            &format!("if ( {f}({width:.6}) ) {{ Exit(1.0); }} else {{ Exit(-1.0); }}"),
            false,
        )
    }

    /// Energy offset in eV, or `0.0`.
    pub fn energy_filter_offset(&mut self) -> Result<f64> {
        self.exit_value(FilterCapability::EnergyOffset, 0.0)
    }

    /// Shifts the energy with the drift tube and verifies by reading back.
    ///
    /// If the reading disagrees, the high-tension offset (which some
    /// filters pick up spuriously) is zeroed and the reading retried.
    /// Returns `1.0` once verified, otherwise `-1.0`.
    pub fn set_energy_filter_offset(&mut self, offset: f64) -> Result<f64> {
        let Some(f) = self.bound(FilterCapability::SetEnergyOffset) else {
            return Ok(UNAVAILABLE);
        };
        self.execute_send(&format!("{f}({DRIFT_TUBE},{offset:.6})"), false)?;
        if (self.energy_filter_offset()? - offset).abs() < OFFSET_TOLERANCE {
            return Ok(1.0);
        }

        warn!(offset, "energy offset not applied, clearing high-tension offset");
        self.execute_send(&format!("{f}({HT_OFFSET},{:.6})", 0.0), false)?;
        if (self.energy_filter_offset()? - offset).abs() < OFFSET_TOLERANCE {
            Ok(1.0)
        } else {
            Ok(UNAVAILABLE)
        }
    }

    /// Centers the zero-loss peak; `1.0` on success, otherwise `-1.0`.
    pub fn align_zero_loss_peak(&mut self) -> Result<f64> {
        let Some(f) = self.bound(FilterCapability::AlignZeroLoss) else {
            return Ok(UNAVAILABLE);
        };
        let wait = self.bindings.wait_suffix();
        self.execute_double(
            &format!(" if ( {f}() ) {{ {wait} Exit(1.0); }} else {{ Exit(-1.0); }}"),
            false,
        )
    }

    /// Runs `Exit(f())` for the function bound to `capability`.
    fn exit_value(&mut self, capability: FilterCapability, sentinel: f64) -> Result<f64> {
        match self.bound(capability) {
            Some(f) => self.execute_double(&format!("Exit({f}())"), false),
            None => Ok(sentinel),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::testing::Peer;

    /// Peer exposing `present` functions and logging every other script.
    fn filter_peer(
        present: &'static [&'static str],
        mut answer: impl FnMut(&str) -> f64 + Send + 'static,
    ) -> (Peer, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&log);
        let peer = Peer::spawn(move |conn| {
            conn.serve_scripts(|script| {
                if script.contains("DoesFunctionExist") {
                    let hit = present.iter().any(|n| script.contains(&format!("\"{n}\"")));
                    return if hit { 1.0 } else { -1.0 };
                }
                seen.lock().unwrap().push(script.to_owned());
                answer(script)
            });
        });
        (peer, log)
    }

    #[test]
    fn unresolved_capabilities_return_sentinels() {
        let (peer, log) = filter_peer(&[], |_| unreachable!());
        let mut client = Client::connect(&peer.config().with_filter_probing(true)).unwrap();

        assert_eq!(client.energy_filter().unwrap(), -1.0);
        assert_eq!(client.set_energy_filter(true).unwrap(), -1);
        assert_eq!(client.energy_filter_width().unwrap(), -1.0);
        assert_eq!(client.energy_filter_width_max().unwrap(), -1.0);
        assert_eq!(client.set_energy_filter_width(10.0).unwrap(), -1);
        assert_eq!(client.energy_filter_offset().unwrap(), 0.0);
        assert_eq!(client.set_energy_filter_offset(5.0).unwrap(), -1.0);
        assert_eq!(client.align_zero_loss_peak().unwrap(), -1.0);
        drop(client);
        peer.join();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn slit_scripts_wait_for_async_setter() {
        let (peer, log) = filter_peer(&["IFGetSlitIn", "IFSetSlitIn", "IFSetSlitWidth"], |_| 1.0);
        let mut client = Client::connect(&peer.config().with_filter_probing(true)).unwrap();

        assert_eq!(client.energy_filter().unwrap(), 1.0);
        client.set_energy_filter(true).unwrap();
        client.set_energy_filter_width(20.0).unwrap();
        drop(client);
        peer.join();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "if ( IFGetSlitIn() ) { Exit(1.0); } else { Exit(-1.0); }".to_owned(),
                "IFSetSlitIn(1); IFWaitForFilter();".to_owned(),
                "if ( IFSetSlitWidth(20.000000) ) { Exit(1.0); } else { Exit(-1.0); }".to_owned(),
            ]
        );
    }

    #[test]
    fn offset_retries_after_clearing_ht_offset() {
        let mut reads = 0;
        let (peer, log) = filter_peer(&["IFGetEnergyLoss", "IFSetEnergyOffset"], move |script| {
            if script.starts_with("Exit(IFGetEnergyLoss") {
                reads += 1;
                // first reading includes a stray HT offset
                if reads == 1 { 7.5 } else { 2.5 }
            } else {
                0.0
            }
        });
        let mut client = Client::connect(&peer.config().with_filter_probing(true)).unwrap();

        assert_eq!(client.set_energy_filter_offset(2.5).unwrap(), 1.0);
        drop(client);
        peer.join();

        let log = log.lock().unwrap();
        assert_eq!(log[0], "IFSetEnergyOffset(3,2.500000)");
        assert_eq!(log[2], "IFSetEnergyOffset(2,0.000000)");
        assert_eq!(log.len(), 4);
    }
}
