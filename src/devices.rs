//! Peripherals: thin adapters that talk to their controller through a hub.
//!
//! A peripheral registers with its hub under its label on
//! `initialize` and unregisters on `shutdown`.

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use snafu::ensure;

use crate::asi::AsiHub;
use crate::build::FirmwareBuild;
use crate::error::{Result, WheelPositionSnafu};
use crate::prior::PriorHub;
use crate::transport::Transport;

/// Wheels report their size with `FPW`; this is assumed until then.
pub const DEFAULT_WHEEL_POSITIONS: i64 = 6;

/// Status bit of the first filter wheel. Wheel `n` uses this shifted by `n - 1`.
const WHEEL_BUSY_BIT: i64 = 0x10;
/// Status bits set while the X or Y axis moves.
const XY_BUSY_BITS: i64 = 0x03;

/// A Prior filter wheel, numbered 1 to 3 on the controller.
///
/// Positions are 0-based here and 1-based on the wire.
#[derive(Debug)]
pub struct PriorWheel<T> {
    hub: Arc<PriorHub<T>>,
    label: String,
    id: i32,
    positions: i64,
}

impl<T: Transport> PriorWheel<T> {
    pub fn new(hub: Arc<PriorHub<T>>, label: impl Into<String>, id: i32) -> Self {
        Self {
            hub,
            label: label.into(),
            id,
            positions: DEFAULT_WHEEL_POSITIONS,
        }
    }

    /// Read the number of positions and register with the hub.
    pub fn initialize(&mut self) -> Result<()> {
        self.positions = self.query_number_of_positions()?;
        self.hub.register_peripheral(&self.label, self.id);
        Ok(())
    }

    pub fn shutdown(&self) {
        self.hub.unregister_peripheral(&self.label);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn number_of_positions(&self) -> i64 {
        self.positions
    }

    pub fn query_number_of_positions(&self) -> Result<i64> {
        self.hub.query_numeric(&format!("FPW {}", self.id))
    }

    pub fn position(&self) -> Result<i64> {
        let position: i64 = self.hub.query_numeric(&format!("7,{},F", self.id))?;
        Ok(position - 1)
    }

    pub fn set_position(&self, position: i64) -> Result<()> {
        ensure!(
            (0..self.positions).contains(&position),
            WheelPositionSnafu {
                position,
                positions: self.positions,
            }
        );
        self.hub
            .expect_no_error(&format!("7,{},{}", self.id, position + 1))?;
        Ok(())
    }

    pub fn busy(&self) -> Result<bool> {
        let status = self.hub.status()?;
        Ok(status & (WHEEL_BUSY_BIT << (self.id - 1).max(0)) != 0)
    }
}

/// A Prior shutter, numbered 1 to 3 on the controller.
#[derive(Debug)]
pub struct PriorShutter<T> {
    hub: Arc<PriorHub<T>>,
    label: String,
    id: i32,
}

impl<T: Transport> PriorShutter<T> {
    pub fn new(hub: Arc<PriorHub<T>>, label: impl Into<String>, id: i32) -> Self {
        Self {
            hub,
            label: label.into(),
            id,
        }
    }

    pub fn initialize(&self) {
        self.hub.register_peripheral(&self.label, self.id);
    }

    pub fn shutdown(&self) {
        self.hub.unregister_peripheral(&self.label);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    // On the wire 0 is open and 1 closed.
    pub fn set_open(&self, open: bool) -> Result<()> {
        let state = if open { 0 } else { 1 };
        self.hub
            .expect_success(&format!("8,{},{}", self.id, state))
    }

    pub fn is_open(&self) -> Result<bool> {
        let state: i64 = self.hub.query_numeric(&format!("8,{}", self.id))?;
        Ok(state == 0)
    }

    /// Open for `exposure`, then close.
    pub fn fire(&self, exposure: Duration) -> Result<()> {
        self.set_open(true)?;
        sleep(exposure);
        self.set_open(false)
    }
}

/// The XY stage of a Prior controller. Positions are in steps.
#[derive(Debug)]
pub struct PriorXYStage<T> {
    hub: Arc<PriorHub<T>>,
    label: String,
}

impl<T: Transport> PriorXYStage<T> {
    pub fn new(hub: Arc<PriorHub<T>>, label: impl Into<String>) -> Self {
        Self {
            hub,
            label: label.into(),
        }
    }

    pub fn initialize(&self) {
        self.hub.register_peripheral(&self.label, 0);
    }

    pub fn shutdown(&self) {
        self.hub.unregister_peripheral(&self.label);
    }

    /// The X and Y position, read with one command each.
    pub fn position_steps(&self) -> Result<(i64, i64)> {
        let x = self.hub.query_numeric("PX")?;
        let y = self.hub.query_numeric("PY")?;
        Ok((x, y))
    }

    pub fn set_position_steps(&self, x: i64, y: i64) -> Result<()> {
        self.hub.expect_success(&format!("G,{},{}", x, y))
    }

    pub fn set_relative_position_steps(&self, dx: i64, dy: i64) -> Result<()> {
        self.hub.expect_success(&format!("GR,{},{}", dx, dy))
    }

    pub fn home(&self) -> Result<()> {
        self.hub.expect_success("SIS")
    }

    pub fn stop(&self) -> Result<()> {
        self.hub.expect_success("K")
    }

    /// Make the current position the origin.
    pub fn set_origin(&self) -> Result<()> {
        self.hub.expect_success("PS,0,0")
    }

    /// Microns per step for X and Y.
    pub fn resolution(&self) -> Result<(f64, f64)> {
        let x = self.hub.query_numeric("RES,X")?;
        let y = self.hub.query_numeric("RES,Y")?;
        Ok((x, y))
    }

    pub fn busy(&self) -> Result<bool> {
        Ok(self.hub.status()? & XY_BUSY_BITS != 0)
    }
}

/// One axis of an ASI Tiger controller.
///
/// Positions are in controller units, tenths of a micron for linear axes.
#[derive(Debug)]
pub struct AsiAxis<T> {
    hub: Arc<AsiHub<T>>,
    label: String,
    address: String,
    axis: char,
}

impl<T: Transport> AsiAxis<T> {
    /// An axis `axis` on the card at `address`, both as listed in the comm
    /// card's build report.
    pub fn new(hub: Arc<AsiHub<T>>, label: impl Into<String>, address: &str, axis: char) -> Self {
        Self {
            hub,
            label: label.into(),
            address: address.into(),
            axis: axis.to_ascii_uppercase(),
        }
    }

    pub fn initialize(&self) {
        self.hub.register_peripheral(&self.label, &self.address);
    }

    pub fn shutdown(&self) {
        self.hub.unregister_peripheral(&self.label);
    }

    pub fn axis(&self) -> char {
        self.axis
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn position(&self) -> Result<f64> {
        let reply = self.hub.query_verify(&format!("W {}", self.axis), ":A")?;
        Ok(reply.after_position3()?)
    }

    pub fn move_to(&self, position: f64) -> Result<()> {
        self.hub
            .query_verify(&format!("M {}={}", self.axis, position), ":A")?;
        Ok(())
    }

    /// The build report of the card this axis is on.
    pub fn firmware_build(&self) -> Result<FirmwareBuild> {
        self.hub.build_info(&self.address)
    }

    /// Apply a card-wide setting to every axis on this card, see
    /// [`AsiHub::update_shared_properties`].
    pub fn update_shared<F>(&self, set: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        self.hub.update_shared_properties(&self.address, set)
    }
}
