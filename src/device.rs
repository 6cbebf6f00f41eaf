//! Addressed device role.
//!
//! Only the byte handshake is usable in device role. How a device should
//! configure its lines for each [`NodeState`] has not been settled yet, so
//! bringing one up or changing its state reports
//! [`Error::UnsupportedRole`](crate::Error::UnsupportedRole).

use log::debug;

use crate::bus::{Clock, Gpio};
use crate::node::{Node, NodeState};
use crate::{Error, UnsupportedRoleSnafu};

impl<G: Gpio, C: Clock> Node<G, C> {
    pub(crate) fn device_init(&mut self) -> Result<(), Error> {
        debug!("device role has no init sequence");
        UnsupportedRoleSnafu.fail()
    }

    pub(crate) fn device_set_state(&mut self, state: NodeState) -> Result<(), Error> {
        debug!("device role cannot enter {:?}", state);
        UnsupportedRoleSnafu.fail()
    }
}
