//! Slot table with address acquisition and timeout-based reclamation.
//!
//! [`SlotManager`] owns all 128 slots and the [`ThrottleService`] that
//! throttles are requested from. Slot identity is the table index; slot 0
//! is the dispatch slot and is never handed to a locomotive.
//!
//! # Purge
//!
//! Throttles can vanish from the bus without releasing their slot. Every
//! operation on an IN_USE slot pushes its deadline to `now + purge_timeout`;
//! [`SlotManager::purge_slots`] drops IN_USE slots past their deadline back
//! to COMMON.
//!
//! # Example
//!
//! ```rust
//! use loconet_bridge::slot_manager::SlotManager;
//! use loconet_bridge::slot::{SlotState, SlotView};
//! use loconet_bridge::hal::MockThrottleService;
//!
//! let mut manager = SlotManager::new(MockThrottleService::new(), 1000);
//!
//! let slot = manager.acquire_locomotive(1234, 0).unwrap();
//! assert_eq!(slot, 1);
//! manager.set_slot_to_in_use(slot, 0).unwrap();
//!
//! let mut purged = Vec::new();
//! manager.purge_slots(1000, |index| purged.push(index));
//! assert_eq!(purged, vec![1]);
//! assert_eq!(manager.slot(1).unwrap().state(), SlotState::Common);
//! ```

use crate::error::{Error, Result};
use crate::opcode::OPC_SL_RD_DATA;
use crate::packing::{encode_dirf, encode_stat1, split_address, TRACK_STATUS};
use crate::slot::{Slot, SlotState, SlotView, MAX_ADDRESS};
use crate::traits::{SlotSnapshot, ThrottleService};
use crate::writer::{MessageWriter, OutboundMessage};

/// Number of slots on the bus.
pub const SLOT_COUNT: usize = 128;

/// Index of the reserved dispatch slot.
pub const DISPATCH_SLOT: u8 = 0;

/// Fixed-size slot table.
pub struct SlotManager<S: ThrottleService> {
    slots: [Slot; SLOT_COUNT],
    timeouts: [u64; SLOT_COUNT],
    purge_timeout_ms: u64,
    service: S,
}

impl<S: ThrottleService> SlotManager<S> {
    /// Creates a table with slot 0 reserved and slots 1..=127 FREE.
    pub fn new(service: S, purge_timeout_ms: u64) -> Self {
        Self {
            slots: core::array::from_fn(|i| {
                if i == DISPATCH_SLOT as usize {
                    Slot::dispatch()
                } else {
                    Slot::new(i as u8)
                }
            }),
            timeouts: [0; SLOT_COUNT],
            purge_timeout_ms,
            service,
        }
    }

    /// Shared access to the throttle service.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Mutable access to the throttle service.
    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    /// Slot at `index`, if in the table.
    pub fn slot(&self, index: u8) -> Option<&Slot> {
        self.slots.get(index as usize)
    }

    /// Snapshot of slot `index`.
    pub fn snapshot(&self, index: u8) -> Result<SlotSnapshot> {
        self.slot(index)
            .map(Slot::snapshot)
            .ok_or(Error::SlotOutOfRange {
                index: index as usize,
            })
    }

    /// Purge deadline of slot `index`.
    pub fn timeout(&self, index: u8) -> Option<u64> {
        self.timeouts.get(index as usize).copied()
    }

    /// Number of slots in `state`, dispatch slot excluded.
    pub fn count(&self, state: SlotState) -> usize {
        self.slots[1..].iter().filter(|s| s.state() == state).count()
    }

    /// Checks that `index` names a slot that can carry a locomotive.
    pub fn validate(index: u8) -> Result<usize> {
        let index = index as usize;
        if index >= SLOT_COUNT {
            Err(Error::SlotOutOfRange { index })
        } else if index == DISPATCH_SLOT as usize {
            Err(Error::ReservedSlot)
        } else {
            Ok(index)
        }
    }

    /// Returns the slot bound to `address`, binding the first FREE slot if
    /// none is.
    ///
    /// Calling this again for the same address returns the same slot until
    /// the slot is freed.
    pub fn acquire_locomotive(&mut self, address: u16, now: u64) -> Result<u8> {
        let address = address & MAX_ADDRESS;
        if let Some(index) = self.bound_slot(address) {
            tracing::debug!(address, slot = index, "address already bound");
            return Ok(index);
        }

        let index = (1..SLOT_COUNT)
            .find(|&i| self.slots[i].state() == SlotState::Free)
            .ok_or(Error::NoFreeSlot { address })?;

        self.slots[index].set_common(Some(address), &mut self.service);
        self.refresh(index, now);
        tracing::debug!(address, slot = index, "address bound to free slot");
        Ok(index as u8)
    }

    /// Moves slot `index` to IN_USE and restarts its purge timer.
    pub fn set_slot_to_in_use(&mut self, index: u8, now: u64) -> Result<()> {
        let i = Self::validate(index)?;
        self.check_binding(i)?;
        self.slots[i].set_in_use(&mut self.service);
        self.refresh(i, now);
        Ok(())
    }

    /// Moves slot `index` straight to FREE.
    pub fn set_slot_free(&mut self, index: u8) -> Result<()> {
        let i = Self::validate(index)?;
        self.slots[i].set_free(&mut self.service);
        Ok(())
    }

    /// Sets the speed of slot `index`; speed 1 is an emergency stop.
    pub fn set_locomotive_speed(&mut self, index: u8, speed: u8, now: u64) -> Result<()> {
        let i = Self::validate(index)?;
        self.slots[i].set_speed(speed, &mut self.service);
        self.refresh(i, now);
        Ok(())
    }

    /// Emergency-stops slot `index`.
    pub fn emergency_stop(&mut self, index: u8, now: u64) -> Result<()> {
        let i = Self::validate(index)?;
        self.slots[i].emergency_stop(&mut self.service);
        self.refresh(i, now);
        Ok(())
    }

    /// Sets the direction of slot `index`.
    pub fn set_forward(&mut self, index: u8, forward: bool, now: u64) -> Result<()> {
        let i = Self::validate(index)?;
        self.slots[i].set_forward(forward, &mut self.service);
        self.refresh(i, now);
        Ok(())
    }

    /// Writes `values` into functions starting at `offset` on slot `index`.
    pub fn set_functions(&mut self, index: u8, values: &[bool], offset: usize, now: u64) -> Result<()> {
        let i = Self::validate(index)?;
        self.slots[i].set_functions(offset, values, &mut self.service)?;
        self.refresh(i, now);
        Ok(())
    }

    /// Forces slot `index` into COMMON, FREE or IN_USE.
    ///
    /// IDLE is rejected with [`Error::UnsupportedState`].
    pub fn force_slot_state(&mut self, index: u8, state: SlotState, now: u64) -> Result<()> {
        let i = Self::validate(index)?;
        match state {
            SlotState::Common => {
                self.check_binding(i)?;
                self.slots[i].set_common(None, &mut self.service);
                self.refresh(i, now);
                Ok(())
            }
            SlotState::Free => self.set_slot_free(index),
            SlotState::InUse => self.set_slot_to_in_use(index, now),
            SlotState::Idle => {
                tracing::warn!(slot = index, state = state.as_str(), "unsupported forced slot state");
                Err(Error::UnsupportedState { state })
            }
        }
    }

    /// Builds the slot-read-data reply for slot `index`.
    ///
    /// Payload layout:
    ///
    /// ```text
    /// SLOT STAT1 ADR SPD DIRF TRK SS2 ADR2 SND ID1 ID2
    /// ```
    pub fn make_slot_read_data_message(&self, index: u8) -> Result<OutboundMessage> {
        let slot = self.slot(index).ok_or(Error::SlotOutOfRange {
            index: index as usize,
        })?;
        let (adr_high, adr_low) = split_address(slot.address());

        let mut writer = MessageWriter::new(OPC_SL_RD_DATA)?;
        writer.write_all(&[
            index,
            encode_stat1(slot.state()),
            adr_low,
            slot.speed(),
            encode_dirf(slot.forward(), slot.functions()),
            TRACK_STATUS,
            0,
            adr_high,
            0,
            0,
            0,
        ])?;
        writer.finalize()
    }

    /// Drops every IN_USE slot whose deadline is at or before `now` back to
    /// COMMON, calling `on_purged` once per slot. Returns the purge count.
    pub fn purge_slots<F: FnMut(u8)>(&mut self, now: u64, mut on_purged: F) -> usize {
        let mut purged = 0;
        for i in 1..SLOT_COUNT {
            if self.slots[i].state() != SlotState::InUse || self.timeouts[i] > now {
                continue;
            }
            tracing::info!(
                slot = i,
                address = self.slots[i].address(),
                deadline = self.timeouts[i],
                "purging idle slot"
            );
            self.slots[i].set_common(None, &mut self.service);
            on_purged(i as u8);
            purged += 1;
        }
        purged
    }

    fn refresh(&mut self, index: usize, now: u64) {
        self.timeouts[index] = now.saturating_add(self.purge_timeout_ms);
    }

    fn bound_slot(&self, address: u16) -> Option<u8> {
        (1..SLOT_COUNT)
            .find(|&i| {
                let slot = &self.slots[i];
                slot.state() != SlotState::Free && slot.address() == address
            })
            .map(|i| i as u8)
    }

    /// A FREE slot leaving FREE must not duplicate another slot's address.
    fn check_binding(&self, index: usize) -> Result<()> {
        let slot = &self.slots[index];
        if slot.state() != SlotState::Free {
            return Ok(());
        }
        match self.bound_slot(slot.address()) {
            Some(other) => Err(Error::AddressInUse {
                address: slot.address(),
                slot: other,
            }),
            None => Ok(()),
        }
    }
}
