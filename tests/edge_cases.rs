//! Edge case and boundary condition tests for framing and the slot table

use loconet_bridge::{
    hal::{MockThrottleService, MockTransport, RecordingSink},
    opcode::{
        OPC_LOCO_ADR, OPC_LOCO_SPD, OPC_LONG_ACK, OPC_MOVE_SLOTS, OPC_RQ_SL_DATA,
        OPC_SLOT_STAT1, OPC_SL_RD_DATA, OPC_VENDOR_D4,
    },
    slot::MAX_ADDRESS,
    slot_manager::SLOT_COUNT,
    writer::{build, checksum},
    EngineConfig, Error, ProtocolEngine, SlotState,
};

type Engine = ProtocolEngine<MockTransport, MockThrottleService, RecordingSink>;

fn engine_with(service: MockThrottleService) -> Engine {
    ProtocolEngine::new(
        MockTransport::new().with_auto_complete(),
        service,
        RecordingSink::new(),
        &EngineConfig::default(),
    )
}

fn engine() -> Engine {
    engine_with(MockThrottleService::new())
}

fn bytes(opcode: u8, payload: &[u8]) -> Vec<u8> {
    build(opcode, payload).unwrap().as_bytes().to_vec()
}

// ============================================================================
// Framing
// ============================================================================

#[test]
fn checksum_error_abandons_rest_of_block() {
    let mut e = engine();
    let mut corrupt = bytes(OPC_RQ_SL_DATA, &[4, 0]);
    corrupt[3] ^= 0x01;

    let mut block = bytes(OPC_LOCO_ADR, &[0x00, 0x03]);
    block.extend_from_slice(&corrupt);
    block.extend_from_slice(&bytes(OPC_RQ_SL_DATA, &[5, 0]));
    e.transport_mut().push_incoming(&block);
    e.update(0).unwrap();

    assert_eq!(e.transport().sent.len(), 1);
    assert_eq!(e.stats().messages_received, 1);
    assert_eq!(e.stats().checksum_errors, 1);

    // The next block is framed normally
    e.transport_mut().push_incoming(&bytes(OPC_RQ_SL_DATA, &[5, 0]));
    e.update(1).unwrap();
    assert_eq!(e.transport().sent.len(), 2);
}

#[test]
fn leading_noise_is_skipped() {
    let mut e = engine();
    let mut block = vec![0x00, 0x12, 0x7F];
    block.extend_from_slice(&bytes(OPC_LOCO_ADR, &[0x00, 0x03]));
    e.transport_mut().push_incoming(&block);
    e.update(0).unwrap();

    assert_eq!(e.stats().framing_errors, 1);
    assert_eq!(e.stats().messages_received, 1);
    assert_eq!(e.slot(1).unwrap().address, 3);
}

#[test]
fn truncated_tail_waits_for_rest() {
    let mut e = engine();
    let full = bytes(OPC_LOCO_ADR, &[0x00, 0x03]);
    e.transport_mut().push_incoming(&full[..2]);
    e.update(0).unwrap();

    assert_eq!(e.stats().framing_errors, 0);
    assert_eq!(e.stats().messages_received, 0);
    assert_eq!(e.slot(1).unwrap().state, SlotState::Free);
    assert!(e.transport().sent.is_empty());

    e.transport_mut().push_incoming(&full[2..]);
    e.update(1).unwrap();
    assert_eq!(e.stats().messages_received, 1);
    assert_eq!(e.slot(1).unwrap().address, 3);
}

#[test]
fn explicit_length_below_minimum_is_rejected() {
    let mut e = engine();
    let mut block = vec![OPC_SL_RD_DATA, 0x02, 0x00];
    block.extend_from_slice(&bytes(OPC_LOCO_ADR, &[0x00, 0x03]));
    e.transport_mut().push_incoming(&block);
    e.update(0).unwrap();

    assert_eq!(e.stats().framing_errors, 1);
    assert_eq!(e.stats().messages_received, 0);
}

#[test]
fn vendor_opcodes_are_ignored() {
    let mut e = engine();
    // Not buildable outbound, so framed by hand
    let mut message = vec![OPC_VENDOR_D4, 0x20, 0x01, 0x00, 0x00];
    message.push(checksum(&message));
    e.transport_mut().push_incoming(&message);
    e.update(0).unwrap();

    assert_eq!(e.stats().messages_received, 1);
    assert_eq!(e.stats().unhandled_opcodes, 0);
    assert!(e.transport().sent.is_empty());
}

// ============================================================================
// Slot Boundaries
// ============================================================================

#[test]
fn dispatch_slot_is_never_handed_out() {
    let mut e = engine();
    for request in [
        bytes(OPC_SLOT_STAT1, &[0, 0x03]),
        bytes(OPC_MOVE_SLOTS, &[0, 0]),
        bytes(OPC_LOCO_SPD, &[0, 40]),
    ] {
        e.transport_mut().push_incoming(&request);
    }
    e.update(0).unwrap();

    let dispatch = e.slot(0).unwrap();
    assert_eq!(dispatch.state, SlotState::InUse);
    assert_eq!(dispatch.speed, 0);
    // Speed on the dispatch slot is logged only
    assert_eq!(e.stats().naks_sent, 2);
    assert!(e.transport().sent.iter().all(|m| m[0] == OPC_LONG_ACK));
}

#[test]
fn highest_slot_is_usable() {
    let mut e = engine();
    for address in 0..(SLOT_COUNT as u16 - 1) {
        e.slots_mut().acquire_locomotive(address + 100, 0).unwrap();
    }
    assert_eq!(e.slots().count(SlotState::Free), 0);
    assert_eq!(e.slot(127).unwrap().address, 226);
    assert_eq!(
        e.slots_mut().acquire_locomotive(5000, 0),
        Err(Error::NoFreeSlot { address: 5000 })
    );
}

#[test]
fn maximum_address() {
    let mut e = engine();
    e.transport_mut()
        .push_incoming(&bytes(OPC_LOCO_ADR, &[0x7F, 0x7F]));
    e.update(0).unwrap();

    assert_eq!(e.slot(1).unwrap().address, MAX_ADDRESS);
    let reply = &e.transport().sent[0];
    assert_eq!(reply[4], 0x7F);
    assert_eq!(reply[9], 0x7F);
}

#[test]
fn slot_index_out_of_table() {
    let mut e = engine();
    assert_eq!(
        e.slots_mut().set_locomotive_speed(200, 10, 0),
        Err(Error::SlotOutOfRange { index: 200 })
    );
    assert!(e.slot(200).is_none());
}

#[test]
fn highest_slot_moves_to_free() {
    let mut e = engine();
    for address in 0..(SLOT_COUNT as u16 - 1) {
        e.slots_mut().acquire_locomotive(address + 100, 0).unwrap();
    }
    e.transport_mut()
        .push_incoming(&bytes(OPC_MOVE_SLOTS, &[127, 0]));
    e.update(0).unwrap();

    assert_eq!(e.slot(127).unwrap().state, SlotState::Free);
    assert_eq!(e.stats().naks_sent, 0);
    assert_eq!(e.sink().indices(), vec![127]);
}

#[test]
fn forcing_free_slots_to_common_shares_reset_address() {
    let mut e = engine();
    e.transport_mut()
        .push_incoming(&bytes(OPC_SLOT_STAT1, &[5, 0x13]));
    e.transport_mut()
        .push_incoming(&bytes(OPC_SLOT_STAT1, &[6, 0x13]));
    e.update(0).unwrap();

    // Slot 5 now holds address 0, so slot 6 cannot take it too
    assert_eq!(e.slot(5).unwrap().state, SlotState::Common);
    assert_eq!(e.slot(5).unwrap().address, 0);
    assert_eq!(e.slot(6).unwrap().state, SlotState::Free);
    assert_eq!(e.transport().sent.len(), 1);
    assert_eq!(e.transport().sent[0][..3], [OPC_LONG_ACK, 0x35, 0x00]);

    // Address 0 resolves to the forced slot
    e.transport_mut()
        .push_incoming(&bytes(OPC_LOCO_ADR, &[0x00, 0x00]));
    e.update(1).unwrap();
    let reply = e.transport().sent.last().unwrap();
    assert_eq!(reply[0], OPC_SL_RD_DATA);
    assert_eq!(reply[2], 5);
}

#[test]
fn function_writes_past_f31_are_rejected() {
    let mut e = engine();
    let slot = e.slots_mut().acquire_locomotive(3, 0).unwrap();
    assert_eq!(
        e.slots_mut().set_functions(slot, &[true; 4], 30, 0),
        Err(Error::FunctionRange { offset: 30, len: 4 })
    );
    assert_eq!(e.slot(slot).unwrap().functions, 0);

    e.slots_mut().set_functions(slot, &[true; 2], 30, 0).unwrap();
    assert!(e.slot(slot).unwrap().function(31));
}

#[test]
fn refused_throttle_still_claims_slot() {
    let mut e = engine_with(MockThrottleService::new().refusing());
    e.transport_mut()
        .push_incoming(&bytes(OPC_LOCO_ADR, &[0x00, 0x03]));
    e.transport_mut()
        .push_incoming(&bytes(OPC_MOVE_SLOTS, &[1, 1]));
    e.transport_mut()
        .push_incoming(&bytes(OPC_LOCO_SPD, &[1, 30]));
    e.update(0).unwrap();

    assert_eq!(e.slot(1).unwrap().state, SlotState::InUse);
    assert_eq!(e.slot(1).unwrap().speed, 30);
    assert!(e.slots().slot(1).unwrap().throttle().is_none());
}

#[test]
fn repeated_null_move_keeps_throttle() {
    let mut e = engine();
    for request in [
        bytes(OPC_LOCO_ADR, &[0x00, 0x03]),
        bytes(OPC_MOVE_SLOTS, &[1, 1]),
        bytes(OPC_MOVE_SLOTS, &[1, 1]),
    ] {
        e.transport_mut().push_incoming(&request);
    }
    e.update(0).unwrap();

    assert_eq!(e.slots().service().created, 1);
    assert_eq!(e.slots().service().live_count(), 1);
}
