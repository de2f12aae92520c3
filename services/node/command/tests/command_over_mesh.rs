//! A command travels base station -> mesh -> processor and the reply back.

use lss_command::{CommandProcessor, NodeCommand};
use lss_routing::{ManualClock, MeshRouter, RoutingDecision};
use lss_storage::{ConfigStore, MemoryConfigStore, NodeConfig};
use lss_wire::{detect, AckRecord, CommandRecord, PacketType, BROADCAST_ID, STATUS_OK};

#[test]
fn test_set_interval_round_trip_through_mesh() {
    let clock = ManualClock::new(0);
    let mut base = MeshRouter::new(0, true, clock.clone());
    let mut node = MeshRouter::new(5, true, clock.clone());
    let mut store = MemoryConfigStore::with_config(NodeConfig {
        node_id: 5,
        ..NodeConfig::default()
    });

    let command = NodeCommand::SetInterval(15_000).to_record(5, 21).unwrap();
    let frame = base.wrap_to_vec(5, &command.to_bytes().unwrap());

    let payload = match node.receive(&frame) {
        RoutingDecision::Deliver { payload, .. } => payload.to_vec(),
        other => panic!("command not delivered: {:?}", other),
    };
    assert_eq!(detect(&payload).unwrap(), PacketType::Command);

    let record = CommandRecord::decode(&payload).unwrap();
    let outcome = CommandProcessor::default().handle_command(&record, &mut store, &mut node);
    assert_eq!(store.config().telemetry_interval_ms, 15_000);

    // previous hop 0 is reserved, so no route to the base station is learned
    let reply = node.wrap_to_vec(0, &outcome.ack_bytes());
    match base.receive(&reply) {
        RoutingDecision::Deliver { header, payload } => {
            assert_eq!(header.next_hop, BROADCAST_ID);
            let ack = AckRecord::decode(payload).unwrap();
            assert_eq!(ack.sequence, 21);
            assert_eq!(ack.responder_id, 5);
            assert_eq!(ack.status, STATUS_OK);
        }
        other => panic!("ack not delivered: {:?}", other),
    }
}
