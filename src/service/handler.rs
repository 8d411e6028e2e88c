//! # Automatic Protocol Handler
//!
//! Protocol-mandated reactions to inbound packets: keepalive echoes,
//! world-sync bookkeeping plus its acknowledgement, movement
//! acknowledgement, and tick reconciliation.
//!
//! The handler runs on the read loop, once per inbound packet, before
//! packet observers are notified. It mutates the registry under tightly
//! scoped locks, notifies data observers with the locks released, and
//! returns the replies the read loop enqueues on the command queue. With
//! automatic handling disabled none of this runs and protocol compliance
//! is the application's problem.

use crate::protocol::data::{ObjectStatus, ObjectStatusData, WorldPos};
use crate::protocol::message::Packet;
use crate::service::client::Client;
use tracing::debug;

/// React to one inbound packet, returning the protocol-mandated replies.
///
/// Matching is exhaustive on purpose: a new packet variant will not
/// compile until its automatic reaction (or lack of one) is decided here.
pub(crate) fn handle_packet(client: &Client, packet: &Packet) -> Vec<Packet> {
    match packet {
        Packet::Ping { serial } => {
            let reply = Packet::Pong {
                serial: *serial,
                time: client.elapsed_millis(),
            };
            debug!(serial, "answering keepalive");
            vec![reply]
        }
        Packet::Update {
            newobjs, drops, ..
        } => handle_update(client, newobjs, drops),
        Packet::NewTick {
            tick_time,
            statuses,
            ..
        } => handle_new_tick(client, *tick_time, statuses),
        Packet::Goto { object_id, pos } => handle_goto(client, *object_id, *pos),
        Packet::CreateSuccess { object_id, .. } => {
            debug!(object_id, "player entity id assigned");
            client.with_registry(|reg| reg.set_player_id(*object_id));
            Vec::new()
        }
        // Terminal; the read loop stops after observers see it
        Packet::Failure { .. } => Vec::new(),
        // Server-bound variants; nothing to react to if one arrives
        Packet::Pong { .. } => Vec::new(),
        Packet::UpdateAck => Vec::new(),
        Packet::GotoAck { .. } => Vec::new(),
    }
}

fn handle_update(client: &Client, newobjs: &[ObjectStatus], drops: &[u32]) -> Vec<Packet> {
    for id in drops {
        let removed = client.with_registry(|reg| reg.remove_by_id(*id));
        if let Some(entity) = removed {
            client.notify_object_removed(&entity);
        }
    }

    for obj in newobjs {
        client.with_registry(|reg| {
            // Wire-implied replace: clear any stale entry silently before
            // the add, so observers see a single addition
            reg.remove_by_id(obj.id());
            reg.add(obj.clone())
        });
        client.notify_object_added(obj);
    }

    debug!(
        added = newobjs.len(),
        dropped = drops.len(),
        "world sync applied"
    );
    // Exactly one ack per sync, whatever it carried
    vec![Packet::UpdateAck]
}

fn handle_new_tick(client: &Client, tick_time: u32, statuses: &[ObjectStatusData]) -> Vec<Packet> {
    client.set_tick_length_ms(tick_time);

    let player_id = client.player_id();
    for status in statuses {
        // Client-predicted movement wins for the local player
        if player_id == Some(status.object_id) {
            continue;
        }
        let updated = client.with_registry(|reg| {
            reg.update_position(status.object_id, status.pos).cloned()
        });
        if let Some(entity) = updated {
            client.notify_object_updated(&entity);
        }
    }

    Vec::new()
}

fn handle_goto(client: &Client, object_id: u32, pos: WorldPos) -> Vec<Packet> {
    let updated =
        client.with_registry(|reg| reg.update_position(object_id, pos).cloned());
    if let Some(entity) = updated {
        client.notify_object_updated(&entity);
    }

    // Acked whether or not the entity is still known
    vec![Packet::GotoAck {
        time: client.elapsed_millis(),
    }]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::service::listener::DataListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn entity(id: u32, x: f32) -> ObjectStatus {
        ObjectStatus {
            object_type: 0x0200,
            data: ObjectStatusData {
                object_id: id,
                pos: WorldPos::new(x, 0.0),
                stats: vec![],
            },
        }
    }

    fn update_packet(newobjs: Vec<ObjectStatus>, drops: Vec<u32>) -> Packet {
        Packet::Update {
            tiles: vec![],
            newobjs,
            drops,
        }
    }

    #[derive(Default)]
    struct CountingListener {
        added: AtomicUsize,
        removed: AtomicUsize,
        updated: AtomicUsize,
    }

    impl DataListener for CountingListener {
        fn object_added(
            &self,
            _client: &Client,
            _object: &ObjectStatus,
        ) -> Option<Arc<dyn DataListener>> {
            self.added.fetch_add(1, Ordering::SeqCst);
            None
        }

        fn object_removed(&self, _client: &Client, _object: &ObjectStatus) -> bool {
            self.removed.fetch_add(1, Ordering::SeqCst);
            false
        }

        fn object_updated(&self, _client: &Client, _object: &ObjectStatus) {
            self.updated.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn ping_is_answered_with_matching_serial() {
        let client = Client::new();
        let replies = handle_packet(&client, &Packet::Ping { serial: 42 });

        // No session started, so elapsed time is zero
        assert_eq!(replies, vec![Packet::Pong { serial: 42, time: 0 }]);
    }

    #[test]
    fn update_applies_drops_then_adds_and_acks_once() {
        let client = Client::new();
        handle_packet(&client, &update_packet(vec![entity(1, 0.0)], vec![]));

        let replies = handle_packet(
            &client,
            &update_packet(vec![entity(2, 5.0), entity(3, 6.0)], vec![1]),
        );

        assert_eq!(replies, vec![Packet::UpdateAck]);
        let ids: Vec<u32> = client.objects().iter().map(|o| o.id()).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn drop_and_add_of_same_id_is_a_replace() {
        let client = Client::new();
        handle_packet(&client, &update_packet(vec![entity(9, 1.0)], vec![]));

        let replies = handle_packet(
            &client,
            &update_packet(vec![entity(9, 2.0)], vec![9]),
        );

        assert_eq!(replies, vec![Packet::UpdateAck]);
        assert_eq!(client.objects().len(), 1);
        assert_eq!(client.objects()[0].data.pos.x, 2.0);
    }

    #[test]
    fn re_add_without_drop_still_replaces() {
        let counter = Arc::new(CountingListener::default());
        let client = Client::new();
        client.add_data_listener(counter.clone());

        handle_packet(&client, &update_packet(vec![entity(4, 1.0)], vec![]));
        handle_packet(&client, &update_packet(vec![entity(4, 7.5)], vec![]));

        assert_eq!(client.objects().len(), 1);
        assert_eq!(client.objects()[0].data.pos.x, 7.5);
        // The silent removal inside the replace produces no removal callback
        assert_eq!(counter.added.load(Ordering::SeqCst), 2);
        assert_eq!(counter.removed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn creation_ack_before_sync_binds_player_at_sync() {
        let client = Client::new();
        handle_packet(
            &client,
            &Packet::CreateSuccess {
                object_id: 7,
                char_id: 1,
            },
        );
        assert!(client.player_object().is_none());

        handle_packet(&client, &update_packet(vec![entity(7, 3.0)], vec![]));
        assert_eq!(client.player_object().unwrap().id(), 7);
    }

    #[test]
    fn sync_before_creation_ack_needs_another_sync() {
        let client = Client::new();
        handle_packet(&client, &update_packet(vec![entity(7, 3.0)], vec![]));
        handle_packet(
            &client,
            &Packet::CreateSuccess {
                object_id: 7,
                char_id: 1,
            },
        );
        assert!(client.player_object().is_none());

        // The next sync re-introducing the id completes the binding
        handle_packet(&client, &update_packet(vec![entity(7, 4.0)], vec![7]));
        assert_eq!(client.player_object().unwrap().data.pos.x, 4.0);
    }

    #[test]
    fn goto_moves_entity_and_acks() {
        let client = Client::new();
        handle_packet(&client, &update_packet(vec![entity(5, 0.0)], vec![]));

        let replies = handle_packet(
            &client,
            &Packet::Goto {
                object_id: 5,
                pos: WorldPos::new(8.0, 9.0),
            },
        );

        assert_eq!(replies, vec![Packet::GotoAck { time: 0 }]);
        assert_eq!(client.objects()[0].data.pos, WorldPos::new(8.0, 9.0));
    }

    #[test]
    fn goto_for_unknown_entity_still_acks() {
        let client = Client::new();
        let replies = handle_packet(
            &client,
            &Packet::Goto {
                object_id: 404,
                pos: WorldPos::new(1.0, 1.0),
            },
        );

        assert_eq!(replies, vec![Packet::GotoAck { time: 0 }]);
        assert!(client.objects().is_empty());
    }

    #[test]
    fn new_tick_reconciles_all_but_the_player() {
        let client = Client::new();
        handle_packet(
            &client,
            &Packet::CreateSuccess {
                object_id: 1,
                char_id: 1,
            },
        );
        handle_packet(
            &client,
            &update_packet(vec![entity(1, 10.0), entity(2, 20.0)], vec![]),
        );

        let replies = handle_packet(
            &client,
            &Packet::NewTick {
                tick_id: 3,
                tick_time: 200,
                statuses: vec![
                    ObjectStatusData {
                        object_id: 1,
                        pos: WorldPos::new(99.0, 99.0),
                        stats: vec![],
                    },
                    ObjectStatusData {
                        object_id: 2,
                        pos: WorldPos::new(21.0, 0.0),
                        stats: vec![],
                    },
                ],
            },
        );

        assert!(replies.is_empty());
        assert_eq!(client.tick_length_ms(), 200);
        // Player position untouched, the other entity reconciled
        assert_eq!(client.objects()[0].data.pos.x, 10.0);
        assert_eq!(client.objects()[1].data.pos.x, 21.0);
    }

    #[test]
    fn new_tick_ignores_entities_never_synced() {
        let client = Client::new();
        let replies = handle_packet(
            &client,
            &Packet::NewTick {
                tick_id: 1,
                tick_time: 150,
                statuses: vec![ObjectStatusData {
                    object_id: 77,
                    pos: WorldPos::new(1.0, 2.0),
                    stats: vec![],
                }],
            },
        );

        assert!(replies.is_empty());
        assert!(client.objects().is_empty());
        assert_eq!(client.tick_length_ms(), 150);
    }

    #[test]
    fn failure_and_acks_produce_no_replies() {
        let client = Client::new();
        let failure = Packet::Failure {
            error_id: 5,
            description: "account in use".to_string(),
        };
        assert!(handle_packet(&client, &failure).is_empty());
        assert!(handle_packet(&client, &Packet::UpdateAck).is_empty());
        assert!(handle_packet(&client, &Packet::GotoAck { time: 1 }).is_empty());
        assert!(handle_packet(&client, &Packet::Pong { serial: 1, time: 2 }).is_empty());
    }

    #[test]
    fn data_listeners_fire_per_change() {
        let counter = Arc::new(CountingListener::default());
        let client = Client::new();
        client.add_data_listener(counter.clone());

        handle_packet(
            &client,
            &update_packet(vec![entity(1, 0.0), entity(2, 0.0)], vec![]),
        );
        handle_packet(
            &client,
            &Packet::Goto {
                object_id: 2,
                pos: WorldPos::new(4.0, 4.0),
            },
        );
        handle_packet(&client, &update_packet(vec![], vec![1]));

        assert_eq!(counter.added.load(Ordering::SeqCst), 2);
        assert_eq!(counter.updated.load(Ordering::SeqCst), 1);
        assert_eq!(counter.removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_an_unknown_id_notifies_nobody() {
        let counter = Arc::new(CountingListener::default());
        let client = Client::new();
        client.add_data_listener(counter.clone());

        let replies = handle_packet(&client, &update_packet(vec![], vec![123]));

        assert_eq!(replies, vec![Packet::UpdateAck]);
        assert_eq!(counter.removed.load(Ordering::SeqCst), 0);
    }

    struct SpawningListener {
        child: Arc<CountingListener>,
    }

    impl DataListener for SpawningListener {
        fn object_added(
            &self,
            _client: &Client,
            _object: &ObjectStatus,
        ) -> Option<Arc<dyn DataListener>> {
            Some(self.child.clone())
        }
    }

    #[test]
    fn replacement_listener_registers_immediately() {
        let child = Arc::new(CountingListener::default());
        let spawner = Arc::new(SpawningListener {
            child: child.clone(),
        });
        let client = Client::new();
        client.add_data_listener(spawner);

        // Two adds in one sync: the child registered during the first add
        // sees the second
        handle_packet(
            &client,
            &update_packet(vec![entity(1, 0.0), entity(2, 0.0)], vec![]),
        );

        assert_eq!(child.added.load(Ordering::SeqCst), 1);
    }

    struct SelfRemovingListener {
        removed: AtomicUsize,
    }

    impl DataListener for SelfRemovingListener {
        fn object_removed(&self, _client: &Client, _object: &ObjectStatus) -> bool {
            self.removed.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn removal_by_return_applies_after_the_round() {
        let quitter = Arc::new(SelfRemovingListener {
            removed: AtomicUsize::new(0),
        });
        let counter = Arc::new(CountingListener::default());
        let client = Client::new();
        client.add_data_listener(quitter.clone());
        client.add_data_listener(counter.clone());

        handle_packet(
            &client,
            &update_packet(vec![entity(1, 0.0), entity(2, 0.0)], vec![]),
        );
        handle_packet(&client, &update_packet(vec![], vec![1, 2]));

        // The quitter saw only the first drop; the counter saw both
        assert_eq!(quitter.removed.load(Ordering::SeqCst), 1);
        assert_eq!(counter.removed.load(Ordering::SeqCst), 2);
    }

    struct UnregisteringListener {
        victim: Mutex<Option<Arc<dyn DataListener>>>,
    }

    impl DataListener for UnregisteringListener {
        fn object_removed(&self, client: &Client, _object: &ObjectStatus) -> bool {
            if let Some(victim) = self.victim.lock().unwrap().take() {
                client.remove_data_listener(&victim);
            }
            false
        }
    }

    #[test]
    fn listener_unregistered_mid_round_is_skipped() {
        let victim = Arc::new(CountingListener::default());
        let victim_dyn: Arc<dyn DataListener> = victim.clone();
        let saboteur = Arc::new(UnregisteringListener {
            victim: Mutex::new(Some(victim_dyn)),
        });
        let client = Client::new();
        client.add_data_listener(saboteur);
        client.add_data_listener(victim.clone());

        handle_packet(&client, &update_packet(vec![entity(1, 0.0)], vec![]));
        handle_packet(&client, &update_packet(vec![], vec![1]));

        // The saboteur runs first and pulls the victim out of the round
        assert_eq!(victim.removed.load(Ordering::SeqCst), 0);
    }

    struct PanickingListener;

    impl DataListener for PanickingListener {
        fn object_added(
            &self,
            _client: &Client,
            _object: &ObjectStatus,
        ) -> Option<Arc<dyn DataListener>> {
            panic!("observer bug");
        }
    }

    #[test]
    fn panicking_listener_does_not_stop_the_round() {
        let counter = Arc::new(CountingListener::default());
        let client = Client::new();
        client.add_data_listener(Arc::new(PanickingListener));
        client.add_data_listener(counter.clone());

        handle_packet(&client, &update_packet(vec![entity(1, 0.0)], vec![]));

        assert_eq!(counter.added.load(Ordering::SeqCst), 1);
        assert_eq!(client.objects().len(), 1);
    }
}
