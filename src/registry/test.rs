#[cfg(test)]
mod tests {
    use crate::connection::{ConnectionHandle, Outbound};
    use crate::error::SessionError;
    use crate::registry::{spawn_reaper, GameState, SessionRegistry};
    use crate::room::RoomStatus;
    use crate::utils::types::IdGenerator;
    use futures::FutureExt;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_registry_creation() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.room_count().await, 0);

        let health = registry.service_health().await;
        assert_eq!(health.games, 0);
        assert!(health.game_states.is_empty());
    }

    #[tokio::test]
    async fn test_create_room() {
        let registry = SessionRegistry::new();
        let (conn, _rx) = ConnectionHandle::new();

        let (room, user_id) = registry.create_room(&conn).await.unwrap();

        assert_eq!(registry.room_count().await, 1);
        assert_eq!(room.client_count().await, 1);
        assert_eq!(room.status().await, RoomStatus::NotStarted);
        assert_eq!(registry.room_of(conn.id()).await.as_deref(), Some(room.id()));
        let binding = room.binding(conn.id()).await.unwrap();
        assert_eq!(binding.user_id, user_id);
        assert_eq!(binding.room_id, room.id());
    }

    #[tokio::test]
    async fn test_create_then_join_health() {
        let registry = SessionRegistry::new();
        let (creator, _rx1) = ConnectionHandle::new();
        let (joiner, _rx2) = ConnectionHandle::new();

        let (room, _) = registry.create_room(&creator).await.unwrap();
        let r1 = room.id().to_string();
        registry.join_room(&joiner, &r1).await.unwrap();

        assert_eq!(room.client_count().await, 2);

        let health = registry.service_health().await;
        assert_eq!(health.games, 1);
        assert_eq!(
            health.game_states.get(&r1),
            Some(&GameState {
                clients: 2,
                status: RoomStatus::NotStarted,
                room: r1.clone(),
            })
        );

        let serialized = serde_json::to_value(&health).unwrap();
        assert_eq!(
            serialized,
            json!({
                "games": 1,
                "gameStates": {
                    r1.clone(): {"clients": 2, "status": "not_started", "room": r1}
                }
            })
        );
    }

    #[tokio::test]
    async fn test_join_unknown_room() {
        let registry = SessionRegistry::new();
        let (conn, _rx) = ConnectionHandle::new();

        let err = registry.join_room(&conn, "missing").await.unwrap_err();
        assert_eq!(err, SessionError::RoomNotFound("missing".into()));
        assert_eq!(registry.room_of(conn.id()).await, None);
    }

    #[tokio::test]
    async fn test_rejoin_is_rejected() {
        let registry = SessionRegistry::new();
        let (creator, _rx1) = ConnectionHandle::new();
        let (joiner, _rx2) = ConnectionHandle::new();

        let (room, _) = registry.create_room(&creator).await.unwrap();
        registry.join_room(&joiner, room.id()).await.unwrap();

        let err = registry.join_room(&joiner, room.id()).await.unwrap_err();
        assert_eq!(err, SessionError::AlreadyInRoom(room.id().to_string()));
        assert_eq!(room.client_count().await, 2);

        // a bound connection cannot open or enter a second room either
        let (other_room, _) = registry.create_room(&ConnectionHandle::new().0).await.unwrap();
        assert!(matches!(
            registry.join_room(&joiner, other_room.id()).await,
            Err(SessionError::AlreadyInRoom(_))
        ));
        assert!(matches!(
            registry.create_room(&joiner).await,
            Err(SessionError::AlreadyInRoom(_))
        ));
    }

    #[tokio::test]
    async fn test_join_then_leave_restores_membership() {
        let registry = SessionRegistry::new();
        let (creator, _rx1) = ConnectionHandle::new();
        let (joiner, _rx2) = ConnectionHandle::new();

        let (room, creator_user) = registry.create_room(&creator).await.unwrap();
        let before: HashSet<String> = room.user_ids().await.into_iter().collect();

        let (_, joiner_user) = registry.join_room(&joiner, room.id()).await.unwrap();
        let removed = registry.leave_room(joiner.id(), room.id()).await.unwrap();
        assert_eq!(removed.user_id, joiner_user);
        assert!(!removed.connected);

        let after: HashSet<String> = room.user_ids().await.into_iter().collect();
        assert_eq!(before, after);
        assert!(after.contains(&creator_user));
        assert_eq!(registry.room_of(joiner.id()).await, None);

        // and the connection is free to join again
        registry.join_room(&joiner, room.id()).await.unwrap();
    }

    #[tokio::test]
    async fn test_leave_errors() {
        let registry = SessionRegistry::new();
        let (creator, _rx1) = ConnectionHandle::new();
        let (stranger, _rx2) = ConnectionHandle::new();

        let (room, _) = registry.create_room(&creator).await.unwrap();

        let err = registry
            .leave_room(stranger.id(), room.id())
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::ClientNotFound(room.id().to_string()));

        let err = registry
            .leave_room(creator.id(), "missing")
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::RoomNotFound("missing".into()));
    }

    #[tokio::test]
    async fn test_leave_keeps_empty_room() {
        let registry = SessionRegistry::new();
        let (creator, _rx) = ConnectionHandle::new();

        let (room, _) = registry.create_room(&creator).await.unwrap();
        registry.leave_room(creator.id(), room.id()).await.unwrap();

        assert_eq!(registry.room_count().await, 1);
        let health = registry.service_health().await;
        assert_eq!(health.game_states[room.id()].clients, 0);
    }

    #[tokio::test]
    async fn test_room_collision_fails_without_overwrite() {
        let registry =
            SessionRegistry::with_id_generator(IdGenerator::new(|| "fixed".to_string()));
        let (first, _rx1) = ConnectionHandle::new();
        let (second, _rx2) = ConnectionHandle::new();

        let (room, first_user) = registry.create_room(&first).await.unwrap();
        let err = registry.create_room(&second).await.unwrap_err();

        assert_eq!(err, SessionError::RoomCollision("fixed".into()));
        assert_eq!(registry.room_count().await, 1);
        assert_eq!(room.user_ids().await, vec![first_user]);
        assert_eq!(registry.room_of(second.id()).await, None);
    }

    #[tokio::test]
    async fn test_release_notifies_remaining_members() {
        let registry = SessionRegistry::new();
        let (creator, mut creator_rx) = ConnectionHandle::new();
        let (joiner, _joiner_rx) = ConnectionHandle::new();

        let (room, _) = registry.create_room(&creator).await.unwrap();
        let (_, joiner_user) = registry.join_room(&joiner, room.id()).await.unwrap();

        let released = registry.release(joiner.id()).await.unwrap();
        assert_eq!(released.user_id, joiner_user);
        assert_eq!(room.client_count().await, 1);

        match creator_rx.recv().await {
            Some(Outbound::Response(response)) => {
                assert_eq!(response.content.unwrap()["userId"], json!(joiner_user));
            }
            other => panic!("Expected leave notice, got {:?}", other),
        }

        // releasing an unbound connection is a no-op
        assert!(registry.release(joiner.id()).await.is_none());
    }

    #[tokio::test]
    async fn test_reap_empty_rooms_after_grace() {
        let registry = SessionRegistry::new();
        let (a, _rx_a) = ConnectionHandle::new();
        let (b, _rx_b) = ConnectionHandle::new();

        let (empty, _) = registry.create_room(&a).await.unwrap();
        let (busy, _) = registry.create_room(&b).await.unwrap();
        registry.leave_room(a.id(), empty.id()).await.unwrap();

        // not empty for long enough yet
        assert!(registry
            .reap_empty_rooms(Duration::from_secs(3600))
            .await
            .is_empty());

        let reaped = registry.reap_empty_rooms(Duration::ZERO).await;
        assert_eq!(reaped, vec![empty.id().to_string()]);
        assert!(registry.room(empty.id()).await.is_none());
        assert!(registry.room(busy.id()).await.is_some());

        // a stale handle to the reaped room no longer accepts members
        let (late, _rx_late) = ConnectionHandle::new();
        assert!(matches!(
            empty.add_client(&late).await,
            Err(SessionError::RoomNotFound(_))
        ));
        assert!(matches!(
            registry.join_room(&late, empty.id()).await,
            Err(SessionError::RoomNotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_task_runs_periodically() {
        let registry = Arc::new(SessionRegistry::new());
        let (conn, _rx) = ConnectionHandle::new();
        let (room, _) = registry.create_room(&conn).await.unwrap();
        registry.leave_room(conn.id(), room.id()).await.unwrap();

        let handle = spawn_reaper(
            registry.clone(),
            Duration::from_secs(60),
            Duration::from_secs(120),
        );

        // swept twice, but not empty for long enough
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(registry.room_count().await, 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(registry.room_count().await, 0);
        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_yield_distinct_rooms() {
        let registry = Arc::new(SessionRegistry::new());
        let mut handles = Vec::new();
        let mut receivers = Vec::new();

        for _ in 0..64 {
            let (conn, rx) = ConnectionHandle::new();
            receivers.push(rx);
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .create_room(&conn)
                    .await
                    .map(|(room, _)| room.id().to_string())
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().unwrap());
        }

        assert_eq!(ids.len(), 64);
        assert_eq!(registry.room_count().await, 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_colliding_creates_fail_explicitly() {
        let seq = Arc::new(AtomicUsize::new(0));
        let ids = seq.clone();
        // every pair of calls draws the same id
        let registry = Arc::new(SessionRegistry::with_id_generator(IdGenerator::new(
            move || format!("room-{}", ids.fetch_add(1, Ordering::SeqCst) / 2),
        )));

        let mut handles = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..20 {
            let (conn, rx) = ConnectionHandle::new();
            receivers.push(rx);
            let registry = registry.clone();
            handles.push(tokio::spawn(async move { registry.create_room(&conn).await }));
        }

        let mut created = HashSet::new();
        let mut collisions = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok((room, _)) => assert!(created.insert(room.id().to_string())),
                Err(SessionError::RoomCollision(_)) => collisions += 1,
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }

        assert_eq!(created.len(), 10);
        assert_eq!(collisions, 10);
        assert_eq!(registry.room_count().await, 10);
        for room_id in created {
            assert_eq!(registry.room(&room_id).await.unwrap().client_count().await, 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_health_counts_match_bindings_under_churn() {
        let registry = Arc::new(SessionRegistry::new());
        let (creator, _rx) = ConnectionHandle::new();
        let (room, _) = registry.create_room(&creator).await.unwrap();
        let room_id = room.id().to_string();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            let room_id = room_id.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..20 {
                    let (conn, _rx) = ConnectionHandle::new();
                    registry.join_room(&conn, &room_id).await.unwrap();
                    registry.leave_room(conn.id(), &room_id).await.unwrap();
                }
            }));
        }

        for _ in 0..20 {
            let health = registry.service_health().await;
            let clients = health.game_states[&room_id].clients;
            assert!((1..=17).contains(&clients));
            tokio::task::yield_now().await;
        }

        for handle in handles {
            handle.await.unwrap();
        }
        let health = registry.service_health().await;
        assert_eq!(health.game_states[&room_id].clients, 1);
        assert_eq!(room.client_count().await, 1);
    }

    #[tokio::test]
    async fn test_dropped_leave_keeps_binding_releasable() {
        let registry = SessionRegistry::new();
        let (host, _rx1) = ConnectionHandle::new();
        let (guest, _rx2) = ConnectionHandle::new();
        let (room, _) = registry.create_room(&host).await.unwrap();
        registry.join_room(&guest, room.id()).await.unwrap();

        // the leave gets as far as waiting on the room lock, then is dropped
        let guard = room.lock().await;
        assert!(registry
            .leave_room(guest.id(), room.id())
            .now_or_never()
            .is_none());
        drop(guard);

        assert_eq!(registry.room_of(guest.id()).await.as_deref(), Some(room.id()));
        assert_eq!(room.client_count().await, 2);

        let released = registry.release(guest.id()).await;
        assert!(released.is_some());
        assert_eq!(registry.room_of(guest.id()).await, None);
        assert_eq!(
            registry.service_health().await.game_states[room.id()].clients,
            1
        );
    }

    #[tokio::test]
    async fn test_dropped_join_reservation_is_cleared_on_release() {
        let registry = SessionRegistry::new();
        let (host, _rx1) = ConnectionHandle::new();
        let (guest, _rx2) = ConnectionHandle::new();
        let (room, _) = registry.create_room(&host).await.unwrap();

        let guard = room.lock().await;
        assert!(registry
            .join_room(&guest, room.id())
            .now_or_never()
            .is_none());
        drop(guard);

        // reserved in the index but never bound in the room
        assert_eq!(registry.room_of(guest.id()).await.as_deref(), Some(room.id()));
        assert_eq!(room.client_count().await, 1);

        assert!(registry.release(guest.id()).await.is_none());
        assert_eq!(registry.room_of(guest.id()).await, None);
        registry.join_room(&guest, room.id()).await.unwrap();
        assert_eq!(room.client_count().await, 2);
    }

    #[tokio::test]
    async fn test_join_racing_reaper_rolls_back_reservation() {
        let registry = Arc::new(SessionRegistry::new());
        let (host, _rx1) = ConnectionHandle::new();
        let (late, _rx2) = ConnectionHandle::new();
        let (room, _) = registry.create_room(&host).await.unwrap();
        let room_id = room.id().to_string();
        registry.leave_room(host.id(), &room_id).await.unwrap();

        // the join reserves its index entry, then waits on the room lock
        let mut guard = room.lock().await;
        let join = {
            let registry = registry.clone();
            let late = late.clone();
            let room_id = room_id.clone();
            tokio::spawn(async move { registry.join_room(&late, &room_id).await })
        };
        while registry.room_of(late.id()).await.is_none() {
            tokio::task::yield_now().await;
        }

        // what the reaper does to a room it removes
        guard.closed = true;
        drop(guard);

        let err = join.await.unwrap().unwrap_err();
        assert_eq!(err, SessionError::RoomNotFound(room_id.clone()));
        assert_eq!(registry.room_of(late.id()).await, None);
        assert_eq!(room.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_reaped_room_rejects_stale_handles() {
        let registry = SessionRegistry::new();
        let (host, _rx1) = ConnectionHandle::new();
        let (late, _rx2) = ConnectionHandle::new();
        let (room, _) = registry.create_room(&host).await.unwrap();
        let room_id = room.id().to_string();
        registry.leave_room(host.id(), &room_id).await.unwrap();

        assert_eq!(registry.reap_empty_rooms(Duration::ZERO).await, vec![room_id.clone()]);

        assert_eq!(
            room.add_client(&late).await.unwrap_err(),
            SessionError::RoomNotFound(room_id.clone())
        );
        assert_eq!(
            registry.join_room(&late, &room_id).await.unwrap_err(),
            SessionError::RoomNotFound(room_id.clone())
        );
        assert_eq!(registry.room_of(late.id()).await, None);

        // the connection is still free to open a room of its own
        registry.create_room(&late).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_clears_reservation_for_reaped_room() {
        let registry = SessionRegistry::new();
        let (host, _rx1) = ConnectionHandle::new();
        let (guest, _rx2) = ConnectionHandle::new();
        let (room, _) = registry.create_room(&host).await.unwrap();
        let room_id = room.id().to_string();
        registry.leave_room(host.id(), &room_id).await.unwrap();

        let guard = room.lock().await;
        assert!(registry.join_room(&guest, &room_id).now_or_never().is_none());
        drop(guard);
        assert_eq!(registry.reap_empty_rooms(Duration::ZERO).await.len(), 1);

        assert!(registry.release(guest.id()).await.is_none());
        assert_eq!(registry.room_of(guest.id()).await, None);
    }
}
