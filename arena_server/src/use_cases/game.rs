use super::types::{Dispatch, GameEvent};
use super::world::{Effects, RosterRequest, World};
use crate::domain::tuning::FieldTuning;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct WorldSettings {
    /// Delay between a spawn and the roster broadcast it triggers.
    pub spawn_broadcast_grace: Duration,
    /// How long a fresh connection may take to send its first `join`.
    pub join_timeout: Duration,
    pub field: FieldTuning,
}

/// Owns the world and applies every client event to completion, in arrival order.
///
/// Exits once every input sender is gone. Pending roster timers are aborted on
/// reset and on exit.
pub async fn world_task(
    mut input_rx: mpsc::Receiver<GameEvent>,
    dispatch_tx: broadcast::Sender<Dispatch>,
    settings: WorldSettings,
) {
    let mut world = World::new(settings.field);

    // Deferred roster broadcasts post back into this loop.
    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<RosterRequest>();
    let mut pending: Vec<JoinHandle<()>> = Vec::new();

    info!(
        grace_ms = settings.spawn_broadcast_grace.as_millis() as u64,
        "world task started"
    );

    loop {
        let effects = tokio::select! {
            maybe_event = input_rx.recv() => match maybe_event {
                Some(event) => world.handle(event),
                None => {
                    info!("input channel closed; world task exiting");
                    break;
                }
            },
            Some(request) = timer_rx.recv() => world.roster_due(request),
        };

        let Effects {
            dispatches,
            schedule,
            cancel_scheduled,
        } = effects;

        if cancel_scheduled {
            let aborted = pending.len();
            for handle in pending.drain(..) {
                handle.abort();
            }
            debug!(aborted, "pending roster broadcasts cancelled");
        }

        for dispatch in dispatches {
            // No receivers just means nobody is connected right now.
            let _ = dispatch_tx.send(dispatch);
        }

        if let Some(request) = schedule {
            pending.retain(|handle| !handle.is_finished());
            let timer_tx = timer_tx.clone();
            let grace = settings.spawn_broadcast_grace;
            pending.push(tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                if timer_tx.send(request).is_err() {
                    warn!("world task gone before roster broadcast");
                }
            }));
        }
    }

    for handle in pending {
        handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Point;
    use crate::use_cases::types::{Audience, TankSpawn, WorldEvent};
    use serde_json::Value;
    use tokio::time::timeout;

    const GRACE: Duration = Duration::from_millis(1500);

    fn start() -> (mpsc::Sender<GameEvent>, broadcast::Receiver<Dispatch>) {
        let (input_tx, input_rx) = mpsc::channel(64);
        let (dispatch_tx, dispatch_rx) = broadcast::channel(64);
        tokio::spawn(world_task(
            input_rx,
            dispatch_tx,
            WorldSettings {
                spawn_broadcast_grace: GRACE,
                join_timeout: Duration::from_secs(10),
                field: FieldTuning::default(),
            },
        ));
        (input_tx, dispatch_rx)
    }

    fn spawn(conn_id: u64, tank_id: &str) -> GameEvent {
        GameEvent::SpawnTank {
            conn_id,
            spawn: TankSpawn {
                tank_id: tank_id.to_string(),
                position: Point::new(100.0, 100.0),
                heading: 0.0,
                color: Value::Null,
                player_name: "pilot".to_string(),
                ammo: None,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn roster_is_broadcast_after_the_grace_period() {
        let (input_tx, mut dispatch_rx) = start();
        input_tx
            .send(GameEvent::Connected { conn_id: 1 })
            .await
            .expect("world task alive");
        input_tx.send(spawn(1, "T1")).await.expect("world task alive");

        let early = timeout(GRACE - Duration::from_millis(1), dispatch_rx.recv()).await;
        assert!(early.is_err(), "roster arrived before the grace period");

        let dispatch = dispatch_rx.recv().await.expect("roster dispatch");
        assert_eq!(dispatch.audience, Audience::Everyone);
        let WorldEvent::TankRoster(tanks) = dispatch.event else {
            panic!("expected a roster");
        };
        assert_eq!(tanks.len(), 1);
        assert_eq!(tanks[0].id, "T1");
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_pending_rosters() {
        let (input_tx, mut dispatch_rx) = start();
        input_tx.send(spawn(1, "T1")).await.expect("world task alive");
        input_tx
            .send(GameEvent::ResetAll { conn_id: 1 })
            .await
            .expect("world task alive");

        let destroyed = dispatch_rx.recv().await.expect("tankDestroyed");
        assert_eq!(destroyed.event, WorldEvent::TankDestroyed("T1".to_string()));
        let reset = dispatch_rx.recv().await.expect("worldReset");
        assert_eq!(reset.event, WorldEvent::WorldReset);

        let late = timeout(GRACE * 3, dispatch_rx.recv()).await;
        assert!(late.is_err(), "roster fired after reset: {late:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn events_are_applied_in_arrival_order() {
        let (input_tx, mut dispatch_rx) = start();
        input_tx
            .send(GameEvent::Join {
                conn_id: 9,
                player: "9".to_string(),
            })
            .await
            .expect("world task alive");
        input_tx
            .send(GameEvent::ResetAll { conn_id: 9 })
            .await
            .expect("world task alive");

        let first = dispatch_rx.recv().await.expect("snapshot");
        assert_eq!(first.audience, Audience::Only(9));
        assert!(matches!(first.event, WorldEvent::Snapshot(ref s) if s.resources.len() == 5));
        let second = dispatch_rx.recv().await.expect("worldReset");
        assert_eq!(second.event, WorldEvent::WorldReset);
    }

    #[tokio::test(start_paused = true)]
    async fn world_task_stops_when_inputs_close() {
        let (input_tx, input_rx) = mpsc::channel(4);
        let (dispatch_tx, _dispatch_rx) = broadcast::channel(4);
        let task = tokio::spawn(world_task(
            input_rx,
            dispatch_tx,
            WorldSettings {
                spawn_broadcast_grace: GRACE,
                join_timeout: Duration::from_secs(10),
                field: FieldTuning::default(),
            },
        ));

        drop(input_tx);

        timeout(Duration::from_secs(1), task)
            .await
            .expect("world task should exit")
            .expect("world task should not panic");
    }
}
