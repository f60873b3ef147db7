use crate::{Route, SimulationError, SimulationEvent, SimulationState};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use fleet_core::{ActorId, RunId, now_epoch_millis};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

const COMMAND_BUFFER: usize = 16;

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Wall-clock tick period. `None` leaves ticking to [`Simulator::tick`].
    pub tick_interval: Option<Duration>,
    pub event_capacity: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Some(Duration::from_secs(2)),
            event_capacity: 1024,
        }
    }
}

impl SimulatorConfig {
    pub fn manual() -> Self {
        Self {
            tick_interval: None,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

enum Command {
    Tick {
        elapsed_s: f64,
        reply: oneshot::Sender<SimulationEvent>,
    },
    Snapshot {
        reply: oneshot::Sender<SimulationState>,
    },
}

struct ActorHandle {
    run_id: RunId,
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

struct Inner {
    config: SimulatorConfig,
    actors: DashMap<ActorId, ActorHandle>,
    events: broadcast::Sender<SimulationEvent>,
}

/// Runs one task per actor. Each task owns its [`SimulationState`], so
/// actors never contend with each other.
///
/// Cloning is cheap and every clone drives the same set of actors.
#[derive(Clone)]
pub struct Simulator {
    inner: Arc<Inner>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                actors: DashMap::new(),
                events,
            }),
        }
    }

    /// Events from every actor, in the order each actor produced them.
    pub fn subscribe(&self) -> broadcast::Receiver<SimulationEvent> {
        self.inner.events.subscribe()
    }

    /// Starts `actor_id` at the first stop of `route`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        &self,
        actor_id: ActorId,
        route: impl Into<Arc<Route>>,
        speed_kmh: f64,
    ) -> Result<RunId, SimulationError> {
        let route = route.into();
        let state = SimulationState::new(Arc::clone(&route), speed_kmh)?;

        let run_id = match self.inner.actors.entry(actor_id.clone()) {
            Entry::Occupied(_) => return Err(SimulationError::AlreadyRunning(actor_id)),
            Entry::Vacant(slot) => {
                let run_id = RunId::new();
                let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
                let task = tokio::spawn(run_actor(
                    ActorRun {
                        actor_id: actor_id.clone(),
                        run_id,
                        state,
                        events: self.inner.events.clone(),
                    },
                    receiver,
                    self.inner.config.tick_interval,
                ));
                slot.insert(ActorHandle {
                    run_id,
                    commands,
                    task,
                });
                run_id
            }
        };

        metrics::gauge!("fleet_sim_active_actors").set(self.inner.actors.len() as f64);
        info!(
            actor_id = %actor_id,
            run_id = %run_id,
            route_id = %route.id,
            speed_kmh,
            "simulation started"
        );
        Ok(run_id)
    }

    /// Advances `actor_id` by `elapsed_s` seconds and returns the event it emitted.
    pub async fn tick(
        &self,
        actor_id: &ActorId,
        elapsed_s: f64,
    ) -> Result<SimulationEvent, SimulationError> {
        let commands = self.commands_for(actor_id)?;
        let (reply, response) = oneshot::channel();
        commands
            .send(Command::Tick { elapsed_s, reply })
            .await
            .map_err(|_| SimulationError::NotRunning(actor_id.clone()))?;
        response
            .await
            .map_err(|_| SimulationError::NotRunning(actor_id.clone()))
    }

    pub async fn snapshot(&self, actor_id: &ActorId) -> Result<SimulationState, SimulationError> {
        let commands = self.commands_for(actor_id)?;
        let (reply, response) = oneshot::channel();
        commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| SimulationError::NotRunning(actor_id.clone()))?;
        response
            .await
            .map_err(|_| SimulationError::NotRunning(actor_id.clone()))
    }

    /// Stops `actor_id`. No event is published for it afterwards.
    pub fn stop(&self, actor_id: &ActorId) -> StopOutcome {
        let Some((_, handle)) = self.inner.actors.remove(actor_id) else {
            debug!(actor_id = %actor_id, "stop requested for idle actor");
            return StopOutcome::NotRunning;
        };
        handle.task.abort();
        metrics::gauge!("fleet_sim_active_actors").set(self.inner.actors.len() as f64);
        info!(actor_id = %actor_id, run_id = %handle.run_id, "simulation stopped");
        StopOutcome::Stopped
    }

    pub fn stop_all(&self) -> usize {
        let running = self.active_actors();
        running
            .iter()
            .filter(|actor_id| self.stop(actor_id) == StopOutcome::Stopped)
            .count()
    }

    /// Running actors, sorted by id.
    pub fn active_actors(&self) -> Vec<ActorId> {
        let mut actors: Vec<ActorId> = self
            .inner
            .actors
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        actors.sort();
        actors
    }

    fn commands_for(&self, actor_id: &ActorId) -> Result<mpsc::Sender<Command>, SimulationError> {
        // Clone the sender so no map guard is held across an await.
        self.inner
            .actors
            .get(actor_id)
            .map(|handle| handle.commands.clone())
            .ok_or_else(|| SimulationError::NotRunning(actor_id.clone()))
    }
}

struct ActorRun {
    actor_id: ActorId,
    run_id: RunId,
    state: SimulationState,
    events: broadcast::Sender<SimulationEvent>,
}

impl ActorRun {
    fn step(&mut self, elapsed_s: f64) -> SimulationEvent {
        let outcome = self.state.advance(elapsed_s);
        let event = SimulationEvent {
            actor_id: self.actor_id.clone(),
            run_id: self.run_id,
            timestamp_ms: now_epoch_millis(),
            outcome,
        };

        metrics::counter!("fleet_sim_ticks_total").increment(1);
        if event.is_waypoint() {
            metrics::counter!("fleet_sim_waypoints_total").increment(1);
            debug!(actor_id = %self.actor_id, outcome = ?event.outcome, "waypoint reached");
        }
        // No subscribers is fine.
        let _ = self.events.send(event.clone());
        event
    }
}

async fn run_actor(
    mut run: ActorRun,
    mut commands: mpsc::Receiver<Command>,
    tick_interval: Option<Duration>,
) {
    let started = Instant::now();
    let mut ticker = tick_interval.map(|period| {
        let mut ticker = tokio::time::interval_at(started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut last_tick = started;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Tick { elapsed_s, reply }) => {
                    let _ = reply.send(run.step(elapsed_s));
                }
                Some(Command::Snapshot { reply }) => {
                    let _ = reply.send(run.state.clone());
                }
                None => break,
            },
            now = next_tick(&mut ticker) => {
                let elapsed = now.duration_since(last_tick);
                last_tick = now;
                run.step(elapsed.as_secs_f64());
            }
        }
    }
    debug!(actor_id = %run.actor_id, "actor task finished");
}

async fn next_tick(ticker: &mut Option<Interval>) -> Instant {
    match ticker {
        Some(ticker) => ticker.tick().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TickOutcome;
    use tokio::sync::broadcast::error::TryRecvError;

    fn straight_route() -> Route {
        Route::from_stops(
            "line",
            "line",
            [(0.0, 0.0, "start"), (0.0, 1.0, "end")],
        )
    }

    fn actor(id: &str) -> ActorId {
        ActorId::new(id)
    }

    #[tokio::test]
    async fn manual_tick_moves_the_actor() {
        let simulator = Simulator::new(SimulatorConfig::manual());
        let route = straight_route();
        let half = route.total_distance_m() / 2.0;
        let run_id = simulator.start(actor("a"), route, 3.6).unwrap();

        let event = simulator.tick(&actor("a"), half).await.unwrap();
        assert_eq!(event.run_id, run_id);
        assert_eq!(event.actor_id, actor("a"));
        let TickOutcome::Motion { factor, .. } = event.outcome else {
            panic!("expected motion");
        };
        assert_eq!(factor, 0.5);

        let state = simulator.snapshot(&actor("a")).await.unwrap();
        assert_eq!(state.progress_m(), half);
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let simulator = Simulator::new(SimulatorConfig::manual());
        simulator.start(actor("a"), straight_route(), 30.0).unwrap();

        let err = simulator.start(actor("a"), straight_route(), 30.0).unwrap_err();
        assert_eq!(err, SimulationError::AlreadyRunning(actor("a")));
        assert_eq!(simulator.active_actors(), vec![actor("a")]);
    }

    #[tokio::test]
    async fn invalid_input_does_not_register_the_actor() {
        let simulator = Simulator::new(SimulatorConfig::manual());
        let short = Route::from_stops("short", "short", [(0.0, 0.0, "only")]);

        assert!(matches!(
            simulator.start(actor("a"), short, 30.0),
            Err(SimulationError::InvalidRoute(_))
        ));
        assert!(matches!(
            simulator.start(actor("a"), straight_route(), 0.0),
            Err(SimulationError::InvalidSpeed(_))
        ));
        assert!(simulator.active_actors().is_empty());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let simulator = Simulator::new(SimulatorConfig::manual());
        let first = simulator.start(actor("a"), straight_route(), 30.0).unwrap();

        assert_eq!(simulator.stop(&actor("a")), StopOutcome::Stopped);
        assert_eq!(simulator.stop(&actor("a")), StopOutcome::NotRunning);
        assert_eq!(
            simulator.tick(&actor("a"), 1.0).await.unwrap_err(),
            SimulationError::NotRunning(actor("a"))
        );

        // A fresh run gets a fresh id.
        let again = simulator.start(actor("a"), straight_route(), 30.0).unwrap();
        let event = simulator.tick(&actor("a"), 1.0).await.unwrap();
        assert_eq!(event.run_id, again);
        assert_ne!(again, first);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ticks_are_serialized() {
        let simulator = Simulator::new(SimulatorConfig::manual());
        simulator.start(actor("a"), straight_route(), 3.6).unwrap();

        let ticks: Vec<_> = (0..50)
            .map(|_| {
                let simulator = simulator.clone();
                tokio::spawn(async move { simulator.tick(&actor("a"), 10.0).await })
            })
            .collect();
        for tick in ticks {
            let event = tick.await.unwrap().unwrap();
            assert!(matches!(event.outcome, TickOutcome::Motion { .. }));
        }

        // 1 m/s for 50 ticks of 10 s, all on the first segment.
        let state = simulator.snapshot(&actor("a")).await.unwrap();
        assert_eq!(state.progress_m(), 500.0);
        assert_eq!(state.current_segment_index(), 0);
    }

    #[tokio::test]
    async fn actors_advance_independently() {
        let simulator = Simulator::new(SimulatorConfig::manual());
        simulator.start(actor("fast"), straight_route(), 100.0).unwrap();
        simulator.start(actor("slow"), straight_route(), 10.0).unwrap();

        simulator.tick(&actor("fast"), 60.0).await.unwrap();
        simulator.tick(&actor("slow"), 60.0).await.unwrap();

        let fast = simulator.snapshot(&actor("fast")).await.unwrap();
        let slow = simulator.snapshot(&actor("slow")).await.unwrap();
        assert!(fast.progress_m() > slow.progress_m());
        assert_eq!(simulator.stop_all(), 2);
        assert!(simulator.active_actors().is_empty());
    }

    #[tokio::test]
    async fn manual_ticks_are_broadcast() {
        let simulator = Simulator::new(SimulatorConfig::manual());
        let mut events = simulator.subscribe();
        simulator.start(actor("a"), straight_route(), 30.0).unwrap();

        let returned = simulator.tick(&actor("a"), 1.0).await.unwrap();
        let published = events.recv().await.unwrap();
        assert_eq!(returned, published);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_drives_ticks_until_stopped() {
        let simulator = Simulator::new(SimulatorConfig {
            tick_interval: Some(Duration::from_secs(2)),
            event_capacity: 64,
        });
        let mut events = simulator.subscribe();
        simulator.start(actor("a"), straight_route(), 36.0).unwrap();

        // 36 km/h is 10 m/s, so each 2s tick covers 20 m.
        let first = events.recv().await.unwrap();
        assert_eq!(first.actor_id, actor("a"));
        let second = events.recv().await.unwrap();
        let (
            TickOutcome::Motion { factor: f1, .. },
            TickOutcome::Motion { factor: f2, .. },
        ) = (first.outcome, second.outcome)
        else {
            panic!("expected motion events");
        };
        assert!(f2 > f1);
        let state = simulator.snapshot(&actor("a")).await.unwrap();
        assert!((state.progress_m() - 40.0).abs() < 1e-9);

        assert_eq!(simulator.stop(&actor("a")), StopOutcome::Stopped);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }
}
