//! The engine handle: owns the in-memory session, runs it through the state
//! machine and carries out the effects (checkpoints, notifications, defaults).
//!
//! All mutation goes through `&mut WorkoutEngine`. Hosts that share the
//! engine with the tick driver wrap it in [`SharedEngine`], which serializes
//! ticks and user actions in arrival order.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use super::{
    gate::{self, BlockReason, CompletionVerdict},
    lifecycle::{Initialized, LifecycleManager},
    machine::{self, EngineState, Effect, Event, RestPolicy},
};
use crate::{
    clock::seconds_between,
    error::{EngineError, Result},
    lookup::{PerformanceLookup, SafeDefaults, SetDefaults, seed_defaults},
    models::{ActiveWorkoutSession, FinishedWorkout, RestMode, RoutinePlan},
};

pub type SharedEngine = Arc<Mutex<WorkoutEngine>>;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineSettings {
    pub rest: RestPolicy,
    pub safe_defaults: SafeDefaults,
}

/// Everything an engine needs besides the session itself.
#[derive(Clone)]
pub struct EngineContext {
    pub lifecycle: LifecycleManager,
    pub lookup: Arc<dyn PerformanceLookup>,
    pub settings: EngineSettings,
}

/// What the rest display should show right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RestView {
    None,
    Fixed { remaining: u32, elapsed: u32 },
    Infinite { elapsed: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Tick(RestView),
    RestFinished,
    /// The session was completed or cancelled.
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Finished(FinishedWorkout),
    Blocked {
        reason: BlockReason,
        overridable: bool,
    },
}

pub struct WorkoutEngine {
    session: ActiveWorkoutSession,
    ctx: EngineContext,
    defaults: Option<SetDefaults>,
    active: bool,
    notices: Option<mpsc::UnboundedSender<Notice>>,
}

impl WorkoutEngine {
    /// Resumes the stored session for `routine` or starts a fresh one.
    pub async fn start(
        ctx: EngineContext,
        routine: RoutinePlan,
        owner: &str,
    ) -> Result<(Self, bool)> {
        let init = ctx.lifecycle.initialize(routine, owner).await?;
        let resumed = init.is_resumed();
        Ok((Self::with_session(ctx, init).await, resumed))
    }

    /// Picks up whatever session `owner` has in progress.
    pub async fn resume(ctx: EngineContext, owner: &str) -> Result<Option<Self>> {
        match ctx.lifecycle.resume_active(owner).await? {
            Some(s) => Ok(Some(
                Self::with_session(ctx, Initialized::Resumed(s)).await,
            )),
            None => Ok(None),
        }
    }

    /// Starts over, throwing away any resumable session.
    pub async fn restart(ctx: EngineContext, routine: RoutinePlan, owner: &str) -> Result<Self> {
        let s = ctx.lifecycle.discard_and_restart(routine, owner).await?;
        Ok(Self::with_session(ctx, Initialized::Fresh(s)).await)
    }

    async fn with_session(ctx: EngineContext, init: Initialized) -> Self {
        let mut engine = Self {
            session: init.into_session(),
            ctx,
            defaults: None,
            active: true,
            notices: None,
        };
        engine.refresh_defaults().await;
        engine
    }

    pub fn into_shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    pub fn session(&self) -> &ActiveWorkoutSession {
        &self.session
    }

    pub fn state(&self) -> EngineState {
        EngineState::of(&self.session)
    }

    pub fn defaults(&self) -> Option<SetDefaults> {
        self.defaults
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.ctx.lifecycle.store().now()
    }

    /// Registers the single notice listener, replacing any previous one.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Notice> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.notices = Some(tx);
        rx
    }

    pub fn rest_view(&self) -> RestView {
        match self.session.rest_mode {
            RestMode::None => RestView::None,
            RestMode::Fixed {
                remaining_seconds,
                elapsed_seconds,
            } => RestView::Fixed {
                remaining: remaining_seconds,
                elapsed: elapsed_seconds,
            },
            RestMode::Infinite { started_at } => RestView::Infinite {
                elapsed: seconds_between(started_at, self.now()),
            },
        }
    }

    /// Runs `event` through the state machine and drains its effects. On a
    /// rejected event nothing changes. A failed checkpoint is logged and the
    /// in-memory transition stands.
    pub async fn dispatch(&mut self, event: Event) -> Result<Vec<Effect>> {
        if !self.active {
            return Err(EngineError::Inactive);
        }

        let transition = machine::apply(&self.session, event, self.now(), &self.ctx.settings.rest)?;
        self.session = transition.session;

        for effect in &transition.effects {
            match effect {
                Effect::Persist => self.checkpoint().await,
                Effect::NotifyRestFinished => self.notify(Notice::RestFinished),
                Effect::SeedDefaults => self.refresh_defaults().await,
                Effect::ReadyForCompletion => {
                    debug!(session_id = %self.session.id, "last exercise done")
                }
            }
        }
        Ok(transition.effects)
    }

    pub async fn log_set(&mut self, weight: f64, reps: u32) -> Result<Vec<Effect>> {
        self.dispatch(Event::LogSet { weight, reps }).await
    }

    pub async fn advance_exercise(&mut self) -> Result<Vec<Effect>> {
        self.dispatch(Event::AdvanceExercise).await
    }

    pub async fn repeat_set(&mut self) -> Result<Vec<Effect>> {
        self.dispatch(Event::RepeatSet).await
    }

    pub async fn skip_rest(&mut self) -> Result<Vec<Effect>> {
        self.dispatch(Event::Skip).await
    }

    pub async fn adjust_rest(&mut self, delta_seconds: i64) -> Result<Vec<Effect>> {
        self.dispatch(Event::Adjust { delta_seconds }).await
    }

    pub async fn enter_infinite_rest(&mut self) -> Result<Vec<Effect>> {
        self.dispatch(Event::EnterInfiniteRest).await
    }

    pub async fn exit_infinite_rest(&mut self) -> Result<Vec<Effect>> {
        self.dispatch(Event::ExitInfiniteRest).await
    }

    pub async fn move_to_exercise(&mut self, index: usize) -> Result<Vec<Effect>> {
        self.dispatch(Event::MoveToExercise { index }).await
    }

    pub async fn annotate(&mut self, notes: Option<String>) -> Result<Vec<Effect>> {
        self.dispatch(Event::Annotate { notes }).await
    }

    /// One beat of the 1 Hz driver.
    pub async fn tick(&mut self) -> Result<Vec<Effect>> {
        let effects = self.dispatch(Event::Tick).await?;
        self.notify(Notice::Tick(self.rest_view()));
        Ok(effects)
    }

    pub fn evaluate_completion(&self) -> CompletionVerdict {
        gate::evaluate(&self.session, self.now())
    }

    /// Finishes the session if the gate allows it. Soft blocks pass only
    /// with `override_soft`; hard blocks never do.
    pub async fn complete(
        &mut self,
        override_soft: bool,
        notes: Option<String>,
    ) -> Result<CompletionOutcome> {
        if !self.active {
            return Err(EngineError::Inactive);
        }

        let now = self.now();
        let verdict = gate::evaluate(&self.session, now);
        match verdict {
            CompletionVerdict::SoftBlock(reason) | CompletionVerdict::HardBlock(reason)
                if !verdict.permits(override_soft) =>
            {
                return Ok(CompletionOutcome::Blocked {
                    reason,
                    overridable: reason.overridable(),
                });
            }
            CompletionVerdict::SoftBlock(reason) => {
                info!(session_id = %self.session.id, reason = ?reason, "soft completion block overridden");
            }
            _ => {}
        }

        let workout = gate::finalize(&self.session, now, notes);
        if let Err(e) = self.ctx.lifecycle.clear().await {
            warn!(session_id = %self.session.id, error = %e, "failed to clear finished session");
        }
        self.stop();
        info!(
            session_id = %self.session.id,
            workout_id = %workout.id,
            minutes = workout.duration_minutes,
            sets = workout.total_sets(),
            "session completed"
        );
        Ok(CompletionOutcome::Finished(workout))
    }

    /// Drops the session without producing a workout. The host is expected
    /// to have confirmed this with the user.
    pub async fn cancel(&mut self) -> Result<()> {
        if !self.active {
            return Err(EngineError::Inactive);
        }
        self.ctx.lifecycle.clear().await?;
        self.stop();
        info!(session_id = %self.session.id, "session cancelled");
        Ok(())
    }

    /// Flushes per-tick state the checkpoints skip. Called when the host goes away.
    pub async fn suspend(&mut self) {
        if self.active {
            self.checkpoint().await;
        }
    }

    async fn checkpoint(&mut self) {
        if let Err(e) = self.ctx.lifecycle.checkpoint(&mut self.session).await {
            warn!(session_id = %self.session.id, error = %e, "checkpoint failed, keeping in-memory state");
        }
    }

    async fn refresh_defaults(&mut self) {
        self.defaults = match self.session.current_plan() {
            Some(plan) => Some(
                seed_defaults(self.ctx.lookup.as_ref(), plan, self.ctx.settings.safe_defaults).await,
            ),
            None => None,
        };
    }

    fn notify(&self, notice: Notice) {
        if let Some(tx) = &self.notices {
            // A dropped receiver just means nobody is watching.
            let _ = tx.send(notice);
        }
    }

    fn stop(&mut self) {
        self.active = false;
        self.notify(Notice::Stopped);
        self.notices = None;
    }
}

/// The running 1 Hz driver. Dropping the handle stops it.
pub struct TickHandle {
    handle: JoinHandle<()>,
}

impl TickHandle {
    pub fn stop(self) {}

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawns the tick driver. It exits on its own once the session is no
/// longer active.
pub fn spawn_ticker(engine: SharedEngine) -> TickHandle {
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let mut engine = engine.lock().await;
            if !engine.is_active() {
                break;
            }
            if let Err(e) = engine.tick().await {
                warn!(error = %e, "tick failed");
            }
        }
        debug!("tick driver stopped");
    });
    TickHandle { handle }
}
