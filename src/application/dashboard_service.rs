// Dashboard service - Session state, render supersession and auto-refresh
use crate::application::pipeline::{run_pipeline, PipelineError, PipelineOptions, PipelineReport};
use crate::application::telemetry_source::TelemetrySource;
use crate::domain::channel::{ChannelPatch, ChannelSpec};
use crate::domain::window::DateRange;
use chrono::FixedOffset;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Per-session state owned by the host, passed into every render.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub authenticated: bool,
    pub range: Option<DateRange>,
    pub options: PipelineOptions,
    pub channels: Vec<ChannelSpec>,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("session is not authenticated")]
    NotAuthenticated,
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    #[error("no date range selected for this session")]
    NoRangeSelected,
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Widget values sent with a render; unset fields keep the session's value.
#[derive(Debug, Clone, Default)]
pub struct OptionsUpdate {
    pub rolling_window: Option<usize>,
    pub show_raw: Option<bool>,
    pub show_rolling: Option<bool>,
    pub max_results: Option<u32>,
}

impl OptionsUpdate {
    fn apply(self, options: &mut PipelineOptions) {
        if let Some(w) = self.rolling_window {
            options.rolling_window = w;
        }
        if let Some(show) = self.show_raw {
            options.show_raw = show;
        }
        if let Some(show) = self.show_rolling {
            options.show_rolling = show;
        }
        if self.max_results.is_some() {
            options.max_results = self.max_results;
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub ticket: u64,
    pub report: Arc<PipelineReport>,
    /// False when a newer render started before this one finished.
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Rendered,
    SkippedInFlight,
    SkippedNoRange,
}

struct SessionSlot {
    context: RwLock<SessionContext>,
    /// Ticket of the most recently started render.
    started: AtomicU64,
    in_flight: AtomicUsize,
    latest: RwLock<Option<(u64, Arc<PipelineReport>)>>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

/// Decrements the session's in-flight count when the render ends.
struct FlightGuard<'a>(&'a AtomicUsize);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SessionSlot {
    fn new(context: SessionContext) -> Self {
        Self {
            context: RwLock::new(context),
            started: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            latest: RwLock::new(None),
            refresh_task: Mutex::new(None),
        }
    }

    fn enter(&self) -> FlightGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        FlightGuard(&self.in_flight)
    }

    /// Only succeeds when nothing else is rendering for this session.
    fn try_enter_exclusive(&self) -> Option<FlightGuard<'_>> {
        self.in_flight
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| FlightGuard(&self.in_flight))
    }
}

#[derive(Clone)]
pub struct DashboardService {
    source: Arc<dyn TelemetrySource>,
    default_channels: Vec<ChannelSpec>,
    default_options: PipelineOptions,
    display_offset: FixedOffset,
    sessions: Arc<RwLock<HashMap<String, Arc<SessionSlot>>>>,
}

impl DashboardService {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        default_channels: Vec<ChannelSpec>,
        default_options: PipelineOptions,
        display_offset: FixedOffset,
    ) -> Self {
        Self {
            source,
            default_channels,
            default_options,
            display_offset,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn authenticated_slot(&self, session_id: &str) -> Result<Arc<SessionSlot>, ServiceError> {
        let slot = self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or(ServiceError::NotAuthenticated)?;
        if !slot.context.read().await.authenticated {
            return Err(ServiceError::NotAuthenticated);
        }
        Ok(slot)
    }

    /// Mark the session as having passed the shared-secret gate. The only
    /// place a session is opened.
    pub async fn authenticate(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        let slot = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::info!("Opening session {}", session_id);
                Arc::new(SessionSlot::new(SessionContext {
                    session_id: session_id.to_string(),
                    authenticated: false,
                    range: None,
                    options: self.default_options.clone(),
                    channels: self.default_channels.clone(),
                }))
            })
            .clone();
        drop(sessions);
        slot.context.write().await.authenticated = true;
    }

    /// Close an authenticated session and stop its auto-refresh.
    pub async fn logout(&self, session_id: &str) -> Result<(), ServiceError> {
        self.authenticated_slot(session_id).await?;
        let removed = self.sessions.write().await.remove(session_id);
        if let Some(slot) = removed {
            if let Some(task) = slot.refresh_task.lock().await.take() {
                task.abort();
            }
            tracing::info!("Closed session {}", session_id);
        }
        Ok(())
    }

    pub async fn context(&self, session_id: &str) -> Result<SessionContext, ServiceError> {
        let slot = self.authenticated_slot(session_id).await?;
        let context = slot.context.read().await.clone();
        Ok(context)
    }

    /// Render with a new date range and widget values, recording both in the session.
    pub async fn render(
        &self,
        session_id: &str,
        range: DateRange,
        update: OptionsUpdate,
    ) -> Result<RenderOutcome, ServiceError> {
        let slot = self.authenticated_slot(session_id).await?;
        let _flight = slot.enter();

        let context = {
            let mut context = slot.context.write().await;
            let mut options = context.options.clone();
            update.apply(&mut options);
            options.validate().map_err(PipelineError::from)?;
            range.resolve(self.display_offset).map_err(PipelineError::from)?;
            context.range = Some(range);
            context.options = options;
            context.clone()
        };

        self.execute(&slot, context).await
    }

    /// One auto-refresh pass. Never overlaps another render of the same session.
    pub async fn refresh_tick(&self, session_id: &str) -> Result<TickOutcome, ServiceError> {
        let slot = self.authenticated_slot(session_id).await?;
        let Some(_flight) = slot.try_enter_exclusive() else {
            tracing::debug!("Skipping refresh for {}: render already in flight", session_id);
            return Ok(TickOutcome::SkippedInFlight);
        };

        let context = slot.context.read().await.clone();
        if context.range.is_none() {
            return Ok(TickOutcome::SkippedNoRange);
        }

        self.execute(&slot, context).await?;
        Ok(TickOutcome::Rendered)
    }

    /// Last-started-wins: a report is stored as latest only if no newer
    /// render started while it was running.
    async fn execute(
        &self,
        slot: &SessionSlot,
        context: SessionContext,
    ) -> Result<RenderOutcome, ServiceError> {
        let range = context.range.ok_or(ServiceError::NoRangeSelected)?;
        let ticket = slot.started.fetch_add(1, Ordering::SeqCst) + 1;

        let report = run_pipeline(
            self.source.as_ref(),
            &context.channels,
            range,
            &context.options,
            self.display_offset,
        )
        .await?;
        let report = Arc::new(report);

        let mut latest = slot.latest.write().await;
        let applied = slot.started.load(Ordering::SeqCst) == ticket;
        if applied {
            *latest = Some((ticket, report.clone()));
        } else {
            tracing::debug!(
                "Discarding superseded render {} for session {}",
                ticket,
                context.session_id
            );
        }

        Ok(RenderOutcome {
            ticket,
            report,
            applied,
        })
    }

    pub async fn latest(&self, session_id: &str) -> Result<Option<Arc<PipelineReport>>, ServiceError> {
        let slot = self.authenticated_slot(session_id).await?;
        let latest = slot.latest.read().await;
        Ok(latest.as_ref().map(|(_, report)| report.clone()))
    }

    pub async fn channels(&self, session_id: &str) -> Result<Vec<ChannelSpec>, ServiceError> {
        Ok(self.context(session_id).await?.channels)
    }

    pub async fn update_channel(
        &self,
        session_id: &str,
        channel_id: &str,
        patch: ChannelPatch,
    ) -> Result<ChannelSpec, ServiceError> {
        let slot = self.authenticated_slot(session_id).await?;
        let mut context = slot.context.write().await;
        let channel = context
            .channels
            .iter_mut()
            .find(|c| c.id == channel_id)
            .ok_or_else(|| ServiceError::UnknownChannel(channel_id.to_string()))?;

        channel.apply_patch(patch);
        tracing::info!("Session {} edited channel {}", session_id, channel_id);
        Ok(channel.clone())
    }

    /// Swap in a whole new channel registry for the session.
    pub async fn replace_channels(
        &self,
        session_id: &str,
        channels: Vec<ChannelSpec>,
    ) -> Result<usize, ServiceError> {
        let slot = self.authenticated_slot(session_id).await?;
        let mut context = slot.context.write().await;
        context.channels = channels;
        tracing::info!(
            "Session {} replaced channel registry ({} channels)",
            session_id,
            context.channels.len()
        );
        Ok(context.channels.len())
    }

    pub async fn set_threshold(
        &self,
        session_id: &str,
        channel_id: &str,
        value: f64,
    ) -> Result<(), ServiceError> {
        let slot = self.authenticated_slot(session_id).await?;
        let mut context = slot.context.write().await;
        if !context.channels.iter().any(|c| c.id == channel_id) {
            return Err(ServiceError::UnknownChannel(channel_id.to_string()));
        }
        context.options.thresholds.insert(channel_id.to_string(), value);
        Ok(())
    }

    /// Start (or restart) the periodic refresh for a session.
    pub async fn enable_auto_refresh(
        &self,
        session_id: &str,
        interval: Duration,
    ) -> Result<(), ServiceError> {
        let slot = self.authenticated_slot(session_id).await?;
        let service = self.clone();
        let id = session_id.to_string();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately; the manual render already covered it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match service.refresh_tick(&id).await {
                    Ok(outcome) => tracing::debug!("Auto-refresh for {}: {:?}", id, outcome),
                    Err(ServiceError::NotAuthenticated) => {
                        tracing::info!("Stopping auto-refresh for {}: session closed", id);
                        break;
                    }
                    Err(e) => tracing::warn!("Auto-refresh for {} failed: {}", id, e),
                }
            }
        });

        if let Some(previous) = slot.refresh_task.lock().await.replace(task) {
            previous.abort();
        }
        tracing::info!("Auto-refresh every {:?} for session {}", interval, session_id);
        Ok(())
    }

    pub async fn disable_auto_refresh(&self, session_id: &str) -> Result<bool, ServiceError> {
        let slot = self.authenticated_slot(session_id).await?;
        let task = slot.refresh_task.lock().await.take();
        Ok(match task {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        })
    }
}
