use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{anyhow, Result};
use tokio::sync::{oneshot, Mutex};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{
    camera::{with_stream, SharedStream},
    config::ScannerConfig,
    decoder::{FrameSource, ProbedBackends, ScanHit},
    frame::Frame,
    state::{ScanEvent, ScanStatus},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Everything one session task needs.
pub struct LoopContext {
    pub session_id: String,
    pub stream: SharedStream,
    pub backends: ProbedBackends,
    pub status: Arc<Mutex<ScanStatus>>,
    pub config: ScannerConfig,
    pub cancel_token: CancellationToken,
    pub in_flight: Arc<AtomicBool>,
    pub result_tx: Option<oneshot::Sender<ScanHit>>,
}

/// Holds the per-session in-flight flag for the duration of one attempt.
struct AttemptGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> AttemptGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Screenshot-driven acquisition: one attempt per poll tick.
pub async fn polled_capture_loop(mut ctx: LoopContext) {
    log_info!("polled capture started for session {}", ctx.session_id);
    let hit = run_polled(&ctx).await;
    finish(&mut ctx, hit).await;
}

/// Live-frame decoding on every frame tick, with a canvas retry from the
/// stall-recovery timer.
pub async fn continuous_decode_loop(mut ctx: LoopContext) {
    log_info!("continuous decoding started for session {}", ctx.session_id);
    let hit = run_continuous(&ctx).await;
    finish(&mut ctx, hit).await;
}

async fn run_polled(ctx: &LoopContext) -> Option<ScanHit> {
    let mut ticker = tokio::time::interval(ctx.config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancel_token.cancelled() => return None,
            _ = ticker.tick() => {
                match polled_attempt(ctx).await {
                    Ok(Some(hit)) => return Some(hit),
                    Ok(None) => {}
                    Err(err) => {
                        log_warn!("capture attempt failed for session {}: {err:#}", ctx.session_id);
                        record_miss(ctx).await;
                    }
                }
            }
        }
    }
}

async fn run_continuous(ctx: &LoopContext) -> Option<ScanHit> {
    let mut frame_ticker = tokio::time::interval(ctx.config.frame_interval);
    frame_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stall_ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + ctx.config.stall_interval,
        ctx.config.stall_interval,
    );
    stall_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancel_token.cancelled() => return None,
            _ = frame_ticker.tick() => {
                match frame_attempt(ctx).await {
                    Ok(Some(hit)) => return Some(hit),
                    Ok(None) => {}
                    Err(err) => log_debug!("live decode failed for session {}: {err:#}", ctx.session_id),
                }
            }
            _ = stall_ticker.tick() => {
                match stall_recovery(ctx).await {
                    Ok(Some(hit)) => return Some(hit),
                    Ok(None) => {}
                    Err(err) => {
                        log_warn!("stall recovery failed for session {}: {err:#}", ctx.session_id);
                        record_miss(ctx).await;
                    }
                }
            }
        }
    }
}

/// One polled cycle. `Ok(None)` covers both skipped cycles and misses; misses
/// are recorded here.
async fn polled_attempt(ctx: &LoopContext) -> Result<Option<ScanHit>> {
    if !accepts_attempts(ctx).await {
        return Ok(None);
    }
    let Some(_guard) = AttemptGuard::acquire(&ctx.in_flight) else {
        return Ok(None);
    };

    let (width, height) = (ctx.config.screenshot_width, ctx.config.screenshot_height);
    let screenshot = camera_call(ctx, move |stream| stream.screenshot(width, height)).await?;
    if ctx.cancel_token.is_cancelled() {
        return Ok(None);
    }
    let Some(screenshot) = screenshot else {
        log_debug!("no screenshot available; skipping cycle");
        return Ok(None);
    };

    if !begin_attempt(ctx, ScanEvent::FrameTick).await {
        return Ok(None);
    }

    // Live frame first, the still as fallback. A failed grab counts as no frame.
    let live = match camera_call(ctx, |stream| stream.grab_frame()).await {
        Ok(frame) => frame,
        Err(err) => {
            log_debug!("live frame unavailable for session {}: {err:#}", ctx.session_id);
            None
        }
    };
    if let Some(live) = live {
        if ctx.cancel_token.is_cancelled() {
            return Ok(None);
        }
        if let Some(hit) = detect(ctx, live, FrameSource::Live).await {
            return Ok(Some(hit));
        }
    }
    if ctx.cancel_token.is_cancelled() {
        return Ok(None);
    }

    let still = screenshot.fit_within(width, height);
    if let Some(hit) = detect(ctx, still, FrameSource::Still).await {
        return Ok(Some(hit));
    }

    if !ctx.cancel_token.is_cancelled() {
        record_miss(ctx).await;
    }
    Ok(None)
}

async fn frame_attempt(ctx: &LoopContext) -> Result<Option<ScanHit>> {
    if !accepts_attempts(ctx).await {
        return Ok(None);
    }
    let Some(_guard) = AttemptGuard::acquire(&ctx.in_flight) else {
        return Ok(None);
    };
    if !begin_attempt(ctx, ScanEvent::FrameTick).await {
        return Ok(None);
    }

    let frame = camera_call(ctx, |stream| stream.grab_frame()).await?;
    if ctx.cancel_token.is_cancelled() {
        return Ok(None);
    }
    match frame {
        Some(frame) => Ok(detect(ctx, frame, FrameSource::Live).await),
        None => Ok(None),
    }
}

/// Stall-recovery tick: a canvas decode when due. A tick that ends without a
/// result counts as one failed cycle.
async fn stall_recovery(ctx: &LoopContext) -> Result<Option<ScanHit>> {
    let attempts = {
        let mut status = ctx.status.lock().await;
        if !status.accepts_attempts(&ctx.session_id) {
            return Ok(None);
        }
        status.transition(ScanEvent::StallTimeout);
        status.attempts
    };

    if ctx.config.stall_due(attempts) {
        let Some(_guard) = AttemptGuard::acquire(&ctx.in_flight) else {
            return Ok(None);
        };
        log_debug!("stall recovery at attempt {attempts}");

        let frame = camera_call(ctx, |stream| stream.grab_frame()).await?;
        if ctx.cancel_token.is_cancelled() {
            return Ok(None);
        }
        if let Some(frame) = frame {
            if let Some(hit) = detect(ctx, frame, FrameSource::Canvas).await {
                return Ok(Some(hit));
            }
        }
    }

    if !ctx.cancel_token.is_cancelled() {
        record_miss(ctx).await;
    }
    Ok(None)
}

async fn detect(ctx: &LoopContext, frame: Frame, source: FrameSource) -> Option<ScanHit> {
    ctx.backends
        .detect(Arc::new(frame), source, &ctx.cancel_token)
        .await
}

async fn camera_call<F, T>(ctx: &LoopContext, call: F) -> Result<T>
where
    F: FnOnce(&mut dyn super::camera::VideoStream) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let timeout: Duration = ctx.config.step_timeout;
    tokio::time::timeout(timeout, with_stream(&ctx.stream, call))
        .await
        .map_err(|_| anyhow!("camera call timed out after {}ms", timeout.as_millis()))?
}

async fn accepts_attempts(ctx: &LoopContext) -> bool {
    ctx.status.lock().await.accepts_attempts(&ctx.session_id)
}

/// Count an attempt, unless the session stopped accepting them meanwhile.
async fn begin_attempt(ctx: &LoopContext, event: ScanEvent) -> bool {
    let mut status = ctx.status.lock().await;
    if !status.accepts_attempts(&ctx.session_id) {
        return false;
    }
    status.transition(event);
    status.attempts = status.attempts.saturating_add(1);
    true
}

async fn record_miss(ctx: &LoopContext) {
    let mut status = ctx.status.lock().await;
    if status.session_id.as_deref() == Some(ctx.session_id.as_str()) {
        status.record_miss(ctx.config.failure_hint_after);
    }
}

/// Tear the session down, then deliver the hit if there is one and the
/// session was not cancelled meanwhile.
async fn finish(ctx: &mut LoopContext, hit: Option<ScanHit>) {
    let deliver = {
        let mut status = ctx.status.lock().await;
        let owned = status.session_id.as_deref() == Some(ctx.session_id.as_str());
        let deliver = match hit {
            Some(hit) if owned && !ctx.cancel_token.is_cancelled() => {
                status.record_hit(hit.clone());
                status.transition(ScanEvent::Result);
                Some(hit)
            }
            _ => {
                if owned {
                    status.transition(ScanEvent::Cancel);
                }
                None
            }
        };
        ctx.backends.reset();
        if owned {
            status.settle();
        }
        deliver
    };

    match (deliver, ctx.result_tx.take()) {
        (Some(hit), Some(tx)) => {
            log_info!("session {} resolved {}", ctx.session_id, hit.text);
            if tx.send(hit).is_err() {
                log_debug!("scan result receiver dropped for session {}", ctx.session_id);
            }
        }
        _ => log_info!("session {} ended without a result", ctx.session_id),
    }
}
