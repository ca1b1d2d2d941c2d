//! Frame sequencing: seeking with disposal-aware replay, delays, looping and
//! user input pauses.
//!
//! The player owns no timer. Every call that may schedule work takes the
//! current time as a [`Duration`] since an arbitrary origin and returns how
//! long to wait before calling [`Player::advance`] again.

use std::collections::VecDeque;
use std::time::Duration;

use log::{debug, error};

use crate::compositor::{Canvas, GlyphRasterizer, NoGlyphs, Rect};
use crate::document::{centiseconds, DelayPolicy, GifDocument};
use crate::parser::LoopCount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerOptions {
    /// Draw every frame on its own, without disposal chaining.
    pub raw: bool,
    /// Fill the canvas with the global background color before frame 0.
    pub render_background: bool,
    /// Keep zero delays instead of replacing them through `delay_policy`.
    pub strict_delays: bool,
    pub delay_policy: DelayPolicy,
}

impl PlayerOptions {
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    pub fn render_background(mut self, render_background: bool) -> Self {
        self.render_background = render_background;
        self
    }

    pub fn strict_delays(mut self, strict_delays: bool) -> Self {
        self.strict_delays = strict_delays;
        self
    }

    pub fn delay_policy(mut self, delay_policy: DelayPolicy) -> Self {
        self.delay_policy = delay_policy;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
    AwaitingUserInput,
}

/// Frame to seek to. Indexes wrap around the frame count in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekTarget {
    Index(i64),
    First,
    Last,
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The host signalled user input.
    Fulfilled,
    /// The frame delay ran out first.
    TimedOut,
    /// Playback was paused, stopped or replaced.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    Ready {
        frame_count: usize,
        width: u16,
        height: u16,
    },
    FrameChanged {
        index: usize,
        previous: Option<usize>,
    },
    PlaybackStarted,
    PlaybackPaused,
    PlaybackStopped,
    /// `delay` is `None` when only user input can end the wait.
    UserInputWaitStarted {
        delay: Option<Duration>,
    },
    UserInputWaitEnded(WaitOutcome),
}

/// How [`Player::play`] paces frames, decided once per play call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every frame has the same delay and none waits for input.
    Constant(Duration),
    Variable,
}

pub struct Player<C: Canvas> {
    canvas: C,
    glyphs: Box<dyn GlyphRasterizer + Send>,
    options: PlayerOptions,
    document: Option<GifDocument>,

    state: PlaybackState,
    current: usize,
    // index the canvas currently shows, None after a clear
    previous: Option<usize>,
    // frame whose disposal method is applied before the next draw
    last_drawn: Option<usize>,
    loops: u32,
    schedule: Option<Schedule>,
    deadline: Option<Duration>,

    events: VecDeque<PlayerEvent>,
}

impl<C: Canvas> Player<C> {
    pub fn new(canvas: C) -> Self {
        Self::with_options(canvas, PlayerOptions::default())
    }

    pub fn with_options(canvas: C, options: PlayerOptions) -> Self {
        Self {
            canvas,
            glyphs: Box::new(NoGlyphs),
            options,
            document: None,
            state: PlaybackState::Stopped,
            current: 0,
            previous: None,
            last_drawn: None,
            loops: 0,
            schedule: None,
            deadline: None,
            events: VecDeque::new(),
        }
    }

    pub fn set_glyph_rasterizer(&mut self, glyphs: impl GlyphRasterizer + Send + 'static) {
        self.glyphs = Box::new(glyphs);
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn options(&self) -> &PlayerOptions {
        &self.options
    }

    pub fn document(&self) -> Option<&GifDocument> {
        self.document.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.document.is_some()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing | PlaybackState::AwaitingUserInput)
    }

    pub fn current_frame(&self) -> usize {
        self.current
    }

    pub fn frame_count(&self) -> usize {
        self.document.as_ref().map_or(0, GifDocument::frame_count)
    }

    /// Completed passes since the last [`Player::play`].
    pub fn loops(&self) -> u32 {
        self.loops
    }

    pub fn schedule(&self) -> Option<Schedule> {
        self.schedule
    }

    /// Time at which [`Player::advance`] has work to do.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn take_events(&mut self) -> Vec<PlayerEvent> {
        self.events.drain(..).collect()
    }

    /// Replaces the current document, resizes the canvas and shows frame 0.
    pub fn load(&mut self, document: GifDocument) {
        self.unload();

        let (width, height) = (document.width(), document.height());
        self.canvas.resize(width.into(), height.into());
        self.clear();

        self.events.push_back(PlayerEvent::Ready {
            frame_count: document.frame_count(),
            width,
            height,
        });
        self.document = Some(document);

        self.update(true);
    }

    /// Cancels any pending wait and drops the document.
    pub fn unload(&mut self) {
        if self.state == PlaybackState::AwaitingUserInput {
            self.events
                .push_back(PlayerEvent::UserInputWaitEnded(WaitOutcome::Cancelled));
        }

        self.document = None;
        self.state = PlaybackState::Stopped;
        self.deadline = None;
        self.schedule = None;
        self.current = 0;
        self.previous = None;
        self.last_drawn = None;
        self.loops = 0;
    }

    /// Starts playback from the current frame. Returns the delay until the
    /// next [`Player::advance`].
    pub fn play(&mut self, now: Duration) -> Option<Duration> {
        if self.frame_count() <= 1 || self.is_playing() {
            return self.next_delay(now);
        }

        let schedule = self.compute_schedule();
        self.schedule = Some(schedule);
        self.loops = 0;

        if schedule == Schedule::Constant(Duration::ZERO) {
            // nothing to animate, show where the animation would end
            debug!("all frame delays are zero, showing the last frame");
            self.seek(SeekTarget::Last);
            return None;
        }

        self.state = PlaybackState::Playing;
        self.events.push_back(PlayerEvent::PlaybackStarted);
        self.schedule_next(now, None);

        self.next_delay(now)
    }

    /// Called when the deadline has passed. Shows the next frame and
    /// schedules the one after.
    pub fn advance(&mut self, now: Duration) -> Option<Duration> {
        let deadline_was = match self.deadline {
            Some(deadline) if now >= deadline => deadline,
            _ => return self.next_delay(now),
        };
        self.deadline = None;

        match self.state {
            PlaybackState::Playing => {
                if self.play_next() {
                    self.schedule_next(now, Some(deadline_was));
                }
            }
            PlaybackState::AwaitingUserInput => {
                self.end_wait(WaitOutcome::TimedOut, now);
            }
            PlaybackState::Stopped | PlaybackState::Paused => {}
        }

        self.next_delay(now)
    }

    /// Ends a user input wait as fulfilled. No-op when not waiting.
    pub fn user_input(&mut self, now: Duration) -> Option<Duration> {
        if self.state == PlaybackState::AwaitingUserInput {
            self.deadline = None;
            self.end_wait(WaitOutcome::Fulfilled, now);
        }

        self.next_delay(now)
    }

    pub fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }

        self.cancel();
        self.state = PlaybackState::Paused;
        self.events.push_back(PlayerEvent::PlaybackPaused);
    }

    /// Halts playback and rewinds to frame 0.
    pub fn stop(&mut self) {
        if self.document.is_none() {
            return;
        }

        if self.state != PlaybackState::Stopped {
            self.cancel();
            self.state = PlaybackState::Stopped;
            self.events.push_back(PlayerEvent::PlaybackStopped);
        }

        self.seek(SeekTarget::First);
    }

    pub fn toggle(&mut self, now: Duration) -> Option<Duration> {
        if self.is_playing() {
            self.pause();
            None
        } else {
            self.play(now)
        }
    }

    /// Moves to `target` and redraws. Moving backwards replays from frame 0,
    /// moving forwards replays only the frames in between.
    pub fn seek(&mut self, target: SeekTarget) {
        let frame_count = self.frame_count();
        if frame_count == 0 {
            return;
        }

        let last = frame_count as i64 - 1;
        let index = match target {
            SeekTarget::Index(index) => index,
            SeekTarget::First => 0,
            SeekTarget::Last => last,
            SeekTarget::Next => self.current as i64 + 1,
            SeekTarget::Previous => self.current as i64 - 1,
        };

        self.current = index.rem_euclid(frame_count as i64) as usize;
        self.update(true);
    }

    pub fn set_raw_mode(&mut self, raw: bool) {
        if self.options.raw != raw {
            self.options.raw = raw;
            self.redraw();
        }
    }

    pub fn set_background_render_mode(&mut self, render_background: bool) {
        if self.options.render_background != render_background {
            self.options.render_background = render_background;
            self.redraw();
        }
    }

    fn redraw(&mut self) {
        if self.document.is_none() {
            return;
        }

        self.clear();
        self.update(false);
    }

    fn compute_schedule(&self) -> Schedule {
        let Some(document) = &self.document else {
            return Schedule::Variable;
        };

        let first = document.frames.first().map_or(0, |frame| frame.delay_time());
        let constant = document
            .frames
            .iter()
            .all(|frame| frame.delay_time() == first && !frame.user_input());

        if constant {
            Schedule::Constant(self.resolved_delay(first))
        } else {
            Schedule::Variable
        }
    }

    fn resolved_delay(&self, delay: u16) -> Duration {
        match &self.document {
            Some(document) if !self.options.strict_delays => {
                centiseconds(self.options.delay_policy.resolve(delay, document))
            }
            _ => centiseconds(delay),
        }
    }

    // Sets the deadline for leaving the current frame. Constant delays count
    // from the deadline that just passed so a late wake-up does not drift.
    // Zero delays in variable mode are shown immediately.
    fn schedule_next(&mut self, now: Duration, deadline_was: Option<Duration>) {
        match self.schedule {
            Some(Schedule::Constant(delay)) => self.deadline = Some(deadline_was.unwrap_or(now) + delay),
            Some(Schedule::Variable) => loop {
                let Some(frame) = self.document.as_ref().and_then(|d| d.frame(self.current)) else {
                    return;
                };
                let (raw_delay, user_input) = (frame.delay_time(), frame.user_input());

                if user_input {
                    let delay = (raw_delay > 0).then(|| centiseconds(raw_delay));
                    self.state = PlaybackState::AwaitingUserInput;
                    self.deadline = delay.map(|delay| now + delay);
                    self.events
                        .push_back(PlayerEvent::UserInputWaitStarted { delay });
                    return;
                }

                let delay = self.resolved_delay(raw_delay);
                if delay > Duration::ZERO {
                    self.deadline = Some(now + delay);
                    return;
                }

                if !self.play_next() {
                    return;
                }
            },
            None => {}
        }
    }

    // Shows the next frame and accounts for the end of a pass. Returns false
    // once playback has finished.
    fn play_next(&mut self) -> bool {
        self.seek(SeekTarget::Next);

        let frame_count = self.frame_count();
        if self.current + 1 != frame_count {
            return true;
        }

        self.loops += 1;
        let finished = match self.document.as_ref().and_then(|d| d.loop_count) {
            None => true,
            Some(LoopCount::Number(count)) => self.loops >= u32::from(count),
            Some(LoopCount::Infinite) => false,
        };

        if finished {
            debug!("finished playback after {} pass(es)", self.loops);
            self.cancel();
            self.state = PlaybackState::Stopped;
            self.events.push_back(PlayerEvent::PlaybackStopped);
        }

        !finished
    }

    fn end_wait(&mut self, outcome: WaitOutcome, now: Duration) {
        self.events.push_back(PlayerEvent::UserInputWaitEnded(outcome));
        self.state = PlaybackState::Playing;

        if self.play_next() {
            self.schedule_next(now, None);
        }
    }

    fn cancel(&mut self) {
        if self.state == PlaybackState::AwaitingUserInput {
            self.events
                .push_back(PlayerEvent::UserInputWaitEnded(WaitOutcome::Cancelled));
        }
        self.deadline = None;
    }

    fn next_delay(&self, now: Duration) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_sub(now))
    }

    fn clear(&mut self) {
        let bounds = Rect::new(0, 0, self.canvas.width(), self.canvas.height());
        self.canvas.clear_rect(bounds);
        self.previous = None;
        self.last_drawn = None;
    }

    // Brings the canvas from `previous` to `current`.
    fn update(&mut self, notify: bool) {
        let current = self.current;
        if self.frame_count() == 0 || self.previous == Some(current) && !notify {
            return;
        }

        if notify && self.previous != Some(current) {
            self.events.push_back(PlayerEvent::FrameChanged {
                index: current,
                previous: self.previous,
            });
        }

        let first = if self.options.raw {
            self.clear();
            current
        } else {
            match self.previous {
                Some(previous) if current > previous => previous + 1,
                _ => 0,
            }
        };

        for index in first..=current {
            self.render(index);
        }

        self.previous = Some(current);
    }

    fn render(&mut self, index: usize) {
        let Some(document) = self.document.as_mut() else {
            return;
        };
        let canvas = &mut self.canvas;

        if !self.options.raw {
            if let Some(frame) = self.last_drawn.and_then(|last| document.frames.get(last)) {
                frame.repair(canvas);
            }
        }

        if index == 0 {
            let bounds = Rect::new(0, 0, canvas.width(), canvas.height());
            canvas.clear_rect(bounds);

            if self.options.render_background {
                if let Some(color) = document.header.background_color() {
                    canvas.fill_rect(bounds, color);
                }
            }
        }

        let GifDocument { header, frames, .. } = document;
        if let Some(frame) = frames.get_mut(index) {
            if let Err(err) = frame.blit(canvas, header, &mut *self.glyphs) {
                error!("failed to render frame {}: {}", index, err);
            }
        }

        self.last_drawn = Some(index);
    }
}
