// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Volume envelopes and the timers that bound a session's life.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};

use crate::audio::Gain;

/// Number of steps in a fade-in.
pub const FADE_IN_STEPS: u32 = 20;

/// Number of steps in a fade-out.
pub const FADE_OUT_STEPS: u32 = 16;

/// How often a playing session checks whether its outputs ran dry.
pub const COMPLETION_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The levels of a linear ramp, excluding the starting level. The last level is exactly `to`.
pub fn ramp_levels(from: f32, to: f32, steps: u32) -> Vec<f32> {
    let steps = steps.max(1);
    (1..=steps)
        .map(|step| {
            if step == steps {
                to
            } else {
                from + (to - from) * step as f32 / steps as f32
            }
        })
        .collect()
}

fn set_all(gains: &[Arc<Gain>], level: f32) {
    for gain in gains {
        gain.set(level);
    }
}

/// Ramps every gain from `from` to `to` over `duration` in evenly spaced steps. All gains
/// move together. A zero duration jumps straight to `to`.
pub async fn ramp(gains: &[Arc<Gain>], from: f32, to: f32, duration: Duration, steps: u32) {
    if duration.is_zero() {
        set_all(gains, to);
        return;
    }

    let levels = ramp_levels(from, to, steps);
    let step = duration / levels.len() as u32;
    let start = Instant::now();
    for (i, level) in levels.into_iter().enumerate() {
        sleep_until(start + step * (i as u32 + 1)).await;
        set_all(gains, level);
    }
}

/// Resolves once `finished` reports true, checking at the completion poll interval.
pub async fn wait_until<F>(finished: F)
where
    F: Fn() -> bool,
{
    while !finished() {
        sleep(COMPLETION_POLL_INTERVAL).await;
    }
}
