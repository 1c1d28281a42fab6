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
use std::time::Duration;

use super::error::SampleSourceError;
use super::traits::{Rewind, SampleSource};

/// Restarts the wrapped source whenever it reaches the end of its stream. The resulting source
/// never ends on its own unless the wrapped source is empty.
pub struct LoopingSource<S> {
    source: S,
    loops: u64,
}

impl<S> LoopingSource<S>
where
    S: SampleSource + Rewind,
{
    pub fn new(source: S) -> Self {
        Self { source, loops: 0 }
    }

    /// The number of times the source has been rewound.
    #[cfg(test)]
    pub fn loops(&self) -> u64 {
        self.loops
    }
}

impl<S> SampleSource for LoopingSource<S>
where
    S: SampleSource + Rewind,
{
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        let frames = self.source.next_chunk(output, max_frames)?;
        if frames > 0 || max_frames == 0 {
            return Ok(frames);
        }

        self.source.rewind()?;
        self.loops += 1;

        // An empty stream stays empty after a rewind; report the end rather than spinning.
        self.source.next_chunk(output, max_frames)
    }

    fn channel_count(&self) -> u16 {
        self.source.channel_count()
    }

    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    fn duration(&self) -> Option<Duration> {
        None
    }
}
