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
//! Prefetches a chain on a fill thread into a ring buffer so the device callback only copies
//! samples and never decodes or resamples.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use super::error::SampleSourceError;
use super::traits::{prepare_output, SampleSource};

/// Frames the fill thread pulls from the chain per batch.
const FILL_BATCH_FRAMES: usize = 1024;

/// Ring capacity in frames. Gain is applied after the buffer, so this only adds start latency.
const CAPACITY_FRAMES: usize = FILL_BATCH_FRAMES * 8;

struct RingState {
    /// Planar ring storage, one Vec of `CAPACITY_FRAMES` per channel.
    data: Vec<Vec<f32>>,
    read_index: usize,
    len_frames: usize,
    /// The chain is exhausted or failed. What is left in the ring is the end of the stream.
    finished: bool,
    /// The consumer went away; the fill thread exits.
    closed: bool,
}

impl RingState {
    fn push(&mut self, chunk: &[Vec<f32>], frames: usize) {
        let write_index = (self.read_index + self.len_frames) % CAPACITY_FRAMES;
        for (ring, samples) in self.data.iter_mut().zip(chunk.iter()) {
            for (i, sample) in samples[..frames].iter().enumerate() {
                ring[(write_index + i) % CAPACITY_FRAMES] = *sample;
            }
        }
        self.len_frames += frames;
    }

    fn pop_into(&mut self, output: &mut [Vec<f32>], frames: usize) {
        for (ring, out) in self.data.iter().zip(output.iter_mut()) {
            let first = frames.min(CAPACITY_FRAMES - self.read_index);
            out.extend_from_slice(&ring[self.read_index..self.read_index + first]);
            out.extend_from_slice(&ring[..frames - first]);
        }
        self.read_index = (self.read_index + frames) % CAPACITY_FRAMES;
        self.len_frames -= frames;
    }
}

struct Ring {
    state: Mutex<RingState>,
    /// Signalled when the consumer frees room or closes.
    space: Condvar,
    /// Signalled when the fill thread adds frames or finishes.
    ready: Condvar,
}

/// Buffered wrapper for a chain. The consumer side only copies out of the ring; running dry
/// before the chain ends produces silence instead of ending the stream.
pub struct BufferedSource {
    ring: Arc<Ring>,
    fill: Option<thread::JoinHandle<()>>,
    channels: u16,
    sample_rate: u32,
    duration: Option<Duration>,
}

impl BufferedSource {
    /// Starts the fill thread and waits until one batch is buffered or the chain ends. Call from
    /// a thread that may block.
    pub fn new(source: Box<dyn SampleSource>) -> Result<BufferedSource, SampleSourceError> {
        let channels = source.channel_count();
        let sample_rate = source.sample_rate();
        let duration = source.duration();

        let ring = Arc::new(Ring {
            state: Mutex::new(RingState {
                data: vec![vec![0.0; CAPACITY_FRAMES]; channels as usize],
                read_index: 0,
                len_frames: 0,
                finished: false,
                closed: false,
            }),
            space: Condvar::new(),
            ready: Condvar::new(),
        });

        let fill = {
            let ring = ring.clone();
            thread::Builder::new()
                .name("keycue-fill".to_string())
                .spawn(move || fill(source, ring))?
        };

        {
            let mut state = ring.state.lock();
            while !state.finished && state.len_frames < FILL_BATCH_FRAMES {
                ring.ready.wait(&mut state);
            }
        }

        Ok(BufferedSource {
            ring,
            fill: Some(fill),
            channels,
            sample_rate,
            duration,
        })
    }
}

fn fill(mut source: Box<dyn SampleSource>, ring: Arc<Ring>) {
    let mut chunk = vec![Vec::new(); source.channel_count() as usize];
    loop {
        {
            let mut state = ring.state.lock();
            while !state.closed && CAPACITY_FRAMES - state.len_frames < FILL_BATCH_FRAMES {
                ring.space.wait(&mut state);
            }
            if state.closed {
                return;
            }
        }

        // No lock held while the chain decodes.
        let read = match source.next_chunk(&mut chunk, FILL_BATCH_FRAMES) {
            Ok(read) => read,
            Err(e) => {
                error!(err = e.to_string(), "Error filling buffer");
                0
            }
        };

        let mut state = ring.state.lock();
        if read == 0 {
            state.finished = true;
            ring.ready.notify_all();
            debug!("Buffer fill finished");
            return;
        }
        state.push(&chunk, read);
        ring.ready.notify_all();
    }
}

impl SampleSource for BufferedSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        prepare_output(output, self.channels)?;

        let mut state = self.ring.state.lock();
        if state.len_frames == 0 {
            if state.finished {
                return Ok(0);
            }
            // Underrun: keep the stream alive with silence until the fill thread catches up.
            for out in output.iter_mut() {
                out.resize(max_frames, 0.0);
            }
            return Ok(max_frames);
        }

        let frames = state.len_frames.min(max_frames);
        state.pop_into(output, frames);
        drop(state);
        self.ring.space.notify_one();
        Ok(frames)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

impl Drop for BufferedSource {
    fn drop(&mut self) {
        self.ring.state.lock().closed = true;
        self.ring.space.notify_all();
        if let Some(fill) = self.fill.take() {
            if fill.join().is_err() {
                error!("Buffer fill thread panicked");
            }
        }
    }
}
