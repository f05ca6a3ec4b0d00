//! Bounded-size chunk processing over an ordered dataset
//!
//! A dataset is cut into contiguous slices in original order. Each slice is
//! handed to the caller's function with a memory reading on either side, and
//! a [`ChunkProgress`] event is emitted once the function returns. Chunks are
//! processed strictly one after another; the first failing chunk stops the
//! run and its error is returned as is.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::BenchError;
use crate::memory::MemoryProbe;

/// How a dataset of a given size splits into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub total_items: usize,
    pub chunk_size: usize,
    pub chunk_count: usize,
}

impl ChunkPlan {
    pub fn new(total_items: usize, chunk_size: usize) -> Result<Self, BenchError> {
        if chunk_size == 0 {
            return Err(BenchError::invalid_config(
                "chunk size must be greater than 0",
            ));
        }

        Ok(Self {
            total_items,
            chunk_size,
            chunk_count: total_items.div_ceil(chunk_size),
        })
    }

    /// Index range of chunk `index` within the dataset
    pub fn bounds(&self, index: usize) -> Option<std::ops::Range<usize>> {
        if index >= self.chunk_count {
            return None;
        }
        let start = index * self.chunk_size;
        let end = (start + self.chunk_size).min(self.total_items);
        Some(start..end)
    }

    pub fn ranges(&self) -> impl Iterator<Item = std::ops::Range<usize>> + '_ {
        (0..self.chunk_count).filter_map(move |i| self.bounds(i))
    }
}

/// Progress event emitted after every chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkProgress {
    /// Zero-based
    pub chunk_index: usize,
    pub chunk_count: usize,
    pub items_in_chunk: usize,
    pub elapsed_seconds: f64,
    pub memory_before_mb: f64,
    pub memory_after_mb: f64,
}

impl ChunkProgress {
    pub fn memory_delta_mb(&self) -> f64 {
        self.memory_after_mb - self.memory_before_mb
    }
}

/// Receiver of chunk progress events
///
/// Sinks observe; they have no way to influence the processing loop.
pub trait ProgressSink: Send + Sync {
    fn on_chunk(&self, progress: &ChunkProgress);
}

/// Logs every chunk through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_chunk(&self, progress: &ChunkProgress) {
        tracing::info!(
            chunk = progress.chunk_index + 1,
            chunks = progress.chunk_count,
            items = progress.items_in_chunk,
            "Chunk {}/{}: {} records in {:.1}s, memory: {:.1}MB -> {:.1}MB ({:+.1}MB)",
            progress.chunk_index + 1,
            progress.chunk_count,
            progress.items_in_chunk,
            progress.elapsed_seconds,
            progress.memory_before_mb,
            progress.memory_after_mb,
            progress.memory_delta_mb(),
        );
    }
}

/// Fan one event out to several sinks
pub struct CompositeProgress {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl CompositeProgress {
    pub fn new(sinks: Vec<Arc<dyn ProgressSink>>) -> Self {
        Self { sinks }
    }
}

impl ProgressSink for CompositeProgress {
    fn on_chunk(&self, progress: &ChunkProgress) {
        for sink in &self.sinks {
            sink.on_chunk(progress);
        }
    }
}

/// Outcome of a completed chunked run
#[derive(Debug, Clone)]
pub struct ChunkRun<R> {
    pub plan: ChunkPlan,
    pub results: Vec<R>,
    pub progress: Vec<ChunkProgress>,
}

/// Sequential chunked processing with memory sampling
#[derive(Clone)]
pub struct ChunkProcessor {
    probe: Arc<dyn MemoryProbe>,
    sink: Arc<dyn ProgressSink>,
}

impl ChunkProcessor {
    pub fn new(probe: Arc<dyn MemoryProbe>, sink: Arc<dyn ProgressSink>) -> Self {
        Self { probe, sink }
    }

    pub fn with_sink(&self, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            probe: self.probe.clone(),
            sink,
        }
    }

    /// Apply `per_chunk` to every chunk and collect its results in order
    pub fn process<T, R, E, F>(
        &self,
        dataset: &[T],
        chunk_size: usize,
        mut per_chunk: F,
    ) -> Result<ChunkRun<R>, E>
    where
        F: FnMut(&[T]) -> Result<R, E>,
        E: From<BenchError>,
    {
        let plan = ChunkPlan::new(dataset.len(), chunk_size)?;
        let mut results = Vec::with_capacity(plan.chunk_count);
        let mut progress = Vec::with_capacity(plan.chunk_count);

        for (index, range) in plan.ranges().enumerate() {
            let chunk = &dataset[range];
            let started = Instant::now();
            let memory_before_mb = self.probe.resident_mb();

            results.push(per_chunk(chunk)?);

            let event = self.record(&plan, index, chunk.len(), started, memory_before_mb);
            progress.push(event);
        }

        Ok(ChunkRun {
            plan,
            results,
            progress,
        })
    }

    /// Same as [`process`](Self::process) for functions that suspend
    ///
    /// Each chunk's future is awaited to completion before the next chunk is
    /// sliced; chunks never overlap in time.
    pub async fn process_async<'a, T, R, E, F, Fut>(
        &self,
        dataset: &'a [T],
        chunk_size: usize,
        mut per_chunk: F,
    ) -> Result<ChunkRun<R>, E>
    where
        F: FnMut(&'a [T]) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<BenchError>,
    {
        let plan = ChunkPlan::new(dataset.len(), chunk_size)?;
        let mut results = Vec::with_capacity(plan.chunk_count);
        let mut progress = Vec::with_capacity(plan.chunk_count);

        for (index, range) in plan.ranges().enumerate() {
            let chunk = &dataset[range];
            let started = Instant::now();
            let memory_before_mb = self.probe.resident_mb();

            results.push(per_chunk(chunk).await?);

            let event = self.record(&plan, index, chunk.len(), started, memory_before_mb);
            progress.push(event);
        }

        Ok(ChunkRun {
            plan,
            results,
            progress,
        })
    }

    /// Sequential async processing that lends `state` to every chunk
    ///
    /// Used when each chunk needs exclusive access to something the caller
    /// owns, such as a connected adapter. `per_chunk` also receives the
    /// dataset index of the chunk's first item.
    pub async fn process_with<'a, S, T, R, E, F>(
        &self,
        state: &mut S,
        dataset: &'a [T],
        chunk_size: usize,
        mut per_chunk: F,
    ) -> Result<ChunkRun<R>, E>
    where
        S: ?Sized,
        F: for<'s> FnMut(&'s mut S, usize, &'s [T]) -> BoxFuture<'s, Result<R, E>>,
        E: From<BenchError>,
    {
        let plan = ChunkPlan::new(dataset.len(), chunk_size)?;
        let mut results = Vec::with_capacity(plan.chunk_count);
        let mut progress = Vec::with_capacity(plan.chunk_count);

        for (index, range) in plan.ranges().enumerate() {
            let first = range.start;
            let chunk = &dataset[range];
            let started = Instant::now();
            let memory_before_mb = self.probe.resident_mb();

            results.push(per_chunk(&mut *state, first, chunk).await?);

            let event = self.record(&plan, index, chunk.len(), started, memory_before_mb);
            progress.push(event);
        }

        Ok(ChunkRun {
            plan,
            results,
            progress,
        })
    }

    fn record(
        &self,
        plan: &ChunkPlan,
        index: usize,
        items: usize,
        started: Instant,
        memory_before_mb: f64,
    ) -> ChunkProgress {
        let event = ChunkProgress {
            chunk_index: index,
            chunk_count: plan.chunk_count,
            items_in_chunk: items,
            elapsed_seconds: started.elapsed().as_secs_f64(),
            memory_before_mb,
            memory_after_mb: self.probe.resident_mb(),
        };
        self.sink.on_chunk(&event);
        event
    }
}
