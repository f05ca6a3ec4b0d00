//! Instrumented execution of backend operations
//!
//! Both execution contracts go through the same [`Stopwatch`]: read the clock
//! and the process memory right before the operation is dispatched, read them
//! again once it has produced its result collection. For a blocking operation
//! the second reading happens when the call returns; for a cooperative one it
//! happens when the future completes, so time spent suspended at await points
//! is part of the measured cost.
//!
//! A failed operation yields its error untouched and no sample at all.

use std::future::{ready, Future, Ready};
use std::sync::Arc;
use std::time::Instant;

use crate::memory::{MemoryProbe, ProcessMemoryProbe};
use crate::sample::{ItemCount, MetricSample, OperationKind};

/// Operation output paired with the sample that measured it
#[derive(Debug, Clone)]
pub struct Measured<T> {
    pub sample: MetricSample,
    pub output: T,
}

impl<T> Measured<T> {
    pub fn into_parts(self) -> (MetricSample, T) {
        (self.sample, self.output)
    }
}

/// Readings bracketing one operation
struct Stopwatch<'p> {
    probe: &'p dyn MemoryProbe,
    started: Instant,
    memory_before: f64,
}

impl<'p> Stopwatch<'p> {
    fn start(probe: &'p dyn MemoryProbe) -> Self {
        let memory_before = probe.resident_mb();
        Self {
            probe,
            started: Instant::now(),
            memory_before,
        }
    }

    fn finish<C: ItemCount>(self, operation: OperationKind, output: C) -> Measured<C> {
        let elapsed = self.started.elapsed().as_secs_f64();
        let memory_after = self.probe.resident_mb();

        let sample = MetricSample::new(
            operation,
            output.item_count(),
            elapsed,
            memory_after - self.memory_before,
        );

        tracing::debug!(
            operation = %operation,
            items = sample.item_count,
            elapsed_s = sample.elapsed_seconds,
            memory_delta_mb = sample.memory_delta_mb,
            "Measured operation"
        );

        Measured { sample, output }
    }
}

/// An operation ready to be dispatched under measurement
///
/// Implemented by [`Blocking`] and [`Cooperative`], so callers hand either to
/// [`InstrumentedExecutor::measure`] without caring which one they hold.
pub trait Invocation {
    type Output: ItemCount;
    type Error;
    type Future: Future<Output = Result<Self::Output, Self::Error>>;

    fn dispatch(self) -> Self::Future;
}

/// Runs to completion on the calling thread when dispatched
pub struct Blocking<F>(pub F);

impl<F, C, E> Invocation for Blocking<F>
where
    F: FnOnce() -> Result<C, E>,
    C: ItemCount,
{
    type Output = C;
    type Error = E;
    type Future = Ready<Result<C, E>>;

    fn dispatch(self) -> Self::Future {
        ready((self.0)())
    }
}

/// Driven by the scheduler; may suspend before completing
pub struct Cooperative<Fut>(pub Fut);

impl<Fut, C, E> Invocation for Cooperative<Fut>
where
    Fut: Future<Output = Result<C, E>>,
    C: ItemCount,
{
    type Output = C;
    type Error = E;
    type Future = Fut;

    fn dispatch(self) -> Self::Future {
        self.0
    }
}

/// Wraps operations with timing and memory sampling
#[derive(Clone)]
pub struct InstrumentedExecutor {
    probe: Arc<dyn MemoryProbe>,
}

impl InstrumentedExecutor {
    pub fn new(probe: Arc<dyn MemoryProbe>) -> Self {
        Self { probe }
    }

    pub fn probe(&self) -> &Arc<dyn MemoryProbe> {
        &self.probe
    }

    /// Measure any invocation
    pub async fn measure<I: Invocation>(
        &self,
        operation: OperationKind,
        invocation: I,
    ) -> Result<Measured<I::Output>, I::Error> {
        let watch = Stopwatch::start(self.probe.as_ref());
        let output = invocation.dispatch().await?;
        Ok(watch.finish(operation, output))
    }

    /// Measure a blocking operation from synchronous code
    pub fn measure_blocking<F, C, E>(
        &self,
        operation: OperationKind,
        op: F,
    ) -> Result<Measured<C>, E>
    where
        F: FnOnce() -> Result<C, E>,
        C: ItemCount,
    {
        let watch = Stopwatch::start(self.probe.as_ref());
        let output = op()?;
        Ok(watch.finish(operation, output))
    }

    /// Measure a future, suspension time included
    pub async fn measure_cooperative<Fut, C, E>(
        &self,
        operation: OperationKind,
        fut: Fut,
    ) -> Result<Measured<C>, E>
    where
        Fut: Future<Output = Result<C, E>>,
        C: ItemCount,
    {
        self.measure(operation, Cooperative(fut)).await
    }
}

impl Default for InstrumentedExecutor {
    fn default() -> Self {
        Self::new(Arc::new(ProcessMemoryProbe::new()))
    }
}
