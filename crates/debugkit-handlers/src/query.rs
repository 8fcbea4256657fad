use debugkit_types::{ContextMode, Handler, HandlerCore, Result, format_timestamp, now};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const TYPE: &str = "query";

/// One profiled statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStep {
    pub query: String,
    pub params: Value,
    pub start: f64,
    pub finish: Option<f64>,
    pub elapsed: Option<f64>,
    pub errors: Vec<String>,
}

impl QueryStep {
    fn to_value(&self) -> Value {
        json!({
            "query": self.query,
            "params": self.params,
            "start": self.start,
            "finish": self.finish,
            "elapsed": self.elapsed,
            "errors": self.errors,
        })
    }

    fn to_text(&self) -> String {
        let mut out = format!(
            "{} [{}]\n",
            self.query,
            self.elapsed
                .map(|e| format!("{:.5} seconds", e))
                .unwrap_or_else(|| "running".to_string())
        );
        if !self.params.is_null() {
            out.push_str(&format!("\tParams: {}\n", self.params));
        }
        for error in &self.errors {
            out.push_str(&format!("\tError: {}\n", error));
        }
        out
    }
}

/// Query profiling capability a [`QueryHandler`] reports on.
///
/// Database layers implement this (or drive a [`QueryProfiler`]); the
/// handler only reads from it.
pub trait Profiler: Send + Sync {
    fn start(&self) -> Option<f64>;
    fn finish(&self) -> Option<f64>;
    fn elapsed(&self) -> Option<f64> {
        match (self.start(), self.finish()) {
            (Some(start), Some(finish)) => Some(finish - start),
            _ => None,
        }
    }
    fn steps(&self) -> Vec<QueryStep>;
}

#[derive(Debug, Default)]
struct ProfilerState {
    start: Option<f64>,
    finish: Option<f64>,
    steps: Vec<QueryStep>,
}

/// A recording [`Profiler`] callers drive around their own statements.
#[derive(Default)]
pub struct QueryProfiler {
    state: Mutex<ProfilerState>,
}

impl fmt::Debug for QueryProfiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryProfiler")
            .field("state", &*self.lock())
            .finish()
    }
}

impl QueryProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ProfilerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a step; the first step also starts the profile.
    pub fn begin(&self, query: impl Into<String>, params: Value) -> usize {
        self.begin_at(query, params, now())
    }

    pub fn begin_at(&self, query: impl Into<String>, params: Value, at: f64) -> usize {
        let mut state = self.lock();
        state.start.get_or_insert(at);
        state.steps.push(QueryStep {
            query: query.into(),
            params,
            start: at,
            finish: None,
            elapsed: None,
            errors: Vec::new(),
        });
        state.steps.len() - 1
    }

    pub fn end(&self, step: usize) {
        self.end_at(step, now());
    }

    pub fn end_at(&self, step: usize, at: f64) {
        if let Some(step) = self.lock().steps.get_mut(step) {
            step.finish = Some(at);
            step.elapsed = Some(at - step.start);
        }
    }

    pub fn add_error(&self, step: usize, error: impl Into<String>) {
        if let Some(step) = self.lock().steps.get_mut(step) {
            step.errors.push(error.into());
        }
    }

    pub fn finish_profile(&self) {
        self.finish_profile_at(now());
    }

    pub fn finish_profile_at(&self, at: f64) {
        self.lock().finish = Some(at);
    }
}

impl Profiler for QueryProfiler {
    fn start(&self) -> Option<f64> {
        self.lock().start
    }

    fn finish(&self) -> Option<f64> {
        self.lock().finish
    }

    fn steps(&self) -> Vec<QueryStep> {
        self.lock().steps.clone()
    }
}

/// Reports the statements recorded by an attached profiler.
pub struct QueryHandler {
    core: HandlerCore,
    profiler: Arc<dyn Profiler>,
}

impl fmt::Debug for QueryHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHandler")
            .field("core", &self.core)
            .field("steps", &self.profiler.steps().len())
            .finish()
    }
}

impl QueryHandler {
    pub fn new(profiler: Arc<dyn Profiler>) -> Self {
        Self {
            core: HandlerCore::new(),
            profiler,
        }
    }

    pub fn profiler(&self) -> &Arc<dyn Profiler> {
        &self.profiler
    }

    /// Mirror profiler timing into the handler, stopping it if the profile
    /// is still open.
    fn sync_timing(&mut self) {
        if let Some(start) = self.profiler.start() {
            self.core.start(Some(start));
        }
        match self.profiler.finish() {
            Some(finish) => self.core.stop(Some(finish)),
            None => self.core.ensure_stopped(),
        }
        if let Some(elapsed) = self.profiler.elapsed() {
            self.core.set_elapsed(elapsed);
        }
    }
}

impl Handler for QueryHandler {
    fn handler_type(&self) -> &'static str {
        TYPE
    }

    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn prepare(&mut self) -> Value {
        self.sync_timing();
        let steps: Vec<Value> = self.profiler.steps().iter().map(QueryStep::to_value).collect();

        json!({
            "start": self.core.start_time(),
            "finish": self.core.end_time(),
            "elapsed": self.core.elapsed(),
            "steps": steps,
        })
    }

    fn prepare_as_string(&mut self) -> String {
        self.sync_timing();

        let stamp = |ts: Option<f64>| ts.map(format_timestamp).unwrap_or_else(|| "-".to_string());
        let mut out = format!(
            "Start:\t\t{}\nFinish:\t\t{}\nElapsed:\t{}\n\nQueries:\n",
            stamp(self.core.start_time()),
            stamp(self.core.end_time()),
            self.core
                .elapsed()
                .map(|e| format!("{:.5} seconds", e))
                .unwrap_or_else(|| "-".to_string())
        );
        for step in self.profiler.steps() {
            out.push_str(&step.to_text());
        }
        out.push('\n');
        out
    }

    fn log(&mut self) -> Result<()> {
        let Some(target) = self.core.log_target(TYPE)? else {
            return Ok(());
        };

        self.sync_timing();
        let steps = self.profiler.steps();

        let Some(limit) = target.params.limit else {
            let message = format!(
                "{} queries executed in {:.5} second(s)",
                steps.len(),
                self.core.elapsed().unwrap_or(0.0)
            );
            let context = self.log_context(target.params.context);
            target.emit(&message, &context);
            return Ok(());
        };

        for step in &steps {
            let Some(elapsed) = step.elapsed else {
                continue;
            };
            if elapsed < limit {
                continue;
            }

            let message = format!(
                "Query exceeded the limit of {} second(s) by {:.5} second(s): {}",
                limit,
                elapsed - limit,
                step.query
            );
            let context = match target.params.context {
                ContextMode::Json => step.to_value(),
                ContextMode::Text => Value::String(step.to_text()),
            };
            target.emit(&message, &context);
        }

        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
