use debugkit_types::{Handler, HandlerCore, LogTarget, Result, format_size, format_timestamp, now};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::any::Any;

pub const TYPE: &str = "memory";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    pub bytes: u64,
    pub timestamp: f64,
}

/// Snapshots of resident and peak memory of the current process.
///
/// With `actual_bytes` unset (the default) prepared values are size strings
/// such as "12.40 MB"; otherwise raw byte counts.
#[derive(Debug, Default)]
pub struct MemoryHandler {
    core: HandlerCore,
    usages: Vec<MemorySample>,
    peaks: Vec<MemorySample>,
    actual_bytes: bool,
}

impl MemoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actual_bytes(mut self, actual_bytes: bool) -> Self {
        self.actual_bytes = actual_bytes;
        self
    }

    pub fn set_actual_bytes(&mut self, actual_bytes: bool) {
        self.actual_bytes = actual_bytes;
    }

    pub fn actual_bytes(&self) -> bool {
        self.actual_bytes
    }

    /// Sample current resident memory. Returns the sampled value, or `None`
    /// when the platform exposes no counter.
    pub fn update_memory_usage(&mut self) -> Option<u64> {
        let bytes = sampling::current_usage()?;
        self.record_usage(bytes);
        Some(bytes)
    }

    /// Sample the process high-water mark.
    pub fn update_peak_memory_usage(&mut self) -> Option<u64> {
        let bytes = sampling::peak_usage()?;
        self.record_peak(bytes);
        Some(bytes)
    }

    pub fn record_usage(&mut self, bytes: u64) {
        self.usages.push(MemorySample {
            bytes,
            timestamp: now(),
        });
    }

    pub fn record_peak(&mut self, bytes: u64) {
        self.peaks.push(MemorySample {
            bytes,
            timestamp: now(),
        });
    }

    pub fn usages(&self) -> &[MemorySample] {
        &self.usages
    }

    pub fn peaks(&self) -> &[MemorySample] {
        &self.peaks
    }

    pub fn has_usages(&self) -> bool {
        !self.usages.is_empty()
    }

    pub fn has_peaks(&self) -> bool {
        !self.peaks.is_empty()
    }

    pub fn format_memory_usage(bytes: u64) -> String {
        format_size(bytes)
    }

    fn render_value(&self, bytes: u64) -> Value {
        if self.actual_bytes {
            json!(bytes)
        } else {
            json!(format_size(bytes))
        }
    }

    fn render_samples(&self, samples: &[MemorySample]) -> (Vec<Value>, Vec<f64>) {
        samples
            .iter()
            .map(|sample| (self.render_value(sample.bytes), sample.timestamp))
            .unzip()
    }

    fn log_limit(
        &self,
        target: &LogTarget,
        label: &str,
        limit: u64,
        latest: Option<&MemorySample>,
        context: &Value,
    ) {
        if let Some(sample) = latest
            && sample.bytes >= limit
        {
            let message = format!(
                "{} limit of {} has been exceeded by {}. Current: {}",
                label,
                format_size(limit),
                format_size(sample.bytes - limit),
                format_size(sample.bytes)
            );
            target.emit(&message, context);
        }
    }
}

impl Handler for MemoryHandler {
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
        let (usages, usage_timestamps) = self.render_samples(&self.usages);
        let (peaks, peak_timestamps) = self.render_samples(&self.peaks);

        json!({
            "usages": usages,
            "usage_timestamps": usage_timestamps,
            "peaks": peaks,
            "peak_timestamps": peak_timestamps,
        })
    }

    fn prepare_as_string(&mut self) -> String {
        let mut out = String::new();

        out.push_str("Memory Usage:\n");
        for sample in &self.usages {
            out.push_str(&format!(
                "\t{}\t{}\n",
                format_timestamp(sample.timestamp),
                format_size(sample.bytes)
            ));
        }

        out.push_str("\nPeak Memory Usage:\n");
        for sample in &self.peaks {
            out.push_str(&format!(
                "\t{}\t{}\n",
                format_timestamp(sample.timestamp),
                format_size(sample.bytes)
            ));
        }

        out.push('\n');
        out
    }

    fn log(&mut self) -> Result<()> {
        let Some(target) = self.core.log_target(TYPE)? else {
            return Ok(());
        };

        let usage_limit = target.params.usage_limit.as_ref().map(|l| l.bytes()).transpose()?;
        let peak_limit = target.params.peak_limit.as_ref().map(|l| l.bytes()).transpose()?;
        let context = self.log_context(target.params.context);

        if usage_limit.is_none() && peak_limit.is_none() {
            let latest = |samples: &[MemorySample]| {
                samples
                    .last()
                    .map(|s| format_size(s.bytes))
                    .unwrap_or_else(|| "n/a".to_string())
            };
            let message = format!(
                "Memory usage: {}, peak: {}",
                latest(&self.usages),
                latest(&self.peaks)
            );
            target.emit(&message, &context);
            return Ok(());
        }

        if let Some(limit) = usage_limit {
            self.log_limit(&target, "Memory usage", limit, self.usages.last(), &context);
        }
        if let Some(limit) = peak_limit {
            self.log_limit(&target, "Peak memory usage", limit, self.peaks.last(), &context);
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

mod sampling {
    use sysinfo::{ProcessesToUpdate, System};

    /// Resident set size of this process, in bytes.
    pub fn current_usage() -> Option<u64> {
        let pid = sysinfo::get_current_pid().ok()?;
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system
            .process(pid)
            .map(|process| process.memory())
            .filter(|bytes| *bytes > 0)
    }

    /// High-water mark of the resident set. `sysinfo` has no peak counter,
    /// so this asks the kernel through `getrusage`.
    #[cfg(unix)]
    pub fn peak_usage() -> Option<u64> {
        // SAFETY: rusage is plain data and getrusage only writes into it.
        let usage = unsafe {
            let mut usage: libc::rusage = std::mem::zeroed();
            if libc::getrusage(libc::RUSAGE_SELF, &mut usage) != 0 {
                return None;
            }
            usage
        };

        let max_rss = usage.ru_maxrss as u64;
        // macOS reports bytes, Linux and the BSDs report KiB.
        let bytes = if cfg!(target_os = "macos") {
            max_rss
        } else {
            max_rss * 1024
        };
        Some(bytes).filter(|bytes| *bytes > 0)
    }

    #[cfg(not(unix))]
    pub fn peak_usage() -> Option<u64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_usage_reports_resident_bytes() {
        let mut handler = MemoryHandler::new().with_actual_bytes(true);
        let sampled = handler.update_memory_usage();

        if let Some(bytes) = sampled {
            assert!(bytes > 0);
            assert_eq!(handler.usages()[0].bytes, bytes);
        } else {
            assert!(!handler.has_usages());
        }
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_snapshots_are_positive_bytes() {
        let mut handler = MemoryHandler::new().with_actual_bytes(true);
        handler.update_memory_usage();
        handler.update_peak_memory_usage();

        let prepared = handler.prepare();
        let usages = prepared["usages"].as_array().unwrap();
        let peaks = prepared["peaks"].as_array().unwrap();
        assert!(usages[0].as_u64().unwrap() > 0);
        assert!(peaks[0].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_default_renders_size_strings() {
        let mut handler = MemoryHandler::new();
        handler.record_usage(2 * 1024 * 1024);

        let prepared = handler.prepare();
        assert_eq!(prepared["usages"][0], "2.00 MB");
        assert_eq!(prepared["peaks"], json!([]));
    }

    #[test]
    fn test_text_rendering_sections() {
        let mut handler = MemoryHandler::new();
        handler.record_usage(512);
        handler.record_peak(1024);

        let text = handler.prepare_as_string();
        assert!(text.starts_with("Memory Usage:\n"));
        assert!(text.contains("512 B"));
        assert!(text.contains("Peak Memory Usage:\n"));
        assert!(text.contains("1.00 KB"));
    }
}
