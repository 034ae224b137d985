//! Summaries of a finished (or still running) profile file.
//!
//! Reads the sample lines written by [`ProfileSink`](crate::ProfileSink),
//! prints overall counts and throughput, and ranks the busiest sampling
//! intervals by vectors consumed.

use std::fmt;
use std::path::Path;

use crate::error::ServerError;
use crate::profile::HEADER;

/// Number of intervals listed in [`ProfileReport::busiest`].
pub const TOP_INTERVALS: usize = 5;

/// One parsed sample line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleLine {
    pub timestamp_ms: i64,
    pub produced: u64,
    pub consumed: u64,
    pub main_loop_rounds: u64,
    pub aggregate_len: u64,
    pub appended_total: u64,
    pub compactions: u64,
    pub high_water: u64,
}

/// Work done between two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start_ms: i64,
    pub end_ms: i64,
    pub consumed: u64,
    pub compactions: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileReport {
    pub samples: usize,
    pub stopped: bool,
    pub duration_ms: i64,
    /// Last sample seen, all zero if there were none.
    pub last: SampleLine,
    pub produced_per_sec: f64,
    pub consumed_per_sec: f64,
    pub busiest: Vec<Interval>,
}

impl ProfileReport {
    pub fn parse(content: &str) -> Result<Self, ServerError> {
        let mut lines = content.lines().enumerate();
        match lines.next() {
            Some((_, HEADER)) => {}
            _ => return Err(malformed(1, "missing profile header")),
        }

        let mut samples = Vec::new();
        let mut stopped = false;
        for (idx, line) in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with("started:") || line.starts_with("samples:") {
                continue;
            }
            if line.starts_with("stopped:") {
                stopped = true;
                continue;
            }
            samples.push(parse_sample(idx + 1, line)?);
        }

        Ok(Self::from_samples(&samples, stopped))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    fn from_samples(samples: &[SampleLine], stopped: bool) -> Self {
        let (first, last) = match (samples.first(), samples.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => (SampleLine::default(), SampleLine::default()),
        };
        let duration_ms = last.timestamp_ms - first.timestamp_ms;
        let rate = |from: u64, to: u64| {
            if duration_ms > 0 {
                to.saturating_sub(from) as f64 * 1000.0 / duration_ms as f64
            } else {
                0.0
            }
        };

        let mut busiest: Vec<Interval> = samples
            .windows(2)
            .map(|pair| Interval {
                start_ms: pair[0].timestamp_ms,
                end_ms: pair[1].timestamp_ms,
                consumed: pair[1].consumed.saturating_sub(pair[0].consumed),
                compactions: pair[1].compactions.saturating_sub(pair[0].compactions),
            })
            .collect();
        busiest.sort_by(|a, b| b.consumed.cmp(&a.consumed).then(a.start_ms.cmp(&b.start_ms)));
        busiest.truncate(TOP_INTERVALS);

        Self {
            samples: samples.len(),
            stopped,
            duration_ms,
            last,
            produced_per_sec: rate(first.produced, last.produced),
            consumed_per_sec: rate(first.consumed, last.consumed),
            busiest,
        }
    }
}

impl fmt::Display for ProfileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "samples: {}", self.samples)?;
        writeln!(f, "finalized: {}", if self.stopped { "yes" } else { "no" })?;
        writeln!(f, "duration: {:.1}s", self.duration_ms as f64 / 1000.0)?;
        writeln!(
            f,
            "vectors: produced={} consumed={} ({:.2}/s produced, {:.2}/s consumed)",
            self.last.produced, self.last.consumed, self.produced_per_sec, self.consumed_per_sec
        )?;
        writeln!(f, "main loop rounds: {}", self.last.main_loop_rounds)?;
        writeln!(
            f,
            "aggregate: len={} appended_total={} compactions={} high_water={}",
            self.last.aggregate_len,
            self.last.appended_total,
            self.last.compactions,
            self.last.high_water
        )?;
        writeln!(f, "busiest intervals:")?;
        for interval in &self.busiest {
            writeln!(
                f,
                "  {}..{} consumed={} compactions={}",
                interval.start_ms, interval.end_ms, interval.consumed, interval.compactions
            )?;
        }
        Ok(())
    }
}

fn parse_sample(line_no: usize, line: &str) -> Result<SampleLine, ServerError> {
    let mut fields = line.split_whitespace();
    let timestamp_ms = fields
        .next()
        .and_then(|ts| ts.parse().ok())
        .ok_or_else(|| malformed(line_no, "bad timestamp"))?;

    let mut sample = SampleLine {
        timestamp_ms,
        ..SampleLine::default()
    };
    for field in fields {
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| malformed(line_no, "expected key=value"))?;
        let value: u64 = value
            .parse()
            .map_err(|_| malformed(line_no, "bad counter value"))?;
        match key {
            "produced" => sample.produced = value,
            "consumed" => sample.consumed = value,
            "main_rounds" => sample.main_loop_rounds = value,
            "aggregate_len" => sample.aggregate_len = value,
            "appended_total" => sample.appended_total = value,
            "compactions" => sample.compactions = value,
            "high_water" => sample.high_water = value,
            _ => {}
        }
    }
    Ok(sample)
}

fn malformed(line: usize, reason: &str) -> ServerError {
    ServerError::MalformedProfile {
        line,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = "# loadgen profile
started: 2026-01-01T00:00:00+00:00
1000 produced=0 consumed=0 main_rounds=0 aggregate_len=0 appended_total=0 compactions=0 high_water=0
2000 produced=4 consumed=3 main_rounds=1 aggregate_len=120000 appended_total=120000 compactions=0 high_water=120000
3000 produced=10 consumed=9 main_rounds=2 aggregate_len=1000 appended_total=360000 compactions=1 high_water=320000
4000 produced=12 consumed=10 main_rounds=3 aggregate_len=41000 appended_total=400000 compactions=1 high_water=320000
stopped: 2026-01-01T00:00:04+00:00
samples: 4
";

    #[test]
    fn summarizes_counts_and_rates() {
        let report = ProfileReport::parse(PROFILE).unwrap();
        assert_eq!(report.samples, 4);
        assert!(report.stopped);
        assert_eq!(report.duration_ms, 3000);
        assert_eq!(report.last.consumed, 10);
        assert_eq!(report.last.compactions, 1);
        assert_eq!(report.produced_per_sec, 4.0);
        assert!((report.consumed_per_sec - 10.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn ranks_busiest_intervals() {
        let report = ProfileReport::parse(PROFILE).unwrap();
        let consumed: Vec<u64> = report.busiest.iter().map(|i| i.consumed).collect();
        assert_eq!(consumed, vec![6, 3, 1]);
        assert_eq!(report.busiest[0].start_ms, 2000);
        assert_eq!(report.busiest[0].compactions, 1);
    }

    #[test]
    fn unfinished_profile_is_reported_as_such() {
        let content = "# loadgen profile\nstarted: x\n";
        let report = ProfileReport::parse(content).unwrap();
        assert_eq!(report.samples, 0);
        assert!(!report.stopped);
        assert_eq!(report.consumed_per_sec, 0.0);
        assert!(report.busiest.is_empty());
        assert!(report.to_string().contains("finalized: no"));
    }

    #[tokio::test]
    async fn reads_what_the_sink_writes() {
        use crate::profile::{ProfileSink, Sample};
        use loadgen::{PipelineStats, SharedAggregate};

        let path = std::env::temp_dir().join(format!(
            "loadgen-report-{}.prof",
            std::process::id()
        ));
        let sink = ProfileSink::create(&path).await.unwrap();
        let stats = PipelineStats::default();
        let aggregate = SharedAggregate::default();
        sink.record(Sample::collect(&stats, &aggregate)).await.unwrap();
        aggregate.append(vec![1.0, 2.0, 3.0]);
        sink.record(Sample::collect(&stats, &aggregate)).await.unwrap();
        sink.stop().await.unwrap();

        let report = ProfileReport::load(&path).await.unwrap();
        assert_eq!(report.samples, 2);
        assert!(report.stopped);
        assert_eq!(report.last.aggregate_len, 3);
        assert_eq!(report.last.appended_total, 3);
        assert_eq!(report.busiest.len(), 1);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[test]
    fn rejects_missing_header_and_bad_lines() {
        assert!(matches!(
            ProfileReport::parse("nope\n"),
            Err(ServerError::MalformedProfile { line: 1, .. })
        ));
        assert!(matches!(
            ProfileReport::parse("# loadgen profile\n12 produced=abc\n"),
            Err(ServerError::MalformedProfile { line: 2, .. })
        ));
    }
}
