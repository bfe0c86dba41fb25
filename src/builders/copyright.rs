use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use crossbeam_utils::sync::WaitGroup;
use fancy_regex::{Regex, RegexBuilder};
use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::builders::patterns::ValidationProblem;
use crate::core::config::{CopyrightSettings, ForbiddenPatternsConfig};
use crate::utils::shorten;

/// Maximum display length of a reported match.
pub const VALIDATION_TOKEN_LENGTH: usize = 80;

/// Lines admitted at once, per worker.
const PERMITS_PER_WORKER: usize = 5;

struct CopyrightPattern {
    source: String,
    regex: Regex,
}

/// Trigger substrings and compiled copyright patterns. Immutable once built and
/// shared by every worker.
pub struct CopyrightRules {
    triggers: Vec<String>,
    patterns: Vec<CopyrightPattern>,
}

impl CopyrightRules {
    pub fn new(contains: &[String], patterns: &[String], backtrack_limit: usize) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|source| {
                let regex = RegexBuilder::new(source)
                    .backtrack_limit(backtrack_limit)
                    .build()
                    .with_context(|| format!("Invalid copyright pattern: {}", source))?;
                Ok(CopyrightPattern {
                    source: source.clone(),
                    regex,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            triggers: contains.iter().map(|t| t.to_lowercase()).collect(),
            patterns,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// A line is checked when it contains any trigger (case-insensitive), or
    /// always when no trigger is configured.
    pub fn is_triggered(&self, line: &str) -> bool {
        if self.triggers.is_empty() {
            return true;
        }
        let line = line.to_lowercase();
        self.triggers.iter().any(|t| line.contains(t.as_str()))
    }

    /// Tries the patterns in order and reports the first match. Gives up
    /// without a result once `cancelled` is set.
    pub fn first_violation(
        &self,
        line_number: usize,
        line: &str,
        cancelled: &AtomicBool,
    ) -> Option<ValidationProblem> {
        for pattern in &self.patterns {
            if cancelled.load(Ordering::Relaxed) {
                log::trace!("Validation cancelled, line: {}", line_number);
                return None;
            }
            let found = match pattern.regex.find(line) {
                Ok(found) => found,
                Err(err) => {
                    log::debug!(
                        "Pattern {} aborted on line {}: {}",
                        pattern.source,
                        line_number,
                        err
                    );
                    continue;
                }
            };
            if let Some(found) = found {
                log::debug!("Validation error, line: {}", line_number);
                let token = shorten(found.as_str(), VALIDATION_TOKEN_LENGTH);
                return Some(ValidationProblem {
                    line: line_number as i64,
                    start_position: found.start() as i64,
                    end_position: found.end() as i64,
                    broken_regex: pattern.source.clone(),
                    problem_token: token.clone(),
                    validation_problem: token,
                    suggested_replacement: String::new(),
                });
            }
        }
        None
    }
}

enum LineEvent {
    Started,
    Finished(Option<ValidationProblem>),
}

/// Checks line-oriented content against the copyright patterns, in parallel
/// across lines, with a timeout per line.
pub struct CopyrightValidator {
    rules: Arc<CopyrightRules>,
    settings: CopyrightSettings,
    workers: rayon::ThreadPool,
    timers: rayon::ThreadPool,
}

impl CopyrightValidator {
    pub fn new(config: &ForbiddenPatternsConfig, settings: CopyrightSettings) -> Result<Self> {
        let rules = CopyrightRules::new(&config.contains, &config.patterns, settings.backtrack_limit)?;
        Self::from_rules(rules, settings)
    }

    pub fn from_rules(rules: CopyrightRules, settings: CopyrightSettings) -> Result<Self> {
        let threads = settings.threads.max(1);
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("copyright-worker-{}", i))
            .build()
            .context("Failed to build copyright worker pool")?;
        let timers = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("copyright-timer-{}", i))
            .build()
            .context("Failed to build copyright timer pool")?;
        log::trace!("Thread Pool size {}", threads);
        Ok(Self {
            rules: Arc::new(rules),
            settings: CopyrightSettings { threads, ..settings },
            workers,
            timers,
        })
    }

    /// Reads `content` line by line and returns the violations found. Returns
    /// once every submitted line has finished or timed out. Problems are not
    /// ordered by line.
    pub fn validate<R: Read>(&self, content: R) -> Result<Vec<ValidationProblem>> {
        if self.rules.is_empty() {
            return Ok(Vec::new());
        }

        let permits = self.settings.threads * PERMITS_PER_WORKER;
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(permits);
        let (problems_tx, problems_rx) = crossbeam_channel::unbounded();
        let in_flight = WaitGroup::new();

        let mut reader = BufReader::new(content);
        let mut buffer = Vec::new();
        let mut line_number = 0usize;
        let mut read_error = None;
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    read_error = Some(err);
                    break;
                }
            }
            line_number += 1;
            let line = String::from_utf8_lossy(&buffer);
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if !self.rules.is_triggered(line) {
                continue;
            }
            log::trace!("Submit validation, line {}", line_number);
            // Blocks while `permits` lines are in flight.
            if gate_tx.send(()).is_err() {
                break;
            }
            self.submit(
                line_number,
                line.to_string(),
                gate_rx.clone(),
                problems_tx.clone(),
                in_flight.clone(),
            );
        }

        in_flight.wait();
        drop(problems_tx);
        if let Some(err) = read_error {
            return Err(err).context("Failed to read content for copyright validation");
        }
        log::debug!("Scanned {} lines", line_number);
        Ok(problems_rx.try_iter().collect())
    }

    /// Runs one line on the worker pool, supervised by a task on the timer pool.
    fn submit(
        &self,
        line_number: usize,
        line: String,
        gate: Receiver<()>,
        problems: Sender<ValidationProblem>,
        in_flight: WaitGroup,
    ) {
        let (events_tx, events_rx) = crossbeam_channel::bounded::<LineEvent>(2);
        let cancelled = Arc::new(AtomicBool::new(false));
        let timeout = self.settings.timeout;

        let rules = Arc::clone(&self.rules);
        let worker_cancelled = Arc::clone(&cancelled);
        self.workers.spawn(move || {
            let _ = events_tx.send(LineEvent::Started);
            let problem = if worker_cancelled.load(Ordering::Relaxed) {
                None
            } else {
                rules.first_violation(line_number, &line, &worker_cancelled)
            };
            let _ = events_tx.send(LineEvent::Finished(problem));
        });

        self.timers.spawn(move || {
            if !matches!(events_rx.recv(), Ok(LineEvent::Started)) {
                log::warn!("Validation worker vanished, line {}", line_number);
            } else {
                match events_rx.recv_timeout(timeout) {
                    Ok(LineEvent::Finished(Some(problem))) => {
                        log::trace!("Add validation problem: {:?}", problem);
                        let _ = problems.send(problem);
                    }
                    Ok(_) => {}
                    Err(RecvTimeoutError::Timeout) => {
                        cancelled.store(true, Ordering::Relaxed);
                        log::debug!("Validation timeout, line {}", line_number);
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        log::warn!("Validation worker vanished, line {}", line_number);
                    }
                }
            }
            let _ = gate.recv();
            drop(in_flight);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    fn settings(timeout: Duration) -> CopyrightSettings {
        CopyrightSettings {
            timeout,
            threads: 4,
            ..Default::default()
        }
    }

    fn validator(contains: &[&str], patterns: &[&str], timeout: Duration) -> CopyrightValidator {
        let config = ForbiddenPatternsConfig {
            contains: contains.iter().map(|s| s.to_string()).collect(),
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        CopyrightValidator::new(&config, settings(timeout)).unwrap()
    }

    #[test]
    fn test_every_matching_line_is_reported_once() {
        let content: String = (1..=500)
            .map(|n| {
                if n % 10 == 0 {
                    format!("line {} (c) OctopusDen\n", n)
                } else {
                    format!("line {} nothing to see\n", n)
                }
            })
            .collect();
        let validator = validator(&[], &[".*OctopusDen.*"], Duration::from_secs(30));

        let mut problems = validator.validate(Cursor::new(content)).unwrap();
        problems.sort_by_key(|p| p.line);
        assert_eq!(problems.len(), 50);
        let lines: Vec<i64> = problems.iter().map(|p| p.line).collect();
        let expected: Vec<i64> = (1..=50).map(|n| n * 10).collect();
        assert_eq!(lines, expected);
        assert_eq!(problems[0].broken_regex, ".*OctopusDen.*");
        assert_eq!(problems[0].problem_token, "line 10 (c) OctopusDen");
        assert_eq!(problems[0].validation_problem, problems[0].problem_token);
        assert!(problems[0].suggested_replacement.is_empty());
    }

    #[test]
    fn test_triggers_select_lines() {
        let content = "Copyright ACME\nACME inside\ncopyright acme\n";
        let validator = validator(&["COPYRIGHT"], &["(?i)acme"], Duration::from_secs(30));
        let mut problems = validator.validate(Cursor::new(content)).unwrap();
        problems.sort_by_key(|p| p.line);
        let lines: Vec<i64> = problems.iter().map(|p| p.line).collect();
        assert_eq!(lines, vec![1, 3]);
        assert_eq!(problems[0].start_position, 10);
        assert_eq!(problems[0].end_position, 14);
    }

    #[test]
    fn test_first_pattern_wins() {
        let validator = validator(&[], &["Octopus\\w+", "Octo"], Duration::from_secs(30));
        let problems = validator.validate(Cursor::new("by OctopusDen\r\n")).unwrap();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].broken_regex, "Octopus\\w+");
        assert_eq!(problems[0].problem_token, "OctopusDen");
    }

    #[test]
    fn test_long_match_is_shortened() {
        let line = format!("OctopusDen {}", "x".repeat(200));
        let validator = validator(&[], &["OctopusDen.*"], Duration::from_secs(30));
        let problems = validator.validate(Cursor::new(line)).unwrap();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].problem_token.chars().count(), VALIDATION_TOKEN_LENGTH);
        assert!(problems[0].problem_token.ends_with("..."));
        assert_eq!(problems[0].end_position, 211);
    }

    #[test]
    fn test_no_patterns_means_no_problems() {
        let validator = validator(&[], &[], Duration::from_secs(30));
        assert!(validator.validate(Cursor::new("OctopusDen\n")).unwrap().is_empty());
    }

    #[test]
    fn test_pathological_line_is_bounded() {
        let timeout = Duration::from_secs(2);
        let validator = validator(&[], &["^(a|aa)+(?=b)\\1c", "OctopusDen"], timeout);
        let content = format!("{}\nOctopusDen\n", "a".repeat(5_000));

        let started = Instant::now();
        let problems = validator.validate(Cursor::new(content)).unwrap();
        assert!(started.elapsed() < timeout + Duration::from_secs(10));
        assert!(problems.iter().all(|p| p.line != 1 || p.broken_regex == "OctopusDen"));
        assert!(problems.iter().any(|p| p.line == 2));
    }

    #[test]
    fn test_timed_out_line_is_not_a_violation() {
        let config = ForbiddenPatternsConfig {
            patterns: vec!["^(a|aa)+(?=b)\\1c".to_string(), "OctopusDen".to_string()],
            ..Default::default()
        };
        let settings = CopyrightSettings {
            timeout: Duration::from_millis(200),
            threads: 2,
            backtrack_limit: usize::MAX,
        };
        let validator = CopyrightValidator::new(&config, settings).unwrap();
        let content = format!("{}\nOctopusDen\n", "a".repeat(45));

        let started = Instant::now();
        let problems = validator.validate(Cursor::new(content)).unwrap();
        assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
        let lines: Vec<i64> = problems.iter().map(|p| p.line).collect();
        assert_eq!(lines, vec![2]);
        assert_eq!(problems[0].broken_regex, "OctopusDen");
    }

    #[test]
    fn test_cancelled_line_reports_nothing() {
        let rules = CopyrightRules::new(&[], &["Octopus".to_string()], 1_000).unwrap();
        let cancelled = AtomicBool::new(true);
        assert!(rules.first_violation(1, "Octopus", &cancelled).is_none());
        cancelled.store(false, Ordering::Relaxed);
        assert!(rules.first_violation(1, "Octopus", &cancelled).is_some());
    }
}
