//! Table-driven state machine turning line events into pending reports.
//!
//! One [`ReportParser`] instance exists per run. It consumes the merged
//! [`LineEvent`] sequence strictly in order, matching each ANSI-stripped line
//! against the command's declarative [`ParserRule`] table, and accumulates
//! multi-line reports in a single [`PendingReport`] builder. The parser knows
//! nothing about files or locations; it only emits [`ParseEvent`]s for the
//! caller to resolve and aggregate.

use crate::runner::report::{PendingReport, ReportKind};
use crate::runner::stream::{LineEvent, StreamSource};
use crate::utils::ansi::strip_ansi;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

/// Parser state active before any rule has transitioned.
pub const START_STATE: &str = "start";

/// One row of a command's declarative rule table.
///
/// Rules are pure data: which states they apply in, the patterns that select
/// them, and what a match does (start a report, continue one, or discard the
/// line). Construction panics on an invalid pattern, which is a programming
/// error in a built-in table rather than a runtime condition.
#[derive(Debug, Clone)]
pub struct ParserRule {
    states: Option<Vec<String>>,
    patterns: Vec<Regex>,
    report: Option<ReportKind>,
    next: Option<String>,
    aggregate: Vec<String>,
    ignore: bool,
}

impl ParserRule {
    pub fn new(patterns: &[&str]) -> Self {
        Self {
            states: None,
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("invalid parser rule pattern {p:?}: {e}")))
                .collect(),
            report: None,
            next: None,
            aggregate: Vec::new(),
            ignore: false,
        }
    }

    /// Restrict the rule to the given named states.
    pub fn in_states(mut self, states: &[&str]) -> Self {
        self.states = Some(states.iter().map(|s| s.to_string()).collect());
        self
    }

    /// A match starts a new report of this kind.
    pub fn emits(mut self, kind: ReportKind) -> Self {
        self.report = Some(kind);
        self
    }

    /// State entered after a final match (defaults to the report kind name).
    pub fn next(mut self, state: &str) -> Self {
        self.next = Some(state.to_string());
        self
    }

    /// Fields whose captures concatenate across lines instead of overwriting.
    pub fn aggregate(mut self, fields: &[&str]) -> Self {
        self.aggregate = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// A match discards the line with no state change.
    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }

    fn applies_in(&self, state: &str) -> bool {
        match &self.states {
            Some(states) => states.iter().any(|s| s == state),
            None => true,
        }
    }

    fn first_match<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        self.patterns.iter().find_map(|p| p.captures(text))
    }
}

/// Something the parser wants the caller to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    /// A pending report left the builder. `done` on the report says whether
    /// this is a finished report (store it) or a superseded partial (hooks
    /// only).
    Flush(PendingReport),
    /// Snapshot of the in-flight report for partial-progress hooks.
    Partial(PendingReport),
    /// A final stderr line no rule classified.
    Unrecognized(String),
}

/// The per-run state machine.
pub struct ReportParser<'a> {
    rules: &'a [ParserRule],
    state: String,
    pending: Option<PendingReport>,
}

impl<'a> ReportParser<'a> {
    pub fn new(rules: &'a [ParserRule]) -> Self {
        Self {
            rules,
            state: START_STATE.to_string(),
            pending: None,
        }
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Process one line event, returning the actions it triggered in order.
    pub fn feed(&mut self, event: &LineEvent) -> Vec<ParseEvent> {
        let mut out = Vec::new();
        let text = strip_ansi(&event.text);

        let matched = self
            .rules
            .iter()
            .filter(|rule| rule.applies_in(&self.state))
            .find_map(|rule| rule.first_match(&text).map(|caps| (rule, caps)));

        let Some((rule, caps)) = matched else {
            self.unclassified(event, &text, &mut out);
            return out;
        };

        if rule.ignore {
            return out;
        }

        if let Some(kind) = rule.report {
            // A new report starts: the previous one leaves the builder with
            // whatever final flag it last recorded.
            if let Some(previous) = self.pending.take() {
                out.push(ParseEvent::Flush(previous));
            }
            let mut fields = captured_fields(rule, &caps, &[]);
            fields.insert("kind".to_string(), kind.as_str().to_string());
            self.pending = Some(PendingReport {
                kind,
                fields,
                message: text.to_string(),
                done: event.done,
            });
        } else if let Some(pending) = self.pending.as_mut() {
            // Continuation: non-aggregate captures overwrite (idempotent
            // across the fragment/final double delivery of the same line),
            // aggregate captures and the message grow on final lines only.
            for (name, value) in captured_fields(rule, &caps, &rule.aggregate) {
                pending.fields.insert(name, value);
            }
            if event.done {
                pending.message.push('\n');
                pending.message.push_str(&text);
                for name in &rule.aggregate {
                    if let Some(value) = caps.name(name).map(|m| m.as_str()) {
                        match pending.fields.get_mut(name) {
                            Some(existing) if !existing.is_empty() => {
                                existing.push('\n');
                                existing.push_str(value);
                            }
                            _ => {
                                pending.fields.insert(name.clone(), value.to_string());
                            }
                        }
                    }
                }
                pending.done = true;
            }
        } else {
            // A continuation matched with nothing to continue.
            self.unclassified(event, &text, &mut out);
            return out;
        }

        if let Some(pending) = &self.pending {
            let mut snapshot = pending.clone();
            snapshot.done = false;
            out.push(ParseEvent::Partial(snapshot));
        }

        if event.done {
            if let Some(next) = rule
                .next
                .as_deref()
                .or(rule.report.map(ReportKind::as_str))
            {
                self.state = next.to_string();
            }
        }

        out
    }

    /// Flush whatever is still pending at end of stream.
    pub fn finish(&mut self) -> Vec<ParseEvent> {
        self.pending.take().map(ParseEvent::Flush).into_iter().collect()
    }

    fn unclassified(&self, event: &LineEvent, text: &str, out: &mut Vec<ParseEvent>) {
        if event.done && event.source == StreamSource::Stderr && !text.trim().is_empty() {
            log::warn!("unrecognized {} line in state {:?}: {}", event.source.as_str(), self.state, text);
            out.push(ParseEvent::Unrecognized(text.to_string()));
        }
    }
}

fn captured_fields(rule: &ParserRule, caps: &Captures<'_>, exclude: &[String]) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for pattern in &rule.patterns {
        for name in pattern.capture_names().flatten() {
            if exclude.iter().any(|e| e == name) {
                continue;
            }
            if let Some(m) = caps.name(name) {
                fields.insert(name.to_string(), m.as_str().to_string());
            }
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(source: StreamSource, text: &str, done: bool) -> LineEvent {
        LineEvent {
            source,
            text: text.to_string(),
            done,
        }
    }

    fn out(text: &str) -> LineEvent {
        line(StreamSource::Stdout, text, true)
    }

    fn err(text: &str) -> LineEvent {
        line(StreamSource::Stderr, text, true)
    }

    fn lint_rules() -> Vec<ParserRule> {
        vec![
            ParserRule::new(&[r"^$"]).ignored(),
            ParserRule::new(&[r"^\((?P<rule>[a-z0-9-]+)\) .*$"]).emits(ReportKind::Lint),
            ParserRule::new(&[r"^\s+at (?P<file>\S+?):(?P<line>\d+):(?P<column>\d+)$"]).in_states(&["lint"]),
            ParserRule::new(&[r"^\s*hint: (?P<hint>.*)$"])
                .in_states(&["lint"])
                .aggregate(&["hint"]),
            ParserRule::new(&[r"^Checked \d+ files?$"]).emits(ReportKind::Debug),
        ]
    }

    fn finished(events: &[ParseEvent]) -> Vec<PendingReport> {
        events
            .iter()
            .filter_map(|e| match e {
                ParseEvent::Flush(p) if p.done => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_multi_line_report_accumulation() {
        let rules = lint_rules();
        let mut parser = ReportParser::new(&rules);
        let mut events = Vec::new();
        events.extend(parser.feed(&err("(no-unused-vars) `x` is never used")));
        events.extend(parser.feed(&err("    at /src/mod.ts:2:7")));
        events.extend(parser.feed(&err("    hint: prefix it with an underscore")));
        events.extend(parser.feed(&err("Checked 1 file")));
        events.extend(parser.finish());

        let reports = finished(&events);
        assert_eq!(reports.len(), 2);
        let lint = &reports[0];
        assert_eq!(lint.kind, ReportKind::Lint);
        assert_eq!(lint.fields.get("rule").unwrap(), "no-unused-vars");
        assert_eq!(lint.fields.get("file").unwrap(), "/src/mod.ts");
        assert_eq!(lint.fields.get("line").unwrap(), "2");
        assert_eq!(lint.fields.get("column").unwrap(), "7");
        assert_eq!(lint.fields.get("hint").unwrap(), "prefix it with an underscore");
        assert!(lint.message.contains("never used"));
        assert!(lint.message.contains("at /src/mod.ts:2:7"));
        assert_eq!(reports[1].kind, ReportKind::Debug);
    }

    #[test]
    fn test_unrecognized_final_stderr_line() {
        let rules = lint_rules();
        let mut parser = ReportParser::new(&rules);
        let events = parser.feed(&err("thread panicked at src/main.rs"));
        assert_eq!(
            events,
            vec![ParseEvent::Unrecognized("thread panicked at src/main.rs".to_string())]
        );
    }

    #[test]
    fn test_unmatched_stdout_is_discarded() {
        let rules = lint_rules();
        let mut parser = ReportParser::new(&rules);
        assert!(parser.feed(&out("random narration")).is_empty());
    }

    #[test]
    fn test_unmatched_partial_stderr_is_discarded() {
        let rules = lint_rules();
        let mut parser = ReportParser::new(&rules);
        assert!(parser.feed(&line(StreamSource::Stderr, "growing fragm", false)).is_empty());
    }

    #[test]
    fn test_ignore_rule_keeps_state() {
        let rules = lint_rules();
        let mut parser = ReportParser::new(&rules);
        parser.feed(&err("(ban-ts-comment) no"));
        assert_eq!(parser.state(), "lint");
        assert!(parser.feed(&err("")).is_empty());
        assert_eq!(parser.state(), "lint");
    }

    #[test]
    fn test_fragment_then_final_does_not_duplicate() {
        let rules = vec![
            ParserRule::new(&[r"^test (?P<test>.+?) \.\.\.(?: (?P<status>ok|FAILED))?(?: \((?P<elapsed>\d+)ms\))?$"])
                .emits(ReportKind::Test)
                .next("tests"),
        ];
        let mut parser = ReportParser::new(&rules);
        let mut events = Vec::new();
        // The same line arrives first as a growing fragment, then terminated.
        events.extend(parser.feed(&line(StreamSource::Stdout, "test add ...", false)));
        events.extend(parser.feed(&out("test add ... ok (6ms)")));
        events.extend(parser.feed(&out("test sub ... ok (2ms)")));
        events.extend(parser.finish());

        let reports = finished(&events);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].fields.get("test").unwrap(), "add");
        assert_eq!(reports[0].fields.get("status").unwrap(), "ok");
        assert_eq!(reports[1].fields.get("test").unwrap(), "sub");

        // The fragment-created builder was flushed as a partial, not stored.
        let partial_flushes = events
            .iter()
            .filter(|e| matches!(e, ParseEvent::Flush(p) if !p.done))
            .count();
        assert_eq!(partial_flushes, 1);
    }

    #[test]
    fn test_aggregate_concatenates_in_order() {
        let rules = vec![
            ParserRule::new(&[r"^from (?P<file>.+?):$"]).emits(ReportKind::Diff).next("diff"),
            ParserRule::new(&[r"^(?P<diff>\d+ \| .*)$"])
                .in_states(&["diff"])
                .aggregate(&["diff"]),
        ];
        let mut parser = ReportParser::new(&rules);
        let mut events = Vec::new();
        events.extend(parser.feed(&out("from /src/a.ts:")));
        events.extend(parser.feed(&out("1 | -const a=1")));
        events.extend(parser.feed(&out("1 | +const a = 1;")));
        events.extend(parser.finish());

        let reports = finished(&events);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].fields.get("diff").unwrap(), "1 | -const a=1\n1 | +const a = 1;");
    }

    #[test]
    fn test_state_restriction() {
        let rules = lint_rules();
        let mut parser = ReportParser::new(&rules);
        // Location lines only apply inside the lint state; before any report
        // they fall through to the unrecognized path.
        let events = parser.feed(&err("    at /src/mod.ts:2:7"));
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ParseEvent::Unrecognized(_)));
    }

    #[test]
    fn test_partial_snapshots_emitted() {
        let rules = lint_rules();
        let mut parser = ReportParser::new(&rules);
        let events = parser.feed(&err("(no-explicit-any) nope"));
        assert!(events.iter().any(|e| matches!(e, ParseEvent::Partial(p) if !p.done)));
    }
}
