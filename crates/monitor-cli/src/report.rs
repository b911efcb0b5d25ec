//! Deterministic JSON reports emitted by the `monitor` subcommands.

use std::time::{Duration, Instant};

use monitor_equation::{
    format_tokens, parse_equation, validate_tokens, EditOutcome, EditorConfig, EquationEditor,
    EquationError, KnownVariables, ParseError, Token, ValidationError,
};
use monitor_trace_search::{
    search_in_trace_tree, NodeKey, SearchResult, SearchResults, TraceSearchAction,
    TraceSearchScan, TraceSearchState, TraceTree,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquationReport {
    /// The trimmed input all offsets refer to.
    pub input: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    pub tokens: Vec<Token>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax_error: Option<ParseError>,
    pub errors: Vec<ValidationError>,
}

pub fn equation_report(input: &str, known: &KnownVariables) -> EquationReport {
    let input = input.trim();
    match parse_equation(input) {
        Err(err) => EquationReport {
            input: input.to_string(),
            ok: false,
            formatted: None,
            tokens: Vec::new(),
            syntax_error: Some(err),
            errors: Vec::new(),
        },
        Ok(tokens) => {
            let errors = validate_tokens(&tokens, known);
            let ok = errors.is_empty();
            EquationReport {
                input: input.to_string(),
                ok,
                formatted: ok.then(|| format_tokens(&tokens)),
                tokens,
                syntax_error: None,
                errors,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keystroke {
    pub at_ms: u64,
    pub text: String,
}

/// Parse a keystroke timeline: one `<ms>\t<text>` pair per line, blank lines ignored.
pub fn parse_timeline(src: &str) -> anyhow::Result<Vec<Keystroke>> {
    let mut out = Vec::new();
    for (line_no, line) in src.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (at, text) = line
            .split_once('\t')
            .ok_or_else(|| anyhow::anyhow!("line {}: expected `<ms>\\t<text>`", line_no + 1))?;
        let at_ms = at
            .trim()
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("line {}: invalid timestamp {at:?}: {e}", line_no + 1))?;
        out.push(Keystroke {
            at_ms,
            text: text.to_string(),
        });
    }
    out.sort_by_key(|k| k.at_ms);
    Ok(out)
}

#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum EditEvent {
    #[serde(rename_all = "camelCase")]
    Committed { at_ms: u64, value: String },
    #[serde(rename_all = "camelCase")]
    Rejected {
        at_ms: u64,
        error: String,
        ranges: Vec<(usize, Option<usize>)>,
        /// When the problems would appear on screen, or `None` if another keystroke arrives
        /// before the error display delay runs out.
        visible_at_ms: Option<u64>,
    },
}

/// Replay a keystroke timeline through an [`EquationEditor`] on a virtual clock.
pub fn replay_edit_session<I, S>(
    config: EditorConfig,
    known_variables: I,
    timeline: &[Keystroke],
) -> Vec<EditEvent>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let base = Instant::now();
    let at = |ms: u64| base + Duration::from_millis(ms);
    let settle = config.settle_delay_ms;
    let display = config.error_display_delay_ms;
    let mut editor = EquationEditor::new(config, known_variables);
    let mut events = Vec::new();
    let mut last_edit_ms: Option<u64> = None;

    // `next_edit_ms` is when the following keystroke lands, if there is one.
    let poll = |editor: &mut EquationEditor,
                last: u64,
                next_edit_ms: Option<u64>,
                events: &mut Vec<EditEvent>| {
        let due = last.saturating_add(settle);
        if next_edit_ms.is_some_and(|next| next < due) {
            return;
        }
        let Some(outcome) = editor.poll(at(due)) else {
            return;
        };
        events.push(match outcome {
            EditOutcome::Committed(value) => EditEvent::Committed { at_ms: due, value },
            EditOutcome::Rejected(err) => {
                let shown = last.saturating_add(display).max(due);
                let visible_at_ms = (!next_edit_ms.is_some_and(|next| next <= shown)
                    && editor.errors_visible(at(shown)))
                .then_some(shown);
                rejected_event(due, &err, visible_at_ms)
            }
        });
    };

    for keystroke in timeline {
        if let Some(last) = last_edit_ms {
            poll(&mut editor, last, Some(keystroke.at_ms), &mut events);
        }
        editor.edit(keystroke.text.clone(), at(keystroke.at_ms));
        last_edit_ms = Some(keystroke.at_ms);
    }
    if let Some(last) = last_edit_ms {
        poll(&mut editor, last, None, &mut events);
    }
    events
}

fn rejected_event(ms: u64, err: &EquationError, visible_at_ms: Option<u64>) -> EditEvent {
    EditEvent::Rejected {
        at_ms: ms,
        error: err.to_string(),
        ranges: err.ranges(),
        visible_at_ms,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusReport {
    pub ordinal: usize,
    pub index: usize,
    pub node: NodeKey,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSearchReport {
    pub query: String,
    pub match_count: usize,
    pub matches: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focused: Option<FocusReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next(usize),
    Previous(usize),
}

pub fn trace_search_report(
    tree: &TraceTree,
    query: &str,
    chunk: Option<usize>,
    navigation: Navigation,
) -> TraceSearchReport {
    let results = match chunk {
        Some(budget) => scan_in_chunks(tree, query, budget.max(1)),
        None => search_in_trace_tree(query, tree),
    };

    let mut state = TraceSearchState::new()
        .reduce(TraceSearchAction::SetQuery(query.to_string()))
        .reduce(TraceSearchAction::SetResults(results));
    let (action, times) = match navigation {
        Navigation::Next(n) => (TraceSearchAction::GoToNextMatch, n),
        Navigation::Previous(n) => (TraceSearchAction::GoToPreviousMatch, n),
    };
    for _ in 0..times {
        state = state.reduce(action.clone());
    }

    let focused = state
        .result_iterator_index()
        .zip(state.focused())
        .map(|(ordinal, result)| FocusReport {
            ordinal,
            index: result.index,
            node: result.node,
        });
    let matches = state
        .results()
        .map(|r| r.as_slice().to_vec())
        .unwrap_or_default();

    TraceSearchReport {
        query: query.to_string(),
        match_count: state.match_count(),
        matches,
        focused,
    }
}

fn scan_in_chunks(tree: &TraceTree, query: &str, budget: usize) -> SearchResults {
    let mut scan = TraceSearchScan::new(query);
    let mut steps = 0usize;
    while !scan.is_done() {
        scan.step(tree, budget);
        steps += 1;
    }
    log::debug!("scanned {} rows in {steps} step(s)", tree.len());
    scan.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_equation::ValidateOptions;
    use monitor_trace_search::{SpanNode, TraceNodeValue};
    use pretty_assertions::assert_eq;

    #[test]
    fn equation_report_for_valid_input() {
        let known = KnownVariables::new(["A", "B"], ValidateOptions::default());
        let report = equation_report(" (A / B) * 100 ", &known);
        assert!(report.ok);
        assert_eq!(report.input, "(A / B) * 100");
        assert_eq!(report.formatted.as_deref(), Some("($A / $B) * 100"));
        assert_eq!(report.tokens.len(), 11);
    }

    #[test]
    fn equation_report_for_syntax_error() {
        let known = KnownVariables::new(["A"], ValidateOptions::default());
        let report = equation_report("A +", &known);
        assert!(!report.ok);
        assert_eq!(report.syntax_error.map(|e| e.span.start), Some(3));
        assert!(report.tokens.is_empty());
    }

    #[test]
    fn timeline_parsing() {
        let timeline = parse_timeline("100\tA +\n0\tA\n\n").unwrap();
        assert_eq!(
            timeline,
            vec![
                Keystroke {
                    at_ms: 0,
                    text: "A".to_string()
                },
                Keystroke {
                    at_ms: 100,
                    text: "A +".to_string()
                },
            ]
        );
        assert!(parse_timeline("abc\tA").is_err());
        assert!(parse_timeline("100 A").is_err());
    }

    #[test]
    fn edit_session_commits_only_settled_text() {
        let timeline = parse_timeline("0\tA\n50\tA +\n120\tA + 1\n1000\tA + \n").unwrap();
        let events = replay_edit_session(EditorConfig::default(), ["A"], &timeline);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            EditEvent::Committed {
                at_ms: 320,
                value: "$A + 1".to_string()
            }
        );
        let EditEvent::Rejected {
            at_ms,
            ranges,
            visible_at_ms,
            ..
        } = &events[1]
        else {
            panic!("expected a rejection, got {:?}", events[1]);
        };
        assert_eq!(*at_ms, 1200);
        assert_eq!(ranges, &vec![(3, Some(3))]);
        assert_eq!(*visible_at_ms, Some(1500));
    }

    #[test]
    fn problems_fixed_before_the_display_delay_are_never_shown() {
        let timeline = parse_timeline("0\tA +\n300\tA + 1\n").unwrap();
        let events = replay_edit_session(EditorConfig::default(), ["A"], &timeline);
        assert_eq!(events.len(), 2);
        let EditEvent::Rejected {
            at_ms,
            visible_at_ms,
            ..
        } = &events[0]
        else {
            panic!("expected a rejection, got {:?}", events[0]);
        };
        assert_eq!((*at_ms, *visible_at_ms), (200, None));
        assert_eq!(
            events[1],
            EditEvent::Committed {
                at_ms: 500,
                value: "$A + 1".to_string()
            }
        );
    }

    #[test]
    fn trace_report_focuses_after_navigation() {
        let tree = TraceTree::from_values((0..5).map(|i| {
            TraceNodeValue::Span(SpanNode {
                op: Some(if i % 2 == 0 { "db" } else { "http" }.to_string()),
                description: None,
                span_id: format!("s{i}"),
            })
        }));

        let report = trace_search_report(&tree, "db", Some(2), Navigation::Next(4));
        assert_eq!(report.match_count, 3);
        let focused = report.focused.unwrap();
        assert_eq!((focused.ordinal, focused.index), (0, 0));

        let report = trace_search_report(&tree, "db", None, Navigation::Previous(1));
        let focused = report.focused.unwrap();
        assert_eq!((focused.ordinal, focused.index), (2, 4));

        let report = trace_search_report(&tree, "db", None, Navigation::Next(0));
        assert!(report.focused.is_none());
    }
}
