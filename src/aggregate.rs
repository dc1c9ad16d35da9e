use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Number of answers shown on the board.
pub const BOARD_SIZE: usize = 10;

/// Column of the published sheet that holds the respondent's answer.
pub const ANSWER_COLUMN: usize = 1;

pub type RawRow = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub name: String,
    pub votes: u32,
}

/// Vote counts keyed by answer, remembering the order answers were first seen.
#[derive(Debug, Clone, Default)]
pub struct AnswerTally {
    counts: Vec<(String, u32)>,
    index: HashMap<String, usize>,
}

impl AnswerTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, answer: &str) {
        match self.index.get(answer) {
            Some(&pos) => self.counts[pos].1 += 1,
            None => {
                self.index.insert(answer.to_string(), self.counts.len());
                self.counts.push((answer.to_string(), 1));
            }
        }
    }

    pub fn get(&self, answer: &str) -> Option<u32> {
        self.index.get(answer).map(|&pos| self.counts[pos].1)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(name, votes)| (name.as_str(), *votes))
    }
}

/// Parses the published CSV export and returns the top answers.
///
/// Never fails: rows without an answer cell are skipped. Fetch errors are the
/// caller's concern and never reach this point.
pub fn aggregate(raw: &str) -> Vec<RankedEntry> {
    let rows = raw
        .trim()
        .split('\n')
        .skip(1)
        .map(|line| parse_row(line.trim_end_matches('\r')));
    rank(&tally(rows), BOARD_SIZE)
}

/// Splits one CSV line into cells.
///
/// This is a narrow heuristic, not a CSV parser. When the line looks like
/// `timestamp, "answer, answer"` the quoted field becomes the answer cell
/// verbatim (embedded commas kept). Otherwise the line is split on every
/// comma, which breaks answers containing an unquoted comma.
pub fn parse_row(line: &str) -> RawRow {
    if let Some((timestamp, answers)) = split_quoted_answer(line) {
        return vec![timestamp.trim().to_string(), answers.to_string()];
    }
    line.split(',').map(|cell| cell.trim().to_string()).collect()
}

fn split_quoted_answer(line: &str) -> Option<(&str, &str)> {
    let comma = line.find(',')?;
    let rest = line[comma + 1..].trim_start();
    let quoted = rest.strip_prefix('"')?;
    let close = quoted.find('"')?;
    Some((&line[..comma], &quoted[..close]))
}

/// Splits an answer cell into trimmed, non-empty answers.
pub fn answer_tokens(cell: &str) -> impl Iterator<Item = &str> {
    cell.split(',').map(str::trim).filter(|token| !token.is_empty())
}

pub fn tally<I>(rows: I) -> AnswerTally
where
    I: IntoIterator<Item = RawRow>,
{
    let mut tally = AnswerTally::new();
    for row in rows {
        let Some(cell) = row.get(ANSWER_COLUMN) else {
            continue;
        };
        for answer in answer_tokens(cell) {
            tally.add(answer);
        }
    }
    tally
}

/// Top `limit` answers by votes. Ties keep first-seen order (stable sort).
pub fn rank(tally: &AnswerTally, limit: usize) -> Vec<RankedEntry> {
    let mut entries = tally
        .iter()
        .map(|(name, votes)| RankedEntry {
            name: name.to_string(),
            votes,
        })
        .collect::<Vec<_>>();
    entries.sort_by(|a, b| b.votes.cmp(&a.votes));
    entries.truncate(limit);
    entries
}
