//! Result readers: PGN tag pairs, CSV game tables and the prior and anchor
//! side tables.

use crate::csv;
use crate::roster::Names;
use rating_core::{Game, Outcome, PlayerId, Prior, RelativePrior};
use std::io::BufRead;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while reading result files.
#[derive(Error, Debug)]
pub enum PgnError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("line {line}: unknown player \"{name}\"")]
    UnknownName { line: usize, name: String },
}

/// Tags collected for the game being read.
#[derive(Debug, Default)]
struct PendingGame {
    white: Option<String>,
    black: Option<String>,
    result: Option<String>,
    has_tags: bool,
    has_moves: bool,
}

impl PendingGame {
    fn outcome(&self) -> Outcome {
        match self.result.as_deref().map(str::trim) {
            Some("1-0") => Outcome::WhiteWins,
            Some("0-1") => Outcome::BlackWins,
            Some("1/2-1/2" | "=-=") => Outcome::Draw,
            _ => Outcome::Discard,
        }
    }

    /// True if `tag` sets a field this game already holds, so it opens the
    /// next game.
    fn already_has(&self, tag: Option<(&str, &str)>) -> bool {
        match tag {
            Some(("White", _)) => self.white.is_some(),
            Some(("Black", _)) => self.black.is_some(),
            Some(("Result", _)) => self.result.is_some(),
            _ => false,
        }
    }

    /// Turns the collected tags into a game, interning both names.
    fn finish(self, names: &mut Names, line: usize, games: &mut Vec<Game>) {
        if !self.has_tags {
            return;
        }
        let outcome = self.outcome();
        match (self.white, self.black) {
            (Some(w), Some(b)) => {
                let white = names.intern(&w);
                let black = names.intern(&b);
                games.push(Game::new(white, black, outcome));
            }
            _ => warn!(line, "game without White or Black tag skipped"),
        }
    }
}

/// Parses `[Name "Value"]`.
fn tag_pair(line: &str) -> Option<(&str, &str)> {
    let inner = line.trim().strip_prefix('[')?.strip_suffix(']')?;
    let (name, rest) = inner.split_once(char::is_whitespace)?;
    let value = rest.trim().strip_prefix('"')?.strip_suffix('"')?;
    Some((name, value))
}

/// Movetext scanner state that spans lines.
#[derive(Debug, Default)]
struct Movetext {
    in_comment: bool,
    variation_depth: usize,
}

impl Movetext {
    fn is_idle(&self) -> bool {
        !self.in_comment && self.variation_depth == 0
    }

    /// Consumes one line of movetext. Returns true if it held any moves or
    /// result tokens outside comments.
    fn scan(&mut self, line: &str) -> bool {
        let mut content = false;
        for c in line.chars() {
            if self.in_comment {
                if c == '}' {
                    self.in_comment = false;
                }
                continue;
            }
            match c {
                '{' => self.in_comment = true,
                ';' => break,
                '(' => self.variation_depth += 1,
                ')' => self.variation_depth = self.variation_depth.saturating_sub(1),
                c if c.is_whitespace() => {}
                _ => content = true,
            }
        }
        content
    }
}

/// Reads every game from PGN text.
///
/// Only the `White`, `Black` and `Result` tags are used. Games with an
/// unfinished or missing result are kept as [`Outcome::Discard`] so both
/// players still appear in the table; games missing a player tag are
/// skipped.
///
/// # Errors
///
/// Returns [`PgnError::Io`] if the reader fails.
pub fn read_pgn<R: BufRead>(reader: R, names: &mut Names) -> Result<Vec<Game>, PgnError> {
    let mut games = Vec::new();
    let mut pending = PendingGame::default();
    let mut movetext = Movetext::default();
    let mut line_no = 0;

    for line in reader.lines() {
        let line = line?;
        line_no += 1;
        if line.starts_with('%') {
            continue;
        }

        if movetext.is_idle() && line.trim_start().starts_with('[') {
            let tag = tag_pair(&line);
            if pending.has_moves || pending.already_has(tag) {
                std::mem::take(&mut pending).finish(names, line_no, &mut games);
            }
            match tag {
                Some(("White", v)) => pending.white = Some(v.to_string()),
                Some(("Black", v)) => pending.black = Some(v.to_string()),
                Some(("Result", v)) => pending.result = Some(v.to_string()),
                Some(_) => {}
                None => debug!(line = line_no, "unreadable tag pair ignored"),
            }
            pending.has_tags = true;
            continue;
        }

        if movetext.scan(&line) {
            pending.has_moves = true;
        }
    }
    pending.finish(names, line_no, &mut games);

    debug!(games = games.len(), players = names.len(), "PGN read");
    Ok(games)
}

fn result_field(field: &str) -> Option<Outcome> {
    match field.trim() {
        "1" | "1-0" => Some(Outcome::WhiteWins),
        "0" | "0-1" => Some(Outcome::BlackWins),
        "=" | "0.5" | "1/2" | "1/2-1/2" => Some(Outcome::Draw),
        _ => None,
    }
}

/// Reads games from lines of `"white","black",result`.
///
/// The result is the white score: `1`, `0`, `0.5` or `=`.
///
/// # Errors
///
/// Returns [`PgnError::Malformed`] for a line without three fields or with
/// an unknown result.
pub fn read_csv_games<R: BufRead>(reader: R, names: &mut Names) -> Result<Vec<Game>, PgnError> {
    let mut games = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if csv::is_skippable(&line) {
            continue;
        }
        let fields = csv::fields(&line);
        let [white, black, result] = fields.as_slice() else {
            return Err(PgnError::Malformed {
                line: index + 1,
                reason: format!("expected 3 fields, found {}", fields.len()),
            });
        };
        let Some(outcome) = result_field(result) else {
            return Err(PgnError::Malformed {
                line: index + 1,
                reason: format!("unknown result \"{result}\""),
            });
        };
        let white = names.intern(white);
        let black = names.intern(black);
        games.push(Game::new(white, black, outcome));
    }
    Ok(games)
}

/// Reads a table whose rows start with `names` fields followed by numbers.
fn read_table<R, T, F>(reader: R, name_fields: usize, numbers: usize, mut row: F) -> Result<Vec<T>, PgnError>
where
    R: BufRead,
    F: FnMut(usize, &[String], &[f64]) -> Result<T, PgnError>,
{
    let mut out = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if csv::is_skippable(&line) {
            continue;
        }
        let fields = csv::fields(&line);
        if fields.len() != name_fields + numbers {
            return Err(PgnError::Malformed {
                line: index + 1,
                reason: format!("expected {} fields, found {}", name_fields + numbers, fields.len()),
            });
        }
        let (names, rest) = fields.split_at(name_fields);
        let values = rest
            .iter()
            .map(|f| csv::number(f))
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| PgnError::Malformed {
                line: index + 1,
                reason: "expected a number".to_string(),
            })?;
        out.push(row(index + 1, names, &values)?);
    }
    Ok(out)
}

fn lookup(names: &Names, line: usize, name: &str) -> Result<PlayerId, PgnError> {
    names.find(name).ok_or_else(|| PgnError::UnknownName {
        line,
        name: name.to_string(),
    })
}

/// Reads absolute priors from lines of `"name", rating, sigma`.
///
/// # Errors
///
/// Returns [`PgnError::UnknownName`] for a player not in `names` and
/// [`PgnError::Malformed`] for a bad row.
pub fn read_priors<R: BufRead>(reader: R, names: &Names) -> Result<Vec<(PlayerId, Prior)>, PgnError> {
    read_table(reader, 1, 2, |line, n, v| {
        Ok((lookup(names, line, &n[0])?, Prior::new(v[0], v[1])))
    })
}

/// Reads relative priors from lines of `"a", "b", delta, sigma`, each
/// stating that `a` is rated `delta` above `b`.
///
/// # Errors
///
/// As [`read_priors`].
pub fn read_relative_priors<R: BufRead>(reader: R, names: &Names) -> Result<Vec<RelativePrior>, PgnError> {
    read_table(reader, 2, 2, |line, n, v| {
        Ok(RelativePrior {
            a: lookup(names, line, &n[0])?,
            b: lookup(names, line, &n[1])?,
            delta: v[0],
            sigma: v[1],
        })
    })
}

/// Reads fixed ratings from lines of `"name", rating`.
///
/// # Errors
///
/// As [`read_priors`].
pub fn read_anchors<R: BufRead>(reader: R, names: &Names) -> Result<Vec<(PlayerId, f64)>, PgnError> {
    read_table(reader, 1, 1, |line, n, v| Ok((lookup(names, line, &n[0])?, v[0])))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[Event "Test"]
[White "Alpha"]
[Black "Beta"]
[Result "1-0"]

1. e4 {a [bracketed] comment
spanning lines} e5 (1... c5 2. Nf3) 2. Nf3 ; rest ignored [x]
1-0

[White "Beta"]
[Black "Gamma"]
[Result "1/2-1/2"]

1. d4 d5 1/2-1/2

[White "Gamma"]
[Black "Alpha"]
[Result "*"]

1. c4 *

[White "Delta"]
[Result "0-1"]

1. e4 0-1
"#;

    #[test]
    fn test_read_pgn_collects_results() {
        let mut names = Names::new();
        let games = read_pgn(SAMPLE.as_bytes(), &mut names).expect("readable");
        assert_eq!(
            games,
            vec![
                Game::new(0, 1, Outcome::WhiteWins),
                Game::new(1, 2, Outcome::Draw),
                Game::new(2, 0, Outcome::Discard),
            ]
        );
        assert_eq!(names.len(), 3);
        assert_eq!(names.find("Gamma"), Some(2));
    }

    #[test]
    fn test_read_pgn_handles_missing_blank_line() {
        let text = "[White \"A\"]\n[Black \"B\"]\n[Result \"0-1\"]\n1. e4 0-1\n[White \"B\"]\n[Black \"A\"]\n[Result \"=-=\"]\n";
        let mut names = Names::new();
        let games = read_pgn(text.as_bytes(), &mut names).expect("readable");
        assert_eq!(
            games,
            vec![Game::new(0, 1, Outcome::BlackWins), Game::new(1, 0, Outcome::Draw)]
        );
    }

    #[test]
    fn test_read_pgn_splits_header_only_games() {
        let text = "[White \"A\"]\n[Black \"B\"]\n[Result \"1-0\"]\n\n[White \"C\"]\n[Black \"A\"]\n[Result \"1/2-1/2\"]\n";
        let mut names = Names::new();
        let games = read_pgn(text.as_bytes(), &mut names).expect("readable");
        assert_eq!(
            games,
            vec![Game::new(0, 1, Outcome::WhiteWins), Game::new(2, 0, Outcome::Draw)]
        );
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_tag_pair() {
        assert_eq!(tag_pair(r#"[White "Carlsen, Magnus"]"#), Some(("White", "Carlsen, Magnus")));
        assert_eq!(tag_pair("[White]"), None);
    }

    #[test]
    fn test_read_csv_games() {
        let text = "\"A\",\"B\",1\n# comment\n\"B\",\"C\",=\nC, A, 0.5\nA,C,0\n";
        let mut names = Names::new();
        let games = read_csv_games(text.as_bytes(), &mut names).expect("valid");
        assert_eq!(
            games,
            vec![
                Game::new(0, 1, Outcome::WhiteWins),
                Game::new(1, 2, Outcome::Draw),
                Game::new(2, 0, Outcome::Draw),
                Game::new(0, 2, Outcome::BlackWins),
            ]
        );
    }

    #[test]
    fn test_read_csv_games_rejects_bad_result() {
        let mut names = Names::new();
        let err = read_csv_games("A,B,2\n".as_bytes(), &mut names).unwrap_err();
        assert!(matches!(err, PgnError::Malformed { line: 1, .. }));
    }

    fn known() -> Names {
        let mut names = Names::new();
        names.intern("A");
        names.intern("B");
        names
    }

    #[test]
    fn test_read_priors() {
        let priors = read_priors("\"B\", 2100, 50\n".as_bytes(), &known()).expect("valid");
        assert_eq!(priors, vec![(1, Prior::new(2100.0, 50.0))]);
    }

    #[test]
    fn test_read_relative_priors() {
        let rel = read_relative_priors("A, B, 30, 10\n".as_bytes(), &known()).expect("valid");
        assert_eq!(rel[0].a, 0);
        assert_eq!(rel[0].b, 1);
        assert_eq!(rel[0].delta, 30.0);
    }

    #[test]
    fn test_read_anchors_unknown_name() {
        let err = read_anchors("A, 2000\nZ, 1800\n".as_bytes(), &known()).unwrap_err();
        match err {
            PgnError::UnknownName { line, name } => {
                assert_eq!(line, 2);
                assert_eq!(name, "Z");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_anchors_wrong_field_count() {
        let err = read_anchors("A, 2000, 5\n".as_bytes(), &known()).unwrap_err();
        assert!(matches!(err, PgnError::Malformed { line: 1, .. }));
    }
}
