//! Text, CSV and JSON rating reports.
//!
//! Every writer takes a [`ReportView`], which joins the solve result with
//! the name table and, when errors were simulated, the simulation summary.

use rating_core::{gauss, Connectivity, PlayerId, RatingReport, Record, SimulationSummary};
use rating_pgn::Names;
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

/// Errors raised while writing a report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode JSON report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything a report reads.
#[derive(Debug, Clone, Copy)]
pub struct ReportView<'a> {
    pub names: &'a Names,
    pub report: &'a RatingReport,
    pub summary: Option<&'a SimulationSummary>,
    /// Confidence for errors, in percent.
    pub confidence: f64,
}

/// One ranked line of the table.
#[derive(Debug, Clone, PartialEq)]
struct Row<'a> {
    rank: usize,
    id: PlayerId,
    name: &'a str,
    record: Record,
    rating: f64,
    error: Option<f64>,
    points: f64,
    played: u64,
}

impl Row<'_> {
    fn percent(&self) -> f64 {
        if self.played == 0 {
            0.0
        } else {
            100.0 * self.points / self.played as f64
        }
    }
}

impl<'a> ReportView<'a> {
    /// Competitors with games, strongest first.
    fn rows(&self) -> Vec<Row<'a>> {
        let report = self.report;
        let mut ids: Vec<PlayerId> = (0..report.ratings.len())
            .filter(|&i| report.records.get(i).is_some_and(|r| *r != Record::NoGames))
            .collect();
        ids.sort_by(|&a, &b| report.ratings[b].total_cmp(&report.ratings[a]).then(a.cmp(&b)));

        ids.into_iter()
            .enumerate()
            .map(|(k, id)| Row {
                rank: k + 1,
                id,
                name: self.names.name(id).unwrap_or("?"),
                record: report.records[id],
                rating: report.ratings[id],
                error: self.summary.map(|s| s.error(id, self.confidence)),
                points: report.obtained[id],
                played: report.played[id],
            })
            .collect()
    }

    fn z(&self) -> f64 {
        gauss::confidence_to_z(self.confidence / 100.0)
    }

    fn white_advantage_error(&self) -> Option<f64> {
        self.summary.map(|s| self.z() * s.white_advantage_sdev)
    }

    fn draw_rate_error(&self) -> Option<f64> {
        self.summary.map(|s| self.z() * s.draw_rate_sdev)
    }
}

/// Writes the ranked rating table followed by the model parameters.
///
/// # Errors
///
/// Returns the first I/O error from `writer`.
pub fn write_text<W: Write>(mut writer: W, view: &ReportView<'_>) -> Result<(), ReportError> {
    let rows = view.rows();
    let width = rows.iter().map(|r| r.name.chars().count()).max().unwrap_or(0).max(6);

    writeln!(
        writer,
        "{:>4} {:<width$}     : {:>7} {:>6} {:>7} {:>6} {:>6}",
        "#", "PLAYER", "RATING", "ERROR", "POINTS", "PLAYED", "(%)"
    )?;
    for row in &rows {
        let error = row.error.map_or_else(|| "-".to_string(), |e| format!("{e:.1}"));
        writeln!(
            writer,
            "{:>4} {:<width$} {} : {:>7.1} {:>6} {:>7.1} {:>6} {:>6.1}",
            row.rank,
            row.name,
            row.record.marker(),
            row.rating,
            error,
            row.points,
            row.played,
            row.percent()
        )?;
    }
    writeln!(writer)?;

    let report = view.report;
    match view.white_advantage_error() {
        Some(e) => writeln!(writer, "White advantage = {:.2} +/- {e:.2}", report.white_advantage)?,
        None => writeln!(writer, "White advantage = {:.2}", report.white_advantage)?,
    }
    match view.draw_rate_error() {
        Some(e) => writeln!(
            writer,
            "Draw rate (equal opponents) = {:.2} % +/- {:.2}",
            100.0 * report.draw_rate,
            100.0 * e
        )?,
        None => writeln!(writer, "Draw rate (equal opponents) = {:.2} %", 100.0 * report.draw_rate)?,
    }
    if let Some(summary) = view.summary {
        writeln!(
            writer,
            "Errors at {}% confidence from {} simulations",
            view.confidence, summary.rounds
        )?;
    }
    writer.flush()?;
    Ok(())
}

fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Writes the rating table as CSV.
///
/// # Errors
///
/// Returns the first I/O error from `writer`.
pub fn write_csv<W: Write>(mut writer: W, view: &ReportView<'_>) -> Result<(), ReportError> {
    writeln!(writer, "\"#\",\"Player\",\"Record\",\"Rating\",\"Error\",\"Points\",\"Played\",\"(%)\"")?;
    for row in view.rows() {
        let error = row.error.map_or_else(|| "\"-\"".to_string(), |e| format!("{e:.1}"));
        writeln!(
            writer,
            "{},{},{},{:.1},{},{:.1},{},{:.1}",
            row.rank,
            quoted(row.name),
            quoted(row.record.marker().trim()),
            row.rating,
            error,
            row.points,
            row.played,
            row.percent()
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// JSON form of the rating report.
#[derive(Debug, Serialize)]
struct ReportJson<'a> {
    confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    simulations: Option<usize>,
    white_advantage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    white_advantage_error: Option<f64>,
    draw_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    draw_rate_error: Option<f64>,
    groups: usize,
    players: Vec<PlayerJson<'a>>,
}

#[derive(Debug, Serialize)]
struct PlayerJson<'a> {
    rank: usize,
    name: &'a str,
    rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<f64>,
    points: f64,
    played: u64,
    percent: f64,
    record: Record,
    wins: u64,
    draws: u64,
    losses: u64,
    opponents: usize,
    average_opponent: f64,
    diversity: f64,
}

/// Writes the full report as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`ReportError::Json`] if encoding or writing fails.
pub fn write_json<W: Write>(writer: W, view: &ReportView<'_>) -> Result<(), ReportError> {
    let report = view.report;
    let players = view
        .rows()
        .into_iter()
        .map(|row| {
            let perf = report.performance.get(row.id).copied().unwrap_or_default();
            PlayerJson {
                rank: row.rank,
                name: row.name,
                rating: row.rating,
                error: row.error,
                points: row.points,
                played: row.played,
                percent: row.percent(),
                record: row.record,
                wins: perf.wins,
                draws: perf.draws,
                losses: perf.losses,
                opponents: perf.opponents,
                average_opponent: perf.average_opponent,
                diversity: perf.diversity,
            }
        })
        .collect();

    let json = ReportJson {
        confidence: view.confidence,
        simulations: view.summary.map(|s| s.rounds),
        white_advantage: report.white_advantage,
        white_advantage_error: view.white_advantage_error(),
        draw_rate: report.draw_rate,
        draw_rate_error: view.draw_rate_error(),
        groups: report.connectivity.groups.len(),
        players,
    };
    serde_json::to_writer_pretty(writer, &json)?;
    Ok(())
}

/// Writes the matrix of rating-difference errors between every two ranked
/// competitors as CSV.
///
/// # Errors
///
/// Returns the first I/O error from `writer`.
pub fn write_head_to_head<W: Write>(
    mut writer: W,
    view: &ReportView<'_>,
    summary: &SimulationSummary,
) -> Result<(), ReportError> {
    let rows = view.rows();
    let header: Vec<String> = rows.iter().map(|r| quoted(r.name)).collect();
    writeln!(writer, "\"\",{}", header.join(","))?;
    for a in &rows {
        let cells: Vec<String> = rows
            .iter()
            .map(|b| {
                if a.id == b.id {
                    "\"-\"".to_string()
                } else {
                    format!("{:.1}", summary.pair_error(a.id, b.id, view.confidence))
                }
            })
            .collect();
        writeln!(writer, "{},{}", quoted(a.name), cells.join(","))?;
    }
    writer.flush()?;
    Ok(())
}

fn group_list(indices: &[usize]) -> String {
    if indices.is_empty() {
        "none".to_string()
    } else {
        indices.iter().map(|g| (g + 1).to_string()).collect::<Vec<_>>().join(", ")
    }
}

/// Lists the groups of the connectivity analysis with their members and
/// the groups each one beat or lost to.
///
/// # Errors
///
/// Returns the first I/O error from `writer`.
pub fn write_groups<W: Write>(mut writer: W, names: &Names, connectivity: &Connectivity) -> Result<(), ReportError> {
    writeln!(
        writer,
        "Groups: {}, encounters within groups: {}, between groups: {}, ignored: {}",
        connectivity.groups.len(),
        connectivity.intra_group,
        connectivity.inter_group,
        connectivity.ignored
    )?;
    for (index, group) in connectivity.groups.iter().enumerate() {
        writeln!(writer)?;
        writeln!(writer, "Group {} ({} competitors)", index + 1, group.members.len())?;
        for &member in &group.members {
            writeln!(writer, "  {}", names.name(member).unwrap_or("?"))?;
        }
        writeln!(writer, "  beat groups: {}", group_list(&group.beats))?;
        writeln!(writer, "  lost to groups: {}", group_list(&group.lost_to))?;
    }
    writer.flush()?;
    Ok(())
}
