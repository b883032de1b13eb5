//! PGN output of game results.

use crate::roster::Names;
use rating_core::Game;
use std::io::Write;

/// Writes `games` as PGN with the Event, White, Black and Result tags and
/// the result alone as movetext.
///
/// # Arguments
///
/// * `writer` - Destination of the PGN text.
/// * `event` - Value of the Event tag.
/// * `names` - Name table the game ids refer to.
/// * `games` - Games to write, in order.
///
/// # Errors
///
/// Returns the first I/O error from `writer`.
pub fn write_pgn<W: Write>(mut writer: W, event: &str, names: &Names, games: &[Game]) -> std::io::Result<()> {
    for game in games {
        let result = game.outcome.as_pgn();
        writeln!(writer, "[Event \"{event}\"]")?;
        writeln!(writer, "[White \"{}\"]", names.name(game.white).unwrap_or("?"))?;
        writeln!(writer, "[Black \"{}\"]", names.name(game.black).unwrap_or("?"))?;
        writeln!(writer, "[Result \"{result}\"]")?;
        writeln!(writer)?;
        writeln!(writer, "{result}")?;
        writeln!(writer)?;
    }
    writer.flush()
}
