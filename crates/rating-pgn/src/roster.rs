//! Name tables.

use crate::csv;
use crate::reader::PgnError;
use rating_core::PlayerId;
use std::collections::HashMap;
use std::io::BufRead;

/// Interned player names. Ids are assigned in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct Names {
    ids: HashMap<String, PlayerId>,
    names: Vec<String>,
    synonyms: Synonyms,
}

impl Names {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name table that maps aliases to their main name before interning.
    pub fn with_synonyms(synonyms: Synonyms) -> Self {
        Self {
            synonyms,
            ..Self::default()
        }
    }

    /// Returns the id of `name`, adding it if new.
    pub fn intern(&mut self, name: &str) -> PlayerId {
        let name = self.synonyms.canonical(name.trim()).to_string();
        if let Some(&id) = self.ids.get(&name) {
            return id;
        }
        let id = self.names.len();
        self.ids.insert(name.clone(), id);
        self.names.push(name);
        id
    }

    /// Id of an already interned `name`.
    pub fn find(&self, name: &str) -> Option<PlayerId> {
        self.ids.get(self.synonyms.canonical(name.trim())).copied()
    }

    pub fn name(&self, id: PlayerId) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Alias table read from lines of `main, alias, alias...`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Synonyms {
    main_of: HashMap<String, String>,
}

impl Synonyms {
    /// Reads a synonym table.
    ///
    /// # Errors
    ///
    /// Returns [`PgnError::Io`] on read failure and [`PgnError::Malformed`]
    /// when an alias is already mapped to a different main name.
    pub fn read<R: BufRead>(reader: R) -> Result<Self, PgnError> {
        let mut out = Self::default();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if csv::is_skippable(&line) {
                continue;
            }
            let fields = csv::fields(&line);
            let Some((main, aliases)) = fields.split_first() else {
                continue;
            };
            for alias in aliases.iter().filter(|a| !a.is_empty()) {
                if let Some(previous) = out.main_of.get(alias) {
                    if previous != main {
                        return Err(PgnError::Malformed {
                            line: index + 1,
                            reason: format!("alias \"{alias}\" already belongs to \"{previous}\""),
                        });
                    }
                }
                out.main_of.insert(alias.clone(), main.clone());
            }
        }
        tracing::debug!(aliases = out.main_of.len(), "synonyms loaded");
        Ok(out)
    }

    /// Main name of `name`, or `name` itself when it is not an alias.
    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.main_of.get(name).map_or(name, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.main_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.main_of.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_assigns_ids_in_order() {
        let mut names = Names::new();
        assert_eq!(names.intern("Carlsen"), 0);
        assert_eq!(names.intern("Nakamura"), 1);
        assert_eq!(names.intern(" Carlsen "), 0);
        assert_eq!(names.find("Nakamura"), Some(1));
        assert_eq!(names.find("Caruana"), None);
        assert_eq!(names.name(1), Some("Nakamura"));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_synonyms_map_to_main_name() {
        let table = "Stockfish 16, SF16, \"Stockfish-16\"\n\n# comment\nKomodo, Dragon\n";
        let synonyms = Synonyms::read(table.as_bytes()).expect("valid table");
        assert_eq!(synonyms.len(), 3);
        let mut names = Names::with_synonyms(synonyms);
        let a = names.intern("SF16");
        let b = names.intern("Stockfish-16");
        let c = names.intern("Stockfish 16");
        assert_eq!((a, b, c), (0, 0, 0));
        assert_eq!(names.name(0), Some("Stockfish 16"));
        assert_eq!(names.find("Dragon"), None);
        assert_eq!(names.intern("Dragon"), 1);
        assert_eq!(names.find("Komodo"), Some(1));
    }

    #[test]
    fn test_conflicting_alias_is_rejected() {
        let table = "A, x\nB, x\n";
        let err = Synonyms::read(table.as_bytes()).unwrap_err();
        assert!(matches!(err, PgnError::Malformed { line: 2, .. }));
    }
}
