// Textual edit commands
//
// Lets the page editor be driven without a pointer: each command names pages
// by their 1-based position in the current sequence. Positions are resolved
// when the command runs, so later commands see the effect of earlier ones.
//
//   rotate 2          delete 3          rotate selected    delete selected
//   select 4          select 2-5        select all         deselect
//   move 1 4          undo              redo

use crate::ids::PageId;
use crate::models::EditorState;
use regex::Regex;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Unrecognized command: {0}")]
    Unrecognized(String),

    #[error("Page positions start at 1: {0}")]
    ZeroPosition(String),

    #[error("No page at position {position} ({page_count} pages)")]
    NoSuchPage { position: usize, page_count: usize },
}

/// One edit command; positions are 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditCommand {
    Rotate(usize),
    Delete(usize),
    RotateSelected,
    DeleteSelected,
    /// Toggle one page in the selection
    Select(usize),
    /// Add an inclusive range to the selection
    SelectRange(usize, usize),
    SelectAll,
    Deselect,
    /// Drag the page at `from` onto the page at `to`
    Move { from: usize, to: usize },
    Undo,
    Redo,
}

impl EditCommand {
    /// Run the command against `state`, returning whether anything changed
    pub fn apply(self, state: &mut EditorState) -> Result<bool, ScriptError> {
        let applied = match self {
            EditCommand::Rotate(position) => {
                let id = page_at(state, position)?;
                state.rotate_page(&id)
            }
            EditCommand::Delete(position) => {
                let id = page_at(state, position)?;
                state.remove_page(&id)
            }
            EditCommand::RotateSelected => state.rotate_selected(),
            EditCommand::DeleteSelected => state.remove_selected(),
            EditCommand::Select(position) => {
                let id = page_at(state, position)?;
                state.toggle_page_selection(&id)
            }
            EditCommand::SelectRange(first, last) => {
                let anchor = page_at(state, first)?;
                let target = page_at(state, last)?;
                state.extend_selection(&anchor, &target)
            }
            EditCommand::SelectAll => {
                state.select_all_pages();
                true
            }
            EditCommand::Deselect => {
                state.deselect_all_pages();
                true
            }
            EditCommand::Move { from, to } => {
                let active = page_at(state, from)?;
                let over = page_at(state, to)?;
                state.drop_page(&active, &over)
            }
            EditCommand::Undo => state.undo(),
            EditCommand::Redo => state.redo(),
        };
        Ok(applied)
    }
}

impl fmt::Display for EditCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditCommand::Rotate(p) => write!(f, "rotate {}", p),
            EditCommand::Delete(p) => write!(f, "delete {}", p),
            EditCommand::RotateSelected => f.write_str("rotate selected"),
            EditCommand::DeleteSelected => f.write_str("delete selected"),
            EditCommand::Select(p) => write!(f, "select {}", p),
            EditCommand::SelectRange(a, b) => write!(f, "select {}-{}", a, b),
            EditCommand::SelectAll => f.write_str("select all"),
            EditCommand::Deselect => f.write_str("deselect"),
            EditCommand::Move { from, to } => write!(f, "move {} {}", from, to),
            EditCommand::Undo => f.write_str("undo"),
            EditCommand::Redo => f.write_str("redo"),
        }
    }
}

fn page_at(state: &EditorState, position: usize) -> Result<PageId, ScriptError> {
    position
        .checked_sub(1)
        .and_then(|index| state.pages.get(index))
        .map(|page| page.unique_id.clone())
        .ok_or(ScriptError::NoSuchPage {
            position,
            page_count: state.pages.len(),
        })
}

/// Parser for edit commands
pub struct ScriptParser {
    /// `rotate 3`, `delete 3`
    single_pattern: Regex,

    /// `rotate selected`, `delete selected`
    selected_pattern: Regex,

    /// `select 3`, `select 2-5`
    select_pattern: Regex,

    /// `move 1 4`
    move_pattern: Regex,
}

impl ScriptParser {
    pub fn new() -> Self {
        Self {
            single_pattern: Regex::new(r"^(rotate|delete)\s+(\d+)$").expect("Invalid page regex"),
            selected_pattern: Regex::new(r"^(rotate|delete)\s+selected$")
                .expect("Invalid selected regex"),
            select_pattern: Regex::new(r"^select\s+(\d+)(?:\s*-\s*(\d+))?$")
                .expect("Invalid select regex"),
            move_pattern: Regex::new(r"^move\s+(\d+)\s+(\d+)$").expect("Invalid move regex"),
        }
    }

    /// Parse a single command; case and surrounding whitespace are ignored
    pub fn parse_command(&self, text: &str) -> Result<EditCommand, ScriptError> {
        let line = text.trim().to_ascii_lowercase();
        let unrecognized = || ScriptError::Unrecognized(text.trim().to_string());

        match line.as_str() {
            "undo" => return Ok(EditCommand::Undo),
            "redo" => return Ok(EditCommand::Redo),
            "select all" => return Ok(EditCommand::SelectAll),
            "deselect" | "select none" => return Ok(EditCommand::Deselect),
            _ => {}
        }

        let position = |digits: &str| -> Result<usize, ScriptError> {
            match digits.parse::<usize>() {
                Ok(0) => Err(ScriptError::ZeroPosition(text.trim().to_string())),
                Ok(n) => Ok(n),
                Err(_) => Err(unrecognized()),
            }
        };

        if let Some(caps) = self.single_pattern.captures(&line) {
            let p = position(&caps[2])?;
            return Ok(match &caps[1] {
                "rotate" => EditCommand::Rotate(p),
                _ => EditCommand::Delete(p),
            });
        }

        if let Some(caps) = self.selected_pattern.captures(&line) {
            return Ok(match &caps[1] {
                "rotate" => EditCommand::RotateSelected,
                _ => EditCommand::DeleteSelected,
            });
        }

        if let Some(caps) = self.select_pattern.captures(&line) {
            let first = position(&caps[1])?;
            return Ok(match caps.get(2) {
                Some(last) => EditCommand::SelectRange(first, position(last.as_str())?),
                None => EditCommand::Select(first),
            });
        }

        if let Some(caps) = self.move_pattern.captures(&line) {
            return Ok(EditCommand::Move {
                from: position(&caps[1])?,
                to: position(&caps[2])?,
            });
        }

        Err(unrecognized())
    }

    /// Parse a script of commands separated by `;` or newlines. Blank
    /// entries and `#` comments are skipped.
    pub fn parse_script(&self, script: &str) -> Result<Vec<EditCommand>, ScriptError> {
        script
            .split([';', '\n'])
            .map(str::trim)
            .filter(|entry| !entry.is_empty() && !entry.starts_with('#'))
            .map(|entry| self.parse_command(entry))
            .collect()
    }
}

impl Default for ScriptParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FileId;
    use crate::models::{PageRef, Rotation};

    fn state_with_pages(count: usize) -> EditorState {
        let mut state = EditorState::default();
        let file = FileId::from("f");
        state.pages = (0..count)
            .map(|i| PageRef::new(file.clone(), i, None))
            .collect();
        state
    }

    fn source_order(state: &EditorState) -> Vec<usize> {
        state.pages.iter().map(|p| p.source_index).collect()
    }

    #[test]
    fn test_parse_commands() {
        let parser = ScriptParser::new();
        assert_eq!(parser.parse_command("rotate 2"), Ok(EditCommand::Rotate(2)));
        assert_eq!(parser.parse_command("  Delete 10 "), Ok(EditCommand::Delete(10)));
        assert_eq!(
            parser.parse_command("rotate selected"),
            Ok(EditCommand::RotateSelected)
        );
        assert_eq!(parser.parse_command("select 3"), Ok(EditCommand::Select(3)));
        assert_eq!(
            parser.parse_command("select 2 - 5"),
            Ok(EditCommand::SelectRange(2, 5))
        );
        assert_eq!(
            parser.parse_command("move 1 4"),
            Ok(EditCommand::Move { from: 1, to: 4 })
        );
        assert_eq!(parser.parse_command("UNDO"), Ok(EditCommand::Undo));
        assert_eq!(parser.parse_command("deselect"), Ok(EditCommand::Deselect));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let parser = ScriptParser::new();
        assert_eq!(
            parser.parse_command("rotate 0"),
            Err(ScriptError::ZeroPosition("rotate 0".to_string()))
        );
        assert_eq!(
            parser.parse_command("spin 2"),
            Err(ScriptError::Unrecognized("spin 2".to_string()))
        );
        assert!(parser.parse_command("move 1").is_err());
        assert!(parser.parse_command("rotate 99999999999999999999999").is_err());
    }

    #[test]
    fn test_parse_script() {
        let parser = ScriptParser::new();
        let commands = parser
            .parse_script("select 1-2; move 1 4\n# comment\n\nrotate selected;")
            .unwrap();

        assert_eq!(
            commands,
            vec![
                EditCommand::SelectRange(1, 2),
                EditCommand::Move { from: 1, to: 4 },
                EditCommand::RotateSelected,
            ]
        );
    }

    #[test]
    fn test_display_parses_back() {
        let parser = ScriptParser::new();
        let command = EditCommand::SelectRange(2, 7);
        assert_eq!(parser.parse_command(&command.to_string()), Ok(command));
    }

    #[test]
    fn test_apply_block_move_by_position() {
        let mut state = state_with_pages(5);

        EditCommand::SelectRange(1, 2).apply(&mut state).unwrap();
        let moved = EditCommand::Move { from: 1, to: 4 }.apply(&mut state).unwrap();

        assert!(moved);
        assert_eq!(source_order(&state), vec![2, 3, 0, 1, 4]);
    }

    #[test]
    fn test_apply_resolves_positions_at_run_time() {
        let mut state = state_with_pages(3);

        EditCommand::Delete(1).apply(&mut state).unwrap();
        EditCommand::Rotate(1).apply(&mut state).unwrap();

        assert_eq!(source_order(&state), vec![1, 2]);
        assert_eq!(state.pages[0].rotation, Rotation::from_degrees(90).unwrap());

        assert_eq!(
            EditCommand::Rotate(3).apply(&mut state),
            Err(ScriptError::NoSuchPage {
                position: 3,
                page_count: 2
            })
        );
    }
}
