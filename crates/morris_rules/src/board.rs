//! Board occupancy and the rule predicates built on top of it.

use super::position::{MILLS, POSITION_COUNT};
use super::{Player, Position, RuleViolation, Symbol};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// The 24-point board. Each point holds at most one piece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// Occupant of each point, indexed by [`Position::to_index`].
    cells: [Option<Symbol>; POSITION_COUNT],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            cells: [None; POSITION_COUNT],
        }
    }

    /// Returns the piece on `pos`, if any.
    pub fn occupant(&self, pos: Position) -> Option<Symbol> {
        self.cells[pos.to_index()]
    }

    /// Checks if a point is free.
    pub fn is_free(&self, pos: Position) -> bool {
        self.occupant(pos).is_none()
    }

    /// Checks if `pos` holds a piece of `symbol`.
    pub fn is_occupied_by(&self, pos: Position, symbol: Symbol) -> bool {
        self.occupant(pos) == Some(symbol)
    }

    /// Returns true if the two points share a board line segment.
    pub fn adjacent(&self, a: Position, b: Position) -> bool {
        a.is_adjacent(b)
    }

    /// Points holding a piece of `symbol`, in board order.
    pub fn positions_of(&self, symbol: Symbol) -> Vec<Position> {
        Position::ALL
            .iter()
            .copied()
            .filter(|pos| self.is_occupied_by(*pos, symbol))
            .collect()
    }

    /// Free points, in board order.
    pub fn free_positions(&self) -> Vec<Position> {
        Position::ALL
            .iter()
            .copied()
            .filter(|pos| self.is_free(*pos))
            .collect()
    }

    /// Number of pieces of `symbol` on the board.
    pub fn count(&self, symbol: Symbol) -> usize {
        self.cells.iter().filter(|c| **c == Some(symbol)).count()
    }

    /// Occupied points with their occupants, in board order.
    pub fn occupied(&self) -> impl Iterator<Item = (Position, Symbol)> + '_ {
        Position::ALL
            .iter()
            .filter_map(|pos| self.occupant(*pos).map(|symbol| (*pos, symbol)))
    }

    /// Places a piece of `player` on a free point and bumps their counters.
    #[instrument(skip(self, player), fields(symbol = %player.symbol()))]
    pub fn place(&mut self, pos: Position, player: &mut Player) -> Result<(), RuleViolation> {
        if !self.is_free(pos) {
            return Err(RuleViolation::Occupied(pos));
        }
        self.cells[pos.to_index()] = Some(player.symbol());
        player.record_placement();
        debug!(%pos, placed = player.pieces_placed(), "Piece placed");
        Ok(())
    }

    /// Moves a piece of `symbol` from `from` to `to`.
    ///
    /// The destination must be free and, unless `can_fly`, adjacent.
    #[instrument(skip(self))]
    pub fn move_piece(
        &mut self,
        from: Position,
        to: Position,
        symbol: Symbol,
        can_fly: bool,
    ) -> Result<(), RuleViolation> {
        self.check_move(from, to, symbol, can_fly)?;
        self.cells[from.to_index()] = None;
        self.cells[to.to_index()] = Some(symbol);
        debug!(%from, %to, "Piece moved");
        Ok(())
    }

    /// Validates a move without applying it.
    pub fn check_move(
        &self,
        from: Position,
        to: Position,
        symbol: Symbol,
        can_fly: bool,
    ) -> Result<(), RuleViolation> {
        if !self.is_occupied_by(from, symbol) {
            return Err(RuleViolation::NotOwnPiece(from));
        }
        if !self.is_free(to) {
            return Err(RuleViolation::Occupied(to));
        }
        if !can_fly && !self.adjacent(from, to) {
            return Err(RuleViolation::NotAdjacent { from, to });
        }
        Ok(())
    }

    /// Removes a piece of `player` and lowers their on-board count.
    #[instrument(skip(self, player), fields(symbol = %player.symbol()))]
    pub fn remove(&mut self, pos: Position, player: &mut Player) -> Result<(), RuleViolation> {
        if !self.is_occupied_by(pos, player.symbol()) {
            return Err(RuleViolation::NotOpponentPiece(pos));
        }
        self.cells[pos.to_index()] = None;
        player.record_capture();
        debug!(%pos, on_board = player.pieces_on_board(), "Piece removed");
        Ok(())
    }

    /// True iff some mill line through `pos` is fully held by `symbol`.
    pub fn forms_mill(&self, pos: Position, symbol: Symbol) -> bool {
        pos.mills()
            .any(|line| line.iter().all(|p| self.is_occupied_by(*p, symbol)))
    }

    /// Mill lines currently held by `symbol`.
    pub fn mills_of(&self, symbol: Symbol) -> Vec<[Position; 3]> {
        MILLS
            .iter()
            .copied()
            .filter(|line| line.iter().all(|p| self.is_occupied_by(*p, symbol)))
            .collect()
    }

    /// Every piece of `symbol` is part of a formed mill.
    ///
    /// Vacuously true when `symbol` has no pieces on the board.
    pub fn all_pieces_in_mills(&self, symbol: Symbol) -> bool {
        self.positions_of(symbol)
            .into_iter()
            .all(|pos| self.forms_mill(pos, symbol))
    }

    /// Free points a piece on `from` could reach.
    pub fn legal_destinations(&self, from: Position, can_fly: bool) -> Vec<Position> {
        if can_fly {
            self.free_positions()
        } else {
            from.neighbors()
                .iter()
                .copied()
                .filter(|to| self.is_free(*to))
                .collect()
        }
    }

    /// True if `symbol` has at least one legal move.
    pub fn has_any_move(&self, symbol: Symbol, can_fly: bool) -> bool {
        let pieces = self.positions_of(symbol);
        if can_fly {
            return !pieces.is_empty() && self.cells.iter().any(Option::is_none);
        }
        pieces
            .into_iter()
            .any(|from| from.neighbors().iter().any(|to| self.is_free(*to)))
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
