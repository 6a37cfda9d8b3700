//! Position arithmetic for ordered siblings.
//!
//! Every scope (the columns of one board, the tasks of one column) keeps its
//! positions dense: exactly `0..len` with no duplicates or gaps. The functions
//! here compute which sibling positions must move, and by how much, for each
//! kind of change. They never touch storage; the caller applies the returned
//! [`Shift`]s to the scope and writes the moved entity at the returned target.
//!
//! Out-of-range targets are clamped to the nearest valid boundary instead of
//! rejected. Type and sign checking of client input happens before these
//! functions are reached.

/// A bulk position adjustment: add `delta` to every sibling whose position
/// lies in `[start, end)`. An `end` of `None` leaves the range open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub start: i64,
    pub end: Option<i64>,
    pub delta: i64,
}

impl Shift {
    /// Whether a sibling at `position` is moved by this shift.
    pub fn covers(&self, position: i64) -> bool {
        position >= self.start && self.end.is_none_or(|end| position < end)
    }

    /// The position a sibling ends up at after this shift.
    pub fn apply(&self, position: i64) -> i64 {
        if self.covers(position) {
            position + self.delta
        } else {
            position
        }
    }
}

/// Result of planning a move inside one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    /// Final (clamped) position of the moved entity.
    pub target: i64,
    /// Siblings to adjust, or `None` when the move is a no-op.
    pub shift: Option<Shift>,
}

impl MovePlan {
    pub fn is_noop(&self) -> bool {
        self.shift.is_none()
    }
}

/// Result of planning a move from one scope into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossMovePlan {
    /// Applied to the scope the entity leaves.
    pub origin: Shift,
    /// Final (clamped) position in the destination scope.
    pub target: i64,
    /// Applied to the destination scope before the entity lands there.
    /// `None` when the entity is appended.
    pub destination: Option<Shift>,
}

/// Resolve the position a new entity is inserted at, given the scope size
/// before insertion. `None` appends.
pub fn clamp_insert(requested: Option<i64>, len: i64) -> i64 {
    match requested {
        Some(position) => position.clamp(0, len.max(0)),
        None => len.max(0),
    }
}

/// Open a gap at `at`: every sibling at or after it moves up one.
pub fn insert_shift(at: i64) -> Shift {
    Shift {
        start: at,
        end: None,
        delta: 1,
    }
}

/// Close the gap left at `at`: every sibling after it moves down one.
pub fn remove_shift(at: i64) -> Shift {
    Shift {
        start: at + 1,
        end: None,
        delta: -1,
    }
}

/// Plan moving the entity at `from` to `to` within a scope of `len` entities
/// (the mover included).
///
/// `to` is clamped into `[0, len - 1]`. Only the siblings strictly between the
/// old and new slot move, one step toward the slot that was vacated; this is
/// the net effect of removing the entity and reinserting it at the target.
pub fn plan_move(from: i64, to: i64, len: i64) -> MovePlan {
    let last = (len - 1).max(0);
    let target = to.clamp(0, last);

    let shift = if target > from {
        Some(Shift {
            start: from + 1,
            end: Some(target + 1),
            delta: -1,
        })
    } else if target < from {
        Some(Shift {
            start: target,
            end: Some(from),
            delta: 1,
        })
    } else {
        None
    };

    MovePlan { target, shift }
}

/// Plan moving the entity at `from` in its current scope into another scope
/// holding `dest_len` entities. `to` of `None` appends; a target past the end
/// is clamped to append, which needs no destination shift.
pub fn plan_cross_move(from: i64, to: Option<i64>, dest_len: i64) -> CrossMovePlan {
    let target = clamp_insert(to, dest_len);
    let destination = if target < dest_len {
        Some(insert_shift(target))
    } else {
        None
    };

    CrossMovePlan {
        origin: remove_shift(from),
        target,
        destination,
    }
}

/// Whether `positions` is exactly `0..positions.len()` in some order.
pub fn is_dense(positions: &[i64]) -> bool {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .enumerate()
        .all(|(index, &position)| position == index as i64)
}
