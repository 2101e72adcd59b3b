//! Gap-free ordering of questions within a survey and of option links within
//! a question.
//!
//! Active siblings always carry indices `1..=n`. The planners below work on
//! plain `Sibling` slices and never touch storage; the executor functions load
//! a scope's siblings through the caller's connection (always a transaction
//! connection), run a planner, and write the result back.

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection};
use std::fmt;
use surveyor_ids::{QuestionId, SurveyId};
use thiserror::Error;

use crate::error::{DbError, Result};

// ============================================================================
// Planner
// ============================================================================

/// Reorder direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }

    pub fn parse(s: &str) -> std::result::Result<Self, OrderingError> {
        match s.trim().to_uppercase().as_str() {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            _ => Err(OrderingError::InvalidDirection(s.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = OrderingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Reorder failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderingError {
    #[error("Invalid direction '{0}', expected UP or DOWN")]
    InvalidDirection(String),

    #[error("Item at index {index} cannot move {direction}")]
    OutOfRange { index: i64, direction: Direction },

    #[error("No adjacent item at index {0}")]
    NoAdjacentItem(i64),
}

/// One active member of an ordered container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sibling {
    pub id: i64,
    pub index: i64,
}

/// Index for an item appended to the container.
pub fn next_index(siblings: &[Sibling]) -> i64 {
    siblings
        .iter()
        .map(|s| s.index)
        .max()
        .map_or(1, |max| max + 1)
}

/// Result of a swap: after applying, `item` holds `neighbor.index` and
/// `neighbor` holds `item.index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPlan {
    pub item: Sibling,
    pub neighbor: Sibling,
}

impl SwapPlan {
    /// The two index writes to apply, as `(id, new_index)`.
    pub fn writes(&self) -> [(i64, i64); 2] {
        [
            (self.item.id, self.neighbor.index),
            (self.neighbor.id, self.item.index),
        ]
    }
}

/// Plan an exchange of `item` with its neighbor in `direction`.
///
/// DOWN is bounded by the largest index in the container, not by the sibling
/// count, so a container with a gap reports `NoAdjacentItem` rather than
/// `OutOfRange`.
pub fn plan_swap(
    siblings: &[Sibling],
    item: Sibling,
    direction: Direction,
) -> std::result::Result<SwapPlan, OrderingError> {
    let target = match direction {
        Direction::Up => {
            if item.index <= 0 {
                return Err(OrderingError::OutOfRange {
                    index: item.index,
                    direction,
                });
            }
            item.index - 1
        }
        Direction::Down => {
            let max = siblings.iter().map(|s| s.index).max().unwrap_or(item.index);
            if item.index >= max {
                return Err(OrderingError::OutOfRange {
                    index: item.index,
                    direction,
                });
            }
            item.index + 1
        }
    };

    let neighbor = siblings
        .iter()
        .find(|s| s.index == target && s.id != item.id)
        .copied()
        .ok_or(OrderingError::NoAdjacentItem(target))?;

    Ok(SwapPlan { item, neighbor })
}

/// Siblings that must shift up by one once `removed` leaves the container,
/// with their new indices.
pub fn plan_compaction(siblings: &[Sibling], removed: Sibling) -> Vec<Sibling> {
    siblings
        .iter()
        .filter(|s| s.id != removed.id && s.index > removed.index)
        .map(|s| Sibling {
            id: s.id,
            index: s.index - 1,
        })
        .collect()
}

// ============================================================================
// Executor
// ============================================================================

/// An ordered container in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Questions of one survey
    Questions(SurveyId),
    /// Option links of one question
    Links(QuestionId),
}

impl Scope {
    fn table(&self) -> &'static str {
        match self {
            Self::Questions(_) => "questions",
            Self::Links(_) => "question_option",
        }
    }

    fn parent_column(&self) -> &'static str {
        match self {
            Self::Questions(_) => "survey_id",
            Self::Links(_) => "question_id",
        }
    }

    fn parent_id(&self) -> i64 {
        match self {
            Self::Questions(id) => id.get(),
            Self::Links(id) => id.get(),
        }
    }

    fn item_label(&self) -> &'static str {
        match self {
            Self::Questions(_) => "Question",
            Self::Links(_) => "Option link",
        }
    }
}

/// Active siblings of `scope`, ordered by index.
pub async fn load_siblings(conn: &mut SqliteConnection, scope: Scope) -> Result<Vec<Sibling>> {
    let sql = format!(
        "SELECT id, idx FROM {} WHERE {} = ? AND is_deleted = 0 ORDER BY idx, id",
        scope.table(),
        scope.parent_column()
    );
    let rows = sqlx::query(&sql)
        .bind(scope.parent_id())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| -> Result<Sibling> {
            Ok(Sibling {
                id: row.try_get("id")?,
                index: row.try_get("idx")?,
            })
        })
        .collect()
}

fn find_item(siblings: &[Sibling], scope: Scope, item_id: i64) -> Result<Sibling> {
    siblings
        .iter()
        .find(|s| s.id == item_id)
        .copied()
        .ok_or_else(|| DbError::not_found(format!("{} not found", scope.item_label())))
}

async fn write_index(conn: &mut SqliteConnection, scope: Scope, id: i64, index: i64) -> Result<()> {
    let sql = format!("UPDATE {} SET idx = ? WHERE id = ?", scope.table());
    sqlx::query(&sql)
        .bind(index)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Index for a new item appended to `scope`.
pub async fn insert_at_end(conn: &mut SqliteConnection, scope: Scope) -> Result<i64> {
    let siblings = load_siblings(conn, scope).await?;
    Ok(next_index(&siblings))
}

/// Exchange `item_id` with its neighbor. Both writes go through `conn`, which
/// must be a transaction.
pub async fn swap(
    conn: &mut SqliteConnection,
    scope: Scope,
    item_id: i64,
    direction: Direction,
) -> Result<SwapPlan> {
    let siblings = load_siblings(conn, scope).await?;
    let item = find_item(&siblings, scope, item_id)?;
    let plan = plan_swap(&siblings, item, direction)?;

    for (id, index) in plan.writes() {
        write_index(conn, scope, id, index).await?;
    }

    Ok(plan)
}

/// Flag `item_id` deleted and close the gap it leaves. Returns the prior index.
pub async fn delete_and_compact(
    conn: &mut SqliteConnection,
    scope: Scope,
    item_id: i64,
) -> Result<i64> {
    let siblings = load_siblings(conn, scope).await?;
    let item = find_item(&siblings, scope, item_id)?;

    let sql = format!("UPDATE {} SET is_deleted = 1 WHERE id = ?", scope.table());
    sqlx::query(&sql).bind(item.id).execute(&mut *conn).await?;

    for shifted in plan_compaction(&siblings, item) {
        write_index(conn, scope, shifted.id, shifted.index).await?;
    }

    Ok(item.index)
}
