//! Diff engine.
//!
//! Compares the live catalog against the desired catalog and produces an
//! ordered action plan. The ordering is load-bearing:
//!
//! 1. Index and trigger drops run first, so table operations are never
//!    blocked by dependent objects.
//! 2. Table creates, then table rebuilds, then table drops: new tables
//!    must exist before old tables that reference them via foreign keys
//!    are removed.
//! 3. Index and trigger creates run last, including those re-emitted
//!    because their owning table was rebuilt.
//!
//! Renames are never inferred: a table or column appearing under a new
//! name is an independent drop plus create.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, ObjectKind, SchemaObject};
use crate::error::{Result, SyncError};

/// A single step of a synchronization plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Execute the object's stored definition on the live database.
    Create(SchemaObject),

    /// Drop the object from the live database.
    Drop(SchemaObject),

    /// Rebuild a table whose definition changed, preserving data in the
    /// columns common to both definitions. Carries the complete set of
    /// indexes and triggers owned by the table at diff time, whether or
    /// not they also appear independently in the plan.
    RecreateTable {
        /// The live table definition.
        old: SchemaObject,
        /// The desired table definition.
        new: SchemaObject,
        /// Indexes owned by the live table.
        indexes: Vec<SchemaObject>,
        /// Triggers owned by the live table.
        triggers: Vec<SchemaObject>,
    },

    /// Nothing to do. Never emitted by the diff engine (unchanged
    /// objects are omitted from the plan), but applying it is a no-op.
    NoOp,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create(object) => write!(f, "create {object}"),
            Self::Drop(object) => write!(f, "drop {object}"),
            Self::RecreateTable {
                new,
                indexes,
                triggers,
                ..
            } => write!(
                f,
                "rebuild table {} ({} indexes, {} triggers)",
                new.name,
                indexes.len(),
                triggers.len()
            ),
            Self::NoOp => write!(f, "no-op"),
        }
    }
}

/// An ordered sequence of actions computed by [`diff`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    actions: Vec<Action>,
}

impl Plan {
    /// Returns the actions in application order.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Number of actions in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if there is nothing to apply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.actions.is_empty() {
            return f.write_str("no changes");
        }
        for (i, action) in self.actions.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{action}")?;
        }
        Ok(())
    }
}

/// Computes the ordered plan that transforms `live` into `desired`.
pub fn diff(live: &Catalog, desired: &Catalog) -> Result<Plan> {
    // Live tables that will disappear as a side effect of a table-level
    // operation: their indexes and triggers die with them and must not
    // be dropped explicitly.
    let mut rebuilt_tables: BTreeSet<&str> = BTreeSet::new();
    let mut dropped_tables: BTreeSet<&str> = BTreeSet::new();

    let mut table_creates = Vec::new();
    let mut rebuilds = Vec::new();

    for new in desired.objects_of(ObjectKind::Table) {
        match live.get(ObjectKind::Table, &new.name) {
            None => table_creates.push(Action::Create(new.clone())),
            Some(old) if old.same_definition(new) => {}
            Some(old) => {
                let indexes: Vec<SchemaObject> = live
                    .owned_by(&old.name)
                    .filter(|o| o.kind == ObjectKind::Index)
                    .cloned()
                    .collect();
                let triggers: Vec<SchemaObject> = live
                    .owned_by(&old.name)
                    .filter(|o| o.kind == ObjectKind::Trigger)
                    .cloned()
                    .collect();
                rebuilds.push(Action::RecreateTable {
                    old: old.clone(),
                    new: new.clone(),
                    indexes,
                    triggers,
                });
                rebuilt_tables.insert(old.name.as_str());
            }
        }
    }

    let mut table_drops = Vec::new();
    for old in live.objects_of(ObjectKind::Table) {
        if !desired.contains(ObjectKind::Table, &old.name) {
            table_drops.push(Action::Drop(old.clone()));
            dropped_tables.insert(old.name.as_str());
        }
    }

    // Dependent objects (indexes, triggers).
    let mut dependent_drops = Vec::new();
    let mut pending_creates: BTreeSet<(ObjectKind, &str)> = BTreeSet::new();

    for old in live.objects() {
        if old.kind == ObjectKind::Table {
            continue;
        }
        let owner = old.owner_table.as_str();
        let owner_vanishes =
            rebuilt_tables.contains(owner) || dropped_tables.contains(owner);

        match desired.get(old.kind, &old.name) {
            None => {
                if !owner_vanishes {
                    dependent_drops.push(Action::Drop(old.clone()));
                }
            }
            Some(new) if old.same_definition(new) => {
                // Unchanged, but destroyed along with a rebuilt owner:
                // re-emit it from the desired definition.
                if rebuilt_tables.contains(owner) {
                    pending_creates.insert((new.kind, new.name.as_str()));
                }
            }
            Some(new) => {
                if !owner_vanishes {
                    dependent_drops.push(Action::Drop(old.clone()));
                }
                pending_creates.insert((new.kind, new.name.as_str()));
            }
        }
    }

    for new in desired.objects() {
        if new.kind == ObjectKind::Table {
            continue;
        }
        if !live.contains(new.kind, &new.name) {
            pending_creates.insert((new.kind, new.name.as_str()));
        }
    }

    let mut dependent_creates = Vec::new();
    for new in desired.objects() {
        if new.kind == ObjectKind::Table {
            continue;
        }
        if !pending_creates.contains(&(new.kind, new.name.as_str())) {
            continue;
        }
        if !desired.contains(ObjectKind::Table, &new.owner_table) {
            return Err(SyncError::Planning(format!(
                "{} '{}' belongs to table '{}' which is not in the desired schema",
                new.kind, new.name, new.owner_table
            )));
        }
        dependent_creates.push(Action::Create(new.clone()));
    }

    let mut actions = dependent_drops;
    actions.extend(table_creates);
    actions.extend(rebuilds);
    actions.extend(table_drops);
    actions.extend(dependent_creates);

    Ok(Plan { actions })
}
