//! Core domain types for the MindVision practice system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Exercises and their difficulty levels
//! - The ordered exercise catalog
//! - Journal entries and submission payloads
//! - The demo user identity

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Exercise Types
// ============================================================================

/// How demanding a visualization exercise is
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }
}

/// A guided visualization exercise (e.g., "Mental Screen Exercise")
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    pub title: String,
    pub description: String,
    pub duration_seconds: u32,
    pub difficulty: Difficulty,
    pub prompts: Vec<String>,
}

// ============================================================================
// Catalog Type
// ============================================================================

/// The fixed, ordered sequence of exercises a session cycles through.
///
/// Construction goes through [`Catalog::new`], which rejects an empty or
/// inconsistent list, so index arithmetic modulo `len()` is always defined.
#[derive(Clone, Debug)]
pub struct Catalog {
    pub(crate) exercises: Vec<Exercise>,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// Exercise at `index`, wrapped modulo the catalog length
    pub fn get(&self, index: usize) -> &Exercise {
        &self.exercises[index % self.exercises.len()]
    }

    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }
}

// ============================================================================
// Journal Types
// ============================================================================

/// A persisted journal reflection, as returned by the entry store
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    /// Title snapshot of the exercise at save time, not a catalog reference
    pub exercise: String,
    pub content: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload submitted to the entry store when a draft is saved
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub date: DateTime<Utc>,
    pub exercise: String,
    pub content: String,
    pub user_id: Uuid,
}

/// The single demo identity the application journals under
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DemoUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
}

/// Canonical timestamp text used for storage and display.
///
/// Fixed-width UTC with microseconds, so lexicographic order matches
/// chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
