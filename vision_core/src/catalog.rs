//! Default catalog of visualization exercises.
//!
//! This module provides the built-in exercises and catalog validation.

use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(|| Catalog {
    exercises: default_exercises(),
});

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Builds the default catalog with the built-in exercises
///
/// **Note**: For read-only use, prefer `get_default_catalog()` which returns a
/// cached reference. This function is retained for extending the catalog with
/// configured exercises.
pub fn build_default_catalog() -> Catalog {
    Catalog {
        exercises: default_exercises(),
    }
}

fn default_exercises() -> Vec<Exercise> {
    vec![
        Exercise {
            title: "Mental Screen Exercise".into(),
            description: "Imagine a blank movie screen in your mind. Practice making it bigger, smaller, closer, and further away.".into(),
            duration_seconds: 600,
            difficulty: Difficulty::Beginner,
            prompts: vec![
                "How clear was your mental screen?".into(),
                "Could you adjust its size easily?".into(),
            ],
        },
        Exercise {
            title: "Object Visualization".into(),
            description: "Visualize a simple object like an apple. Focus on its color, texture, and try rotating it in your mind.".into(),
            duration_seconds: 900,
            difficulty: Difficulty::Intermediate,
            prompts: vec![
                "What details could you see clearly?".into(),
                "How stable was the image?".into(),
            ],
        },
        Exercise {
            title: "Scene Construction".into(),
            description: "Build a peaceful scene piece by piece - start with the sky, add trees, water, and other elements gradually.".into(),
            duration_seconds: 1200,
            difficulty: Difficulty::Advanced,
            prompts: vec![
                "What elements did you include?".into(),
                "How vivid were the colors?".into(),
            ],
        },
    ]
}

impl Catalog {
    /// Build a catalog from an ordered list of exercises
    ///
    /// Fails if the list is empty or any exercise is invalid.
    pub fn new(exercises: Vec<Exercise>) -> Result<Self> {
        let catalog = Catalog { exercises };
        let errors = catalog.validate();
        if !errors.is_empty() {
            return Err(Error::CatalogValidation(errors.join("; ")));
        }
        Ok(catalog)
    }

    /// The built-in exercises followed by `custom`, validated
    pub fn with_custom(custom: &[Exercise]) -> Result<Self> {
        let mut exercises = default_exercises();
        exercises.extend(custom.iter().cloned());
        Self::new(exercises)
    }

    /// Position of the exercise with the given title, if any
    pub fn position(&self, title: &str) -> Option<usize> {
        self.exercises.iter().position(|e| e.title == title)
    }

    /// Validate the catalog for consistency and completeness
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.exercises.is_empty() {
            errors.push("Catalog has no exercises".to_string());
            return errors;
        }

        let mut seen_titles = HashSet::new();
        for (idx, exercise) in self.exercises.iter().enumerate() {
            if exercise.title.trim().is_empty() {
                errors.push(format!("Exercise #{} has empty title", idx));
            } else if !seen_titles.insert(exercise.title.as_str()) {
                errors.push(format!("Duplicate exercise title '{}'", exercise.title));
            }
            if exercise.description.trim().is_empty() {
                errors.push(format!("Exercise '{}' has empty description", exercise.title));
            }
            if exercise.duration_seconds == 0 {
                errors.push(format!("Exercise '{}' has zero duration", exercise.title));
            }
            if exercise.prompts.iter().any(|p| p.trim().is_empty()) {
                errors.push(format!("Exercise '{}' has a blank prompt", exercise.title));
            }
        }

        errors
    }
}
