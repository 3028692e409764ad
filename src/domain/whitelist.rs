//! Destination path whitelist — pure containment logic.
//!
//! Callers must canonicalize the candidate path first (see
//! `infra::fs::canonicalize_destination`); comparing literal paths would let
//! `..` and symlink tricks escape the whitelist.

use std::path::{Component, Path, PathBuf};

/// Fixed set of destinations the engine is permitted to ever write.
#[derive(Debug, Clone, Default)]
pub struct PathWhitelist {
    prefixes: Vec<PathBuf>,
    exact: Vec<PathBuf>,
}

impl PathWhitelist {
    /// Build a whitelist from allowed prefixes and exact paths.
    ///
    /// Relative entries and entries containing `..` are ignored: a whitelist
    /// entry that is itself escapable would defeat the containment check.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(prefixes: Vec<P>, exact: Vec<P>) -> Self {
        let clean = |paths: Vec<P>| -> Vec<PathBuf> {
            paths
                .into_iter()
                .map(Into::into)
                .filter(|p: &PathBuf| p.is_absolute() && !has_dot_components(p))
                .collect()
        };
        Self {
            prefixes: clean(prefixes),
            exact: clean(exact),
        }
    }

    /// Whether an already-canonicalized destination may be written.
    #[must_use]
    pub fn allows(&self, canonical: &Path) -> bool {
        if self.exact.iter().any(|e| e == canonical) {
            return true;
        }
        self.prefixes.iter().any(|p| canonical.starts_with(p))
    }

    /// True when the whitelist admits nothing. Used to refuse to run with an
    /// empty or entirely-invalid configuration.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.exact.is_empty()
    }
}

fn has_dot_components(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::ParentDir | Component::CurDir))
}

// ── Unit tests ───────────────────────────────────────────────────────────────
