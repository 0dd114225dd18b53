use log::warn;

use crate::error::{CdLensError, Result};
use crate::events::{ChangeReader, Reference};

/// The branch expected to exist exactly once; resolution of this literal
/// name must be unambiguous before any correlation can proceed.
pub const MAINLINE_BRANCH: &str = "master";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
}

/// Turns a branch/tag pattern into concrete named references.
///
/// Pattern matching itself is delegated to the reader ("*" matches all,
/// anything else is a substring/regex search); the resolver's job is to
/// weed out unusable references and to disambiguate the main line.
pub struct ReferenceResolver<'r, R> {
    reader: &'r R,
}

impl<'r, R: ChangeReader> ReferenceResolver<'r, R> {
    pub fn new(reader: &'r R) -> Self {
        Self { reader }
    }

    pub async fn resolve(&self, kind: RefKind, pattern: &str) -> Result<Vec<Reference>> {
        let references = match kind {
            RefKind::Branch => self.reader.load_branches(pattern).await?,
            RefKind::Tag => self.reader.load_tags(pattern).await?,
        };
        Ok(references
            .into_iter()
            .filter(|reference| {
                let usable = !reference.name.is_empty() && !reference.commit.is_empty();
                if !usable {
                    warn!(
                        "Skipping reference '{}' without a name or pointer commit",
                        reference.name
                    );
                }
                usable
            })
            .collect())
    }

    /// Resolve the main line. A search for "master" may also match
    /// branches merely containing that string, so narrow to an exact name
    /// match; anything other than exactly one match is fatal.
    pub async fn resolve_mainline(&self, pattern: &str) -> Result<Reference> {
        let mut branches = self.resolve(RefKind::Branch, pattern).await?;
        if branches.len() != 1 && pattern == MAINLINE_BRANCH {
            branches.retain(|b| b.name == MAINLINE_BRANCH);
        }
        if branches.len() != 1 {
            return Err(CdLensError::AmbiguousMainline {
                pattern: pattern.to_string(),
                candidates: branches.len(),
            });
        }
        Ok(branches.remove(0))
    }
}
