//! Two-grid content board: featured documents and everything else.
//!
//! Dropping a card into the other grid flips its `featured` flag. The board
//! only reports the flip as a [`BoardChange`]; persisting the flag and
//! recording the `FEATURE` revision is the caller's job.

use thiserror::Error;

use folio_types::{ContentKind, DocumentId, DocumentMeta, DocumentStatus};

use crate::drag::DropTarget;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoardSection {
    Featured,
    All,
}

impl BoardSection {
    pub fn featured(self) -> bool {
        self == BoardSection::Featured
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("document {0} is not on the board")]
    UnknownDocument(DocumentId),

    #[error("document {document} is not in the {section:?} grid")]
    WrongSection {
        document: DocumentId,
        section: BoardSection,
    },
}

/// What the board shows for one document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentCard {
    pub id: DocumentId,
    pub title: String,
    pub status: DocumentStatus,
    pub kind: ContentKind,
    pub featured: bool,
}

impl From<&DocumentMeta> for DocumentCard {
    fn from(meta: &DocumentMeta) -> Self {
        Self {
            id: meta.id,
            title: meta.title.clone(),
            status: meta.status,
            kind: meta.kind,
            featured: meta.featured,
        }
    }
}

/// Result of applying a drop to the board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoardChange {
    Unchanged,
    Reordered {
        document_id: DocumentId,
        section: BoardSection,
        from: usize,
        to: usize,
    },
    /// Moved across grids. Persist `featured` and record a FEATURE revision.
    FeatureToggled {
        document_id: DocumentId,
        featured: bool,
        index: usize,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentBoard {
    featured: Vec<DocumentCard>,
    all: Vec<DocumentCard>,
}

impl ContentBoard {
    /// Split documents by their `featured` flag, keeping input order.
    pub fn from_documents<'a>(docs: impl IntoIterator<Item = &'a DocumentMeta>) -> Self {
        let (featured, all) = docs.into_iter().map(DocumentCard::from).partition(|c| c.featured);
        Self { featured, all }
    }

    pub fn section(&self, section: BoardSection) -> &[DocumentCard] {
        match section {
            BoardSection::Featured => &self.featured,
            BoardSection::All => &self.all,
        }
    }

    fn section_mut(&mut self, section: BoardSection) -> &mut Vec<DocumentCard> {
        match section {
            BoardSection::Featured => &mut self.featured,
            BoardSection::All => &mut self.all,
        }
    }

    /// Where a document currently sits.
    pub fn locate(&self, id: &DocumentId) -> Option<(BoardSection, usize)> {
        [BoardSection::Featured, BoardSection::All]
            .into_iter()
            .find_map(|s| self.section(s).iter().position(|c| c.id == *id).map(|i| (s, i)))
    }

    pub fn len(&self) -> usize {
        self.featured.len() + self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn position_in(&self, id: &DocumentId, section: BoardSection) -> Result<usize, BoardError> {
        match self.locate(id) {
            Some((s, i)) if s == section => Ok(i),
            Some(_) => Err(BoardError::WrongSection { document: *id, section }),
            None => Err(BoardError::UnknownDocument(*id)),
        }
    }
}

impl DropTarget<DocumentId, BoardSection> for ContentBoard {
    type Outcome = BoardChange;
    type Error = BoardError;

    fn move_within(
        &mut self,
        item: &DocumentId,
        section: BoardSection,
        to_index: usize,
    ) -> Result<BoardChange, BoardError> {
        let from = self.position_in(item, section)?;
        let cards = self.section_mut(section);
        let to = to_index.min(cards.len().saturating_sub(1));
        if from == to {
            return Ok(BoardChange::Unchanged);
        }
        let card = cards.remove(from);
        cards.insert(to, card);
        Ok(BoardChange::Reordered {
            document_id: *item,
            section,
            from,
            to,
        })
    }

    fn move_across(
        &mut self,
        item: &DocumentId,
        from: BoardSection,
        to: BoardSection,
        to_index: usize,
    ) -> Result<BoardChange, BoardError> {
        let at = self.position_in(item, from)?;
        let mut card = self.section_mut(from).remove(at);
        card.featured = to.featured();

        let cards = self.section_mut(to);
        let index = to_index.min(cards.len());
        cards.insert(index, card);
        tracing::debug!(document = %item, featured = to.featured(), index, "feature flag toggled by drop");
        Ok(BoardChange::FeatureToggled {
            document_id: *item,
            featured: to.featured(),
            index,
        })
    }
}
