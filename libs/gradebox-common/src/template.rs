//! Named-anchor substitution for harness snippets.
//!
//! A harness is split once around every occurrence of its anchor; filling
//! the template joins the pieces back with a replacement. An anchor that
//! never occurs leaves a single piece, so [`HarnessTemplate::fill`] returns
//! the snippet unchanged and [`HarnessTemplate::has_anchor`] reports it.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessTemplate<'a> {
    anchor: &'a str,
    pieces: Vec<&'a str>,
}

impl<'a> HarnessTemplate<'a> {
    pub fn parse(snippet: &'a str, anchor: &'a str) -> Self {
        let pieces = if anchor.is_empty() {
            vec![snippet]
        } else {
            snippet.split(anchor).collect()
        };
        Self { anchor, pieces }
    }

    pub fn anchor_count(&self) -> usize {
        self.pieces.len() - 1
    }

    pub fn has_anchor(&self) -> bool {
        self.anchor_count() > 0
    }

    /// Replace every anchor occurrence with `replacement`
    pub fn fill(&self, replacement: &str) -> String {
        self.pieces.join(replacement)
    }

    /// The snippet exactly as parsed
    pub fn original(&self) -> String {
        self.pieces.join(self.anchor)
    }
}
