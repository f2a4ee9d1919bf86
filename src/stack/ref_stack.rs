use crate::term::Ref;

/// Stack of reference sets currently under evaluation.
///
/// Used to catch a virtual document that depends on itself before the
/// evaluator recurses forever.
#[derive(Debug, Default)]
pub struct RefStack {
    frames: Vec<Vec<Ref>>,
}

impl RefStack {
    /// Empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `refs` as in progress.
    pub fn push(&mut self, refs: Vec<Ref>) {
        self.frames.push(refs);
    }

    /// Removes the newest frame.
    pub fn pop(&mut self) -> Option<Vec<Ref>> {
        self.frames.pop()
    }

    /// Number of frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if some active frame holds a prefix of `reference`.
    #[must_use]
    pub fn prefixed(&self, reference: &Ref) -> bool {
        self.frames
            .iter()
            .rev()
            .any(|frame| frame.iter().any(|r| r.is_prefix_of(reference)))
    }

    /// Like [`RefStack::prefixed`], treating a missing stack as empty.
    #[must_use]
    pub fn prefixed_in(stack: Option<&Self>, reference: &Ref) -> bool {
        stack.is_some_and(|s| s.prefixed(reference))
    }
}
