#![forbid(unsafe_code)]

//! Section → element lookup table.
//!
//! Section components register their root element on mount and clear it on
//! unmount. The registry only looks handles up; it never decides when an
//! element lives or dies, so consumers must tolerate a `None` (not yet
//! mounted) or a stale handle (check with the host before use).

use crate::section::Section;

/// Fixed-key mapping from [`Section`] to an element handle.
#[derive(Debug, Clone)]
pub struct SectionRegistry<E> {
    slots: [Option<E>; Section::COUNT],
    generation: u64,
}

impl<E> Default for SectionRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> SectionRegistry<E> {
    /// Create an empty registry (every section unmounted).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [None, None, None, None],
            generation: 0,
        }
    }

    /// Store the element for `section`. Last write wins.
    ///
    /// Returns the previously registered handle, if any.
    pub fn register(&mut self, section: Section, handle: E) -> Option<E> {
        self.generation = self.generation.wrapping_add(1);
        self.slots[section.index()].replace(handle)
    }

    /// Clear the slot for `section` (component unmounted).
    pub fn unregister(&mut self, section: Section) -> Option<E> {
        let previous = self.slots[section.index()].take();
        if previous.is_some() {
            self.generation = self.generation.wrapping_add(1);
        }
        previous
    }

    /// Look up the element for `section`.
    #[must_use]
    pub fn resolve(&self, section: Section) -> Option<&E> {
        self.slots[section.index()].as_ref()
    }

    /// Whether `section` currently has an element.
    #[must_use]
    pub fn is_registered(&self, section: Section) -> bool {
        self.slots[section.index()].is_some()
    }

    /// Iterate over mounted sections in page order.
    pub fn registered(&self) -> impl Iterator<Item = (Section, &E)> + '_ {
        Section::ALL
            .into_iter()
            .filter_map(|section| self.resolve(section).map(|handle| (section, handle)))
    }

    /// Counter bumped on every change; lets callers detect updates cheaply.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

impl<E: PartialEq> SectionRegistry<E> {
    /// Reverse lookup: which section owns `handle`.
    #[must_use]
    pub fn section_of(&self, handle: &E) -> Option<Section> {
        self.registered()
            .find(|(_, registered)| *registered == handle)
            .map(|(section, _)| section)
    }
}
