//! `MEMBAR` fence tracking: the four ordering sub-flags plus `#MEMISSUE`,
//! and the tag a subsequent access must wait behind (spec §3 "Membar
//! Descriptor", §4.3 "fences").

use crate::core::instance::Tag;
use crate::isa::opcode::MembarFlags;

/// A pending `MEMBAR`'s ordering requirements, resolved into the youngest
/// tag each subsequent access class must wait behind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MembarDescriptor {
    /// Store-store ordering: younger stores wait behind this tag's stores.
    pub ss_tag: Option<Tag>,
    /// Load-store ordering: younger stores wait behind this tag's loads.
    pub ls_tag: Option<Tag>,
    /// Store-load ordering: younger loads wait behind this tag's stores.
    pub sl_tag: Option<Tag>,
    /// Load-load ordering: younger loads wait behind this tag's loads.
    pub ll_tag: Option<Tag>,
    /// `#MEMISSUE`: younger memory ops may not issue until this tag's
    /// memory op has globally performed.
    pub memissue_tag: Option<Tag>,
}

impl MembarDescriptor {
    /// Builds a descriptor for a `MEMBAR` instance with tag `barrier_tag`,
    /// populating only the sub-flags set in `flags`.
    #[must_use]
    pub fn from_flags(barrier_tag: Tag, flags: MembarFlags) -> Self {
        Self {
            ss_tag: flags.ss.then_some(barrier_tag),
            ls_tag: flags.ls.then_some(barrier_tag),
            sl_tag: flags.sl.then_some(barrier_tag),
            ll_tag: flags.ll.then_some(barrier_tag),
            memissue_tag: flags.memissue.then_some(barrier_tag),
        }
    }

    /// True if a younger store (tag `store_tag`) is blocked by this
    /// descriptor's outstanding store-ordering requirements.
    #[must_use]
    pub fn blocks_store(&self, store_tag: Tag, older_stores_done: bool, older_loads_done: bool) -> bool {
        let blocked_by_ss = self.ss_tag.is_some_and(|t| store_tag > t && !older_stores_done);
        let blocked_by_ls = self.ls_tag.is_some_and(|t| store_tag > t && !older_loads_done);
        blocked_by_ss || blocked_by_ls
    }

    /// True if a younger load (tag `load_tag`) is blocked by this
    /// descriptor's outstanding load-ordering requirements.
    #[must_use]
    pub fn blocks_load(&self, load_tag: Tag, older_stores_done: bool, older_loads_done: bool) -> bool {
        let blocked_by_sl = self.sl_tag.is_some_and(|t| load_tag > t && !older_stores_done);
        let blocked_by_ll = self.ll_tag.is_some_and(|t| load_tag > t && !older_loads_done);
        blocked_by_sl || blocked_by_ll
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sl_blocks_younger_load_until_stores_perform() {
        let flags = MembarFlags {
            ss: false,
            ls: false,
            sl: true,
            ll: false,
            memissue: false,
        };
        let d = MembarDescriptor::from_flags(Tag(5), flags);
        assert!(d.blocks_load(Tag(7), false, true));
        assert!(!d.blocks_load(Tag(7), true, true));
        assert!(!d.blocks_load(Tag(3), false, true)); // older than the barrier
    }
}
