//! Free-space allocation
//!
//! The free space of a block is the block minus every registered child, kept
//! as a coalesced [`IntervalSet`]. Allocation is first-fit by address: the
//! lowest-addressed free piece that is large enough is truncated to the
//! requested length.

use log::{debug, trace};

use crate::encoding::AddressKey;
use crate::interval::{AddrRange, IntervalSet};
use crate::labels::LabelSet;
use crate::prefix::Prefix;
use crate::rib::{Rib, Route};
use crate::store::PrefixStore;
use crate::{Error, Result};

/// Block minus every registered child of it.
///
/// Children arrive in address order with shorter prefixes first, so the
/// complement is built in one pass: a cursor tracks the lowest address not yet
/// known to be covered, and each child starting past it closes a free gap.
/// Children nested inside an earlier one end below the cursor and are skipped.
pub(crate) fn free_space(store: &PrefixStore<LabelSet>, block: &Prefix) -> IntervalSet {
    let mut free = IntervalSet::new(block.family());
    let last = block.last();
    // None once the whole block is covered
    let mut cursor = Some(block.first());

    for (key, _) in store.walk_overlap(AddressKey::encode(block), false, true) {
        let Some(next) = cursor else {
            break;
        };
        let child = key.decode();
        if child.last() < next {
            continue;
        }
        if child.first() > next {
            free.push_range(AddrRange::new(next, child.first() - 1));
        }
        cursor = child.last().checked_add(1).filter(|&n| n <= last);
    }
    if let Some(next) = cursor {
        free.push_range(AddrRange::new(next, last));
    }
    free
}

fn check_request(block: &Prefix, len: u8) -> Result<()> {
    if len < block.len() || len > block.max_len() {
        return Err(Error::InvalidRequest {
            block: *block,
            requested: len,
        });
    }
    Ok(())
}

fn first_fit(free: &IntervalSet, block: &Prefix, len: u8) -> Result<Prefix> {
    free.first_fit(len).ok_or(Error::NoFreeSpace {
        block: *block,
        requested: len,
    })
}

impl Rib {
    /// Unallocated space inside `block`: the block minus all registered
    /// routes more specific than it
    pub fn free_prefixes(&self, block: &Prefix) -> IntervalSet {
        let store = self.store.read();
        let free = free_space(&store, block);
        trace!("free space in {}: {}", block, free);
        free
    }

    /// Lowest-addressed unallocated `/len` inside `block`.
    ///
    /// Fails with [`Error::InvalidRequest`] when `len` is shorter than the
    /// block (or longer than the family allows), and with
    /// [`Error::NoFreeSpace`] when no free piece is large enough.
    pub fn find_free_prefix(&self, block: &Prefix, len: u8) -> Result<Prefix> {
        check_request(block, len)?;
        let store = self.store.read();
        first_fit(&free_space(&store, block), block, len)
    }

    /// Find the lowest free `/len` inside `block` and register it, atomically
    pub fn allocate(&self, block: &Prefix, len: u8, labels: LabelSet) -> Result<Route> {
        check_request(block, len)?;
        let labels = self.with_defaults(labels);

        let mut store = self.store.write();
        let prefix = first_fit(&free_space(&store, block), block, len)?;
        self.check_capacity(&store, 1)?;
        store.insert(AddressKey::encode(&prefix), labels.clone())?;
        debug!("allocated {} from {}", prefix, block);
        Ok(Route::new(prefix, labels))
    }
}
