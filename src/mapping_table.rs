use std::cell::UnsafeCell;
use std::collections::BTreeMap;
use std::sync::atomic::{
    AtomicBool,
    Ordering::{Acquire, Release},
};
use std::sync::Arc;

use crate::optimistic_lock::OptimisticLock;

/// The relative logical path of a backing database file, e.g.
/// `"db/collection.3"`. Cheap to clone and compare. One path
/// per [`crate::Durability`] instance is designated as the
/// local database; entries against it carry a flag bit instead
/// of a path-context record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativePath(Arc<str>);

impl RelativePath {
    pub fn new(path: &str) -> RelativePath {
        RelativePath(Arc::from(path))
    }

    /// The conventional local database path.
    pub fn local() -> RelativePath {
        RelativePath::new("local")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One memory-mapped view of a backing file region. Owned by
/// the view manager; the journal assembly path only resolves
/// addresses into it and flags it for remapping.
#[derive(Debug)]
pub struct MappedRegion {
    base: u64,
    view: Box<[u8]>,
    file_no: u32,
    relative_path: RelativePath,
    will_need_remap: AtomicBool,
}

impl MappedRegion {
    pub fn new(
        base: u64,
        view: Box<[u8]>,
        file_no: u32,
        relative_path: RelativePath,
    ) -> MappedRegion {
        assert!(!view.is_empty(), "mapped regions must have nonzero length");
        MappedRegion {
            base,
            view,
            file_no,
            relative_path,
            will_need_remap: AtomicBool::new(false),
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> u64 {
        self.view.len() as u64
    }

    pub fn file_no(&self) -> u32 {
        self.file_no
    }

    pub fn relative_path(&self) -> &RelativePath {
        &self.relative_path
    }

    /// Whether this view must be remapped before its next use.
    pub fn will_need_remap(&self) -> bool {
        self.will_need_remap.load(Acquire)
    }
}

/// The result of resolving a write intent's start address: the
/// containing region plus the byte offset into it.
#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    region: Arc<MappedRegion>,
    ofs: u64,
}

impl ResolvedLocation {
    pub fn file_no(&self) -> u32 {
        self.region.file_no
    }

    pub fn relative_path(&self) -> &RelativePath {
        &self.region.relative_path
    }

    /// Byte offset of the resolved address within the backing
    /// file region.
    pub fn ofs(&self) -> u64 {
        self.ofs
    }

    /// Bytes left in the region from the resolved offset to
    /// its end. Always at least 1.
    pub fn remaining(&self) -> u64 {
        self.region.len() - self.ofs
    }

    /// `len` view bytes starting at the resolved offset.
    pub fn view_bytes(&self, len: usize) -> &[u8] {
        &self.region.view[self.ofs as usize..][..len]
    }

    /// Tags the region as needing a remap of its view before
    /// its next use. Usually it is already tagged, so we check
    /// first to avoid cpu cache line contention on the hot
    /// resolution path. Idempotent, and safe under concurrent
    /// shared lookups: the flag is an independent atomic, not
    /// table structure.
    pub fn note_will_need_remap(&self) {
        if !self.region.will_need_remap.load(Acquire) {
            self.region.will_need_remap.store(true, Release);
        }
    }
}

/// Maps memory addresses to the mapped file regions containing
/// them. Lookups take the optimistic lock in shared mode so
/// concurrent resolution (including readers outside the
/// journal path, like a fault handler classifying an address)
/// never serializes; mutation takes it in exclusive mode and
/// is rare (remap, view creation and teardown).
#[derive(Default)]
pub struct MappingTable {
    lock: OptimisticLock,
    regions: UnsafeCell<BTreeMap<u64, Arc<MappedRegion>>>,
}

// Safety: `regions` is only touched while holding the
// optimistic lock, which guarantees that no shared access
// overlaps an exclusive one. The regions themselves are
// shared via `Arc` and use atomics for their mutable state.
unsafe impl Send for MappingTable {}
unsafe impl Sync for MappingTable {}

impl MappingTable {
    pub fn new() -> MappingTable {
        MappingTable::default()
    }

    /// Resolves an address to the region containing it, or
    /// `None` if no mapped region covers it. Takes the shared
    /// lock for the lookup only; the returned location stays
    /// valid after release because regions are refcounted.
    pub fn resolve(&self, address: u64) -> Option<ResolvedLocation> {
        let _shared = self.lock.shared();

        // Safety: shared guard held, see struct-level invariant
        let regions = unsafe { &*self.regions.get() };

        let (base, region) = regions.range(..=address).next_back()?;
        if address >= base + region.len() {
            return None;
        }

        Some(ResolvedLocation {
            region: Arc::clone(region),
            ofs: address - base,
        })
    }

    /// Installs a region, keyed by its base address. Exclusive.
    pub fn insert(&self, region: MappedRegion) {
        let _guard = self.lock.exclusive();

        // Safety: exclusive guard held, see struct-level invariant
        let regions = unsafe { &mut *self.regions.get() };
        let replaced = regions.insert(region.base, Arc::new(region));
        assert!(replaced.is_none(), "overlapping region bases installed");
    }

    /// Removes the region based at `base`. Exclusive.
    pub fn remove(&self, base: u64) -> Option<Arc<MappedRegion>> {
        let _guard = self.lock.exclusive();

        // Safety: exclusive guard held, see struct-level invariant
        let regions = unsafe { &mut *self.regions.get() };
        regions.remove(&base)
    }

    /// Number of mapped views. Diagnostic, used when resolution
    /// fails.
    pub fn view_count(&self) -> usize {
        let _shared = self.lock.shared();

        // Safety: shared guard held, see struct-level invariant
        let regions = unsafe { &*self.regions.get() };
        regions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_region(base: u64, len: usize) -> MappingTable {
        let table = MappingTable::new();
        table.insert(MappedRegion::new(
            base,
            vec![0u8; len].into_boxed_slice(),
            1,
            RelativePath::new("db/things.1"),
        ));
        table
    }

    #[test]
    fn resolve_finds_containing_region() {
        let table = table_with_region(0x1000, 0x100);

        let resolved = table.resolve(0x1040).unwrap();
        assert_eq!(resolved.ofs(), 0x40);
        assert_eq!(resolved.remaining(), 0xc0);
        assert_eq!(resolved.file_no(), 1);
    }

    #[test]
    fn resolve_misses_outside_regions() {
        let table = table_with_region(0x1000, 0x100);

        assert!(table.resolve(0xfff).is_none());
        assert!(table.resolve(0x1100).is_none());
        assert!(table.resolve(0x20_0000).is_none());
    }

    #[test]
    fn last_byte_of_region_resolves() {
        let table = table_with_region(0x1000, 0x100);

        let resolved = table.resolve(0x10ff).unwrap();
        assert_eq!(resolved.remaining(), 1);
    }

    #[test]
    fn remap_flag_is_idempotent() {
        let table = table_with_region(0x1000, 0x100);

        let resolved = table.resolve(0x1000).unwrap();
        resolved.note_will_need_remap();
        resolved.note_will_need_remap();

        let region = table.remove(0x1000).unwrap();
        assert!(region.will_need_remap());
    }

    #[test]
    fn removed_regions_no_longer_resolve() {
        let table = table_with_region(0x1000, 0x100);
        table.remove(0x1000).unwrap();
        assert!(table.resolve(0x1000).is_none());
        assert_eq!(table.view_count(), 0);
    }

    #[test]
    fn resolution_outlives_the_lookup_lock() {
        let table = table_with_region(0x1000, 0x100);
        let resolved = table.resolve(0x1010).unwrap();

        // mutating the table does not invalidate the resolution
        table.remove(0x1000).unwrap();
        assert_eq!(resolved.view_bytes(4), &[0, 0, 0, 0]);
    }
}
