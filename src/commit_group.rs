use crate::buffer::LogBuffer;
use crate::intent::WriteIntent;

/// A durability operation other than a basic byte-range write
/// (file creation, database drop, etc). Opaque to the assembly
/// path beyond its ability to serialize itself into the
/// buffer, in its original registration order.
pub trait AuxOp: Send {
    fn serialize_into(&self, buffer: &mut LogBuffer);
}

/// The write intents and auxiliary operations accumulated
/// during one group commit interval.
///
/// A buffer build takes this by `&mut`: the exclusive borrow
/// is the commit-exclusion guarantee the assembly path relies
/// on, so the intent set cannot be mutated mid-build.
#[derive(Default)]
pub struct CommitGroup {
    intents: Vec<WriteIntent>,
    ops: Vec<Box<dyn AuxOp>>,
    sorted: bool,
}

impl CommitGroup {
    pub fn new() -> CommitGroup {
        CommitGroup::default()
    }

    /// Records a pending in-memory write. There is no
    /// particular order to these; sorting happens lazily when
    /// a buffer build begins.
    pub fn note(&mut self, start: u64, length: u32) {
        assert!(length > 0, "zero-length write intent noted");
        self.intents.push(WriteIntent::new(start, length));
        self.sorted = false;
    }

    /// Registers an auxiliary durability operation.
    pub fn push_op(&mut self, op: Box<dyn AuxOp>) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    pub fn intent_count(&self) -> usize {
        self.intents.len()
    }

    pub(crate) fn ops(&self) -> &[Box<dyn AuxOp>] {
        &self.ops
    }

    /// Intents sorted by start address with exact duplicates
    /// removed. This is the input contract the coalescer
    /// relies on.
    pub(crate) fn sorted_intents(&mut self) -> &[WriteIntent] {
        if !self.sorted {
            self.intents.sort_unstable();
            self.intents.dedup();
            self.sorted = true;
        }
        &self.intents
    }

    /// Clears the group for the next commit interval, keeping
    /// allocations.
    pub fn reset(&mut self) {
        self.intents.clear();
        self.ops.clear();
        self.sorted = false;
    }
}
