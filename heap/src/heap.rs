use std::{fmt, ops::Range};

use object::{Header, ObjRef, Value, Word};

use crate::trace::{block_words, traced_words};

/// Anything that owns GC roots: the machine stack, the result register,
/// test harnesses.
///
/// The visitor may overwrite each root with its relocated value.
pub trait RootProvider {
    fn visit_roots(&mut self, visitor: &mut dyn FnMut(&mut Value));
}

/// Heap configuration, in words.
#[derive(Debug, Clone)]
pub struct HeapSettings {
    /// Capacity of the active semi-space at start-up.
    pub initial_words: usize,
    /// Capacity the semi-space may grow to.
    pub max_words: usize,
    /// Live fraction (0.0 - 1.0) after a collection above which capacity
    /// is doubled.
    pub grow_threshold: f64,
}

impl Default for HeapSettings {
    fn default() -> Self {
        Self {
            initial_words: 1 << 16,  // 512 KB on 64-bit
            max_words: 1 << 26,      // 512 MB on 64-bit
            grow_threshold: 0.5,
        }
    }
}

impl HeapSettings {
    #[inline]
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.initial_words == 0 {
            return Err("initial_words must be > 0");
        }
        if self.max_words < self.initial_words {
            return Err("max_words must be >= initial_words");
        }
        if self.max_words > ObjRef::MAX_OFFSET {
            return Err("max_words exceeds addressable offsets");
        }
        if !(0.0..=1.0).contains(&self.grow_threshold) {
            return Err("grow_threshold must be between 0.0 and 1.0");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// A reservation could not be satisfied even after collecting and
    /// growing to `max_words`.
    OutOfMemory { requested: usize, live: usize, max: usize },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::OutOfMemory {
                requested,
                live,
                max,
            } => write!(
                f,
                "out of memory: {requested} words requested with {live} live \
                 (heap limit {max} words)"
            ),
        }
    }
}

impl std::error::Error for HeapError {}

/// Counters kept across the life of a heap.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GcStats {
    pub collections: usize,
    pub grows: usize,
    pub words_allocated: usize,
    pub words_copied: usize,
    pub last_live_words: usize,
    pub peak_capacity: usize,
}

/// A freshly bump-allocated block, writable exactly once.
pub struct Fresh<'a> {
    pub offset: usize,
    pub words: &'a mut [Word],
}

// ── Heap ──────────────────────────────────────────────────────────────

/// Bump-allocated semi-space heap with a copying collector.
///
/// Allocation follows a checkpoint protocol: [`Heap::reserve`] guarantees
/// room for a number of words, possibly collecting, after which up to that
/// many words may be taken with [`Heap::bump_alloc`] without any chance of
/// a collection. References are word offsets into the active space, so they
/// stay meaningful only until the next `reserve` that collects.
pub struct Heap {
    space: Vec<Word>,
    hp: usize,
    limit: usize,
    settings: HeapSettings,
    stats: GcStats,
}

impl Heap {
    pub fn new(settings: HeapSettings) -> Self {
        settings.validate().expect("Invalid Heap Settings");
        log::debug!(
            "heap: {} words initial, {} words max",
            settings.initial_words,
            settings.max_words
        );
        Self {
            space: vec![0; settings.initial_words],
            hp: 0,
            limit: 0,
            stats: GcStats {
                peak_capacity: settings.initial_words,
                ..GcStats::default()
            },
            settings,
        }
    }

    #[inline(always)]
    pub fn current_heap_pointer(&self) -> usize {
        self.hp
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.space.len()
    }

    #[inline(always)]
    pub fn free_words(&self) -> usize {
        self.space.len() - self.hp
    }

    pub fn settings(&self) -> &HeapSettings {
        &self.settings
    }

    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    // ── Allocation ────────────────────────────────────────────────────

    /// Guarantee that the next `words` words can be bump-allocated.
    ///
    /// May run a collection over `roots`, after which every reference not
    /// reachable from them is dangling.
    #[inline]
    pub fn reserve(
        &mut self,
        words: usize,
        roots: &mut dyn RootProvider,
    ) -> Result<(), HeapError> {
        if words <= self.free_words() {
            self.limit = self.hp + words;
            return Ok(());
        }
        self.reserve_slow(words, roots)
    }

    #[cold]
    fn reserve_slow(
        &mut self,
        words: usize,
        roots: &mut dyn RootProvider,
    ) -> Result<(), HeapError> {
        self.collect_for(words, roots);
        if words > self.free_words() {
            log::warn!(
                "heap exhausted: {} words requested, {} live",
                words,
                self.hp
            );
            return Err(HeapError::OutOfMemory {
                requested: words,
                live: self.hp,
                max: self.settings.max_words,
            });
        }
        self.limit = self.hp + words;
        Ok(())
    }

    /// Take `words` words from the current reservation.
    #[inline(always)]
    pub fn bump_alloc(&mut self, words: usize) -> Fresh<'_> {
        let offset = self.take(words);
        Fresh {
            offset,
            words: &mut self.space[offset..offset + words],
        }
    }

    /// Like [`Heap::bump_alloc`], with the first `prefix` words copied from
    /// the block `src`.
    #[inline]
    pub fn bump_alloc_copying(&mut self, words: usize, src: ObjRef, prefix: usize) -> Fresh<'_> {
        debug_assert!(prefix <= words);
        let offset = self.take(words);
        let from = src.offset();
        self.space.copy_within(from..from + prefix, offset);
        Fresh {
            offset,
            words: &mut self.space[offset..offset + words],
        }
    }

    #[inline(always)]
    fn take(&mut self, words: usize) -> usize {
        debug_assert!(
            self.hp + words <= self.limit,
            "allocation of {words} words exceeds the reservation \
             (hp {}, limit {})",
            self.hp,
            self.limit
        );
        let offset = self.hp;
        self.hp += words;
        self.stats.words_allocated += words;
        offset
    }

    // ── Access ────────────────────────────────────────────────────────

    #[inline(always)]
    pub fn word(&self, offset: usize) -> Word {
        self.space[offset]
    }

    /// Header of a header-carrying block.
    #[inline(always)]
    pub fn get_header(&self, r: ObjRef) -> Header {
        debug_assert!(!r.is_pair(), "pairs carry no header: {r:?}");
        let raw = self.space[r.offset()];
        debug_assert!(Value::from_raw(raw).is_header(), "corrupt header at {r:?}");
        Header::from_raw(raw)
    }

    /// Word `index` of the block `r`, counted from the block start.
    #[inline(always)]
    pub fn load(&self, r: ObjRef, index: usize) -> Value {
        Value::from_raw(self.space[r.offset() + index])
    }

    /// Words of the block `r`.
    pub fn block(&self, r: ObjRef) -> &[Word] {
        let start = r.offset();
        &self.space[start..start + block_words(&self.space, r)]
    }

    /// Offsets within the block `r` that hold traced [`Value`]s.
    pub fn traced_range(&self, r: ObjRef) -> Range<usize> {
        traced_words(&self.space, r)
    }

    // ── Collection ────────────────────────────────────────────────────

    /// Run a full collection without requesting space.
    pub fn collect(&mut self, roots: &mut dyn RootProvider) {
        self.collect_for(0, roots);
    }

    fn collect_for(&mut self, requested: usize, roots: &mut dyn RootProvider) {
        let capacity = self.space.len();
        let before = self.hp;
        let from = std::mem::take(&mut self.space);
        let mut copier = Copier::new(from, self.hp, capacity);

        roots.visit_roots(&mut |root| *root = copier.forward(*root));
        copier.drain();

        let live = copier.top;
        self.stats.words_copied += copier.copied;
        self.space = copier.to;
        self.hp = live;
        self.limit = live;
        self.stats.collections += 1;
        self.stats.last_live_words = live;

        let needed = live.saturating_add(requested);
        let crowded = live as f64 > capacity as f64 * self.settings.grow_threshold;
        if crowded || needed > capacity {
            let target = capacity
                .saturating_mul(2)
                .max(needed)
                .min(self.settings.max_words);
            if target > capacity {
                self.space.resize(target, 0);
                self.stats.grows += 1;
                self.stats.peak_capacity = self.stats.peak_capacity.max(target);
                log::info!("heap grown from {} to {} words", capacity, target);
            }
        }

        log::debug!(
            "gc #{}: {} -> {} words live, capacity {}",
            self.stats.collections,
            before,
            live,
            self.space.len()
        );
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("hp", &self.hp)
            .field("capacity", &self.space.len())
            .field("stats", &self.stats)
            .finish()
    }
}

// ── Copier ────────────────────────────────────────────────────────────

/// One Cheney-style evacuation from `from` into `to`.
///
/// Forwarded blocks are recorded in a bitmap and the new offset is written
/// over the first word of the old block. Gray blocks are kept on an explicit
/// worklist since pairs carry no header to drive a linear scan.
struct Copier {
    from: Vec<Word>,
    to: Vec<Word>,
    forwarded: Vec<u64>,
    gray: Vec<ObjRef>,
    top: usize,
    copied: usize,
}

impl Copier {
    fn new(from: Vec<Word>, used: usize, capacity: usize) -> Self {
        Self {
            from,
            to: vec![0; capacity],
            forwarded: vec![0; used.div_ceil(64)],
            gray: Vec::new(),
            top: 0,
            copied: 0,
        }
    }

    #[inline(always)]
    fn is_forwarded(&self, offset: usize) -> bool {
        self.forwarded[offset / 64] & (1 << (offset % 64)) != 0
    }

    fn forward(&mut self, value: Value) -> Value {
        let Some(r) = value.as_obj_ref() else {
            return value;
        };
        let old = r.offset();
        if self.is_forwarded(old) {
            return Value::boxed(r.relocated(self.from[old] as usize));
        }

        let len = block_words(&self.from, r);
        let new = self.top;
        self.to[new..new + len].copy_from_slice(&self.from[old..old + len]);
        self.top += len;
        self.copied += len;

        self.forwarded[old / 64] |= 1 << (old % 64);
        self.from[old] = new as Word;

        let moved = r.relocated(new);
        self.gray.push(moved);
        Value::boxed(moved)
    }

    fn drain(&mut self) {
        while let Some(r) = self.gray.pop() {
            let base = r.offset();
            for i in traced_words(&self.to, r) {
                let slot = Value::from_raw(self.to[base + i]);
                let moved = self.forward(slot);
                self.to[base + i] = moved.raw();
            }
        }
    }
}
