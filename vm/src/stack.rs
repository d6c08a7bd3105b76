use object::Value;

/// The explicit value stack: arguments, temporaries, frame links and
/// continuations. Every slot is a GC root.
#[derive(Debug, Clone, Default)]
pub struct Stack {
    slots: Vec<Value>,
    high_water: usize,
}

impl Stack {
    #[must_use]
    pub fn with_capacity(words: usize) -> Self {
        Self {
            slots: Vec::with_capacity(words),
            high_water: 0,
        }
    }

    /// Returns the live portion of the stack
    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.slots
    }

    pub fn as_mut_slice(&mut self) -> &mut [Value] {
        &mut self.slots
    }

    #[inline(always)]
    pub fn push(&mut self, value: Value) {
        self.slots.push(value);
        self.high_water = self.high_water.max(self.slots.len());
    }

    #[inline(always)]
    pub fn pop(&mut self) -> Option<Value> {
        self.slots.pop()
    }

    #[inline(always)]
    #[must_use]
    pub fn get(&self, index: usize) -> Value {
        self.slots[index]
    }

    #[inline(always)]
    pub fn set(&mut self, index: usize, value: Value) {
        self.slots[index] = value;
    }

    /// Gets the nth value from the top of the stack (0-indexed)
    #[must_use]
    pub fn peek(&self, n: usize) -> Option<Value> {
        let idx = self.slots.len().checked_sub(n + 1)?;
        self.slots.get(idx).copied()
    }

    /// Drops everything at and above `depth`.
    #[inline(always)]
    pub fn truncate(&mut self, depth: usize) {
        debug_assert!(depth <= self.slots.len(), "stack truncated upward");
        self.slots.truncate(depth);
    }

    #[inline(always)]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Largest depth the stack ever reached.
    #[must_use]
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Empties the stack and resets the high-water mark.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.high_water = 0;
    }
}
