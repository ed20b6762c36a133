//! Per-call identity stack.
//!
//! Records every object in the order it is first written (or first read).
//! The writer emits a back-reference to an object's position instead of
//! encoding it twice; the reader resolves that position to the instance it
//! already created. Both sides must therefore visit objects in the same order.

use rustc_hash::FxHashMap;

use crate::model::ObjectRef;

/// Objects seen so far in one encode or decode call.
#[derive(Debug, Default)]
pub struct IdentityStack {
    objects: Vec<ObjectRef>,
    /// Handle address to position. Holding the handles keeps addresses stable.
    positions: FxHashMap<usize, usize>,
}

impl IdentityStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an object and returns its position.
    pub fn append(&mut self, obj: ObjectRef) -> usize {
        let position = self.objects.len();
        self.positions.entry(obj.addr()).or_insert(position);
        self.objects.push(obj);
        position
    }

    pub fn get(&self, position: usize) -> Option<&ObjectRef> {
        self.objects.get(position)
    }

    /// Position of the first occurrence of `obj`.
    pub fn position_of(&self, obj: &ObjectRef) -> Option<usize> {
        self.positions.get(&obj.addr()).copied()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_by_identity() {
        let mut stack = IdentityStack::new();
        let a = ObjectRef::new(1u8);
        let b = ObjectRef::new(1u8);

        assert_eq!(stack.append(a.clone()), 0);
        assert_eq!(stack.append(b.clone()), 1);
        assert_eq!(stack.position_of(&a.clone()), Some(0));
        assert_eq!(stack.position_of(&b), Some(1));
        assert_eq!(stack.position_of(&ObjectRef::new(1u8)), None);
        assert!(stack.get(1).unwrap().ptr_eq(&b));
        assert!(stack.get(2).is_none());
    }

    #[test]
    fn test_repeated_append_keeps_first_position() {
        let mut stack = IdentityStack::new();
        let a = ObjectRef::new("x");
        stack.append(a.clone());
        stack.append(ObjectRef::new("y"));
        stack.append(a.clone());
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.position_of(&a), Some(0));
    }
}
