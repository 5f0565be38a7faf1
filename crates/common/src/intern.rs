use bumpalo::Bump;
use std::collections::HashMap;

pub struct StringInterner<'a> {
    arena: &'a Bump,
    map: HashMap<&'a str, ()>,
}

impl<'a> StringInterner<'a> {
    pub fn new(arena: &'a Bump) -> Self {
        Self {
            arena,
            map: HashMap::new(),
        }
    }

    pub fn intern(&mut self, s: &str) -> &'a str {
        if let Some((&existing, _)) = self.map.get_key_value(s) {
            existing
        } else {
            let interned = self.arena.alloc_str(s);
            self.map.insert(interned, ());
            interned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedup() {
        let arena = Bump::new();
        let mut strings = StringInterner::new(&arena);
        let a = strings.intern("counter");
        let b = strings.intern("counter");
        assert_eq!(a.as_ptr(), b.as_ptr());
    }

    #[test]
    fn test_intern_distinct() {
        let arena = Bump::new();
        let mut strings = StringInterner::new(&arena);
        let a = strings.intern("x");
        let b = strings.intern("y");
        assert_ne!(a, b);
    }
}
