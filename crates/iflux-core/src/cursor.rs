/// Sequential cursor over the keys of a collection, in insertion order.
///
/// The keys are captured when the cursor is built, so items can be
/// mutated (ids assigned) while it walks. Cursors are single-use: once
/// exhausted they stay exhausted.
#[derive(Debug, Clone)]
pub struct Cursor {
    keys: Vec<String>,
    position: usize,
}

impl Cursor {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys, position: 0 }
    }

    pub fn has_next(&self) -> bool {
        self.position < self.keys.len()
    }

    /// Number of keys not yet returned.
    pub fn remaining(&self) -> usize {
        self.keys.len().saturating_sub(self.position)
    }
}

impl Iterator for Cursor {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let key = self.keys.get(self.position)?.clone();
        self.position += 1;
        Some(key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::model::Collection;

    #[test]
    fn walks_keys_in_insertion_order() {
        let collection: Collection = [
            ("zeta", json!({ "name": "z" })),
            ("alpha", json!({ "name": "a" })),
            ("mid", json!({ "name": "m" })),
        ]
        .into_iter()
        .collect();

        let mut cursor = collection.cursor();
        assert!(cursor.has_next());
        assert_eq!(cursor.next().as_deref(), Some("zeta"));
        assert_eq!(cursor.next().as_deref(), Some("alpha"));
        assert_eq!(cursor.next().as_deref(), Some("mid"));
        assert!(!cursor.has_next());
    }

    #[test]
    fn exhausted_cursor_stays_exhausted() {
        let collection: Collection = [("only", json!({ "name": "o" }))].into_iter().collect();
        let mut cursor = collection.cursor();

        assert_eq!(cursor.next().as_deref(), Some("only"));
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.remaining(), 0);
    }
}
