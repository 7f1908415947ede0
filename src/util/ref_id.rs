use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

/// Wrapper type whose "identity" for equality and hashing is determined from the reference itself
/// (ie. the pointer) and not from the underlying data.
///
/// Class graph nodes are arena allocated and never move, so the address is a stable identity for
/// as long as the graph lives. This is what lets members be used as keys in side tables.
#[derive(Debug)]
pub struct RefId<'a, T: ?Sized>(pub &'a T);

impl<'a, T: ?Sized> Clone for RefId<'a, T> {
    fn clone(&self) -> Self {
        RefId(self.0)
    }
}

impl<'a, T: ?Sized> Copy for RefId<'a, T> {}

impl<'a, T> Hash for RefId<'a, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.0, state)
    }
}

impl<'a, 'b, T> PartialEq<RefId<'b, T>> for RefId<'a, T> {
    fn eq(&self, other: &RefId<'b, T>) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl<'a, T> Eq for RefId<'a, T> {}

impl<'a, 'b, T> PartialOrd<RefId<'b, T>> for RefId<'a, T> {
    fn partial_cmp(&self, other: &RefId<'b, T>) -> Option<Ordering> {
        (self.0 as *const T).partial_cmp(&(other.0 as *const T))
    }
}

impl<'a, T> Ord for RefId<'a, T> {
    fn cmp(&self, other: &RefId<'a, T>) -> Ordering {
        (self.0 as *const T).cmp(&(other.0 as *const T))
    }
}

impl<'a, T: ?Sized> Deref for RefId<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::RefId;
    use std::collections::HashSet;

    #[test]
    fn identity_not_contents() {
        let first = String::from("java/lang/Object");
        let second = String::from("java/lang/Object");

        assert_eq!(RefId(&first), RefId(&first));
        assert_ne!(RefId(&first), RefId(&second), "equal contents, distinct nodes");

        let ids: HashSet<RefId<String>> = vec![RefId(&first), RefId(&second), RefId(&first)]
            .into_iter()
            .collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(RefId(&second).len(), 16, "derefs to the underlying data");
    }
}
