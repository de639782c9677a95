//! Values transferred across a resume/suspend boundary.

/// The value set produced by `resume` or `suspend`.
///
/// Handoffs travel as plain vectors; on the receiving side they are unwrapped:
/// no values become [`Handoff::Empty`], exactly one becomes
/// [`Handoff::Single`], anything more stays an ordered [`Handoff::Multiple`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handoff<T> {
    /// Nothing was passed.
    Empty,
    /// Exactly one value.
    Single(T),
    /// Two or more values, in the order they were passed.
    Multiple(Vec<T>),
}

impl<T> From<Vec<T>> for Handoff<T> {
    fn from(mut values: Vec<T>) -> Self {
        match values.len() {
            0 => Handoff::Empty,
            1 => match values.pop() {
                Some(value) => Handoff::Single(value),
                None => Handoff::Empty,
            },
            _ => Handoff::Multiple(values),
        }
    }
}

impl<T> Handoff<T> {
    /// Number of values carried.
    pub fn len(&self) -> usize {
        match self {
            Handoff::Empty => 0,
            Handoff::Single(_) => 1,
            Handoff::Multiple(values) => values.len(),
        }
    }

    /// Check if nothing was passed.
    pub fn is_empty(&self) -> bool {
        matches!(self, Handoff::Empty)
    }

    /// Take the value if exactly one was passed.
    pub fn single(self) -> Option<T> {
        match self {
            Handoff::Single(value) => Some(value),
            _ => None,
        }
    }

    /// Flatten back into the transferred sequence.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Handoff::Empty => Vec::new(),
            Handoff::Single(value) => vec![value],
            Handoff::Multiple(values) => values,
        }
    }
}
