/// A `[` opened by the object path being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bracket {
    pub offset: usize,
    /// The key is a variable path, so the property it selects is unknown.
    pub dynamic: bool,
}

/// The `[` brackets still open in the current tag, innermost last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Brackets {
    stack: Vec<Bracket>,
}

impl Brackets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, offset: usize) {
        self.stack.push(Bracket {
            offset,
            dynamic: false,
        });
    }

    /// Flag the innermost bracket as holding a variable key.
    pub fn set_dynamic(&mut self) {
        if let Some(bracket) = self.stack.last_mut() {
            bracket.dynamic = true;
        }
    }

    /// Pop the innermost `[`. `None` means the `]` has nothing to close.
    pub fn close(&mut self) -> Option<Bracket> {
        self.stack.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nested_pairs() {
        let mut brackets = Brackets::new();
        brackets.open(3);
        brackets.open(7);
        brackets.set_dynamic();
        assert_eq!(
            brackets.close(),
            Some(Bracket {
                offset: 7,
                dynamic: true
            })
        );
        assert_eq!(
            brackets.close(),
            Some(Bracket {
                offset: 3,
                dynamic: false
            })
        );
        assert_eq!(brackets.close(), None);
        assert!(brackets.is_empty());
    }
}
