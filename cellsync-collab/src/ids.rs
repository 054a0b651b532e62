use cellsync_core::CellId;
use rand::distr::Alphanumeric;
use rand::Rng;

/// Source of identifiers for locally created cells.
pub trait IdGenerator {
    fn generate(&mut self) -> CellId;
}

/// Random ids over `A-Z`, `a-z` and `0-9`. Collisions are not checked.
#[derive(Debug, Clone)]
pub struct RandomIdGenerator {
    length: usize,
}

impl RandomIdGenerator {
    pub const DEFAULT_LENGTH: usize = 32;

    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LENGTH)
    }
}

impl IdGenerator for RandomIdGenerator {
    fn generate(&mut self) -> CellId {
        let id: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        CellId::new(id)
    }
}

/// `prefix1`, `prefix2`, … for reproducible runs.
#[derive(Debug, Clone)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: u64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&mut self) -> CellId {
        let id = CellId::new(format!("{}{}", self.prefix, self.next));
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_id_shape() {
        let mut ids = RandomIdGenerator::default();
        let id = ids.generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, ids.generate());
    }

    #[test]
    fn test_random_id_length() {
        assert_eq!(RandomIdGenerator::new(8).generate().as_str().len(), 8);
    }

    #[test]
    fn test_sequential_ids() {
        let mut ids = SequentialIdGenerator::new("c");
        assert_eq!(ids.generate(), CellId::from("c1"));
        assert_eq!(ids.generate(), CellId::from("c2"));
    }
}
