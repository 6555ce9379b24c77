use super::row::TypedRow;
use std::collections::VecDeque;

/// FIFO holding area between batch arrival and admission to the visible dataset.
///
/// Unbounded: arrivals faster than the flush cadence simply grow the queue.
#[derive(Debug, Default)]
pub struct PendingBuffer {
    rows: VecDeque<TypedRow>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch at the tail, preserving its order.
    pub fn extend(&mut self, rows: impl IntoIterator<Item = TypedRow>) {
        self.rows.extend(rows);
    }

    /// Remove up to `max` rows from the front.
    pub fn drain_chunk(&mut self, max: usize) -> Vec<TypedRow> {
        let n = max.min(self.rows.len());
        self.rows.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

/// Append-only rows admitted for display. A row never moves once admitted.
#[derive(Debug, Default)]
pub struct VisibleDataset {
    rows: Vec<TypedRow>,
}

impl VisibleDataset {
    pub fn append(&mut self, rows: Vec<TypedRow>) {
        self.rows.extend(rows);
    }

    pub fn rows(&self) -> &[TypedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::row::Schema;
    use std::sync::Arc;

    fn rows(range: std::ops::Range<usize>) -> Vec<TypedRow> {
        let schema = Arc::new(Schema::new(vec!["n".into()]));
        range
            .map(|i| TypedRow::from_raw(&vec![Some(i.to_string())], &schema))
            .collect()
    }

    #[test]
    fn test_drain_chunk_is_fifo_and_bounded() {
        let mut buffer = PendingBuffer::new();
        buffer.extend(rows(0..5));
        buffer.extend(rows(5..8));
        let first = buffer.drain_chunk(3);
        assert_eq!(first, rows(0..3));
        assert_eq!(buffer.len(), 5);
        let rest = buffer.drain_chunk(100);
        assert_eq!(rest, rows(3..8));
        assert!(buffer.is_empty());
        assert!(buffer.drain_chunk(10).is_empty());
    }

    #[test]
    fn test_visible_dataset_is_prefix_stable() {
        let mut visible = VisibleDataset::default();
        visible.append(rows(0..2));
        let snapshot = visible.rows().to_vec();
        visible.append(rows(2..4));
        assert_eq!(&visible.rows()[..2], snapshot.as_slice());
        assert_eq!(visible.len(), 4);
    }
}
