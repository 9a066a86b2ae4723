//! Downstream receiver of reassembled documents.

/// Receives each reassembled document exactly once.
///
/// The registry calls [`Consumer::handle`] synchronously while merging, so a
/// slow consumer stalls whoever fed the final chunk. Consumers that do real
/// work should hand the document off, e.g. into a channel.
///
/// Any `FnMut(D) + Send` closure is a consumer.
pub trait Consumer<D>: Send {
    /// Handle one reassembled document.
    fn handle(&mut self, document: D);
}

impl<D, F> Consumer<D> for F
where
    F: FnMut(D) + Send,
{
    fn handle(&mut self, document: D) {
        self(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(usize);

    impl Consumer<u8> for Counter {
        fn handle(&mut self, _document: u8) {
            self.0 += 1;
        }
    }

    #[test]
    fn test_closure_is_consumer() {
        let mut seen = Vec::new();
        {
            let mut consumer = |doc: u8| seen.push(doc);
            consumer.handle(1);
            consumer.handle(2);
        }
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_struct_consumer() {
        let mut counter = Counter(0);
        counter.handle(9);
        assert_eq!(counter.0, 1);
    }
}
