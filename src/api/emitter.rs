//! Purpose: Presentation-side helper that turns rendered rows into pager events.
//! Exports: `EventEmitter`.
//! Role: Thin wrapper over `ViewEventChannel` for list adapters.
//! Invariants: Rows inside the bottom offset (footers, spinners) never emit positions.
//! Invariants: A bottom offset of 0 disables suppression.

use crate::core::events::{ViewEvent, ViewEventChannel};

#[derive(Clone, Debug, Default)]
pub struct EventEmitter {
    channel: ViewEventChannel,
    bottom_item_offset: usize,
    list_size: usize,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(channel: ViewEventChannel) -> Self {
        Self {
            channel,
            bottom_item_offset: 0,
            list_size: 0,
        }
    }

    /// Channel to hand to `Pager::subscribe`.
    pub fn channel(&self) -> &ViewEventChannel {
        &self.channel
    }

    /// Number of trailing rows that are decoration rather than data.
    pub fn set_bottom_item_offset(&mut self, offset: usize) {
        self.bottom_item_offset = offset;
    }

    /// Rendered row count, including decoration rows.
    pub fn set_list_size(&mut self, size: usize) {
        self.list_size = size;
    }

    /// Report that the row at `index` is being displayed.
    pub fn on_get_item(&self, index: usize) {
        if self.is_decoration(index) {
            return;
        }
        self.channel.emit(ViewEvent::PositionObserved(index));
    }

    pub fn retry(&self) {
        self.channel.retry();
    }

    /// Ask the pager to end its subscription; call when the list leaves the screen.
    pub fn stop(&self) {
        self.channel.stop();
    }

    fn is_decoration(&self, index: usize) -> bool {
        self.bottom_item_offset > 0
            && index >= self.list_size.saturating_sub(self.bottom_item_offset)
            && index < self.list_size
    }
}

#[cfg(test)]
mod tests {
    use super::EventEmitter;

    #[test]
    fn decoration_rows_are_suppressed() {
        let mut emitter = EventEmitter::new();
        emitter.set_list_size(11);
        emitter.set_bottom_item_offset(1);

        emitter.on_get_item(10);
        assert_eq!(emitter.channel().pending(), 0);

        emitter.on_get_item(9);
        emitter.on_get_item(11);
        assert_eq!(emitter.channel().pending(), 2);
    }

    #[test]
    fn zero_offset_emits_everything() {
        let mut emitter = EventEmitter::new();
        emitter.set_list_size(5);
        for index in 0..5 {
            emitter.on_get_item(index);
        }
        emitter.retry();
        emitter.stop();
        assert_eq!(emitter.channel().pending(), 7);
    }
}
