/*
 * loops.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Loop frames for `each`/`endeach`.
//!
//! A loop remembers where its body starts in the line source stack. Each
//! `endeach` asks the host for the next item and, if there is one, rewinds the
//! source to the start of the body.

use tracing::debug;

use crate::host::TemplateHost;
use crate::source::Position;

/// State of one active `each` block.
#[derive(Debug, Clone)]
pub struct LoopFrame {
    /// Loop name as written in the template; names are substituted against it.
    pub name: String,
    /// Collection name the host is queried with.
    pub collection: String,
    /// Identifier of the current item.
    pub item: String,
    /// Position of the first line of the body.
    pub rewind: Position,
    /// Host iteration counter for the next query.
    pub counter: usize,
    /// Zero-based iteration index, exposed as `NAME.index`.
    pub index: usize,
}

/// The stack of active loops, outermost first.
#[derive(Debug, Default)]
pub struct LoopStack {
    frames: Vec<LoopFrame>,
}

impl LoopStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a loop over `collection`.
    ///
    /// Returns `false` when the host has no first item; nothing is pushed and
    /// the body must be skipped.
    pub fn enter(
        &mut self,
        name: &str,
        collection: &str,
        rewind: Position,
        host: &dyn TemplateHost,
    ) -> bool {
        match host.next_loop_item(collection, 0) {
            Some((item, counter)) => {
                debug!(loop_name = name, collection, item = %item, "entering loop");
                self.frames.push(LoopFrame {
                    name: name.to_string(),
                    collection: collection.to_string(),
                    item,
                    rewind,
                    counter,
                    index: 0,
                });
                true
            }
            None => {
                debug!(loop_name = name, collection, "loop has no items");
                false
            }
        }
    }

    /// Finish an iteration of the innermost loop.
    ///
    /// Returns the position to rewind to when another item follows. When the
    /// host reports exhaustion the frame is popped and `None` is returned.
    pub fn advance(&mut self, host: &dyn TemplateHost) -> Option<Position> {
        let frame = self.frames.last_mut()?;
        frame.index += 1;
        match host.next_loop_item(&frame.collection, frame.counter) {
            Some((item, counter)) => {
                frame.item = item;
                frame.counter = counter;
                Some(frame.rewind)
            }
            None => {
                debug!(loop_name = %frame.name, iterations = frame.index, "leaving loop");
                self.frames.pop();
                None
            }
        }
    }

    /// Drop the innermost loop without querying the host.
    pub fn pop(&mut self) -> Option<LoopFrame> {
        self.frames.pop()
    }

    /// Innermost active loop.
    pub fn innermost(&self) -> Option<&LoopFrame> {
        self.frames.last()
    }

    /// Active loops, outermost first.
    pub fn frames(&self) -> &[LoopFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
