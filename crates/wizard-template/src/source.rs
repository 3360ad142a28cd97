/*
 * source.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The line source stack.
//!
//! Every open text input (the root template and each included fragment) is a
//! [`LineSourceFrame`]: a cursor over its lines plus the scope name `this`
//! resolves to. Reading always happens on the top frame. When that frame runs
//! out it is popped and the read reports "no line" instead of falling through
//! to the frame below, so the driver sees every fragment boundary.

use std::path::{Path, PathBuf};

/// How a frame was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// The root template or an `include:` fragment.
    Default,
    /// A fragment opened by `source:`.
    SourceFragment,
    /// A fragment opened by `output:`.
    OutputFragment,
}

/// One open text input.
#[derive(Debug, Clone)]
pub struct LineSourceFrame {
    lines: Vec<String>,
    cursor: usize,
    kind: FrameKind,
    scope_name: String,
    origin: Option<String>,
    path: Option<PathBuf>,
}

impl LineSourceFrame {
    /// Create a frame over `content`.
    pub fn new(kind: FrameKind, scope_name: impl Into<String>, content: &str) -> Self {
        Self {
            lines: content.lines().map(str::to_string).collect(),
            cursor: 0,
            kind,
            scope_name: scope_name.into(),
            origin: None,
            path: None,
        }
    }

    /// Record the file this frame was read from.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Record the element an output fragment augments.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// A position in the stack: which frame, and which line of it is read next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    depth: usize,
    line: usize,
}

impl Position {
    /// Stack depth of the frame this position belongs to.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// The stack of open line sources.
#[derive(Debug, Default)]
pub struct SourceStack {
    frames: Vec<LineSourceFrame>,
}

impl SourceStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new frame on top of the stack.
    pub fn push(&mut self, frame: LineSourceFrame) {
        self.frames.push(frame);
    }

    /// Read the next line of the top frame.
    ///
    /// On exhaustion the top frame is popped and `None` is returned without
    /// reading from the frame below.
    pub fn read_line(&mut self) -> Option<String> {
        let frame = self.frames.last_mut()?;
        match frame.lines.get(frame.cursor) {
            Some(line) => {
                frame.cursor += 1;
                Some(line.clone())
            }
            None => {
                self.frames.pop();
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The scope name of the top frame; empty when nothing is open.
    pub fn scope_name(&self) -> &str {
        self.frames.last().map_or("", |f| f.scope_name.as_str())
    }

    /// Origin element of the nearest enclosing output fragment.
    pub fn origin(&self) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find(|f| f.kind == FrameKind::OutputFragment)
            .and_then(|f| f.origin.as_deref())
    }

    /// Directory of the nearest frame that was read from a file.
    pub fn template_dir(&self) -> Option<&Path> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.path.as_deref())
            .and_then(Path::parent)
    }

    /// Position of the next line the top frame would return.
    pub fn position(&self) -> Option<Position> {
        self.frames.last().map(|f| Position {
            depth: self.frames.len(),
            line: f.cursor,
        })
    }

    /// Move the top frame's cursor back to `position`.
    ///
    /// Returns `false`, leaving the stack unchanged, when `position` does not
    /// belong to the top frame.
    pub fn seek(&mut self, position: Position) -> bool {
        if position.depth != self.frames.len() {
            return false;
        }
        match self.frames.last_mut() {
            Some(frame) if position.line <= frame.lines.len() => {
                frame.cursor = position.line;
                true
            }
            _ => false,
        }
    }

    /// Skip lines of the top frame up to and including the line closing the
    /// current block.
    ///
    /// Nested blocks opened with `is_open` are balanced against `is_close`.
    /// Returns `false` if the frame ran out before the block was closed.
    pub fn skip_block(
        &mut self,
        is_open: impl Fn(&str) -> bool,
        is_close: impl Fn(&str) -> bool,
    ) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        let mut nesting = 0usize;
        while let Some(line) = frame.lines.get(frame.cursor) {
            frame.cursor += 1;
            if is_close(line) {
                if nesting == 0 {
                    return true;
                }
                nesting -= 1;
            } else if is_open(line) {
                nesting += 1;
            }
        }
        false
    }
}
