//! Text console collaborator.
//!
//! Keyboard and video drivers live outside the task core; syscalls and the
//! logger reach them only through [`Console`].

use core::fmt::{self, Write};

pub trait Console: Send + Sync {
    /// Next character from the keyboard buffer, or a negative value when empty.
    fn getc(&self) -> i32;
    fn putc(&self, c: u8);
    fn set_text_color(&self, fore: u8, back: u8);
    /// Clear the screen and home the cursor.
    fn clear(&self);

    fn puts(&self, s: &[u8]) {
        for &c in s {
            self.putc(c);
        }
    }
}

/// Adapts a [`Console`] to `core::fmt::Write`.
pub struct ConsoleWriter<'a>(pub &'a dyn Console);

impl Write for ConsoleWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.puts(s.as_bytes());
        Ok(())
    }
}

pub fn print(console: &dyn Console, args: fmt::Arguments) {
    ConsoleWriter(console).write_fmt(args).ok();
}
