// Application state module
// Browsing session: shared index, mark matrix and key dispatch

/// Which variant of the browser is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Digits toggle marks; marked files are trashed on exit
    #[default]
    Mark,
    /// Read-only browsing
    ViewOnly,
}

/// Per-(column, index) deletion marks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkMatrix {
    columns: usize,
    len: usize,
    cells: Vec<bool>,
}

impl MarkMatrix {
    pub fn new(columns: usize, len: usize) -> Self {
        Self {
            columns,
            len,
            cells: vec![false; columns * len],
        }
    }

    fn cell(&self, column: usize, index: usize) -> Option<usize> {
        (column < self.columns && index < self.len).then(|| column * self.len + index)
    }

    /// Flip the mark at (column, index); out-of-range cells are ignored
    pub fn toggle(&mut self, column: usize, index: usize) {
        if let Some(cell) = self.cell(column, index) {
            self.cells[cell] = !self.cells[cell];
        }
    }

    pub fn is_marked(&self, column: usize, index: usize) -> bool {
        self.cell(column, index)
            .map(|cell| self.cells[cell])
            .unwrap_or(false)
    }

    /// Marked cells as (column, index), column by column
    pub fn marked(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &marked)| marked)
            .map(move |(cell, _)| (cell / self.len, cell % self.len))
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&marked| marked).count()
    }
}

/// State transitions the key dispatch table can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    ToggleMark(usize),
    Quit,
}

impl Command {
    /// Look up the command bound to a key identifier.
    ///
    /// Keys are `"right"`, `"left"`, `"escape"` or the typed character.
    /// Digits only bind in [`Mode::Mark`] and only from `1` to `columns`.
    pub fn from_key(key: &str, columns: usize, mode: Mode) -> Option<Command> {
        match key {
            "right" => Some(Command::Next),
            "left" => Some(Command::Previous),
            "escape" | "q" => Some(Command::Quit),
            _ if mode == Mode::Mark => {
                let mut chars = key.chars();
                let digit = chars.next()?.to_digit(10)? as usize;
                if chars.next().is_some() || digit == 0 || digit > columns {
                    return None;
                }
                Some(Command::ToggleMark(digit - 1))
            }
            _ => None,
        }
    }
}

/// Result of applying a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub session: Session,
    /// Whether the panels must be rendered again
    pub redraw: bool,
}

/// The whole interactive state of one browsing session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    index: usize,
    len: usize,
    columns: usize,
    mode: Mode,
    marks: MarkMatrix,
    exit_requested: bool,
}

impl Session {
    /// Create a session over `len` images in each of `columns` folders
    pub fn new(len: usize, columns: usize, mode: Mode) -> Self {
        Self {
            index: 0,
            len,
            columns,
            mode,
            marks: MarkMatrix::new(columns, len),
            exit_requested: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn marks(&self) -> &MarkMatrix {
        &self.marks
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Whether `column` is marked at the current index
    pub fn is_marked(&self, column: usize) -> bool {
        self.marks.is_marked(column, self.index)
    }

    /// Apply one command, producing the next session
    pub fn apply(mut self, command: Command) -> Transition {
        let redraw = match command {
            Command::Next if self.len > 0 => {
                self.index = (self.index + 1) % self.len;
                true
            }
            Command::Previous if self.len > 0 => {
                self.index = (self.index + self.len - 1) % self.len;
                true
            }
            Command::Next | Command::Previous => false,
            Command::ToggleMark(column) => {
                self.marks.toggle(column, self.index);
                true
            }
            Command::Quit => {
                self.exit_requested = true;
                false
            }
        };

        Transition {
            session: self,
            redraw,
        }
    }

    /// Dispatch a key identifier; unbound keys leave the session untouched
    pub fn dispatch(self, key: &str) -> Transition {
        match Command::from_key(key, self.columns, self.mode) {
            Some(command) => self.apply(command),
            None => Transition {
                session: self,
                redraw: false,
            },
        }
    }
}
