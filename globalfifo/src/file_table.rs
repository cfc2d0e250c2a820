use std::collections::HashMap;

use crate::cursor::SeekCursor;
use crate::idgen::Handle;
use crate::signal::Interrupt;

/// Per-open state of the device
#[derive(Debug, Clone)]
pub struct OpenFile {
    pub cursor: SeekCursor,
    pub interrupt: Interrupt,
}

impl OpenFile {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cursor: SeekCursor::new(),
            interrupt: Interrupt::new(),
        }
    }
}

impl Default for OpenFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle → open file mapping
#[derive(Debug, Default)]
pub struct FileTable {
    table: HashMap<Handle, OpenFile>,
}

impl FileTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: Handle, file: OpenFile) {
        if self.table.insert(handle, file).is_some() {
            log::warn!("file_table.insert: handle {handle} was already open");
        }
    }

    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&OpenFile> {
        self.table.get(&handle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut OpenFile> {
        self.table.get_mut(&handle)
    }

    pub fn remove(&mut self, handle: Handle) -> Option<OpenFile> {
        self.table.remove(&handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Get all open files
    pub fn files(&self) -> impl Iterator<Item = &OpenFile> {
        self.table.values()
    }
}
