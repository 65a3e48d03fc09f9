use std::fs::{File, OpenOptions};
use std::io::Read;
use std::io::Write;

use crate::error::{LispError, LispResult};
use crate::value::ResourceId;

/// The inner state of an open resource.
pub enum ResourceInner {
    File {
        file: File,
        readable: bool,
        writable: bool,
    },
    Closed,
}

/// Manages the host files owned by the Lisp program. A `ResourceId` is an
/// index into the slot table; closing a resource poisons its slot.
pub struct ResourceTable {
    slots: Vec<ResourceInner>,
}

impl ResourceTable {
    pub fn new() -> Self {
        ResourceTable { slots: Vec::new() }
    }

    /// Open a file. `mode` follows POSIX fopen conventions: `r`, `w`, `a`,
    /// each with an optional `+`; a `b` suffix is accepted and ignored.
    pub fn open(&mut self, path: &str, mode: &str) -> LispResult<ResourceId> {
        let normalized: String = mode.chars().filter(|&c| c != 'b').collect();
        let (mut options, readable, writable) = match normalized.as_str() {
            "r" => {
                let mut o = OpenOptions::new();
                o.read(true);
                (o, true, false)
            }
            "r+" => {
                let mut o = OpenOptions::new();
                o.read(true).write(true);
                (o, true, true)
            }
            "w" => {
                let mut o = OpenOptions::new();
                o.write(true).create(true).truncate(true);
                (o, false, true)
            }
            "w+" => {
                let mut o = OpenOptions::new();
                o.read(true).write(true).create(true).truncate(true);
                (o, true, true)
            }
            "a" => {
                let mut o = OpenOptions::new();
                o.append(true).create(true);
                (o, false, true)
            }
            "a+" => {
                let mut o = OpenOptions::new();
                o.read(true).append(true).create(true);
                (o, true, true)
            }
            other => {
                return Err(LispError::Io(format!("invalid file mode: '{}'", other)));
            }
        };

        let file = options
            .open(path)
            .map_err(|e| LispError::Io(format!("cannot open '{}': {}", path, e)))?;

        let id = ResourceId(self.slots.len() as u32);
        self.slots.push(ResourceInner::File {
            file,
            readable,
            writable,
        });
        Ok(id)
    }

    /// Read all remaining bytes as a string.
    pub fn read_all(&mut self, id: ResourceId) -> LispResult<String> {
        match self.slot_mut(id)? {
            ResourceInner::File { file, readable, .. } => {
                if !*readable {
                    return Err(LispError::Io("resource is not open for reading".into()));
                }
                let mut text = String::new();
                file.read_to_string(&mut text)
                    .map_err(|e| LispError::Io(format!("read failed: {}", e)))?;
                Ok(text)
            }
            ResourceInner::Closed => Err(LispError::Io("read from closed resource".into())),
        }
    }

    /// Write a string; returns the number of bytes written.
    pub fn write(&mut self, id: ResourceId, text: &str) -> LispResult<usize> {
        match self.slot_mut(id)? {
            ResourceInner::File { file, writable, .. } => {
                if !*writable {
                    return Err(LispError::Io("resource is not open for writing".into()));
                }
                file.write_all(text.as_bytes())
                    .map_err(|e| LispError::Io(format!("write failed: {}", e)))?;
                Ok(text.len())
            }
            ResourceInner::Closed => Err(LispError::Io("write to closed resource".into())),
        }
    }

    /// Close a resource. Dropping the file flushes it.
    pub fn close(&mut self, id: ResourceId) -> LispResult<()> {
        let slot = self.slot_mut(id)?;
        if matches!(slot, ResourceInner::Closed) {
            return Err(LispError::Io("resource already closed".into()));
        }
        *slot = ResourceInner::Closed;
        Ok(())
    }

    fn slot_mut(&mut self, id: ResourceId) -> LispResult<&mut ResourceInner> {
        self.slots
            .get_mut(id.0 as usize)
            .ok_or_else(|| LispError::Io(format!("unknown resource {}", id.0)))
    }
}

impl Default for ResourceTable {
    fn default() -> Self {
        ResourceTable::new()
    }
}
